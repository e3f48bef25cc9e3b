//! Route resolution
//!
//! Maps a candidate's origin (file path or task space) to a destination
//! channel. Resolution is pure: the rule set is fixed for the lifetime of a
//! [`RouteTable`].

use serde::{Deserialize, Serialize};

use super::candidate::NotificationCandidate;
use super::errors::DomainError;
use super::newtypes::ChannelName;

/// A single `prefix -> channel` mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    /// Case-insensitive origin prefix (e.g. `/Clients/Acme`)
    #[serde(rename = "prefix")]
    pub match_prefix: String,
    pub channel: ChannelName,
}

impl RouteRule {
    /// Creates a rule
    ///
    /// # Errors
    /// Returns error if the prefix is empty
    pub fn new(match_prefix: impl Into<String>, channel: ChannelName) -> Result<Self, DomainError> {
        let match_prefix = match_prefix.into();
        if match_prefix.trim().is_empty() {
            return Err(DomainError::InvalidRouteRule(format!(
                "empty prefix for channel '{channel}'"
            )));
        }
        Ok(Self {
            match_prefix,
            channel,
        })
    }
}

/// Ordered rule set plus fallback channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
    /// Lowercased prefixes, parallel to `rules`
    folded: Vec<String>,
    default_channel: ChannelName,
}

impl RouteTable {
    pub fn new(rules: Vec<RouteRule>, default_channel: ChannelName) -> Self {
        let folded = rules.iter().map(|r| r.match_prefix.to_lowercase()).collect();
        Self {
            rules,
            folded,
            default_channel,
        }
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn default_channel(&self) -> &ChannelName {
        &self.default_channel
    }

    /// Returns the rule that would route `origin`, if any
    ///
    /// The longest matching prefix wins; among equally long prefixes the one
    /// configured first wins.
    pub fn matching_rule(&self, origin: &str) -> Option<&RouteRule> {
        let origin = origin.to_lowercase();
        let mut best: Option<(usize, usize)> = None;
        for (idx, prefix) in self.folded.iter().enumerate() {
            if !origin.starts_with(prefix.as_str()) {
                continue;
            }
            // strict `>` keeps the earlier rule on ties
            if best.map_or(true, |(_, len)| prefix.len() > len) {
                best = Some((idx, prefix.len()));
            }
        }
        best.map(|(idx, _)| &self.rules[idx])
    }

    /// Resolves an origin to its destination channel
    pub fn resolve(&self, origin: &str) -> &ChannelName {
        self.matching_rule(origin)
            .map_or(&self.default_channel, |rule| &rule.channel)
    }

    pub fn resolve_candidate(&self, candidate: &NotificationCandidate) -> &ChannelName {
        self.resolve(&candidate.origin)
    }
}
