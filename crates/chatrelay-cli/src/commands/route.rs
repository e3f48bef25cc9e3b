//! Route command - show where a candidate with a given origin would be posted

use anyhow::{Context, Result};
use clap::Args;

use super::CliContext;
use crate::output::get_formatter;

#[derive(Debug, Args)]
pub struct RouteCommand {
    /// File path (e.g. `/Clients/Acme/invoice.pdf`) or task space name
    pub origin: String,
}

impl RouteCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let config = ctx.load_config()?;
        let table = config.route_table().context("Invalid routing configuration")?;

        let rule = table.matching_rule(&self.origin);
        let channel = table.resolve(&self.origin);

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "origin": self.origin,
                "channel": channel.as_str(),
                "matched_prefix": rule.map(|r| r.match_prefix.as_str()),
            }));
        } else {
            formatter.success(&format!("{} -> #{}", self.origin, channel));
            match rule {
                Some(r) => formatter.info(&format!("Matched rule: {}", r.match_prefix)),
                None => formatter.info("No rule matched; using the default channel"),
            }
        }
        Ok(())
    }
}
