//! Plain-text message renderer

use chatrelay_core::domain::{CandidateKind, NotificationCandidate};
use chatrelay_core::ports::{IMessageRenderer, RenderedMessage};

/// Renders candidates as short chat-markup messages
///
/// ```text
/// :white_check_mark: Task completed: *Ship release* (Engineering)
/// Assignees: ana, luis
/// https://tasks.example/t/86
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct TextRenderer;

impl IMessageRenderer for TextRenderer {
    fn render(&self, candidate: &NotificationCandidate) -> RenderedMessage {
        let mut lines = vec![match candidate.kind {
            CandidateKind::TaskCompleted => format!(
                ":white_check_mark: Task completed: *{}* ({})",
                candidate.subject_name, candidate.origin
            ),
            CandidateKind::FileUploaded => format!(
                ":page_facing_up: New file: *{}* in `{}`",
                candidate.subject_name,
                parent_of(&candidate.origin)
            ),
        }];

        if let Some(details) = &candidate.details {
            if !details.assignees.is_empty() {
                lines.push(format!("Assignees: {}", details.assignees.join(", ")));
            }
            if let Some(description) = &details.description {
                lines.push(description.clone());
            }
            if let Some(url) = &details.url {
                lines.push(url.clone());
            }
        }

        RenderedMessage::new(lines.join("\n"))
    }
}

/// Parent folder of a slash-separated path; `/` for top-level entries
fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}
