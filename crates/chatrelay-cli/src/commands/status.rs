//! Status command - aggregate task counts per status
//!
//! Lists tasks through the task directory and prints counts per status with
//! a completed/open split. `--post CHANNEL` also sends the report to chat.

use anyhow::{Context, Result};
use clap::Args;

use chatrelay_core::domain::ChannelName;
use chatrelay_core::usecases::StatusReportUseCase;
use chatrelay_providers::ProviderSet;

use super::CliContext;
use crate::output::get_formatter;

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Restrict the report to one space
    #[arg(long)]
    pub space: Option<String>,

    /// Also post the report to this chat channel
    #[arg(long, value_name = "CHANNEL")]
    pub post: Option<String>,
}

impl StatusCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let config = ctx.load_config()?;
        let providers = ProviderSet::from_config(&config)?;

        let channel = self
            .post
            .as_ref()
            .map(|c| ChannelName::new(c.clone()).with_context(|| format!("Invalid channel '{}'", c)))
            .transpose()?;

        let mut usecase = StatusReportUseCase::new(providers.directory()?);
        if channel.is_some() {
            usecase = usecase.with_sink(providers.sink()?);
        }

        let report = usecase.execute(self.space.as_deref()).await?;

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::to_value(&report)?);
        } else {
            let scope = report.space.as_deref().unwrap_or("all spaces");
            formatter.success(&format!(
                "{}: {} tasks, {} completed, {} open",
                scope, report.total, report.completed, report.open
            ));
            for entry in &report.by_status {
                formatter.info(&format!("{:<20} {:>5}  ({})", entry.status, entry.count, entry.kind));
            }
        }

        if let Some(channel) = channel {
            usecase.publish(&report, &channel).await?;
            formatter.success(&format!("Report posted to #{}", channel));
        }

        Ok(())
    }
}
