//! Index command handler.

use super::print_json;
use clap::Args;
use std::sync::Arc;
use tally_core::{config::AppConfig, AppResult};
use tally_knowledge::{Pipeline, ProgressEvent, ProgressReporter};

/// Index all configured sources
#[derive(Args, Debug)]
pub struct IndexCommand {
    /// Maximum items to list per source (overrides documents.listLimit)
    #[arg(long)]
    pub limit: Option<usize>,

    /// Print progress lines to stderr
    #[arg(long)]
    pub progress: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing index command");

        let mut pipeline = Pipeline::from_config(config)?;
        if self.limit.is_some() {
            pipeline = pipeline.with_list_limit(self.limit);
        }
        if self.progress {
            pipeline = pipeline.with_progress(ProgressReporter::new(Arc::new(|event: ProgressEvent| {
                eprintln!("{}", event.format_simple());
            })));
        }

        let stats = pipeline.index_all().await?;

        if self.json {
            print_json(&stats)?;
        } else {
            println!(
                "Indexed {} of {} items ({} with content, {} failed) in {:.2}s",
                stats.indexed, stats.fetched, stats.downloaded, stats.failed, stats.duration_secs
            );
        }

        Ok(())
    }
}
