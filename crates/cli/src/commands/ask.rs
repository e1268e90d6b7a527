//! Ask command handler.

use super::print_json;
use clap::Args;
use tally_core::{config::AppConfig, AppResult};
use tally_knowledge::Pipeline;

/// Answer a question from indexed documents
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        config.validate()?;

        let pipeline = Pipeline::from_config(config)?;
        let result = pipeline.ask(&self.question).await?;
        tracing::debug!(outcome = ?result.outcome, sources = result.sources.len(), "Answer ready");

        if self.json {
            return print_json(&result);
        }

        println!("{}", result.answer);
        if !result.sources.is_empty() {
            println!();
            println!("Sources:");
            for source in &result.sources {
                println!("- {} ({})", source.name, source.url);
            }
        }

        Ok(())
    }
}
