//! Aggregate command handler.

use super::print_json;
use clap::Args;
use tally_core::{config::AppConfig, AppResult};
use tally_knowledge::{Pipeline, Resolution};

/// Resolve an aggregate or listing question over table records
#[derive(Args, Debug)]
pub struct AggregateCommand {
    /// Question text, e.g. "total revenue from opportunity in 2024"
    #[arg(required = true, num_args = 1..)]
    pub words: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AggregateCommand {
    pub fn text(&self) -> String {
        self.words.join(" ")
    }

    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing aggregate command");

        let pipeline = Pipeline::from_config(config)?;
        let resolution = pipeline.resolve_aggregate(&self.text()).await?;

        if self.json {
            return print_json(&resolution);
        }

        match resolution {
            Resolution::Aggregate(result) => println!("{}", result.summary()),
            Resolution::Listing(listing) => {
                println!(
                    "{} record(s) from {}",
                    listing.records.len(),
                    listing.collection_name
                );
                for record in &listing.records {
                    match &record.date {
                        Some(date) => println!("- {} ({})", record.display, date),
                        None => println!("- {}", record.display),
                    }
                }
            }
            Resolution::Echo(text) => println!("{}", text),
        }

        Ok(())
    }
}
