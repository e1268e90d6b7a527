//! Describe command handler.

use super::print_json;
use clap::Args;
use tally_core::{config::AppConfig, AppResult};
use tally_knowledge::Pipeline;

/// Show resolved metadata for a table
#[derive(Args, Debug)]
pub struct DescribeCommand {
    /// Logical table name (plural forms are accepted)
    pub table: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl DescribeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing describe command for table '{}'", self.table);

        let pipeline = Pipeline::from_config(config)?;
        let metadata = pipeline.describe(&self.table).await?;

        if self.json {
            return print_json(&metadata);
        }

        println!("Table:      {}", metadata.logical_name);
        println!("Collection: {}", metadata.collection_name);
        println!("Dates:      {}", metadata.date_fields.join(", "));
        println!("Numeric:    {}", metadata.numeric_fields.join(", "));
        println!("Text:       {}", metadata.text_fields.join(", "));

        Ok(())
    }
}
