//! Command handlers for the Tally CLI.

pub mod aggregate;
pub mod ask;
pub mod describe;
pub mod index;

pub use aggregate::AggregateCommand;
pub use ask::AskCommand;
pub use describe::DescribeCommand;
pub use index::IndexCommand;

use serde::Serialize;
use tally_core::AppResult;

/// Print a value as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
