//! Tally Core Library
//!
//! Foundational utilities shared by every Tally crate:
//! - Error taxonomy (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management
//! - Retry with bounded exponential backoff

pub mod config;
pub mod error;
pub mod logging;
pub mod retry;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use retry::{with_backoff, RetryPolicy};
