//! Error types for Tally.
//!
//! A single error enum covers every failure class in the workspace. The
//! backend-facing classes (`Auth`, `NotFound`, `Transient`, `Extraction`,
//! `Backend`) drive retry and degradation decisions; the rest are ambient
//! failures such as bad configuration or I/O.

use thiserror::Error;

/// Unified error type for Tally.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Credential or token failure. Never retried with the same credentials.
    #[error("Authorization error: {0}")]
    Auth(String),

    /// Unknown logical table or missing remote resource.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network failure or 408/429/5xx from a backend.
    #[error("Transient backend error: {0}")]
    Transient(String),

    /// Non-retryable, non-auth backend rejection (other 4xx).
    #[error("Backend error: {0}")]
    Backend(String),

    /// Unreadable content (corrupt PDF, unsupported encoding).
    #[error("Content extraction error: {0}")]
    Extraction(String),

    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Indexing, search and retrieval errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Classify a non-success HTTP status into the backend taxonomy.
    ///
    /// `context` names the call site (e.g. "search query") and `body` is the
    /// response text, which is clipped to keep log lines readable.
    pub fn from_status(status: u16, context: &str, body: &str) -> Self {
        let detail = format!("{} failed ({}): {}", context, status, clip(body, 300));
        match status {
            401 | 403 => AppError::Auth(detail),
            404 => AppError::NotFound(detail),
            408 | 429 => AppError::Transient(detail),
            s if s >= 500 => AppError::Transient(detail),
            _ => AppError::Backend(detail),
        }
    }

    /// Whether this error is eligible for bounded retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Transient(_))
    }

    /// Short machine-readable class name, used as a structured log field.
    pub fn class(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Auth(_) => "auth",
            AppError::NotFound(_) => "not_found",
            AppError::Transient(_) => "transient",
            AppError::Backend(_) => "backend",
            AppError::Extraction(_) => "extraction",
            AppError::Llm(_) => "llm",
            AppError::Knowledge(_) => "knowledge",
            AppError::Prompt(_) => "prompt",
            AppError::Serialization(_) => "serialization",
            AppError::Other(_) => "other",
        }
    }
}

fn clip(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(AppError::from_status(401, "x", ""), AppError::Auth(_)));
        assert!(matches!(AppError::from_status(403, "x", ""), AppError::Auth(_)));
        assert!(matches!(
            AppError::from_status(404, "x", ""),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            AppError::from_status(429, "x", ""),
            AppError::Transient(_)
        ));
        assert!(matches!(
            AppError::from_status(503, "x", ""),
            AppError::Transient(_)
        ));
        assert!(matches!(
            AppError::from_status(400, "x", ""),
            AppError::Backend(_)
        ));
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(AppError::Transient("timeout".into()).is_retryable());
        assert!(!AppError::Auth("expired".into()).is_retryable());
        assert!(!AppError::NotFound("table".into()).is_retryable());
        assert!(!AppError::Backend("bad request".into()).is_retryable());
    }

    #[test]
    fn test_body_is_clipped() {
        let body = "é".repeat(1000);
        let err = AppError::from_status(500, "search query", &body);
        assert!(err.to_string().chars().count() < 400);
        assert_eq!(err.class(), "transient");
    }
}
