//! Shared response handling for the REST backends.

use std::time::Duration;
use tally_core::{AppError, AppResult};

/// Build an HTTP client with the standard timeout.
pub(crate) fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_default()
}

/// Send a request; connection failures and timeouts are transient.
pub(crate) async fn send(
    builder: reqwest::RequestBuilder,
    context: &str,
) -> AppResult<reqwest::Response> {
    let response = builder
        .send()
        .await
        .map_err(|e| AppError::Transient(format!("{} request failed: {}", context, e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(AppError::from_status(status.as_u16(), context, &body));
    }

    Ok(response)
}

/// Send a request and decode a JSON body.
pub(crate) async fn send_json(
    builder: reqwest::RequestBuilder,
    context: &str,
) -> AppResult<serde_json::Value> {
    send(builder, context)
        .await?
        .json()
        .await
        .map_err(|e| AppError::Backend(format!("{} returned invalid JSON: {}", context, e)))
}

/// Send a request and collect the body bytes.
pub(crate) async fn send_bytes(
    builder: reqwest::RequestBuilder,
    context: &str,
) -> AppResult<Vec<u8>> {
    let bytes = send(builder, context)
        .await?
        .bytes()
        .await
        .map_err(|e| AppError::Transient(format!("{} body read failed: {}", context, e)))?;
    Ok(bytes.to_vec())
}
