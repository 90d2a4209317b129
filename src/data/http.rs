//! Shared HTTP plumbing for the remote calls

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::fetch::RemoteError;

/// Longest error body kept in a [`RemoteError::Status`] message
const MAX_ERROR_BODY: usize = 200;

/// Builds the HTTP client shared by all remote calls
///
/// The orchestrator enforces per-resource timeouts; the client-level timeout
/// is only a backstop.
pub fn http_client() -> Client {
    Client::builder()
        .user_agent(concat!("briefing/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_default()
}

/// Sends `request` and decodes a JSON body
///
/// Non-2xx statuses become [`RemoteError::Status`] carrying a trimmed body,
/// transport failures [`RemoteError::Network`], bad bodies [`RemoteError::Malformed`].
pub async fn get_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, RemoteError> {
    let response = request.send().await?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RemoteError::Status {
            status: status.as_u16(),
            message: trim_body(&body),
        });
    }

    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}

/// Error for a call that cannot be made without credentials
pub fn missing_api_key(provider: &str) -> RemoteError {
    RemoteError::Status {
        status: 401,
        message: format!("no {provider} API key configured"),
    }
}

fn trim_body(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_body_keeps_short_bodies() {
        assert_eq!(trim_body("  {\"message\":\"bad key\"} "), "{\"message\":\"bad key\"}");
    }

    #[test]
    fn test_trim_body_truncates_long_bodies() {
        let long = "x".repeat(500);

        let trimmed = trim_body(&long);

        assert_eq!(trimmed.len(), MAX_ERROR_BODY + 3);
        assert!(trimmed.ends_with("..."));
    }

    #[test]
    fn test_missing_api_key_is_a_client_error() {
        match missing_api_key("Guardian") {
            RemoteError::Status { status, message } => {
                assert_eq!(status, 401);
                assert!(message.contains("Guardian"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
