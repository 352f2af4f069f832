//! HTTP client for the spreadsheet-backed data store.
//!
//! The store is a single web-app endpoint: `GET` returns the whole snapshot
//! and `POST` accepts one command envelope per mutation.

use std::time::Duration;

use anyhow::Result;
use reqwest::{header, Client};
use serde_json::Value;
use tracing::{debug, warn};

use super::protocol::{RemoteCommand, RemoteReply, RemoteStore};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for snapshot reads.
const READ_TIMEOUT_SECS: u64 = 60;

/// Timeout for mutation writes. Spreadsheet writes take a lock on the sheet
/// and are markedly slower than reads.
const WRITE_TIMEOUT_SECS: u64 = 90;

/// Simple content type so browsers skip the CORS preflight; the store parses
/// the body as JSON regardless.
const COMMAND_CONTENT_TYPE: &str = "text/plain;charset=utf-8";

/// API client for the data store.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    endpoint: String,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl ApiClient {
    /// Create a new API client for the given endpoint URL
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            anyhow::bail!("Data store endpoint is not configured");
        }

        // Per-request timeouts are set on each call; the store redirects
        // every request once, so redirects must stay enabled.
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            endpoint,
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            write_timeout: Duration::from_secs(WRITE_TIMEOUT_SECS),
        })
    }

    /// Override the default read/write timeouts.
    pub fn with_timeouts(mut self, read: Duration, write: Duration) -> Self {
        self.read_timeout = read;
        self.write_timeout = write;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Fetch the raw snapshot.
    pub async fn get_snapshot(&self) -> Result<Value, ApiError> {
        let response = self
            .client
            .get(&self.endpoint)
            .header(header::ACCEPT, "application/json")
            .timeout(self.read_timeout)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        debug!(bytes = text.len(), "Snapshot response received");

        let body: Value = serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!(
                "snapshot is not JSON ({}): {}",
                e,
                ApiError::truncate_body(&text)
            ))
        })?;

        unwrap_snapshot(body)
    }

    /// Send one mutation command.
    pub async fn post_command(&self, command: &RemoteCommand) -> Result<RemoteReply, ApiError> {
        let body = serde_json::to_string(command)
            .map_err(|e| ApiError::InvalidResponse(format!("failed to encode command: {}", e)))?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(header::CONTENT_TYPE, COMMAND_CONTENT_TYPE)
            .timeout(self.write_timeout)
            .body(body)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        debug!(action = %command.action, "Command response received");

        parse_reply(&text)
    }
}

impl RemoteStore for ApiClient {
    async fn fetch_snapshot(&self) -> Result<Value, ApiError> {
        self.get_snapshot().await
    }

    async fn send_command(&self, command: &RemoteCommand) -> Result<RemoteReply, ApiError> {
        self.post_command(command).await
    }
}

/// Accept either a bare snapshot or a `{"status", "data"}` envelope.
fn unwrap_snapshot(body: Value) -> Result<Value, ApiError> {
    let Value::Object(mut map) = body else {
        return Err(ApiError::InvalidResponse(
            "snapshot is not a JSON object".to_string(),
        ));
    };

    match map.get("status").and_then(Value::as_str) {
        Some("error") => {
            let message = map
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("no message from data store")
                .to_string();
            Err(ApiError::Rejected(message))
        }
        Some(_) => match map.remove("data") {
            Some(data @ Value::Object(_)) => Ok(data),
            Some(_) | None => {
                warn!("Snapshot envelope without an object payload");
                Err(ApiError::InvalidResponse(
                    "snapshot envelope has no data object".to_string(),
                ))
            }
        },
        None => Ok(Value::Object(map)),
    }
}

/// Parse a command reply. A body that is not JSON is fatal for the call.
fn parse_reply(text: &str) -> Result<RemoteReply, ApiError> {
    let reply: RemoteReply = serde_json::from_str(text).map_err(|e| {
        ApiError::InvalidResponse(format!(
            "reply is not JSON ({}): {}",
            e,
            ApiError::truncate_body(text)
        ))
    })?;
    reply.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_rejects_blank_endpoint() {
        assert!(ApiClient::new("   ").is_err());
        let client = ApiClient::new("https://script.example.com/exec").expect("client");
        assert_eq!(client.endpoint(), "https://script.example.com/exec");
    }

    #[test]
    fn test_unwrap_bare_snapshot() {
        let body = json!({"users": [], "banks": [{"Bank_ID": 1}]});
        assert_eq!(unwrap_snapshot(body.clone()).expect("bare"), body);
    }

    #[test]
    fn test_unwrap_enveloped_snapshot() {
        let body = json!({"status": "ok", "data": {"banks": []}});
        assert_eq!(unwrap_snapshot(body).expect("envelope"), json!({"banks": []}));
    }

    #[test]
    fn test_unwrap_error_envelope() {
        let body = json!({"status": "error", "message": "Script timeout"});
        assert!(matches!(unwrap_snapshot(body), Err(ApiError::Rejected(m)) if m == "Script timeout"));
        assert!(matches!(unwrap_snapshot(json!([1, 2])), Err(ApiError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_reply() {
        let reply = parse_reply(r#"{"status":"ok","data":{"Employee_ID":42}}"#).expect("ok reply");
        assert_eq!(reply.data, Some(json!({"Employee_ID": 42})));

        assert!(matches!(
            parse_reply(r#"{"status":"error","message":"Duplicate IFSC"}"#),
            Err(ApiError::Rejected(m)) if m == "Duplicate IFSC"
        ));
        assert!(matches!(
            parse_reply("<html>Service unavailable</html>"),
            Err(ApiError::InvalidResponse(_))
        ));
    }
}
