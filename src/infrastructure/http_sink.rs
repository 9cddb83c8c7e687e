//! reqwest-backed destination sink.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::domain::errors::DestinationError;
use crate::domain::repositories::DestinationSink;

/// Longest error body kept for logging.
const MAX_ERROR_BODY: usize = 512;

/// Shared client carrying the bounded per-request timeout.
#[derive(Clone)]
pub struct HttpSink {
    client: Client,
}

impl HttpSink {
    pub fn new(timeout: Duration) -> Result<Self, DestinationError> {
        let client = Client::builder()
            .user_agent(concat!("signal-relay/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| DestinationError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

fn classify(e: reqwest::Error) -> DestinationError {
    if e.is_timeout() {
        DestinationError::Timeout
    } else if e.is_connect() {
        DestinationError::Connection(e.to_string())
    } else {
        DestinationError::Request(e.to_string())
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
        body.push('…');
    }
    body
}

#[async_trait]
impl DestinationSink for HttpSink {
    async fn send(&self, url: &str, body: &serde_json::Value) -> Result<(), DestinationError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(classify)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            return Err(DestinationError::Rejected {
                status,
                body: truncate(error_text),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let long = "é".repeat(MAX_ERROR_BODY);
        let cut = truncate(long);
        assert!(cut.ends_with('…'));
        assert!(cut.len() <= MAX_ERROR_BODY + '…'.len_utf8());
        assert_eq!(truncate("short".to_string()), "short");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transient() {
        let sink = HttpSink::new(Duration::from_millis(500)).unwrap();
        // Port 9 on localhost is closed in any sane test environment.
        let err = sink
            .send("http://127.0.0.1:9/hook", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.is_transient(), "unexpected error: {:?}", err);
    }
}
