//! HTTP transport for chat requests.
//!
//! [`ChatTransport`] is the seam between the orchestrator and the network: it
//! sends one request and hands back the response body as a byte stream once a
//! success status has been received. [`HttpTransport`] is the `reqwest`
//! implementation; tests substitute scripted ones.

use crate::config::ApiConfig;
use crate::types::ChatRequest;
use crate::{Error, Result};
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::pin::Pin;

/// Response body of a successful request, read incrementally.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Sends chat requests.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// POSTs `request` and returns the streamed body.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] with the status and body text when the server does
    /// not answer with a success status; [`Error::Http`] for network failures.
    async fn send(&self, request: &ChatRequest<'_>) -> Result<ByteStream>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    headers: HeaderMap,
}

impl HttpTransport {
    /// Builds the HTTP client and validates the configured headers.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::config(format!("invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                Error::config(format!(
                    "invalid value for header '{}': {}",
                    name.as_str(),
                    e
                ))
            })?;
            headers.insert(name, value);
        }

        // Connect timeout only; turn deadlines go through the cancellation token.
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            headers,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, request: &ChatRequest<'_>) -> Result<ByteStream> {
        log::debug!(
            "POST {} ({} messages, tools: {})",
            self.endpoint,
            request.messages.len(),
            request.has_tools()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .json(request)
            .send()
            .await
            .map_err(Error::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|e| {
                log::warn!("Failed to read error response body: {}", e);
                "Unknown error (failed to read response body)".to_string()
            });
            return Err(Error::transport(status.as_u16(), body));
        }

        let body = response
            .bytes_stream()
            .map(|read| read.map(|bytes| bytes.to_vec()).map_err(Error::Http));
        Ok(Box::pin(body))
    }
}
