//! HTTP implementation of the transport

use super::types::{ChatRequest, ChatResponse, ErrorBody, HealthReport, ModelInfo, ModelList};
use super::{ByteStream, TransportClient, TransportError};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// reqwest-backed client for the chat service
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    /// Applied to whole-body requests only; streams stay open until the
    /// service ends them.
    timeout: Duration,
}

impl HttpTransport {
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialised.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TransportError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        let base = &self.base_url;
        format!("{base}{path}")
    }

    /// Turn a non-success status into an error, using the service's error
    /// body for the message when it has one.
    async fn check(response: Response) -> Result<Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) if !body.message.is_empty() => body.message,
            Ok(body) if !body.error.is_empty() => body.error,
            _ => format!("HTTP {status}"),
        };

        Err(TransportError::status(status.as_u16(), message))
    }
}

#[async_trait]
impl TransportClient for HttpTransport {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError> {
        let response = self
            .client
            .post(self.url("/api/chat"))
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?;

        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        let response = self
            .client
            .post(self.url("/api/chat/stream"))
            .json(request)
            .send()
            .await?;

        let response = Self::check(response).await?;
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(Vec::from).map_err(TransportError::from));

        Ok(body.boxed())
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, TransportError> {
        let response = self
            .client
            .get(self.url("/api/models"))
            .timeout(self.timeout)
            .send()
            .await?;

        let response = Self::check(response).await?;
        let list: ModelList = response.json().await?;
        Ok(list.models)
    }

    async fn health(&self) -> Result<HealthReport, TransportError> {
        let response = self
            .client
            .get(self.url("/api/health"))
            .timeout(self.timeout)
            .send()
            .await?;

        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }
}
