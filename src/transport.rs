//! Transport to the chat service
//!
//! The dispatcher only sees the [`TransportClient`] trait, so tests can swap
//! in a scripted fake and the binary wraps the HTTP client with logging.

mod error;
mod http;
mod types;

pub use error::{TransportError, TransportErrorKind};
pub use http::HttpTransport;
pub use types::{ChatRequest, ChatResponse, HealthReport, ModelInfo};

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Instant;

/// Raw response body, chunk by chunk, as the network delivers it
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, TransportError>>;

/// The four requests the client makes
///
/// Every method fails with a [`TransportError`] on network failure, a
/// non-success status or a body that does not decode.
#[async_trait]
#[allow(clippy::missing_errors_doc)] // Shared failure modes, documented above
pub trait TransportClient: Send + Sync {
    /// `POST /api/chat`, whole reply in one body
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError>;

    /// `POST /api/chat/stream`, reply body read incrementally
    async fn chat_stream(&self, request: &ChatRequest) -> Result<ByteStream, TransportError>;

    /// `GET /api/models`
    async fn list_models(&self) -> Result<Vec<ModelInfo>, TransportError>;

    /// `GET /api/health`
    async fn health(&self) -> Result<HealthReport, TransportError>;
}

#[async_trait]
impl<T: TransportClient + ?Sized> TransportClient for Arc<T> {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError> {
        (**self).chat(request).await
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        (**self).chat_stream(request).await
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, TransportError> {
        (**self).list_models().await
    }

    async fn health(&self) -> Result<HealthReport, TransportError> {
        (**self).health().await
    }
}

/// Logging wrapper for any transport
pub struct LoggingTransport<T> {
    inner: T,
}

impl<T: TransportClient> LoggingTransport<T> {
    #[must_use]
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

fn log_failure(endpoint: &str, started: Instant, error: &TransportError) {
    tracing::error!(
        endpoint,
        duration_ms = %started.elapsed().as_millis(),
        kind = ?error.kind,
        error = %error.message,
        "Request failed"
    );
}

#[async_trait]
impl<T: TransportClient> TransportClient for LoggingTransport<T> {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError> {
        let started = Instant::now();
        let result = self.inner.chat(request).await;

        match &result {
            Ok(response) => {
                tracing::info!(
                    model = %request.model,
                    history = request.conversation_history.len(),
                    duration_ms = %started.elapsed().as_millis(),
                    tokens_used = ?response.tokens_used,
                    process_time_ms = ?response.process_time_ms,
                    "Chat request completed"
                );
            }
            Err(e) => log_failure("/api/chat", started, e),
        }

        result
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        let started = Instant::now();
        let result = self.inner.chat_stream(request).await;

        match &result {
            Ok(_) => {
                tracing::info!(
                    model = %request.model,
                    history = request.conversation_history.len(),
                    duration_ms = %started.elapsed().as_millis(),
                    "Chat stream opened"
                );
            }
            Err(e) => log_failure("/api/chat/stream", started, e),
        }

        result
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, TransportError> {
        let started = Instant::now();
        let result = self.inner.list_models().await;

        match &result {
            Ok(models) => tracing::debug!(count = models.len(), "Model list fetched"),
            Err(e) => log_failure("/api/models", started, e),
        }

        result
    }

    async fn health(&self) -> Result<HealthReport, TransportError> {
        let started = Instant::now();
        let result = self.inner.health().await;

        match &result {
            Ok(report) => tracing::debug!(status = %report.status, "Health checked"),
            Err(e) => log_failure("/api/health", started, e),
        }

        result
    }
}
