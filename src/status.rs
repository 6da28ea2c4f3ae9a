//! Model catalog and service health
//!
//! Both degrade to a fallback display value on failure; neither ever gets in
//! the way of a send.

use crate::config::DEFAULT_MODEL;
use crate::transport::{HealthReport, ModelInfo, TransportClient};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Upstream connection the service reports in its health check
const AI_CONNECTION: &str = "ollama";

pub const MODEL_LOAD_FAILED_NOTICE: &str = "Failed to load available models. Using default.";

/// Models the user can pick from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCatalog {
    pub models: Vec<ModelInfo>,
    /// True when the service gave us nothing and the default stands in
    pub fallback: bool,
    /// Set when the model list request itself failed
    pub error: Option<String>,
}

impl ModelCatalog {
    fn fallback(error: Option<String>) -> Self {
        Self {
            models: vec![ModelInfo {
                name: DEFAULT_MODEL.to_string(),
                size: "default".to_string(),
                parameter_count: None,
                family: None,
            }],
            fallback: true,
            error,
        }
    }

    /// Model to adopt when the catalog arrives, if the service offered one
    #[must_use]
    pub fn preferred(&self) -> Option<&str> {
        if self.fallback {
            None
        } else {
            self.models.first().map(|m| m.name.as_str())
        }
    }

    /// Display strings, one per model
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.models.iter().map(ModelInfo::label).collect()
    }
}

pub async fn load_model_catalog<T: TransportClient + ?Sized>(transport: &T) -> ModelCatalog {
    match transport.list_models().await {
        Ok(models) if !models.is_empty() => ModelCatalog {
            models,
            fallback: false,
            error: None,
        },
        Ok(_) => {
            tracing::info!("Service offered no models, using default");
            ModelCatalog::fallback(None)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load models");
            ModelCatalog::fallback(Some(e.message))
        }
    }
}

/// Connectivity as shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    AiReady,
    AiDisconnected,
    ServerError,
    Offline,
}

impl ConnectionStatus {
    #[must_use]
    pub fn from_report(report: &HealthReport) -> Self {
        if report.status != "healthy" {
            return ConnectionStatus::ServerError;
        }
        match report.connections.get(AI_CONNECTION).map(String::as_str) {
            Some("connected") => ConnectionStatus::AiReady,
            _ => ConnectionStatus::AiDisconnected,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ConnectionStatus::AiReady => "✅ AI Ready",
            ConnectionStatus::AiDisconnected => "⚠️ AI Disconnected",
            ConnectionStatus::ServerError => "❌ Server Error",
            ConnectionStatus::Offline => "❌ Offline",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub async fn check_health<T: TransportClient + ?Sized>(transport: &T) -> ConnectionStatus {
    match transport.health().await {
        Ok(report) => ConnectionStatus::from_report(&report),
        Err(e) => {
            tracing::debug!(error = %e, "Health check failed");
            ConnectionStatus::Offline
        }
    }
}

/// Background health poller
///
/// Checks once immediately, then every `period`. Stops when dropped.
pub struct HealthMonitor {
    status: watch::Receiver<ConnectionStatus>,
    cancel: CancellationToken,
}

impl HealthMonitor {
    #[must_use]
    pub fn spawn<T: TransportClient + 'static>(transport: Arc<T>, period: Duration) -> Self {
        let (tx, rx) = watch::channel(ConnectionStatus::Offline);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = interval.tick() => {
                        let status = check_health(transport.as_ref()).await;
                        tx.send_if_modified(|current| {
                            if *current == status {
                                false
                            } else {
                                tracing::info!(status = %status, "Connection status changed");
                                *current = status;
                                true
                            }
                        });
                    }
                }
            }
            tracing::debug!("Health monitor stopped");
        });

        Self { status: rx, cancel }
    }

    /// Latest known status
    #[must_use]
    pub fn current(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Receiver that wakes on each status change
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
