//! Wire types for the chat service

use crate::conversation::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Body of both chat endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub model: String,
    /// Prior non-system messages, oldest first
    pub conversation_history: Vec<Message>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_tokens: Option<u32>,
}

/// Whole-body reply from `/api/chat`
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default)]
    pub model_used: Option<String>,
    #[serde(default)]
    pub tokens_used: Option<u64>,
    #[serde(default)]
    pub process_time_ms: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Entry of `/api/models`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub parameter_count: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
}

impl ModelInfo {
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.size)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelList {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

/// Reply of `/api/health`
#[derive(Debug, Clone, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub uptime: Option<String>,
    /// Upstream dependency name to connection state
    #[serde(default)]
    pub connections: HashMap<String, String>,
}

/// Error body the service sends alongside a non-success status
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
}
