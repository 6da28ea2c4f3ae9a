//! Assistant client - chat controller for an HTTP text-generation service
//!
//! Sends user messages to the service one at a time, in whole-response or
//! streamed mode, and keeps the conversation history consistent across both
//! modes and across failures.

pub mod config;
pub mod conversation;
pub mod dispatch;
pub mod status;
pub mod stream;
pub mod transport;

pub use config::{Settings, SettingsError};
pub use conversation::{ConversationStore, Message, Role};
pub use dispatch::{
    DispatchError, DispatchEvent, Dispatcher, IgnoreReason, PendingId, SendOutcome, SessionState,
    TransportMode,
};
pub use status::{ConnectionStatus, HealthMonitor, ModelCatalog};
pub use stream::{StreamDecoder, StreamEvent};
pub use transport::{HttpTransport, LoggingTransport, TransportClient, TransportError};
