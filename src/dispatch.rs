//! Message dispatch
//!
//! Drives one send at a time against the chat service: records the user's
//! message, requests the reply (whole or streamed), reports progress as
//! [`DispatchEvent`]s and records the reply once it is final.
//!
//! The only state of the dispatch state machine is `is_generating`:
//! `Idle -> Sending` when a send passes its preconditions, back to `Idle` on
//! every exit path. Sends made while `Sending` are dropped, not queued.

mod event;

#[cfg(test)]
mod proptests;

pub use event::{DispatchEvent, PendingId};

use crate::config::{validate_temperature, Settings, SettingsError};
use crate::conversation::{ConversationStore, Message};
use crate::stream::{StreamDecoder, StreamEvent};
use crate::transport::{ChatRequest, TransportClient, TransportError};
use futures::{Stream, StreamExt};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

const EVENT_CAPACITY: usize = 256;

const TRANSPORT_FAILURE_INDICATOR: &str =
    "❌ Error: Failed to get response from AI. Check if the AI service is running.";

/// Which chat endpoint a send uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    /// One request, whole reply in the response body
    Regular,
    /// Reply body read incrementally and decoded frame by frame
    #[default]
    Streaming,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::Regular => f.write_str("regular"),
            TransportMode::Streaming => f.write_str("streaming"),
        }
    }
}

/// Per-session knobs plus the in-flight flag
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub active_model: String,
    pub is_generating: bool,
    pub temperature: f32,
    pub mode: TransportMode,
}

/// Why an exchange failed
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    /// Network failure, non-success status or unreadable body
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
    /// The stream carried an error frame
    #[error("service reported an error: {0}")]
    Protocol(String),
}

impl DispatchError {
    /// Text shown in place of the pending reply
    #[must_use]
    pub fn indicator(&self) -> String {
        match self {
            DispatchError::Transport(_) => TRANSPORT_FAILURE_INDICATOR.to_string(),
            DispatchError::Protocol(message) => format!("❌ Error: {message}"),
        }
    }
}

/// Precondition that turned a send into a no-op
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    EmptyInput,
    Busy,
}

/// Result of [`Dispatcher::send`]
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Nothing happened
    Ignored(IgnoreReason),
    /// Reply recorded
    Completed(Message),
    /// User message recorded, reply failed
    Failed(DispatchError),
}

struct Session {
    state: SessionState,
    conversation: ConversationStore,
    /// Bumped by `new_chat` so sends from an earlier chat can't touch the new one
    epoch: u64,
}

/// Releases `is_generating` however the send ends, including when the send
/// future is dropped mid-flight.
struct GeneratingGuard<'a> {
    session: &'a Mutex<Session>,
    epoch: u64,
}

impl Drop for GeneratingGuard<'_> {
    fn drop(&mut self) {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if session.epoch == self.epoch {
            session.state.is_generating = false;
        }
    }
}

/// Chat controller for one session
pub struct Dispatcher<T> {
    transport: T,
    session: Mutex<Session>,
    events: broadcast::Sender<DispatchEvent>,
    max_tokens: Option<u32>,
}

impl<T: TransportClient> Dispatcher<T> {
    #[must_use]
    pub fn new(transport: T, settings: &Settings) -> Self {
        Self::with_store(transport, settings, ConversationStore::new())
    }

    /// Start from an existing conversation
    #[must_use]
    pub fn with_store(transport: T, settings: &Settings, conversation: ConversationStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            transport,
            session: Mutex::new(Session {
                state: SessionState {
                    active_model: settings.model.clone(),
                    is_generating: false,
                    temperature: settings.temperature,
                    mode: settings.mode,
                },
                conversation,
                epoch: 0,
            }),
            events,
            max_tokens: settings.max_tokens,
        }
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Receive every event emitted from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.events.subscribe()
    }

    /// Subscription as a stream for a renderer.
    ///
    /// A subscriber that falls more than the channel capacity behind loses
    /// the oldest events; the loss is logged and the stream carries on.
    pub fn event_stream(&self) -> impl Stream<Item = DispatchEvent> + Send + 'static {
        tokio_stream::StreamExt::filter_map(BroadcastStream::new(self.subscribe()), |result| {
            match result {
                Ok(event) => Some(event),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event subscriber lagged, events dropped");
                    None
                }
            }
        })
    }

    #[must_use]
    pub fn session(&self) -> SessionState {
        self.lock().state.clone()
    }

    #[must_use]
    pub fn is_generating(&self) -> bool {
        self.lock().state.is_generating
    }

    #[must_use]
    pub fn history(&self) -> Vec<Message> {
        self.lock().conversation.history().to_vec()
    }

    #[must_use]
    pub fn transport_view(&self) -> Vec<Message> {
        self.lock().conversation.transport_view()
    }

    /// Send `user_text` and wait for the reply.
    ///
    /// Blank input, or a send while another is in flight, is a silent no-op.
    /// Failures are reported through the outcome and a `Failed` event; the
    /// user's message stays recorded either way.
    pub async fn send(&self, user_text: &str) -> SendOutcome {
        let text = user_text.trim();
        if text.is_empty() {
            return SendOutcome::Ignored(IgnoreReason::EmptyInput);
        }

        let (request, mode, epoch) = {
            let mut session = self.lock();
            if session.state.is_generating {
                tracing::debug!("Send ignored, a reply is still being generated");
                return SendOutcome::Ignored(IgnoreReason::Busy);
            }
            session.state.is_generating = true;

            // The new message travels in `message`; history is what came before
            let request = ChatRequest {
                message: text.to_string(),
                model: session.state.active_model.clone(),
                conversation_history: session.conversation.transport_view(),
                temperature: session.state.temperature,
                max_tokens: self.max_tokens,
            };

            let user = Message::user(text);
            session.conversation.append(user.clone());
            self.emit(DispatchEvent::UserAppended { message: user });

            (request, session.state.mode, session.epoch)
        };
        let guard = GeneratingGuard {
            session: &self.session,
            epoch,
        };

        let id = PendingId::new();
        self.emit(DispatchEvent::PendingOpened { id });
        tracing::info!(
            pending_id = %id,
            model = %request.model,
            mode = %mode,
            history = request.conversation_history.len(),
            "Sending message"
        );

        let result = match mode {
            TransportMode::Regular => self.request_whole(&request, id).await,
            TransportMode::Streaming => self.request_stream(&request, id).await,
        };

        match result {
            Ok(reply) => {
                let message = Message::assistant(reply);
                {
                    let mut session = self.lock();
                    if session.epoch == epoch {
                        session.conversation.append(message.clone());
                    } else {
                        tracing::warn!(pending_id = %id, "Chat was reset during send, reply not recorded");
                    }
                }
                // Idle before observers hear about the outcome
                drop(guard);
                tracing::info!(pending_id = %id, chars = message.content.len(), "Reply completed");
                self.emit(DispatchEvent::Completed {
                    id,
                    message: message.clone(),
                });
                SendOutcome::Completed(message)
            }
            Err(error) => {
                tracing::warn!(pending_id = %id, error = %error, "Send failed");
                drop(guard);
                self.emit(DispatchEvent::Failed {
                    id,
                    indicator: error.indicator(),
                    error: error.clone(),
                });
                SendOutcome::Failed(error)
            }
        }
    }

    async fn request_whole(&self, request: &ChatRequest, id: PendingId) -> Result<String, DispatchError> {
        let response = self.transport.chat(request).await?;
        self.emit(DispatchEvent::DeltaApplied {
            id,
            content: response.response.clone(),
        });
        Ok(response.response)
    }

    async fn request_stream(&self, request: &ChatRequest, id: PendingId) -> Result<String, DispatchError> {
        let mut body = self.transport.chat_stream(request).await?;
        let mut decoder = StreamDecoder::new();
        let mut reply = String::new();

        // Body is open: swap the typing indicator for an empty reply
        self.emit(DispatchEvent::DeltaApplied {
            id,
            content: String::new(),
        });

        loop {
            let events = match body.next().await {
                Some(chunk) => decoder.feed(&chunk?),
                None => decoder.finish(),
            };

            for event in events {
                match event {
                    StreamEvent::Delta(text) => {
                        reply.push_str(&text);
                        self.emit(DispatchEvent::DeltaApplied {
                            id,
                            content: reply.clone(),
                        });
                    }
                    StreamEvent::Completed => return Ok(reply),
                    StreamEvent::Error(message) => return Err(DispatchError::Protocol(message)),
                }
            }
        }
    }

    /// Clear the conversation and force the session idle.
    ///
    /// A send still in flight finishes on its own but its reply is not
    /// recorded in the new conversation.
    pub fn new_chat(&self) {
        let discarded = {
            let mut session = self.lock();
            let discarded = session.conversation.len();
            session.conversation.clear();
            session.state.is_generating = false;
            session.epoch += 1;
            discarded
        };
        tracing::info!(discarded, "New chat started");
        self.emit(DispatchEvent::ConversationReset);
    }

    /// Record a system message; never sent upstream
    #[allow(clippy::must_use_candidate)] // Callers mostly want the side effect
    pub fn post_notice(&self, text: impl Into<String>) -> Message {
        let message = Message::system(text);
        self.lock().conversation.append(message.clone());
        self.emit(DispatchEvent::NoticePosted {
            message: message.clone(),
        });
        message
    }

    /// Change model and tell the user about it
    pub fn switch_model(&self, model: &str) {
        self.set_active_model(model);
        self.post_notice(format!("Switched to model: {model}"));
    }

    /// Change model silently
    pub fn set_active_model(&self, model: &str) {
        self.lock().state.active_model = model.to_string();
        tracing::debug!(model, "Active model set");
    }

    /// # Errors
    ///
    /// Rejects values outside the accepted range and keeps the current one.
    pub fn set_temperature(&self, temperature: f32) -> Result<(), SettingsError> {
        let temperature = validate_temperature(temperature)?;
        self.lock().state.temperature = temperature;
        Ok(())
    }

    pub fn set_mode(&self, mode: TransportMode) {
        self.lock().state.mode = mode;
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: DispatchEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
