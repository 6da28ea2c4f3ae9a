//! Events emitted to the rendering surface

use super::DispatchError;
use crate::conversation::Message;
use std::fmt;
use uuid::Uuid;

/// Identity of the placeholder assistant entry for one send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingId(Uuid);

impl PendingId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PendingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What happened, in the order it happened
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    /// The user's message was recorded
    UserAppended { message: Message },
    /// A placeholder for the reply should be shown
    PendingOpened { id: PendingId },
    /// Replace the placeholder's text with `content`
    DeltaApplied { id: PendingId, content: String },
    /// The reply is final and recorded
    Completed { id: PendingId, message: Message },
    /// The exchange failed; show `indicator` in place of the placeholder
    Failed {
        id: PendingId,
        indicator: String,
        error: DispatchError,
    },
    /// A system message was recorded
    NoticePosted { message: Message },
    /// History was cleared for a new chat
    ConversationReset,
}

impl DispatchEvent {
    /// The send this event belongs to, if any
    #[must_use]
    pub fn pending_id(&self) -> Option<PendingId> {
        match self {
            DispatchEvent::PendingOpened { id }
            | DispatchEvent::DeltaApplied { id, .. }
            | DispatchEvent::Completed { id, .. }
            | DispatchEvent::Failed { id, .. } => Some(*id),
            DispatchEvent::UserAppended { .. }
            | DispatchEvent::NoticePosted { .. }
            | DispatchEvent::ConversationReset => None,
        }
    }
}
