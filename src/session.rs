//! The session aggregate: message log, patient context, operation state and status
//!
//! A [`Session`] is plain data. The state machine reads it, the runtime is
//! its only writer.

mod context;
mod message_log;
mod status;

pub use context::SessionContext;
pub use message_log::{ChatMessage, LogChange, MessageLog, Sender, TranscriptEntry, PLACEHOLDER_TEXT};
pub use status::StatusChannel;

use crate::state_machine::OperationState;
use serde::Serialize;

/// Greeting shown when a session opens
pub const DEFAULT_GREETING: &str =
    "Hello, I am your virtual medical assistant. How can I help you today?";

#[derive(Debug, Clone, Default)]
pub struct Session {
    pub(crate) log: MessageLog,
    pub(crate) context: SessionContext,
    pub(crate) operation: OperationState,
    pub(crate) status: StatusChannel,
    /// Content of the most recent successful chat reply, the export source
    pub(crate) last_assistant_reply: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an assistant greeting as the first entry
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        let mut session = Self::new();
        session.log.append(Sender::Assistant, greeting);
        session
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn operation(&self) -> &OperationState {
        &self.operation
    }

    pub fn status(&self) -> &StatusChannel {
        &self.status
    }

    pub fn is_busy(&self) -> bool {
        self.operation.is_busy()
    }

    pub fn last_assistant_reply(&self) -> Option<&str> {
        self.last_assistant_reply.as_deref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            messages: self.log.all().to_vec(),
            bound_record_id: self.context.current().map(str::to_string),
            operation: self.operation.clone(),
            status: self.status.current().map(str::to_string),
            last_assistant_reply: self.last_assistant_reply.clone(),
        }
    }
}

/// Owned copy of a session, safe to hand across tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub messages: Vec<ChatMessage>,
    pub bound_record_id: Option<String>,
    pub operation: OperationState,
    pub status: Option<String>,
    pub last_assistant_reply: Option<String>,
}

impl SessionSnapshot {
    pub fn is_busy(&self) -> bool {
        self.operation.is_busy()
    }

    /// Messages from one sender, in log order
    pub fn from_sender(&self, sender: Sender) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(move |m| m.sender == sender)
    }
}
