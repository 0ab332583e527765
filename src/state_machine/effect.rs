//! Effects produced by state transitions

use super::state::Operation;
use crate::backend::DocumentFile;
use crate::session::Sender;

/// Effects to be executed after a transition, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Add a message to the log
    AppendMessage { sender: Sender, content: String },

    /// Show the "working" indicator at the tail of the log
    ShowPlaceholder,

    /// Turn the pending placeholder into an assistant message
    ResolvePlaceholder { content: String },

    BindContext { record_id: String },

    ClearContext,

    SetStatus { status: String },

    /// Remember the text the next export should render
    RememberReply { text: String },

    /// Make a chat request from the current log and context
    RequestChat { message: String },

    RequestUpload { file: DocumentFile },

    /// Export `text` and hand the document to the download sink
    RequestExport { text: String },

    RequestSwitchPatient { patient_id: String },

    RequestResetContext,

    /// Notify observers that an operation settled
    NotifySettled { operation: Operation, success: bool },
}

impl Effect {
    pub fn user_message(content: impl Into<String>) -> Self {
        Effect::AppendMessage {
            sender: Sender::User,
            content: content.into(),
        }
    }

    pub fn assistant_message(content: impl Into<String>) -> Self {
        Effect::AppendMessage {
            sender: Sender::Assistant,
            content: content.into(),
        }
    }

    pub fn status(status: impl Into<String>) -> Self {
        Effect::SetStatus {
            status: status.into(),
        }
    }

    pub fn settled(operation: Operation, success: bool) -> Self {
        Effect::NotifySettled { operation, success }
    }

    /// Whether executing this effect issues a network call
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            Effect::RequestChat { .. }
                | Effect::RequestUpload { .. }
                | Effect::RequestExport { .. }
                | Effect::RequestSwitchPatient { .. }
                | Effect::RequestResetContext
        )
    }
}
