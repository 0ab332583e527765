//! Backend error types

use thiserror::Error;

/// Failure of a backend call, classified the way the session reports it
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::RemoteRejected { status }, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Transport, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::MalformedResponse, message)
    }

    /// Malformed payloads are reported exactly like connection failures
    pub fn is_transport(&self) -> bool {
        self.kind.is_transport()
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Non-2xx response carrying an error text
    RemoteRejected { status: u16 },
    /// Connection failures, timeouts, unreadable bodies
    Transport,
    /// 2xx response whose body does not have the expected shape
    MalformedResponse,
}

impl BackendErrorKind {
    pub fn is_transport(self) -> bool {
        matches!(self, Self::Transport | Self::MalformedResponse)
    }
}
