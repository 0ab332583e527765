//! Settlement guard for spawned network calls

use super::Request;
use crate::backend::BackendError;
use crate::state_machine::Event;
use tokio::sync::mpsc;

const INTERRUPTED_TEXT: &str = "Request was interrupted before it completed";

/// Error reported when a call never produced its own outcome
pub(super) fn interrupted() -> BackendError {
    BackendError::transport(INTERRUPTED_TEXT)
}

/// Reports exactly one settlement for a spawned call.
///
/// Dropped without [`SettlementGuard::settle`] (the task panicked or was
/// aborted), it reports its fallback instead, so the session never stays busy.
pub(super) struct SettlementGuard {
    tx: Option<mpsc::UnboundedSender<Request>>,
    fallback: Option<Event>,
}

impl SettlementGuard {
    pub(super) fn new(tx: mpsc::UnboundedSender<Request>, fallback: Event) -> Self {
        Self {
            tx: Some(tx),
            fallback: Some(fallback),
        }
    }

    pub(super) fn settle(mut self, event: Event) {
        self.fallback = None;
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Request::Settle { event });
        }
    }
}

impl Drop for SettlementGuard {
    fn drop(&mut self) {
        if let (Some(tx), Some(event)) = (self.tx.take(), self.fallback.take()) {
            tracing::warn!("Request ended without settling, reporting it as interrupted");
            let _ = tx.send(Request::Settle { event });
        }
    }
}
