//! Runtime for executing a session
//!
//! One task owns the [`Session`]. Callers talk to it through a cloneable
//! [`SessionHandle`]; network calls run as spawned tasks and report their
//! settlement back onto the same queue, so every mutation happens on the
//! runtime task.

mod executor;
mod settlement;


use executor::SessionRuntime;

use crate::backend::{Backend, BackendError, DocumentFile, PatientSummary};
use crate::download::DownloadSink;
use crate::session::{ChatMessage, Session, SessionSnapshot};
use crate::state_machine::{Event, Operation, TransitionError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};

const BROADCAST_CAPACITY: usize = 256;

/// Changes pushed to observers, in the order they were applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A new entry now lives at `index`; later entries shifted by one
    MessageInserted { index: usize, message: ChatMessage },
    /// The entry at `index` was rewritten in place
    MessageReplaced { index: usize, message: ChatMessage },
    StatusChanged { status: String },
    ContextChanged { bound_record_id: Option<String> },
    OperationStarted { operation: Operation },
    OperationSettled { operation: Operation, success: bool },
}

/// Outcome of dispatching a user action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The operation is in flight; an `OperationSettled` event follows
    Started { operation: Operation },
    /// Blank input, nothing happened
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Session is busy with {operation}, wait for it to finish")]
    Busy { operation: Operation },
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Session runtime has stopped")]
    RuntimeClosed,
}

impl From<TransitionError> for SessionError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::Busy { operation } => SessionError::Busy { operation },
            TransitionError::InvalidTransition(msg) => SessionError::InvalidTransition(msg),
        }
    }
}

/// Messages understood by the runtime task
#[derive(Debug)]
enum Request {
    Dispatch {
        event: Event,
        reply: oneshot::Sender<Result<Dispatch, TransitionError>>,
    },
    Settle {
        event: Event,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    request_tx: mpsc::UnboundedSender<Request>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    backend: Arc<dyn Backend>,
}

impl SessionHandle {
    pub async fn send_message(&self, text: impl Into<String>) -> Result<Dispatch, SessionError> {
        self.dispatch(Event::SendMessage { text: text.into() }).await
    }

    pub async fn upload_document(&self, file: DocumentFile) -> Result<Dispatch, SessionError> {
        self.dispatch(Event::UploadDocument { file }).await
    }

    /// Export the most recent assistant reply and hand it to the download sink
    pub async fn export_last_reply(&self) -> Result<Dispatch, SessionError> {
        self.dispatch(Event::ExportLastReply).await
    }

    pub async fn switch_patient(&self, patient_id: impl Into<String>) -> Result<Dispatch, SessionError> {
        self.dispatch(Event::SwitchPatient {
            patient_id: patient_id.into(),
        })
        .await
    }

    pub async fn reset_context(&self) -> Result<Dispatch, SessionError> {
        self.dispatch(Event::ResetContext).await
    }

    /// Read-only query, answered straight from the backend
    ///
    /// Not subject to the busy flag and never touches the session.
    pub async fn list_patients(&self) -> Result<Vec<PatientSummary>, BackendError> {
        self.backend.list_patients().await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request_tx
            .send(Request::Snapshot { reply })
            .map_err(|_| SessionError::RuntimeClosed)?;
        rx.await.map_err(|_| SessionError::RuntimeClosed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.broadcast_tx.subscribe()
    }

    async fn dispatch(&self, event: Event) -> Result<Dispatch, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request_tx
            .send(Request::Dispatch { event, reply })
            .map_err(|_| SessionError::RuntimeClosed)?;
        let result = rx.await.map_err(|_| SessionError::RuntimeClosed)?;
        result.map_err(SessionError::from)
    }
}

/// Spawn the runtime task for `session` and return a handle to it
///
/// The task stops once every handle is dropped and no request is in flight.
pub fn start(
    session: Session,
    backend: Arc<dyn Backend>,
    downloads: Arc<dyn DownloadSink>,
) -> SessionHandle {
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);

    let runtime = SessionRuntime::new(
        session,
        Arc::clone(&backend),
        downloads,
        request_rx,
        request_tx.downgrade(),
        broadcast_tx.clone(),
    );
    tokio::spawn(runtime.run());

    SessionHandle {
        request_tx,
        broadcast_tx,
        backend,
    }
}
