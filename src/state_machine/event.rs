//! Events that drive the session

use crate::backend::{BackendError, DocumentFile, UploadResult};
use crate::download::{DownloadError, SavedDownload};
use thiserror::Error;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    SendMessage {
        text: String,
    },
    UploadDocument {
        file: DocumentFile,
    },
    ExportLastReply,
    SwitchPatient {
        patient_id: String,
    },
    ResetContext,

    // Settlement events
    ChatSettled {
        result: Result<String, BackendError>,
    },
    UploadSettled {
        result: Result<UploadResult, BackendError>,
    },
    ExportSettled {
        result: Result<SavedDownload, ExportFailure>,
    },
    SwitchPatientSettled {
        result: Result<String, BackendError>,
    },
    ResetContextSettled {
        result: Result<String, BackendError>,
    },
}

impl Event {
    pub fn is_settlement(&self) -> bool {
        matches!(
            self,
            Event::ChatSettled { .. }
                | Event::UploadSettled { .. }
                | Event::ExportSettled { .. }
                | Event::SwitchPatientSettled { .. }
                | Event::ResetContextSettled { .. }
        )
    }
}

/// Why an export did not reach the user
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportFailure {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Download(#[from] DownloadError),
}
