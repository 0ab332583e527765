//! Request and response types shared by every backend implementation

use crate::session::TranscriptEntry;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Server-side marker for a document whose patient could not be identified
pub const UNKNOWN_PATIENT_ID: &str = "DESCONOCIDO";

/// Extensions the upload endpoint understands
pub const ACCEPTED_EXTENSIONS: &[&str] = &["pdf", "txt"];

/// Payload of a chat call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub chat_history: Vec<TranscriptEntry>,
    pub current_patient_id: Option<String>,
}

/// A document picked for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl DocumentFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a document from disk, named after its final path component
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self { name, bytes })
    }

    /// Whether the upload endpoint accepts this kind of file.
    ///
    /// The session never enforces this; callers decide what to do with
    /// other kinds.
    pub fn is_accepted_kind(&self) -> bool {
        Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                ACCEPTED_EXTENSIONS
                    .iter()
                    .any(|accepted| accepted.eq_ignore_ascii_case(ext))
            })
    }

    pub fn mime_type(&self) -> String {
        mime_guess::from_path(&self.name)
            .first_or_octet_stream()
            .to_string()
    }
}

/// Parsed upload response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub summary_text: String,
    pub analysis_text: String,
    pub bound_record_id: Option<String>,
}

/// Payload of an export call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRequest {
    pub text_content: String,
}

/// Binary document returned by the export endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedDocument {
    /// Suggested name for the saved file
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Patient known to the backend
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PatientSummary {
    pub id: String,
    #[serde(default)]
    pub document_count: usize,
    #[serde(default)]
    pub documents: Vec<String>,
    #[serde(default, rename = "nombre")]
    pub name: Option<String>,
    /// Free-form; the backend stores whatever the document extraction found
    #[serde(default, rename = "edad")]
    pub age: Option<serde_json::Value>,
    #[serde(default, rename = "antecedentes")]
    pub history: Option<String>,
}
