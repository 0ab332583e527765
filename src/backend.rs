//! Backend abstraction
//!
//! The assistant service is reached only through [`Backend`]. The HTTP
//! implementation lives in [`http`]; tests substitute mocks.

mod error;
pub mod http;
mod types;

pub use error::{BackendError, BackendErrorKind};
pub use http::HttpBackend;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Operations the assistant service offers
#[async_trait]
pub trait Backend: Send + Sync {
    /// Send a chat turn; returns the assistant's reply text
    async fn chat(&self, request: &ChatRequest) -> Result<String, BackendError>;

    /// Upload a document for processing
    async fn upload(&self, file: &DocumentFile) -> Result<UploadResult, BackendError>;

    /// Render text into a downloadable document
    async fn export(&self, request: &ExportRequest) -> Result<ExportedDocument, BackendError>;

    /// Patients the service has documents for
    async fn list_patients(&self) -> Result<Vec<PatientSummary>, BackendError>;

    /// Make `patient_id` the service's active patient; returns its confirmation text
    async fn switch_patient(&self, patient_id: &str) -> Result<String, BackendError>;

    /// Drop the service's active patient; returns its confirmation text
    async fn reset_context(&self) -> Result<String, BackendError>;
}

#[async_trait]
impl<T: Backend + ?Sized> Backend for Arc<T> {
    async fn chat(&self, request: &ChatRequest) -> Result<String, BackendError> {
        (**self).chat(request).await
    }

    async fn upload(&self, file: &DocumentFile) -> Result<UploadResult, BackendError> {
        (**self).upload(file).await
    }

    async fn export(&self, request: &ExportRequest) -> Result<ExportedDocument, BackendError> {
        (**self).export(request).await
    }

    async fn list_patients(&self) -> Result<Vec<PatientSummary>, BackendError> {
        (**self).list_patients().await
    }

    async fn switch_patient(&self, patient_id: &str) -> Result<String, BackendError> {
        (**self).switch_patient(patient_id).await
    }

    async fn reset_context(&self) -> Result<String, BackendError> {
        (**self).reset_context().await
    }
}

/// Logging wrapper for backends
pub struct LoggingBackend<B> {
    inner: B,
}

impl<B: Backend> LoggingBackend<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }
}

fn log_outcome<T>(operation: &'static str, started: std::time::Instant, result: &Result<T, BackendError>) {
    let duration_ms = started.elapsed().as_millis();
    match result {
        Ok(_) => {
            tracing::info!(operation, duration_ms = %duration_ms, "Backend request completed");
        }
        Err(e) => {
            tracing::error!(
                operation,
                duration_ms = %duration_ms,
                error = %e.message,
                transport = e.is_transport(),
                "Backend request failed"
            );
        }
    }
}

#[async_trait]
impl<B: Backend> Backend for LoggingBackend<B> {
    async fn chat(&self, request: &ChatRequest) -> Result<String, BackendError> {
        let started = std::time::Instant::now();
        tracing::debug!(
            history_len = request.chat_history.len(),
            patient_id = ?request.current_patient_id,
            "Sending chat request"
        );
        let result = self.inner.chat(request).await;
        log_outcome("chat", started, &result);
        result
    }

    async fn upload(&self, file: &DocumentFile) -> Result<UploadResult, BackendError> {
        let started = std::time::Instant::now();
        tracing::debug!(file = %file.name, bytes = file.bytes.len(), "Uploading document");
        let result = self.inner.upload(file).await;
        log_outcome("upload", started, &result);
        result
    }

    async fn export(&self, request: &ExportRequest) -> Result<ExportedDocument, BackendError> {
        let started = std::time::Instant::now();
        let result = self.inner.export(request).await;
        log_outcome("export", started, &result);
        result
    }

    async fn list_patients(&self) -> Result<Vec<PatientSummary>, BackendError> {
        let started = std::time::Instant::now();
        let result = self.inner.list_patients().await;
        log_outcome("list_patients", started, &result);
        result
    }

    async fn switch_patient(&self, patient_id: &str) -> Result<String, BackendError> {
        let started = std::time::Instant::now();
        let result = self.inner.switch_patient(patient_id).await;
        log_outcome("switch_patient", started, &result);
        result
    }

    async fn reset_context(&self) -> Result<String, BackendError> {
        let started = std::time::Instant::now();
        let result = self.inner.reset_context().await;
        log_outcome("reset_context", started, &result);
        result
    }
}
