//! Download hand-off for exported documents

use crate::backend::ExportedDocument;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Where a document ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedDownload {
    pub file_name: String,
    pub location: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    #[error("Failed to save {file_name}: {message}")]
    Io { file_name: String, message: String },
    #[error("Invalid file name: {0:?}")]
    InvalidName(String),
}

/// Platform file-save collaborator
#[async_trait]
pub trait DownloadSink: Send + Sync {
    async fn save(&self, document: &ExportedDocument) -> Result<SavedDownload, DownloadError>;
}

#[async_trait]
impl<T: DownloadSink + ?Sized> DownloadSink for Arc<T> {
    async fn save(&self, document: &ExportedDocument) -> Result<SavedDownload, DownloadError> {
        (**self).save(document).await
    }
}

/// Saves documents into a directory, never overwriting an existing file
#[derive(Debug, Clone)]
pub struct DirectoryDownloadSink {
    dir: PathBuf,
}

impl DirectoryDownloadSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Candidate names for `file_name`: `name.ext`, then `name-1.ext`, `name-2.ext`, ...
    fn candidates(file_name: &str) -> impl Iterator<Item = String> + '_ {
        let stem = Path::new(file_name)
            .file_stem()
            .map_or_else(|| file_name.to_string(), |s| s.to_string_lossy().into_owned());
        let ext = Path::new(file_name)
            .extension()
            .map(|e| e.to_string_lossy().into_owned());

        std::iter::once(file_name.to_string()).chain((1u32..).map(move |n| match &ext {
            Some(ext) => format!("{stem}-{n}.{ext}"),
            None => format!("{stem}-{n}"),
        }))
    }

    /// Create the first candidate that does not exist yet; never opens an existing file
    async fn create_new_file(&self, file_name: &str) -> std::io::Result<(PathBuf, File)> {
        for name in Self::candidates(file_name) {
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e),
            }
        }
        Err(ErrorKind::AlreadyExists.into())
    }
}

/// Strip any directory components the server may have put in the name
fn sanitize_file_name(file_name: &str) -> Result<String, DownloadError> {
    Path::new(file_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| DownloadError::InvalidName(file_name.to_string()))
}

#[async_trait]
impl DownloadSink for DirectoryDownloadSink {
    async fn save(&self, document: &ExportedDocument) -> Result<SavedDownload, DownloadError> {
        let file_name = sanitize_file_name(&document.file_name)?;
        let io_error = |e: std::io::Error| DownloadError::Io {
            file_name: file_name.clone(),
            message: e.to_string(),
        };

        tokio::fs::create_dir_all(&self.dir).await.map_err(io_error)?;
        let (path, mut file) = self.create_new_file(&file_name).await.map_err(io_error)?;
        file.write_all(&document.bytes).await.map_err(io_error)?;
        file.flush().await.map_err(io_error)?;

        let saved_name = path
            .file_name()
            .map_or_else(|| file_name.clone(), |n| n.to_string_lossy().into_owned());
        tracing::info!(path = %path.display(), bytes = document.bytes.len(), "Saved exported document");

        Ok(SavedDownload {
            file_name: saved_name,
            location: path,
        })
    }
}
