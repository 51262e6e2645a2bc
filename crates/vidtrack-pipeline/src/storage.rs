//! Directory layout for uploads, tracker runs, and final outputs.
//!
//! # Design
//! - Paths are derived from the job identifier alone, so every stage can
//!   recompute them without shared state.
//! - Uploads are streamed to disk chunk by chunk and never rewritten.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;
use vidtrack_config::StorageConfig;

use crate::error::{PipelineError, PipelineResult};

/// Identifier tying an upload to its run directory and final output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for JobId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, formatter)
    }
}

/// Raw upload persisted for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    /// Job the upload belongs to.
    pub job_id: JobId,
    /// Location of the persisted bytes.
    pub path: PathBuf,
    /// Number of bytes written.
    pub bytes: u64,
}

/// Resolved storage directories.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    uploads: PathBuf,
    outputs: PathBuf,
    runs: PathBuf,
    extension: String,
}

impl StorageLayout {
    /// Resolve directories from configuration without touching the filesystem.
    #[must_use]
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            uploads: config.uploads_path(),
            outputs: config.outputs_path(),
            runs: config.runs_path(),
            extension: config.container_extension.trim_start_matches('.').to_string(),
        }
    }

    /// Resolve directories and create any that are missing.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Io`] when a directory cannot be created.
    pub async fn prepare(config: &StorageConfig) -> PipelineResult<Self> {
        let layout = Self::from_config(config);
        for dir in [&layout.uploads, &layout.outputs, &layout.runs] {
            fs::create_dir_all(dir)
                .await
                .map_err(|source| PipelineError::io("storage.prepare", dir, source))?;
        }
        debug!(
            uploads = %layout.uploads.display(),
            outputs = %layout.outputs.display(),
            runs = %layout.runs.display(),
            "storage layout ready"
        );
        Ok(layout)
    }

    /// Allocate a new job identifier.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn allocate(&self) -> JobId {
        JobId::new()
    }

    /// Where the raw upload for `id` lives.
    #[must_use]
    pub fn upload_path(&self, id: JobId) -> PathBuf {
        self.uploads.join(self.file_name(id))
    }

    /// Where the final output for `id` lives.
    #[must_use]
    pub fn output_path(&self, id: JobId) -> PathBuf {
        self.outputs.join(self.file_name(id))
    }

    /// File name shared by the upload and the output of `id`.
    #[must_use]
    pub fn file_name(&self, id: JobId) -> String {
        format!("{id}.{}", self.extension)
    }

    /// Upload directory.
    #[must_use]
    pub fn uploads_dir(&self) -> &Path {
        &self.uploads
    }

    /// Output directory.
    #[must_use]
    pub fn outputs_dir(&self) -> &Path {
        &self.outputs
    }

    /// Scratch base handed to the tracker.
    #[must_use]
    pub fn runs_dir(&self) -> &Path {
        &self.runs
    }

    /// Open the upload file for `id` for chunked writing.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Io`] when the file cannot be created.
    pub async fn begin_upload(&self, id: JobId) -> PipelineResult<UploadSink> {
        let path = self.upload_path(id);
        let file = File::create(&path)
            .await
            .map_err(|source| PipelineError::io("storage.upload_create", &path, source))?;
        Ok(UploadSink {
            job_id: id,
            path,
            file,
            bytes: 0,
        })
    }

    /// Copy an existing local video into the upload slot for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Io`] when the copy fails and
    /// [`PipelineError::EmptyUpload`] when the source is empty.
    pub async fn import_file(&self, id: JobId, source: &Path) -> PipelineResult<UploadRecord> {
        let path = self.upload_path(id);
        let bytes = fs::copy(source, &path)
            .await
            .map_err(|err| PipelineError::io("storage.import", source, err))?;
        if bytes == 0 {
            discard_empty(&path).await;
            return Err(PipelineError::EmptyUpload { path });
        }
        Ok(UploadRecord {
            job_id: id,
            path,
            bytes,
        })
    }
}

/// Open upload file receiving streamed chunks.
#[derive(Debug)]
pub struct UploadSink {
    job_id: JobId,
    path: PathBuf,
    file: File,
    bytes: u64,
}

impl UploadSink {
    /// Append one chunk.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Io`] when the write fails.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> PipelineResult<()> {
        self.file
            .write_all(chunk)
            .await
            .map_err(|source| PipelineError::io("storage.upload_write", &self.path, source))?;
        self.bytes += chunk.len() as u64;
        Ok(())
    }

    /// Bytes written so far.
    #[must_use]
    pub const fn bytes_written(&self) -> u64 {
        self.bytes
    }

    /// Flush and close the file.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyUpload`] when no bytes were written and
    /// [`PipelineError::Io`] when flushing fails.
    pub async fn finish(mut self) -> PipelineResult<UploadRecord> {
        self.file
            .flush()
            .await
            .map_err(|source| PipelineError::io("storage.upload_flush", &self.path, source))?;
        drop(self.file);
        if self.bytes == 0 {
            discard_empty(&self.path).await;
            return Err(PipelineError::EmptyUpload { path: self.path });
        }
        Ok(UploadRecord {
            job_id: self.job_id,
            path: self.path,
            bytes: self.bytes,
        })
    }
}

async fn discard_empty(path: &Path) {
    if let Err(err) = fs::remove_file(path).await {
        warn!(error = %err, path = %path.display(), "failed to remove empty upload");
    }
}
