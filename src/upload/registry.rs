// ABOUTME: Local tracking of in-flight uploads: temp archive plus progress stream.
// ABOUTME: The temp file is deleted as soon as an upload is READY, errors, or is abandoned.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use tempfile::TempPath;
use tokio::sync::mpsc::error::TryRecvError;

use super::progress::{UploadEvent, UploadProgressReceiver};
use crate::types::UploadJobId;

struct TrackedUpload {
    app: String,
    file: TempPath,
    events: UploadProgressReceiver,
}

/// What the progress stream of an upload said since the last look.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadProgress {
    /// No terminal event yet.
    Pending,
    Ready,
    Failed(String),
    /// Nothing is tracked under this job; it finished earlier or the
    /// process restarted since the upload began.
    Untracked,
}

/// Uploads started by this process, keyed by upload job.
#[derive(Default)]
pub struct UploadRegistry {
    uploads: Mutex<HashMap<UploadJobId, TrackedUpload>>,
}

impl UploadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        job: UploadJobId,
        app: impl Into<String>,
        file: TempPath,
        events: UploadProgressReceiver,
    ) {
        let app = app.into();
        tracing::debug!(%job, %app, file = %file.display(), "tracking upload");
        self.uploads
            .lock()
            .insert(job, TrackedUpload { app, file, events });
    }

    pub fn is_tracked(&self, job: &UploadJobId) -> bool {
        self.uploads.lock().contains_key(job)
    }

    /// Local archive of a tracked upload.
    pub fn file_of(&self, job: &UploadJobId) -> Option<PathBuf> {
        self.uploads.lock().get(job).map(|u| u.file.to_path_buf())
    }

    /// Consume the events received so far.
    ///
    /// READY progress or an error ends tracking and deletes the temp archive.
    pub fn drain(&self, job: &UploadJobId) -> UploadProgress {
        let mut uploads = self.uploads.lock();
        let Some(upload) = uploads.get_mut(job) else {
            return UploadProgress::Untracked;
        };

        let outcome = loop {
            match upload.events.try_recv() {
                Ok(event) if event.is_terminal() => {
                    log_event(&upload.app, &event);
                    match event {
                        UploadEvent::Error(message) => break UploadProgress::Failed(message),
                        _ => break UploadProgress::Ready,
                    }
                }
                Ok(event) => log_event(&upload.app, &event),
                Err(TryRecvError::Empty) => break UploadProgress::Pending,
                // The uploader went away without a verdict; the package status decides.
                Err(TryRecvError::Disconnected) => break UploadProgress::Pending,
            }
        };

        if outcome != UploadProgress::Pending {
            if let Some(upload) = uploads.remove(job) {
                delete(job, upload);
            }
        }
        outcome
    }

    /// Stop tracking an upload and delete its temp archive.
    pub fn release(&self, job: &UploadJobId) {
        let removed = self.uploads.lock().remove(job);
        if let Some(upload) = removed {
            delete(job, upload);
        }
    }

    pub fn len(&self) -> usize {
        self.uploads.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.uploads.lock().is_empty()
    }
}

fn log_event(app: &str, event: &UploadEvent) {
    match event {
        UploadEvent::CheckResources => tracing::debug!(app, "checking resources"),
        UploadEvent::MatchedFileNames(names) => {
            tracing::debug!(app, matched = names.len(), "matched files")
        }
        UploadEvent::ProcessMatchedResources { total_bytes } => {
            tracing::debug!(app, total_bytes, "processing matched resources")
        }
        UploadEvent::Progress(status) => tracing::debug!(app, %status, "upload progress"),
        UploadEvent::Error(message) => tracing::warn!(app, "upload error: {}", message),
    }
}

fn delete(job: &UploadJobId, upload: TrackedUpload) {
    let path = upload.file.to_path_buf();
    match upload.file.close() {
        Ok(()) => tracing::debug!(%job, path = %path.display(), "deleted upload archive"),
        Err(e) => tracing::warn!("failed to delete upload archive {}: {}", path.display(), e),
    }
}
