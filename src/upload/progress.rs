// ABOUTME: Upload progress as a bounded event stream instead of callbacks.
// ABOUTME: The cluster client produces events; the upload step drains them.

use std::collections::BTreeSet;
use tokio::sync::mpsc;

use crate::cluster::PackageStatus;

/// Buffer size of a single upload's progress stream.
pub const UPLOAD_EVENT_BUFFER: usize = 32;

/// One progress notification of an asynchronous upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    CheckResources,
    MatchedFileNames(BTreeSet<String>),
    ProcessMatchedResources { total_bytes: u64 },
    Progress(PackageStatus),
    Error(String),
}

impl UploadEvent {
    /// READY progress or any error ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadEvent::Progress(PackageStatus::Ready) | UploadEvent::Error(_)
        )
    }
}

/// Producer side handed to the cluster client.
#[derive(Debug, Clone)]
pub struct UploadProgressSender {
    tx: mpsc::Sender<UploadEvent>,
}

impl UploadProgressSender {
    /// Send without blocking the uploader; a full buffer drops the event.
    pub fn emit(&self, event: UploadEvent) {
        if let Err(e) = self.tx.try_send(event) {
            tracing::debug!("dropping upload progress event: {}", e);
        }
    }
}

pub type UploadProgressReceiver = mpsc::Receiver<UploadEvent>;

pub fn progress_channel() -> (UploadProgressSender, UploadProgressReceiver) {
    let (tx, rx) = mpsc::channel(UPLOAD_EVENT_BUFFER);
    (UploadProgressSender { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_and_errors_are_terminal() {
        assert!(UploadEvent::Progress(PackageStatus::Ready).is_terminal());
        assert!(UploadEvent::Error("boom".to_string()).is_terminal());
        assert!(!UploadEvent::Progress(PackageStatus::ProcessingUpload).is_terminal());
        assert!(!UploadEvent::CheckResources.is_terminal());
    }

    #[tokio::test]
    async fn emitted_events_arrive_in_order() {
        let (tx, mut rx) = progress_channel();
        tx.emit(UploadEvent::CheckResources);
        tx.emit(UploadEvent::ProcessMatchedResources { total_bytes: 10 });
        assert_eq!(rx.recv().await, Some(UploadEvent::CheckResources));
        assert_eq!(
            rx.recv().await,
            Some(UploadEvent::ProcessMatchedResources { total_bytes: 10 })
        );
    }
}
