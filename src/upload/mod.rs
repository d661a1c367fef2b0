// ABOUTME: Application upload support: decision engine, progress stream, tracking.
// ABOUTME: Used by the upload step to avoid redundant uploads and clean up temp archives.

mod attributes;
mod decision;
mod progress;
mod registry;
mod staging;
mod token;

pub use attributes::{ATTR_APP_CONTENT_DIGEST, ATTR_CORRELATION_ID, DeployAttributes};
pub use decision::{UploadDecision, UploadDecisionEngine};
pub use progress::{
    UPLOAD_EVENT_BUFFER, UploadEvent, UploadProgressReceiver, UploadProgressSender,
    progress_channel,
};
pub use registry::{UploadProgress, UploadRegistry};
pub use staging::ApplicationStager;
pub use token::UploadToken;
