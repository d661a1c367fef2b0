// ABOUTME: Step failure taxonomy and the run-level error.
// ABOUTME: StepError classifies into RETRY/FAILED; RunError uses the SNAFU pattern.

use snafu::Snafu;
use std::time::Duration;
use thiserror::Error;

use super::step::StepPhase;
use crate::cluster::OperationalError;
use crate::context::{ContextError, StoreError};
use crate::files::FileError;
use crate::scheduler::PoolError;

/// Failure raised by a single step invocation.
#[derive(Debug, Error)]
pub enum StepError {
    /// User-actionable problem with the deployment request.
    #[error("{0}")]
    Content(String),

    #[error(transparent)]
    Operational(#[from] OperationalError),

    /// Programming or configuration defect.
    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error(transparent)]
    Context(#[from] ContextError),

    /// A local worker pool refused the work.
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    File(#[from] FileError),

    #[error("upload failed: {0}")]
    UploadFailed(String),
}

/// Coarse category of a step failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepErrorKind {
    Content,
    Operational,
    Invariant,
    MissingVariable,
    LocalResource,
    Upload,
}

impl StepError {
    pub fn content(message: impl Into<String>) -> Self {
        StepError::Content(message.into())
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        StepError::Invariant(message.into())
    }

    pub fn kind(&self) -> StepErrorKind {
        match self {
            StepError::Content(_) => StepErrorKind::Content,
            StepError::Operational(_) => StepErrorKind::Operational,
            StepError::Invariant(_) => StepErrorKind::Invariant,
            StepError::Context(ContextError::Missing(_)) => StepErrorKind::MissingVariable,
            StepError::Context(ContextError::Malformed { .. }) => StepErrorKind::Invariant,
            StepError::Pool(_) | StepError::File(_) => StepErrorKind::LocalResource,
            StepError::UploadFailed(_) => StepErrorKind::Upload,
        }
    }

    /// The phase this failure downgrades the step to.
    pub fn phase(&self) -> StepPhase {
        match self {
            StepError::Operational(e) if e.is_transient() => StepPhase::Retry,
            StepError::Pool(e) if e.is_rejection() => StepPhase::Retry,
            StepError::File(e) if e.is_io() => StepPhase::Retry,
            _ => StepPhase::Failed,
        }
    }
}

/// Terminal failure of a run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RunError {
    #[snafu(display("{message}: {source}"))]
    StepFailed {
        step: String,
        message: String,
        source: StepError,
    },

    #[snafu(display("{message}: gave up after {attempts} attempts: {source}"))]
    RetriesExhausted {
        step: String,
        message: String,
        attempts: u32,
        source: StepError,
    },

    #[snafu(display("step {step} did not finish within {after:?}"))]
    Timeout { step: String, after: Duration },

    #[snafu(display("run aborted during step {step}"))]
    Aborted { step: String },

    #[snafu(display("failed to checkpoint execution context: {source}"))]
    Checkpoint { source: StoreError },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunErrorKind {
    /// The request itself is wrong; retrying will not help.
    Content,
    /// The cluster rejected an operation.
    Operational,
    /// An asynchronous step exceeded its budget.
    Timeout,
    /// Defect in configuration or step wiring.
    Invariant,
    /// Local resources (pools, files) were unavailable.
    LocalResource,
    /// An upload ended in an error.
    Upload,
    /// Transient failures outlasted the retry budget.
    RetriesExhausted,
    /// Cancelled from outside.
    Aborted,
    /// The context could not be persisted.
    Checkpoint,
}

impl RunError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> RunErrorKind {
        match self {
            RunError::StepFailed { source, .. } => match source.kind() {
                StepErrorKind::Content => RunErrorKind::Content,
                StepErrorKind::Operational => RunErrorKind::Operational,
                StepErrorKind::Invariant | StepErrorKind::MissingVariable => {
                    RunErrorKind::Invariant
                }
                StepErrorKind::LocalResource => RunErrorKind::LocalResource,
                StepErrorKind::Upload => RunErrorKind::Upload,
            },
            RunError::RetriesExhausted { .. } => RunErrorKind::RetriesExhausted,
            RunError::Timeout { .. } => RunErrorKind::Timeout,
            RunError::Aborted { .. } => RunErrorKind::Aborted,
            RunError::Checkpoint { .. } => RunErrorKind::Checkpoint,
        }
    }

    /// Name of the step the run stopped at, if any.
    pub fn step(&self) -> Option<&str> {
        match self {
            RunError::StepFailed { step, .. }
            | RunError::RetriesExhausted { step, .. }
            | RunError::Timeout { step, .. }
            | RunError::Aborted { step } => Some(step),
            RunError::Checkpoint { .. } => None,
        }
    }
}

impl From<StoreError> for RunError {
    fn from(source: StoreError) -> Self {
        RunError::Checkpoint { source }
    }
}
