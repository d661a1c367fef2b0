// ABOUTME: The unit of work: one interface, capability flags instead of subclasses.
// ABOUTME: Steps mutate the execution context and report a phase.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::StepError;
use crate::context::ExecutionContext;

/// What a step asks the runner to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepPhase {
    /// Logically complete; proceed to the next step.
    Done,
    /// An out-of-band operation is running; poll again on the next tick.
    Poll,
    /// Recoverable failure; re-invoke within the retry budget.
    Retry,
    /// Non-recoverable; abort the run.
    Failed,
}

impl StepPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, StepPhase::Done | StepPhase::Failed)
    }
}

/// How the runner has to drive a step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepCapabilities {
    pub supports_polling: bool,
    /// Wall-clock budget measured from the first POLL.
    pub declared_timeout: Option<Duration>,
}

impl StepCapabilities {
    pub fn synchronous() -> Self {
        Self::default()
    }

    pub fn asynchronous() -> Self {
        Self {
            supports_polling: true,
            declared_timeout: None,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            supports_polling: true,
            declared_timeout: Some(timeout),
        }
    }
}

/// A discrete, independently retriable operation of a deployment run.
///
/// Synchronous steps return DONE or an error from `execute`. Asynchronous
/// steps return POLL after starting remote work and are then driven through
/// `poll_status` until a terminal phase or their declared timeout.
///
/// Re-invoking `execute` after RETRY must not duplicate remote side effects
/// that can be detected by identity.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    /// Capabilities may depend on the context, e.g. per-application timeouts.
    fn capabilities(&self, _ctx: &ExecutionContext) -> StepCapabilities {
        StepCapabilities::synchronous()
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<StepPhase, StepError>;

    async fn poll_status(&self, _ctx: &mut ExecutionContext) -> Result<StepPhase, StepError> {
        Err(StepError::invariant(format!(
            "step {} does not support polling",
            self.name()
        )))
    }

    /// Drop local resources held for an operation that will not be polled again.
    async fn release_resources(&self, _ctx: &mut ExecutionContext) {}

    /// Human-readable prefix for failures of this step.
    fn error_message(&self) -> String {
        format!("Error executing step {}", self.name())
    }
}
