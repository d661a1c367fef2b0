// ABOUTME: Step execution core: phases, steps, polling, and the sequential runner.
// ABOUTME: Failures are classified into RETRY or FAILED before they reach the run.

mod error;
mod poller;
mod runner;
mod step;

pub use error::{RunError, RunErrorKind, StepError, StepErrorKind};
pub use poller::{AsyncPoller, DEFAULT_POLL_INTERVAL, Tick};
pub use runner::{RetryPolicy, RunOutcome, RunState, StepRunner};
pub use step::{Step, StepCapabilities, StepPhase};
