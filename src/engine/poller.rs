// ABOUTME: Drives POLL-phase steps on a fixed interval.
// ABOUTME: Tracks the timeout from the persisted first-POLL instant; honors abort.

use chrono::Utc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::error::StepError;
use super::step::{Step, StepPhase};
use crate::context::ExecutionContext;

/// Default interval between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Result of one poll tick.
#[derive(Debug)]
pub enum Tick {
    Phase(Result<StepPhase, StepError>),
    TimedOut { after: Duration },
    Aborted,
}

#[derive(Debug, Clone)]
pub struct AsyncPoller {
    interval: Duration,
    cancel: CancellationToken,
}

impl AsyncPoller {
    pub fn new(interval: Duration, cancel: CancellationToken) -> Self {
        Self { interval, cancel }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Mark the start of polling unless a resumed run already recorded it.
    pub fn begin(&self, ctx: &mut ExecutionContext) {
        let cursor = ctx.cursor_mut();
        if cursor.polling_since.is_none() {
            cursor.polling_since = Some(Utc::now());
        }
    }

    /// Wall-clock time spent polling the current step.
    pub fn elapsed(&self, ctx: &ExecutionContext) -> Duration {
        ctx.cursor()
            .polling_since
            .and_then(|since| (Utc::now() - since).to_std().ok())
            .unwrap_or_default()
    }

    /// Wait for the next tick, then poll once.
    ///
    /// The timeout is checked before the step is invoked, so a step is never
    /// polled after its budget ran out.
    pub async fn tick(
        &self,
        step: &dyn Step,
        ctx: &mut ExecutionContext,
        timeout: Option<Duration>,
    ) -> Tick {
        tokio::select! {
            _ = self.cancel.cancelled() => return Tick::Aborted,
            _ = tokio::time::sleep(self.interval) => {}
        }

        if let Some(timeout) = timeout {
            let elapsed = self.elapsed(ctx);
            if elapsed >= timeout {
                return Tick::TimedOut { after: elapsed };
            }
        }

        tracing::debug!(step = step.name(), "polling step status");
        Tick::Phase(step.poll_status(ctx).await)
    }
}
