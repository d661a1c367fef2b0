// ABOUTME: Sequential step orchestration with retries, polling, and checkpoints.
// ABOUTME: Resumes from the persisted cursor after a restart.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::error::{RunError, StepError, StepErrorKind};
use super::poller::{AsyncPoller, DEFAULT_POLL_INTERVAL, Tick};
use super::step::{Step, StepPhase};
use crate::context::{ContextStore, ExecutionContext};

/// Bounded re-invocation of steps that report RETRY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total invocations allowed per step, the first one included.
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Done,
    Failed,
}

/// Terminal state of a run plus its last human-readable error.
#[derive(Debug)]
pub struct RunOutcome {
    pub state: RunState,
    pub error: Option<RunError>,
}

impl RunOutcome {
    fn done() -> Self {
        Self {
            state: RunState::Done,
            error: None,
        }
    }

    fn failed(error: RunError) -> Self {
        Self {
            state: RunState::Failed,
            error: Some(error),
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == RunState::Done
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

/// Executes a fixed sequence of steps, one at a time.
pub struct StepRunner {
    steps: Vec<Box<dyn Step>>,
    store: Arc<dyn ContextStore>,
    retry: RetryPolicy,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl StepRunner {
    pub fn new(steps: Vec<Box<dyn Step>>, store: Arc<dyn ContextStore>) -> Self {
        Self {
            steps,
            store,
            retry: RetryPolicy::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts the run at the next step boundary or poll tick.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run from the context's cursor to a terminal state.
    pub async fn run(&self, ctx: &mut ExecutionContext) -> RunOutcome {
        let outcome = match self.run_steps(ctx).await {
            Ok(()) => RunOutcome::done(),
            Err(error) => RunOutcome::failed(error),
        };
        ctx.cursor_mut().completed = true;
        if let Err(e) = self.store.save(ctx) {
            tracing::warn!("failed to checkpoint final run state: {}", e);
        }
        outcome
    }

    async fn run_steps(&self, ctx: &mut ExecutionContext) -> Result<(), RunError> {
        let poller = AsyncPoller::new(self.poll_interval, self.cancel.clone());
        while let Some(step) = self.steps.get(ctx.cursor().step) {
            if self.cancel.is_cancelled() {
                step.release_resources(ctx).await;
                return Err(RunError::Aborted {
                    step: step.name().to_string(),
                });
            }
            self.run_step(step.as_ref(), ctx, &poller).await?;
            let cursor = ctx.cursor_mut();
            cursor.step += 1;
            cursor.attempts = 0;
            cursor.polling_since = None;
            self.store.save(ctx)?;
        }
        Ok(())
    }

    async fn run_step(
        &self,
        step: &dyn Step,
        ctx: &mut ExecutionContext,
        poller: &AsyncPoller,
    ) -> Result<(), RunError> {
        let name = step.name().to_string();
        let correlation_id = ctx.correlation_id().to_string();

        loop {
            let capabilities = step.capabilities(ctx);
            let polling = ctx.cursor().polling_since.is_some();

            let result = if polling {
                match poller.tick(step, ctx, capabilities.declared_timeout).await {
                    Tick::Phase(result) => result,
                    Tick::TimedOut { after } => {
                        tracing::error!(
                            %correlation_id,
                            step = %name,
                            "step timed out after {:?}",
                            after
                        );
                        step.release_resources(ctx).await;
                        return Err(RunError::Timeout { step: name, after });
                    }
                    Tick::Aborted => {
                        step.release_resources(ctx).await;
                        return Err(RunError::Aborted { step: name });
                    }
                }
            } else {
                tracing::info!(%correlation_id, step = %name, "executing step");
                step.execute(ctx).await
            };

            let (phase, error) = match result {
                Ok(phase) => (phase, None),
                Err(error) => (error.phase(), Some(error)),
            };

            match phase {
                StepPhase::Done => {
                    tracing::debug!(%correlation_id, step = %name, "step done");
                    return Ok(());
                }
                StepPhase::Poll => {
                    if !capabilities.supports_polling {
                        step.release_resources(ctx).await;
                        let source = StepError::invariant(format!(
                            "step {name} returned POLL but does not support polling"
                        ));
                        return Err(self.fail(step, source));
                    }
                    poller.begin(ctx);
                    self.store.save(ctx)?;
                }
                StepPhase::Retry => {
                    // Re-execution starts over, so the abandoned operation's
                    // local tracking goes away with it.
                    step.release_resources(ctx).await;
                    let cursor = ctx.cursor_mut();
                    cursor.attempts += 1;
                    cursor.polling_since = None;
                    let attempts = cursor.attempts;
                    let source = error.unwrap_or_else(|| {
                        StepError::invariant(format!("step {name} requested a retry"))
                    });
                    if attempts >= self.retry.attempts {
                        tracing::error!(
                            %correlation_id,
                            step = %name,
                            "giving up after {} attempts: {}",
                            attempts,
                            source
                        );
                        return Err(RunError::RetriesExhausted {
                            step: name,
                            message: step.error_message(),
                            attempts,
                            source,
                        });
                    }
                    tracing::warn!(
                        %correlation_id,
                        step = %name,
                        "attempt {} failed, retrying: {}",
                        attempts,
                        source
                    );
                    self.store.save(ctx)?;
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            return Err(RunError::Aborted { step: name });
                        }
                        _ = tokio::time::sleep(self.retry.delay) => {}
                    }
                }
                StepPhase::Failed => {
                    step.release_resources(ctx).await;
                    let source = error.unwrap_or_else(|| {
                        StepError::content(format!("step {name} reported failure"))
                    });
                    return Err(self.fail(step, source));
                }
            }
        }
    }

    fn fail(&self, step: &dyn Step, source: StepError) -> RunError {
        if matches!(
            source.kind(),
            StepErrorKind::Invariant | StepErrorKind::MissingVariable
        ) {
            tracing::error!(step = step.name(), "{}", source);
        } else {
            tracing::warn!(step = step.name(), "{}", source);
        }
        RunError::StepFailed {
            step: step.name().to_string(),
            message: step.error_message(),
            source,
        }
    }
}
