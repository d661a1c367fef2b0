// ABOUTME: Refreshes the service broker a module's application serves, if any.
// ABOUTME: Broker trouble never fails the run; it is reported as a warning.

use async_trait::async_trait;
use std::sync::Arc;

use crate::cluster::{ClusterClient, JobState, OperationalResultExt};
use crate::context::ExecutionContext;
use crate::context::variables::{APP_TO_PROCESS, SERVICE_BROKER_JOB};
use crate::diagnostics::{Diagnostics, Warning};
use crate::engine::{Step, StepCapabilities, StepError, StepPhase};

pub struct UpdateServiceBrokerSubscriberStep {
    cluster: Arc<dyn ClusterClient>,
    diagnostics: Arc<Diagnostics>,
}

impl UpdateServiceBrokerSubscriberStep {
    pub fn new(cluster: Arc<dyn ClusterClient>, diagnostics: Arc<Diagnostics>) -> Self {
        Self {
            cluster,
            diagnostics,
        }
    }

    fn warn(&self, message: String) -> Result<StepPhase, StepError> {
        self.diagnostics.warn(Warning::service_broker(message));
        Ok(StepPhase::Done)
    }
}

#[async_trait]
impl Step for UpdateServiceBrokerSubscriberStep {
    fn name(&self) -> &str {
        "update-service-broker-subscriber"
    }

    fn capabilities(&self, _ctx: &ExecutionContext) -> StepCapabilities {
        StepCapabilities::asynchronous()
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<StepPhase, StepError> {
        let app = ctx.require(APP_TO_PROCESS)?;
        let Some(broker_name) = app.service_broker else {
            return Ok(StepPhase::Done);
        };

        let broker = match self
            .cluster
            .get_service_broker(&broker_name)
            .await
            .context_op("get service broker", &broker_name)
        {
            Ok(Some(broker)) => broker,
            Ok(None) => {
                return self.warn(format!(
                    "service broker {broker_name} of application {} does not exist",
                    app.name
                ));
            }
            Err(e) => return self.warn(e.to_string()),
        };

        // Updating a broker makes the cluster fetch its catalog again, now
        // served by the new application.
        tracing::info!("updating service broker {} for {}", broker.name, app.name);
        match self
            .cluster
            .update_service_broker(&broker)
            .await
            .context_op("update service broker", &broker_name)
        {
            Ok(Some(job)) => {
                ctx.set(SERVICE_BROKER_JOB, &job)?;
                Ok(StepPhase::Poll)
            }
            Ok(None) => Ok(StepPhase::Done),
            Err(e) => self.warn(e.to_string()),
        }
    }

    async fn poll_status(&self, ctx: &mut ExecutionContext) -> Result<StepPhase, StepError> {
        let job_id = ctx.require(SERVICE_BROKER_JOB)?;
        let job = match self
            .cluster
            .get_job(&job_id)
            .await
            .context_op("get job", job_id.as_str())
        {
            Ok(job) => job,
            Err(e) => return self.warn(e.to_string()),
        };
        match job.state {
            JobState::Processing => Ok(StepPhase::Poll),
            JobState::Complete => {
                ctx.remove(SERVICE_BROKER_JOB);
                Ok(StepPhase::Done)
            }
            JobState::Failed => {
                ctx.remove(SERVICE_BROKER_JOB);
                self.warn(format!(
                    "service broker update job {} failed: {}",
                    job.id,
                    job.error.as_deref().unwrap_or("no details")
                ))
            }
        }
    }

    fn error_message(&self) -> String {
        "Error updating service broker".to_string()
    }
}
