// ABOUTME: Ensures the application of the current module exists on the cluster.
// ABOUTME: Stamps the deploy attributes with the correlation id of the run.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cluster::{ClusterClient, OperationalResultExt};
use crate::context::ExecutionContext;
use crate::context::variables::APP_TO_PROCESS;
use crate::engine::{Step, StepError, StepPhase};
use crate::upload::DeployAttributes;

pub struct CreateOrUpdateApplicationStep {
    cluster: Arc<dyn ClusterClient>,
}

impl CreateOrUpdateApplicationStep {
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self { cluster }
    }
}

#[async_trait]
impl Step for CreateOrUpdateApplicationStep {
    fn name(&self) -> &str {
        "create-or-update-application"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<StepPhase, StepError> {
        let app = ctx.require(APP_TO_PROCESS)?;
        let correlation_id = ctx.correlation_id().to_string();

        match self.cluster.get_application(&app.name).await {
            Ok(existing) => {
                let attributes = DeployAttributes::from_env(&existing.env);
                if attributes.correlation_id() != Some(correlation_id.as_str()) {
                    let env = attributes
                        .with_correlation_id(&correlation_id)
                        .apply_to(&existing.env);
                    self.cluster
                        .update_application_env(&app.name, env)
                        .await
                        .context_op("update environment", &app.name)?;
                }
                tracing::info!("updated application {}", app.name);
            }
            Err(e) if e.is_not_found() => {
                let env = DeployAttributes::default()
                    .with_correlation_id(&correlation_id)
                    .apply_to(&BTreeMap::new());
                self.cluster
                    .create_application(&app.name, env)
                    .await
                    .context_op("create", &app.name)?;
                tracing::info!("created application {}", app.name);
            }
            Err(e) => return Err(e.with_context("get", &app.name).into()),
        }
        Ok(StepPhase::Done)
    }

    fn error_message(&self) -> String {
        "Error creating or updating application".to_string()
    }
}
