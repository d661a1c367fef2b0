// ABOUTME: Classifies the run as deployment, upgrade, downgrade, or redeployment.
// ABOUTME: Rejects the run when the version rule forbids that transition.

use async_trait::async_trait;
use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::context::variables::{DEPLOYED_MTA, DEPLOYMENT_DESCRIPTOR, DEPLOYMENT_TYPE, VERSION_RULE};
use crate::diagnostics::{Diagnostics, Warning};
use crate::engine::{Step, StepError, StepPhase};
use crate::types::Version;
use crate::version::{check_version, deployment_type};

pub struct DetermineDeploymentTypeStep {
    diagnostics: Arc<Diagnostics>,
}

impl DetermineDeploymentTypeStep {
    pub fn new(diagnostics: Arc<Diagnostics>) -> Self {
        Self { diagnostics }
    }
}

#[async_trait]
impl Step for DetermineDeploymentTypeStep {
    fn name(&self) -> &str {
        "determine-deployment-type"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<StepPhase, StepError> {
        let descriptor = ctx.require(DEPLOYMENT_DESCRIPTOR)?;
        let deployed = ctx.get(DEPLOYED_MTA)?;
        let rule = ctx.get(VERSION_RULE)?.unwrap_or_default();

        let requested = Version::parse(&descriptor.version).map_err(|e| {
            StepError::content(format!(
                "MTA {} has an invalid version {}: {e}",
                descriptor.id, descriptor.version
            ))
        })?;
        let metadata = deployed.as_ref().map(|mta| &mta.metadata);

        let decision = deployment_type(metadata, &requested);
        if decision.rule_ignored {
            self.diagnostics.warn(Warning::version_rule_ignored(format!(
                "deployed version of MTA {} is unknown, ignoring version rule {}",
                descriptor.id, rule
            )));
        }

        let deployment_type = check_version(rule, decision, metadata)?;
        tracing::info!(
            correlation_id = ctx.correlation_id(),
            "MTA {} version {}: {}",
            descriptor.id,
            requested,
            deployment_type
        );
        ctx.set(DEPLOYMENT_TYPE, &deployment_type)?;
        Ok(StepPhase::Done)
    }

    fn error_message(&self) -> String {
        "Error detecting deployment type".to_string()
    }
}
