// ABOUTME: Selects the next module of the (renamed) descriptor for processing.
// ABOUTME: Clears the per-module variables left behind by the previous module.

use async_trait::async_trait;

use crate::context::ExecutionContext;
use crate::context::variables::{
    APP_CONTENT_CHANGED, APP_TO_PROCESS, DEPLOYMENT_DESCRIPTOR, MODULES_INDEX, SERVICE_BROKER_JOB,
    UPLOAD_TOKEN,
};
use crate::descriptor::AppToProcess;
use crate::engine::{Step, StepError, StepPhase};

pub struct PrepareModuleStep {
    index: usize,
    name: String,
}

impl PrepareModuleStep {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            name: format!("prepare-module-{index}"),
        }
    }
}

#[async_trait]
impl Step for PrepareModuleStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<StepPhase, StepError> {
        let descriptor = ctx.require(DEPLOYMENT_DESCRIPTOR)?;
        let module = descriptor.modules.get(self.index).ok_or_else(|| {
            StepError::invariant(format!(
                "descriptor of MTA {} has no module at index {}",
                descriptor.id, self.index
            ))
        })?;

        let app = AppToProcess::from(module);
        tracing::info!("processing module {} as application {}", app.module_name, app.name);

        ctx.remove(UPLOAD_TOKEN);
        ctx.remove(APP_CONTENT_CHANGED);
        ctx.remove(SERVICE_BROKER_JOB);
        ctx.set(MODULES_INDEX, &self.index)?;
        ctx.set(APP_TO_PROCESS, &app)?;
        Ok(StepPhase::Done)
    }

    fn error_message(&self) -> String {
        format!("Error preparing module {}", self.index)
    }
}
