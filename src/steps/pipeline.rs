// ABOUTME: Assembles the deploy and rollback step sequences and seeds their context.
// ABOUTME: Also derives the deployed/backup MTA snapshots a finished run leaves behind.

use chrono::Utc;

use super::{
    CreateOrUpdateApplicationStep, DetermineDeploymentTypeStep, PrepareModuleStep,
    RenameApplicationsStep, StepServices, UpdateServiceBrokerSubscriberStep, UploadAppStep,
};
use crate::context::variables::{
    APP_ARCHIVE_ID, BACKUP_MTA, DEPLOYED_MTA, DEPLOYMENT_DESCRIPTOR,
    KEEP_ORIGINAL_NAMES_AFTER_DEPLOY, MTA_ARCHIVE_ELEMENTS, PROCESS_TYPE, ProcessType,
    SPACE_GUID, VERSION_RULE,
};
use crate::context::{ContextError, ExecutionContext};
use crate::descriptor::DeploymentDescriptor;
use crate::engine::Step;
use crate::mta::{DeployedMta, DeployedMtaApplication, MtaMetadata, ProductizationState};
use crate::types::{ArchiveId, ProcessId, SpaceId};
use crate::version::VersionRule;

/// Version gate, naming, then per module: prepare, create, upload, broker.
pub fn deployment_steps(
    services: &StepServices,
    descriptor: &DeploymentDescriptor,
) -> Vec<Box<dyn Step>> {
    let mut steps: Vec<Box<dyn Step>> = vec![
        Box::new(DetermineDeploymentTypeStep::new(
            services.diagnostics.clone(),
        )),
        Box::new(RenameApplicationsStep::new(
            services.cluster.clone(),
            services.diagnostics.clone(),
        )),
    ];
    for index in 0..descriptor.modules.len() {
        steps.push(Box::new(PrepareModuleStep::new(index)));
        steps.push(Box::new(CreateOrUpdateApplicationStep::new(
            services.cluster.clone(),
        )));
        steps.push(Box::new(UploadAppStep::new(services.clone())));
        steps.push(Box::new(UpdateServiceBrokerSubscriberStep::new(
            services.cluster.clone(),
            services.diagnostics.clone(),
        )));
    }
    steps
}

pub fn rollback_steps(services: &StepServices) -> Vec<Box<dyn Step>> {
    vec![Box::new(RenameApplicationsStep::new(
        services.cluster.clone(),
        services.diagnostics.clone(),
    ))]
}

/// Everything a run needs in its context before the first step.
#[derive(Debug, Clone)]
pub struct RunInputs {
    pub process_type: ProcessType,
    pub descriptor: DeploymentDescriptor,
    pub deployed: Option<DeployedMta>,
    pub backup: Option<DeployedMta>,
    pub version_rule: VersionRule,
    pub keep_original_names: bool,
    pub space: SpaceId,
    pub archive: Option<ArchiveId>,
}

impl RunInputs {
    pub fn context(&self, process_id: ProcessId) -> Result<ExecutionContext, ContextError> {
        let mut ctx = ExecutionContext::new(process_id);
        ctx.set(PROCESS_TYPE, &self.process_type)?;
        ctx.set(DEPLOYMENT_DESCRIPTOR, &self.descriptor)?;
        ctx.set(MTA_ARCHIVE_ELEMENTS, &self.descriptor.archive_elements())?;
        ctx.set_opt(DEPLOYED_MTA, self.deployed.as_ref())?;
        ctx.set_opt(BACKUP_MTA, self.backup.as_ref())?;
        ctx.set(VERSION_RULE, &self.version_rule)?;
        ctx.set(KEEP_ORIGINAL_NAMES_AFTER_DEPLOY, &self.keep_original_names)?;
        ctx.set(SPACE_GUID, &self.space)?;
        ctx.set_opt(APP_ARCHIVE_ID, self.archive.as_ref())?;
        Ok(ctx)
    }
}

/// Deployed and backup MTA after a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultingMtas {
    pub deployed: Option<DeployedMta>,
    pub backup: Option<DeployedMta>,
}

/// A deployment makes the renamed descriptor's applications the deployed
/// MTA; a rollback makes the restored backup the deployed MTA.
pub fn resulting_mtas(ctx: &ExecutionContext) -> Result<ResultingMtas, ContextError> {
    let backup = ctx.get(BACKUP_MTA)?;
    match ctx.get(PROCESS_TYPE)?.unwrap_or_default() {
        ProcessType::Rollback => Ok(ResultingMtas {
            deployed: backup,
            backup: None,
        }),
        ProcessType::Deploy => {
            let descriptor = ctx.require(DEPLOYMENT_DESCRIPTOR)?;
            let now = Utc::now();
            let applications = descriptor
                .modules
                .iter()
                .map(|module| DeployedMtaApplication {
                    name: module.app_name().to_string(),
                    module_name: module.name.clone(),
                    created_at: now,
                    correlation_id: Some(ctx.correlation_id().to_string()),
                    productization_state: ProductizationState::Live,
                })
                .collect();
            Ok(ResultingMtas {
                deployed: Some(DeployedMta {
                    metadata: MtaMetadata {
                        id: descriptor.id,
                        version: Some(descriptor.version),
                    },
                    applications,
                }),
                backup,
            })
        }
    }
}
