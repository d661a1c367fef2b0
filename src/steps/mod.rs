// ABOUTME: Concrete deployment steps and the collaborators they share.
// ABOUTME: Pipelines assemble them into the deploy and rollback sequences.

mod create_or_update_application;
mod determine_deployment_type;
mod prepare_module;
mod rename_applications;
mod update_service_broker;
mod upload_app;

pub mod pipeline;

pub use create_or_update_application::CreateOrUpdateApplicationStep;
pub use determine_deployment_type::DetermineDeploymentTypeStep;
pub use prepare_module::PrepareModuleStep;
pub use rename_applications::RenameApplicationsStep;
pub use update_service_broker::UpdateServiceBrokerSubscriberStep;
pub use upload_app::UploadAppStep;

use std::sync::Arc;

use crate::cluster::ClusterClient;
use crate::config::UploadConfig;
use crate::diagnostics::Diagnostics;
use crate::files::FileService;
use crate::scheduler::UploadPools;
use crate::upload::UploadRegistry;

/// Everything a step talks to besides the execution context.
///
/// Pools and the upload registry are process-wide; one `StepServices` may
/// back several concurrent runs.
#[derive(Clone)]
pub struct StepServices {
    pub cluster: Arc<dyn ClusterClient>,
    pub files: Arc<dyn FileService>,
    pub pools: Arc<UploadPools>,
    pub uploads: Arc<UploadRegistry>,
    pub diagnostics: Arc<Diagnostics>,
    pub upload: UploadConfig,
}
