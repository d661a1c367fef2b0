// ABOUTME: Catalog of every execution-context variable used by the steps.
// ABOUTME: Names are stable because they end up in persisted checkpoints.

use serde::{Deserialize, Serialize};

use super::Variable;
use crate::bluegreen::ApplicationColor;
use crate::descriptor::{AppToProcess, DeploymentDescriptor, MtaArchiveElements};
use crate::mta::DeployedMta;
use crate::types::{ArchiveId, JobId, SpaceId};
use crate::upload::UploadToken;
use crate::version::{DeploymentType, VersionRule};

/// What kind of run this is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessType {
    #[default]
    Deploy,
    Rollback,
}

pub const PROCESS_TYPE: Variable<ProcessType> = Variable::new("processType");

// Inputs
pub const DEPLOYMENT_DESCRIPTOR: Variable<DeploymentDescriptor> =
    Variable::new("deploymentDescriptor");
pub const DEPLOYED_MTA: Variable<DeployedMta> = Variable::new("deployedMta");
pub const BACKUP_MTA: Variable<DeployedMta> = Variable::new("backupMta");
pub const VERSION_RULE: Variable<VersionRule> = Variable::new("versionRule");
pub const KEEP_ORIGINAL_NAMES_AFTER_DEPLOY: Variable<bool> =
    Variable::new("keepOriginalAppNamesAfterDeploy");
pub const SPACE_GUID: Variable<SpaceId> = Variable::new("spaceGuid");
pub const APP_ARCHIVE_ID: Variable<ArchiveId> = Variable::new("appArchiveId");
pub const MTA_ARCHIVE_ELEMENTS: Variable<MtaArchiveElements> = Variable::new("mtaArchiveElements");

// Version gate
pub const DEPLOYMENT_TYPE: Variable<DeploymentType> = Variable::new("deploymentType");

// Rename flows
pub const APPS_TO_RENAME: Variable<Vec<String>> = Variable::new("appsToRename");
pub const IDLE_COLOR: Variable<ApplicationColor> = Variable::new("idleMtaColor");
pub const LIVE_COLOR: Variable<ApplicationColor> = Variable::new("liveMtaColor");

// Per-module processing
pub const MODULES_INDEX: Variable<usize> = Variable::new("modulesIndex");
pub const APP_TO_PROCESS: Variable<AppToProcess> = Variable::new("appToProcess");
pub const UPLOAD_TOKEN: Variable<UploadToken> = Variable::new("uploadToken");
pub const APP_CONTENT_CHANGED: Variable<bool> = Variable::new("appContentChanged");
pub const SERVICE_BROKER_JOB: Variable<JobId> = Variable::new("serviceBrokerJob");
