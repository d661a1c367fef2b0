// ABOUTME: Remote cluster domain types: applications, packages, builds, brokers.
// ABOUTME: Owned by the platform; the engine only holds immutable snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{AppGuid, JobId, PackageGuid};

/// Env key holding the JSON-encoded deploy attributes of an application.
pub const ENV_DEPLOY_ATTRIBUTES: &str = "DEPLOY_ATTRIBUTES";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudApplication {
    pub name: String,
    pub guid: AppGuid,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of an uploaded package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PackageStatus {
    AwaitingUpload,
    ProcessingUpload,
    Ready,
    Staged,
    Failed,
    Expired,
}

impl PackageStatus {
    /// Whether an unused package in this state can stand in for a new upload.
    pub fn is_valid_for_reuse(self) -> bool {
        !matches!(
            self,
            PackageStatus::Expired | PackageStatus::Failed | PackageStatus::AwaitingUpload
        )
    }

    pub fn is_ready(self) -> bool {
        matches!(self, PackageStatus::Ready | PackageStatus::Staged)
    }

    pub fn is_failed(self) -> bool {
        matches!(self, PackageStatus::Failed | PackageStatus::Expired)
    }
}

impl std::fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PackageStatus::AwaitingUpload => "AWAITING_UPLOAD",
            PackageStatus::ProcessingUpload => "PROCESSING_UPLOAD",
            PackageStatus::Ready => "READY",
            PackageStatus::Staged => "STAGED",
            PackageStatus::Failed => "FAILED",
            PackageStatus::Expired => "EXPIRED",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudPackage {
    pub guid: PackageGuid,
    pub app_guid: AppGuid,
    pub status: PackageStatus,
    pub created_at: DateTime<Utc>,
    /// Whether a droplet was already staged from this package.
    #[serde(default)]
    pub used: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildState {
    Staging,
    Staged,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudBuild {
    pub app_guid: AppGuid,
    pub state: BuildState,
    /// Builds still being created may lack a timestamp.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub droplet_guid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceBroker {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub guid: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Processing,
    Complete,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudJob {
    pub id: JobId,
    pub state: JobState,
    #[serde(default)]
    pub error: Option<String>,
}
