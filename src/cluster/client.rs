// ABOUTME: Narrow async contract of the remote cluster-management API.
// ABOUTME: Every operation fails with a classified OperationalError.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;

use super::error::OperationalError;
use super::types::{CloudApplication, CloudBuild, CloudJob, CloudPackage, ServiceBroker};
use crate::types::{AppGuid, JobId, PackageGuid};
use crate::upload::UploadProgressSender;

/// Application, package, and service-broker operations of the cluster.
///
/// The transport is opaque to the engine; implementations only need to map
/// their failures onto `OperationalError` with a meaningful status.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Fetch an application by name. Missing applications fail with 404.
    async fn get_application(&self, name: &str) -> Result<CloudApplication, OperationalError>;

    async fn create_application(
        &self,
        name: &str,
        env: BTreeMap<String, String>,
    ) -> Result<CloudApplication, OperationalError>;

    async fn rename_application(&self, old_name: &str, new_name: &str)
    -> Result<(), OperationalError>;

    /// Replace the environment of an application.
    async fn update_application_env(
        &self,
        name: &str,
        env: BTreeMap<String, String>,
    ) -> Result<(), OperationalError>;

    /// Start uploading `file` as the new package of `name`.
    ///
    /// Returns as soon as the package exists remotely; transfer progress is
    /// reported through `progress` until READY or an error.
    async fn async_upload_application(
        &self,
        name: &str,
        file: &Path,
        progress: UploadProgressSender,
    ) -> Result<PackageGuid, OperationalError>;

    async fn get_package(&self, guid: &PackageGuid) -> Result<CloudPackage, OperationalError>;

    /// The most recent package of the application no droplet was staged from.
    async fn get_latest_unused_package(
        &self,
        app: &AppGuid,
    ) -> Result<Option<CloudPackage>, OperationalError>;

    async fn get_builds_for_application(
        &self,
        app: &AppGuid,
    ) -> Result<Vec<CloudBuild>, OperationalError>;

    async fn get_service_broker(&self, name: &str)
    -> Result<Option<ServiceBroker>, OperationalError>;

    /// Update a broker; an asynchronous update returns the job to poll.
    async fn update_service_broker(
        &self,
        broker: &ServiceBroker,
    ) -> Result<Option<JobId>, OperationalError>;

    async fn get_job(&self, id: &JobId) -> Result<CloudJob, OperationalError>;
}
