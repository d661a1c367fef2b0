// ABOUTME: In-memory cluster used for simulation runs and tests.
// ABOUTME: Serializable snapshot, call recording, failure injection, staged uploads.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};

use super::client::ClusterClient;
use super::error::OperationalError;
use super::types::{
    CloudApplication, CloudBuild, CloudJob, CloudPackage, JobState, PackageStatus, ServiceBroker,
};
use crate::error::{Error, Result};
use crate::mta::DeployedMta;
use crate::types::{AppGuid, JobId, PackageGuid};
use crate::upload::{UploadEvent, UploadProgressSender};

/// Everything the in-memory cluster knows, as read from the state file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterState {
    #[serde(default)]
    pub applications: Vec<CloudApplication>,
    #[serde(default)]
    pub packages: Vec<CloudPackage>,
    #[serde(default)]
    pub builds: Vec<CloudBuild>,
    #[serde(default)]
    pub service_brokers: Vec<ServiceBroker>,
    #[serde(default)]
    pub jobs: Vec<CloudJob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_mta: Option<DeployedMta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_mta: Option<DeployedMta>,
}

impl ClusterState {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    /// Load a snapshot; a missing file is an empty cluster.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_yaml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }
}

/// A recorded client call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterCall {
    GetApplication(String),
    CreateApplication(String),
    Rename { from: String, to: String },
    UpdateEnv(String),
    Upload { app: String, file: PathBuf },
    GetPackage(PackageGuid),
    LatestUnusedPackage(AppGuid),
    Builds(AppGuid),
    GetServiceBroker(String),
    UpdateServiceBroker(String),
    GetJob(JobId),
}

impl ClusterCall {
    /// Operation name used as the failure-injection key.
    pub fn operation(&self) -> &'static str {
        match self {
            ClusterCall::GetApplication(_) => "get_application",
            ClusterCall::CreateApplication(_) => "create_application",
            ClusterCall::Rename { .. } => "rename_application",
            ClusterCall::UpdateEnv(_) => "update_application_env",
            ClusterCall::Upload { .. } => "async_upload_application",
            ClusterCall::GetPackage(_) => "get_package",
            ClusterCall::LatestUnusedPackage(_) => "get_latest_unused_package",
            ClusterCall::Builds(_) => "get_builds_for_application",
            ClusterCall::GetServiceBroker(_) => "get_service_broker",
            ClusterCall::UpdateServiceBroker(_) => "update_service_broker",
            ClusterCall::GetJob(_) => "get_job",
        }
    }
}

struct PendingUpload {
    progress: UploadProgressSender,
    remaining_polls: Option<u32>,
}

/// A cluster living entirely in process memory.
///
/// Uploads become READY after a configurable number of status polls, or
/// never when `polls_until_ready` is `None`.
pub struct InMemoryCluster {
    state: Mutex<ClusterState>,
    calls: Mutex<Vec<ClusterCall>>,
    failures: Mutex<HashMap<&'static str, VecDeque<Option<OperationalError>>>>,
    pending: Mutex<HashMap<PackageGuid, PendingUpload>>,
    polls_until_ready: Option<u32>,
}

impl InMemoryCluster {
    pub fn new(state: ClusterState) -> Self {
        Self {
            state: Mutex::new(state),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            polls_until_ready: Some(1),
        }
    }

    pub fn with_polls_until_ready(mut self, polls: Option<u32>) -> Self {
        self.polls_until_ready = polls;
        self
    }

    /// Make the next call of `operation` fail with `error`.
    pub fn fail_next(&self, operation: &'static str, error: OperationalError) {
        self.fail_after(operation, 0, error);
    }

    /// Let `skip` calls of `operation` through, then fail the next one.
    pub fn fail_after(&self, operation: &'static str, skip: usize, error: OperationalError) {
        let mut failures = self.failures.lock();
        let queue = failures.entry(operation).or_default();
        queue.extend(std::iter::repeat_n(None, skip));
        queue.push_back(Some(error));
    }

    pub fn calls(&self) -> Vec<ClusterCall> {
        self.calls.lock().clone()
    }

    pub fn calls_of(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    pub fn snapshot(&self) -> ClusterState {
        self.state.lock().clone()
    }

    pub fn deployed_mta(&self) -> Option<DeployedMta> {
        self.state.lock().deployed_mta.clone()
    }

    pub fn backup_mta(&self) -> Option<DeployedMta> {
        self.state.lock().backup_mta.clone()
    }

    /// Record the deployed/backup MTA snapshots after a run.
    pub fn set_mtas(&self, deployed: Option<DeployedMta>, backup: Option<DeployedMta>) {
        let mut state = self.state.lock();
        state.deployed_mta = deployed;
        state.backup_mta = backup;
    }

    fn record(&self, call: ClusterCall) -> std::result::Result<(), OperationalError> {
        let operation = call.operation();
        self.calls.lock().push(call);
        match self
            .failures
            .lock()
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
        {
            Some(Some(error)) => Err(error),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ClusterClient for InMemoryCluster {
    async fn get_application(
        &self,
        name: &str,
    ) -> std::result::Result<CloudApplication, OperationalError> {
        self.record(ClusterCall::GetApplication(name.to_string()))?;
        self.state
            .lock()
            .applications
            .iter()
            .find(|app| app.name == name)
            .cloned()
            .ok_or_else(|| OperationalError::not_found(format!("application {name}")))
    }

    async fn create_application(
        &self,
        name: &str,
        env: BTreeMap<String, String>,
    ) -> std::result::Result<CloudApplication, OperationalError> {
        self.record(ClusterCall::CreateApplication(name.to_string()))?;
        let mut state = self.state.lock();
        if state.applications.iter().any(|app| app.name == name) {
            return Err(OperationalError::new(
                422,
                format!("application name {name} is taken"),
            ));
        }
        let app = CloudApplication {
            name: name.to_string(),
            guid: AppGuid::random(),
            env,
            created_at: Utc::now(),
        };
        state.applications.push(app.clone());
        Ok(app)
    }

    async fn rename_application(
        &self,
        old_name: &str,
        new_name: &str,
    ) -> std::result::Result<(), OperationalError> {
        self.record(ClusterCall::Rename {
            from: old_name.to_string(),
            to: new_name.to_string(),
        })?;
        let mut state = self.state.lock();
        if !state.applications.iter().any(|app| app.name == old_name) {
            return Err(OperationalError::not_found(format!("application {old_name}")));
        }
        if state.applications.iter().any(|app| app.name == new_name) {
            return Err(OperationalError::new(
                422,
                format!("application name {new_name} is taken"),
            ));
        }
        if let Some(app) = state.applications.iter_mut().find(|app| app.name == old_name) {
            app.name = new_name.to_string();
        }
        Ok(())
    }

    async fn update_application_env(
        &self,
        name: &str,
        env: BTreeMap<String, String>,
    ) -> std::result::Result<(), OperationalError> {
        self.record(ClusterCall::UpdateEnv(name.to_string()))?;
        let mut state = self.state.lock();
        let app = state
            .applications
            .iter_mut()
            .find(|app| app.name == name)
            .ok_or_else(|| OperationalError::not_found(format!("application {name}")))?;
        app.env = env;
        Ok(())
    }

    async fn async_upload_application(
        &self,
        name: &str,
        file: &Path,
        progress: UploadProgressSender,
    ) -> std::result::Result<PackageGuid, OperationalError> {
        self.record(ClusterCall::Upload {
            app: name.to_string(),
            file: file.to_path_buf(),
        })?;
        let total_bytes = std::fs::metadata(file)
            .map_err(|e| OperationalError::new(400, format!("cannot read upload file: {e}")))?
            .len();
        let guid = {
            let mut state = self.state.lock();
            let app_guid = state
                .applications
                .iter()
                .find(|app| app.name == name)
                .map(|app| app.guid.clone())
                .ok_or_else(|| OperationalError::not_found(format!("application {name}")))?;
            let guid = PackageGuid::random();
            state.packages.push(CloudPackage {
                guid: guid.clone(),
                app_guid,
                status: PackageStatus::ProcessingUpload,
                created_at: Utc::now(),
                used: false,
            });
            guid
        };

        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        progress.emit(UploadEvent::CheckResources);
        progress.emit(UploadEvent::MatchedFileNames(BTreeSet::from([file_name])));
        progress.emit(UploadEvent::ProcessMatchedResources { total_bytes });
        progress.emit(UploadEvent::Progress(PackageStatus::ProcessingUpload));

        self.pending.lock().insert(
            guid.clone(),
            PendingUpload {
                progress,
                remaining_polls: self.polls_until_ready,
            },
        );
        Ok(guid)
    }

    async fn get_package(
        &self,
        guid: &PackageGuid,
    ) -> std::result::Result<CloudPackage, OperationalError> {
        self.record(ClusterCall::GetPackage(guid.clone()))?;

        let mut pending = self.pending.lock();
        let becomes_ready = match pending.get_mut(guid) {
            Some(upload) => match upload.remaining_polls.as_mut() {
                Some(remaining) => {
                    *remaining = remaining.saturating_sub(1);
                    *remaining == 0
                }
                None => false,
            },
            // Reused packages that were still processing finish on first look.
            None => true,
        };

        let mut state = self.state.lock();
        let package = state
            .packages
            .iter_mut()
            .find(|p| &p.guid == guid)
            .ok_or_else(|| OperationalError::not_found(format!("package {guid}")))?;
        if becomes_ready && package.status == PackageStatus::ProcessingUpload {
            package.status = PackageStatus::Ready;
            if let Some(upload) = pending.remove(guid) {
                upload.progress.emit(UploadEvent::Progress(PackageStatus::Ready));
            }
        }
        Ok(package.clone())
    }

    async fn get_latest_unused_package(
        &self,
        app: &AppGuid,
    ) -> std::result::Result<Option<CloudPackage>, OperationalError> {
        self.record(ClusterCall::LatestUnusedPackage(app.clone()))?;
        Ok(self
            .state
            .lock()
            .packages
            .iter()
            .filter(|p| &p.app_guid == app && !p.used)
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn get_builds_for_application(
        &self,
        app: &AppGuid,
    ) -> std::result::Result<Vec<CloudBuild>, OperationalError> {
        self.record(ClusterCall::Builds(app.clone()))?;
        Ok(self
            .state
            .lock()
            .builds
            .iter()
            .filter(|b| &b.app_guid == app)
            .cloned()
            .collect())
    }

    async fn get_service_broker(
        &self,
        name: &str,
    ) -> std::result::Result<Option<ServiceBroker>, OperationalError> {
        self.record(ClusterCall::GetServiceBroker(name.to_string()))?;
        Ok(self
            .state
            .lock()
            .service_brokers
            .iter()
            .find(|b| b.name == name)
            .cloned())
    }

    async fn update_service_broker(
        &self,
        broker: &ServiceBroker,
    ) -> std::result::Result<Option<JobId>, OperationalError> {
        self.record(ClusterCall::UpdateServiceBroker(broker.name.clone()))?;
        let mut state = self.state.lock();
        let existing = state
            .service_brokers
            .iter_mut()
            .find(|b| b.name == broker.name)
            .ok_or_else(|| OperationalError::not_found(format!("service broker {}", broker.name)))?;
        *existing = broker.clone();
        let id = JobId::random();
        state.jobs.push(CloudJob {
            id: id.clone(),
            state: JobState::Processing,
            error: None,
        });
        Ok(Some(id))
    }

    async fn get_job(&self, id: &JobId) -> std::result::Result<CloudJob, OperationalError> {
        self.record(ClusterCall::GetJob(id.clone()))?;
        let mut state = self.state.lock();
        let job = state
            .jobs
            .iter_mut()
            .find(|j| &j.id == id)
            .ok_or_else(|| OperationalError::not_found(format!("job {id}")))?;
        let observed = job.clone();
        if job.state == JobState::Processing {
            job.state = JobState::Complete;
        }
        Ok(observed)
    }
}
