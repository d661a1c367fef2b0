// ABOUTME: Test support utilities.
// ABOUTME: Archive builders, seeded clusters, and step services for integration tests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};

use chrono::{Duration as ChronoDuration, Utc};
use mtadeploy::cluster::{
    ClusterState, CloudApplication, CloudPackage, ENV_DEPLOY_ATTRIBUTES, InMemoryCluster,
    PackageStatus,
};
use mtadeploy::config::{PoolsConfig, UploadConfig};
use mtadeploy::diagnostics::Diagnostics;
use mtadeploy::files::LocalFileStore;
use mtadeploy::scheduler::UploadPools;
use mtadeploy::steps::StepServices;
use mtadeploy::types::{AppGuid, ArchiveId, PackageGuid, SpaceId};
use mtadeploy::upload::UploadRegistry;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("mtadeploy=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Tar bytes holding `files` as regular files.
#[allow(dead_code)]
pub fn mta_archive(files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap()
}

#[allow(dead_code)]
pub fn write_archive(dir: &Path, name: &str, files: &[(&str, &str)]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, mta_archive(files)).unwrap();
    path
}

/// Content digest of one module of an archive built by `mta_archive`.
#[allow(dead_code)]
pub fn digest_of(files: &[(&str, &str)], entry: &str) -> String {
    let bytes = mta_archive(files);
    mtadeploy::files::archive::module_digest(&mut bytes.as_slice(), entry, u64::MAX).unwrap()
}

/// An application whose deploy attributes record `digest`.
#[allow(dead_code)]
pub fn application(name: &str, digest: Option<&str>) -> CloudApplication {
    let mut env = std::collections::BTreeMap::new();
    if let Some(digest) = digest {
        env.insert(
            ENV_DEPLOY_ATTRIBUTES.to_string(),
            serde_json::json!({ "app-content-digest": digest }).to_string(),
        );
    }
    CloudApplication {
        name: name.to_string(),
        guid: AppGuid::new(format!("{name}-guid")),
        env,
        created_at: Utc::now() - ChronoDuration::hours(1),
    }
}

#[allow(dead_code)]
pub fn unused_package(app: &CloudApplication, status: PackageStatus) -> CloudPackage {
    CloudPackage {
        guid: PackageGuid::new(format!("{}-package", app.name)),
        app_guid: app.guid.clone(),
        status,
        created_at: Utc::now() - ChronoDuration::minutes(5),
        used: false,
    }
}

#[allow(dead_code)]
pub fn cluster(state: ClusterState) -> Arc<InMemoryCluster> {
    Arc::new(InMemoryCluster::new(state))
}

/// A local archive store holding one archive, plus the ids to find it.
#[allow(dead_code)]
pub struct StoredArchive {
    pub store: LocalFileStore,
    pub space: SpaceId,
    pub archive: ArchiveId,
}

#[allow(dead_code)]
pub fn store_archive(root: &Path, files: &[(&str, &str)]) -> StoredArchive {
    let store = LocalFileStore::new(root.join("archives"));
    let space = SpaceId::new("dev");
    let bytes = mta_archive(files);
    let archive = store.store(&space, &mut bytes.as_slice()).unwrap();
    StoredArchive {
        store,
        space,
        archive,
    }
}

/// Step services over `cluster` and `store` with small pools.
///
/// Must be called inside a tokio runtime.
#[allow(dead_code)]
pub fn services(
    cluster: Arc<InMemoryCluster>,
    store: LocalFileStore,
    upload: UploadConfig,
) -> StepServices {
    let pools = PoolsConfig {
        file_storage_workers: 2,
        controller_workers: 2,
        url_fetch_core_workers: 1,
        url_fetch_max_workers: 2,
        ..PoolsConfig::default()
    };
    StepServices {
        cluster,
        files: Arc::new(store),
        pools: Arc::new(UploadPools::new(&pools)),
        uploads: Arc::new(UploadRegistry::new()),
        diagnostics: Arc::new(Diagnostics::default()),
        upload,
    }
}
