// ABOUTME: Integration tests for the upload step and its decision engine.
// ABOUTME: Package reuse, forced uploads, skips, timeouts, and temp archive cleanup.

mod support;

use chrono::Utc;
use mtadeploy::cluster::{
    BuildState, CloudBuild, ClusterCall, ClusterState, InMemoryCluster, OperationalError,
    PackageStatus,
};
use mtadeploy::config::UploadConfig;
use mtadeploy::context::variables::{
    APP_ARCHIVE_ID, APP_CONTENT_CHANGED, APP_TO_PROCESS, MTA_ARCHIVE_ELEMENTS, SPACE_GUID,
    UPLOAD_TOKEN,
};
use mtadeploy::context::{ExecutionContext, MemoryStore};
use mtadeploy::descriptor::{AppToProcess, MtaArchiveElements};
use mtadeploy::engine::{RetryPolicy, RunErrorKind, Step, StepPhase, StepRunner};
use mtadeploy::steps::{StepServices, UploadAppStep};
use mtadeploy::types::ProcessId;
use mtadeploy::upload::{DeployAttributes, UploadToken};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const FILES: &[(&str, &str)] = &[
    ("web/index.html", "<h1>shop</h1>"),
    ("web/app.js", "console.log('shop')"),
    ("api/main.py", "print('api')"),
];
const APP: &str = "web-blue";

struct Fixture {
    _dir: TempDir,
    cluster: Arc<InMemoryCluster>,
    services: StepServices,
    ctx: ExecutionContext,
}

fn fixture(
    state: ClusterState,
    polls_until_ready: Option<u32>,
    timeout: Option<Duration>,
) -> Fixture {
    support::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let stored = support::store_archive(dir.path(), FILES);
    let cluster =
        Arc::new(InMemoryCluster::new(state).with_polls_until_ready(polls_until_ready));
    let services = support::services(cluster.clone(), stored.store, UploadConfig::default());

    let mut elements = MtaArchiveElements::default();
    elements.add_module_file_name("web", "web/");
    let mut ctx = ExecutionContext::new(ProcessId::new("shop-deploy"));
    ctx.set(
        APP_TO_PROCESS,
        &AppToProcess {
            name: APP.to_string(),
            module_name: "web".to_string(),
            upload_timeout: timeout,
            service_broker: None,
        },
    )
    .unwrap();
    ctx.set(MTA_ARCHIVE_ELEMENTS, &elements).unwrap();
    ctx.set(SPACE_GUID, &stored.space).unwrap();
    ctx.set(APP_ARCHIVE_ID, &stored.archive).unwrap();

    Fixture {
        _dir: dir,
        cluster,
        services,
        ctx,
    }
}

fn web_digest() -> String {
    support::digest_of(FILES, "web/")
}

/// Cluster with the application and, optionally, an unused package of it.
fn state(digest: &str, package: Option<PackageStatus>) -> ClusterState {
    let app = support::application(APP, Some(digest));
    let packages = package
        .map(|status| vec![support::unused_package(&app, status)])
        .unwrap_or_default();
    ClusterState {
        applications: vec![app],
        packages,
        ..ClusterState::default()
    }
}

fn uploaded_files(cluster: &InMemoryCluster) -> Vec<PathBuf> {
    cluster
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            ClusterCall::Upload { file, .. } => Some(file),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn same_digest_reuses_processing_package() {
    let mut f = fixture(
        state(&web_digest(), Some(PackageStatus::ProcessingUpload)),
        Some(1),
        None,
    );
    let step = UploadAppStep::new(f.services.clone());

    assert_eq!(step.execute(&mut f.ctx).await.unwrap(), StepPhase::Poll);
    let token = f.ctx.require(UPLOAD_TOKEN).unwrap();
    assert_eq!(
        token,
        UploadToken::Reused {
            package: support::unused_package(
                &support::application(APP, None),
                PackageStatus::ProcessingUpload
            )
            .guid
        }
    );
    assert_eq!(f.ctx.get(APP_CONTENT_CHANGED).unwrap(), Some(false));

    assert_eq!(step.poll_status(&mut f.ctx).await.unwrap(), StepPhase::Done);
    assert_eq!(f.cluster.calls_of("async_upload_application"), 0);
}

#[tokio::test]
async fn same_digest_with_expired_package_uploads_once() {
    let mut f = fixture(
        state(&web_digest(), Some(PackageStatus::Expired)),
        Some(1),
        None,
    );
    let step = UploadAppStep::new(f.services.clone());

    assert_eq!(step.execute(&mut f.ctx).await.unwrap(), StepPhase::Poll);
    assert!(matches!(
        f.ctx.require(UPLOAD_TOKEN).unwrap(),
        UploadToken::Started { .. }
    ));
    assert_eq!(f.ctx.get(APP_CONTENT_CHANGED).unwrap(), Some(false));
    assert_eq!(f.services.uploads.len(), 1);

    assert_eq!(step.poll_status(&mut f.ctx).await.unwrap(), StepPhase::Done);
    assert_eq!(f.cluster.calls_of("async_upload_application"), 1);
    assert!(f.services.uploads.is_empty());
    for file in uploaded_files(&f.cluster) {
        assert!(!file.exists(), "{} should be deleted", file.display());
    }
}

#[tokio::test]
async fn changed_digest_always_uploads_and_records_the_digest() {
    for status in [
        PackageStatus::ProcessingUpload,
        PackageStatus::Ready,
        PackageStatus::Expired,
    ] {
        let mut f = fixture(state("0BSOLETE", Some(status)), Some(1), None);
        let step = UploadAppStep::new(f.services.clone());

        assert_eq!(step.execute(&mut f.ctx).await.unwrap(), StepPhase::Poll);
        assert_eq!(f.cluster.calls_of("async_upload_application"), 1);
        assert_eq!(f.ctx.get(APP_CONTENT_CHANGED).unwrap(), Some(true));

        let snapshot = f.cluster.snapshot();
        let app = &snapshot.applications[0];
        assert_eq!(
            DeployAttributes::from_env(&app.env).digest(),
            Some(web_digest().as_str())
        );
        step.release_resources(&mut f.ctx).await;
    }
}

#[tokio::test]
async fn unchanged_and_staged_is_skipped() {
    let mut cluster_state = state(&web_digest(), None);
    cluster_state.builds.push(CloudBuild {
        app_guid: cluster_state.applications[0].guid.clone(),
        state: BuildState::Staged,
        created_at: Some(Utc::now()),
        droplet_guid: Some("droplet-1".to_string()),
    });
    let mut f = fixture(cluster_state, Some(1), None);
    let step = UploadAppStep::new(f.services.clone());

    assert_eq!(step.execute(&mut f.ctx).await.unwrap(), StepPhase::Done);
    assert_eq!(f.cluster.calls_of("async_upload_application"), 0);
    assert!(!f.ctx.contains(UPLOAD_TOKEN));
}

#[tokio::test]
async fn unchanged_but_never_staged_uploads() {
    let mut f = fixture(state(&web_digest(), None), Some(1), None);
    let step = UploadAppStep::new(f.services.clone());

    assert_eq!(step.execute(&mut f.ctx).await.unwrap(), StepPhase::Poll);
    assert_eq!(f.cluster.calls_of("async_upload_application"), 1);
    step.release_resources(&mut f.ctx).await;
}

#[tokio::test]
async fn rejected_upload_deletes_the_extracted_archive() {
    let mut f = fixture(state("0BSOLETE", None), Some(1), None);
    f.cluster.fail_next(
        "async_upload_application",
        OperationalError::new(413, "payload too large"),
    );
    let step = UploadAppStep::new(f.services.clone());

    let err = step.execute(&mut f.ctx).await.unwrap_err();
    assert_eq!(err.phase(), StepPhase::Failed);
    assert!(err.to_string().contains(APP));

    let files = uploaded_files(&f.cluster);
    assert_eq!(files.len(), 1);
    assert!(!files[0].exists());
    assert!(f.services.uploads.is_empty());
}

#[tokio::test]
async fn upload_that_never_finishes_times_out_once_and_cleans_up() {
    let f = fixture(state("0BSOLETE", None), None, Some(Duration::from_millis(60)));
    let store = Arc::new(MemoryStore::new());
    let runner = StepRunner::new(
        vec![Box::new(UploadAppStep::new(f.services.clone()))],
        store,
    )
    .with_poll_interval(Duration::from_millis(10))
    .with_retry(RetryPolicy {
        attempts: 3,
        delay: Duration::from_millis(1),
    });

    let mut ctx = f.ctx.clone();
    let outcome = runner.run(&mut ctx).await;

    assert!(!outcome.is_done());
    assert_eq!(
        outcome.error.as_ref().map(|e| e.kind()),
        Some(RunErrorKind::Timeout)
    );
    assert_eq!(f.cluster.calls_of("async_upload_application"), 1);
    let files = uploaded_files(&f.cluster);
    assert_eq!(files.len(), 1);
    assert!(!files[0].exists());
    assert!(f.services.uploads.is_empty());
}
