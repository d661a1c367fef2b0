// ABOUTME: End-to-end tests of deploy and rollback runs against the simulated cluster.
// ABOUTME: Builds a project directory with config, descriptor, archive, and cluster state.

mod support;

use chrono::Utc;
use mtadeploy::bluegreen::ApplicationColor;
use mtadeploy::cluster::{ClusterState, JobState, ServiceBroker};
use mtadeploy::config::Config;
use mtadeploy::context::variables::{DEPLOYMENT_TYPE, IDLE_COLOR, ProcessType};
use mtadeploy::context::{ContextStore, JsonFileStore};
use mtadeploy::error::Error;
use mtadeploy::lock::{LockError, OperationLock};
use mtadeploy::mta::{DeployedMta, DeployedMtaApplication, MtaMetadata, ProductizationState};
use mtadeploy::process::{ProcessOptions, process_id, run_process};
use mtadeploy::version::DeploymentType;
use std::path::Path;
use tempfile::TempDir;

const FILES: &[(&str, &str)] = &[
    ("web/index.html", "<h1>shop</h1>"),
    ("api/main.py", "print('api')"),
];

fn descriptor_yaml(version: &str) -> String {
    format!(
        r#"id: shop
version: {version}
modules:
  - name: web
    path: web/
  - name: api
    path: api/
    service_broker: shop-broker
"#
    )
}

fn write_project(dir: &Path, version: &str, rule: &str) -> Config {
    support::write_archive(dir, "app.mtar", FILES);
    std::fs::write(dir.join("mtad.yaml"), descriptor_yaml(version)).unwrap();
    let config = format!(
        r#"space: dev
descriptor: mtad.yaml
archive: app.mtar
cluster_state: cluster.yml
version_rule: {rule}
poll_interval: 10ms
retry:
  attempts: 2
  delay: 10ms
"#
    );
    let path = dir.join("mtadeploy.yml");
    std::fs::write(&path, config).unwrap();
    Config::load(&path).unwrap()
}

fn seed_cluster(config: &Config, state: &ClusterState) {
    state.save(&config.cluster_state).unwrap();
}

fn broker() -> ServiceBroker {
    ServiceBroker {
        name: "shop-broker".to_string(),
        url: "https://broker.example.com".to_string(),
        guid: Some("broker-1".to_string()),
    }
}

fn deployed(version: &str, names: &[&str]) -> DeployedMta {
    DeployedMta {
        metadata: MtaMetadata {
            id: "shop".to_string(),
            version: Some(version.to_string()),
        },
        applications: names
            .iter()
            .map(|name| DeployedMtaApplication {
                name: name.to_string(),
                module_name: name.split('-').next().unwrap_or(name).to_string(),
                created_at: Utc::now(),
                correlation_id: None,
                productization_state: ProductizationState::Live,
            })
            .collect(),
    }
}

fn app_names(state: &ClusterState) -> Vec<String> {
    let mut names: Vec<String> = state.applications.iter().map(|a| a.name.clone()).collect();
    names.sort();
    names
}

fn project() -> TempDir {
    support::init_tracing();
    tempfile::tempdir().unwrap()
}

#[tokio::test]
async fn first_deployment_goes_blue_and_finishes() {
    let dir = project();
    let config = write_project(dir.path(), "1.0.0", "ALL");
    seed_cluster(
        &config,
        &ClusterState {
            service_brokers: vec![broker()],
            ..ClusterState::default()
        },
    );

    let report = run_process(&config, ProcessType::Deploy, ProcessOptions::default())
        .await
        .unwrap();
    assert!(report.outcome.is_done(), "{:?}", report.outcome.error);
    assert!(!report.resumed);

    let checkpoint = JsonFileStore::new(config.runs_dir())
        .load(&process_id("shop", ProcessType::Deploy))
        .unwrap()
        .unwrap();
    assert!(checkpoint.cursor().completed);
    assert_eq!(
        checkpoint.get(DEPLOYMENT_TYPE).unwrap(),
        Some(DeploymentType::Deployment)
    );
    assert_eq!(checkpoint.get(IDLE_COLOR).unwrap(), Some(ApplicationColor::Blue));

    let state = ClusterState::load(&config.cluster_state).unwrap();
    assert_eq!(app_names(&state), vec!["api-blue", "web-blue"]);
    assert_eq!(state.packages.len(), 2);
    assert!(state.packages.iter().all(|p| p.status.is_ready()));
    assert_eq!(state.jobs.len(), 1);
    assert_eq!(state.jobs[0].state, JobState::Complete);

    let mta = state.deployed_mta.unwrap();
    assert_eq!(mta.metadata.version.as_deref(), Some("1.0.0"));
    assert!(mta.application("web-blue").is_some());
    assert!(
        mta.applications
            .iter()
            .all(|a| a.correlation_id.as_deref() == Some(checkpoint.correlation_id()))
    );

    // The run released its lock.
    OperationLock::acquire(&config.locks_dir(), "shop", false)
        .unwrap()
        .release()
        .unwrap();
}

#[tokio::test]
async fn redeploying_the_same_version_is_rejected_before_any_change() {
    let dir = project();
    let config = write_project(dir.path(), "1.0.0", "SAME_HIGHER");
    let before = ClusterState {
        applications: vec![
            support::application("web-blue", None),
            support::application("api-blue", None),
        ],
        deployed_mta: Some(deployed("1.0.0", &["web-blue", "api-blue"])),
        ..ClusterState::default()
    };
    seed_cluster(&config, &before);

    let report = run_process(&config, ProcessType::Deploy, ProcessOptions::default())
        .await
        .unwrap();
    assert!(!report.outcome.is_done());
    let error = report.outcome.error.as_ref().unwrap();
    assert_eq!(error.step(), Some("determine-deployment-type"));
    assert!(
        report
            .outcome
            .error_message()
            .unwrap()
            .contains("same version already deployed")
    );

    let after = ClusterState::load(&config.cluster_state).unwrap();
    assert_eq!(app_names(&after), app_names(&before));
    assert!(after.packages.is_empty());
    assert_eq!(after.deployed_mta, before.deployed_mta);
}

#[tokio::test]
async fn upgrade_deploys_the_other_color() {
    let dir = project();
    let config = write_project(dir.path(), "1.1.0", "SAME_HIGHER");
    seed_cluster(
        &config,
        &ClusterState {
            applications: vec![
                support::application("web-blue", None),
                support::application("api-blue", None),
            ],
            service_brokers: vec![broker()],
            deployed_mta: Some(deployed("1.0.0", &["web-blue", "api-blue"])),
            ..ClusterState::default()
        },
    );

    let report = run_process(&config, ProcessType::Deploy, ProcessOptions::default())
        .await
        .unwrap();
    assert!(report.outcome.is_done(), "{:?}", report.outcome.error);

    let state = ClusterState::load(&config.cluster_state).unwrap();
    assert_eq!(
        app_names(&state),
        vec!["api-blue", "api-green", "web-blue", "web-green"]
    );
    let mta = state.deployed_mta.unwrap();
    assert_eq!(mta.metadata.version.as_deref(), Some("1.1.0"));
    assert!(mta.applications.iter().all(|a| a.name.ends_with("-green")));
}

#[tokio::test]
async fn rollback_restores_the_backup_generation() {
    let dir = project();
    let config = write_project(dir.path(), "1.1.0", "SAME_HIGHER");
    seed_cluster(
        &config,
        &ClusterState {
            applications: vec![
                support::application("web-green", None),
                support::application("mta-backup-web-blue", None),
            ],
            deployed_mta: Some(deployed("1.1.0", &["web-green"])),
            backup_mta: Some(deployed("1.0.0", &["mta-backup-web-blue"])),
            ..ClusterState::default()
        },
    );

    let report = run_process(&config, ProcessType::Rollback, ProcessOptions::default())
        .await
        .unwrap();
    assert!(report.outcome.is_done(), "{:?}", report.outcome.error);

    let state = ClusterState::load(&config.cluster_state).unwrap();
    assert_eq!(app_names(&state), vec!["to-be-deleted-web-green", "web-blue"]);
    let mta = state.deployed_mta.unwrap();
    assert_eq!(mta.metadata.version.as_deref(), Some("1.0.0"));
    assert!(mta.application("web-blue").is_some());
    assert!(state.backup_mta.is_none());
}

#[tokio::test]
async fn held_lock_rejects_the_run_until_forced() {
    let dir = project();
    let config = write_project(dir.path(), "1.0.0", "ALL");
    let held = OperationLock::acquire(&config.locks_dir(), "shop", false).unwrap();

    let err = run_process(&config, ProcessType::Deploy, ProcessOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Lock(LockError::Held { .. })));

    let report = run_process(
        &config,
        ProcessType::Deploy,
        ProcessOptions {
            force: true,
            ..ProcessOptions::default()
        },
    )
    .await
    .unwrap();
    assert!(report.outcome.is_done());
    drop(held);
}

#[tokio::test]
async fn cancelled_run_is_aborted() {
    let dir = project();
    let config = write_project(dir.path(), "1.0.0", "ALL");
    let options = ProcessOptions::default();
    options.cancel.cancel();

    let report = run_process(&config, ProcessType::Deploy, options)
        .await
        .unwrap();
    assert!(!report.outcome.is_done());
    assert!(report.outcome.error_message().unwrap().contains("aborted"));
    let state = ClusterState::load(&config.cluster_state).unwrap();
    assert!(state.applications.is_empty());
}
