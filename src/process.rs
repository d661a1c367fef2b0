// ABOUTME: Drives one deploy or rollback run against the simulated cluster.
// ABOUTME: Owns the lock, archive staging, checkpoint resume, and the state file write-back.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cluster::{ClusterState, InMemoryCluster};
use crate::config::{ArchiveSource, Config};
use crate::context::variables::ProcessType;
use crate::context::{ContextStore, ExecutionContext, JsonFileStore};
use crate::descriptor::DeploymentDescriptor;
use crate::diagnostics::{Diagnostics, Warning};
use crate::engine::{RetryPolicy, RunOutcome, StepRunner};
use crate::error::Result;
use crate::files::LocalFileStore;
use crate::files::url::fetch_archive;
use crate::lock::OperationLock;
use crate::scheduler::UploadPools;
use crate::steps::StepServices;
use crate::steps::pipeline::{RunInputs, deployment_steps, resulting_mtas, rollback_steps};
use crate::types::{ArchiveId, ProcessId, SpaceId};

/// What a finished run leaves for the caller to report.
#[derive(Debug)]
pub struct ProcessReport {
    pub process_id: ProcessId,
    pub outcome: RunOutcome,
    pub warnings: Vec<Warning>,
    /// Set when the run picked up an unfinished checkpoint.
    pub resumed: bool,
}

/// Options of a single run besides the configuration.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Break an existing operation lock.
    pub force: bool,
    /// Cancelled on Ctrl-C by the CLI; tests may cancel it directly.
    pub cancel: CancellationToken,
}

pub fn process_id(mta_id: &str, process_type: ProcessType) -> ProcessId {
    let suffix = match process_type {
        ProcessType::Deploy => "deploy",
        ProcessType::Rollback => "rollback",
    };
    ProcessId::new(format!("{mta_id}-{suffix}"))
}

/// Run a deployment or rollback to a terminal state.
///
/// The cluster state file is written back whatever the outcome, so
/// renames and uploads done before a failure are not forgotten.
pub async fn run_process(
    config: &Config,
    process_type: ProcessType,
    options: ProcessOptions,
) -> Result<ProcessReport> {
    let descriptor = DeploymentDescriptor::load(&config.descriptor)?;
    let lock = OperationLock::acquire(&config.locks_dir(), &descriptor.id, options.force)?;
    let diagnostics = Arc::new(Diagnostics::default());

    let result = run_locked(config, process_type, descriptor, &options, &diagnostics).await;

    if let Err(e) = lock.release() {
        diagnostics.warn(Warning::lock_release(e.to_string()));
    }

    let (process_id, outcome, resumed) = result?;
    Ok(ProcessReport {
        process_id,
        outcome,
        warnings: diagnostics.warnings(),
        resumed,
    })
}

async fn run_locked(
    config: &Config,
    process_type: ProcessType,
    descriptor: DeploymentDescriptor,
    options: &ProcessOptions,
    diagnostics: &Arc<Diagnostics>,
) -> Result<(ProcessId, RunOutcome, bool)> {
    let pools = Arc::new(UploadPools::new(&config.pools));
    let files = LocalFileStore::new(config.archives_dir());
    let space = SpaceId::new(config.space.clone());
    let store: Arc<dyn ContextStore> = Arc::new(JsonFileStore::new(config.runs_dir()));
    let process_id = process_id(&descriptor.id, process_type);

    let state = ClusterState::load(&config.cluster_state)?;
    let cluster = Arc::new(InMemoryCluster::new(state));

    let (mut ctx, resumed) = match store.load(&process_id)? {
        Some(ctx) if !ctx.cursor().completed => {
            tracing::info!(
                process = %process_id,
                step = ctx.cursor().step,
                "resuming unfinished run"
            );
            (ctx, true)
        }
        _ => {
            let archive = match process_type {
                ProcessType::Deploy => Some(stage_archive(config, &files, &pools, &space).await?),
                ProcessType::Rollback => None,
            };
            let inputs = RunInputs {
                process_type,
                descriptor: descriptor.clone(),
                deployed: cluster.deployed_mta(),
                backup: cluster.backup_mta(),
                version_rule: config.version_rule,
                keep_original_names: config.keep_original_names,
                space,
                archive,
            };
            (inputs.context(process_id.clone())?, false)
        }
    };

    let services = StepServices {
        cluster: cluster.clone(),
        files: Arc::new(files),
        pools,
        uploads: Arc::default(),
        diagnostics: diagnostics.clone(),
        upload: config.upload.clone(),
    };
    let steps = match process_type {
        ProcessType::Deploy => deployment_steps(&services, &descriptor),
        ProcessType::Rollback => rollback_steps(&services),
    };

    let runner = StepRunner::new(steps, store)
        .with_retry(RetryPolicy::from(&config.retry))
        .with_poll_interval(config.poll_interval)
        .with_cancellation(options.cancel.clone());

    tracing::info!(
        process = %process_id,
        correlation_id = %ctx.correlation_id(),
        steps = ?runner.step_names(),
        "starting run"
    );
    let outcome = runner.run(&mut ctx).await;

    if outcome.is_done() {
        record_result(&cluster, &ctx)?;
    }
    cluster.snapshot().save(&config.cluster_state)?;
    Ok((process_id, outcome, resumed))
}

fn record_result(cluster: &InMemoryCluster, ctx: &ExecutionContext) -> Result<()> {
    let mtas = resulting_mtas(ctx)?;
    cluster.set_mtas(mtas.deployed, mtas.backup);
    Ok(())
}

/// Copy the configured archive into the local store.
async fn stage_archive(
    config: &Config,
    files: &LocalFileStore,
    pools: &UploadPools,
    space: &SpaceId,
) -> Result<ArchiveId> {
    let id = match &config.archive {
        ArchiveSource::Path(path) => {
            let files = files.clone();
            let space = space.clone();
            let path = path.clone();
            tokio::task::spawn_blocking(move || files.store_file(&space, &path))
                .await
                .map_err(std::io::Error::other)??
        }
        ArchiveSource::Url(url) => {
            let files = files.clone();
            let space = space.clone();
            let url = url.clone();
            let task = pools
                .url_fetch
                .submit(async move { fetch_archive(&url, &files, &space).await })
                .await?;
            task.join().await??
        }
    };
    tracing::debug!(archive = %id, "staged MTA archive");
    Ok(id)
}
