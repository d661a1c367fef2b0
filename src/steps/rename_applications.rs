// ABOUTME: Chooses and applies the naming flow of a run: rollback, old/new suffix, or blue-green.
// ABOUTME: Keeps the deployed MTA snapshot in the context in sync with every rename.

use async_trait::async_trait;
use std::sync::Arc;

use crate::bluegreen::{
    ApplicationColor, BlueGreenSuffix, ColorDetector, NameSuffixAppender,
    MTA_FOR_DELETION_PREFIX, ProductizationStateUpdater, UpdateBasedOnAge, UpdateBasedOnColor,
    namespace_prefix, strip_backup_namespace, to_be_deleted_name,
};
use crate::cluster::{ClusterClient, OperationalError, OperationalResultExt};
use crate::context::ExecutionContext;
use crate::context::variables::{
    APPS_TO_RENAME, BACKUP_MTA, DEPLOYED_MTA, DEPLOYMENT_DESCRIPTOR, IDLE_COLOR,
    KEEP_ORIGINAL_NAMES_AFTER_DEPLOY, LIVE_COLOR, PROCESS_TYPE, ProcessType,
};
use crate::diagnostics::{Diagnostics, Warning};
use crate::engine::{Step, StepError, StepPhase};
use crate::mta::{DeployedMta, DeployedMtaApplication};

pub struct RenameApplicationsStep {
    cluster: Arc<dyn ClusterClient>,
    diagnostics: Arc<Diagnostics>,
}

impl RenameApplicationsStep {
    pub fn new(cluster: Arc<dyn ClusterClient>, diagnostics: Arc<Diagnostics>) -> Self {
        Self {
            cluster,
            diagnostics,
        }
    }

    /// Rename `from` to `to`, accepting a rename that already happened.
    ///
    /// A retried step finds its earlier renames done: the old name is gone
    /// and the new one exists, whatever status the rename itself reports.
    async fn rename(&self, from: &str, to: &str) -> Result<(), OperationalError> {
        tracing::info!("renaming application {} to {}", from, to);
        let result = match self.cluster.rename_application(from, to).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_transient() => Err(e),
            Err(e) => {
                if self.already_renamed(from, to).await {
                    tracing::debug!("application {} was already renamed to {}", from, to);
                    Ok(())
                } else {
                    Err(e)
                }
            }
        };
        result.context_op("rename", from)
    }

    async fn already_renamed(&self, from: &str, to: &str) -> bool {
        let source_gone = matches!(
            self.cluster.get_application(from).await,
            Err(e) if e.is_not_found()
        );
        source_gone && self.cluster.get_application(to).await.is_ok()
    }

    async fn rename_all(
        &self,
        applications: &[DeployedMtaApplication],
        new_name: impl Fn(&DeployedMtaApplication) -> Result<String, StepError>,
    ) -> Result<Vec<DeployedMtaApplication>, StepError> {
        let mut renamed = Vec::with_capacity(applications.len());
        for app in applications {
            let name = new_name(app)?;
            if name != app.name {
                self.rename(&app.name, &name).await?;
            }
            renamed.push(app.with_name(name));
        }
        Ok(renamed)
    }

    /// Deployed applications go to the deletion namespace, backups come back.
    ///
    /// The context is only updated once every rename succeeded, so a retry
    /// starts from the same snapshots and repeats no rename.
    async fn rollback(&self, ctx: &mut ExecutionContext) -> Result<(), StepError> {
        let deployed = ctx.get(DEPLOYED_MTA)?;
        let backup = ctx.get(BACKUP_MTA)?;

        let mut renamed = None;
        if let Some(deployed) = &deployed {
            let applications = self
                .rename_all(&deployed.applications, |app| {
                    Ok(if is_marked_for_deletion(&app.name) {
                        app.name.clone()
                    } else {
                        to_be_deleted_name(&app.name)
                    })
                })
                .await?;
            renamed = Some(deployed.with_applications(applications));
        }

        let mut restored = None;
        if let Some(backup) = &backup {
            let applications = self
                .rename_all(&backup.applications, |app| {
                    strip_backup_namespace(&app.name)
                        .map(str::to_string)
                        .ok_or_else(|| {
                            StepError::invariant(format!(
                                "backup application {} is outside the backup namespace",
                                app.name
                            ))
                        })
                })
                .await?;
            restored = Some(backup.with_applications(applications));
        }

        if let Some(renamed) = &renamed {
            ctx.set(DEPLOYED_MTA, renamed)?;
        }
        if let Some(restored) = &restored {
            ctx.set(BACKUP_MTA, restored)?;
        }
        Ok(())
    }

    /// Existing applications get `-live`, the new generation `-idle`.
    async fn old_new_suffix(&self, ctx: &mut ExecutionContext) -> Result<(), StepError> {
        let mut descriptor = ctx.require(DEPLOYMENT_DESCRIPTOR)?;
        let deployed = ctx.get(DEPLOYED_MTA)?;
        let live = BlueGreenSuffix::Live.as_suffix();

        // Without an explicit list every deployed application that is not
        // live yet is renamed, rather than none.
        let to_rename = match ctx.get(APPS_TO_RENAME)? {
            Some(names) => names,
            None => deployed
                .iter()
                .flat_map(|mta| &mta.applications)
                .filter(|app| !app.name.ends_with(live))
                .map(|app| app.name.clone())
                .collect(),
        };
        for name in &to_rename {
            self.rename(name, &format!("{name}{live}")).await?;
        }
        ctx.set(APPS_TO_RENAME, &to_rename)?;

        if let Some(deployed) = deployed {
            let applications: Vec<_> = deployed
                .applications
                .iter()
                .map(|app| {
                    if to_rename.contains(&app.name) {
                        app.with_name(format!("{}{live}", app.name))
                    } else {
                        app.clone()
                    }
                })
                .collect();
            let applications = UpdateBasedOnAge.update(&applications);
            ctx.set(DEPLOYED_MTA, &deployed.with_applications(applications))?;
        }

        descriptor.accept(&mut NameSuffixAppender::new(BlueGreenSuffix::Idle.as_suffix()));
        ctx.set(DEPLOYMENT_DESCRIPTOR, &descriptor)?;
        Ok(())
    }

    /// The new generation takes the color that is not live.
    fn blue_green(&self, ctx: &mut ExecutionContext) -> Result<(), StepError> {
        let mut descriptor = ctx.require(DEPLOYMENT_DESCRIPTOR)?;
        let deployed = ctx.get(DEPLOYED_MTA)?;

        let live = match &deployed {
            None => None,
            Some(mta) => self.detect_live_color(mta, ctx.correlation_id()),
        };
        let idle = live.map_or(ApplicationColor::Blue, ApplicationColor::alternate);
        match live {
            Some(live) => tracing::info!("live color is {}, deploying {}", live, idle),
            None => tracing::info!("no live color, deploying {}", idle),
        }

        ctx.set(IDLE_COLOR, &idle)?;
        ctx.set_opt(LIVE_COLOR, live.as_ref())?;
        if let (Some(deployed), Some(_)) = (&deployed, live) {
            let applications = UpdateBasedOnColor::new(live).update(&deployed.applications);
            ctx.set(DEPLOYED_MTA, &deployed.with_applications(applications))?;
        }

        descriptor.accept(&mut NameSuffixAppender::new(idle.as_suffix()));
        ctx.set(DEPLOYMENT_DESCRIPTOR, &descriptor)?;
        Ok(())
    }

    fn detect_live_color(
        &self,
        deployed: &DeployedMta,
        correlation_id: &str,
    ) -> Option<ApplicationColor> {
        let detector = ColorDetector;
        match detector.detect_singular(deployed) {
            Ok(color) => color,
            Err(conflict) => {
                let live = detector.detect_live(deployed, correlation_id);
                self.diagnostics.warn(Warning::color_conflict(format!(
                    "{conflict}; assuming {} is live",
                    live.map_or_else(|| "no color".to_string(), |c| c.to_string())
                )));
                live
            }
        }
    }
}

fn is_marked_for_deletion(name: &str) -> bool {
    name.starts_with(&namespace_prefix(MTA_FOR_DELETION_PREFIX))
}

#[async_trait]
impl Step for RenameApplicationsStep {
    fn name(&self) -> &str {
        "rename-applications"
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<StepPhase, StepError> {
        let process_type = ctx.get(PROCESS_TYPE)?.unwrap_or_default();
        let keep_original_names = ctx.get(KEEP_ORIGINAL_NAMES_AFTER_DEPLOY)?.unwrap_or(false);

        match process_type {
            ProcessType::Rollback => self.rollback(ctx).await?,
            ProcessType::Deploy if keep_original_names => self.old_new_suffix(ctx).await?,
            ProcessType::Deploy => self.blue_green(ctx)?,
        }
        Ok(StepPhase::Done)
    }

    fn error_message(&self) -> String {
        "Error renaming applications".to_string()
    }
}
