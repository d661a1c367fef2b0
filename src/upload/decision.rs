// ABOUTME: Decides whether a module needs a new upload, a reused package, or nothing.
// ABOUTME: Driven by the content digest recorded on the deployed application.

use super::attributes::DeployAttributes;
use super::staging::ApplicationStager;
use crate::cluster::{
    CloudApplication, CloudPackage, ClusterClient, OperationalError, OperationalResultExt,
};
use crate::diagnostics::{Diagnostics, Warning};

#[derive(Debug, Clone, PartialEq)]
pub enum UploadDecision {
    /// Upload the module; `content_changed` is false when only the remote
    /// package state forces it.
    Upload { content_changed: bool },
    /// An unused package of the same content stands in for the upload.
    Reuse(CloudPackage),
    /// Content unchanged and already staged.
    Skip,
}

pub struct UploadDecisionEngine<'a> {
    client: &'a dyn ClusterClient,
    diagnostics: &'a Diagnostics,
}

impl<'a> UploadDecisionEngine<'a> {
    pub fn new(client: &'a dyn ClusterClient, diagnostics: &'a Diagnostics) -> Self {
        Self {
            client,
            diagnostics,
        }
    }

    pub async fn decide(
        &self,
        app: &CloudApplication,
        digest: &str,
    ) -> Result<UploadDecision, OperationalError> {
        let attributes = DeployAttributes::from_env(&app.env);
        if attributes.digest() != Some(digest) {
            tracing::info!(
                "content of application {} changed (digest {})",
                app.name,
                digest
            );
            self.persist_digest(app, attributes, digest).await;
            return Ok(UploadDecision::Upload {
                content_changed: true,
            });
        }

        let unused = self
            .client
            .get_latest_unused_package(&app.guid)
            .await
            .context_op("find unused package", &app.name)?;
        match unused {
            Some(package) if package.status.is_valid_for_reuse() => {
                tracing::info!(
                    "reusing package {} ({}) of application {}",
                    package.guid,
                    package.status,
                    app.name
                );
                Ok(UploadDecision::Reuse(package))
            }
            Some(package) => {
                tracing::info!(
                    "package {} of application {} is {}, uploading again",
                    package.guid,
                    app.name,
                    package.status
                );
                Ok(UploadDecision::Upload {
                    content_changed: false,
                })
            }
            None => {
                if ApplicationStager::new(self.client)
                    .is_staged_correctly(app)
                    .await?
                {
                    tracing::info!("content of application {} is unchanged", app.name);
                    Ok(UploadDecision::Skip)
                } else {
                    tracing::info!("application {} is not staged, uploading again", app.name);
                    Ok(UploadDecision::Upload {
                        content_changed: false,
                    })
                }
            }
        }
    }

    async fn persist_digest(
        &self,
        app: &CloudApplication,
        attributes: DeployAttributes,
        digest: &str,
    ) {
        let env = attributes.with_digest(digest).apply_to(&app.env);
        if let Err(e) = self
            .client
            .update_application_env(&app.name, env)
            .await
            .context_op("update environment", &app.name)
        {
            self.diagnostics.warn(Warning::digest_not_persisted(format!(
                "could not store content digest: {e}"
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{BuildState, CloudBuild, ClusterState, InMemoryCluster, PackageStatus};
    use crate::types::{AppGuid, PackageGuid};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn app(digest: Option<&str>) -> CloudApplication {
        let env = match digest {
            Some(d) => DeployAttributes::default()
                .with_digest(d)
                .apply_to(&BTreeMap::new()),
            None => BTreeMap::new(),
        };
        CloudApplication {
            name: "web".to_string(),
            guid: AppGuid::new("app-1"),
            env,
            created_at: Utc::now(),
        }
    }

    fn package(status: PackageStatus) -> CloudPackage {
        CloudPackage {
            guid: PackageGuid::new("pkg-1"),
            app_guid: AppGuid::new("app-1"),
            status,
            created_at: Utc::now(),
            used: false,
        }
    }

    fn cluster(packages: Vec<CloudPackage>, builds: Vec<CloudBuild>) -> InMemoryCluster {
        InMemoryCluster::new(ClusterState {
            applications: vec![app(Some("OLD"))],
            packages,
            builds,
            ..ClusterState::default()
        })
    }

    #[tokio::test]
    async fn changed_digest_uploads_and_persists() {
        let cluster = cluster(vec![package(PackageStatus::Ready)], vec![]);
        let diagnostics = Diagnostics::default();
        let decision = UploadDecisionEngine::new(&cluster, &diagnostics)
            .decide(&app(Some("OLD")), "NEW")
            .await
            .unwrap();
        assert_eq!(decision, UploadDecision::Upload { content_changed: true });
        assert_eq!(cluster.calls_of("update_application_env"), 1);
        assert_eq!(cluster.calls_of("get_latest_unused_package"), 0);

        let snapshot = cluster.snapshot();
        let stored = &snapshot.applications[0];
        assert_eq!(DeployAttributes::from_env(&stored.env).digest(), Some("NEW"));
    }

    #[tokio::test]
    async fn digest_persistence_failure_is_a_warning() {
        let cluster = cluster(vec![], vec![]);
        cluster.fail_next("update_application_env", OperationalError::new(500, "boom"));
        let diagnostics = Diagnostics::default();
        let decision = UploadDecisionEngine::new(&cluster, &diagnostics)
            .decide(&app(None), "NEW")
            .await
            .unwrap();
        assert_eq!(decision, UploadDecision::Upload { content_changed: true });
        assert!(diagnostics.has_warnings());
    }

    #[tokio::test]
    async fn same_digest_reuses_processing_package() {
        let cluster = cluster(vec![package(PackageStatus::ProcessingUpload)], vec![]);
        let diagnostics = Diagnostics::default();
        let decision = UploadDecisionEngine::new(&cluster, &diagnostics)
            .decide(&app(Some("SAME")), "SAME")
            .await
            .unwrap();
        assert!(matches!(decision, UploadDecision::Reuse(p) if p.guid.as_str() == "pkg-1"));
    }

    #[tokio::test]
    async fn same_digest_expired_package_uploads() {
        let cluster = cluster(vec![package(PackageStatus::Expired)], vec![]);
        let diagnostics = Diagnostics::default();
        let decision = UploadDecisionEngine::new(&cluster, &diagnostics)
            .decide(&app(Some("SAME")), "SAME")
            .await
            .unwrap();
        assert_eq!(decision, UploadDecision::Upload { content_changed: false });
    }

    #[tokio::test]
    async fn same_digest_without_package_depends_on_staging() {
        let staged = CloudBuild {
            app_guid: AppGuid::new("app-1"),
            state: BuildState::Staged,
            created_at: Some(Utc::now()),
            droplet_guid: Some("droplet".to_string()),
        };
        let diagnostics = Diagnostics::default();

        let cluster_staged = cluster(vec![], vec![staged]);
        let decision = UploadDecisionEngine::new(&cluster_staged, &diagnostics)
            .decide(&app(Some("SAME")), "SAME")
            .await
            .unwrap();
        assert_eq!(decision, UploadDecision::Skip);

        let cluster_unstaged = cluster(vec![], vec![]);
        let decision = UploadDecisionEngine::new(&cluster_unstaged, &diagnostics)
            .decide(&app(Some("SAME")), "SAME")
            .await
            .unwrap();
        assert_eq!(decision, UploadDecision::Upload { content_changed: false });
    }
}
