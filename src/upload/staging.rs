// ABOUTME: Checks whether an application was staged correctly from its last build.
// ABOUTME: An unstaged application always gets a fresh upload.

use crate::cluster::{
    BuildState, CloudApplication, ClusterClient, OperationalError, OperationalResultExt,
};

pub struct ApplicationStager<'a> {
    client: &'a dyn ClusterClient,
}

impl<'a> ApplicationStager<'a> {
    pub fn new(client: &'a dyn ClusterClient) -> Self {
        Self { client }
    }

    /// The latest build is STAGED and produced a droplet.
    ///
    /// No builds, or a build without a creation time, count as not staged.
    pub async fn is_staged_correctly(
        &self,
        app: &CloudApplication,
    ) -> Result<bool, OperationalError> {
        let builds = self
            .client
            .get_builds_for_application(&app.guid)
            .await
            .context_op("list builds", &app.name)?;
        if builds.iter().any(|b| b.created_at.is_none()) {
            tracing::debug!("application {} has a build still being created", app.name);
            return Ok(false);
        }
        let Some(latest) = builds.iter().max_by_key(|b| b.created_at) else {
            return Ok(false);
        };
        let staged = latest.state == BuildState::Staged && latest.droplet_guid.is_some();
        tracing::debug!(app = %app.name, state = ?latest.state, staged, "latest build");
        Ok(staged)
    }
}
