// ABOUTME: Detects which color of a deployed MTA is live.
// ABOUTME: Singular detection reports conflicts; the fallback infers from correlation ids.

use std::collections::BTreeSet;
use thiserror::Error;

use super::ApplicationColor;
use crate::mta::{DeployedMta, DeployedMtaApplication};

/// Deployed applications carry more than one color.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("deployed MTA {mta_id} has applications of conflicting colors: {colors}")]
pub struct ColorConflict {
    pub mta_id: String,
    pub colors: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ColorDetector;

impl ColorDetector {
    /// The single color all deployed applications share.
    ///
    /// `None` when there are no applications at all.
    pub fn detect_singular(
        &self,
        deployed: &DeployedMta,
    ) -> Result<Option<ApplicationColor>, ColorConflict> {
        let colors: BTreeSet<String> = deployed
            .applications
            .iter()
            .map(|app| ApplicationColor::of_application(&app.name).to_string())
            .collect();
        match colors.len() {
            0 => Ok(None),
            1 => Ok(deployed
                .applications
                .first()
                .map(|app| ApplicationColor::of_application(&app.name))),
            _ => Err(ColorConflict {
                mta_id: deployed.metadata.id.clone(),
                colors: colors.into_iter().collect::<Vec<_>>().join(", "),
            }),
        }
    }

    /// Guess the live color when both colors are deployed.
    ///
    /// The newest application deployed by a run other than `correlation_id`
    /// decides; without one, the oldest application does. This trusts the
    /// correlation ids recorded on the applications and picks the wrong color
    /// when that bookkeeping is stale.
    pub fn detect_live(
        &self,
        deployed: &DeployedMta,
        correlation_id: &str,
    ) -> Option<ApplicationColor> {
        let by_other_runs = deployed
            .applications
            .iter()
            .filter(|app| app.correlation_id.as_deref() != Some(correlation_id))
            .max_by_key(|app| app.created_at);
        by_other_runs
            .or_else(|| oldest(&deployed.applications))
            .map(|app| ApplicationColor::of_application(&app.name))
    }
}

fn oldest(applications: &[DeployedMtaApplication]) -> Option<&DeployedMtaApplication> {
    applications.iter().min_by_key(|app| app.created_at)
}
