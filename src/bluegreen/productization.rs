// ABOUTME: Marks deployed applications live or idle before the new generation lands.
// ABOUTME: Either by color (blue-green suffixes) or by age (kept original names).

use std::collections::HashMap;

use super::ApplicationColor;
use crate::mta::{DeployedMtaApplication, ProductizationState};

pub trait ProductizationStateUpdater {
    fn update(&self, applications: &[DeployedMtaApplication]) -> Vec<DeployedMtaApplication>;
}

/// Applications not of the live color become idle.
#[derive(Debug, Clone, Copy)]
pub struct UpdateBasedOnColor {
    live: Option<ApplicationColor>,
}

impl UpdateBasedOnColor {
    pub fn new(live: Option<ApplicationColor>) -> Self {
        Self { live }
    }
}

impl ProductizationStateUpdater for UpdateBasedOnColor {
    fn update(&self, applications: &[DeployedMtaApplication]) -> Vec<DeployedMtaApplication> {
        let Some(live) = self.live else {
            return applications.to_vec();
        };
        applications
            .iter()
            .map(|app| {
                if ApplicationColor::of_application(&app.name) == live {
                    app.clone()
                } else {
                    tracing::debug!("application {} is idle", app.name);
                    app.with_productization_state(ProductizationState::Idle)
                }
            })
            .collect()
    }
}

/// The newest application of a module with several applications becomes idle.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateBasedOnAge;

impl ProductizationStateUpdater for UpdateBasedOnAge {
    fn update(&self, applications: &[DeployedMtaApplication]) -> Vec<DeployedMtaApplication> {
        let mut by_module: HashMap<&str, Vec<&DeployedMtaApplication>> = HashMap::new();
        for app in applications {
            by_module.entry(&app.module_name).or_default().push(app);
        }
        let newest: Vec<&str> = by_module
            .values()
            .filter(|apps| apps.len() > 1)
            .filter_map(|apps| apps.iter().max_by_key(|app| app.created_at))
            .map(|app| app.name.as_str())
            .collect();

        applications
            .iter()
            .map(|app| {
                if newest.contains(&app.name.as_str()) {
                    tracing::debug!("application {} is idle", app.name);
                    app.with_productization_state(ProductizationState::Idle)
                } else {
                    app.clone()
                }
            })
            .collect()
    }
}
