// ABOUTME: Snapshot of an MTA already deployed on the cluster.
// ABOUTME: Applications carry module, age, correlation id, and live/idle state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Version;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployedMta {
    pub metadata: MtaMetadata,
    #[serde(default)]
    pub applications: Vec<DeployedMtaApplication>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MtaMetadata {
    pub id: String,
    /// Raw version string as recorded on the cluster; may be absent or garbage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl MtaMetadata {
    /// The parsed version, or `None` when it is absent or unparsable.
    pub fn parsed_version(&self) -> Option<Version> {
        self.version.as_deref().and_then(|v| Version::parse(v).ok())
    }

    pub fn is_version_unknown(&self) -> bool {
        self.parsed_version().is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductizationState {
    #[default]
    Live,
    Idle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployedMtaApplication {
    pub name: String,
    pub module_name: String,
    pub created_at: DateTime<Utc>,
    /// Correlation id of the run that deployed this application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub productization_state: ProductizationState,
}

impl DeployedMtaApplication {
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    pub fn with_productization_state(&self, state: ProductizationState) -> Self {
        Self {
            productization_state: state,
            ..self.clone()
        }
    }
}

impl DeployedMta {
    pub fn with_applications(&self, applications: Vec<DeployedMtaApplication>) -> Self {
        Self {
            metadata: self.metadata.clone(),
            applications,
        }
    }

    pub fn application(&self, name: &str) -> Option<&DeployedMtaApplication> {
        self.applications.iter().find(|app| app.name == name)
    }
}
