// ABOUTME: Version gate deciding whether a requested MTA version may be deployed.
// ABOUTME: Computes the deployment type and checks it against the version rule.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::engine::StepError;
use crate::mta::MtaMetadata;
use crate::types::Version;

/// How the requested version relates to the deployed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentType {
    Deployment,
    Upgrade,
    Downgrade,
    Redeployment,
}

impl fmt::Display for DeploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeploymentType::Deployment => "DEPLOYMENT",
            DeploymentType::Upgrade => "UPGRADE",
            DeploymentType::Downgrade => "DOWNGRADE",
            DeploymentType::Redeployment => "REDEPLOYMENT",
        };
        write!(f, "{s}")
    }
}

/// Which deployment types a run accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionRule {
    All,
    #[default]
    SameHigher,
    Higher,
}

impl VersionRule {
    /// Only `All` accepts a redeployment or a downgrade; a first deployment
    /// and an upgrade pass every rule.
    pub fn allows(self, deployment_type: DeploymentType) -> bool {
        match self {
            VersionRule::All => true,
            VersionRule::SameHigher | VersionRule::Higher => matches!(
                deployment_type,
                DeploymentType::Deployment | DeploymentType::Upgrade
            ),
        }
    }
}

impl fmt::Display for VersionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VersionRule::All => "ALL",
            VersionRule::SameHigher => "SAME_HIGHER",
            VersionRule::Higher => "HIGHER",
        };
        write!(f, "{s}")
    }
}

impl FromStr for VersionRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ALL" => Ok(VersionRule::All),
            "SAME_HIGHER" => Ok(VersionRule::SameHigher),
            "HIGHER" => Ok(VersionRule::Higher),
            other => Err(format!("unknown version rule: {other}")),
        }
    }
}

/// Outcome of comparing the deployed MTA with the requested version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionDecision {
    pub deployment_type: DeploymentType,
    /// The deployed version could not be compared, so the rule was not applied.
    pub rule_ignored: bool,
}

/// Classify the requested version against what is deployed.
///
/// An absent deployed MTA is a first deployment. A deployed MTA whose
/// version is missing or unparsable counts as an upgrade.
pub fn deployment_type(deployed: Option<&MtaMetadata>, requested: &Version) -> VersionDecision {
    let Some(deployed) = deployed else {
        return VersionDecision {
            deployment_type: DeploymentType::Deployment,
            rule_ignored: false,
        };
    };
    let Some(deployed_version) = deployed.parsed_version() else {
        return VersionDecision {
            deployment_type: DeploymentType::Upgrade,
            rule_ignored: true,
        };
    };
    let deployment_type = match requested.cmp(&deployed_version) {
        std::cmp::Ordering::Greater => DeploymentType::Upgrade,
        std::cmp::Ordering::Equal => DeploymentType::Redeployment,
        std::cmp::Ordering::Less => DeploymentType::Downgrade,
    };
    VersionDecision {
        deployment_type,
        rule_ignored: false,
    }
}

/// Gate a computed deployment type through the version rule.
pub fn check_version(
    rule: VersionRule,
    decision: VersionDecision,
    deployed: Option<&MtaMetadata>,
) -> Result<DeploymentType, StepError> {
    let deployment_type = decision.deployment_type;
    if decision.rule_ignored || rule.allows(deployment_type) {
        return Ok(deployment_type);
    }
    let deployed_version = deployed
        .and_then(|m| m.version.as_deref())
        .unwrap_or("unknown");
    match deployment_type {
        DeploymentType::Downgrade => Err(StepError::content(format!(
            "higher version already deployed: {deployed_version}"
        ))),
        DeploymentType::Redeployment => Err(StepError::content(format!(
            "same version already deployed: {deployed_version}"
        ))),
        other => Err(StepError::invariant(format!(
            "version rule {rule} does not allow deployment type {other}"
        ))),
    }
}
