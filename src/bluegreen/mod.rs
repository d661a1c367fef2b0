// ABOUTME: Blue-green naming: colors, suffixes, namespaces, and the descriptor rewrite.
// ABOUTME: Detection and productization updates live in the submodules.

mod detector;
mod productization;

pub use detector::{ColorConflict, ColorDetector};
pub use productization::{ProductizationStateUpdater, UpdateBasedOnAge, UpdateBasedOnColor};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::descriptor::{DescriptorVisitor, Module};

/// Prefix of applications scheduled for deletion after a rollback.
pub const MTA_FOR_DELETION_PREFIX: &str = "to-be-deleted";

/// Namespace holding the previous generation of applications.
pub const MTA_BACKUP_NAMESPACE: &str = "mta-backup";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApplicationColor {
    Blue,
    Green,
}

impl ApplicationColor {
    pub fn alternate(self) -> Self {
        match self {
            ApplicationColor::Blue => ApplicationColor::Green,
            ApplicationColor::Green => ApplicationColor::Blue,
        }
    }

    pub fn as_suffix(self) -> &'static str {
        match self {
            ApplicationColor::Blue => "-blue",
            ApplicationColor::Green => "-green",
        }
    }

    /// Color encoded in an application name; anything not green is blue.
    pub fn of_application(name: &str) -> Self {
        if name.ends_with(ApplicationColor::Green.as_suffix()) {
            ApplicationColor::Green
        } else {
            ApplicationColor::Blue
        }
    }
}

impl fmt::Display for ApplicationColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationColor::Blue => write!(f, "BLUE"),
            ApplicationColor::Green => write!(f, "GREEN"),
        }
    }
}

/// Suffixes used when original names are kept after the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlueGreenSuffix {
    Idle,
    Live,
}

impl BlueGreenSuffix {
    pub fn as_suffix(self) -> &'static str {
        match self {
            BlueGreenSuffix::Idle => "-idle",
            BlueGreenSuffix::Live => "-live",
        }
    }
}

pub fn namespace_prefix(namespace: &str) -> String {
    format!("{namespace}-")
}

/// Name a deployed application gets while it waits for deletion.
pub fn to_be_deleted_name(name: &str) -> String {
    format!("{}{}", namespace_prefix(MTA_FOR_DELETION_PREFIX), name)
}

/// Original name of a backup application, if it carries the backup prefix.
pub fn strip_backup_namespace(name: &str) -> Option<&str> {
    name.strip_prefix(&namespace_prefix(MTA_BACKUP_NAMESPACE))
}

/// Appends a suffix to every application name of a descriptor.
#[derive(Debug, Clone)]
pub struct NameSuffixAppender {
    suffix: String,
}

impl NameSuffixAppender {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }
}

impl DescriptorVisitor for NameSuffixAppender {
    fn visit_module(&mut self, module: &mut Module) {
        module.app_name = Some(format!("{}{}", module.app_name(), self.suffix));
    }
}
