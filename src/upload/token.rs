// ABOUTME: Handle of the package a module's upload step waits for.
// ABOUTME: Either a freshly started upload or a reused remote package.

use serde::{Deserialize, Serialize};

use crate::types::{PackageGuid, UploadJobId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UploadToken {
    /// A new upload whose local progress is tracked under `job`.
    Started {
        job: UploadJobId,
        package: PackageGuid,
    },
    /// An unused remote package stands in for the upload.
    Reused { package: PackageGuid },
}

impl UploadToken {
    pub fn package(&self) -> &PackageGuid {
        match self {
            UploadToken::Started { package, .. } | UploadToken::Reused { package } => package,
        }
    }

    pub fn job(&self) -> Option<&UploadJobId> {
        match self {
            UploadToken::Started { job, .. } => Some(job),
            UploadToken::Reused { .. } => None,
        }
    }
}
