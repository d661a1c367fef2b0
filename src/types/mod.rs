// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent GUID confusion at compile time.

mod id;
mod version;

pub use id::{AppGuid, ArchiveId, Id, JobId, PackageGuid, ProcessId, SpaceId, UploadJobId};
pub use version::{Version, VersionError};
