// ABOUTME: Remote cluster-management API boundary.
// ABOUTME: Client trait, domain types, classified errors, and an in-memory cluster.

mod client;
mod error;
mod memory;
mod types;

pub use client::ClusterClient;
pub use error::{OperationalError, OperationalResultExt};
pub use memory::{ClusterCall, ClusterState, InMemoryCluster};
pub use types::{
    BuildState, CloudApplication, CloudBuild, CloudJob, CloudPackage, ENV_DEPLOY_ATTRIBUTES,
    JobState, PackageStatus, ServiceBroker,
};
