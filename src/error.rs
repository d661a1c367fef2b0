// ABOUTME: Application-wide error types for mtadeploy.
// ABOUTME: Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Lock(#[from] crate::lock::LockError),

    #[error(transparent)]
    File(#[from] crate::files::FileError),

    #[error(transparent)]
    Context(#[from] crate::context::ContextError),

    #[error(transparent)]
    Store(#[from] crate::context::StoreError),

    #[error(transparent)]
    Pool(#[from] crate::scheduler::PoolError),

    #[error(transparent)]
    Run(#[from] crate::engine::RunError),

    #[error("{0}")]
    RunFailed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
