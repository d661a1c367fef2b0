// ABOUTME: Configuration types and parsing for mtadeploy.yml.
// ABOUTME: Handles YAML parsing, defaults, path resolution, and validation.

mod deserialize;
mod init;
mod pools;

pub use deserialize::ArchiveSource;
pub use init::init_config;
pub use pools::{PoolsConfig, RetryConfig, UploadConfig};

use crate::error::{Error, Result};
use crate::version::VersionRule;
use deserialize::deserialize_archive_source;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "mtadeploy.yml";
pub const CONFIG_FILENAME_ALT: &str = "mtadeploy.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".mtadeploy/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Target space of the deployment.
    pub space: String,

    /// Deployment descriptor YAML.
    pub descriptor: PathBuf,

    #[serde(deserialize_with = "deserialize_archive_source")]
    pub archive: ArchiveSource,

    /// Snapshot file backing the simulated cluster.
    #[serde(default = "default_cluster_state")]
    pub cluster_state: PathBuf,

    #[serde(default)]
    pub version_rule: VersionRule,

    /// Keep the original application names once the deployment finished.
    #[serde(default)]
    pub keep_original_names: bool,

    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub upload: UploadConfig,

    #[serde(default)]
    pub pools: PoolsConfig,

    /// Checkpoints, locks, and the local archive store live here.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

fn default_cluster_state() -> PathBuf {
    PathBuf::from("cluster.yml")
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".mtadeploy")
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml).map_err(Error::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file; relative paths resolve against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(config.resolve_paths(base))
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                let config = Self::from_yaml(&std::fs::read_to_string(path)?)?;
                return Ok(config.resolve_paths(dir));
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    fn resolve_paths(mut self, base: &Path) -> Self {
        let resolve = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                base.join(p)
            }
        };
        self.descriptor = resolve(&self.descriptor);
        self.cluster_state = resolve(&self.cluster_state);
        self.state_dir = resolve(&self.state_dir);
        if let ArchiveSource::Path(path) = &self.archive {
            self.archive = ArchiveSource::Path(resolve(path));
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if self.space.trim().is_empty() {
            return Err(Error::InvalidConfig("space must not be empty".to_string()));
        }
        if self.retry.attempts == 0 {
            return Err(Error::InvalidConfig(
                "retry.attempts must be at least 1".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "poll_interval must be positive".to_string(),
            ));
        }
        let pools = &self.pools;
        if pools.file_storage_workers == 0
            || pools.controller_workers == 0
            || pools.url_fetch_core_workers == 0
        {
            return Err(Error::InvalidConfig(
                "worker pools need at least one worker".to_string(),
            ));
        }
        if pools.url_fetch_max_workers < pools.url_fetch_core_workers {
            return Err(Error::InvalidConfig(format!(
                "pools.url_fetch_max_workers ({}) is below url_fetch_core_workers ({})",
                pools.url_fetch_max_workers, pools.url_fetch_core_workers
            )));
        }
        Ok(())
    }

    pub fn template() -> Self {
        Config {
            space: "dev".to_string(),
            descriptor: PathBuf::from("mtad.yaml"),
            archive: ArchiveSource::Path(PathBuf::from("app.mtar")),
            cluster_state: default_cluster_state(),
            version_rule: VersionRule::default(),
            keep_original_names: false,
            poll_interval: default_poll_interval(),
            retry: RetryConfig::default(),
            upload: UploadConfig::default(),
            pools: PoolsConfig::default(),
            state_dir: default_state_dir(),
        }
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.state_dir.join("locks")
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.state_dir.join("runs")
    }

    pub fn archives_dir(&self) -> PathBuf {
        self.state_dir.join("archives")
    }
}
