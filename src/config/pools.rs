// ABOUTME: Sizing of the upload worker pools, retries, and upload limits.
// ABOUTME: Every field has a default so the sections are optional in YAML.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::engine::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolsConfig {
    #[serde(default = "default_file_storage_workers")]
    pub file_storage_workers: usize,

    /// Initial queue size; the priority queue grows past it.
    #[serde(default = "default_queue_capacity")]
    pub file_storage_queue_capacity: usize,

    #[serde(default = "default_controller_workers")]
    pub controller_workers: usize,

    #[serde(default = "default_url_fetch_core_workers")]
    pub url_fetch_core_workers: usize,

    #[serde(default = "default_url_fetch_max_workers")]
    pub url_fetch_max_workers: usize,

    #[serde(default = "default_queue_capacity")]
    pub url_fetch_queue_capacity: usize,

    #[serde(default = "default_keep_alive", with = "humantime_serde")]
    pub url_fetch_keep_alive: Duration,
}

impl Default for PoolsConfig {
    fn default() -> Self {
        Self {
            file_storage_workers: default_file_storage_workers(),
            file_storage_queue_capacity: default_queue_capacity(),
            controller_workers: default_controller_workers(),
            url_fetch_core_workers: default_url_fetch_core_workers(),
            url_fetch_max_workers: default_url_fetch_max_workers(),
            url_fetch_queue_capacity: default_queue_capacity(),
            url_fetch_keep_alive: default_keep_alive(),
        }
    }
}

fn default_file_storage_workers() -> usize {
    4
}

fn default_controller_workers() -> usize {
    4
}

fn default_url_fetch_core_workers() -> usize {
    5
}

fn default_url_fetch_max_workers() -> usize {
    10
}

fn default_queue_capacity() -> usize {
    20
}

fn default_keep_alive() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_delay", with = "humantime_serde")]
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            delay: default_delay(),
        }
    }
}

fn default_attempts() -> u32 {
    3
}

fn default_delay() -> Duration {
    Duration::from_secs(1)
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy {
            attempts: config.attempts,
            delay: config.delay,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Applies to applications that do not declare their own upload timeout.
    #[serde(default = "default_upload_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Largest module slice, in bytes, that is digested or extracted.
    #[serde(default = "default_max_resource_size")]
    pub max_resource_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            timeout: default_upload_timeout(),
            max_resource_size: default_max_resource_size(),
        }
    }
}

fn default_upload_timeout() -> Duration {
    Duration::from_secs(3600)
}

fn default_max_resource_size() -> u64 {
    1024 * 1024 * 1024
}
