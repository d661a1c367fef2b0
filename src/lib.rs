// ABOUTME: Library root for mtadeploy - exposes the deployment engine for testing.
// ABOUTME: The main binary is in main.rs.

pub mod bluegreen;
pub mod cluster;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod files;
pub mod lock;
pub mod mta;
pub mod output;
pub mod process;
pub mod scheduler;
pub mod steps;
pub mod types;
pub mod upload;
pub mod version;
