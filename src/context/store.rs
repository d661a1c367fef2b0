// ABOUTME: Durable checkpoints of execution contexts.
// ABOUTME: JSON files for restart-safe runs, an in-memory store for tests.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::ExecutionContext;
use crate::types::ProcessId;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("checkpoint I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persists a run's context between phase transitions.
pub trait ContextStore: Send + Sync {
    fn save(&self, ctx: &ExecutionContext) -> Result<(), StoreError>;
    fn load(&self, process: &ProcessId) -> Result<Option<ExecutionContext>, StoreError>;
    fn remove(&self, process: &ProcessId) -> Result<(), StoreError>;
}

/// One `<process-id>.json` file per run under a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, process: &ProcessId) -> PathBuf {
        self.dir.join(format!("{}.json", process))
    }

    fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
        move |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl ContextStore for JsonFileStore {
    fn save(&self, ctx: &ExecutionContext) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(Self::io_error(&self.dir))?;
        let path = self.path_for(ctx.process_id());
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(ctx)?;
        // Write-then-rename so a crash never leaves a torn checkpoint.
        std::fs::write(&tmp, json).map_err(Self::io_error(&tmp))?;
        std::fs::rename(&tmp, &path).map_err(Self::io_error(&path))?;
        Ok(())
    }

    fn load(&self, process: &ProcessId) -> Result<Option<ExecutionContext>, StoreError> {
        let path = self.path_for(process);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(&path)(e)),
        }
    }

    fn remove(&self, process: &ProcessId) -> Result<(), StoreError> {
        let path = self.path_for(process);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(&path)(e)),
        }
    }
}

/// Keeps checkpoints in memory; counts saves for assertions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    contexts: Mutex<HashMap<ProcessId, ExecutionContext>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl ContextStore for MemoryStore {
    fn save(&self, ctx: &ExecutionContext) -> Result<(), StoreError> {
        self.contexts
            .lock()
            .insert(ctx.process_id().clone(), ctx.clone());
        *self.saves.lock() += 1;
        Ok(())
    }

    fn load(&self, process: &ProcessId) -> Result<Option<ExecutionContext>, StoreError> {
        Ok(self.contexts.lock().get(process).cloned())
    }

    fn remove(&self, process: &ProcessId) -> Result<(), StoreError> {
        self.contexts.lock().remove(process);
        Ok(())
    }
}
