// ABOUTME: Execution context shared by the sequential steps of one run.
// ABOUTME: JSON-valued variable bag with typed keys and a resumable cursor.

mod store;
pub mod variables;

pub use store::{ContextStore, JsonFileStore, MemoryStore, StoreError};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use thiserror::Error;

use crate::types::ProcessId;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("missing required variable: {0}")]
    Missing(&'static str),

    #[error("variable {name} holds a malformed value: {source}")]
    Malformed {
        name: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// A typed key into the execution context.
pub struct Variable<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Variable<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for Variable<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Variable<T> {}

impl<T> std::fmt::Debug for Variable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Variable({})", self.name)
    }
}

/// Where the run stands, persisted with every checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Index of the step currently executing.
    pub step: usize,
    /// Attempts already spent on the current step.
    pub attempts: u32,
    /// Set when the current step first returned POLL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polling_since: Option<DateTime<Utc>>,
    /// The run reached a terminal state.
    #[serde(default)]
    pub completed: bool,
}

/// Variables and progress of one deployment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    process_id: ProcessId,
    correlation_id: String,
    #[serde(default)]
    variables: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    cursor: Cursor,
}

impl ExecutionContext {
    /// Start a fresh run with a new correlation id.
    pub fn new(process_id: ProcessId) -> Self {
        Self {
            process_id,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            variables: BTreeMap::new(),
            cursor: Cursor::default(),
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn process_id(&self) -> &ProcessId {
        &self.process_id
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    pub fn contains<T>(&self, var: Variable<T>) -> bool {
        self.variables.contains_key(var.name)
    }

    pub fn get<T: DeserializeOwned>(&self, var: Variable<T>) -> Result<Option<T>, ContextError> {
        self.variables
            .get(var.name)
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|source| ContextError::Malformed {
                    name: var.name,
                    source,
                })
            })
            .transpose()
    }

    /// Read a variable an earlier step must have set.
    pub fn require<T: DeserializeOwned>(&self, var: Variable<T>) -> Result<T, ContextError> {
        self.get(var)?.ok_or(ContextError::Missing(var.name))
    }

    pub fn set<T: Serialize>(&mut self, var: Variable<T>, value: &T) -> Result<(), ContextError> {
        let value = serde_json::to_value(value).map_err(|source| ContextError::Malformed {
            name: var.name,
            source,
        })?;
        self.variables.insert(var.name.to_string(), value);
        Ok(())
    }

    /// Set the variable when `value` is present, otherwise remove it.
    pub fn set_opt<T: Serialize>(
        &mut self,
        var: Variable<T>,
        value: Option<&T>,
    ) -> Result<(), ContextError> {
        match value {
            Some(value) => self.set(var, value),
            None => {
                self.remove(var);
                Ok(())
            }
        }
    }

    pub fn remove<T>(&mut self, var: Variable<T>) {
        self.variables.remove(var.name);
    }
}
