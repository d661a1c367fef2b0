// ABOUTME: Classified operational errors returned by the cluster API.
// ABOUTME: Carries an HTTP-like status plus operation and entity context.

use thiserror::Error;

/// A failed cluster operation.
///
/// Status `0` stands for a transport failure where no response was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}{}", context_prefix(.operation, .entity), outcome(.status, .description))]
pub struct OperationalError {
    pub status: u16,
    pub description: String,
    pub operation: Option<String>,
    pub entity: Option<String>,
}

impl OperationalError {
    pub fn new(status: u16, description: impl Into<String>) -> Self {
        Self {
            status,
            description: description.into(),
            operation: None,
            entity: None,
        }
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        let entity = entity.into();
        Self {
            status: 404,
            description: format!("{entity} not found"),
            operation: None,
            entity: Some(entity),
        }
    }

    pub fn network(description: impl Into<String>) -> Self {
        Self::new(0, description)
    }

    /// Attach the operation and entity this error happened on.
    pub fn with_context(mut self, operation: &str, entity: &str) -> Self {
        self.operation = Some(operation.to_string());
        self.entity = Some(entity.to_string());
        self
    }

    /// Network failures, request timeouts, throttling, and server errors.
    pub fn is_transient(&self) -> bool {
        matches!(self.status, 0 | 408 | 429) || self.status >= 500
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

fn context_prefix(operation: &Option<String>, entity: &Option<String>) -> String {
    match (operation, entity) {
        (Some(op), Some(entity)) => format!("{op} of {entity} failed: "),
        (Some(op), None) => format!("{op} failed: "),
        _ => String::new(),
    }
}

fn outcome(status: &u16, description: &str) -> String {
    if *status == 0 {
        format!("network error: {description}")
    } else {
        format!("{status} {description}")
    }
}

/// Extension trait for adding operation context to cluster results.
pub trait OperationalResultExt<T> {
    fn context_op(self, operation: &str, entity: &str) -> Result<T, OperationalError>;
}

impl<T> OperationalResultExt<T> for Result<T, OperationalError> {
    fn context_op(self, operation: &str, entity: &str) -> Result<T, OperationalError> {
        self.map_err(|e| e.with_context(operation, entity))
    }
}
