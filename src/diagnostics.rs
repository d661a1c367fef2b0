// ABOUTME: Diagnostics accumulator for non-fatal warnings during a deployment run.
// ABOUTME: Shared by the steps of a run; the CLI prints the warnings at the end.

use parking_lot::Mutex;

/// Collects non-fatal warnings during deployment operations.
///
/// Steps hold it behind an `Arc`, so recording takes `&self`.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Mutex<Vec<Warning>>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.lock().push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings.lock().clone()
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.lock().is_empty()
    }
}

/// A non-fatal warning collected during deployment.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn color_conflict(message: impl Into<String>) -> Self {
        Self::new(WarningKind::ColorConflict, message)
    }

    pub fn version_rule_ignored(message: impl Into<String>) -> Self {
        Self::new(WarningKind::VersionRuleIgnored, message)
    }

    pub fn digest_not_persisted(message: impl Into<String>) -> Self {
        Self::new(WarningKind::DigestNotPersisted, message)
    }

    pub fn service_broker(message: impl Into<String>) -> Self {
        Self::new(WarningKind::ServiceBroker, message)
    }

    /// Create a lock release warning.
    pub fn lock_release(message: impl Into<String>) -> Self {
        Self::new(WarningKind::LockRelease, message)
    }
}

/// Categories of warnings that can occur during deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Deployed applications carried both colors; the live one was inferred.
    ColorConflict,
    /// The deployed version was unknown, so the version rule was skipped.
    VersionRuleIgnored,
    /// The new content digest could not be stored on the application.
    DigestNotPersisted,
    /// A service broker could not be updated.
    ServiceBroker,
    /// Failed to release the operation lock (lock file may remain).
    LockRelease,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_starts_empty() {
        let diag = Diagnostics::default();
        assert!(!diag.has_warnings());
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn diagnostics_collects_warnings() {
        let diag = Diagnostics::default();

        diag.warn(Warning::lock_release("failed to remove lock file"));
        diag.warn(Warning::color_conflict("both colors deployed"));

        assert!(diag.has_warnings());
        assert_eq!(diag.warnings().len(), 2);
        assert_eq!(diag.warnings()[1].kind, WarningKind::ColorConflict);
    }
}
