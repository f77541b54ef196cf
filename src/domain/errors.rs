//! Domain errors for the detonation lifecycle.

use thiserror::Error;

/// Errors surfaced by the provisioning gateway.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The operation observed the shutdown signal and stopped.
    #[error("operation cancelled")]
    Cancelled,

    /// The provisioning tool ran and exited unsuccessfully.
    #[error("{command} failed: {message}")]
    Command { command: String, message: String },

    /// The provisioning tool produced something we could not understand.
    #[error("unable to parse {what}: {message}")]
    Parse { what: String, message: String },

    #[error("unable to run provisioning tool: {0}")]
    Io(#[from] std::io::Error),
}

impl ProvisionError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Errors surfaced by the per-technique persistence layer.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid outputs file {path}: {source}")]
    Serialization {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StateError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub fn serialization(path: impl AsRef<std::path::Path>, source: serde_json::Error) -> Self {
        Self::Serialization {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// Errors returned by runner operations.
///
/// Every variant carries enough context (technique identifier, operation) for
/// an operator to act on it. `Cancelled` is never wrapped: callers match on it
/// to report an aborted run instead of a failure.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{0}")]
    Configuration(String),

    #[error(
        "{technique_id} has already been detonated and is not idempotent. \
         Revert it with 'detonator revert' before detonating it again, or use --force"
    )]
    AlreadyDetonated { technique_id: String },

    #[error("{technique_id} is not in DETONATED state and should not need to be reverted, use --force to force")]
    NotDetonated { technique_id: String },

    #[error("{technique_id} is already COLD and should already be clean, use --force to force cleanup")]
    AlreadyCold { technique_id: String },

    #[error(
        "unable to revert detonation of {technique_id} before cleaning up \
         (use --force to cleanup anyway): {source}"
    )]
    RevertBeforeCleanup {
        technique_id: String,
        #[source]
        source: Box<RunnerError>,
    },

    #[error("{context}: {message}")]
    Provisioning { context: String, message: String },

    #[error("Error while detonating attack technique {technique_id}: {message}")]
    Detonation { technique_id: String, message: String },

    #[error("unable to revert detonation of {technique_id}: {message}")]
    Revert { technique_id: String, message: String },

    #[error("unable to retrieve outputs of {technique_id}: {message}")]
    Outputs { technique_id: String, message: String },

    #[error("{context}: {source}")]
    State {
        context: String,
        #[source]
        source: StateError,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("worker for {technique_id} stopped before reporting a result")]
    WorkerAborted { technique_id: String },
}

impl RunnerError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::RevertBeforeCleanup { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// True when the lifecycle state forbade the operation and force was not set.
    pub fn is_guard_violation(&self) -> bool {
        matches!(
            self,
            Self::AlreadyDetonated { .. } | Self::NotDetonated { .. } | Self::AlreadyCold { .. }
        )
    }

    pub(crate) fn state(context: impl Into<String>, source: StateError) -> Self {
        Self::State {
            context: context.into(),
            source,
        }
    }
}

pub type RunnerResult<T> = Result<T, RunnerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_violation_classification() {
        let err = RunnerError::AlreadyCold {
            technique_id: "aws.t1".to_string(),
        };
        assert!(err.is_guard_violation());
        assert!(!err.is_cancelled());
        assert!(err.to_string().starts_with("aws.t1 is already COLD"));

        let err = RunnerError::Provisioning {
            context: "unable to cleanup TTP prerequisites".to_string(),
            message: "boom".to_string(),
        };
        assert!(!err.is_guard_violation());
    }

    #[test]
    fn test_cancelled_is_not_rewrapped_in_message() {
        assert_eq!(RunnerError::Cancelled.to_string(), "operation cancelled");

        let wrapped = RunnerError::RevertBeforeCleanup {
            technique_id: "aws.t1".to_string(),
            source: Box::new(RunnerError::Cancelled),
        };
        assert!(wrapped.is_cancelled());
    }
}
