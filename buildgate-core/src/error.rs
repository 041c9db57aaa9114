//! Error taxonomy for the pipeline.
//!
//! Sparse data and a missing memory document are not errors: the first
//! degrades to neutral aggregates, the second to [`crate::MemoryState::default`].
//! Only bad arguments and adapter failures surface here.

use thiserror::Error;

/// Boxed adapter error carried by the persistence and VCS variants.
pub type AdapterError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid {field}: {reason}")]
    InvalidArgument { field: &'static str, reason: String },
    #[error("failed to persist pipeline state: {source}")]
    Persistence {
        #[source]
        source: AdapterError,
    },
    #[error("dispatch to {target} failed: {reason}")]
    Dispatch { target: String, reason: String },
    #[error("version control operation failed: {source}")]
    Vcs {
        #[source]
        source: AdapterError,
    },
    #[error("no pending entry at index {index}")]
    EntryNotFound { index: usize },
    #[error("pending entry {index} is a decision record, not a task")]
    EntryNotTask { index: usize },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PipelineError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn persistence<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Persistence {
            source: Box::new(err),
        }
    }

    pub(crate) fn vcs<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Vcs {
            source: Box::new(err),
        }
    }
}

/// Errors raised when pipeline configuration invariants are violated.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be between {min:.2} and {max:.2} (got {value:.2})")]
    RangeViolation {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: &'static str,
        min: f64,
        value: f64,
    },
    #[error("tuning floor {floor:.2} must sit below build threshold {threshold:.2}")]
    ThresholdOrder { floor: f64, threshold: f64 },
}
