//! # Reader Error Types
//!
//! Structured error handling for the batch reader using thiserror.
//!
//! Errors fall into three groups:
//! - **Fatal at construction**: [`ReaderError::Configuration`]
//! - **Retryable per read**: [`ReaderError::Fetch`], raised before any cursor mutation
//! - **Fatal at restore**: [`ReaderError::Checkpoint`] unless recovery is configured
//!
//! Per-item timestamp lookup failures are not errors of the read call; they are
//! collected as [`SkippedItem`] records.

use crate::models::ResourcePid;
use thiserror::Error;

/// Errors surfaced by the reader, its codec and the step runner
#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Search failed for {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Batch processing failed: {message}")]
    Processing { message: String },
}

impl ReaderError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a fetch error for the given search url
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a processing error
    pub fn processing(message: impl Into<String>) -> Self {
        Self::Processing {
            message: message.into(),
        }
    }

    /// Whether calling `read()` again may succeed from the same cursor position
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }
}

/// Errors raised while restoring or saving checkpoint state
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Corrupt checkpoint value for key '{key}': {message}")]
    CorruptValue { key: String, message: String },

    #[error("Checkpoint partition index {index} exceeds partition count {partitions}")]
    IndexOutOfRange { index: i64, partitions: usize },

    #[error("Checkpoint for partition {index} has a tie set but no threshold")]
    OrphanTieSet { index: usize },

    #[error("Checkpoint serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CheckpointError {
    /// Create a corrupt-value error
    pub fn corrupt_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Failure to recover the last-updated timestamp of a single resource
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Resource {pid} not found")]
    NotFound { pid: ResourcePid },

    #[error("Resource {pid} unavailable: {message}")]
    Unavailable { pid: ResourcePid, message: String },
}

/// Failure reported by a [`crate::search::ResultFetcher`] implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct FetchError {
    pub message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A resource that was emitted but could not take part in threshold computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub partition_index: usize,
    pub pid: ResourcePid,
    pub reason: LookupError,
}

pub type Result<T> = std::result::Result<T, ReaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_fetch_errors_are_retryable() {
        assert!(ReaderError::fetch("Patient?", "connection reset").is_retryable());
        assert!(!ReaderError::configuration("empty url list").is_retryable());
        assert!(!ReaderError::processing("downstream failed").is_retryable());

        let checkpoint: ReaderError = CheckpointError::OrphanTieSet { index: 2 }.into();
        assert!(!checkpoint.is_retryable());
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = ReaderError::fetch("Observation?status=final", "timeout");
        assert_eq!(
            err.to_string(),
            "Search failed for Observation?status=final: timeout"
        );

        let err = CheckpointError::corrupt_value("current.threshold-high.0", "not a number");
        assert!(err.to_string().contains("current.threshold-high.0"));

        let err = LookupError::NotFound {
            pid: ResourcePid::new(42),
        };
        assert_eq!(err.to_string(), "Resource 42 not found");
    }
}
