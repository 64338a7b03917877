//! Error types for covrun

use thiserror::Error;

use crate::preflight::Dependency;

/// Errors that can occur while preparing or running a coverage build
#[derive(Error, Debug)]
pub enum CoverageError {
    /// A required tool or toolchain channel is absent
    #[error("{}", .0.message())]
    MissingDependency(Dependency),

    /// The toolchain manager could not be queried
    #[error("Failed to probe toolchains: {0}")]
    Probe(String),

    /// Stage was configured without a command
    #[error("Stage {stage} has empty command")]
    EmptyCommand { stage: String },

    /// Stage process could not be started
    #[error("Failed to spawn stage {stage}: {source}")]
    Spawn {
        stage: String,
        #[source]
        source: std::io::Error,
    },

    /// Stage ran past its deadline
    #[error("Stage {stage} timed out after {secs} seconds")]
    Timeout { stage: String, secs: u64 },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoverageError {
    /// The missing dependency, if this is a preflight failure.
    pub fn missing_dependency(&self) -> Option<&Dependency> {
        match self {
            CoverageError::MissingDependency(dep) => Some(dep),
            _ => None,
        }
    }
}

/// Result type for covrun operations
pub type Result<T> = std::result::Result<T, CoverageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dependency_display_uses_message() {
        let err = CoverageError::MissingDependency(Dependency::Grcov);
        assert_eq!(err.to_string(), "grcov is not installed.");
        assert_eq!(err.missing_dependency(), Some(&Dependency::Grcov));
    }

    #[test]
    fn test_timeout_display() {
        let err = CoverageError::Timeout {
            stage: "test".to_string(),
            secs: 30,
        };
        assert_eq!(err.to_string(), "Stage test timed out after 30 seconds");
        assert!(err.missing_dependency().is_none());
    }
}
