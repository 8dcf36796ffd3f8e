//! Error types for cadloop Core
//!
//! Provides error handling for:
//! - External service failures and timeouts
//! - Per-part generation failures
//! - Configuration loading and validation
//! - Session history persistence
//!
//! [`WorkflowError`] covers what a caller can get back directly: a rejected
//! configuration or a session operation that cannot apply. Failures inside a
//! run are recovered and reported as [`crate::WorkflowEvent`]s instead.

use std::path::PathBuf;

/// Errors returned to callers of the orchestrator and session
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Invalid or unreadable configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Session has no artifact yet
    #[error("no artifact has been assembled in this session")]
    NoArtifact,

    /// Parameter not assigned anywhere in the artifact
    #[error("parameter not found in artifact: {0}")]
    UnknownParameter(String),
}

/// Failure talking to an external collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Connection or protocol failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Service answered with an error
    #[error("{service} failed: {message}")]
    Failed {
        /// Service name
        service: String,
        /// Reported message
        message: String,
    },

    /// Call exceeded its time budget
    #[error("{service} timed out after {secs}s")]
    Timeout {
        /// Service name
        service: String,
        /// Budget in seconds
        secs: u64,
    },
}

impl ServiceError {
    /// Create a service-reported failure
    #[inline]
    pub fn failed(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Whether the call timed out
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Generation failure isolated to one part
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to generate part {part}: {source}")]
pub struct PartGenerationError {
    /// Part name
    pub part: String,
    /// Underlying failure
    #[source]
    pub source: ServiceError,
}

impl PartGenerationError {
    /// Inline code left in place of the part
    #[must_use]
    pub fn marker(&self) -> String {
        format!("# Error generating {}: {}", self.part, self.source)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// TOML did not parse
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config could not be rendered
    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Value out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it is rejected
        reason: String,
    },
}

/// History persistence errors
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// File system failure
    #[error("history io error: {0}")]
    Io(#[from] std::io::Error),

    /// Document did not (de)serialize
    #[error("history document error: {0}")]
    Json(#[from] serde_json::Error),

    /// No such session file
    #[error("session not found: {0}")]
    NotFound(String),

    /// File name escapes the history directory
    #[error("invalid session file name: {0}")]
    InvalidName(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_errors_describe_the_cause() {
        let config = WorkflowError::from(ConfigError::Invalid {
            field: "max_iterations",
            reason: "must be at least 1".into(),
        });
        assert_eq!(
            config.to_string(),
            "configuration error: invalid value for max_iterations: must be at least 1"
        );
        assert_eq!(
            WorkflowError::UnknownParameter("depth".into()).to_string(),
            "parameter not found in artifact: depth"
        );
    }

    #[test]
    fn marker_names_part_and_cause() {
        let err = PartGenerationError {
            part: "leg".into(),
            source: ServiceError::failed("part-code", "quota exceeded"),
        };
        assert_eq!(err.marker(), "# Error generating leg: part-code failed: quota exceeded");
    }

    #[test]
    fn timeout_is_classified() {
        let err = ServiceError::Timeout {
            service: "render".into(),
            secs: 300,
        };
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "render timed out after 300s");
    }
}
