//! Error taxonomy shared by every stage of a report run.
//!
//! The first error anywhere in the pipeline ends the run; there is no retry
//! and no partial report. Callers that embed the library get the error back as
//! a value and decide for themselves whether to rerun.

use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ReportError {
    /// A required setting is missing or malformed. Raised before any network call.
    #[error("configuration error: {0}")]
    Config(String),

    /// The hosting platform request failed (network, auth, rate limit, not found).
    #[error("{operation} failed: {message}")]
    Transport { operation: String, message: String },
}

impl ReportError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn transport(operation: impl Into<String>, err: impl Display) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: format!("{err:#}"),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Transport { message, .. } if message.to_lowercase().contains("rate limit"))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Transport { message, .. } if message.to_lowercase().contains("not found"))
    }
}

pub type Result<T, E = ReportError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_classification() {
        let err = ReportError::transport("list pulls buildpacks/pack", "API rate limit exceeded");
        assert!(err.is_rate_limited());
        assert!(!err.is_not_found());
        assert_eq!(
            err.to_string(),
            "list pulls buildpacks/pack failed: API rate limit exceeded"
        );

        let err = ReportError::transport("list orgs ghost", "Not Found");
        assert!(err.is_not_found());
        assert!(!ReportError::config("missing GITHUB_TOKEN").is_rate_limited());
    }
}
