//! Error types for the analysis crate

use event_bus::SuggestedAction;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Failures surfaced by a refresh pipeline. Each one becomes a remediation
/// notification; none of them clears previously cached results.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// The analysis tool is missing or older than the supported minimum.
    #[error("{message}")]
    UnsupportedVersion {
        message: String,
        action: SuggestedAction,
    },

    /// One of the analysis calls failed.
    #[error("Analysis failed: {0}")]
    Invocation(String),
}

impl AnalysisError {
    pub fn suggested_action(&self) -> Option<SuggestedAction> {
        match self {
            AnalysisError::UnsupportedVersion { action, .. } => Some(*action),
            AnalysisError::Invocation(_) => None,
        }
    }
}

/// Failures reported by an [`crate::client::AnalysisClient`] implementation.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The tool executable could not be found
    #[error("{tool} is not installed or not on PATH")]
    ToolMissing { tool: String },

    /// The tool process could not be started
    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool exited unsuccessfully
    #[error("{tool} exited with status {status}: {stderr}")]
    NonZeroExit {
        tool: String,
        status: i32,
        stderr: String,
    },

    /// The tool produced output that does not match the expected shape
    #[error("Malformed analysis output: {0}")]
    Malformed(String),

    /// The tool ran but reported an error for the file
    #[error("{0}")]
    Reported(String),

    /// The tool did not answer in time
    #[error("{tool} timed out after {limit:?}")]
    Timeout {
        tool: String,
        limit: std::time::Duration,
    },
}

impl From<ClientError> for AnalysisError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::ToolMissing { .. } => AnalysisError::UnsupportedVersion {
                message: err.to_string(),
                action: SuggestedAction::InstallTool,
            },
            _ => AnalysisError::Invocation(err.to_string()),
        }
    }
}
