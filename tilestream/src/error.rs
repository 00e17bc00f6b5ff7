//! Error types for the configuration and persistence surface.
//!
//! The tile pull path never returns errors; producers degrade to `None`
//! or blank tiles and log what went wrong. Errors here cover the fallible
//! edges instead: property-list parsing, state files, and histogram
//! import/export.

use thiserror::Error;

/// Errors from configuration, state persistence and serialization.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Underlying file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A property value did not parse as its expected type
    #[error("failed to parse property '{key}': {message}")]
    Parse {
        /// The property key that failed
        key: String,
        /// What the parser reported
        message: String,
    },

    /// A configuration is structurally invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// A state file was not valid INI
    #[error("state file error: {0}")]
    StateFile(String),

    /// Histogram JSON import/export failed
    #[error("serialization error: {0}")]
    Serde(String),
}

impl From<ini::Error> for PipelineError {
    fn from(err: ini::Error) -> Self {
        match err {
            ini::Error::Io(e) => PipelineError::Io(e),
            ini::Error::Parse(e) => PipelineError::StateFile(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serde(err.to_string())
    }
}

/// Shorthand for results on the configuration surface.
pub type PipelineResult<T> = Result<T, PipelineError>;
