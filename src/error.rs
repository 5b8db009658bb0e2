//! Error types for the mixing engine
//!
//! Every failure the engine can report to its caller lives here. The only
//! errors that never reach the caller are the per-file errors swallowed by
//! [`crate::utils::temp::ScratchDir::sweep`].

use thiserror::Error;

/// Errors returned by the mixing engine
#[derive(Debug, Error)]
pub enum MixError {
    /// The external processing binary could not be started
    #[error("{tool} is not available (tried `{path}`)")]
    ToolUnavailable { tool: String, path: String },

    /// A request parameter is outside its allowed range or grid
    #[error("invalid {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: String,
    },

    /// Duration probing failed and the probe policy is strict
    #[error("failed to probe duration of {path}: {reason}")]
    ProbeFailed { path: String, reason: String },

    /// The synthesis process exited with a non-zero status
    #[error("ffmpeg exited with {}: {}", describe_exit(.exit_code), .stderr_excerpt)]
    ProcessFailed {
        exit_code: Option<i32>,
        stderr_excerpt: String,
    },

    /// The external process ran past its wall-clock limit and was killed
    #[error("{tool} timed out after {seconds} s")]
    ProcessTimedOut { tool: String, seconds: u64 },

    /// Input asset missing
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MixError {
    /// True for failures caused by the external tool rather than the request
    pub fn is_tool_failure(&self) -> bool {
        matches!(
            self,
            MixError::ToolUnavailable { .. }
                | MixError::ProcessFailed { .. }
                | MixError::ProcessTimedOut { .. }
        )
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "a signal".to_string(),
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, MixError>;
