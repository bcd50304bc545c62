//! Typed launch failures.
//!
//! Internal plumbing uses `anyhow`; a `LaunchError` is raised where the
//! failure class matters to the operator and recovered in `main` via
//! `downcast_ref` to pick the exit code and print the suggested fix.

use thiserror::Error;

use crate::core::diagnostic::DiagnosticResult;
use crate::exit_codes;

#[derive(Debug, Error)]
pub enum LaunchError {
    /// Malformed or missing persisted configuration or environment.
    #[error("configuration error: {message}")]
    Config { message: String, fix: String },

    /// No SDK candidate, export list, or other required file.
    #[error("not found: {message}")]
    NotFound { message: String, fix: String },

    /// Runtime executable unreachable or its version unusable.
    #[error("runtime probe failed: {message}")]
    Probe { message: String, fix: String },

    /// At least one fatal dependency diagnostic.
    #[error("{} fatal dependency problem(s) detected", diagnostics.len())]
    Dependency { diagnostics: Vec<DiagnosticResult> },

    /// The child process could not be started.
    #[error("failed to start {command}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl LaunchError {
    pub fn config(message: impl Into<String>, fix: impl Into<String>) -> Self {
        LaunchError::Config {
            message: message.into(),
            fix: fix.into(),
        }
    }

    pub fn not_found(message: impl Into<String>, fix: impl Into<String>) -> Self {
        LaunchError::NotFound {
            message: message.into(),
            fix: fix.into(),
        }
    }

    pub fn probe(message: impl Into<String>, fix: impl Into<String>) -> Self {
        LaunchError::Probe {
            message: message.into(),
            fix: fix.into(),
        }
    }

    /// Suggested remediation shown under the error line.
    pub fn fix(&self) -> Option<&str> {
        match self {
            LaunchError::Config { fix, .. }
            | LaunchError::NotFound { fix, .. }
            | LaunchError::Probe { fix, .. } => Some(fix),
            LaunchError::Dependency { .. } => None,
            LaunchError::Launch { .. } => {
                Some("check that the runtime executable exists and is executable")
            }
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            LaunchError::Launch { .. } => exit_codes::LAUNCH_FAILED,
            LaunchError::Config { .. }
            | LaunchError::NotFound { .. }
            | LaunchError::Probe { .. }
            | LaunchError::Dependency { .. } => exit_codes::COMPOSER_FAILURE,
        }
    }
}

/// Exit code for an arbitrary error chain.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<LaunchError>())
        .map_or(exit_codes::COMPOSER_FAILURE, LaunchError::exit_code)
}
