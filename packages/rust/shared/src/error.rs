//! Error types for stak.
//!
//! Library crates use [`StakError`] via `thiserror`.
//! App crates (cli) wrap this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all stak operations.
///
/// Each variant maps to one failure scope: `Validation`, `Resolution`,
/// `EmptyResult`, and `Io` are fatal for a single profile or stak;
/// `ConfigResolution` is fatal for the whole invocation. Watch-loop
/// failures are logged in place and never surface as errors.
#[derive(Debug, thiserror::Error)]
pub enum StakError {
    /// A bundle record failed its invariant check (missing source/content
    /// or an empty bundler chain).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A bundler reference could not be resolved to a registered capability.
    #[error("bundler resolution error: {0}")]
    Resolution(String),

    /// The profile configuration source is unreadable, unparseable, or a
    /// named selector is absent from it.
    #[error("config error: {message}")]
    ConfigResolution { message: String },

    /// Filesystem I/O error (output or source-map write, glob expansion).
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A profile's fan-out produced zero results.
    #[error("no results were returned for profile `{0}`")]
    EmptyResult(String),

    /// The watch backend could not be started for a profile.
    #[error("watch error: {0}")]
    Watch(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, StakError>;

impl StakError {
    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a config resolution error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigResolution {
            message: msg.into(),
        }
    }

    /// Create a bundler resolution error from any displayable message.
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error aborts the whole invocation rather than a single
    /// profile.
    pub fn is_invocation_fatal(&self) -> bool {
        matches!(self, Self::ConfigResolution { .. })
    }
}
