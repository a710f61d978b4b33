//! Error types for the tenderflow pipeline.
//!
//! Field-level extraction failures are not errors: they degrade to absent
//! values with a recorded cause. The enums here cover the conditions that
//! genuinely stop an operation (browser lifecycle, configuration bounds,
//! storage contracts, and the two fatal pipeline paths).

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for tenderflow operations.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// A browser lifecycle error.
    #[error("{0}")]
    Browser(#[from] BrowserError),

    /// A configuration value was rejected.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A storage contract violation or write failure.
    #[error("{0}")]
    Storage(#[from] StorageError),

    /// A failure that aborts the whole run.
    #[error("{0}")]
    Pipeline(#[from] PipelineError),
}

/// Errors from the browser engine lifecycle.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// A surface was requested before the engine was started.
    #[error("browser not started; call start() before opening surfaces")]
    NotStarted,

    /// The engine process could not be launched.
    #[error("failed to launch browser: {0}")]
    Launch(String),

    /// A CDP command failed.
    #[error("browser command failed: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
}

/// Errors raised when a configuration knob is out of its documented range.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// A numeric knob fell outside its bounds.
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        /// The offending field name.
        field: &'static str,
        /// The rejected value, rendered as text.
        value: String,
        /// Inclusive lower bound.
        min: String,
        /// Inclusive upper bound.
        max: String,
    },

    /// A required string knob was empty.
    #[error("{field} must not be empty")]
    Empty {
        /// The offending field name.
        field: &'static str,
    },

    /// A knob that must hold an absolute URL did not parse as one.
    #[error("{field} is not a valid URL: {value}")]
    InvalidUrl {
        /// The offending field name.
        field: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl ConfigError {
    /// Builds an out-of-range error from displayable bounds.
    pub fn out_of_range(
        field: &'static str,
        value: impl ToString,
        min: impl ToString,
        max: impl ToString,
    ) -> Self {
        Self::OutOfRange {
            field,
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }
}

/// Errors from the result and metadata stores.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The caller asked for a format the store does not implement.
    #[error("unsupported output format: {format}")]
    UnsupportedFormat {
        /// The rejected format token.
        format: String,
    },

    /// No stored metadata exists for the requested run.
    #[error("no metadata found for run {run_id}")]
    MissingRun {
        /// The run id that was looked up.
        run_id: String,
    },

    /// Filesystem failure while writing or reading.
    #[error("storage io error at {path}: {source}")]
    Io {
        /// The path involved in the failure.
        path: PathBuf,
        /// The underlying io error.
        #[source]
        source: std::io::Error,
    },

    /// Records or metadata could not be serialized.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StorageError {
    /// Wraps an io error with the path it occurred at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures that abort the whole run.
///
/// Everything else in the pipeline degrades to a recorded failure entry.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The start page never produced an ok-classified response.
    #[error("failed to load start page {url}: {cause}")]
    StartPageUnreachable {
        /// The start page URL.
        url: String,
        /// The final navigation failure cause.
        cause: String,
    },

    /// The browser session could not be brought up or torn down.
    #[error("{0}")]
    Browser(#[from] BrowserError),
}
