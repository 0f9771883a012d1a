//! Error types shared across the crate.
//!
//! Fatal categories (`Config`, `Connectivity`) abort the run from the
//! binaries with a non-zero exit code.  Everything else is contained at the
//! smallest possible scope: a rate-limit signal triggers a bounded
//! wait-and-retry inside the provider client, a per-artist provider error
//! routes that one artist to the no-match bucket, and a persistence failure
//! is reported to the operator who may retry or continue unsaved.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or placeholder configuration.  Fatal before any matching work.
    #[error("configuration error: {0}")]
    Config(String),

    /// Provider or library unreachable.  Fatal for the run.
    #[error("cannot reach {service}: {message}")]
    Connectivity { service: String, message: String },

    /// The provider asked us to slow down.  Recoverable via wait-and-retry.
    #[error("rate limited by provider, retry after {0:?}")]
    RateLimited(Duration),

    /// A provider request failed for one artist.  Contained per artist.
    #[error("provider error: {0}")]
    Provider(String),

    /// Saving or loading a session artifact failed.  The run continues
    /// in-memory.
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// True for categories that should abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Config(_) | SyncError::Connectivity { .. })
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
