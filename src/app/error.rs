use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StatsError>;

/// Run-level failures. Page and item faults never reach this type; they are
/// absorbed by the fetcher and parser and show up as coverage gaps instead.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("User '{username}' not found")]
    NotFound { username: String },

    #[error("Could not reach the dashboard for '{username}': {reason}")]
    DashboardUnreachable { username: String, reason: String },

    #[error("Invalid username: {0:?}")]
    InvalidUsername(String),

    #[error("Base URL cannot carry a path: {0}")]
    InvalidBaseUrl(String),

    #[error("HTTP client setup failed: {0}")]
    Client(String),

    #[error("Index not found. Expected files:\n  {index}\n  {works}")]
    IndexMissing { index: PathBuf, works: PathBuf },

    #[error("Index file {path} is malformed: {message}")]
    IndexMalformed { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for StatsError {
    fn from(err: reqwest::Error) -> Self {
        StatsError::Client(err.to_string())
    }
}
