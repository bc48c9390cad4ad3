//! Error types for the store layer and request parameters

use thiserror::Error;

/// Errors raised while talking to a pool backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Backend configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Unexpected response shape: {0}")]
    Decode(String),

    #[error("Database connection lock poisoned")]
    Poisoned,
}

/// Invalid dashboard parameters
#[derive(Debug, Error, PartialEq)]
pub enum ParamError {
    #[error("Unsupported bin size {0}")]
    BinWidth(f64),

    #[error("Close call threshold must be positive, got {0}")]
    Threshold(f64),

    #[error("Spread range {min} to {max} is empty")]
    SpreadRange { min: f64, max: f64 },

    #[error("Invalid season list '{0}'")]
    Seasons(String),

    #[error("Unknown team sort '{0}'")]
    TeamSort(String),

    #[error("Parameter '{name}' is not a number: '{value}'")]
    Number { name: &'static str, value: String },
}
