use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("format cannot be empty")]
    EmptyFormat,

    #[error("{0} is not supported format")]
    UnsupportedFormat(String),

    #[error("{0} is not initialized yet")]
    NotInitialized(&'static str),

    #[error("cannot {operation} while storage is {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    #[error("Unknown value object type {0}")]
    UnknownValueType(String),

    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot compress feed file {}: {source}", path.display())]
    Compression {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upload rejected with status {status}: {message}")]
    Upload { status: u16, message: String },
}

pub type Result<T> = std::result::Result<T, FeedError>;
