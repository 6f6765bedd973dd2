mod gcs;
mod parser;

use thiserror::Error;

pub use gcs::GcsError;
pub use parser::{parse_gcloud_error, spawn_failure, ErrorContext};

#[derive(Error, Debug)]
pub enum PromoteError {
    #[error("Storage error: {0}")]
    Storage(#[from] GcsError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigFileNotFound(String),

    #[error("Invalid team name: {0}")]
    InvalidTeamName(String),

    #[error("Invalid bucket URL: {0}")]
    InvalidBucketUrl(String),

    #[error("Structure validation failed: {0}")]
    Validation(String),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Integrity check failed: {0}")]
    Integrity(String),

    #[error("Promotion error: {0}")]
    Promotion(String),

    #[error("Transfer error: {0}")]
    Transfer(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PromoteError>;
