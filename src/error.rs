//! Crate-wide error types.

use thiserror::Error;

pub type PerfsiftResult<T> = Result<T, PerfsiftError>;

#[derive(Debug, Error)]
pub enum PerfsiftError {
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("artifact error: {0}")]
    Artifact(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
