use thiserror::Error;
use std::io;
use std::path::PathBuf;

/// Custom error types for canopy cover estimation
#[derive(Error, Debug)]
pub enum CoverError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No images could be located in {0}")]
    NoImagesFound(PathBuf),

    #[error("Failed to decode {path}: {message}")]
    Decode {
        path: PathBuf,
        message: String,
    },

    #[error("Numeric domain error: {0}")]
    Domain(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV output error: {0}")]
    CsvOutput(#[from] csv::Error),

    #[error("JSON output error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoverError {
    /// Build a decode error for `path` from any displayable cause
    pub fn decode<P: Into<PathBuf>, E: std::fmt::Display>(path: P, cause: E) -> Self {
        CoverError::Decode {
            path: path.into(),
            message: cause.to_string(),
        }
    }
}

/// Type alias for Result with our custom error type
pub type Result<T> = std::result::Result<T, CoverError>;
