//! Error types for metric encoding and request building

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Writing the JSON envelope failed
    #[error("Encoding error: {0}")]
    Encoding(#[source] io::Error),

    /// Gzip compression of the envelope failed
    #[error("Compression error: {0}")]
    Compression(#[source] io::Error),

    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A batch that can no longer be split still exceeds the payload ceiling
    #[error("Batch size exceeded: {size} bytes compressed (max: {max_size} bytes) and the batch cannot be split further")]
    BatchSizeExceeded { size: usize, max_size: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
