//! Origin fetch error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid upstream base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
}
