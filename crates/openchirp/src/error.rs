//! Error types for the OpenChirp client.

use thiserror::Error;

/// Errors returned by [`OpenChirp`](crate::OpenChirp) requests.
#[derive(Debug, Error)]
pub enum Error {
    /// The request could not be sent or the response body could not be read.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status code.
    #[error("API returned HTTP {status}: {body}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The raw response body, useful for diagnostics.
        body: String,
    },

    /// The response body was not the JSON shape we expected.
    #[error("failed to decode response from {path}: {source}")]
    Decode {
        /// The API path that was requested.
        path: String,
        /// The underlying decoding error.
        #[source]
        source: serde_json::Error,
    },

    /// The configured base URL is unusable.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
}
