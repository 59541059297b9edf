use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackendError>;

/// Failures talking to the synthesis server.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Transport failure: connect, timeout, TLS, body read.
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("server returned {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    /// Server answered successfully but sent no audio.
    #[error("empty response body from {url}")]
    EmptyBody { url: String },

    /// Base URL plus encoded text is not a valid URL.
    #[error("invalid server URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}
