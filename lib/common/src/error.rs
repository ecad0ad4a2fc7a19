use std::time::Duration;

/// A failure of a single HTTP request.
///
/// Errors are cloneable as the metadata of a fragment may be requested several times after its
/// request failed.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum FetchError {
    /// The transport could not perform the request.
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },
    /// No response arrived within the configured timeout.
    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
    /// The request was cancelled before a response arrived.
    #[error("Request to {url} was aborted")]
    Aborted { url: String },
    /// The server returned a body in an encoding we cannot decode.
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),
    /// The body could not be decompressed.
    #[error("Could not decode the response of {url}: {message}")]
    Decoding { url: String, message: String },
    /// The server answered with a status code that does not indicate success.
    #[error("Request to {url} returned status {status}")]
    Status { url: String, status: u16 },
}

/// An error that occurs while a pipeline is running.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExecutionError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// A fragment could not be parsed.
    #[error("Could not parse fragment {url}: {message}")]
    Parse { url: String, message: String },
    /// Too many endpoints of a federation failed for the same pattern.
    #[error("Too many sources failed for pattern {pattern}: {cause}")]
    Federation {
        pattern: String,
        #[source]
        cause: Box<ExecutionError>,
    },
    #[error("{0}")]
    Internal(String),
}

impl ExecutionError {
    /// Builds an internal error from a printable error message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
