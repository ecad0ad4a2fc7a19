use thiserror::Error;

/// Errors that occur while fragments clients are set up.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FragmentsError {
    #[error("No fragment endpoint was configured")]
    NoEndpoints,
    #[error("Invalid fragment endpoint {url}: {source}")]
    InvalidEndpoint {
        url: String,
        #[source]
        source: url::ParseError,
    },
}
