use ldf_fragments::FragmentsError;
use oxiri::IriParseError;
use std::io;

pub use ldf_common::{ExecutionError, FetchError};

/// An error raised while creating an [LdfClient](crate::LdfClient).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The configuration could not be read.
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    /// The configuration file could not be opened.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The configured data sources cannot be queried.
    #[error(transparent)]
    Fragments(#[from] FragmentsError),
    /// A configured prefix is not bound to a valid IRI.
    #[error("Invalid IRI for prefix {prefix}: {error}")]
    InvalidPrefix {
        prefix: String,
        #[source]
        error: IriParseError,
    },
    /// The HTTP transport could not be initialized.
    #[error("Unable to initialize the HTTP client: {0}")]
    Transport(#[from] reqwest::Error),
}
