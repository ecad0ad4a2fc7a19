pub mod error;
pub mod iterator;

pub use error::{ExecutionError, FetchError};

/// The result type of all items flowing through an execution pipeline.
pub type ExecResult<T> = Result<T, ExecutionError>;
