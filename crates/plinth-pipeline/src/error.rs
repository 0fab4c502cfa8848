//! Error types shared across the worker-request seam.

use thiserror::Error;

/// Result type alias for worker-request operations.
pub type WorkerResult<T> = Result<T, WorkerRequestError>;

/// Errors raised while framing a request or assembling its response.
#[derive(Debug, Error)]
pub enum WorkerRequestError {
    /// The captured request buffer held zero bytes.
    #[error("request buffer is empty")]
    EmptyRequest,

    /// The request line contains no ASCII space, so no method token can
    /// be delimited.
    #[error("request line has no space delimiter")]
    MissingVerbDelimiter,

    /// A header was appended after the header block was finalized.
    #[error("cannot append header: response headers already sent")]
    HeadersAlreadySent,

    /// `flush` was called before any status line was set.
    #[error("cannot flush: response status was never set")]
    StatusNotSet,

    /// The operation arrived after `end_of_request` released the
    /// response accumulators.
    #[error("request cycle already ended")]
    RequestEnded,
}

/// Errors surfaced through the dispatch contract.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// Handler setup failed before any completion handle was produced.
    #[error("handler setup failed: {0}")]
    Setup(String),

    /// The handler's work unit failed after dispatch.
    #[error("handler work failed: {0}")]
    Handler(String),
}
