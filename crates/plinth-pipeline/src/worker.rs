//! Worker-request seam between the transport and the managed pipeline.
//!
//! A [`WorkerRequest`] owns the raw bytes captured for one request cycle
//! and accumulates the response state for it. The pipeline never talks
//! to a socket directly; it drives one of these instead, and the
//! transport decides how the finished bytes leave the process.

use std::fmt;

use bytes::Bytes;

use crate::error::WorkerResult;

/// One request/response cycle as the pipeline sees it.
///
/// Implementations are state machines: status and headers accumulate
/// until the header block is finalized, the first non-empty body write
/// wins, and [`end_of_request`](WorkerRequest::end_of_request) releases
/// the accumulated state for good.
pub trait WorkerRequest: Send + fmt::Debug {
    /// Method token parsed from the captured request line.
    fn http_method(&self) -> &str;

    /// The raw bytes captured from the transport, unmodified.
    fn raw(&self) -> &[u8];

    /// Record the status line. Calling again overwrites the previous
    /// status as long as the header block is still open.
    fn set_status(&mut self, code: u16, description: &str) -> WorkerResult<()>;

    /// Append one response header. Fails once the header block has been
    /// finalized.
    fn add_header(&mut self, name: &str, value: &str) -> WorkerResult<()>;

    /// Stage the response body. The first non-empty write is kept and
    /// later writes are ignored.
    fn write_body(&mut self, chunk: &[u8]) -> WorkerResult<()>;

    /// Assemble the full wire bytes: version, status line, header
    /// block, body.
    fn flush(&mut self) -> WorkerResult<Bytes>;

    /// Release the response accumulators. Idempotent.
    fn end_of_request(&mut self);
}

#[cfg(test)]
pub(crate) mod testing {
    use bytes::Bytes;

    use super::WorkerRequest;
    use crate::error::{WorkerRequestError, WorkerResult};

    /// In-memory worker used by the pipeline unit tests.
    #[derive(Debug, Default)]
    pub(crate) struct MockWorkerRequest {
        pub(crate) method: String,
        pub(crate) raw: Vec<u8>,
        pub(crate) status: Option<(u16, String)>,
        pub(crate) headers: Vec<(String, String)>,
        pub(crate) body: Option<Vec<u8>>,
        pub(crate) headers_sent: bool,
        pub(crate) ended: bool,
    }

    impl MockWorkerRequest {
        pub(crate) fn new(method: &str, raw: &[u8]) -> Self {
            Self {
                method: method.to_string(),
                raw: raw.to_vec(),
                ..Self::default()
            }
        }
    }

    impl WorkerRequest for MockWorkerRequest {
        fn http_method(&self) -> &str {
            &self.method
        }

        fn raw(&self) -> &[u8] {
            &self.raw
        }

        fn set_status(&mut self, code: u16, description: &str) -> WorkerResult<()> {
            if self.ended {
                return Err(WorkerRequestError::RequestEnded);
            }
            self.status = Some((code, description.to_string()));
            Ok(())
        }

        fn add_header(&mut self, name: &str, value: &str) -> WorkerResult<()> {
            if self.ended {
                return Err(WorkerRequestError::RequestEnded);
            }
            if self.headers_sent {
                return Err(WorkerRequestError::HeadersAlreadySent);
            }
            self.headers.push((name.to_string(), value.to_string()));
            Ok(())
        }

        fn write_body(&mut self, chunk: &[u8]) -> WorkerResult<()> {
            if self.ended {
                return Err(WorkerRequestError::RequestEnded);
            }
            self.headers_sent = true;
            if self.body.is_none() && !chunk.is_empty() {
                self.body = Some(chunk.to_vec());
            }
            Ok(())
        }

        fn flush(&mut self) -> WorkerResult<Bytes> {
            if self.ended {
                return Err(WorkerRequestError::RequestEnded);
            }
            if self.status.is_none() {
                return Err(WorkerRequestError::StatusNotSet);
            }
            Ok(Bytes::from(self.body.clone().unwrap_or_default()))
        }

        fn end_of_request(&mut self) {
            self.ended = true;
            self.body = None;
        }
    }
}
