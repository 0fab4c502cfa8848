//! Per-cycle request context handed to applications.

use std::time::SystemTime;

use bytes::Bytes;

use crate::error::WorkerResult;
use crate::worker::WorkerRequest;

/// Read-only facade over the request side of a worker.
///
/// Snapshotted at context creation so handlers can inspect the request
/// without holding a borrow on the worker itself.
#[derive(Debug, Clone)]
pub struct Request {
    method: String,
    raw_len: usize,
}

impl Request {
    fn from_worker(worker: &dyn WorkerRequest) -> Self {
        Self {
            method: worker.http_method().to_string(),
            raw_len: worker.raw().len(),
        }
    }

    /// Method token from the captured request line.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Number of raw bytes captured from the transport.
    pub fn raw_len(&self) -> usize {
        self.raw_len
    }
}

/// Everything the pipeline knows about one request cycle.
///
/// Owns the worker for the cycle and records when the cycle entered the
/// pipeline. The context travels into the dispatched work unit and
/// comes back out through the completion handle.
#[derive(Debug)]
pub struct RequestContext {
    worker: Box<dyn WorkerRequest>,
    request: Request,
    created_at: SystemTime,
}

impl RequestContext {
    /// Wrap a worker for one trip through the pipeline.
    pub fn new(worker: Box<dyn WorkerRequest>) -> Self {
        let request = Request::from_worker(worker.as_ref());
        Self {
            worker,
            request,
            created_at: SystemTime::now(),
        }
    }

    /// Request facade snapshotted at creation.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// UTC instant at which this context was created.
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Direct access to the underlying worker.
    pub fn worker_mut(&mut self) -> &mut dyn WorkerRequest {
        self.worker.as_mut()
    }

    // ── Response delegation ──────────────────────────────────────────

    /// Record the response status line.
    pub fn set_status(&mut self, code: u16, description: &str) -> WorkerResult<()> {
        self.worker.set_status(code, description)
    }

    /// Append one response header.
    pub fn add_header(&mut self, name: &str, value: &str) -> WorkerResult<()> {
        self.worker.add_header(name, value)
    }

    /// Stage the response body.
    pub fn write_body(&mut self, chunk: &[u8]) -> WorkerResult<()> {
        self.worker.write_body(chunk)
    }

    /// Assemble the full response bytes.
    pub fn flush(&mut self) -> WorkerResult<Bytes> {
        self.worker.flush()
    }

    /// Release the worker's response accumulators.
    pub fn end_of_request(&mut self) {
        self.worker.end_of_request();
    }
}
