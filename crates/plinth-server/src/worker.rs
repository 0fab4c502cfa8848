//! TCP-backed worker request: the response state machine for one
//! captured request buffer.
//!
//! Response assembly is two-phase. Status and headers accumulate as
//! strings until the header block is frozen, after which header
//! changes are refused and status changes no longer reach the wire.
//! The body is staged separately and the first non-empty write wins.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use plinth_pipeline::{WorkerRequest, WorkerRequestError, WorkerResult};

/// Version prefix stamped on every response. The trailing space is
/// part of the prefix.
const HTTP_VERSION: &str = "HTTP/1.1 ";

/// One request cycle captured from a TCP connection.
#[derive(Debug)]
pub struct TcpWorkerRequest {
    raw: Bytes,
    method: String,
    status: Option<String>,
    headers: String,
    frozen_status: Option<Bytes>,
    frozen_headers: Option<Bytes>,
    body: Option<Bytes>,
    headers_sent: bool,
    ended: bool,
}

impl TcpWorkerRequest {
    /// Wrap one captured request buffer.
    ///
    /// The buffer must be non-empty and its request line must contain
    /// a space, otherwise no method token can be delimited.
    pub fn create(data: &[u8]) -> WorkerResult<Self> {
        if data.is_empty() {
            return Err(WorkerRequestError::EmptyRequest);
        }
        let verb_end = data
            .iter()
            .position(|b| *b == b' ')
            .ok_or(WorkerRequestError::MissingVerbDelimiter)?;
        let method = String::from_utf8_lossy(&data[..verb_end]).into_owned();

        Ok(Self {
            raw: Bytes::copy_from_slice(data),
            method,
            status: None,
            headers: String::new(),
            frozen_status: None,
            frozen_headers: None,
            body: None,
            headers_sent: false,
            ended: false,
        })
    }

    /// The canned fallback answer for cycles that never produced a
    /// response, assembled through the normal state machine.
    pub fn bad_request() -> Bytes {
        fn assemble() -> WorkerResult<Bytes> {
            let mut worker = TcpWorkerRequest::create(b"GET / HTTP/1.1")?;
            worker.set_status(400, "Bad Request")?;
            worker.add_header("Content-Type", "text/html; charset=utf8")?;
            worker.write_body(b"<html><body>Bad Request</body></html>")?;
            worker.flush()
        }
        // Infallible: fixed input through an all-accepting sequence.
        assemble().expect("fallback response assembly")
    }

    /// Freeze the header block: status plus accumulated headers and
    /// the blank separator line. Does nothing until a status exists.
    fn finalize_headers(&mut self) {
        if self.headers_sent {
            return;
        }
        let Some(status) = &self.status else {
            return;
        };
        self.frozen_status = Some(Bytes::from(status.clone().into_bytes()));

        let mut block = self.headers.clone();
        block.push_str("\r\n");
        self.frozen_headers = Some(Bytes::from(block.into_bytes()));
        self.headers_sent = true;
    }
}

impl WorkerRequest for TcpWorkerRequest {
    fn http_method(&self) -> &str {
        &self.method
    }

    fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Record the status line, terminated by a bare `\n`. A later call
    /// overwrites the earlier one; once the header block is frozen the
    /// recorded value no longer reaches the wire.
    fn set_status(&mut self, code: u16, description: &str) -> WorkerResult<()> {
        if self.ended {
            return Err(WorkerRequestError::RequestEnded);
        }
        self.status = Some(format!("{code} {description}\n"));
        Ok(())
    }

    fn add_header(&mut self, name: &str, value: &str) -> WorkerResult<()> {
        if self.ended {
            return Err(WorkerRequestError::RequestEnded);
        }
        if self.headers_sent {
            return Err(WorkerRequestError::HeadersAlreadySent);
        }
        self.headers.push_str(name);
        self.headers.push_str(": ");
        self.headers.push_str(value);
        self.headers.push_str("\r\n");
        Ok(())
    }

    /// Stage the body and freeze the header block if a status exists.
    /// The first non-empty chunk wins; later chunks are ignored.
    fn write_body(&mut self, chunk: &[u8]) -> WorkerResult<()> {
        if self.ended {
            return Err(WorkerRequestError::RequestEnded);
        }
        self.finalize_headers();
        if chunk.is_empty() {
            return Ok(());
        }
        if self.body.is_none() {
            self.body = Some(Bytes::copy_from_slice(chunk));
        } else {
            debug!(bytes = chunk.len(), "response body already staged, ignoring write");
        }
        Ok(())
    }

    fn flush(&mut self) -> WorkerResult<Bytes> {
        if self.ended {
            return Err(WorkerRequestError::RequestEnded);
        }
        if !self.headers_sent {
            if self.status.is_none() {
                return Err(WorkerRequestError::StatusNotSet);
            }
            self.finalize_headers();
        }

        let mut wire = BytesMut::new();
        wire.put_slice(HTTP_VERSION.as_bytes());
        if let Some(status) = &self.frozen_status {
            wire.put_slice(status);
        }
        if let Some(headers) = &self.frozen_headers {
            wire.put_slice(headers);
        }
        if let Some(body) = &self.body {
            wire.put_slice(body);
        }
        Ok(wire.freeze())
    }

    fn end_of_request(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.status = None;
        self.headers.clear();
        self.frozen_status = None;
        self.frozen_headers = None;
        self.body = None;
    }
}

#[cfg(test)]
mod tests {
    use plinth_pipeline::{WorkerRequest, WorkerRequestError};

    use super::TcpWorkerRequest;

    fn worker() -> TcpWorkerRequest {
        TcpWorkerRequest::create(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap()
    }

    #[test]
    fn assembles_the_exact_wire_format() {
        let mut w = worker();
        w.set_status(200, "OK").unwrap();
        w.add_header("Content-Type", "text/html; charset=utf8").unwrap();
        w.write_body(b"<html><body>Hello, world</body></html>").unwrap();

        let wire = w.flush().unwrap();
        assert_eq!(
            &wire[..],
            b"HTTP/1.1 200 OK\nContent-Type: text/html; charset=utf8\r\n\r\n\
              <html><body>Hello, world</body></html>" as &[u8],
        );

        // The flush locked the header block; state is unchanged.
        assert!(matches!(
            w.add_header("X-Late", "nope"),
            Err(WorkerRequestError::HeadersAlreadySent)
        ));
        assert_eq!(w.flush().unwrap(), wire);
    }

    #[test]
    fn headers_serialize_in_insertion_order() {
        let mut w = worker();
        w.set_status(200, "OK").unwrap();
        w.add_header("X-Request-Id", "7").unwrap();
        w.add_header("Cache-Control", "no-store").unwrap();
        w.add_header("Content-Type", "text/plain").unwrap();
        w.write_body(b"ordered").unwrap();

        let wire = w.flush().unwrap();
        assert_eq!(
            &wire[..],
            b"HTTP/1.1 200 OK\nX-Request-Id: 7\r\nCache-Control: no-store\r\n\
              Content-Type: text/plain\r\n\r\nordered" as &[u8],
        );
    }

    #[test]
    fn parses_the_method_token() {
        let w = TcpWorkerRequest::create(b"POST /submit HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(w.http_method(), "POST");
        assert_eq!(w.raw(), b"POST /submit HTTP/1.1\r\n\r\n");
    }

    #[test]
    fn rejects_unparseable_captures() {
        assert!(matches!(
            TcpWorkerRequest::create(b""),
            Err(WorkerRequestError::EmptyRequest)
        ));
        assert!(matches!(
            TcpWorkerRequest::create(b"GARBAGE"),
            Err(WorkerRequestError::MissingVerbDelimiter)
        ));
    }

    #[test]
    fn first_body_write_wins() {
        let mut w = worker();
        w.set_status(200, "OK").unwrap();
        w.write_body(b"first").unwrap();
        w.write_body(b"second").unwrap();

        let wire = w.flush().unwrap();
        assert!(wire.ends_with(b"first"));
        assert!(!wire.ends_with(b"second"));
    }

    #[test]
    fn body_write_freezes_the_header_block() {
        let mut w = worker();
        w.set_status(200, "OK").unwrap();
        w.write_body(b"done").unwrap();

        assert!(matches!(
            w.add_header("X-Late", "nope"),
            Err(WorkerRequestError::HeadersAlreadySent)
        ));
    }

    #[test]
    fn empty_body_write_freezes_but_stages_nothing() {
        let mut w = worker();
        w.set_status(204, "No Content").unwrap();
        w.write_body(b"").unwrap();

        let wire = w.flush().unwrap();
        assert_eq!(&wire[..], b"HTTP/1.1 204 No Content\n\r\n" as &[u8]);
    }

    #[test]
    fn body_write_without_status_leaves_headers_open() {
        let mut w = worker();
        w.write_body(b"early").unwrap();
        // No status yet, so the header block is still open.
        w.add_header("Content-Type", "text/plain").unwrap();
        w.set_status(200, "OK").unwrap();

        let wire = w.flush().unwrap();
        assert_eq!(
            &wire[..],
            b"HTTP/1.1 200 OK\nContent-Type: text/plain\r\n\r\nearly" as &[u8],
        );
    }

    #[test]
    fn status_rewrites_stop_at_the_freeze() {
        let mut w = worker();
        w.set_status(500, "Internal Server Error").unwrap();
        w.set_status(200, "OK").unwrap();
        let first = w.flush().unwrap();
        assert!(first.starts_with(b"HTTP/1.1 200 OK\n"));

        // Recorded, but the frozen block no longer changes.
        w.set_status(503, "Service Unavailable").unwrap();
        assert_eq!(w.flush().unwrap(), first);
    }

    #[test]
    fn flush_without_status_is_refused() {
        let mut w = worker();
        assert!(matches!(w.flush(), Err(WorkerRequestError::StatusNotSet)));
    }

    #[test]
    fn ended_cycles_refuse_everything() {
        let mut w = worker();
        w.set_status(200, "OK").unwrap();
        w.end_of_request();
        w.end_of_request(); // idempotent

        assert!(matches!(
            w.set_status(200, "OK"),
            Err(WorkerRequestError::RequestEnded)
        ));
        assert!(matches!(
            w.add_header("a", "b"),
            Err(WorkerRequestError::RequestEnded)
        ));
        assert!(matches!(
            w.write_body(b"x"),
            Err(WorkerRequestError::RequestEnded)
        ));
        assert!(matches!(w.flush(), Err(WorkerRequestError::RequestEnded)));
    }

    #[test]
    fn fallback_answer_is_byte_exact() {
        assert_eq!(
            &TcpWorkerRequest::bad_request()[..],
            b"HTTP/1.1 400 Bad Request\nContent-Type: text/html; charset=utf8\r\n\r\n\
              <html><body>Bad Request</body></html>" as &[u8],
        );
    }
}
