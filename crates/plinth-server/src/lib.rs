//! plinth-server — the socket side of the Plinth host.
//!
//! Owns everything below the pipeline seam: the listening socket, the
//! single-read capture of each connection, the TCP-backed worker
//! request with its byte-exact response framing, and the canned
//! fallback answer for cycles that go wrong.

pub mod acceptor;
pub mod config;
pub mod error;
pub mod worker;

pub use acceptor::Acceptor;
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use worker::TcpWorkerRequest;
