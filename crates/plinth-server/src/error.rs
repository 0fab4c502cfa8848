//! Error types for the socket side of the host.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Result type alias for acceptor operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors raised while establishing or running the listener.
#[derive(Debug, Error)]
pub enum ServerError {
    /// DNS resolution of the configured listen host failed.
    #[error("failed to resolve listen host {host}: {source}")]
    Resolve { host: String, source: io::Error },

    /// The configured listen host resolved to no addresses at all.
    #[error("listen host {host} resolved to no addresses")]
    HostNotFound { host: String },

    /// The configured listen host resolved, but not to any IPv4
    /// address.
    #[error("listen host {host} resolved to no IPv4 address")]
    NoIpv4Address { host: String },

    /// Opening the listen socket failed.
    #[error("failed to open listen socket: {0}")]
    Socket(io::Error),

    /// Binding the listen socket failed.
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    /// Moving the bound socket into the listening state failed.
    #[error("failed to listen on {addr}: {source}")]
    Listen { addr: SocketAddr, source: io::Error },

    /// Accepting an inbound connection failed.
    #[error("accept failed: {0}")]
    Accept(io::Error),
}
