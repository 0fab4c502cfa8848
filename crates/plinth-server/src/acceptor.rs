//! TCP accept loop.
//!
//! `Acceptor` owns the listening socket and drives one connection at a
//! time: a single read captures the request bytes, the pipeline
//! produces the response, the bytes go back out, and the connection is
//! closed before the next one is accepted.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{self, TcpSocket, TcpStream};
use tokio::sync::{oneshot, watch};
use tokio::time;
use tracing::{debug, info, trace, warn};

use plinth_pipeline::{ApplicationFactory, HandlerDispatcher, RequestContext};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::worker::TcpWorkerRequest;

/// Serialized TCP acceptor in front of the managed pipeline.
#[derive(Debug)]
pub struct Acceptor {
    listener: net::TcpListener,
    config: ServerConfig,
}

impl Acceptor {
    /// Resolve the configured host, then bind and listen.
    ///
    /// Resolution keeps the first IPv4 address; a host with only IPv6
    /// addresses is refused.
    pub async fn bind(config: ServerConfig) -> ServerResult<Self> {
        let addrs: Vec<SocketAddr> = net::lookup_host((config.host.as_str(), config.port))
            .await
            .map_err(|e| ServerError::Resolve {
                host: config.host.clone(),
                source: e,
            })?
            .collect();
        if addrs.is_empty() {
            return Err(ServerError::HostNotFound {
                host: config.host.clone(),
            });
        }
        let addr = addrs
            .into_iter()
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| ServerError::NoIpv4Address {
                host: config.host.clone(),
            })?;

        let socket = TcpSocket::new_v4().map_err(ServerError::Socket)?;
        socket
            .bind(addr)
            .map_err(|e| ServerError::Bind { addr, source: e })?;
        let listener = socket
            .listen(config.backlog)
            .map_err(|e| ServerError::Listen { addr, source: e })?;

        info!(addr = %addr, backlog = config.backlog, "listener established");
        Ok(Self { listener, config })
    }

    /// Address the listener actually bound, useful when the configured
    /// port was 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the accept loop until the shutdown signal flips.
    ///
    /// Connections are served strictly one at a time. Accept failures
    /// end the loop and surface to the caller.
    pub async fn run(
        self,
        factory: Arc<dyn ApplicationFactory>,
        mut shutdown: watch::Receiver<bool>,
    ) -> ServerResult<()> {
        let dispatcher = HandlerDispatcher::new(factory);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted.map_err(ServerError::Accept)?;
                    debug!(%peer, "connection accepted");
                    self.drive_cycle(&dispatcher, stream).await;
                }
                _ = shutdown.changed() => {
                    info!("acceptor shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    /// One full request cycle: read once, produce the response bytes,
    /// write them, close.
    async fn drive_cycle(&self, dispatcher: &HandlerDispatcher, mut stream: TcpStream) {
        let mut buf = vec![0u8; self.config.read_buffer_size];
        let response = match stream.read(&mut buf).await {
            Ok(n) => {
                buf.truncate(n);
                debug!(bytes = n, "request captured");
                trace!(payload = %String::from_utf8_lossy(&buf), "request payload");
                self.produce_response(dispatcher, &buf).await
            }
            Err(e) => {
                warn!(error = %e, "read failed");
                TcpWorkerRequest::bad_request()
            }
        };

        match stream.write_all(&response).await {
            Ok(()) => info!(bytes = response.len(), "response sent"),
            Err(e) => warn!(error = %e, "write failed"),
        }
        if let Err(e) = stream.shutdown().await {
            debug!(error = %e, "socket shutdown failed");
        }
    }

    /// Push one captured buffer through the pipeline. Every failure
    /// mode collapses to the canned fallback answer.
    async fn produce_response(&self, dispatcher: &HandlerDispatcher, raw: &[u8]) -> Bytes {
        let worker = match TcpWorkerRequest::create(raw) {
            Ok(worker) => worker,
            Err(e) => {
                warn!(error = %e, "request rejected");
                return TcpWorkerRequest::bad_request();
            }
        };
        let context = RequestContext::new(Box::new(worker));

        let (tx, rx) = oneshot::channel();
        if let Err(e) = dispatcher.begin(context, move |handle| {
            let _ = tx.send(handle);
        }) {
            warn!(error = %e, "dispatch refused");
            return TcpWorkerRequest::bad_request();
        }

        let handle = match time::timeout(self.config.dispatch_timeout(), rx).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(_)) => {
                warn!("completion callback dropped without firing");
                return TcpWorkerRequest::bad_request();
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.config.dispatch_timeout_secs,
                    "dispatch timed out"
                );
                return TcpWorkerRequest::bad_request();
            }
        };

        if let Some(e) = handle.error() {
            warn!(error = %e, "cycle failed");
            return TcpWorkerRequest::bad_request();
        }
        let mut context = match handle.take_state() {
            Some(context) => context,
            None => {
                warn!("completed cycle returned no context");
                return TcpWorkerRequest::bad_request();
            }
        };

        let wire = match context.flush() {
            Ok(wire) => wire,
            Err(e) => {
                warn!(error = %e, "response assembly failed");
                TcpWorkerRequest::bad_request()
            }
        };
        context.end_of_request();
        wire
    }
}
