//! Listener configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Settings for the TCP acceptor.
///
/// Every field has a default, so an empty TOML file (or no file at
/// all) yields a listener on `localhost:9091` with the stock buffer
/// and backlog sizes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host name resolved to pick the listen address.
    pub host: String,
    /// TCP port to listen on.
    pub port: u16,
    /// Listen backlog handed to the kernel.
    pub backlog: u32,
    /// Size of the single read issued per connection.
    pub read_buffer_size: usize,
    /// Seconds a dispatched cycle may run before the acceptor answers
    /// with the fallback response instead.
    pub dispatch_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9091,
            backlog: 10,
            read_buffer_size: 1024,
            dispatch_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// How long a dispatched cycle may run before the acceptor gives
    /// up on it.
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }
}
