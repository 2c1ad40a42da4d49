//! Runtime configuration, populated from arguments or environment variables.

use std::collections::BTreeMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Name of the object adapter every runtime creates for its holons.
pub const ADAPTER_NAME: &str = "hms";

/// Base adapter id; the transport makes it unique per process.
pub const ADAPTER_ID: &str = "holonet";

/// Initial size of the transport's dispatch thread pools.
pub const THREAD_POOL_SIZE: u32 = 5;

/// Upper bound of the transport's dispatch thread pools. Large because load
/// comes from many peers at once.
pub const THREAD_POOL_SIZE_MAX: u32 = 100_000;

/// Properties handed to the transport when it is initialised.
pub type TransportProperties = BTreeMap<String, String>;

/// Errors that can occur while reading configuration.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("HOLONET_DIRECTORY_PORT must be a port number, got '{0}'")]
    InvalidPort(String),
}

/// Process-wide configuration for a [`HolonRuntime`](crate::HolonRuntime).
///
/// Immutable once the runtime is constructed.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `HOLONET_DIRECTORY_HOST` | `localhost` | Host of the directory service |
/// | `HOLONET_DIRECTORY_PORT` | `12000` | Port of the directory's locator |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Host running the directory service and its locator.
    pub directory_host: String,

    /// Port the directory's locator listens on.
    pub directory_port: u16,
}

impl RuntimeConfig {
    pub const DEFAULT_HOST: &'static str = "localhost";
    pub const DEFAULT_PORT: u16 = 12000;

    pub fn new(directory_host: impl Into<String>, directory_port: u16) -> Self {
        Self {
            directory_host: directory_host.into(),
            directory_port,
        }
    }

    /// Populate config from environment variables, applying defaults where absent.
    pub fn from_env() -> Result<Self, ConfigError> {
        let directory_host = std::env::var("HOLONET_DIRECTORY_HOST")
            .unwrap_or_else(|_| Self::DEFAULT_HOST.into());

        let directory_port = match std::env::var("HOLONET_DIRECTORY_PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            Err(_) => Self::DEFAULT_PORT,
        };

        Ok(Self {
            directory_host,
            directory_port,
        })
    }

    /// The locator string the transport uses to find the directory.
    pub fn locator(&self) -> String {
        format!(
            "IceGrid/Locator:tcp -p {} -h {}",
            self.directory_port, self.directory_host
        )
    }

    /// Transport properties for a process announcing itself at `local_address`.
    pub fn transport_properties(&self, local_address: IpAddr) -> TransportProperties {
        let pool_size = THREAD_POOL_SIZE.to_string();
        let pool_max = THREAD_POOL_SIZE_MAX.to_string();

        BTreeMap::from([
            (format!("{ADAPTER_NAME}.AdapterId"), ADAPTER_ID.to_string()),
            (
                format!("{ADAPTER_NAME}.Endpoints"),
                format!("tcp -h {local_address}:udp -h {local_address}"),
            ),
            ("Default.Locator".to_string(), self.locator()),
            ("ThreadPool.Server.Size".to_string(), pool_size.clone()),
            ("ThreadPool.Server.SizeMax".to_string(), pool_max.clone()),
            ("ThreadPool.Client.Size".to_string(), pool_size),
            ("ThreadPool.Client.SizeMax".to_string(), pool_max),
        ])
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_HOST, Self::DEFAULT_PORT)
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[test]
    fn locator_names_host_and_port() {
        let c = RuntimeConfig::new("grid.example.com", 4061);
        assert_eq!(c.locator(), "IceGrid/Locator:tcp -p 4061 -h grid.example.com");
    }

    #[test]
    fn transport_properties_announce_local_address() {
        let c = RuntimeConfig::new("grid.example.com", 4061);
        let props = c.transport_properties(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)));
        assert_eq!(props["hms.AdapterId"], "holonet");
        assert_eq!(props["hms.Endpoints"], "tcp -h 10.0.0.5:udp -h 10.0.0.5");
        assert_eq!(props["Default.Locator"], c.locator());
    }

    #[test]
    fn thread_pools_are_bounded_but_large() {
        let props = RuntimeConfig::default().transport_properties(IpAddr::V4(Ipv4Addr::LOCALHOST));
        for pool in ["Server", "Client"] {
            assert_eq!(props[&format!("ThreadPool.{pool}.Size")], "5");
            assert_eq!(props[&format!("ThreadPool.{pool}.SizeMax")], "100000");
        }
    }
}
