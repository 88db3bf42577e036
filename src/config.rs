//! Runtime configuration read from the environment.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_WEBHOOK_PORT: u16 = 9443;
pub const DEFAULT_HEALTH_PORT: u16 = 8080;
pub const DEFAULT_CERT_DIR: &str = "/etc/webhook/certs";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a port number, got {value:?}")]
    InvalidPort { name: &'static str, value: String },

    #[error("{name} must be an IP address, got {value:?}")]
    InvalidAddress { name: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatorConfig {
    pub bind_address: IpAddr,
    pub webhook_port: u16,
    pub health_port: u16,
    /// Directory holding `tls.crt` and `tls.key`
    pub cert_dir: PathBuf,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::from([0, 0, 0, 0]),
            webhook_port: DEFAULT_WEBHOOK_PORT,
            health_port: DEFAULT_HEALTH_PORT,
            cert_dir: PathBuf::from(DEFAULT_CERT_DIR),
        }
    }
}

impl ValidatorConfig {
    /// Read `WEBHOOK_BIND_ADDRESS`, `WEBHOOK_PORT`, `HEALTH_PORT` and
    /// `WEBHOOK_CERT_DIR`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup("WEBHOOK_BIND_ADDRESS") {
            config.bind_address = value.parse().map_err(|_| ConfigError::InvalidAddress {
                name: "WEBHOOK_BIND_ADDRESS",
                value,
            })?;
        }
        if let Some(value) = lookup("WEBHOOK_PORT") {
            config.webhook_port = parse_port("WEBHOOK_PORT", value)?;
        }
        if let Some(value) = lookup("HEALTH_PORT") {
            config.health_port = parse_port("HEALTH_PORT", value)?;
        }
        if let Some(value) = lookup("WEBHOOK_CERT_DIR") {
            config.cert_dir = PathBuf::from(value);
        }

        Ok(config)
    }

    pub fn webhook_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.webhook_port)
    }

    pub fn health_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.health_port)
    }

    pub fn cert_path(&self) -> PathBuf {
        self.cert_dir.join("tls.crt")
    }

    pub fn key_path(&self) -> PathBuf {
        self.cert_dir.join("tls.key")
    }

    /// TLS is served only when both the certificate and the key exist.
    pub fn tls_enabled(&self) -> bool {
        self.cert_path().exists() && self.key_path().exists()
    }
}

fn parse_port(name: &'static str, value: String) -> Result<u16, ConfigError> {
    match value.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConfigError::InvalidPort { name, value }),
    }
}
