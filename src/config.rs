//! Server configuration parsed from environment variables.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::history::DEFAULT_HISTORY_LIMIT;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_ROOM: &str = "main";
pub const DEFAULT_CLIENT_CHANNEL_CAPACITY: usize = 256;
pub const DEFAULT_STATIC_DIR: &str = "client";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid HOST '{0}': expected an IP address")]
    InvalidHost(String),
    #[error("{var} must be greater than zero")]
    Zero { var: &'static str },
    #[error("DEFAULT_ROOM must not be blank")]
    BlankDefaultRoom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub default_room: String,
    /// Strokes retained per room before the oldest is evicted.
    pub history_limit: usize,
    /// Outbound frames queued per connection before new ones are dropped.
    pub client_channel_capacity: usize,
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            default_room: DEFAULT_ROOM.into(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            client_channel_capacity: DEFAULT_CLIENT_CHANNEL_CAPACITY,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
        }
    }
}

impl ServerConfig {
    /// Build typed server config from environment variables.
    ///
    /// Optional:
    /// - `HOST`: bind address, default `0.0.0.0`
    /// - `PORT`: default 3000
    /// - `DEFAULT_ROOM`: room for joins that name none, default `main`
    /// - `HISTORY_LIMIT`: strokes retained per room, default 5000
    /// - `CLIENT_CHANNEL_CAPACITY`: per-connection outbound queue, default 256
    /// - `STATIC_DIR`: client asset directory, default `client`
    ///
    /// # Errors
    ///
    /// Returns an error for an unparseable host, a zero limit or capacity,
    /// or a blank default room. Unparseable numbers fall back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (for testing).
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host_raw = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let host = host_raw.trim().parse::<IpAddr>().map_err(|_| ConfigError::InvalidHost(host_raw.clone()))?;

        let default_room = lookup("DEFAULT_ROOM").unwrap_or_else(|| DEFAULT_ROOM.to_string());
        let default_room = default_room.trim().to_string();
        if default_room.is_empty() {
            return Err(ConfigError::BlankDefaultRoom);
        }

        let history_limit = parse_or(&lookup, "HISTORY_LIMIT", DEFAULT_HISTORY_LIMIT);
        if history_limit == 0 {
            return Err(ConfigError::Zero { var: "HISTORY_LIMIT" });
        }
        let client_channel_capacity = parse_or(&lookup, "CLIENT_CHANNEL_CAPACITY", DEFAULT_CLIENT_CHANNEL_CAPACITY);
        if client_channel_capacity == 0 {
            return Err(ConfigError::Zero { var: "CLIENT_CHANNEL_CAPACITY" });
        }

        Ok(Self {
            host,
            port: parse_or(&lookup, "PORT", DEFAULT_PORT),
            default_room,
            history_limit,
            client_channel_capacity,
            static_dir: lookup("STATIC_DIR").map_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR), PathBuf::from),
        })
    }

    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    lookup(key).and_then(|v| v.trim().parse::<T>().ok()).unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
