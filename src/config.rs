use std::{env, fmt, net::SocketAddr, str::FromStr, time::Duration};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Sse,
    Streamable,
}

impl Transport {
    pub fn default_port(self) -> u16 {
        match self {
            Self::Sse => 8080,
            Self::Streamable => 9090,
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sse => f.write_str("sse"),
            Self::Streamable => f.write_str("streamable"),
        }
    }
}

impl FromStr for Transport {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sse" => Ok(Self::Sse),
            "streamable" => Ok(Self::Streamable),
            _ => Err(ConfigError::InvalidTransport),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub transport: Transport,
    pub bind_addr: String,
    pub bind_port: u16,
    pub progress_interval: Duration,
    pub max_body_bytes: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MCP_TRANSPORT must be one of: sse, streamable")]
    InvalidTransport,
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("MCP_PROGRESS_INTERVAL_MS must be a non-negative integer")]
    InvalidProgressInterval,
    #[error("MCP_MAX_BODY_BYTES must be a positive integer")]
    InvalidMaxBodyBytes,
    #[error("invalid bind address or port")]
    InvalidSocket,
}

pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 300;
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let transport = read("MCP_TRANSPORT")
            .map(|value| value.parse::<Transport>())
            .transpose()?
            .unwrap_or(Transport::Streamable);
        let bind_addr = read("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string());
        let bind_port = read("BIND_PORT")
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or_else(|| transport.default_port());
        let progress_interval_ms = read("MCP_PROGRESS_INTERVAL_MS")
            .map(|value| {
                value
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidProgressInterval)
            })
            .transpose()?
            .unwrap_or(DEFAULT_PROGRESS_INTERVAL_MS);
        let max_body_bytes = read("MCP_MAX_BODY_BYTES")
            .map(|value| {
                value
                    .parse::<usize>()
                    .ok()
                    .filter(|limit| *limit > 0)
                    .ok_or(ConfigError::InvalidMaxBodyBytes)
            })
            .transpose()?
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        let config = Self {
            transport,
            bind_addr,
            bind_port,
            progress_interval: Duration::from_millis(progress_interval_ms),
            max_body_bytes,
        };

        let _ = config.bind_socket()?;
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}
