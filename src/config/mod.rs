use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::error::{ClassroomError, Result};

const DEFAULT_LOG_FILTER: &str = "classroom_server=info";

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub websocket: WebSocketConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `RUST_LOG`-style filter directive
    pub filter: String,
    pub json: bool,
}

#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Interval between server-sent ping frames
    pub heartbeat_interval: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(25),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let port = env::var("SERVER_PORT").unwrap_or_else(|_| "8080".to_string());
        let port = port
            .parse()
            .map_err(|_| ClassroomError::ConfigurationParseFailed(format!("SERVER_PORT={}", port)))?;

        let heartbeat = env::var("WS_HEARTBEAT_SECS").unwrap_or_else(|_| "25".to_string());
        let heartbeat_secs: u64 = heartbeat.parse().map_err(|_| {
            ClassroomError::ConfigurationParseFailed(format!("WS_HEARTBEAT_SECS={}", heartbeat))
        })?;
        if heartbeat_secs == 0 {
            return Err(ClassroomError::InvalidConfiguration(
                "WS_HEARTBEAT_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port,
            },
            logging: LoggingConfig {
                filter: env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
                json: env::var("LOG_JSON")
                    .map(|v| v.parse().unwrap_or(false))
                    .unwrap_or(false),
            },
            websocket: WebSocketConfig {
                heartbeat_interval: Duration::from_secs(heartbeat_secs),
            },
        })
    }

    pub fn bind_address(&self) -> ([u8; 4], u16) {
        let ip_addr = self.parse_host_to_ipv4();
        (ip_addr.octets(), self.server.port)
    }

    fn parse_host_to_ipv4(&self) -> Ipv4Addr {
        match self.server.host.parse::<IpAddr>() {
            Ok(IpAddr::V4(ipv4)) => return ipv4,
            Ok(IpAddr::V6(_)) => {
                tracing::warn!(
                    host = %self.server.host,
                    "IPv6 bind address is not supported, listening on 0.0.0.0"
                );
                return Ipv4Addr::UNSPECIFIED;
            }
            Err(_) => {}
        }

        match self.server.host.as_str() {
            "localhost" => Ipv4Addr::LOCALHOST,
            "" | "0.0.0.0" => Ipv4Addr::UNSPECIFIED,
            _ => {
                tracing::warn!(
                    host = %self.server.host,
                    "Unable to parse host as IPv4, listening on 0.0.0.0"
                );
                Ipv4Addr::UNSPECIFIED
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(host: &str, port: u16) -> Config {
        Config {
            server: ServerConfig {
                host: host.to_string(),
                port,
            },
            logging: LoggingConfig {
                filter: DEFAULT_LOG_FILTER.to_string(),
                json: false,
            },
            websocket: WebSocketConfig::default(),
        }
    }

    #[test]
    fn test_parse_localhost() {
        assert_eq!(config_for("localhost", 8080).bind_address(), ([127, 0, 0, 1], 8080));
    }

    #[test]
    fn test_parse_ipv4_address() {
        assert_eq!(config_for("192.168.1.1", 3000).bind_address(), ([192, 168, 1, 1], 3000));
    }

    #[test]
    fn test_parse_empty_host() {
        assert_eq!(config_for("", 8080).bind_address(), ([0, 0, 0, 0], 8080));
    }

    #[test]
    fn test_ipv6_falls_back_to_all_interfaces() {
        assert_eq!(config_for("::1", 8080).bind_address(), ([0, 0, 0, 0], 8080));
    }

    #[test]
    fn test_parse_invalid_hostname_defaults_to_all() {
        assert_eq!(config_for("invalid-hostname", 9000).bind_address(), ([0, 0, 0, 0], 9000));
    }

    #[test]
    fn test_default_heartbeat_matches_socket_ping_interval() {
        assert_eq!(WebSocketConfig::default().heartbeat_interval, Duration::from_secs(25));
    }
}
