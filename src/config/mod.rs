use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{ClassroomError, Result};

const DEFAULT_STUN_SERVER_URL: &str = "stun:stun.l.google.com:19302";
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 500;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub classroom: ClassroomConfig,
    pub directory: DirectoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct ClassroomConfig {
    /// Chat messages longer than this many characters are truncated
    pub max_message_length: usize,
    pub stun_server_url: String,
}

#[derive(Debug, Clone)]
pub enum DirectoryConfig {
    /// Trust the role and name claimed in the join payload
    Open,
    File(PathBuf),
    Http { base_url: String, timeout_secs: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl Default for ClassroomConfig {
    fn default() -> Self {
        Self {
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            stun_server_url: DEFAULT_STUN_SERVER_URL.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let directory = match (
            env::var("USER_DIRECTORY_FILE").ok(),
            env::var("USER_DIRECTORY_URL").ok(),
        ) {
            (Some(_), Some(_)) => {
                return Err(ClassroomError::InvalidConfiguration(
                    "USER_DIRECTORY_FILE and USER_DIRECTORY_URL are mutually exclusive".to_string(),
                ))
            }
            (Some(path), None) => DirectoryConfig::File(PathBuf::from(path)),
            (None, Some(base_url)) => DirectoryConfig::Http {
                base_url,
                timeout_secs: parse_var("USER_DIRECTORY_TIMEOUT_SECS", 5)?,
            },
            (None, None) => DirectoryConfig::Open,
        };

        let format = match env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "text".to_string())
            .as_str()
        {
            "json" => LogFormat::Json,
            "text" => LogFormat::Text,
            other => {
                return Err(ClassroomError::InvalidConfiguration(format!(
                    "LOG_FORMAT must be 'text' or 'json', got '{}'",
                    other
                )))
            }
        };

        let max_message_length = parse_var("MAX_MESSAGE_LENGTH", DEFAULT_MAX_MESSAGE_LENGTH)?;
        if max_message_length == 0 {
            return Err(ClassroomError::InvalidConfiguration(
                "MAX_MESSAGE_LENGTH must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("SERVER_PORT", 3000)?,
            },
            classroom: ClassroomConfig {
                max_message_length,
                stun_server_url: env::var("STUN_SERVER_URL")
                    .unwrap_or_else(|_| DEFAULT_STUN_SERVER_URL.to_string()),
            },
            directory,
            logging: LoggingConfig { format },
        })
    }

    pub fn bind_address(&self) -> ([u8; 4], u16) {
        let ip_addr = self.parse_host_to_ipv4();
        (ip_addr.octets(), self.server.port)
    }

    fn parse_host_to_ipv4(&self) -> Ipv4Addr {
        if let Ok(addr) = self.server.host.parse::<IpAddr>() {
            match addr {
                IpAddr::V4(ipv4) => return ipv4,
                IpAddr::V6(_) => {
                    tracing::warn!(
                        host = %self.server.host,
                        "IPv6 address provided but only IPv4 supported, using 0.0.0.0"
                    );
                    return Ipv4Addr::new(0, 0, 0, 0);
                }
            }
        }

        match self.server.host.as_str() {
            "localhost" => Ipv4Addr::new(127, 0, 0, 1),
            "" | "0.0.0.0" => Ipv4Addr::new(0, 0, 0, 0),
            _ => {
                tracing::warn!(
                    host = %self.server.host,
                    "Unable to parse host as IPv4, using 0.0.0.0"
                );
                Ipv4Addr::new(0, 0, 0, 0)
            }
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            ClassroomError::InvalidConfiguration(format!("Invalid {}: '{}'", name, raw))
        }),
        Err(_) => Ok(default),
    }
}
