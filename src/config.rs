use crate::push::VapidConfigStatus;

use serde::Deserialize;

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_LISTEN: &str = "0.0.0.0:5000";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(ConfigError::Invalid(format!(
                "unknown environment '{other}'; expected development or production"
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub listen: SocketAddr,
    /// JSON snapshot of the user store; users live in memory only when unset.
    pub data_file: Option<PathBuf>,
    pub environment: Environment,
    pub auth: AuthConfig,
    pub push: PushConfig,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub key: String,
    pub token_ttl: time::Duration,
}

#[derive(Clone, Debug)]
pub struct PushConfig {
    pub vapid: VapidConfigStatus,
}

impl PushConfig {
    pub fn is_configured(&self) -> bool {
        matches!(self.vapid, VapidConfigStatus::Ready(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("{0}")]
    Invalid(String),
}

/// Optional TOML file; every key may be overridden from the command line or environment.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub listen: Option<String>,
    pub data_file: Option<PathBuf>,
    pub environment: Option<String>,
    #[serde(default)]
    pub auth: FileAuthConfig,
    #[serde(default)]
    pub vapid: FileVapidConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileAuthConfig {
    pub key: Option<String>,
    pub token_ttl: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileVapidConfig {
    pub private_key: Option<String>,
    pub public_key: Option<String>,
    pub subject: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

pub fn parse_listen(raw: &str) -> Result<SocketAddr, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("invalid listen address '{raw}'")))
}

#[cfg(test)]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 5000)),
            data_file: None,
            environment: Environment::Development,
            auth: AuthConfig {
                key: "aGVyYWxkLXRlc3Qta2V5".to_string(),
                token_ttl: time::Duration::days(7),
            },
            push: PushConfig {
                vapid: VapidConfigStatus::Missing,
            },
        }
    }
}
