//! Server configuration.
//!
//! Settings come from three layers, later ones winning: built-in defaults,
//! an optional JSON file (`--config`), and command-line flags (each with an
//! environment variable fallback).
//!
//! ```bash
//! htserve -d ./public -p 8080
//! HTSERVE_ROOT=/srv/www htserve --config htserve.json --timeout 10
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::http::ContentTypeRegistry;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid setting `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Resolved server settings.
///
/// Every field has a default, so a config file only needs the keys it changes:
///
/// ```
/// use htserve::config::ServerConfig;
///
/// let cfg = ServerConfig::from_json_str(r#"{ "document_root": "/srv/www" }"#).unwrap();
/// assert_eq!(cfg.document_root.to_str(), Some("/srv/www"));
/// assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to listen on, `host:port`.
    pub listen_addr: String,
    /// Directory files are served from.
    pub document_root: PathBuf,
    /// Per-connection timeout in seconds.
    pub timeout_secs: u64,
    /// Ceiling on concurrently served connections.
    pub max_connections: usize,
    /// Optional `mime.types` file extending the built-in content types.
    pub mime_types: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_owned(),
            document_root: PathBuf::from("htdocs"),
            timeout_secs: 5,
            max_connections: 256,
            mime_types: None,
        }
    }
}

impl ServerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// The per-connection timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Rejects settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "timeout_secs",
                reason: "must be at least 1".into(),
            });
        }
        if self.max_connections == 0 || self.max_connections > Semaphore::MAX_PERMITS {
            return Err(ConfigError::Invalid {
                field: "max_connections",
                reason: format!("must be between 1 and {}", Semaphore::MAX_PERMITS),
            });
        }
        Ok(())
    }

    /// Builds the content-type registry, loading `mime_types` if configured.
    pub fn load_registry(&self) -> Result<ContentTypeRegistry, ConfigError> {
        match &self.mime_types {
            Some(path) => {
                ContentTypeRegistry::with_mime_types_file(path).map_err(|source| {
                    ConfigError::Read {
                        path: path.clone(),
                        source,
                    }
                })
            }
            None => Ok(ContentTypeRegistry::new()),
        }
    }
}

/// Command-line interface of the `htserve` binary.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "htserve", version, about = "Serve files from a directory over HTTP/1.x")]
pub struct Cli {
    /// JSON config file; flags override its values
    #[arg(short, long, env = "HTSERVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory to serve
    #[arg(short = 'd', long = "directory", env = "HTSERVE_ROOT")]
    pub directory: Option<PathBuf>,

    /// Port to listen on (keeps the configured host)
    #[arg(short, long, env = "HTSERVE_PORT")]
    pub port: Option<u16>,

    /// Full listen address, `host:port`
    #[arg(long, env = "HTSERVE_BIND")]
    pub bind: Option<String>,

    /// Per-connection timeout in seconds
    #[arg(long, env = "HTSERVE_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Maximum number of concurrent connections
    #[arg(long = "max-connections", env = "HTSERVE_MAX_CONNECTIONS")]
    pub max_connections: Option<usize>,

    /// `mime.types` file with extra content types
    #[arg(long = "mime-types", env = "HTSERVE_MIME_TYPES")]
    pub mime_types: Option<PathBuf>,
}

impl Cli {
    /// Layers the flags over the config file (or the defaults) and validates the result.
    pub fn into_config(self) -> Result<ServerConfig, ConfigError> {
        let mut cfg = match &self.config {
            Some(path) => ServerConfig::from_json_file(path)?,
            None => ServerConfig::default(),
        };

        if let Some(bind) = self.bind {
            cfg.listen_addr = bind;
        }
        if let Some(port) = self.port {
            let host = cfg
                .listen_addr
                .rsplit_once(':')
                .map_or(cfg.listen_addr.as_str(), |(host, _)| host);
            cfg.listen_addr = format!("{host}:{port}");
        }
        if let Some(directory) = self.directory {
            cfg.document_root = directory;
        }
        if let Some(timeout) = self.timeout {
            cfg.timeout_secs = timeout;
        }
        if let Some(max) = self.max_connections {
            cfg.max_connections = max;
        }
        if self.mime_types.is_some() {
            cfg.mime_types = self.mime_types;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ServerConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.timeout(), Duration::from_secs(5));
        assert_eq!(cfg.document_root, PathBuf::from("htdocs"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ServerConfig::from_json_str(r#"{ "port": 80 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_limits_are_invalid() {
        let cfg = ServerConfig {
            max_connections: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "max_connections", .. })
        ));

        let cfg = ServerConfig {
            timeout_secs: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "timeout_secs", .. })
        ));
    }

    #[test]
    fn port_flag_keeps_host() {
        let cli = Cli {
            bind: Some("127.0.0.1:9000".into()),
            port: Some(8081),
            ..Cli::default()
        };
        assert_eq!(cli.into_config().unwrap().listen_addr, "127.0.0.1:8081");
    }

    #[test]
    fn missing_mime_types_file_is_a_read_error() {
        let cfg = ServerConfig {
            mime_types: Some(PathBuf::from("/definitely/not/here/mime.types")),
            ..ServerConfig::default()
        };
        assert!(matches!(cfg.load_registry(), Err(ConfigError::Read { .. })));
    }
}
