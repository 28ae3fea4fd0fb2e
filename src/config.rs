//! Server configuration.
//!
//! Configuration is read from a YAML file (path taken from `EMBER_CONFIG`,
//! defaulting to `ember.yaml` when that file exists) and then overridden by
//! the `LISTEN` environment variable. Every field has a default, so an empty
//! or missing file yields a usable plain-HTTP server on `127.0.0.1:8080`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::auth::AuthenticationMethod;
use crate::http::parser::DEFAULT_MAX_BODY_SIZE;

const DEFAULT_CONFIG_FILE: &str = "ember.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub tls: TlsConfig,
}

/// Listener and protocol settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind, e.g. `0.0.0.0:8080`
    pub listen_addr: String,
    /// Honour `Connection: keep-alive` from clients
    pub persistent_connections: bool,
    /// Read timeout applied to every socket read, in seconds
    pub keep_alive_timeout_secs: u64,
    /// Maximum number of requests served on one connection
    pub keep_alive_max: usize,
    /// Largest accepted request body, in bytes
    pub max_body_size: usize,
    /// Idle time after which a session is swept, in minutes
    pub session_timeout_minutes: u64,
    /// Resolve peer addresses to host names for server variables
    pub resolve_dns_names: bool,
    /// Authentication required from every client
    pub authentication: AuthenticationMethod,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            persistent_connections: true,
            keep_alive_timeout_secs: 15,
            keep_alive_max: 100,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            session_timeout_minutes: 1,
            resolve_dns_names: false,
            authentication: AuthenticationMethod::None,
        }
    }
}

impl ServerConfig {
    pub fn keep_alive_timeout(&self) -> Duration {
        Duration::from_secs(self.keep_alive_timeout_secs)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_minutes * 60)
    }
}

/// TLS settings. PEM encoded certificate chain and private key.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub enabled: bool,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    /// Require clients to present a certificate signed by `client_ca_path`
    pub client_cert_required: bool,
    pub client_ca_path: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Loads configuration using `env` to look up environment variables.
    pub fn load_with<F>(env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = match env("EMBER_CONFIG") {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => Self::default(),
        };

        if let Some(listen_addr) = env("LISTEN") {
            cfg.server.listen_addr = listen_addr;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&contents)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Config = serde_yaml::from_str(contents)?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.keep_alive_timeout_secs == 0 {
            bail!("server.keep_alive_timeout_secs must be greater than zero");
        }
        if self.server.keep_alive_max == 0 {
            bail!("server.keep_alive_max must be greater than zero");
        }
        if self.tls.enabled {
            if self.tls.cert_path.is_none() || self.tls.key_path.is_none() {
                bail!("tls.cert_path and tls.key_path are required when tls is enabled");
            }
            if self.tls.client_cert_required && self.tls.client_ca_path.is_none() {
                bail!("tls.client_ca_path is required when client certificates are required");
            }
        }
        Ok(())
    }
}
