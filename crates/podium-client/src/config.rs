//! Client configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (PODIUM_*)
//! - TOML configuration file
//!
//! The transport configuration section is handed verbatim to the host's
//! client factory; Podium itself only reads the setup section.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Realtime service endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Token endpoint for the auth handshake, if token auth is used.
    #[serde(default)]
    pub auth_url: Option<String>,

    /// Client id presented to the service.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Setup gating and feature flags.
    #[serde(default)]
    pub setup: SetupConfig,
}

/// Setup gating and feature flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupConfig {
    /// Whether the registry should construct a client at all.
    #[serde(default = "default_true")]
    pub should_init: bool,

    /// Publish-metrics feature flag, carried as the raw flag string:
    /// "true" enables, anything else (including absent) disables.
    #[serde(default = "default_publish_metrics")]
    pub publish_metrics: Option<String>,
}

impl SetupConfig {
    /// Parse the publish-metrics flag string.
    #[must_use]
    pub fn metrics_enabled(&self) -> bool {
        self.publish_metrics.as_deref() == Some("true")
    }
}

// Default value functions
fn default_endpoint() -> String {
    std::env::var("PODIUM_ENDPOINT").unwrap_or_else(|_| "wss://realtime.podium.dev".to_string())
}

fn default_true() -> bool {
    true
}

fn default_publish_metrics() -> Option<String> {
    std::env::var("PODIUM_PUBLISH_METRICS").ok()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            auth_url: None,
            client_id: None,
            setup: SetupConfig::default(),
        }
    }
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            should_init: default_true(),
            publish_metrics: default_publish_metrics(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "podium.toml",
            "/etc/podium/podium.toml",
            "~/.config/podium/podium.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ClientConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Check that configured endpoints are well-formed URLs.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if !is_url_with_scheme(&self.endpoint, &["ws", "wss", "http", "https"]) {
            bail!("endpoint is not a valid realtime URL: {}", self.endpoint);
        }
        if let Some(auth_url) = &self.auth_url {
            if !is_http_url(auth_url) {
                bail!("auth_url is not a valid http(s) URL: {auth_url}");
            }
        }
        Ok(())
    }
}

/// Whether a string parses as an http or https URL.
#[must_use]
pub fn is_http_url(value: &str) -> bool {
    is_url_with_scheme(value, &["http", "https"])
}

fn is_url_with_scheme(value: &str, schemes: &[&str]) -> bool {
    match Url::parse(value) {
        Ok(url) => schemes.contains(&url.scheme()),
        Err(_) => false,
    }
}
