//! Gateway configuration
//!
//! Loaded from YAML. `${{env.NAME}}` and `${{NAME}}` placeholders are
//! replaced by environment variables before parsing; an unset variable
//! expands to nothing.

use crate::cache::CacheOptions;
use crate::store::BindConfig;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

static ENV_VAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{\{\s*(?:env\.)?([A-Za-z0-9_]+)\s*\}\}").expect("valid env placeholder regex")
});

/// Replace environment placeholders in `input`
pub fn expand_env_vars(input: &str) -> String {
    ENV_VAR
        .replace_all(input, |caps: &Captures| std::env::var(&caps[1]).unwrap_or_default())
        .into_owned()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub log_level: String,
    pub server: ServerSection,
    pub cache: CacheSection,
    pub sources: Vec<SourceConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            service_name: "ferrumgate".into(),
            log_level: "debug".into(),
            server: ServerSection::default(),
            cache: CacheSection::default(),
            sources: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub redis: ListenerConfig,
    pub http: ListenerConfig,
}

impl Default for ServerSection {
    fn default() -> Self {
        ServerSection {
            redis: ListenerConfig::new("127.0.0.1:6380"),
            http: ListenerConfig::new("127.0.0.1:8080"),
        }
    }
}

/// One listening server; an empty `listen` disables it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    pub listen: String,
    pub request_timeout_ms: u64,
}

impl ListenerConfig {
    fn new(listen: &str) -> Self {
        ListenerConfig {
            listen: listen.into(),
            request_timeout_ms: 120_000,
        }
    }

    pub fn enabled(&self) -> bool {
        !self.listen.trim().is_empty()
    }

    /// `None` when the timeout is disabled
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        ListenerConfig::new("")
    }
}

/// Shared cache; an empty `connect` disables caching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub connect: String,
    pub size: usize,
    pub ttl_secs: u64,
}

impl CacheSection {
    pub fn enabled(&self) -> bool {
        !self.connect.trim().is_empty()
    }

    pub fn options(&self) -> CacheOptions {
        CacheOptions::new(self.size, Duration::from_secs(self.ttl_secs))
    }
}

impl Default for CacheSection {
    fn default() -> Self {
        CacheSection {
            connect: "memory".into(),
            size: 1000,
            ttl_secs: 60,
        }
    }
}

/// One backend and the key families it serves
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub connect: String,
    pub notify_channel: String,
    pub binds: Vec<BindConfig>,
}

impl AppConfig {
    pub fn parse(content: &str) -> Result<Self, anyhow::Error> {
        let expanded = expand_env_vars(content);
        Ok(serde_yaml::from_str(&expanded)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(&path)?;
        Self::parse(&content)
    }

    pub fn find_and_load() -> Result<Option<Self>, anyhow::Error> {
        for p in ["ferrumgate.yaml", "ferrumgate.yml"] {
            if Path::new(p).exists() {
                tracing::info!("Loading config from {}", p);
                return Ok(Some(Self::from_file(p)?));
            }
        }
        Ok(None)
    }
}
