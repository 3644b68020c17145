//! Configuration
//!
//! Settings are owned by an external store and read once per page load. The
//! stored layout is `{ "config": { "mode": ..., "custom": {...} }, "whitelist": [...] }`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Protection level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Light,
    Standard,
    Heavy,
    Extreme,
    Custom,
    /// Missing or unrecognized; resolves to no capabilities
    #[default]
    #[serde(other)]
    Unknown,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Light => "light",
            Mode::Standard => "standard",
            Mode::Heavy => "heavy",
            Mode::Extreme => "extreme",
            Mode::Custom => "custom",
            Mode::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mode plus optional per-capability switches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub mode: Mode,
    /// Only consulted for [`Mode::Custom`]; only `true` entries enable anything
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Config {
    pub fn new(mode: Mode) -> Self {
        Self { mode, custom: None }
    }

    /// Custom mode with the given capability names switched on
    pub fn custom<'a>(enabled: impl IntoIterator<Item = &'a str>) -> Self {
        let map = enabled
            .into_iter()
            .map(|name| (name.to_string(), serde_json::Value::Bool(true)))
            .collect();
        Self {
            mode: Mode::Custom,
            custom: Some(map),
        }
    }

    /// Whether `custom[name]` is exactly `true`
    pub fn custom_enabled(&self, name: &str) -> bool {
        self.custom
            .as_ref()
            .and_then(|m| m.get(name))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

/// Domain suffixes for which the shield stays inert
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Whitelist(Vec<String>);

impl Whitelist {
    pub fn new<S: Into<String>>(entries: impl IntoIterator<Item = S>) -> Self {
        Self(entries.into_iter().map(Into::into).collect())
    }

    /// The first entry `host` ends with
    pub fn matches(&self, host: &str) -> Option<&str> {
        let host = host.to_ascii_lowercase();
        self.0
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .find(|e| host.ends_with(&e.to_ascii_lowercase()))
    }

    pub fn entries(&self) -> &[String] {
        &self.0
    }
}

/// Everything the external store provides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub config: Option<Config>,
    #[serde(default)]
    pub whitelist: Whitelist,
}

impl Settings {
    pub fn new(config: Config) -> Self {
        Self {
            config: Some(config),
            whitelist: Whitelist::default(),
        }
    }

    pub fn with_whitelist(mut self, whitelist: Whitelist) -> Self {
        self.whitelist = whitelist;
        self
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        if !value.is_object() && !value.is_null() {
            return Err(Error::Config(format!("expected an object, found {}", value)));
        }
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// Read-only access to stored settings
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn load(&self) -> Result<Settings>;
}

/// Settings held in memory as stored JSON
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    value: serde_json::Value,
}

impl MemoryStore {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(serde_json::to_value(settings)?))
    }
}

#[async_trait]
impl ConfigSource for MemoryStore {
    async fn load(&self) -> Result<Settings> {
        Settings::from_value(self.value.clone())
    }
}

/// Settings in a JSON file; a missing file means no settings
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigSource for FileStore {
    async fn load(&self) -> Result<Settings> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Settings::from_json(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no settings at {}", self.path.display());
                Ok(Settings::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}
