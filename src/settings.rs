//! Console settings: where the backend lives and what the operator's
//! starting configuration looks like.
//!
//! Settings come from a TOML file (explicit path, else the per-user config
//! directory, else built-in defaults) with environment overrides on top.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;
use url::Url;

use crate::params::Configuration;

pub const BACKEND_URL_ENV: &str = "RBDO_BACKEND_URL";
pub const API_KEY_ENV: &str = "RBDO_API_KEY";

const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsoleSettings {
    pub backend_url: Url,
    pub connect_timeout_secs: u64,
    /// Optional scenario presets file replacing the built-in table.
    pub presets_path: Option<PathBuf>,
    /// Provider credential; usually supplied through `RBDO_API_KEY`.
    pub api_key: Option<String>,
    /// Configuration values merged over the built-in defaults.
    pub defaults: Map<String, Value>,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            backend_url: Url::parse(DEFAULT_BACKEND_URL).expect("default backend URL is valid"),
            connect_timeout_secs: 10,
            presets_path: None,
            api_key: None,
            defaults: Map::new(),
        }
    }
}

impl ConsoleSettings {
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Starting configuration: built-in defaults, then `defaults`, then the API key.
    pub fn initial_configuration(&self) -> Configuration {
        let mut config = Configuration::default();
        config.merge(&self.defaults);
        if let Some(key) = &self.api_key {
            config.set("api_key", Value::String(key.clone()));
        }
        config
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(raw) = lookup(BACKEND_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.backend_url = Url::parse(raw.trim())
                .with_context(|| format!("{} is not a valid URL: {}", BACKEND_URL_ENV, raw))?;
        }
        if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.is_empty()) {
            self.api_key = Some(key);
        }
        Ok(())
    }
}

/// `<config dir>/rbdo-console/settings.toml`.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("rbdo-console").join("settings.toml"))
}

/// Load settings and apply environment overrides.
///
/// An explicit `path` must exist. Without one, the default location is used
/// when present, else built-in defaults.
pub fn load_settings(path: Option<&Path>) -> Result<ConsoleSettings> {
    let mut settings = match path {
        Some(path) => read_settings_file(path)?,
        None => match default_settings_path().filter(|p| p.is_file()) {
            Some(path) => read_settings_file(&path)?,
            None => ConsoleSettings::default(),
        },
    };
    settings.apply_overrides(|name| std::env::var(name).ok())?;
    Ok(settings)
}

fn read_settings_file(path: &Path) -> Result<ConsoleSettings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file {}", path.display()))?;
    let settings = ConsoleSettings::from_toml(&content)
        .with_context(|| format!("Failed to parse settings file {}", path.display()))?;
    info!("Loaded settings from {}", path.display());
    Ok(settings)
}
