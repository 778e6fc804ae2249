//! Scenario preset loading.
//!
//! - `default_presets()` - presets compiled into the binary
//! - `load_presets(path)` - presets from a TOML file on disk

use anyhow::Result;
use std::path::Path;

use super::types::{PresetFile, ScenarioPreset};

const DEFAULT_PRESETS: &str = include_str!("../../config/scenarios.toml");

pub fn load_presets(path: &Path) -> Result<Vec<ScenarioPreset>> {
    let content = std::fs::read_to_string(path)?;
    let file: PresetFile = toml::from_str(&content)?;
    Ok(file.scenarios)
}

/// # Panics
/// Panics if the embedded TOML is invalid (a build-time mistake).
pub fn default_presets() -> Vec<ScenarioPreset> {
    let file: PresetFile =
        toml::from_str(DEFAULT_PRESETS).expect("embedded scenarios.toml must be valid TOML");
    file.scenarios
}
