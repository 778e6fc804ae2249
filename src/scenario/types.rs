use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::params::Variable;

/// Entry of `GET /get_problems`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemDescriptor {
    pub id: String,
    pub name: String,
}

/// Root of the presets TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct PresetFile {
    #[serde(rename = "scenario", default)]
    pub scenarios: Vec<ScenarioPreset>,
}

/// Configuration overlay plus variable bounds for one scenario.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioPreset {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Merged over the current configuration; these values win.
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Bound groups, expanded in order into `x1..xN`.
    pub bounds: Vec<BoundGroup>,
}

/// `count` consecutive variables sharing the same bounds.
#[derive(Debug, Clone, Deserialize)]
pub struct BoundGroup {
    pub count: u32,
    pub min: f64,
    pub max: f64,
}

impl ScenarioPreset {
    /// Full replacement variable list for this scenario.
    pub fn variables(&self) -> Vec<Variable> {
        let mut variables = Vec::new();
        let mut id = 1u32;
        for group in &self.bounds {
            for _ in 0..group.count {
                variables.push(Variable::new(id, format!("x{}", id), group.min, group.max));
                id += 1;
            }
        }
        variables
    }
}
