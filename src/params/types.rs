use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Number, Value};

use super::codec::{Scalar, ScalarOrVector};
use crate::error::ConsoleError;

/// Fields edited as free text and sent through the scalar-or-vector codec.
pub const SCALAR_OR_VECTOR_FIELDS: [&str; 3] = ["std", "adition_point_std", "reliability_target"];

/// Fields entered as free text and always sent as strings.
pub const TEXT_FIELDS: [&str; 7] = [
    "provider",
    "api_key",
    "base_url",
    "model",
    "template_path",
    "initial_sampling_method",
    "problem_scenario",
];

/// Fields toggled on or off.
pub const BOOL_FIELDS: [&str; 3] = ["verbose_perturbation", "verbose_backend", "return_details"];

/// Configuration key holding the active scenario id.
pub const SCENARIO_FIELD: &str = "problem_scenario";

/// Flat, ordered mapping of named run parameters.
///
/// Values are plain JSON (number, string, boolean). Scalar-or-vector fields
/// are kept as the operator's text and only encoded when a run payload is
/// built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    fields: Map<String, Value>,
}

impl Default for Configuration {
    fn default() -> Self {
        let defaults = json!({
            "provider": "deepseek",
            "api_key": "",
            "base_url": "",
            "model": "deepseek-chat",
            "temperature": 0.2,
            "top_p": 0.9,
            "max_tokens": 512,
            "template_path": "Scripts/prompt_template_Chinese.md",

            "max_iterations": 50,
            "stagnation_limit": 10,
            "retain_number": 5,
            "num_initial_points": 20,
            "initial_sampling_method": "lhs",
            "target_range_min": 0,
            "target_range_max": 100,

            "reliability_target": "0.98",
            "N": 10000,
            "threshold": 0,
            "penalty_limit": 0.01,
            "penalty_weight": 10000,

            "std": "0.3464",
            "adition_point_std": "0.3464",
            "adition_point_number": 10,
            "verbose_perturbation": false,

            "problem_scenario": "",
            "verbose_backend": true,
            "return_details": true,
        });

        match defaults {
            Value::Object(fields) => Self { fields },
            _ => Self { fields: Map::new() },
        }
    }
}

impl Configuration {
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(Value::as_f64)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    /// Merge `overlay` into this configuration. Overlay values win.
    pub fn merge(&mut self, overlay: &Map<String, Value>) {
        for (key, value) in overlay {
            self.fields.insert(key.clone(), value.clone());
        }
    }

    pub fn scenario(&self) -> &str {
        self.get_str(SCENARIO_FIELD).unwrap_or("")
    }

    pub fn set_scenario(&mut self, id: &str) {
        self.set(SCENARIO_FIELD, Value::String(id.to_string()));
    }

    /// Apply an edit typed by the operator.
    ///
    /// The field's kind is fixed by name, never by its current value.
    /// Scalar-or-vector and text fields keep the raw text. Boolean fields
    /// require `true` or `false`. Everything else becomes a number when the
    /// text parses as one, and stays text otherwise.
    pub fn set_field(&mut self, name: &str, text: &str) -> Result<(), ConsoleError> {
        if SCALAR_OR_VECTOR_FIELDS.contains(&name) || TEXT_FIELDS.contains(&name) {
            self.set(name, Value::String(text.to_string()));
            return Ok(());
        }

        let value = if BOOL_FIELDS.contains(&name) {
            match text.trim() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => {
                    return Err(ConsoleError::InvalidValue {
                        field: name.to_string(),
                        value: text.to_string(),
                    })
                }
            }
        } else {
            parse_number(text).unwrap_or_else(|| Value::String(text.to_string()))
        };

        self.set(name, value);
        Ok(())
    }

    /// Decode a scalar-or-vector field. Non-string values are taken as-is.
    pub fn scalar_or_vector(&self, name: &str) -> Option<ScalarOrVector> {
        match self.fields.get(name)? {
            Value::String(text) => Some(ScalarOrVector::encode(text)),
            other => serde_json::from_value(other.clone()).ok(),
        }
    }

    /// Reliability targets as a sequence, one entry per reference line.
    pub fn reliability_targets(&self) -> Vec<Scalar> {
        self.scalar_or_vector("reliability_target")
            .map(|v| v.as_sequence())
            .unwrap_or_default()
    }

    /// Scalar-or-vector fields whose text did not parse and would be sent raw.
    pub fn unparsed_fields(&self) -> Vec<&'static str> {
        SCALAR_OR_VECTOR_FIELDS
            .iter()
            .copied()
            .filter(|name| {
                self.scalar_or_vector(name)
                    .map_or(false, |value| !value.is_parsed())
            })
            .collect()
    }

    /// Copy of the fields with scalar-or-vector entries decoded for the wire.
    pub fn encoded(&self) -> Map<String, Value> {
        let mut out = self.fields.clone();
        for name in SCALAR_OR_VECTOR_FIELDS {
            if let Some(value) = self.scalar_or_vector(name) {
                let wire = serde_json::to_value(&value).unwrap_or(Value::Null);
                out.insert(name.to_string(), wire);
            }
        }
        out
    }
}

fn parse_number(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Some(Value::Number(n.into()));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// One design variable. Position in the list maps to a design point coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub id: u32,
    pub name: String,
    pub min: f64,
    pub max: f64,
}

impl Variable {
    pub fn new(id: u32, name: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            id,
            name: name.into(),
            min,
            max,
        }
    }

    /// Key used in the run payload's `ranges` object.
    pub fn range_key(&self) -> String {
        format!("{}_range", self.name)
    }
}

/// Two variables `x1`, `x2` on `[0, 10]`.
pub fn default_variables() -> Vec<Variable> {
    vec![Variable::new(1, "x1", 0.0, 10.0), Variable::new(2, "x2", 0.0, 10.0)]
}

/// Append a fresh variable `x<id>` on `[0, 10]` and return its id.
pub fn add_variable(variables: &mut Vec<Variable>) -> u32 {
    let id = variables.iter().map(|v| v.id).max().map_or(1, |max| max + 1);
    variables.push(Variable::new(id, format!("x{}", id), 0.0, 10.0));
    id
}

pub fn remove_variable(variables: &mut Vec<Variable>, id: u32) -> Result<(), ConsoleError> {
    let before = variables.len();
    variables.retain(|v| v.id != id);
    if variables.len() == before {
        return Err(ConsoleError::UnknownVariable(id));
    }
    Ok(())
}

/// Edit `name`, `min` or `max` of the variable with the given id.
pub fn update_variable(
    variables: &mut [Variable],
    id: u32,
    field: &str,
    text: &str,
) -> Result<(), ConsoleError> {
    let variable = variables
        .iter_mut()
        .find(|v| v.id == id)
        .ok_or(ConsoleError::UnknownVariable(id))?;

    match field {
        "name" => variable.name = text.to_string(),
        "min" | "max" => {
            let value = text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| ConsoleError::InvalidValue {
                    field: field.to_string(),
                    value: text.to_string(),
                })?;
            if field == "min" {
                variable.min = value;
            } else {
                variable.max = value;
            }
        }
        other => return Err(ConsoleError::UnknownField(other.to_string())),
    }
    Ok(())
}
