use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::warn;

use super::types::{Configuration, Variable};

/// Body of `POST /run_optimization`.
#[derive(Debug, Clone, Serialize)]
pub struct RunRequest {
    pub config: Map<String, Value>,
    pub ranges: Map<String, Value>,
}

impl RunRequest {
    /// Build the request from the active configuration and variable list.
    ///
    /// Scalar-or-vector fields that do not parse are still forwarded as raw
    /// text; each one is reported with a warning.
    pub fn build(config: &Configuration, variables: &[Variable]) -> Self {
        for field in config.unparsed_fields() {
            warn!(
                "Field '{}' is not a number or numeric list ({:?}); sending it as text",
                field,
                config.get_str(field).unwrap_or_default()
            );
        }

        let ranges = variables
            .iter()
            .map(|v| (v.range_key(), json!([v.min, v.max])))
            .collect();

        Self {
            config: config.encoded(),
            ranges,
        }
    }
}
