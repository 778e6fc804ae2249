//! Scalar-or-vector codec for per-constraint parameters.
//!
//! Operators type these values by hand (`0.98`, `[0.9, 0.95]`). The codec
//! turns that text into a typed value for the outgoing payload and turns
//! incoming reliability fields back into a sequence for rendering.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A single scalar. `Text` is the raw input that failed to parse as a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
}

/// Either one scalar or an ordered sequence of numbers.
///
/// Serializes untagged so the wire form is a bare JSON number, string or array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarOrVector {
    Vector(Vec<f64>),
    Scalar(Scalar),
}

impl ScalarOrVector {
    /// Parse operator text into a typed value.
    ///
    /// Text starting with `[` is read as a JSON array of numbers; anything
    /// else as a single number. When neither parse succeeds the original
    /// text is returned unchanged as `Scalar::Text`.
    pub fn encode(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.starts_with('[') {
            return match serde_json::from_str::<Vec<f64>>(trimmed) {
                Ok(values) => ScalarOrVector::Vector(values),
                Err(e) => {
                    debug!("Vector literal '{}' did not parse: {}", trimmed, e);
                    ScalarOrVector::Scalar(Scalar::Text(text.to_string()))
                }
            };
        }

        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => ScalarOrVector::Scalar(Scalar::Number(n)),
            _ => ScalarOrVector::Scalar(Scalar::Text(text.to_string())),
        }
    }

    /// View the value as a sequence. A scalar becomes a one-element sequence.
    pub fn as_sequence(&self) -> Vec<Scalar> {
        match self {
            ScalarOrVector::Vector(values) => values.iter().copied().map(Scalar::Number).collect(),
            ScalarOrVector::Scalar(s) => vec![s.clone()],
        }
    }

    /// Numeric sequence, or `None` if the value is unparsed text.
    pub fn numbers(&self) -> Option<Vec<f64>> {
        match self {
            ScalarOrVector::Vector(values) => Some(values.clone()),
            ScalarOrVector::Scalar(Scalar::Number(n)) => Some(vec![*n]),
            ScalarOrVector::Scalar(Scalar::Text(_)) => None,
        }
    }

    /// True unless the value fell through as raw text.
    pub fn is_parsed(&self) -> bool {
        !matches!(self, ScalarOrVector::Scalar(Scalar::Text(_)))
    }
}

impl From<f64> for ScalarOrVector {
    fn from(n: f64) -> Self {
        ScalarOrVector::Scalar(Scalar::Number(n))
    }
}

impl From<Vec<f64>> for ScalarOrVector {
    fn from(values: Vec<f64>) -> Self {
        ScalarOrVector::Vector(values)
    }
}

impl fmt::Display for ScalarOrVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarOrVector::Vector(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            ScalarOrVector::Scalar(Scalar::Number(n)) => write!(f, "{}", n),
            ScalarOrVector::Scalar(Scalar::Text(t)) => write!(f, "{}", t),
        }
    }
}
