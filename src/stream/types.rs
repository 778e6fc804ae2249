use serde::{Deserialize, Serialize};

/// A decoded record from the optimization stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    Log { text: String },
    Update(UpdateRecord),
}

/// Progress report for one iteration. `reliabilities` is always a sequence,
/// one entry per constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecord {
    pub iteration: i64,
    pub cost: f64,
    pub penalty: f64,
    pub reliabilities: Vec<f64>,
    pub point: Vec<f64>,
}
