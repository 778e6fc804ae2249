use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::params::{Scalar, ScalarOrVector, Variable};
use crate::stream::UpdateRecord;

/// How the last run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Completed,
    Cancelled,
    Failed,
}

/// One chart row derived from an update.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPoint {
    pub iteration: i64,
    pub cost: f64,
    pub penalty: f64,
    pub reliabilities: Vec<f64>,
}

impl HistoryPoint {
    /// Reliability of constraint `index`, if this row has one.
    pub fn rel(&self, index: usize) -> Option<f64> {
        self.reliabilities.get(index).copied()
    }
}

impl From<&UpdateRecord> for HistoryPoint {
    fn from(update: &UpdateRecord) -> Self {
        Self {
            iteration: update.iteration,
            cost: update.cost,
            penalty: update.penalty,
            reliabilities: update.reliabilities.clone(),
        }
    }
}

/// Flattens to `{iteration, cost, penalty, rel_0, rel_1, ...}`.
impl Serialize for HistoryPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3 + self.reliabilities.len()))?;
        map.serialize_entry("iteration", &self.iteration)?;
        map.serialize_entry("cost", &self.cost)?;
        map.serialize_entry("penalty", &self.penalty)?;
        for (idx, value) in self.reliabilities.iter().enumerate() {
            map.serialize_entry(&format!("rel_{}", idx), value)?;
        }
        map.end()
    }
}

/// The most recent update, shown as the current leading design.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestSnapshot {
    pub iteration: i64,
    pub cost: f64,
    pub penalty: f64,
    pub reliabilities: Vec<f64>,
    pub point: Vec<f64>,
}

impl From<UpdateRecord> for BestSnapshot {
    fn from(update: UpdateRecord) -> Self {
        Self {
            iteration: update.iteration,
            cost: update.cost,
            penalty: update.penalty,
            reliabilities: update.reliabilities,
            point: update.point,
        }
    }
}

impl BestSnapshot {
    pub fn min_reliability(&self) -> Option<f64> {
        self.reliabilities.iter().copied().reduce(f64::min)
    }

    /// Whether every constraint reaches its target.
    ///
    /// A scalar target applies to all constraints; a vector target is
    /// matched by position. Unparsed targets never count as met.
    pub fn meets_target(&self, target: &ScalarOrVector) -> bool {
        if self.reliabilities.is_empty() {
            return false;
        }
        match target {
            ScalarOrVector::Scalar(Scalar::Number(t)) => {
                self.min_reliability().map_or(false, |min| min >= *t)
            }
            ScalarOrVector::Vector(targets) => {
                targets.len() >= self.reliabilities.len()
                    && self
                        .reliabilities
                        .iter()
                        .zip(targets)
                        .all(|(rel, t)| rel >= t)
            }
            ScalarOrVector::Scalar(Scalar::Text(_)) => false,
        }
    }

    /// Pair each coordinate with the variable at the same position,
    /// falling back to `x<i+1>` past the end of the list.
    pub fn labelled_point(&self, variables: &[Variable]) -> Vec<(String, f64)> {
        self.point
            .iter()
            .enumerate()
            .map(|(idx, value)| {
                let name = variables
                    .get(idx)
                    .map(|v| v.name.clone())
                    .unwrap_or_else(|| format!("x{}", idx + 1));
                (name, *value)
            })
            .collect()
    }
}

/// Observable state of the live session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    pub running: bool,
    pub history: Vec<HistoryPoint>,
    pub best: Option<BestSnapshot>,
    pub log: Vec<String>,
    /// Constraint count, taken from the run's reliability targets at start.
    pub series_width: Option<usize>,
    pub outcome: Option<RunOutcome>,
    pub started_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Drop history, best snapshot and log. `running` is left alone.
    pub fn clear(&mut self) {
        self.history.clear();
        self.best = None;
        self.log.clear();
        self.series_width = None;
        self.outcome = None;
        self.started_at = None;
    }

    pub fn push_log(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty() && self.best.is_none() && self.log.is_empty()
    }

    /// Values of constraint `index` across the history, one per row.
    /// Rows reporting fewer constraints yield `None`.
    pub fn rel_series(&self, index: usize) -> Vec<Option<f64>> {
        self.history.iter().map(|p| p.rel(index)).collect()
    }

    /// One series per configured constraint.
    pub fn constraint_series(&self) -> Vec<Vec<Option<f64>>> {
        (0..self.series_width.unwrap_or(0))
            .map(|index| self.rel_series(index))
            .collect()
    }
}
