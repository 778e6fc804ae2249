use tracing::{debug, info};

use super::presets::default_presets;
use super::types::{ProblemDescriptor, ScenarioPreset};
use crate::params::{Configuration, Variable};

/// Maps a scenario id to a configuration overlay and a variable list.
///
/// Holds the preset table and the problems advertised by the backend. The
/// resolver does not know whether a session is running; callers must only
/// switch scenarios while idle.
#[derive(Debug, Clone)]
pub struct ScenarioResolver {
    presets: Vec<ScenarioPreset>,
    problems: Vec<ProblemDescriptor>,
}

impl Default for ScenarioResolver {
    fn default() -> Self {
        Self::new(default_presets())
    }
}

impl ScenarioResolver {
    pub fn new(presets: Vec<ScenarioPreset>) -> Self {
        Self {
            presets,
            problems: Vec::new(),
        }
    }

    /// Replace the known problem list with what the backend reported.
    pub fn set_problems(&mut self, problems: Vec<ProblemDescriptor>) {
        info!("Backend offers {} scenario(s)", problems.len());
        self.problems = problems;
    }

    pub fn problems(&self) -> &[ProblemDescriptor] {
        &self.problems
    }

    pub fn preset(&self, id: &str) -> Option<&ScenarioPreset> {
        self.presets.iter().find(|p| p.id == id)
    }

    /// Compute the configuration and variables for switching to `id`.
    ///
    /// A known preset merges its overlay over `config` and replaces the
    /// variables. An unknown id only updates the scenario field and returns
    /// the variables unchanged. Inputs are never modified, so the caller
    /// installs both results together or neither.
    pub fn resolve(
        &self,
        id: &str,
        config: &Configuration,
        variables: &[Variable],
    ) -> (Configuration, Vec<Variable>) {
        let mut next = config.clone();
        next.set_scenario(id);

        if !self.problems.is_empty() && !self.problems.iter().any(|p| p.id == id) {
            debug!("Scenario '{}' is not in the backend's problem list", id);
        }

        match self.preset(id) {
            Some(preset) => {
                next.merge(&preset.config);
                let vars = preset.variables();
                info!("Scenario '{}' selected: {} variable(s)", id, vars.len());
                (next, vars)
            }
            None => {
                info!("Scenario '{}' has no preset; keeping current variables", id);
                (next, variables.to_vec())
            }
        }
    }
}
