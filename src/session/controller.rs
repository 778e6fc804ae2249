use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::reducer::ingest_line;
use super::state::{RunOutcome, SessionState};
use crate::error::ConsoleError;
use crate::params::{self, Configuration, RunRequest, Variable};
use crate::scenario::ScenarioResolver;
use crate::stream::LineFramer;
use crate::transport::{Transport, TransportError};

/// Final line appended to the session log when a run ends, however it ends.
pub const DONE_LINE: &str = ">>> Done";

/// Prefix of the log line describing a failed run.
pub const ERROR_PREFIX: &str = "Error: ";

struct ActiveRun {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Drives one live optimization session at a time.
///
/// The controller owns the configuration, the variable list and the
/// session state. State is published through a `watch` channel: the
/// controller and its read loop are the only writers, observers call
/// [`subscribe`](Self::subscribe).
///
/// Lifecycle: `Idle -> Running -> (Completed | Cancelled | Failed) -> Idle`.
/// The terminal outcome is recorded in [`SessionState::outcome`] and the
/// controller is immediately ready for another `start()`.
pub struct SessionController {
    transport: Arc<dyn Transport>,
    resolver: ScenarioResolver,
    config: Configuration,
    variables: Vec<Variable>,
    state: Arc<watch::Sender<SessionState>>,
    active: Option<ActiveRun>,
}

impl SessionController {
    /// Controller with the default configuration, variables and presets.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_parts(
            transport,
            ScenarioResolver::default(),
            Configuration::default(),
            params::default_variables(),
        )
    }

    pub fn with_parts(
        transport: Arc<dyn Transport>,
        resolver: ScenarioResolver,
        config: Configuration,
        variables: Vec<Variable>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            transport,
            resolver,
            config,
            variables,
            state: Arc::new(state),
            active: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Clone of the current session state.
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.state.borrow().running
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn resolver(&self) -> &ScenarioResolver {
        &self.resolver
    }

    /// Load the backend's problem list and pick the first scenario if none
    /// is selected yet. A failure is also written to the session log.
    pub async fn initialize(&mut self) -> Result<(), TransportError> {
        let problems = match self.transport.list_problems().await {
            Ok(problems) => problems,
            Err(e) => {
                warn!("Failed to fetch problems: {}", e);
                let line = format!("[Error] Could not connect to backend: {}. Is the backend running?", e);
                self.state.send_modify(|s| s.push_log(line));
                return Err(e);
            }
        };

        let first = problems.first().map(|p| p.id.clone());
        self.resolver.set_problems(problems);

        if let Some(id) = first.filter(|_| self.config.scenario().is_empty()) {
            if let Err(e) = self.select_scenario(&id) {
                debug!("Skipped auto-selecting '{}': {}", id, e);
            }
        }
        Ok(())
    }

    fn ensure_idle(&self) -> Result<(), ConsoleError> {
        if self.is_running() {
            return Err(ConsoleError::Busy);
        }
        Ok(())
    }

    pub fn set_field(&mut self, name: &str, text: &str) -> Result<(), ConsoleError> {
        self.ensure_idle()?;
        self.config.set_field(name, text)
    }

    pub fn add_variable(&mut self) -> Result<u32, ConsoleError> {
        self.ensure_idle()?;
        Ok(params::add_variable(&mut self.variables))
    }

    pub fn remove_variable(&mut self, id: u32) -> Result<(), ConsoleError> {
        self.ensure_idle()?;
        params::remove_variable(&mut self.variables, id)
    }

    pub fn update_variable(&mut self, id: u32, field: &str, text: &str) -> Result<(), ConsoleError> {
        self.ensure_idle()?;
        params::update_variable(&mut self.variables, id, field, text)
    }

    pub fn set_variables(&mut self, variables: Vec<Variable>) -> Result<(), ConsoleError> {
        self.ensure_idle()?;
        self.variables = variables;
        Ok(())
    }

    /// Switch scenario, replacing configuration and variables together.
    pub fn select_scenario(&mut self, id: &str) -> Result<(), ConsoleError> {
        self.ensure_idle()?;
        let (config, variables) = self.resolver.resolve(id, &self.config, &self.variables);
        self.config = config;
        self.variables = variables;
        Ok(())
    }

    /// Begin a run. Returns `false` and does nothing if one is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            debug!("Ignoring start: a run is already in progress");
            return false;
        }
        // A previous run has already published its outcome.
        self.active = None;

        let request = RunRequest::build(&self.config, &self.variables);
        let scenario = self.config.scenario().to_string();
        let series_width = Some(self.config.reliability_targets().len()).filter(|n| *n > 0);
        info!(
            "Starting run for scenario '{}' with {} variable(s)",
            scenario,
            self.variables.len()
        );

        self.state.send_modify(|s| {
            s.clear();
            s.running = true;
            s.started_at = Some(Utc::now());
            s.series_width = series_width;
            s.push_log(format!(">>> Scenario: {}", scenario));
            s.push_log(">>> Sending Config...");
        });

        let cancel = CancellationToken::new();
        let task = tokio::spawn(drive_run(
            Arc::clone(&self.transport),
            request,
            cancel.clone(),
            Arc::clone(&self.state),
        ));
        self.active = Some(ActiveRun { cancel, task });
        true
    }

    /// Cancel the running session and wait for its read loop to finish.
    pub async fn stop(&mut self) {
        let Some(run) = self.active.take() else {
            return;
        };
        if self.is_running() {
            info!("Stopping run");
        }
        run.cancel.cancel();
        self.join(run.task).await;
    }

    /// Wait for the current run to end on its own.
    pub async fn wait(&mut self) -> Option<RunOutcome> {
        if let Some(run) = self.active.take() {
            self.join(run.task).await;
        }
        self.state.borrow().outcome
    }

    /// Stop any run, then clear history, best snapshot and log.
    pub async fn reset(&mut self) {
        self.stop().await;
        self.state.send_if_modified(|s| {
            let changed = !s.is_empty() || s.outcome.is_some() || s.running;
            s.clear();
            s.running = false;
            changed
        });
    }

    async fn join(&self, task: JoinHandle<()>) {
        if let Err(e) = task.await {
            warn!("Run task ended abnormally: {}", e);
            self.state.send_if_modified(|s| {
                if !s.running {
                    return false;
                }
                s.running = false;
                s.outcome = Some(RunOutcome::Failed);
                s.push_log(format!("{}{}", ERROR_PREFIX, e));
                s.push_log(DONE_LINE);
                true
            });
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(run) = &self.active {
            run.cancel.cancel();
        }
    }
}

/// Run one session to its end and publish the terminal outcome.
async fn drive_run(
    transport: Arc<dyn Transport>,
    request: RunRequest,
    cancel: CancellationToken,
    state: Arc<watch::Sender<SessionState>>,
) {
    let result = stream_run(transport.as_ref(), &request, &cancel, &state).await;

    let (outcome, failure) = match result {
        Ok(()) => (RunOutcome::Completed, None),
        Err(TransportError::Cancelled) => (RunOutcome::Cancelled, None),
        Err(_) if cancel.is_cancelled() => (RunOutcome::Cancelled, None),
        Err(e) => (RunOutcome::Failed, Some(e.to_string())),
    };

    match &failure {
        Some(message) => warn!("Run failed: {}", message),
        None => info!("Run finished: {:?}", outcome),
    }

    state.send_modify(|s| {
        if let Some(message) = failure {
            s.push_log(format!("{}{}", ERROR_PREFIX, message));
        }
        s.push_log(DONE_LINE);
        s.running = false;
        s.outcome = Some(outcome);
    });
}

/// Open the stream and fold every record into the state until the body
/// ends or `cancel` fires. The only suspension points are the request and
/// each chunk read.
async fn stream_run(
    transport: &dyn Transport,
    request: &RunRequest,
    cancel: &CancellationToken,
    state: &watch::Sender<SessionState>,
) -> Result<(), TransportError> {
    let mut body = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(TransportError::Cancelled),
        opened = transport.run_optimization(request, cancel) => opened?,
    };

    let mut framer = LineFramer::new();
    let mut discarded = 0usize;

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            next = body.next_chunk() => next?,
        };
        let Some(chunk) = chunk else {
            break;
        };

        let lines = framer.push(&chunk);
        if lines.is_empty() {
            continue;
        }
        state.send_if_modified(|s| {
            let mut changed = false;
            for line in &lines {
                if ingest_line(s, line) {
                    changed = true;
                } else if !line.trim().is_empty() {
                    discarded += 1;
                }
            }
            changed
        });
    }

    if let Some(tail) = framer.finish() {
        debug!("Stream ended without a final newline; decoding {} trailing byte(s)", tail.len());
        state.send_if_modified(|s| ingest_line(s, &tail));
    }

    if discarded > 0 {
        debug!("Discarded {} undecodable line(s)", discarded);
    }
    Ok(())
}
