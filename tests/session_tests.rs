use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use rbdo_console::params::RunRequest;
use rbdo_console::scenario::ProblemDescriptor;
use rbdo_console::session::{RunOutcome, SessionController, SessionState, DONE_LINE};
use rbdo_console::transport::{ChunkSource, Transport, TransportError};
use rbdo_console::ConsoleError;

type ChunkResult = Result<Vec<u8>, TransportError>;

/// Transport whose run bodies are fed by the test through channels.
struct ScriptedTransport {
    problems: Result<Vec<ProblemDescriptor>, TransportError>,
    runs: Mutex<VecDeque<Result<mpsc::UnboundedReceiver<ChunkResult>, TransportError>>>,
    requests: Mutex<Vec<RunRequest>>,
}

impl ScriptedTransport {
    fn new() -> Self {
        Self {
            problems: Ok(Vec::new()),
            runs: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn with_problems(mut self, problems: Result<Vec<ProblemDescriptor>, TransportError>) -> Self {
        self.problems = problems;
        self
    }

    /// Queue a streamed body; the returned sender feeds it. Dropping the
    /// sender ends the stream.
    fn queue_stream(&self) -> mpsc::UnboundedSender<ChunkResult> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.runs.lock().unwrap().push_back(Ok(rx));
        tx
    }

    /// Queue a complete body made of the given chunks.
    fn queue_chunks(&self, chunks: &[&str]) {
        let tx = self.queue_stream();
        for chunk in chunks {
            tx.send(Ok(chunk.as_bytes().to_vec())).unwrap();
        }
    }

    fn queue_rejection(&self, error: TransportError) {
        self.runs.lock().unwrap().push_back(Err(error));
    }

    fn requests(&self) -> Vec<RunRequest> {
        self.requests.lock().unwrap().clone()
    }
}

struct ChannelBody {
    rx: mpsc::UnboundedReceiver<ChunkResult>,
}

#[async_trait]
impl ChunkSource for ChannelBody {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        match self.rx.recv().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn list_problems(&self) -> Result<Vec<ProblemDescriptor>, TransportError> {
        self.problems.clone()
    }

    async fn run_optimization(
        &self,
        request: &RunRequest,
        _cancel: &CancellationToken,
    ) -> Result<Box<dyn ChunkSource>, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self
            .runs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("no scripted run".to_string())));
        next.map(|rx| Box::new(ChannelBody { rx }) as Box<dyn ChunkSource>)
    }
}

fn controller_with(transport: &Arc<ScriptedTransport>) -> SessionController {
    SessionController::new(Arc::clone(transport) as Arc<dyn Transport>)
}

fn count(state: &SessionState, line: &str) -> usize {
    state.log.iter().filter(|l| l.as_str() == line).count()
}

fn has_error_line(state: &SessionState) -> bool {
    state.log.iter().any(|l| l.starts_with("Error:"))
}

const UPDATE_1: &str = r#"{"type":"update","iteration":1,"cost":5.0,"penalty":0.0,"reliabilities":[0.9,0.95],"point":[1,2]}"#;

#[tokio::test]
async fn test_end_to_end_split_record() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.queue_chunks(&[
        format!("{}\n{}", UPDATE_1, r#"{"type":"log","msg":"hel"#).as_str(),
        "lo\"}\n",
    ]);
    let mut controller = controller_with(&transport);

    assert!(controller.start());
    assert_eq!(controller.wait().await, Some(RunOutcome::Completed));

    let state = controller.snapshot();
    assert!(!state.running);
    assert_eq!(state.history.len(), 1);
    assert_eq!(state.history[0].rel(0), Some(0.9));
    assert_eq!(state.history[0].rel(1), Some(0.95));
    assert_eq!(count(&state, "hello"), 1);
    assert_eq!(count(&state, DONE_LINE), 1);
    assert_eq!(state.log.last().map(String::as_str), Some(DONE_LINE));

    let best = state.best.expect("best snapshot");
    assert_eq!(best.iteration, 1);
    assert_eq!(best.point, vec![1.0, 2.0]);
}

#[tokio::test]
async fn test_series_width_follows_reliability_targets() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.queue_chunks(&[format!("{}\n", UPDATE_1).as_str()]);
    transport.queue_chunks(&[format!("{}\n", UPDATE_1).as_str()]);
    let mut controller = controller_with(&transport);

    controller.set_field("reliability_target", "[0.9, 0.95]").unwrap();
    assert!(controller.start());
    controller.wait().await;
    let state = controller.snapshot();
    assert_eq!(state.series_width, Some(2));
    assert_eq!(state.constraint_series(), vec![vec![Some(0.9)], vec![Some(0.95)]]);

    controller.set_field("reliability_target", "0.98").unwrap();
    assert!(controller.start());
    controller.wait().await;
    let state = controller.snapshot();
    assert_eq!(state.series_width, Some(1), "width comes from the targets, not the records");
    assert_eq!(state.constraint_series(), vec![vec![Some(0.9)]]);
}

#[tokio::test]
async fn test_start_logs_scenario_and_request() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.queue_chunks(&[]);
    let mut controller = controller_with(&transport);
    controller.select_scenario("math_2d_real").unwrap();

    controller.start();
    controller.wait().await;

    let state = controller.snapshot();
    assert_eq!(
        state.log,
        vec![">>> Scenario: math_2d_real", ">>> Sending Config...", DONE_LINE]
    );
    assert!(state.started_at.is_some());

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    let body = serde_json::to_value(&requests[0]).unwrap();
    assert_eq!(body["config"]["problem_scenario"], "math_2d_real");
    assert_eq!(body["config"]["std"], 0.3464);
    assert_eq!(body["ranges"]["x2_range"], serde_json::json!([0.0, 10.0]));
}

#[tokio::test]
async fn test_stop_right_after_start_is_not_an_error() {
    let transport = Arc::new(ScriptedTransport::new());
    let _feed = transport.queue_stream();
    let mut controller = controller_with(&transport);

    assert!(controller.start());
    controller.stop().await;

    let state = controller.snapshot();
    assert!(!state.running);
    assert!(!has_error_line(&state), "log: {:?}", state.log);
    assert_eq!(count(&state, DONE_LINE), 1);
    assert_eq!(state.outcome, Some(RunOutcome::Cancelled));
}

#[tokio::test]
async fn test_stop_mid_stream_keeps_received_data() {
    let transport = Arc::new(ScriptedTransport::new());
    let feed = transport.queue_stream();
    let mut controller = controller_with(&transport);
    let mut updates = controller.subscribe();

    controller.start();
    feed.send(Ok(format!("{}\n", UPDATE_1).into_bytes())).unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            updates.changed().await.unwrap();
            if !updates.borrow().history.is_empty() {
                break;
            }
        }
    })
    .await
    .expect("update should be published");

    controller.stop().await;
    let state = controller.snapshot();
    assert_eq!(state.history.len(), 1);
    assert_eq!(state.outcome, Some(RunOutcome::Cancelled));
    assert_eq!(count(&state, DONE_LINE), 1);

    // A stopped controller ignores a second stop.
    controller.stop().await;
    assert_eq!(count(&controller.snapshot(), DONE_LINE), 1);
}

#[tokio::test]
async fn test_second_start_is_ignored_while_running() {
    let transport = Arc::new(ScriptedTransport::new());
    let feed = transport.queue_stream();
    let mut controller = controller_with(&transport);

    assert!(controller.start());
    assert!(controller.is_running());
    assert!(!controller.start());

    drop(feed);
    controller.wait().await;
    assert_eq!(transport.requests().len(), 1);
    assert_eq!(count(&controller.snapshot(), ">>> Sending Config..."), 1);
}

#[tokio::test]
async fn test_http_rejection_fails_the_run() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.queue_rejection(TransportError::Status {
        status: 400,
        message: "Unknown scenario: beam".to_string(),
    });
    let mut controller = controller_with(&transport);

    controller.start();
    assert_eq!(controller.wait().await, Some(RunOutcome::Failed));

    let state = controller.snapshot();
    assert!(!state.running);
    assert_eq!(count(&state, "Error: Unknown scenario: beam"), 1);
    assert_eq!(state.log.last().map(String::as_str), Some(DONE_LINE));
}

#[tokio::test]
async fn test_body_error_keeps_earlier_records() {
    let transport = Arc::new(ScriptedTransport::new());
    let feed = transport.queue_stream();
    feed.send(Ok(format!("{}\n", UPDATE_1).into_bytes())).unwrap();
    feed.send(Err(TransportError::Body("connection reset".to_string())))
        .unwrap();
    let mut controller = controller_with(&transport);

    controller.start();
    assert_eq!(controller.wait().await, Some(RunOutcome::Failed));

    let state = controller.snapshot();
    assert_eq!(state.history.len(), 1);
    assert_eq!(
        count(&state, "Error: Failed to read response body: connection reset"),
        1
    );
    assert_eq!(count(&state, DONE_LINE), 1);
}

#[tokio::test]
async fn test_malformed_lines_are_skipped() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.queue_chunks(&[
        "garbage\n\n   \n",
        r#"{"type":"mystery","msg":"?"}"#,
        "\n",
        r#"{"type":"log","msg":"still here"}"#,
        "\n",
    ]);
    let mut controller = controller_with(&transport);

    controller.start();
    assert_eq!(controller.wait().await, Some(RunOutcome::Completed));

    let state = controller.snapshot();
    assert!(!has_error_line(&state));
    assert_eq!(count(&state, "still here"), 1);
    assert!(state.history.is_empty());
}

#[tokio::test]
async fn test_final_line_without_newline_is_kept() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.queue_chunks(&[r#"{"type":"log","msg":"=== Optimization Finished ==="}"#]);
    let mut controller = controller_with(&transport);

    controller.start();
    controller.wait().await;

    let state = controller.snapshot();
    assert_eq!(count(&state, "=== Optimization Finished ==="), 1);
    assert_eq!(state.log.last().map(String::as_str), Some(DONE_LINE));
}

#[tokio::test]
async fn test_reset_on_idle_controller_is_a_no_op() {
    let transport = Arc::new(ScriptedTransport::new());
    let mut controller = controller_with(&transport);

    controller.reset().await;
    assert_eq!(controller.snapshot(), SessionState::default());
    controller.reset().await;
    assert_eq!(controller.snapshot(), SessionState::default());
    assert!(!controller.is_running());
}

#[tokio::test]
async fn test_reset_stops_and_clears() {
    let transport = Arc::new(ScriptedTransport::new());
    let feed = transport.queue_stream();
    feed.send(Ok(format!("{}\n", UPDATE_1).into_bytes())).unwrap();
    let mut controller = controller_with(&transport);

    controller.start();
    controller.reset().await;

    let state = controller.snapshot();
    assert!(!state.running);
    assert!(state.history.is_empty());
    assert!(state.best.is_none());
    assert!(state.log.is_empty());
}

#[tokio::test]
async fn test_new_run_clears_previous_history() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.queue_chunks(&[format!("{}\n", UPDATE_1).as_str()]);
    transport.queue_chunks(&[r#"{"type":"log","msg":"second"}"#, "\n"]);
    let mut controller = controller_with(&transport);

    controller.start();
    controller.wait().await;
    assert_eq!(controller.snapshot().history.len(), 1);

    assert!(controller.start());
    controller.wait().await;
    let state = controller.snapshot();
    assert!(state.history.is_empty());
    assert!(state.best.is_none());
    assert_eq!(count(&state, "second"), 1);
    assert_eq!(count(&state, DONE_LINE), 1);
}

#[tokio::test]
async fn test_edits_rejected_while_running() {
    let transport = Arc::new(ScriptedTransport::new());
    let feed = transport.queue_stream();
    let mut controller = controller_with(&transport);

    controller.start();
    assert!(matches!(
        controller.set_field("max_iterations", "3"),
        Err(ConsoleError::Busy)
    ));
    assert!(matches!(controller.add_variable(), Err(ConsoleError::Busy)));
    assert!(matches!(
        controller.select_scenario("car_crash_real"),
        Err(ConsoleError::Busy)
    ));
    assert_eq!(controller.variables().len(), 2);

    drop(feed);
    controller.wait().await;
    controller.set_field("max_iterations", "3").unwrap();
    assert_eq!(controller.config().get_f64("max_iterations"), Some(3.0));
    assert_eq!(controller.add_variable().unwrap(), 3);
}

#[tokio::test]
async fn test_initialize_selects_first_problem() {
    let transport = Arc::new(ScriptedTransport::new().with_problems(Ok(vec![
        ProblemDescriptor {
            id: "car_crash_real".to_string(),
            name: "Car Crash (11D Real)".to_string(),
        },
        ProblemDescriptor {
            id: "math_2d_real".to_string(),
            name: "2D Math Case (Real)".to_string(),
        },
    ])));
    let mut controller = controller_with(&transport);

    controller.initialize().await.unwrap();
    assert_eq!(controller.resolver().problems().len(), 2);
    assert_eq!(controller.config().scenario(), "car_crash_real");
    assert_eq!(controller.variables().len(), 9);
    assert_eq!(controller.config().get_str("reliability_target"), Some("0.9"));

    // An already chosen scenario is kept.
    controller.select_scenario("math_2d_real").unwrap();
    controller.initialize().await.unwrap();
    assert_eq!(controller.config().scenario(), "math_2d_real");
}

#[tokio::test]
async fn test_initialize_failure_is_logged() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .with_problems(Err(TransportError::Network("connection refused".to_string()))),
    );
    let mut controller = controller_with(&transport);

    assert!(controller.initialize().await.is_err());
    let state = controller.snapshot();
    assert_eq!(state.log.len(), 1);
    assert!(state.log[0].starts_with("[Error] Could not connect to backend: connection refused"));
    assert_eq!(controller.config().scenario(), "");
}
