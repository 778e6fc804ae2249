use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

use rbdo_console::params::{default_variables, Variable};
use rbdo_console::scenario::{load_presets, ScenarioResolver};
use rbdo_console::session::{RunOutcome, SessionController, SessionState};
use rbdo_console::settings::load_settings;
use rbdo_console::transport::HttpTransport;

#[derive(Parser)]
#[command(name = "rbdo-console", version, about = "Operator console for LLM-driven RBDO runs")]
struct Cli {
    /// Settings file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the scenarios offered by the backend
    Problems,
    /// Start an optimization run and follow it until it ends
    Run {
        /// Scenario id to select before starting
        #[arg(long)]
        scenario: Option<String>,
        /// Override a configuration field
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
        /// Replace the variable list, in order
        #[arg(long = "var", value_name = "NAME:MIN:MAX")]
        vars: Vec<String>,
        /// Print history rows as JSON lines
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    rbdo_console::init_tracing();
    let cli = Cli::parse();

    let settings = load_settings(cli.settings.as_deref())?;
    let transport = Arc::new(HttpTransport::from_settings(&settings)?);
    let resolver = match &settings.presets_path {
        Some(path) => ScenarioResolver::new(
            load_presets(path)
                .with_context(|| format!("Failed to load presets from {}", path.display()))?,
        ),
        None => ScenarioResolver::default(),
    };
    let mut controller = SessionController::with_parts(
        transport,
        resolver,
        settings.initial_configuration(),
        default_variables(),
    );

    match cli.command {
        Command::Problems => {
            controller.initialize().await?;
            for problem in controller.resolver().problems() {
                println!("{}\t{}", problem.id, problem.name);
            }
            Ok(())
        }
        Command::Run {
            scenario,
            set,
            vars,
            json,
        } => run(&mut controller, scenario, &set, &vars, json).await,
    }
}

async fn run(
    controller: &mut SessionController,
    scenario: Option<String>,
    set: &[String],
    vars: &[String],
    json: bool,
) -> Result<()> {
    if let Err(e) = controller.initialize().await {
        warn!("Continuing without the backend's problem list: {}", e);
    }

    if let Some(id) = scenario {
        controller.select_scenario(&id)?;
    }
    for assignment in set {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected KEY=VALUE, got '{}'", assignment))?;
        controller.set_field(key.trim(), value)?;
    }
    if !vars.is_empty() {
        controller.set_variables(parse_variables(vars)?)?;
    }

    let mut updates = controller.subscribe();
    controller.start();

    let mut printer = Printer::new(json);
    loop {
        let state = updates.borrow_and_update().clone();
        printer.print(&state);
        if !state.running {
            break;
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Stopping run...");
                controller.stop().await;
            }
        }
    }

    let outcome = controller.wait().await;
    let state = controller.snapshot();
    printer.print(&state);
    print_summary(controller, &state);

    if outcome == Some(RunOutcome::Failed) {
        bail!("Run failed");
    }
    Ok(())
}

fn parse_variables(specs: &[String]) -> Result<Vec<Variable>> {
    specs
        .iter()
        .enumerate()
        .map(|(idx, spec)| {
            let parts: Vec<&str> = spec.split(':').collect();
            let [name, min, max] = parts.as_slice() else {
                bail!("Expected NAME:MIN:MAX, got '{}'", spec);
            };
            let min: f64 = min.trim().parse().with_context(|| format!("Bad minimum in '{}'", spec))?;
            let max: f64 = max.trim().parse().with_context(|| format!("Bad maximum in '{}'", spec))?;
            Ok(Variable::new(idx as u32 + 1, name.trim(), min, max))
        })
        .collect()
}

/// Prints whatever the session gained since the last call.
struct Printer {
    json: bool,
    logs_seen: usize,
    rows_seen: usize,
}

impl Printer {
    fn new(json: bool) -> Self {
        Self {
            json,
            logs_seen: 0,
            rows_seen: 0,
        }
    }

    fn print(&mut self, state: &SessionState) {
        for line in state.log.iter().skip(self.logs_seen) {
            println!("{}", line);
        }
        self.logs_seen = state.log.len();

        for row in state.history.iter().skip(self.rows_seen) {
            if self.json {
                match serde_json::to_string(row) {
                    Ok(line) => println!("{}", line),
                    Err(e) => warn!("Failed to serialize history row: {}", e),
                }
            } else {
                let rels: Vec<String> = row.reliabilities.iter().map(|r| format!("{:.3}", r)).collect();
                println!(
                    "  iter {:>4}  cost {:>12.4}  penalty {:>10.4}  rel [{}]",
                    row.iteration,
                    row.cost,
                    row.penalty,
                    rels.join(", ")
                );
            }
        }
        self.rows_seen = state.history.len();
    }
}

fn print_summary(controller: &SessionController, state: &SessionState) {
    let Some(best) = &state.best else {
        println!("No data received.");
        return;
    };

    let met = controller
        .config()
        .scalar_or_vector("reliability_target")
        .map_or(false, |target| best.meets_target(&target));

    println!();
    println!(
        "Best design (iteration {}): cost {:.4}, penalty {:.4}, targets {}",
        best.iteration,
        best.cost,
        best.penalty,
        if met { "met" } else { "not met" }
    );
    for (name, value) in best.labelled_point(controller.variables()) {
        println!("  {:<12} {}", name, value);
    }
    if let Some(started) = state.started_at {
        let elapsed = chrono::Utc::now() - started;
        println!("Elapsed: {}s", elapsed.num_seconds());
    }
}
