#![recursion_limit = "256"]

mod error;
pub mod params;
pub mod scenario;
pub mod session;
pub mod settings;
pub mod stream;
pub mod transport;

pub use error::ConsoleError;
pub use session::{SessionController, SessionState};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// `info` filter. Output goes to stderr.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
