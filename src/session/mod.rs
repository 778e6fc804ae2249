//! Live session: observable state, the reducer that folds stream messages
//! into it, and the controller that runs the stream.

mod controller;
pub mod reducer;
mod state;

pub use controller::{SessionController, DONE_LINE, ERROR_PREFIX};
pub use state::{BestSnapshot, HistoryPoint, RunOutcome, SessionState};
