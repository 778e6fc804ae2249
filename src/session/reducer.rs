//! Applies decoded stream messages to session state.
//!
//! Everything here is synchronous and free of I/O; the controller is the
//! only caller and the only writer of the state it passes in.

use tracing::debug;

use super::state::{BestSnapshot, HistoryPoint, SessionState};
use crate::stream::{decode, StreamMessage};

/// Fold one message into the state.
///
/// Updates are appended in arrival order; nothing is sorted or deduplicated.
pub fn apply(state: &mut SessionState, message: StreamMessage) {
    match message {
        StreamMessage::Log { text } => state.log.push(text),
        StreamMessage::Update(update) => {
            if let Some(width) = state.series_width.filter(|w| *w != update.reliabilities.len()) {
                debug!(
                    "Update {} reports {} reliabilities, {} configured",
                    update.iteration,
                    update.reliabilities.len(),
                    width
                );
            }
            state.history.push(HistoryPoint::from(&update));
            state.best = Some(BestSnapshot::from(update));
        }
    }
}

/// Decode one framed line and apply it. Blank and undecodable lines are
/// skipped. Returns whether the state changed.
pub fn ingest_line(state: &mut SessionState, line: &str) -> bool {
    if line.trim().is_empty() {
        return false;
    }
    match decode(line) {
        Some(message) => {
            apply(state, message);
            true
        }
        None => false,
    }
}
