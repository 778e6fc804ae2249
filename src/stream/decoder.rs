use serde::Deserialize;
use tracing::debug;

use super::types::{StreamMessage, UpdateRecord};
use crate::params::ScalarOrVector;

/// Wire shape of one NDJSON record, dispatched on `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireRecord {
    Log {
        msg: String,
    },
    Update {
        iteration: i64,
        cost: f64,
        penalty: f64,
        reliabilities: ScalarOrVector,
        point: Vec<f64>,
    },
}

/// Decode one framed line.
///
/// Returns `None` for anything that is not a well-formed `log` or `update`
/// record: bad JSON, an unknown `type`, missing or mistyped fields. Such
/// lines are dropped without affecting the session.
pub fn decode(line: &str) -> Option<StreamMessage> {
    let record: WireRecord = match serde_json::from_str(line) {
        Ok(record) => record,
        Err(e) => {
            debug!("Discarding stream line ({}): {}", e, truncate(line, 120));
            return None;
        }
    };

    match record {
        WireRecord::Log { msg } => Some(StreamMessage::Log { text: msg }),
        WireRecord::Update {
            iteration,
            cost,
            penalty,
            reliabilities,
            point,
        } => {
            let Some(reliabilities) = reliabilities.numbers() else {
                debug!("Discarding update {}: non-numeric reliabilities", iteration);
                return None;
            };
            Some(StreamMessage::Update(UpdateRecord {
                iteration,
                cost,
                penalty,
                reliabilities,
                point,
            }))
        }
    }
}

fn truncate(line: &str, max: usize) -> &str {
    match line.char_indices().nth(max) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_log() {
        assert_eq!(
            decode(r#"{"type":"log","msg":"Scenario loaded"}"#),
            Some(StreamMessage::Log {
                text: "Scenario loaded".to_string()
            })
        );
    }

    #[test]
    fn test_decode_update_with_vector() {
        let line = r#"{"type":"update","iteration":3,"cost":5.5,"penalty":0.0,"reliabilities":[0.9,0.95],"point":[1,2.5]}"#;
        let Some(StreamMessage::Update(update)) = decode(line) else {
            panic!("expected update");
        };
        assert_eq!(update.iteration, 3);
        assert_eq!(update.cost, 5.5);
        assert_eq!(update.reliabilities, vec![0.9, 0.95]);
        assert_eq!(update.point, vec![1.0, 2.5]);
    }

    #[test]
    fn test_decode_update_wraps_scalar_reliability() {
        let line = r#"{"type":"update","iteration":0,"cost":1,"penalty":2,"reliabilities":0.97,"point":[]}"#;
        let Some(StreamMessage::Update(update)) = decode(line) else {
            panic!("expected update");
        };
        assert_eq!(update.reliabilities, vec![0.97]);
        assert_eq!(update.penalty, 2.0);
    }

    #[test]
    fn test_decode_field_order_does_not_matter() {
        let line = r#"{"point":[0.1],"reliabilities":[1.0],"penalty":0,"cost":3,"iteration":7,"type":"update"}"#;
        assert!(matches!(decode(line), Some(StreamMessage::Update(u)) if u.iteration == 7));
    }

    #[test]
    fn test_discards_malformed_lines() {
        assert_eq!(decode("not json"), None);
        assert_eq!(decode(r#"{"type":"log","msg":"cut"#), None);
        assert_eq!(decode(r#"{"type":"progress","pct":10}"#), None);
        assert_eq!(decode(r#"{"msg":"no type"}"#), None);
        assert_eq!(decode(r#"{"type":"update","iteration":1,"cost":1.0}"#), None);
        assert_eq!(
            decode(r#"{"type":"update","iteration":1,"cost":1.0,"penalty":0,"reliabilities":"high","point":[]}"#),
            None
        );
        assert_eq!(
            decode(r#"{"type":"update","iteration":1,"cost":NaN,"penalty":0,"reliabilities":[1],"point":[]}"#),
            None
        );
    }

    #[test]
    fn test_tolerates_carriage_return() {
        assert!(decode("{\"type\":\"log\",\"msg\":\"x\"}\r").is_some());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
