//! Session snapshot encoding.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::session::{LogEntry, SessionId, Status};

/// Point-in-time encoding of an [`OpSession`](crate::OpSession).
///
/// Messages serialize as `[timestamp, text]` pairs in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub session_id: SessionId,
    pub op_name: String,
    pub status: Status,
    /// Epoch seconds.
    pub start_time: f64,
    /// Epoch seconds; present iff the session reached `done`.
    pub end_time: Option<f64>,
    pub messages: Vec<LogEntry>,
}

impl Snapshot {
    /// Encode as a JSON value.
    ///
    /// # Errors
    /// Returns error if serialization fails (non-finite timestamps).
    pub fn encode(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Decode from a JSON value.
    ///
    /// # Errors
    /// Returns error if the value is not a well-formed snapshot.
    pub fn decode(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Text of the most recent message, if any.
    #[must_use]
    pub fn last_message(&self) -> Option<&str> {
        self.messages.last().map(|(_, text)| text.as_str())
    }

    /// Whether any message has exactly this text.
    #[must_use]
    pub fn has_message(&self, text: &str) -> bool {
        self.messages.iter().any(|(_, t)| t == text)
    }
}

/// Per-operation entry of a task/process listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpSummary {
    /// Current or last known session.
    Session(Snapshot),
    /// Operation has never run.
    NoHistory { op_name: String, status: String },
}

impl OpSummary {
    /// Placeholder for an operation without any session yet.
    #[must_use]
    pub fn no_history(op_name: impl Into<String>) -> Self {
        Self::NoHistory {
            op_name: op_name.into(),
            status: "no_history".to_string(),
        }
    }

    #[must_use]
    pub fn op_name(&self) -> &str {
        match self {
            Self::Session(snapshot) => &snapshot.op_name,
            Self::NoHistory { op_name, .. } => op_name,
        }
    }

    #[must_use]
    pub const fn session(&self) -> Option<&Snapshot> {
        match self {
            Self::Session(snapshot) => Some(snapshot),
            Self::NoHistory { .. } => None,
        }
    }
}

/// Serde adapter encoding a missing snapshot as `{}`.
pub mod or_empty {
    use super::{Deserialize, Deserializer, Serialize, Serializer, Snapshot, Value};

    /// # Errors
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(
        snapshot: &Option<Snapshot>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match snapshot {
            Some(snapshot) => snapshot.serialize(serializer),
            None => serde_json::Map::new().serialize(serializer),
        }
    }

    /// # Errors
    /// Returns error if a non-empty value is not a snapshot.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Snapshot>, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            Value::Object(map) if map.is_empty() => Ok(None),
            value => serde_json::from_value(value)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        Snapshot {
            session_id: 3,
            op_name: "init".into(),
            status: Status::Done,
            start_time: 1_700_000_000.25,
            end_time: Some(1_700_000_002.5),
            messages: vec![
                (1_700_000_000.25, "Status is now \"starting\".".into()),
                (1_700_000_002.5, "ok".into()),
            ],
        }
    }

    #[test]
    fn test_roundtrip() {
        let original = sample();
        let decoded = Snapshot::decode(original.encode().unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_wire_shape() {
        let value = sample().encode().unwrap();
        assert_eq!(value["status"], "done");
        assert_eq!(value["messages"][1][1], "ok");
        assert!(value["messages"][0][0].is_f64());

        let mut running = sample();
        running.end_time = None;
        running.status = Status::Running;
        assert!(running.encode().unwrap()["end_time"].is_null());
    }

    #[test]
    fn test_unknown_status_does_not_decode() {
        let mut value = sample().encode().unwrap();
        value["status"] = "paused".into();
        assert!(Snapshot::decode(value).is_err());
    }

    #[test]
    fn test_summary_placeholder() {
        let summary = OpSummary::no_history("acq");
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json, serde_json::json!({"op_name": "acq", "status": "no_history"}));

        let parsed: OpSummary = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, summary);
        assert!(parsed.session().is_none());

        let parsed: OpSummary = serde_json::from_value(sample().encode().unwrap()).unwrap();
        assert_eq!(parsed.op_name(), "init");
        assert!(parsed.session().is_some());
    }
}
