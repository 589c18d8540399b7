//! Parameters handed to launchers and stoppers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Caller-supplied parameters for one operation invocation.
///
/// A plain JSON object; operations interpret the keys they care about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpParams {
    values: Map<String, Value>,
}

impl OpParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Get a raw value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Set a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let params = OpParams::new()
            .with("port", "/dev/ttyUSB0")
            .with("interval", 0.5)
            .with("fake", true);

        assert_eq!(params.get_str("port"), Some("/dev/ttyUSB0"));
        assert_eq!(params.get_f64("interval"), Some(0.5));
        assert_eq!(params.get_bool("fake"), Some(true));
        assert_eq!(params.get_str("interval"), None);
        assert!(params.get("missing").is_none());
    }

    #[test]
    fn test_transparent_json() {
        let params: OpParams = serde_json::from_str(r#"{"channels": 8}"#).unwrap();
        assert_eq!(params.get("channels"), Some(&Value::from(8)));
        assert_eq!(serde_json::to_string(&params).unwrap(), r#"{"channels":8}"#);
        assert!(OpParams::default().is_empty());
    }
}
