//! Runtime configuration.

use std::str::FromStr;

use instrument_agent_core::feed;
use serde::Deserialize;
use thiserror::Error;

/// Identity used when none is configured.
pub const DEFAULT_ADDRESS: &str = "observatory.random";

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("Invalid configuration document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Agent runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Identity; forms the RPC endpoints and the feed topic.
    pub address: String,
    /// Broadcast capacity of the status feed.
    pub feed_capacity: usize,
    /// Feed events kept for late subscribers.
    pub feed_history: usize,
    /// Retired sessions kept per operation (0 disables archiving).
    pub archive_depth: usize,
    /// Concurrent launcher bound; `None` is unbounded.
    pub max_workers: Option<usize>,
    /// Shut down once the last transport connection is gone.
    pub exit_when_idle: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            feed_capacity: feed::DEFAULT_CAPACITY,
            feed_history: feed::DEFAULT_HISTORY,
            archive_depth: 32,
            max_workers: None,
            exit_when_idle: false,
        }
    }
}

impl AgentConfig {
    /// Create a config with the given identity and defaults otherwise.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Parse a JSON document; missing keys keep their defaults.
    ///
    /// # Errors
    /// Returns error if the document is malformed.
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(document)?)
    }

    /// Defaults overlaid with `AGENT_*` environment variables.
    ///
    /// # Errors
    /// Returns error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Overlay values from a key lookup (`AGENT_ADDRESS`, `AGENT_FEED_CAPACITY`,
    /// `AGENT_FEED_HISTORY`, `AGENT_ARCHIVE_DEPTH`, `AGENT_MAX_WORKERS`,
    /// `AGENT_EXIT_WHEN_IDLE`).
    ///
    /// # Errors
    /// Returns error if a present value cannot be parsed.
    pub fn overlay<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(address) = lookup("AGENT_ADDRESS").filter(|a| !a.trim().is_empty()) {
            self.address = address;
        }
        if let Some(v) = parse(&lookup, "AGENT_FEED_CAPACITY")? {
            self.feed_capacity = v;
        }
        if let Some(v) = parse(&lookup, "AGENT_FEED_HISTORY")? {
            self.feed_history = v;
        }
        if let Some(v) = parse(&lookup, "AGENT_ARCHIVE_DEPTH")? {
            self.archive_depth = v;
        }
        if let Some(v) = parse::<usize, _>(&lookup, "AGENT_MAX_WORKERS")? {
            self.max_workers = (v > 0).then_some(v);
        }
        if let Some(v) = parse(&lookup, "AGENT_EXIT_WHEN_IDLE")? {
            self.exit_when_idle = v;
        }
        Ok(self)
    }
}

fn parse<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { key, value })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tokio_test::{assert_err, assert_ok};

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.address, "observatory.random");
        assert_eq!(config.archive_depth, 32);
        assert!(config.max_workers.is_none());
        assert!(!config.exit_when_idle);
    }

    #[test]
    fn test_overlay() {
        let config = assert_ok!(AgentConfig::default().overlay(lookup(&[
            ("AGENT_ADDRESS", "observatory.thermometry"),
            ("AGENT_MAX_WORKERS", "4"),
            ("AGENT_EXIT_WHEN_IDLE", "true"),
            ("AGENT_ARCHIVE_DEPTH", " 0 "),
        ])));

        assert_eq!(config.address, "observatory.thermometry");
        assert_eq!(config.max_workers, Some(4));
        assert!(config.exit_when_idle);
        assert_eq!(config.archive_depth, 0);
        assert_eq!(config.feed_history, feed::DEFAULT_HISTORY);
    }

    #[test]
    fn test_overlay_rejects_garbage() {
        let err = assert_err!(
            AgentConfig::default().overlay(lookup(&[("AGENT_FEED_CAPACITY", "lots")]))
        );
        assert!(matches!(err, ConfigError::InvalidEnv { key: "AGENT_FEED_CAPACITY", .. }));
    }

    #[test]
    fn test_from_json_partial() {
        let config = assert_ok!(AgentConfig::from_json(
            r#"{"address": "detlab.system1", "max_workers": 2}"#
        ));
        assert_eq!(config.address, "detlab.system1");
        assert_eq!(config.max_workers, Some(2));
        assert_eq!(config.archive_depth, 32);
        assert_err!(AgentConfig::from_json("[1, 2]"));
    }
}
