//! Names derived from an agent's identity.

use serde::{Deserialize, Serialize};

/// RPC endpoints and feed topic of one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    address: String,
}

impl Endpoints {
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Endpoint for start/stop/wait/status.
    #[must_use]
    pub fn ops(&self) -> String {
        format!("{}.ops", self.address)
    }

    /// Endpoint for task/process listings.
    #[must_use]
    pub fn management(&self) -> String {
        self.address.clone()
    }

    /// Topic carrying session snapshots.
    #[must_use]
    pub fn feed(&self) -> String {
        format!("{}.feed", self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        let endpoints = Endpoints::new("observatory.thermometry");
        assert_eq!(endpoints.ops(), "observatory.thermometry.ops");
        assert_eq!(endpoints.management(), "observatory.thermometry");
        assert_eq!(endpoints.feed(), "observatory.thermometry.feed");
    }
}
