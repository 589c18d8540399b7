//! Operation registry.

use std::{collections::BTreeMap, fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::traits::{Launcher, Stopper};

/// Kind of a registered operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Runs once to completion; cannot be stopped.
    Task,
    /// Runs until cooperatively asked to stop.
    Process,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Task => "task",
            Self::Process => "process",
        })
    }
}

/// Immutable description of a registered operation.
#[derive(Clone)]
pub enum OperationDescriptor {
    Task {
        launcher: Arc<dyn Launcher>,
    },
    Process {
        launcher: Arc<dyn Launcher>,
        stopper: Arc<dyn Stopper>,
    },
}

impl OperationDescriptor {
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::Task { .. } => OperationKind::Task,
            Self::Process { .. } => OperationKind::Process,
        }
    }

    #[must_use]
    pub fn launcher(&self) -> Arc<dyn Launcher> {
        match self {
            Self::Task { launcher } | Self::Process { launcher, .. } => Arc::clone(launcher),
        }
    }

    /// Stopper, for processes only.
    #[must_use]
    pub fn stopper(&self) -> Option<Arc<dyn Stopper>> {
        match self {
            Self::Task { .. } => None,
            Self::Process { stopper, .. } => Some(Arc::clone(stopper)),
        }
    }
}

impl fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OperationDescriptor").field(&self.kind()).finish()
    }
}

/// Registered operations keyed by name.
///
/// Populated before the runtime serves requests and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    operations: BTreeMap<String, OperationDescriptor>,
}

impl OperationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task, replacing any operation of the same name.
    pub fn register_task(
        &mut self,
        name: impl Into<String>,
        launcher: impl Launcher,
    ) -> Option<OperationDescriptor> {
        self.insert(
            name.into(),
            OperationDescriptor::Task {
                launcher: Arc::new(launcher),
            },
        )
    }

    /// Register a process, replacing any operation of the same name.
    pub fn register_process(
        &mut self,
        name: impl Into<String>,
        launcher: impl Launcher,
        stopper: impl Stopper,
    ) -> Option<OperationDescriptor> {
        self.insert(
            name.into(),
            OperationDescriptor::Process {
                launcher: Arc::new(launcher),
                stopper: Arc::new(stopper),
            },
        )
    }

    fn insert(
        &mut self,
        name: String,
        descriptor: OperationDescriptor,
    ) -> Option<OperationDescriptor> {
        let kind = descriptor.kind();
        let previous = self.operations.insert(name.clone(), descriptor);
        if let Some(ref old) = previous {
            tracing::warn!(op_name = %name, old = %old.kind(), new = %kind, "Operation re-registered");
        } else {
            tracing::debug!(op_name = %name, %kind, "Operation registered");
        }
        previous
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&OperationDescriptor> {
        self.operations.get(name)
    }

    /// Names of every operation of `kind`, sorted.
    pub fn names(&self, kind: OperationKind) -> impl Iterator<Item = &str> {
        self.operations
            .iter()
            .filter(move |(_, d)| d.kind() == kind)
            .map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OpParams, Outcome, SessionHandle};

    fn noop(_: SessionHandle, _: OpParams) -> Outcome {
        Outcome::ok("ok")
    }

    fn halt(_: OpParams) -> Outcome {
        Outcome::ok("stop requested")
    }

    #[test]
    fn test_lookup_and_kinds() {
        let mut registry = OperationRegistry::new();
        registry.register_task("init", noop);
        registry.register_process("acq", noop, halt);

        assert_eq!(registry.lookup("init").unwrap().kind(), OperationKind::Task);
        assert!(registry.lookup("init").unwrap().stopper().is_none());
        assert_eq!(registry.lookup("acq").unwrap().kind(), OperationKind::Process);
        assert!(registry.lookup("acq").unwrap().stopper().is_some());
        assert!(registry.lookup("missing").is_none());
    }

    #[test]
    fn test_names_sorted_by_kind() {
        let mut registry = OperationRegistry::new();
        registry.register_task("zero", noop);
        registry.register_process("stream", noop, halt);
        registry.register_task("alpha", noop);

        let tasks: Vec<&str> = registry.names(OperationKind::Task).collect();
        let processes: Vec<&str> = registry.names(OperationKind::Process).collect();
        assert_eq!(tasks, ["alpha", "zero"]);
        assert_eq!(processes, ["stream"]);
    }

    #[test]
    fn test_reregister_overwrites() {
        let mut registry = OperationRegistry::new();
        assert!(registry.register_task("x", noop).is_none());
        let previous = registry.register_process("x", noop, halt);

        assert_eq!(previous.unwrap().kind(), OperationKind::Task);
        assert_eq!(registry.lookup("x").unwrap().kind(), OperationKind::Process);
        assert_eq!(registry.len(), 1);
    }
}
