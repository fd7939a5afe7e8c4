//! Global state container collaborator
//!
//! The pipeline never reaches for ambient global state: it receives a
//! snapshot accessor and a dispatch entry point explicitly. This core
//! reads the snapshot and dispatches actions; it never mutates the
//! container directly.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::RwLock;

use crate::aggregator::DispatchableAction;
use crate::error::Result;

/// Read-only view of the container's state at one point in time
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot(pub Value);

impl StateSnapshot {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// Snapshot getter plus asynchronous dispatch.
///
/// Dispatch resolves a `DispatchableAction` to a value; it is the sole
/// state-changing entry point reachable from this core.
#[async_trait]
pub trait StateContainer: Send + Sync {
    fn snapshot(&self) -> StateSnapshot;

    async fn dispatch(&self, action: DispatchableAction) -> Result<Value>;
}

/// In-process container used by the CLI wiring and tests.
///
/// Dispatch resolves an action to its payload and keeps a log of what
/// was dispatched.
#[derive(Default)]
pub struct MemoryStateContainer {
    state: RwLock<Value>,
    dispatched: RwLock<Vec<DispatchableAction>>,
}

impl MemoryStateContainer {
    pub fn new(state: Value) -> Self {
        Self {
            state: RwLock::new(state),
            dispatched: RwLock::new(Vec::new()),
        }
    }

    pub fn dispatched(&self) -> Vec<DispatchableAction> {
        self.dispatched
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl StateContainer for MemoryStateContainer {
    fn snapshot(&self) -> StateSnapshot {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        StateSnapshot(state.clone())
    }

    async fn dispatch(&self, action: DispatchableAction) -> Result<Value> {
        let resolved = action.payload.clone();
        self.dispatched
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(action);
        Ok(resolved)
    }
}
