use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// Resolution of one edge within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeState {
    Pending,
    Taken,
    Skipped,
}

#[derive(Debug, Default)]
struct Resolution {
    executed: HashSet<String>,
    skipped: HashSet<String>,
    edges: HashMap<String, EdgeState>,
}

/// Tracks which nodes a context has dispatched or skipped and how each
/// edge resolved. A node is dispatched at most once per context.
#[derive(Debug, Default)]
pub struct ResolutionState {
    inner: Mutex<Resolution>,
}

impl ResolutionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `node_id` for execution. Returns `false` if it was already
    /// executed or skipped in this context.
    pub fn try_begin(&self, node_id: &str) -> bool {
        let mut inner = self.inner.lock();
        if inner.skipped.contains(node_id) {
            return false;
        }
        inner.executed.insert(node_id.to_string())
    }

    /// Mark `node_id` as never running in this context. Returns `false` if
    /// it was already executed or skipped.
    pub fn mark_skipped(&self, node_id: &str) -> bool {
        let mut inner = self.inner.lock();
        if inner.executed.contains(node_id) {
            return false;
        }
        inner.skipped.insert(node_id.to_string())
    }

    pub fn is_skipped(&self, node_id: &str) -> bool {
        self.inner.lock().skipped.contains(node_id)
    }

    pub fn is_settled(&self, node_id: &str) -> bool {
        let inner = self.inner.lock();
        inner.executed.contains(node_id) || inner.skipped.contains(node_id)
    }

    pub fn set_edge(&self, edge_id: &str, state: EdgeState) {
        self.inner.lock().edges.insert(edge_id.to_string(), state);
    }

    pub fn edge(&self, edge_id: &str) -> EdgeState {
        self.inner
            .lock()
            .edges
            .get(edge_id)
            .copied()
            .unwrap_or(EdgeState::Pending)
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.executed.clear();
        inner.skipped.clear();
        inner.edges.clear();
    }
}
