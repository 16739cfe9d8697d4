use slotmap::new_key_type;
use std::sync::atomic::{AtomicU64, Ordering};

new_key_type! {
    pub struct VertexKey;
    pub struct EdgeKey;
}

/// Addresses one attachment point: the owning vertex and the AP's index in that vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ApRef {
    pub vertex: VertexKey,
    pub index: usize,
}

impl ApRef {
    pub fn new(vertex: VertexKey, index: usize) -> Self {
        Self { vertex, index }
    }
}

/// Hands out unique numeric identifiers for vertices, graphs and candidates.
///
/// One generator is shared by everything that creates graph objects during a run, so ids never
/// collide even when candidates are generated concurrently.
#[derive(Debug)]
pub struct IdGenerator {
    vertex: AtomicU64,
    graph: AtomicU64,
    candidate: AtomicU64,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self {
            vertex: AtomicU64::new(1),
            graph: AtomicU64::new(1),
            candidate: AtomicU64::new(1),
        }
    }
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_vertex_id(&self) -> u64 {
        self.vertex.fetch_add(1, Ordering::Relaxed)
    }

    pub fn next_graph_id(&self) -> u64 {
        self.graph.fetch_add(1, Ordering::Relaxed)
    }

    pub fn next_candidate_id(&self) -> u64 {
        self.candidate.fetch_add(1, Ordering::Relaxed)
    }

    /// Makes sure future vertex ids are strictly greater than `max_used`.
    pub fn ensure_vertex_id_above(&self, max_used: u64) {
        self.vertex.fetch_max(max_used + 1, Ordering::Relaxed);
    }

    /// Makes sure future graph ids are strictly greater than `max_used`.
    pub fn ensure_graph_id_above(&self, max_used: u64) {
        self.graph.fetch_max(max_used + 1, Ordering::Relaxed);
    }
}
