//! Concurrent sparse adjacency for graphs that grow during construction.

use crossbeam_skiplist::SkipMap;
use std::sync::Arc;

/// Ordered concurrent map `vertex -> neighbor list`.
///
/// Lists are immutable snapshots; [`set_neighbors`](Self::set_neighbors)
/// swaps in a new one atomically, last writer wins. Callers that need
/// read-modify-write must serialise per vertex themselves.
#[derive(Default)]
pub struct DynamicGraph {
    adjacency: SkipMap<u32, Arc<[u32]>>,
}

impl DynamicGraph {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn contains(&self, v: u32) -> bool {
        self.adjacency.contains_key(&v)
    }

    /// Current list of `v`, empty if `v` is not in the graph.
    #[inline]
    pub fn neighbors(&self, v: u32) -> Arc<[u32]> {
        self.adjacency
            .get(&v)
            .map(|entry| Arc::clone(entry.value()))
            .unwrap_or_else(|| Arc::from(&[] as &[u32]))
    }

    /// Insert `v` or replace its list.
    pub fn set_neighbors(&self, v: u32, ids: &[u32]) {
        self.adjacency.insert(v, Arc::from(ids));
    }

    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Smallest vertex id in the graph.
    pub fn first_vertex(&self) -> Option<u32> {
        self.adjacency.front().map(|entry| *entry.key())
    }

    /// All vertex ids in ascending order.
    pub fn vertices(&self) -> Vec<u32> {
        self.adjacency.iter().map(|entry| *entry.key()).collect()
    }

    pub fn clear(&self) {
        self.adjacency.clear();
    }
}

impl std::fmt::Debug for DynamicGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicGraph")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_vertex_has_no_neighbors() {
        let g = DynamicGraph::new();
        assert!(!g.contains(3));
        assert!(g.neighbors(3).is_empty());
        assert!(g.is_empty());
        assert_eq!(g.first_vertex(), None);
    }

    #[test]
    fn test_set_and_replace() {
        let g = DynamicGraph::new();
        g.set_neighbors(5, &[1, 2]);
        g.set_neighbors(2, &[]);
        g.set_neighbors(5, &[3]);
        assert_eq!(&*g.neighbors(5), &[3]);
        assert!(g.contains(2));
        assert_eq!(g.len(), 2);
        assert_eq!(g.first_vertex(), Some(2));
        assert_eq!(g.vertices(), vec![2, 5]);
    }

    #[test]
    fn test_concurrent_writers_distinct_keys() {
        let g = DynamicGraph::new();
        std::thread::scope(|s| {
            for t in 0..4u32 {
                let g = &g;
                s.spawn(move || {
                    for i in 0..100u32 {
                        g.set_neighbors(t * 100 + i, &[i]);
                    }
                });
            }
        });
        assert_eq!(g.len(), 400);
        assert_eq!(&*g.neighbors(250), &[50]);
    }
}
