//! Layered small-world index: configuration, level assignment and insertion.
//!
//! Every vertex draws a top level from the [`LevelTable`] and is threaded
//! into the per-layer [`DynamicGraph`]s from that level down to layer 0.
//! Insertion takes `&self`, so many threads may insert at once: per-key
//! atomicity comes from the skip map, neighbor-list read-modify-write is
//! serialised by striped locks.

use super::levels::LevelTable;
use super::search::{search_layer, with_visited};
use crate::config;
use crate::distance::{Distance, DistanceMetric, Element, Neighbor};
use crate::error::{AnnError, Result};
use crate::graph::DynamicGraph;
use crate::matrix::MatrixView;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

/// Configuration parameters for a layered index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayeredConfig {
    /// Distance function for similarity computation.
    pub metric: DistanceMetric,
    /// Neighbor-list bound in layer 0.
    pub target_degree_base: usize,
    /// Neighbor-list bound above layer 0; also the level model's branching factor.
    pub target_degree_per_layer: usize,
    /// Candidate list size when searching for insertion neighbors.
    pub ef_construction: usize,
    /// Seed for level sampling. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for LayeredConfig {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::L2,
            target_degree_base: config::DEFAULT_TARGET_DEGREE_BASE,
            target_degree_per_layer: config::DEFAULT_TARGET_DEGREE_PER_LAYER,
            ef_construction: config::DEFAULT_EF_CONSTRUCTION,
            seed: None,
        }
    }
}

/// Traversal counters, summed over every insert and search since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayeredStats {
    /// Candidates expanded during layer searches.
    pub hops: u64,
    pub distance_evaluations: u64,
}

/// Multi-layer proximity graph over a borrowed matrix.
pub struct LayeredIndex<'a, T: Element> {
    pub(crate) matrix: MatrixView<'a, T>,
    config: LayeredConfig,
    pub(crate) dist: Distance<T>,
    levels: LevelTable,
    pub(crate) layers: Vec<DynamicGraph>,
    link_locks: Vec<Mutex<()>>,
    /// Set once a row has been handed to `insert`; first claimant wins.
    claimed: Vec<AtomicBool>,
    rng: Mutex<StdRng>,
    pub(crate) hops: AtomicU64,
    pub(crate) distance_evaluations: AtomicU64,
}

impl<'a, T: Element> LayeredIndex<'a, T> {
    pub fn new(matrix: MatrixView<'a, T>, config: LayeredConfig) -> Result<Self> {
        let (dist, levels, rng) = Self::prepare(&config)?;
        let layers = (0..levels.num_layers()).map(|_| DynamicGraph::new()).collect();
        let link_locks = (0..config::LINK_LOCK_STRIPES).map(|_| Mutex::new(())).collect();
        Ok(Self {
            matrix,
            config,
            dist,
            levels,
            layers,
            link_locks,
            claimed: Self::unclaimed(matrix.num_elements()),
            rng: Mutex::new(rng),
            hops: AtomicU64::new(0),
            distance_evaluations: AtomicU64::new(0),
        })
    }

    fn unclaimed(n: usize) -> Vec<AtomicBool> {
        (0..n).map(|_| AtomicBool::new(false)).collect()
    }

    fn prepare(config: &LayeredConfig) -> Result<(Distance<T>, LevelTable, StdRng)> {
        if config.ef_construction == 0 {
            return Err(AnnError::config("ef_construction must be positive"));
        }
        let dist = Distance::new(config.metric)?;
        let levels = LevelTable::new(config.target_degree_base, config.target_degree_per_layer)?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok((dist, levels, rng))
    }

    /// Replace the configuration, rebuild the level table and drop every layer.
    pub fn configure(&mut self, config: LayeredConfig) -> Result<()> {
        let (dist, levels, rng) = Self::prepare(&config)?;
        tracing::debug!(
            layers = levels.num_layers(),
            target_degree_base = config.target_degree_base,
            target_degree_per_layer = config.target_degree_per_layer,
            "layered index configured"
        );
        self.layers = (0..levels.num_layers()).map(|_| DynamicGraph::new()).collect();
        self.claimed = Self::unclaimed(self.matrix.num_elements());
        self.dist = dist;
        self.levels = levels;
        self.config = config;
        *self.rng.get_mut() = rng;
        self.reset_stats();
        Ok(())
    }

    pub fn config(&self) -> &LayeredConfig {
        &self.config
    }

    pub fn level_table(&self) -> &LevelTable {
        &self.levels
    }

    #[inline]
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, layer: usize) -> &DynamicGraph {
        &self.layers[layer]
    }

    /// Number of vertices in each layer, base layer first.
    pub fn layer_sizes(&self) -> Vec<usize> {
        self.layers.iter().map(DynamicGraph::len).collect()
    }

    /// Deepest non-empty layer, or `None` for an empty index.
    pub fn max_level(&self) -> Option<usize> {
        self.layers.iter().rposition(|g| !g.is_empty())
    }

    /// Number of inserted vertices.
    pub fn len(&self) -> usize {
        self.layers[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers[0].is_empty()
    }

    pub fn stats(&self) -> LayeredStats {
        LayeredStats {
            hops: self.hops.load(Ordering::Relaxed),
            distance_evaluations: self.distance_evaluations.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.hops.store(0, Ordering::Relaxed);
        self.distance_evaluations.store(0, Ordering::Relaxed);
    }

    fn sample_level(&self) -> usize {
        let u: f64 = self.rng.lock().gen();
        self.levels.sample(u)
    }

    #[inline]
    fn link_lock(&self, v: u32) -> &Mutex<()> {
        &self.link_locks[v as usize % self.link_locks.len()]
    }

    #[inline]
    pub(crate) fn score(&self, a: u32, b: u32) -> f32 {
        self.dist
            .eval(self.matrix.row(a as usize), self.matrix.row(b as usize))
    }

    /// Insert row `vid` and return the level it was assigned.
    pub fn insert(&self, vid: u32) -> Result<usize> {
        if vid as usize >= self.matrix.num_elements() {
            return Err(AnnError::config(format!(
                "vertex {vid} out of range for {} vectors",
                self.matrix.num_elements()
            )));
        }
        if self.claimed[vid as usize].swap(true, Ordering::AcqRel) {
            return Err(AnnError::config(format!("vertex {vid} already inserted")));
        }

        let level = self.sample_level();
        let top = match self.max_level() {
            Some(top) => top,
            None => {
                for layer in &self.layers[..=level] {
                    layer.set_neighbors(vid, &[]);
                }
                return Ok(level);
            }
        };
        let entry = match self.layers[top].first_vertex() {
            Some(entry) => entry,
            None => return Err(AnnError::config("layer emptied during insert")),
        };

        let query = self.matrix.row(vid as usize);
        with_visited(self.matrix.num_elements(), |visited| {
            let mut eps = vec![entry];
            for layer in (level + 1..=top).rev() {
                let nearest = search_layer(self, query, &eps, 1, layer, visited);
                if let Some(n) = nearest.first() {
                    eps.clear();
                    eps.push(n.id);
                }
            }

            for layer in (0..=level.min(top)).rev() {
                let mut candidates =
                    search_layer(self, query, &eps, self.config.ef_construction, layer, visited);
                candidates.retain(|n| n.id != vid);
                let degree = self.levels.layer_degree(layer);
                let selected = self.select_neighbors(&candidates, degree);
                self.link(layer, vid, &selected, degree);

                if !candidates.is_empty() {
                    eps.clear();
                    eps.extend(candidates.iter().map(|n| n.id));
                }
            }
        });

        // Layers above the old top only become reachable once vid is linked below.
        for layer in top + 1..=level {
            self.layers[layer].set_neighbors(vid, &[]);
        }

        Ok(level)
    }

    /// Write `vid`'s list for `layer` and add the reverse edges, pruning any
    /// list that outgrows `degree`.
    fn link(&self, layer: usize, vid: u32, selected: &[Neighbor], degree: usize) {
        let graph = &self.layers[layer];
        {
            let _guard = self.link_lock(vid).lock();
            // Concurrent inserts may already have linked back to vid.
            let existing = graph.neighbors(vid);
            let mut ids: Vec<u32> = selected.iter().map(|n| n.id).collect();
            for &id in existing.iter() {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            let ids = self.prune(vid, ids, degree);
            graph.set_neighbors(vid, &ids);
        }

        for n in selected {
            let _guard = self.link_lock(n.id).lock();
            let current = graph.neighbors(n.id);
            if current.contains(&vid) {
                continue;
            }
            let mut ids = current.to_vec();
            ids.push(vid);
            let ids = self.prune(n.id, ids, degree);
            graph.set_neighbors(n.id, &ids);
        }
    }

    fn prune(&self, base: u32, ids: Vec<u32>, degree: usize) -> Vec<u32> {
        if ids.len() <= degree {
            return ids;
        }
        let scored: Vec<Neighbor> = ids
            .iter()
            .map(|&id| Neighbor::new(id, self.score(base, id)))
            .collect();
        self.distance_evaluations
            .fetch_add(scored.len() as u64, Ordering::Relaxed);
        self.select_neighbors(&scored, degree)
            .into_iter()
            .map(|n| n.id)
            .collect()
    }

    /// Heuristic neighbor selection.
    ///
    /// Walks the candidates closest first and keeps one only if it is closer
    /// to the base vertex than to every neighbor kept so far. Remaining slots
    /// are filled with the closest unused candidates.
    fn select_neighbors(&self, candidates: &[Neighbor], m: usize) -> Vec<Neighbor> {
        let metric = self.dist.metric();
        let mut sorted = candidates.to_vec();
        metric.sort(&mut sorted);

        let mut selected: Vec<Neighbor> = Vec::with_capacity(m);
        let mut evaluations = 0u64;
        for c in &sorted {
            if selected.len() >= m {
                break;
            }
            let is_diverse = selected.iter().all(|s| {
                evaluations += 1;
                !metric.is_closer(self.score(c.id, s.id), c.distance)
            });
            if is_diverse {
                selected.push(*c);
            }
        }
        self.distance_evaluations
            .fetch_add(evaluations, Ordering::Relaxed);

        if selected.len() < m {
            for c in &sorted {
                if selected.len() >= m {
                    break;
                }
                if !selected.iter().any(|s| s.id == c.id) {
                    selected.push(*c);
                }
            }
        }
        selected
    }

    /// Insert every row of the matrix in a shuffled order.
    ///
    /// The first vertex is inserted alone so the parallel inserts that follow
    /// always find an entry point.
    pub fn build(&self) -> Result<()> {
        let n = self.matrix.num_elements();
        let start = Instant::now();
        tracing::info!(
            vertices = n,
            layers = self.num_layers(),
            ef_construction = self.config.ef_construction,
            "layered build started"
        );

        let mut order: Vec<u32> = (0..n as u32).collect();
        order.shuffle(&mut StdRng::seed_from_u64(config::BUILD_SHUFFLE_SEED));
        if let Some((&first, rest)) = order.split_first() {
            self.insert(first)?;
            rest.par_iter().try_for_each(|&vid| self.insert(vid).map(|_| ()))?;
        }

        tracing::info!(
            vertices = n,
            layer_sizes = ?self.layer_sizes(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "layered build finished"
        );
        Ok(())
    }
}

impl<T: Element> std::fmt::Debug for LayeredIndex<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayeredIndex")
            .field("config", &self.config)
            .field("layer_sizes", &self.layer_sizes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize) -> Vec<f32> {
        (0..n).flat_map(|i| [(i % 10) as f32, (i / 10) as f32]).collect()
    }

    fn seeded(seed: u64) -> LayeredConfig {
        LayeredConfig {
            target_degree_base: 8,
            target_degree_per_layer: 4,
            ef_construction: 32,
            seed: Some(seed),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_insert_becomes_member_of_its_layers() {
        let data = grid(20);
        let m = MatrixView::new(&data, 2).unwrap();
        let index = LayeredIndex::new(m, seeded(1)).unwrap();
        assert_eq!(index.max_level(), None);
        let level = index.insert(7).unwrap();
        for layer in 0..=level {
            assert!(index.layer(layer).contains(7));
            assert!(index.layer(layer).neighbors(7).is_empty());
        }
        assert_eq!(index.max_level(), Some(level));
    }

    #[test]
    fn test_insert_levels_within_table() {
        let data = grid(100);
        let m = MatrixView::new(&data, 2).unwrap();
        let index = LayeredIndex::new(m, seeded(2)).unwrap();
        for vid in 0..100 {
            let level = index.insert(vid).unwrap();
            assert!(level < index.level_table().num_layers());
            for layer in 0..=level {
                assert!(index.layer(layer).contains(vid), "vid {vid} missing from layer {layer}");
            }
        }
        let sizes = index.layer_sizes();
        assert_eq!(sizes[0], 100);
        for w in sizes.windows(2) {
            assert!(w[0] >= w[1], "layer sizes not decreasing: {sizes:?}");
        }
    }

    #[test]
    fn test_neighbor_lists_respect_degree_and_exclude_self() {
        let data = grid(100);
        let m = MatrixView::new(&data, 2).unwrap();
        let index = LayeredIndex::new(m, seeded(3)).unwrap();
        index.build().unwrap();
        for layer in 0..index.num_layers() {
            let bound = index.level_table().layer_degree(layer);
            for v in index.layer(layer).vertices() {
                let ns = index.layer(layer).neighbors(v);
                assert!(ns.len() <= bound, "layer {layer} vertex {v}: {} > {bound}", ns.len());
                assert!(!ns.contains(&v));
                for &u in ns.iter() {
                    assert!(index.layer(layer).contains(u), "dangling edge {v}->{u}");
                }
            }
        }
        assert!(index.stats().distance_evaluations > 0);
    }

    #[test]
    fn test_insert_rejects_duplicates_and_out_of_range() {
        let data = grid(10);
        let m = MatrixView::new(&data, 2).unwrap();
        let index = LayeredIndex::new(m, seeded(4)).unwrap();
        index.insert(0).unwrap();
        assert!(index.insert(0).is_err());
        assert!(index.insert(10).is_err());
    }

    #[test]
    fn test_concurrent_duplicate_insert_admits_one() {
        let data = grid(50);
        let m = MatrixView::new(&data, 2).unwrap();
        let index = LayeredIndex::new(m, seeded(7)).unwrap();
        for vid in 0..40 {
            index.insert(vid).unwrap();
        }
        let accepted: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8).map(|_| s.spawn(|| index.insert(45).is_ok())).collect();
            handles.into_iter().map(|h| h.join().unwrap() as usize).sum()
        });
        assert_eq!(accepted, 1, "exactly one insert of a row may succeed");
        assert_eq!(index.len(), 41);
        let base = index.layer(0);
        for v in base.vertices() {
            let ns = base.neighbors(v);
            let links = ns.iter().filter(|&&u| u == 45).count();
            assert!(links <= 1, "vertex {v} links 45 {links} times");
        }
    }

    #[test]
    fn test_configure_resets_layers() {
        let data = grid(30);
        let m = MatrixView::new(&data, 2).unwrap();
        let mut index = LayeredIndex::new(m, seeded(5)).unwrap();
        index.build().unwrap();
        assert_eq!(index.len(), 30);
        index
            .configure(LayeredConfig {
                target_degree_per_layer: 16,
                ..seeded(6)
            })
            .unwrap();
        assert!(index.is_empty());
        assert_eq!(index.num_layers(), 8);
        assert_eq!(index.stats(), LayeredStats::default());
    }

    #[test]
    fn test_invalid_config() {
        let data = grid(10);
        let m = MatrixView::new(&data, 2).unwrap();
        let bad = LayeredConfig {
            target_degree_per_layer: 1,
            ..Default::default()
        };
        assert!(LayeredIndex::new(m, bad).is_err());
        let hamming = LayeredConfig {
            metric: DistanceMetric::Hamming,
            ..Default::default()
        };
        assert!(matches!(
            LayeredIndex::new(m, hamming),
            Err(AnnError::UnsupportedMetric { .. })
        ));
    }

    #[test]
    fn test_config_serde_defaults() {
        let c: LayeredConfig = serde_json::from_str(r#"{"ef_construction": 64}"#).unwrap();
        assert_eq!(c.ef_construction, 64);
        assert_eq!(c.target_degree_base, config::DEFAULT_TARGET_DEGREE_BASE);
        assert_eq!(c.metric, DistanceMetric::L2);
    }
}
