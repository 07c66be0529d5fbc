//! Best-first layer search and k-NN queries over a [`LayeredIndex`].

use super::index::LayeredIndex;
use super::visited::VisitedList;
use crate::distance::{is_min_close, Element, Neighbor};
use crate::error::{AnnError, Result};
use crate::matrix::MatrixView;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::Ordering;

thread_local! {
    /// Reused across inserts and queries on the same thread.
    static VISITED: RefCell<VisitedList> = RefCell::new(VisitedList::default());
}

/// Run `f` with this thread's visited list, sized for `capacity` vertices.
pub(crate) fn with_visited<R>(capacity: usize, f: impl FnOnce(&mut VisitedList) -> R) -> R {
    VISITED.with(|cell| {
        let mut visited = cell.borrow_mut();
        visited.reset(capacity);
        f(&mut visited)
    })
}

/// Heap key: smaller is closer, ties broken by id.
type Key = (OrderedFloat<f32>, u32);

/// Best-first search of one layer from `entry_points`, keeping the `ef`
/// closest vertices seen. Returns them best first.
pub(crate) fn search_layer<T: Element>(
    index: &LayeredIndex<'_, T>,
    query: &[T],
    entry_points: &[u32],
    ef: usize,
    layer: usize,
    visited: &mut VisitedList,
) -> Vec<Neighbor> {
    visited.reset(index.matrix.num_elements());
    let metric = index.dist.metric();
    let graph = &index.layers[layer];
    let mut candidates: BinaryHeap<Reverse<Key>> = BinaryHeap::with_capacity(ef * 2);
    let mut results: BinaryHeap<Key> = BinaryHeap::with_capacity(ef + 1);
    let mut evaluations = 0u64;
    let mut hops = 0u64;

    for &ep in entry_points {
        if visited.mark(ep) {
            let d = index.dist.eval(query, index.matrix.row(ep as usize));
            evaluations += 1;
            let key = (metric.closeness(d), ep);
            candidates.push(Reverse(key));
            results.push(key);
            if results.len() > ef {
                results.pop();
            }
        }
    }

    while let Some(Reverse(current)) = candidates.pop() {
        if results.len() >= ef {
            if let Some(&worst) = results.peek() {
                if current > worst {
                    break;
                }
            }
        }
        hops += 1;

        let neighbors = graph.neighbors(current.1);
        for &u in neighbors.iter() {
            if !visited.mark(u) {
                continue;
            }
            let d = index.dist.eval(query, index.matrix.row(u as usize));
            evaluations += 1;
            let key = (metric.closeness(d), u);
            let admit = results.len() < ef || results.peek().map_or(true, |&worst| key < worst);
            if admit {
                candidates.push(Reverse(key));
                results.push(key);
                if results.len() > ef {
                    results.pop();
                }
            }
        }
    }

    index.hops.fetch_add(hops, Ordering::Relaxed);
    index
        .distance_evaluations
        .fetch_add(evaluations, Ordering::Relaxed);

    let sign = if is_min_close(metric) { 1.0 } else { -1.0 };
    let mut out: Vec<Neighbor> = results
        .into_iter()
        .map(|(key, id)| Neighbor::new(id, sign * key.0))
        .collect();
    metric.sort(&mut out);
    out
}

impl<'a, T: Element> LayeredIndex<'a, T> {
    /// Approximate `k` nearest rows to `query`, best first.
    ///
    /// Greedy descent through the upper layers, then a best-first search of
    /// layer 0 with a candidate list of `max(ef, k)`.
    pub fn search(&self, query: &[T], k: usize, ef: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.matrix.dimension() {
            return Err(AnnError::DimensionMismatch {
                expected: self.matrix.dimension(),
                actual: query.len(),
            });
        }
        let top = match self.max_level() {
            Some(top) => top,
            None => return Ok(Vec::new()),
        };
        let entry = match self.layers[top].first_vertex() {
            Some(entry) => entry,
            None => return Ok(Vec::new()),
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let ef = ef.max(k);
        let mut results = with_visited(self.matrix.num_elements(), |visited| {
            let mut eps = vec![entry];
            for layer in (1..=top).rev() {
                let nearest = search_layer(self, query, &eps, 1, layer, visited);
                if let Some(n) = nearest.first() {
                    eps.clear();
                    eps.push(n.id);
                }
            }
            search_layer(self, query, &eps, ef, 0, visited)
        });
        results.truncate(k);
        Ok(results)
    }

    /// [`search`](Self::search) for every row of `queries`, in parallel.
    pub fn search_batch(
        &self,
        queries: &MatrixView<'_, T>,
        k: usize,
        ef: usize,
    ) -> Result<Vec<Vec<Neighbor>>> {
        (0..queries.num_elements())
            .into_par_iter()
            .map(|i| self.search(queries.row(i), k, ef))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::index::LayeredConfig;
    use super::*;
    use crate::distance::DistanceMetric;
    use crate::knn::brute_force_search;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_data(n: usize, dim: usize, seed: u64) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n * dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
    }

    fn recall(
        index: &LayeredIndex<'_, f32>,
        m: &MatrixView<'_, f32>,
        queries: &[f32],
        k: usize,
    ) -> f32 {
        let metric = index.config().metric;
        let dim = m.dimension();
        let mut hits = 0usize;
        let mut total = 0usize;
        for q in queries.chunks_exact(dim) {
            let truth = brute_force_search(metric, m, q, k).unwrap();
            let found = index.search(q, k, 64).unwrap();
            total += truth.len();
            hits += found
                .iter()
                .filter(|n| truth.iter().any(|t| t.id == n.id))
                .count();
        }
        hits as f32 / total as f32
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let data = random_data(10, 4, 1);
        let m = MatrixView::new(&data, 4).unwrap();
        let index = LayeredIndex::new(m, LayeredConfig::default()).unwrap();
        assert!(index.search(m.row(0), 5, 10).unwrap().is_empty());
        assert!(index.search(&[0.0; 3], 5, 10).is_err());
    }

    #[test]
    fn test_single_vertex_found() {
        let data = random_data(10, 4, 2);
        let m = MatrixView::new(&data, 4).unwrap();
        let index = LayeredIndex::new(m, LayeredConfig::default()).unwrap();
        index.insert(3).unwrap();
        let hits = index.search(m.row(7), 5, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 3);
    }

    #[test]
    fn test_search_finds_exact_match_first() {
        let data = random_data(200, 8, 3);
        let m = MatrixView::new(&data, 8).unwrap();
        let config = LayeredConfig {
            seed: Some(3),
            ..Default::default()
        };
        let index = LayeredIndex::new(m, config).unwrap();
        index.build().unwrap();
        for v in [0usize, 50, 199] {
            let hits = index.search(m.row(v), 5, 32).unwrap();
            assert_eq!(hits[0].id, v as u32, "row {v} not its own nearest");
            assert!(hits[0].distance.abs() < 1e-6);
            assert_eq!(hits.len(), 5);
        }
    }

    #[test]
    fn test_recall_against_brute_force() {
        let data = random_data(500, 16, 4);
        let m = MatrixView::new(&data, 16).unwrap();
        let queries = random_data(20, 16, 40);
        for metric in [DistanceMetric::L2, DistanceMetric::InnerProduct] {
            let config = LayeredConfig {
                metric,
                target_degree_base: 32,
                target_degree_per_layer: 16,
                ef_construction: 100,
                seed: Some(4),
            };
            let index = LayeredIndex::new(m, config).unwrap();
            index.build().unwrap();
            let r = recall(&index, &m, &queries, 10);
            // Inner-product neighborhoods are not metric balls, so expect less.
            let floor = if metric == DistanceMetric::L2 { 0.8 } else { 0.5 };
            assert!(r >= floor, "{metric:?} recall too low: {r}");
        }
    }

    #[test]
    fn test_results_sorted_and_stats_counted() {
        let data = random_data(150, 8, 5);
        let m = MatrixView::new(&data, 8).unwrap();
        let index = LayeredIndex::new(m, LayeredConfig::default()).unwrap();
        index.build().unwrap();
        index.reset_stats();
        let queries = random_data(10, 8, 50);
        let qm = MatrixView::new(&queries, 8).unwrap();
        let batches = index.search_batch(&qm, 8, 20).unwrap();
        assert_eq!(batches.len(), 10);
        for hits in &batches {
            assert_eq!(hits.len(), 8);
            for w in hits.windows(2) {
                assert!(w[0].distance <= w[1].distance, "unsorted: {hits:?}");
            }
        }
        let stats = index.stats();
        assert!(stats.hops > 0);
        assert!(stats.distance_evaluations >= stats.hops);
    }
}
