//! Nearest-Neighbor Descent.
//!
//! Starts from a random graph and repeatedly replaces each row with the best
//! `max_degree` vertices among its neighbors, their neighbors, and (when
//! `reverse_join` is set) the vertices that list it plus their neighbors.
//! Current neighbors are always candidates, so no row gets worse between
//! passes.
//!
//! Each pass reads the previous graph and writes a fresh one obtained from the
//! pool cache; the previous buffer is recycled once the pass completes.

use super::{write_top, KnnConfig};
use crate::distance::{Element, Neighbor};
use crate::error::Result;
use crate::graph::{DegreeTrackedGraph, FixedDegreeGraph};
use crate::matrix::MatrixView;
use crate::memory::MemoryPool;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Counters collected while building an NND graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NndStats {
    /// Seed used for initialisation (drawn at random when the config had none).
    pub seed: u64,
    /// Distance evaluations across all passes.
    pub distance_evaluations: u64,
    /// Slots that changed in each pass.
    pub changed_slots: Vec<u64>,
}

/// Build an approximate k-NN graph using the global pool.
pub fn build_nnd<T: Element>(
    config: &KnnConfig,
    matrix: &MatrixView<'_, T>,
) -> Result<FixedDegreeGraph> {
    build_nnd_in(&MemoryPool::global(), config, matrix)
}

/// Build an approximate k-NN graph, allocating from `pool`.
pub fn build_nnd_in<T: Element>(
    pool: &Arc<MemoryPool>,
    config: &KnnConfig,
    matrix: &MatrixView<'_, T>,
) -> Result<FixedDegreeGraph> {
    build_nnd_with_stats(pool, config, matrix).map(|(graph, _)| graph)
}

/// Build an approximate k-NN graph and report per-pass counters.
pub fn build_nnd_with_stats<T: Element>(
    pool: &Arc<MemoryPool>,
    config: &KnnConfig,
    matrix: &MatrixView<'_, T>,
) -> Result<(FixedDegreeGraph, NndStats)> {
    let n = matrix.num_elements();
    let dist = config.validate::<T>(n)?;
    let d = config.max_degree;
    let seed = config.seed.unwrap_or_else(rand::random::<u64>);
    let start = Instant::now();
    tracing::info!(
        vertices = n,
        dimension = matrix.dimension(),
        max_degree = d,
        iterations = config.iterations,
        metric = ?config.metric,
        seed,
        "NND build started"
    );

    let mut stats = NndStats {
        seed,
        ..Default::default()
    };

    let mut current = FixedDegreeGraph::cached_in(pool, n, d, config.alignment)?;
    random_init(&mut current, seed);

    for pass in 0..config.iterations {
        let reverse = if config.reverse_join {
            Some(reverse_lists(pool, &current, config.alignment)?)
        } else {
            None
        };
        let mut next = FixedDegreeGraph::cached_in(pool, n, d, config.alignment)?;
        let evaluations = AtomicU64::new(0);

        next.par_rows_mut().enumerate().for_each_init(
            Scratch::default,
            |scratch, (v, row)| {
                scratch.gather(v, &current, reverse.as_ref());
                let base = matrix.row(v);
                scratch.scored.clear();
                scratch.scored.extend(
                    scratch
                        .candidates
                        .iter()
                        .map(|&u| Neighbor::new(u, dist.eval(base, matrix.row(u as usize)))),
                );
                evaluations.fetch_add(scratch.scored.len() as u64, Ordering::Relaxed);
                let filled = write_top(dist.metric(), &mut scratch.scored, row);
                if filled < row.len() {
                    pad_row(v, filled, row);
                }
            },
        );

        let changed = current
            .as_slice()
            .par_iter()
            .zip(next.as_slice().par_iter())
            .filter(|(a, b)| a != b)
            .count() as u64;
        let evaluations = evaluations.into_inner();
        tracing::debug!(pass, evaluations, changed, "NND pass complete");
        stats.distance_evaluations += evaluations;
        stats.changed_slots.push(changed);

        if let Some(reverse) = reverse {
            reverse.recycle();
        }
        std::mem::replace(&mut current, next).recycle();
    }

    tracing::info!(
        vertices = n,
        distance_evaluations = stats.distance_evaluations,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "NND build finished"
    );
    Ok((current, stats))
}

/// Fill every row with `max_degree` distinct ids other than the owner.
/// Each row draws from its own RNG seeded by `seed + v`.
fn random_init(graph: &mut FixedDegreeGraph, seed: u64) {
    let n = graph.vertex_count();
    graph.par_rows_mut().enumerate().for_each(|(v, row)| {
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(v as u64));
        let picks = rand::seq::index::sample(&mut rng, n - 1, row.len());
        for (slot, i) in row.iter_mut().zip(picks.iter()) {
            // Sample over n - 1 ids and shift past the owner.
            *slot = (if i >= v { i + 1 } else { i }) as u32;
        }
    });
}

/// Vertices listing each vertex, capped at the graph degree.
fn reverse_lists(
    pool: &Arc<MemoryPool>,
    graph: &FixedDegreeGraph,
    alignment: usize,
) -> Result<DegreeTrackedGraph> {
    let mut reverse =
        DegreeTrackedGraph::cached_in(pool, graph.vertex_count(), graph.max_degree(), alignment)?;
    for (v, row) in graph.rows().enumerate() {
        for &u in row {
            reverse.push(u as usize, v as u32);
        }
    }
    Ok(reverse)
}

/// Complete a short row with the lowest ids not already present.
fn pad_row(v: usize, filled: usize, row: &mut [u32]) {
    tracing::warn!(
        vertex = v,
        filled,
        max_degree = row.len(),
        "NND candidate shortfall, padding row"
    );
    let mut next = 0u32;
    for i in filled..row.len() {
        while next as usize == v || row[..i].contains(&next) {
            next += 1;
        }
        row[i] = next;
        next += 1;
    }
}

/// Per-worker buffers reused across rows.
#[derive(Default)]
struct Scratch {
    candidates: Vec<u32>,
    scored: Vec<Neighbor>,
}

impl Scratch {
    /// Collect the deduplicated candidate ids for `v`, excluding `v` itself.
    fn gather(&mut self, v: usize, graph: &FixedDegreeGraph, reverse: Option<&DegreeTrackedGraph>) {
        self.candidates.clear();
        for &u in graph.neighbors(v) {
            self.candidates.push(u);
            self.candidates.extend_from_slice(graph.neighbors(u as usize));
        }
        if let Some(reverse) = reverse {
            for &u in reverse.neighbors(v) {
                self.candidates.push(u);
                self.candidates.extend_from_slice(graph.neighbors(u as usize));
            }
        }
        self.candidates.sort_unstable();
        self.candidates.dedup();
        self.candidates.retain(|&u| u as usize != v);
    }
}
