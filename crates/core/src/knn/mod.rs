//! k-nearest-neighbor graph construction.
//!
//! [`brute_force`] computes the exact graph and serves as the ground-truth
//! oracle; [`nnd`] approximates it with Nearest-Neighbor Descent. Both emit a
//! [`FixedDegreeGraph`](crate::graph::FixedDegreeGraph) whose rows are ranked
//! closest first, ties broken by ascending id, and never contain the owner.

pub mod brute_force;
pub mod nnd;

pub use brute_force::{brute_force_knn, brute_force_knn_in, brute_force_search};
pub use nnd::{build_nnd, build_nnd_in, build_nnd_with_stats, NndStats};

use crate::config;
use crate::distance::{Distance, DistanceMetric, Element, Neighbor};
use crate::error::{AnnError, Result};
use serde::{Deserialize, Serialize};

/// Configuration shared by the k-NN graph builders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnnConfig {
    /// Distance function used to rank neighbors.
    pub metric: DistanceMetric,
    /// Neighbors kept per vertex. Must be below the vertex count.
    pub max_degree: usize,
    /// NND refinement passes. Brute force repeats its exact pass
    /// `max(iterations, 1)` times.
    pub iterations: usize,
    /// Seed for NND initialisation. `None` draws a random seed.
    pub seed: Option<u64>,
    /// Byte alignment of adjacency buffers (power of two).
    pub alignment: usize,
    /// Also join reverse neighbors (vertices listing `v`) during NND passes.
    pub reverse_join: bool,
}

impl Default for KnnConfig {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::L2,
            max_degree: config::DEFAULT_MAX_DEGREE,
            iterations: config::DEFAULT_NND_ITERATIONS,
            seed: None,
            alignment: config::DEFAULT_ALIGNMENT,
            reverse_join: true,
        }
    }
}

impl KnnConfig {
    /// Check the configuration against `vertex_count` rows of `T` and bind the metric.
    pub(crate) fn validate<T: Element>(&self, vertex_count: usize) -> Result<Distance<T>> {
        if self.max_degree == 0 {
            return Err(AnnError::config("max_degree must be positive"));
        }
        if self.max_degree >= vertex_count {
            return Err(AnnError::config(format!(
                "max_degree {} must be smaller than the vertex count {vertex_count}",
                self.max_degree
            )));
        }
        if !self.alignment.is_power_of_two() {
            return Err(AnnError::config(format!(
                "alignment {} is not a power of two",
                self.alignment
            )));
        }
        Distance::new(self.metric)
    }
}

/// Rank `scored` and write the best `row.len()` ids into `row`.
///
/// Returns how many slots were filled; fewer than `row.len()` only when
/// `scored` is too short.
pub(crate) fn write_top(
    metric: DistanceMetric,
    scored: &mut Vec<Neighbor>,
    row: &mut [u32],
) -> usize {
    let d = row.len();
    if scored.len() > d {
        scored.select_nth_unstable_by(d - 1, |a, b| metric.rank(a, b));
        scored.truncate(d);
    }
    metric.sort(scored);
    for (slot, n) in row.iter_mut().zip(scored.iter()) {
        *slot = n.id;
    }
    scored.len()
}
