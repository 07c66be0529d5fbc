//! Geometric level-probability model for layered graphs.

use crate::config::LEVEL_PROBABILITY_EPSILON;
use crate::error::{AnnError, Result};

/// Cumulative probability of a vertex topping out at each layer, plus the
/// cumulative edge budget of a vertex present in layers `0..=l`.
///
/// With `r = 1 / ln(M)`, layer `l` receives probability
/// `exp(-l / r) * (1 - exp(-1 / r))`. Layers are appended until that
/// increment falls below [`LEVEL_PROBABILITY_EPSILON`].
#[derive(Debug, Clone, PartialEq)]
pub struct LevelTable {
    target_degree_base: usize,
    target_degree_per_layer: usize,
    cumulative: Vec<f64>,
    cumulative_edges: Vec<usize>,
}

impl LevelTable {
    pub fn new(target_degree_base: usize, target_degree_per_layer: usize) -> Result<Self> {
        if target_degree_base == 0 {
            return Err(AnnError::config("target_degree_base must be positive"));
        }
        if target_degree_per_layer < 2 {
            return Err(AnnError::config(
                "target_degree_per_layer must be at least 2",
            ));
        }

        let r = 1.0 / (target_degree_per_layer as f64).ln();
        let mut cumulative = Vec::new();
        let mut cumulative_edges = Vec::new();
        let mut prob = 0.0f64;
        let mut edges = 0usize;
        for layer in 0.. {
            let delta = (-(layer as f64) / r).exp() * (1.0 - (-1.0 / r).exp());
            if delta < LEVEL_PROBABILITY_EPSILON {
                break;
            }
            prob += delta;
            edges += if layer == 0 {
                target_degree_base
            } else {
                target_degree_per_layer
            };
            cumulative.push(prob);
            cumulative_edges.push(edges);
        }

        Ok(Self {
            target_degree_base,
            target_degree_per_layer,
            cumulative,
            cumulative_edges,
        })
    }

    #[inline]
    pub fn num_layers(&self) -> usize {
        self.cumulative.len()
    }

    pub fn cumulative_probabilities(&self) -> &[f64] {
        &self.cumulative
    }

    pub fn cumulative_edges(&self) -> &[usize] {
        &self.cumulative_edges
    }

    /// Neighbor-list bound of a vertex in `layer`.
    #[inline]
    pub fn layer_degree(&self, layer: usize) -> usize {
        if layer == 0 {
            self.target_degree_base
        } else {
            self.target_degree_per_layer
        }
    }

    /// Map a uniform draw `u` in `[0, 1)` to a top layer: the first layer whose
    /// cumulative probability exceeds `u`, else the deepest layer.
    pub fn sample(&self, u: f64) -> usize {
        self.cumulative
            .iter()
            .position(|&p| u < p)
            .unwrap_or(self.cumulative.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_strictly_increasing_and_bounded() {
        for m in [2, 4, 16, 48] {
            let table = LevelTable::new(32, m).unwrap();
            let probs = table.cumulative_probabilities();
            assert!(!probs.is_empty());
            for w in probs.windows(2) {
                assert!(w[0] < w[1], "M={m}: {probs:?}");
            }
            let last = *probs.last().unwrap();
            assert!(last <= 1.0 + 1e-12, "M={m}: last={last}");
            assert!(last > 0.999_999, "M={m}: last={last}");
        }
    }

    #[test]
    fn test_layer_count_for_m16() {
        let table = LevelTable::new(32, 16).unwrap();
        assert_eq!(table.num_layers(), 8);
        assert!((table.cumulative_probabilities()[0] - 0.9375).abs() < 1e-12);
    }

    #[test]
    fn test_edge_budget_uses_base_for_layer_zero() {
        let table = LevelTable::new(32, 16).unwrap();
        assert_eq!(&table.cumulative_edges()[..3], &[32, 48, 64]);
        assert_eq!(table.layer_degree(0), 32);
        assert_eq!(table.layer_degree(3), 16);
    }

    #[test]
    fn test_sample_bounds() {
        let table = LevelTable::new(8, 4).unwrap();
        assert_eq!(table.sample(0.0), 0);
        assert_eq!(table.sample(0.5), 0);
        assert_eq!(table.sample(0.8), 1);
        assert_eq!(table.sample(1.0), table.num_layers() - 1);
        for i in 0..1000 {
            let level = table.sample(i as f64 / 1000.0);
            assert!(level < table.num_layers());
        }
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(LevelTable::new(0, 16).is_err());
        assert!(LevelTable::new(32, 1).is_err());
        assert!(LevelTable::new(32, 0).is_err());
    }
}
