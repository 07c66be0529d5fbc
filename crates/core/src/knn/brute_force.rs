//! Exact k-NN by exhaustive comparison.

use super::{write_top, KnnConfig};
use crate::distance::{Distance, DistanceMetric, Element, Neighbor};
use crate::error::{AnnError, Result};
use crate::graph::FixedDegreeGraph;
use crate::matrix::MatrixView;
use crate::memory::MemoryPool;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;

/// Exact k-NN graph over `matrix` using the global pool.
pub fn brute_force_knn<T: Element>(
    config: &KnnConfig,
    matrix: &MatrixView<'_, T>,
) -> Result<FixedDegreeGraph> {
    brute_force_knn_in(&MemoryPool::global(), config, matrix)
}

/// Exact k-NN graph over `matrix`, allocating from `pool`.
///
/// Every vertex is scored against every other vertex; each row keeps the
/// `max_degree` closest. The pass is repeated `max(iterations, 1)` times and
/// produces the same graph every time.
pub fn brute_force_knn_in<T: Element>(
    pool: &Arc<MemoryPool>,
    config: &KnnConfig,
    matrix: &MatrixView<'_, T>,
) -> Result<FixedDegreeGraph> {
    let n = matrix.num_elements();
    let dist = config.validate::<T>(n)?;
    let start = Instant::now();
    tracing::info!(
        vertices = n,
        dimension = matrix.dimension(),
        max_degree = config.max_degree,
        metric = ?config.metric,
        "brute-force k-NN started"
    );

    let mut graph = FixedDegreeGraph::new_in(pool, n, config.max_degree, config.alignment)?;
    for _ in 0..config.iterations.max(1) {
        graph.par_rows_mut().enumerate().for_each_init(
            || Vec::with_capacity(n),
            |scored, (v, row)| exact_row(&dist, matrix, v, scored, row),
        );
    }

    tracing::info!(
        vertices = n,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "brute-force k-NN finished"
    );
    Ok(graph)
}

fn exact_row<T: Element>(
    dist: &Distance<T>,
    matrix: &MatrixView<'_, T>,
    v: usize,
    scored: &mut Vec<Neighbor>,
    row: &mut [u32],
) {
    let base = matrix.row(v);
    scored.clear();
    scored.extend(
        (0..matrix.num_elements())
            .filter(|&u| u != v)
            .map(|u| Neighbor::new(u as u32, dist.eval(base, matrix.row(u)))),
    );
    write_top(dist.metric(), scored, row);
}

/// The `k` rows of `matrix` closest to `query`, best first.
pub fn brute_force_search<T: Element>(
    metric: DistanceMetric,
    matrix: &MatrixView<'_, T>,
    query: &[T],
    k: usize,
) -> Result<Vec<Neighbor>> {
    if query.len() != matrix.dimension() {
        return Err(AnnError::DimensionMismatch {
            expected: matrix.dimension(),
            actual: query.len(),
        });
    }
    let dist = Distance::<T>::new(metric)?;
    let mut scored: Vec<Neighbor> = matrix
        .rows()
        .enumerate()
        .map(|(u, row)| Neighbor::new(u as u32, dist.eval(query, row)))
        .collect();
    metric.sort(&mut scored);
    scored.truncate(k);
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_data(n: usize, dim: usize, seed: u64) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n * dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
    }

    #[test]
    fn test_line_neighbors() {
        // Points on a line: 0, 1, 2, ..., 5
        let data: Vec<f32> = (0..6).map(|i| i as f32).collect();
        let m = MatrixView::new(&data, 1).unwrap();
        let config = KnnConfig {
            max_degree: 2,
            ..Default::default()
        };
        let g = brute_force_knn(&config, &m).unwrap();
        assert_eq!(g.neighbors(0), &[1, 2]);
        // 1 and 3 tie for vertex 2; lower id first.
        assert_eq!(g.neighbors(2), &[1, 3]);
        assert_eq!(g.neighbors(5), &[4, 3]);
    }

    #[test]
    fn test_rows_sorted_and_self_free() {
        let data = random_data(60, 8, 1);
        let m = MatrixView::new(&data, 8).unwrap();
        for metric in [DistanceMetric::L2, DistanceMetric::InnerProduct, DistanceMetric::Cosine] {
            let config = KnnConfig {
                metric,
                max_degree: 10,
                ..Default::default()
            };
            let g = brute_force_knn(&config, &m).unwrap();
            let dist = Distance::<f32>::new(metric).unwrap();
            for v in 0..60 {
                let row = g.neighbors(v);
                assert!(!row.contains(&(v as u32)), "self-loop at {v}");
                let scores: Vec<f32> = row
                    .iter()
                    .map(|&u| dist.eval(m.row(v), m.row(u as usize)))
                    .collect();
                for w in scores.windows(2) {
                    assert!(
                        !metric.is_closer(w[1], w[0]),
                        "{metric:?} row {v} out of order: {scores:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_repeated_passes_are_identical() {
        let data = random_data(30, 4, 2);
        let m = MatrixView::new(&data, 4).unwrap();
        let once = KnnConfig {
            max_degree: 5,
            iterations: 1,
            ..Default::default()
        };
        let thrice = KnnConfig {
            iterations: 3,
            ..once.clone()
        };
        assert_eq!(
            brute_force_knn(&once, &m).unwrap(),
            brute_force_knn(&thrice, &m).unwrap()
        );
    }

    #[test]
    fn test_degree_must_be_below_vertex_count() {
        let data = random_data(5, 2, 3);
        let m = MatrixView::new(&data, 2).unwrap();
        let config = KnnConfig {
            max_degree: 5,
            ..Default::default()
        };
        assert!(matches!(
            brute_force_knn(&config, &m),
            Err(AnnError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_brute_force_search() {
        let data: Vec<u8> = vec![0, 0, 10, 10, 3, 4, 100, 100];
        let m = MatrixView::new(&data, 2).unwrap();
        let hits = brute_force_search(DistanceMetric::L2, &m, &[2, 2], 2).unwrap();
        assert_eq!(hits[0].id, 2);
        assert_eq!(hits[1].id, 0);
        assert!(brute_force_search(DistanceMetric::L2, &m, &[1], 1).is_err());
    }
}
