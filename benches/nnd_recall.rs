//! Graph construction benchmark on synthetic data.
//! Reports NND recall per iteration count against the exact graph, then
//! layered index build time, Recall@10 and QPS.
//!
//! Usage: cargo bench --bench nnd_recall
//! Logging: RUST_LOG=anngraph_core=debug cargo bench --bench nnd_recall

use anngraph::{
    brute_force_knn_in, brute_force_search, build_nnd_with_stats, KnnConfig, LayeredConfig,
    LayeredIndex, MatrixView, MemoryPool,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const NUM_VECTORS: usize = 20_000;
const NUM_QUERIES: usize = 200;
const DIM: usize = 64;
const K: usize = 10;

fn random_data(n: usize, dim: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n * dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("anngraph_core=info")),
        )
        .init();

    let data = random_data(NUM_VECTORS, DIM, 1);
    let matrix = MatrixView::new(&data, DIM).unwrap();
    let pool = MemoryPool::new();

    let base = KnnConfig {
        max_degree: 16,
        seed: Some(42),
        ..Default::default()
    };

    println!(
        "=== NND vs exact k-NN ({NUM_VECTORS} x {DIM}, degree {}) ===",
        base.max_degree
    );
    let start = Instant::now();
    let truth = brute_force_knn_in(&pool, &base, &matrix).unwrap();
    println!("brute force: {:.2}s", start.elapsed().as_secs_f64());

    println!(
        "{:<12} {:>10} {:>12} {:>16}",
        "iterations", "recall", "time (s)", "distance evals"
    );
    for iterations in [0, 1, 2, 4, 8] {
        let config = KnnConfig {
            iterations,
            ..base.clone()
        };
        let start = Instant::now();
        let (graph, stats) = build_nnd_with_stats(&pool, &config, &matrix).unwrap();
        let elapsed = start.elapsed().as_secs_f64();
        println!(
            "{:<12} {:>10.4} {:>12.2} {:>16}",
            iterations,
            graph.recall(&truth),
            elapsed,
            stats.distance_evaluations
        );
    }
    let pool_stats = pool.stats();
    println!(
        "pool: {} system allocations, {} cache hits",
        pool_stats.system_allocations, pool_stats.cache_hits
    );

    println!();
    println!("=== Layered index ===");
    let queries = random_data(NUM_QUERIES, DIM, 2);
    let config = LayeredConfig {
        seed: Some(42),
        ..Default::default()
    };
    let index = LayeredIndex::new(matrix, config).unwrap();
    let start = Instant::now();
    index.build().unwrap();
    println!(
        "build: {:.2}s, layer sizes {:?}",
        start.elapsed().as_secs_f64(),
        index.layer_sizes()
    );

    let truths: Vec<Vec<u32>> = queries
        .chunks_exact(DIM)
        .map(|q| {
            brute_force_search(index.config().metric, &matrix, q, K)
                .unwrap()
                .into_iter()
                .map(|n| n.id)
                .collect()
        })
        .collect();

    println!("{:<6} {:>10} {:>10}", "ef", "recall@10", "QPS");
    for ef in [16, 32, 64, 128] {
        let start = Instant::now();
        let results: Vec<Vec<u32>> = queries
            .chunks_exact(DIM)
            .map(|q| {
                index
                    .search(q, K, ef)
                    .unwrap()
                    .into_iter()
                    .map(|n| n.id)
                    .collect()
            })
            .collect();
        let elapsed = start.elapsed().as_secs_f64();
        let hits: usize = results
            .iter()
            .zip(&truths)
            .map(|(found, truth)| found.iter().filter(|id| truth.contains(id)).count())
            .sum();
        println!(
            "{:<6} {:>10.4} {:>10.0}",
            ef,
            hits as f64 / (NUM_QUERIES * K) as f64,
            NUM_QUERIES as f64 / elapsed
        );
    }
}
