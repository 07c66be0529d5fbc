//! # anngraph-core
//!
//! Building blocks for proximity-graph approximate nearest neighbor search:
//! SIMD distance kernels, a recycling buffer pool, dense and concurrent graph
//! storage, exact and NND k-NN graph builders, and a layered small-world index.
//!
//! Vectors are borrowed through [`MatrixView`]; nothing here owns or copies
//! the caller's data.

/// Tuning defaults and hard limits.
pub mod config;
/// Distance metrics, element types, and SIMD kernels for f32, f16 and u8 vectors.
pub mod distance;
/// Error type shared by every module.
pub mod error;
/// Fixed-degree, degree-tracked and concurrent graph storage.
pub mod graph;
/// k-NN graph builders: exact brute force and Nearest-Neighbor Descent.
pub mod knn;
/// Layered small-world graph: level model, concurrent insertion and search.
pub mod layered;
/// Row-major read-only view over a flat vector buffer.
pub mod matrix;
/// Aligned, zeroed buffer pool with a size-sorted reuse cache.
pub mod memory;

pub use distance::{distance, Distance, DistanceMetric, Element, ElementType, Neighbor};
pub use error::{AnnError, Result};
pub use graph::{DegreeTrackedGraph, DynamicGraph, FixedDegreeGraph};
pub use knn::{
    brute_force_knn, brute_force_knn_in, brute_force_search, build_nnd, build_nnd_in,
    build_nnd_with_stats, KnnConfig, NndStats,
};
pub use layered::{LayeredConfig, LayeredIndex, LayeredStats, LevelTable};
pub use matrix::MatrixView;
pub use memory::{MemoryPool, PoolStats, PooledBuffer};
