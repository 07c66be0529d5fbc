//! # anngraph
//!
//! Proximity-graph construction for approximate nearest neighbor search.
//!
//! ## Features
//!
//! - **Distance kernels** for f32, f16 and u8 vectors with AVX2/F16C and NEON paths
//! - **Exact k-NN graphs** by parallel brute force, usable as a recall oracle
//! - **Nearest-Neighbor Descent** refining a random graph toward the exact one
//! - **Layered small-world index** with lock-striped concurrent insertion
//! - **Buffer pool** that recycles adjacency storage across build passes
//!
//! ## Architecture
//!
//! ```text
//! MatrixView ─┬→ brute_force_knn ─→ FixedDegreeGraph (exact)
//!             ├→ build_nnd ───────→ FixedDegreeGraph (approximate)
//!             └→ LayeredIndex ────→ DynamicGraph per layer → search
//! Buffers:   MemoryPool → PooledBuffer → FixedDegreeGraph / DegreeTrackedGraph
//! ```
//!
//! ## Example
//!
//! ```
//! use anngraph::{build_nnd, brute_force_knn, KnnConfig, MatrixView};
//!
//! let data: Vec<f32> = (0..64 * 4).map(|i| ((i * 37) % 101) as f32).collect();
//! let matrix = MatrixView::new(&data, 4).unwrap();
//! let config = KnnConfig { max_degree: 5, seed: Some(7), ..Default::default() };
//!
//! let exact = brute_force_knn(&config, &matrix).unwrap();
//! let approx = build_nnd(&config, &matrix).unwrap();
//! assert!(approx.recall(&exact) > 0.0);
//! ```

pub use anngraph_core::*;
