//! Global configuration constants for anngraph.
//!
//! Tuning defaults and validation limits live here. Runtime configuration is
//! carried by [`KnnConfig`](crate::knn::KnnConfig) and
//! [`LayeredConfig`](crate::layered::LayeredConfig), whose `Default` impls
//! read these values.

/// Default alignment in bytes for pooled adjacency buffers (one cache line).
pub const DEFAULT_ALIGNMENT: usize = 64;

/// Default neighbor-list width for fixed-degree graphs.
pub const DEFAULT_MAX_DEGREE: usize = 32;

/// Default number of NND refinement passes.
///
/// NND is treated as a fixed budget, not a convergence criterion.
pub const DEFAULT_NND_ITERATIONS: usize = 8;

/// Default edge budget of a vertex in the base layer of a layered graph.
pub const DEFAULT_TARGET_DEGREE_BASE: usize = 32;

/// Default edge budget of a vertex in every layer above the base layer.
///
/// Also the branching factor `M` of the level-probability model.
pub const DEFAULT_TARGET_DEGREE_PER_LAYER: usize = 16;

/// Default beam width when searching for insertion candidates.
pub const DEFAULT_EF_CONSTRUCTION: usize = 100;

/// A layer is no longer appended to the level table once its probability
/// increment falls below this value.
pub const LEVEL_PROBABILITY_EPSILON: f64 = 1e-9;

/// Number of elements consumed by one iteration of a vectorized kernel's
/// main loop. The remaining `dim % LANE_WIDTH` elements are the residual.
pub const LANE_WIDTH: usize = 16;

/// Number of mutexes guarding neighbor-list updates in a layered index.
pub const LINK_LOCK_STRIPES: usize = 1024;

/// Seed for the insertion order shuffle in `LayeredIndex::build`.
pub const BUILD_SHUFFLE_SEED: u64 = 42;

/// Maximum row width accepted by [`MatrixView`](crate::matrix::MatrixView).
///
/// The distance kernels themselves accept slices of any length.
pub const MAX_DIMENSION: usize = 65_536;
