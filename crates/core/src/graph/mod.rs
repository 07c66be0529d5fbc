//! Graph storage.
//!
//! - [`FixedDegreeGraph`]: dense rows of exactly `max_degree` ids (k-NN graphs)
//! - [`DegreeTrackedGraph`]: dense rows with a degree counter (incrementally filled lists)
//! - [`DynamicGraph`]: concurrent ordered map for graphs that grow vertex by vertex
//!
//! Dense graphs own a [`PooledBuffer`](crate::memory::PooledBuffer) and return it
//! to their pool when dropped or recycled.

pub mod degree;
pub mod dynamic;
pub mod fixed;

pub use degree::{DegreeRowMut, DegreeTrackedGraph};
pub use dynamic::DynamicGraph;
pub use fixed::FixedDegreeGraph;
