//! Layered small-world graph construction and search.
//!
//! A [`LevelTable`] assigns each vertex a top layer with geometrically
//! decreasing probability. Layer 0 holds every inserted vertex with lists of
//! up to `target_degree_base` ids; higher layers hold exponentially fewer
//! vertices with lists of up to `target_degree_per_layer` ids. Searches enter
//! at the deepest non-empty layer and descend greedily to layer 0.

pub mod index;
pub mod levels;
pub mod search;
pub mod visited;

pub use index::{LayeredConfig, LayeredIndex, LayeredStats};
pub use levels::LevelTable;
pub use visited::VisitedList;
