//! Error types shared by every module of the core.
//!
//! Only configuration problems and allocator exhaustion are recoverable.
//! Broken bookkeeping invariants (a buffer handed to the wrong pool, a row
//! index past the end of a graph) panic instead of returning an error.

use crate::distance::{DistanceMetric, ElementType};
use thiserror::Error;

/// Errors reported by kernels, pools and graph builders.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnnError {
    /// A configuration value is out of range (zero dimension, degree too large, ...).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No kernel exists for this metric / element type pair.
    #[error("metric {metric:?} is not supported for {element:?} vectors")]
    UnsupportedMetric {
        metric: DistanceMetric,
        element: ElementType,
    },

    /// Two vectors passed to one distance call have different lengths.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The system allocator refused a pool allocation.
    #[error("out of memory: failed to allocate {bytes} bytes aligned to {alignment}")]
    OutOfMemory { bytes: usize, alignment: usize },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AnnError>;

impl AnnError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        AnnError::InvalidConfig(msg.into())
    }
}
