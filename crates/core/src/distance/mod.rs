//! Distance computation over f32, f16 and u8 vectors.
//!
//! - [`metric`]: metric and element enums, polarity, neighbor ranking
//! - [`simd`]: vectorized float kernels (AVX2+FMA / NEON / scalar)
//! - [`integer`]: vectorized u8 kernels with integer accumulators
//! - [`element`]: the [`Element`] trait and bound [`Distance`] dispatch

pub mod element;
pub mod integer;
pub mod metric;
pub mod simd;

pub use element::{Distance, Element, KernelFn};
pub use metric::{is_min_close, DistanceMetric, ElementType, Neighbor};

use crate::error::{AnnError, Result};

/// Compute `metric` between `a` and `b`.
///
/// Empty vectors score 0 for every metric except Cosine, which scores 1.
///
/// ```
/// use anngraph_core::distance::{distance, DistanceMetric};
///
/// let d = distance::<f32>(DistanceMetric::L2, &[0.0, 3.0], &[4.0, 0.0]).unwrap();
/// assert_eq!(d, 25.0);
/// ```
pub fn distance<T: Element>(metric: DistanceMetric, a: &[T], b: &[T]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(AnnError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(Distance::<T>::new(metric)?.eval(a, b))
}
