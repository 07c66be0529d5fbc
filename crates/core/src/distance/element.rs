//! Element types and metric dispatch.
//!
//! [`Distance`] resolves a metric × element pair to a plain function pointer
//! once, so hot loops call the kernel directly without matching on the metric.

use super::{integer, simd, DistanceMetric, ElementType};
use crate::error::{AnnError, Result};
use half::f16;

/// Kernel signature shared by every bound metric.
pub type KernelFn<T> = fn(&[T], &[T]) -> f32;

/// A vector element type with distance kernels.
pub trait Element: Copy + Send + Sync + 'static {
    /// Runtime tag of this element type.
    const TYPE: ElementType;

    /// The kernel for `metric`, or `None` if the pair is unsupported.
    fn kernel(metric: DistanceMetric) -> Option<KernelFn<Self>>;
}

impl Element for f32 {
    const TYPE: ElementType = ElementType::F32;

    fn kernel(metric: DistanceMetric) -> Option<KernelFn<Self>> {
        let kernel: KernelFn<Self> = match metric {
            DistanceMetric::L2 => simd::l2_f32,
            DistanceMetric::L1 => simd::l1_f32,
            DistanceMetric::InnerProduct => simd::dot_f32,
            DistanceMetric::Cosine => cosine_f32,
            DistanceMetric::Hamming => return None,
        };
        Some(kernel)
    }
}

impl Element for f16 {
    const TYPE: ElementType = ElementType::F16;

    fn kernel(metric: DistanceMetric) -> Option<KernelFn<Self>> {
        let kernel: KernelFn<Self> = match metric {
            DistanceMetric::L2 => simd::l2_f16,
            DistanceMetric::L1 => simd::l1_f16,
            DistanceMetric::InnerProduct => simd::dot_f16,
            DistanceMetric::Cosine => cosine_f16,
            DistanceMetric::Hamming => return None,
        };
        Some(kernel)
    }
}

impl Element for u8 {
    const TYPE: ElementType = ElementType::U8;

    fn kernel(metric: DistanceMetric) -> Option<KernelFn<Self>> {
        let kernel: KernelFn<Self> = match metric {
            DistanceMetric::L2 => l2_u8,
            DistanceMetric::L1 => l1_u8,
            DistanceMetric::InnerProduct => dot_u8,
            DistanceMetric::Cosine => cosine_u8,
            DistanceMetric::Hamming => hamming_u8,
        };
        Some(kernel)
    }
}

// Adapters from native kernel outputs to the shared f32 score.

fn cosine_f32(a: &[f32], b: &[f32]) -> f32 {
    1.0 - simd::cosine_similarity_f32(a, b)
}

fn cosine_f16(a: &[f16], b: &[f16]) -> f32 {
    1.0 - simd::cosine_similarity_f16(a, b)
}

fn l2_u8(a: &[u8], b: &[u8]) -> f32 {
    integer::l2_u8(a, b) as f32
}

fn l1_u8(a: &[u8], b: &[u8]) -> f32 {
    integer::l1_u8(a, b) as f32
}

fn dot_u8(a: &[u8], b: &[u8]) -> f32 {
    integer::dot_u8(a, b) as f32
}

fn cosine_u8(a: &[u8], b: &[u8]) -> f32 {
    1.0 - integer::cosine_similarity_u8(a, b)
}

fn hamming_u8(a: &[u8], b: &[u8]) -> f32 {
    integer::hamming_u8(a, b) as f32
}

/// A metric bound to its kernel for element type `T`.
#[derive(Clone, Copy)]
pub struct Distance<T: Element> {
    metric: DistanceMetric,
    kernel: KernelFn<T>,
}

impl<T: Element> Distance<T> {
    /// Bind `metric` for `T`. Fails with `UnsupportedMetric` for pairs with no kernel.
    pub fn new(metric: DistanceMetric) -> Result<Self> {
        let kernel = T::kernel(metric).ok_or(AnnError::UnsupportedMetric {
            metric,
            element: T::TYPE,
        })?;
        Ok(Self { metric, kernel })
    }

    #[inline]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Score `a` against `b`. Both slices must have the same length.
    #[inline(always)]
    pub fn eval(&self, a: &[T], b: &[T]) -> f32 {
        (self.kernel)(a, b)
    }
}

impl<T: Element> std::fmt::Debug for Distance<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Distance")
            .field("metric", &self.metric)
            .field("element", &T::TYPE)
            .finish()
    }
}
