//! Metric and element-type enumerations, metric polarity, and neighbor ranking.
//!
//! Every place that orders candidates (sorting a row, popping a heap, pruning a
//! neighbor list) goes through [`DistanceMetric::closeness`] or
//! [`DistanceMetric::rank`], so flipping polarity for Inner-Product happens in
//! exactly one spot.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Distance metric used for vector comparison.
///
/// `InnerProduct` is similarity-like (**higher is closer**); every other metric
/// is distance-like (**lower is closer**).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Squared Euclidean distance `sum((a - b)^2)`.
    L2,
    /// Manhattan distance `sum(|a - b|)`.
    L1,
    /// Cosine distance `1 - dot(a, b) / (|a| * |b|)`. Range: \[0, 2\].
    Cosine,
    /// Dot product `sum(a * b)`. Higher = more similar.
    InnerProduct,
    /// Number of differing bits, `popcount(a ^ b)`. u8 vectors only.
    Hamming,
}

impl DistanceMetric {
    /// All metrics, in declaration order.
    pub const ALL: [DistanceMetric; 5] = [
        DistanceMetric::L2,
        DistanceMetric::L1,
        DistanceMetric::Cosine,
        DistanceMetric::InnerProduct,
        DistanceMetric::Hamming,
    ];

    /// Map a raw score to a key where smaller always means closer.
    #[inline]
    pub fn closeness(&self, score: f32) -> OrderedFloat<f32> {
        if is_min_close(*self) {
            OrderedFloat(score)
        } else {
            OrderedFloat(-score)
        }
    }

    /// Returns `true` if `a` is strictly closer than `b` under this metric.
    #[inline]
    pub fn is_closer(&self, a: f32, b: f32) -> bool {
        self.closeness(a) < self.closeness(b)
    }

    /// Total order on neighbors: closest first, ties broken by ascending id.
    #[inline]
    pub fn rank(&self, a: &Neighbor, b: &Neighbor) -> Ordering {
        self.closeness(a.distance)
            .cmp(&self.closeness(b.distance))
            .then_with(|| a.id.cmp(&b.id))
    }

    /// Sort neighbors best-first under this metric's polarity.
    pub fn sort(&self, neighbors: &mut [Neighbor]) {
        neighbors.sort_unstable_by(|a, b| self.rank(a, b));
    }
}

/// Whether a smaller score means more similar under `metric`.
///
/// Inner-Product is the only similarity-like metric.
#[inline]
pub const fn is_min_close(metric: DistanceMetric) -> bool {
    !matches!(metric, DistanceMetric::InnerProduct)
}

/// Numeric representation of vector elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    /// 32-bit IEEE float.
    F32,
    /// 16-bit IEEE float, widened to f32 for arithmetic.
    F16,
    /// Unsigned byte, accumulated in integers.
    U8,
}

/// A scored graph vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: u32,
    /// Raw metric score (a distance, or a similarity for Inner-Product).
    pub distance: f32,
}

impl Neighbor {
    #[inline]
    pub fn new(id: u32, distance: f32) -> Self {
        Self { id, distance }
    }
}
