//! Dense adjacency with exactly `max_degree` neighbors per vertex.

use crate::config::DEFAULT_ALIGNMENT;
use crate::error::{AnnError, Result};
use crate::memory::{MemoryPool, PooledBuffer};
use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;

/// `vertex_count` rows of `max_degree` ids in one pooled buffer.
///
/// Row `v` occupies `[v * max_degree, (v + 1) * max_degree)`. Every slot is
/// populated: freshly allocated graphs are zeroed, cached ones hold whatever
/// the previous owner wrote until a builder overwrites them.
pub struct FixedDegreeGraph {
    vertex_count: usize,
    max_degree: usize,
    buffer: PooledBuffer,
}

impl FixedDegreeGraph {
    /// Allocate from the global pool with the default alignment.
    pub fn new(vertex_count: usize, max_degree: usize) -> Result<Self> {
        Self::new_in(&MemoryPool::global(), vertex_count, max_degree, DEFAULT_ALIGNMENT)
    }

    /// Allocate a zeroed graph from `pool`.
    pub fn new_in(
        pool: &Arc<MemoryPool>,
        vertex_count: usize,
        max_degree: usize,
        alignment: usize,
    ) -> Result<Self> {
        let bytes = adjacency_bytes(vertex_count, max_degree)?;
        let buffer = pool.allocate(bytes, alignment.max(std::mem::align_of::<u32>()))?;
        Ok(Self {
            vertex_count,
            max_degree,
            buffer,
        })
    }

    /// Like [`new_in`](Self::new_in) but reuses a recycled buffer when one fits.
    /// Contents are unspecified.
    pub fn cached_in(
        pool: &Arc<MemoryPool>,
        vertex_count: usize,
        max_degree: usize,
        alignment: usize,
    ) -> Result<Self> {
        let bytes = adjacency_bytes(vertex_count, max_degree)?;
        let buffer = pool.cached_allocate(bytes, alignment.max(std::mem::align_of::<u32>()))?;
        Ok(Self {
            vertex_count,
            max_degree,
            buffer,
        })
    }

    /// Build a graph from explicit rows, each exactly `max_degree` long.
    pub fn from_rows<R: AsRef<[u32]>>(max_degree: usize, rows: &[R]) -> Result<Self> {
        let mut graph = Self::new(rows.len(), max_degree)?;
        for (v, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != max_degree {
                return Err(AnnError::config(format!(
                    "row {v} has {} neighbors, expected {max_degree}",
                    row.len()
                )));
            }
            graph.neighbors_mut(v).copy_from_slice(row);
        }
        Ok(graph)
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    #[inline]
    pub fn max_degree(&self) -> usize {
        self.max_degree
    }

    #[inline]
    pub fn neighbors(&self, v: usize) -> &[u32] {
        let start = v * self.max_degree;
        &self.as_slice()[start..start + self.max_degree]
    }

    #[inline]
    pub fn neighbors_mut(&mut self, v: usize) -> &mut [u32] {
        let d = self.max_degree;
        let start = v * d;
        &mut self.as_mut_slice()[start..start + d]
    }

    /// The whole adjacency, row-major.
    #[inline]
    pub fn as_slice(&self) -> &[u32] {
        &self.buffer.as_ids()[..self.vertex_count * self.max_degree]
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u32] {
        let len = self.vertex_count * self.max_degree;
        &mut self.buffer.as_ids_mut()[..len]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u32]> + '_ {
        self.as_slice().chunks_exact(self.max_degree)
    }

    /// Disjoint mutable rows for parallel builders.
    pub fn par_rows_mut(&mut self) -> rayon::slice::ChunksExactMut<'_, u32> {
        let d = self.max_degree;
        self.as_mut_slice().par_chunks_exact_mut(d)
    }

    /// Fraction of positions where both graphs hold the same id, over the
    /// smaller of the two degrees. Zero when vertex counts differ.
    pub fn recall(&self, other: &FixedDegreeGraph) -> f32 {
        if self.vertex_count != other.vertex_count {
            return 0.0;
        }
        let deg = self.max_degree.min(other.max_degree);
        let total = deg * self.vertex_count;
        if total == 0 {
            return 1.0;
        }
        let matched: usize = (0..self.vertex_count)
            .map(|v| {
                self.neighbors(v)[..deg]
                    .iter()
                    .zip(&other.neighbors(v)[..deg])
                    .filter(|(a, b)| a == b)
                    .count()
            })
            .sum();
        matched as f32 / total as f32
    }

    /// Hand the buffer back to its pool's cache.
    pub fn recycle(self) {
        self.buffer.recycle();
    }
}

fn adjacency_bytes(vertex_count: usize, max_degree: usize) -> Result<usize> {
    if max_degree == 0 {
        return Err(AnnError::config("max_degree must be positive"));
    }
    vertex_count
        .checked_mul(max_degree)
        .and_then(|n| n.checked_mul(std::mem::size_of::<u32>()))
        .ok_or_else(|| {
            AnnError::config(format!(
                "adjacency of {vertex_count} x {max_degree} overflows"
            ))
        })
}

impl PartialEq for FixedDegreeGraph {
    fn eq(&self, other: &Self) -> bool {
        self.vertex_count == other.vertex_count
            && self.max_degree == other.max_degree
            && self.as_slice() == other.as_slice()
    }
}

impl fmt::Display for FixedDegreeGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "vertex_count = {} max_degree = {}",
            self.vertex_count, self.max_degree
        )?;
        for (v, row) in self.rows().enumerate() {
            write!(f, "{v}:")?;
            for id in row {
                write!(f, " {id}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Debug for FixedDegreeGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedDegreeGraph")
            .field("vertex_count", &self.vertex_count)
            .field("max_degree", &self.max_degree)
            .finish()
    }
}
