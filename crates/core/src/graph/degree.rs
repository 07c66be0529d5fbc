//! Adjacency with a per-vertex degree counter, for lists that fill up
//! incrementally.

use crate::config::DEFAULT_ALIGNMENT;
use crate::error::{AnnError, Result};
use crate::memory::{MemoryPool, PooledBuffer};
use std::sync::Arc;

/// Rows of `max_degree + 1` slots; slot 0 holds the current degree and
/// slots `1..=degree` the neighbor ids.
pub struct DegreeTrackedGraph {
    vertex_count: usize,
    max_degree: usize,
    buffer: PooledBuffer,
}

impl DegreeTrackedGraph {
    pub fn new(vertex_count: usize, max_degree: usize) -> Result<Self> {
        Self::new_in(&MemoryPool::global(), vertex_count, max_degree, DEFAULT_ALIGNMENT)
    }

    /// Allocate a zeroed graph (every degree 0) from `pool`.
    pub fn new_in(
        pool: &Arc<MemoryPool>,
        vertex_count: usize,
        max_degree: usize,
        alignment: usize,
    ) -> Result<Self> {
        let bytes = row_bytes(vertex_count, max_degree)?;
        let buffer = pool.allocate(bytes, alignment.max(std::mem::align_of::<u32>()))?;
        Ok(Self {
            vertex_count,
            max_degree,
            buffer,
        })
    }

    /// Reuse a recycled buffer when one fits. Degrees are reset to zero.
    pub fn cached_in(
        pool: &Arc<MemoryPool>,
        vertex_count: usize,
        max_degree: usize,
        alignment: usize,
    ) -> Result<Self> {
        let bytes = row_bytes(vertex_count, max_degree)?;
        let buffer = pool.cached_allocate(bytes, alignment.max(std::mem::align_of::<u32>()))?;
        let mut graph = Self {
            vertex_count,
            max_degree,
            buffer,
        };
        graph.clear();
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
    fn stride(&self) -> usize {
        self.max_degree + 1
    }

    #[inline]
    fn row(&self, v: usize) -> &[u32] {
        let stride = self.stride();
        &self.buffer.as_ids()[v * stride..(v + 1) * stride]
    }

    #[inline]
    fn row_mut(&mut self, v: usize) -> DegreeRowMut<'_> {
        let stride = self.stride();
        DegreeRowMut {
            slots: &mut self.buffer.as_ids_mut()[v * stride..(v + 1) * stride],
        }
    }

    #[inline]
    pub fn degree(&self, v: usize) -> usize {
        self.row(v)[0] as usize
    }

    /// The first `degree(v)` neighbors of `v`.
    #[inline]
    pub fn neighbors(&self, v: usize) -> &[u32] {
        let row = self.row(v);
        &row[1..1 + row[0] as usize]
    }

    /// Replace the list of `v`. Panics if `ids` exceeds `max_degree`.
    pub fn set_neighbors(&mut self, v: usize, ids: &[u32]) {
        self.row_mut(v).set(ids);
    }

    /// Append `id` to `v`'s list. Returns `false` if the list is full.
    #[inline]
    pub fn push(&mut self, v: usize, id: u32) -> bool {
        self.row_mut(v).push(id)
    }

    /// Reset every degree to zero.
    pub fn clear(&mut self) {
        for mut row in self.rows_mut() {
            row.clear();
        }
    }

    /// Disjoint mutable rows; each keeps its degree slot and ids in step.
    pub fn rows_mut(&mut self) -> impl Iterator<Item = DegreeRowMut<'_>> {
        let stride = self.stride();
        let len = self.vertex_count * stride;
        self.buffer.as_ids_mut()[..len]
            .chunks_exact_mut(stride)
            .map(|slots| DegreeRowMut { slots })
    }

    pub fn recycle(self) {
        self.buffer.recycle();
    }
}

fn row_bytes(vertex_count: usize, max_degree: usize) -> Result<usize> {
    if max_degree == 0 {
        return Err(AnnError::config("max_degree must be positive"));
    }
    max_degree
        .checked_add(1)
        .and_then(|stride| stride.checked_mul(vertex_count))
        .and_then(|n| n.checked_mul(std::mem::size_of::<u32>()))
        .ok_or_else(|| {
            AnnError::config(format!(
                "adjacency of {vertex_count} x {max_degree} overflows"
            ))
        })
}

/// Exclusive handle on one row of a [`DegreeTrackedGraph`].
pub struct DegreeRowMut<'a> {
    slots: &'a mut [u32],
}

impl DegreeRowMut<'_> {
    #[inline]
    pub fn degree(&self) -> usize {
        self.slots[0] as usize
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len() - 1
    }

    #[inline]
    pub fn neighbors(&self) -> &[u32] {
        &self.slots[1..1 + self.degree()]
    }

    #[inline]
    pub fn push(&mut self, id: u32) -> bool {
        let deg = self.degree();
        if deg == self.capacity() {
            return false;
        }
        self.slots[1 + deg] = id;
        self.slots[0] = deg as u32 + 1;
        true
    }

    pub fn set(&mut self, ids: &[u32]) {
        assert!(
            ids.len() <= self.capacity(),
            "{} neighbors exceed max_degree {}",
            ids.len(),
            self.capacity()
        );
        self.slots[1..1 + ids.len()].copy_from_slice(ids);
        self.slots[0] = ids.len() as u32;
    }

    #[inline]
    pub fn clear(&mut self) {
        self.slots[0] = 0;
    }
}
