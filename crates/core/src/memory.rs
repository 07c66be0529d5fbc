//! Pooled aligned allocations for graph adjacency buffers.
//!
//! NND rebuilds a full `vertex_count * max_degree` adjacency buffer on every
//! pass. Recycling the previous pass's buffer into the pool lets the next
//! [`MemoryPool::cached_allocate`] reuse it without touching the system
//! allocator.
//!
//! Slabs live in an arena indexed by [`SlabId`]. A slab is either in use
//! (owned by exactly one [`PooledBuffer`]) or available (cached, sorted by
//! ascending size). Thread-safe via `parking_lot::Mutex`.

use crate::error::{AnnError, Result};
use parking_lot::Mutex;
use std::alloc::{self, Layout};
use std::collections::HashSet;
use std::mem::ManuallyDrop;
use std::ptr::NonNull;
use std::sync::{Arc, OnceLock};

/// Arena index of a slab inside one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlabId(u32);

struct Slab {
    ptr: NonNull<u8>,
    layout: Layout,
}

/// Counters describing pool activity and current occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Slabs obtained from the system allocator.
    pub system_allocations: u64,
    /// Slabs returned to the system allocator.
    pub system_frees: u64,
    /// Requests served from the available set.
    pub cache_hits: u64,
    pub in_use: usize,
    pub available: usize,
    pub bytes_in_use: usize,
    pub bytes_available: usize,
}

#[derive(Default)]
struct PoolState {
    slabs: Vec<Option<Slab>>,
    vacant: Vec<SlabId>,
    in_use: HashSet<SlabId>,
    /// Sorted by ascending slab size.
    available: Vec<SlabId>,
    stats: PoolStats,
}

// Slab pointers are only dereferenced through the PooledBuffer that owns them.
unsafe impl Send for PoolState {}

impl PoolState {
    fn slab(&self, id: SlabId) -> &Slab {
        self.slabs[id.0 as usize]
            .as_ref()
            .unwrap_or_else(|| panic!("slab {id:?} is not tracked by this pool"))
    }

    fn insert(&mut self, slab: Slab) -> SlabId {
        match self.vacant.pop() {
            Some(id) => {
                self.slabs[id.0 as usize] = Some(slab);
                id
            }
            None => {
                self.slabs.push(Some(slab));
                SlabId((self.slabs.len() - 1) as u32)
            }
        }
    }

    fn free(&mut self, id: SlabId) {
        let slab = self.slabs[id.0 as usize]
            .take()
            .unwrap_or_else(|| panic!("slab {id:?} freed twice"));
        self.vacant.push(id);
        self.stats.system_frees += 1;
        // SAFETY: the slab was allocated with exactly this layout and is no
        // longer referenced by any buffer.
        unsafe { alloc::dealloc(slab.ptr.as_ptr(), slab.layout) };
    }

    fn take_in_use(&mut self, id: SlabId) {
        assert!(
            self.in_use.remove(&id),
            "slab {id:?} is not in use in this pool"
        );
        let size = self.slab(id).layout.size();
        self.stats.in_use -= 1;
        self.stats.bytes_in_use -= size;
    }

    fn mark_in_use(&mut self, id: SlabId) {
        let size = self.slab(id).layout.size();
        self.in_use.insert(id);
        self.stats.in_use += 1;
        self.stats.bytes_in_use += size;
    }
}

/// Pool of aligned, zero-initialised allocations with a reuse cache.
pub struct MemoryPool {
    state: Mutex<PoolState>,
}

impl MemoryPool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PoolState::default()),
        })
    }

    /// Process-wide shared pool.
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<MemoryPool>> = OnceLock::new();
        GLOBAL.get_or_init(MemoryPool::new).clone()
    }

    /// Allocate a fresh zeroed slab from the system allocator.
    pub fn allocate(self: &Arc<Self>, bytes: usize, alignment: usize) -> Result<PooledBuffer> {
        let layout = slab_layout(bytes, alignment)?;
        // SAFETY: layout has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(AnnError::OutOfMemory { bytes, alignment })?;

        let mut state = self.state.lock();
        let slab = state.insert(Slab { ptr, layout });
        state.mark_in_use(slab);
        state.stats.system_allocations += 1;
        drop(state);

        tracing::trace!(bytes, alignment, "pool system allocation");
        Ok(PooledBuffer {
            pool: Arc::clone(self),
            slab,
            ptr,
            bytes,
        })
    }

    /// Reuse the first available slab of at least `bytes` with a compatible
    /// alignment, or fall back to [`allocate`](Self::allocate).
    ///
    /// Reused memory is not re-zeroed.
    pub fn cached_allocate(
        self: &Arc<Self>,
        bytes: usize,
        alignment: usize,
    ) -> Result<PooledBuffer> {
        slab_layout(bytes, alignment)?;
        {
            let mut state = self.state.lock();
            let found = state.available.iter().position(|&id| {
                let layout = state.slab(id).layout;
                layout.size() >= bytes && layout.align() >= alignment
            });
            if let Some(pos) = found {
                let slab = state.available.remove(pos);
                let size = state.slab(slab).layout.size();
                let ptr = state.slab(slab).ptr;
                state.stats.available -= 1;
                state.stats.bytes_available -= size;
                state.mark_in_use(slab);
                state.stats.cache_hits += 1;
                return Ok(PooledBuffer {
                    pool: Arc::clone(self),
                    slab,
                    ptr,
                    bytes,
                });
            }
        }
        self.allocate(bytes, alignment)
    }

    /// Free a buffer immediately. Equivalent to dropping it.
    ///
    /// # Panics
    /// If `buffer` belongs to another pool.
    pub fn release(&self, buffer: PooledBuffer) {
        self.assert_owns(&buffer);
        drop(buffer);
    }

    /// Return a buffer to the available set for later reuse.
    ///
    /// # Panics
    /// If `buffer` belongs to another pool.
    pub fn recycle(&self, buffer: PooledBuffer) {
        self.assert_owns(&buffer);
        let buffer = ManuallyDrop::new(buffer);
        self.make_available(buffer.slab);
        // SAFETY: `buffer` is never dropped, so its Arc is read out exactly once.
        drop(unsafe { std::ptr::read(&buffer.pool) });
    }

    pub fn stats(&self) -> PoolStats {
        self.state.lock().stats
    }

    fn assert_owns(&self, buffer: &PooledBuffer) {
        assert!(
            std::ptr::eq(Arc::as_ptr(&buffer.pool), self),
            "buffer returned to a pool that did not allocate it"
        );
    }

    fn make_available(&self, slab: SlabId) {
        let mut state = self.state.lock();
        state.take_in_use(slab);
        let size = state.slab(slab).layout.size();
        let pos = state
            .available
            .partition_point(|&id| state.slab(id).layout.size() <= size);
        state.available.insert(pos, slab);
        state.stats.available += 1;
        state.stats.bytes_available += size;
    }

    fn free_in_use(&self, slab: SlabId) {
        let mut state = self.state.lock();
        state.take_in_use(slab);
        state.free(slab);
    }
}

impl Drop for MemoryPool {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        let live: Vec<SlabId> = state
            .in_use
            .drain()
            .chain(state.available.drain(..))
            .collect();
        for slab in live {
            state.free(slab);
        }
    }
}

impl std::fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPool")
            .field("stats", &self.stats())
            .finish()
    }
}

fn slab_layout(bytes: usize, alignment: usize) -> Result<Layout> {
    if !alignment.is_power_of_two() {
        return Err(AnnError::config(format!(
            "alignment {alignment} is not a power of two"
        )));
    }
    Layout::from_size_align(bytes.max(1), alignment)
        .map_err(|_| AnnError::OutOfMemory { bytes, alignment })
}

/// A uniquely owned slab of a [`MemoryPool`].
///
/// Dropping the buffer frees the slab; [`recycle`](Self::recycle) caches it.
pub struct PooledBuffer {
    pool: Arc<MemoryPool>,
    slab: SlabId,
    ptr: NonNull<u8>,
    bytes: usize,
}

// SAFETY: the buffer uniquely owns its slab; shared access is read-only.
unsafe impl Send for PooledBuffer {}
unsafe impl Sync for PooledBuffer {}

impl PooledBuffer {
    /// Requested size in bytes (the slab may be larger).
    pub fn len(&self) -> usize {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }

    pub fn slab(&self) -> SlabId {
        self.slab
    }

    pub fn pool(&self) -> &Arc<MemoryPool> {
        &self.pool
    }

    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: the slab holds at least `bytes` initialised bytes.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.bytes) }
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` guarantees exclusivity.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.bytes) }
    }

    /// View the buffer as vertex ids. Requires 4-byte alignment.
    pub fn as_ids(&self) -> &[u32] {
        self.assert_id_aligned();
        // SAFETY: aligned, initialised, and every bit pattern is a valid u32.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr() as *const u32, self.bytes / 4) }
    }

    pub fn as_ids_mut(&mut self) -> &mut [u32] {
        self.assert_id_aligned();
        // SAFETY: as above, and `&mut self` guarantees exclusivity.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr() as *mut u32, self.bytes / 4) }
    }

    /// Move the slab to the pool's available set.
    pub fn recycle(self) {
        let pool = Arc::clone(&self.pool);
        pool.recycle(self);
    }

    fn assert_id_aligned(&self) {
        assert_eq!(
            self.ptr.as_ptr() as usize % std::mem::align_of::<u32>(),
            0,
            "buffer is not aligned for u32 ids"
        );
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.free_in_use(self.slab);
    }
}

impl std::fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("slab", &self.slab)
            .field("bytes", &self.bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_is_zeroed_and_tracked() {
        let pool = MemoryPool::new();
        let buf = pool.allocate(256, 64).unwrap();
        assert_eq!(buf.len(), 256);
        assert!(buf.as_bytes().iter().all(|&b| b == 0));
        assert_eq!(buf.as_bytes().as_ptr() as usize % 64, 0);

        let stats = pool.stats();
        assert_eq!(stats.system_allocations, 1);
        assert_eq!(stats.in_use, 1);
        assert_eq!(stats.bytes_in_use, 256);
    }

    #[test]
    fn test_drop_frees_exactly_once() {
        let pool = MemoryPool::new();
        let buf = pool.allocate(128, 64).unwrap();
        pool.release(buf);
        let stats = pool.stats();
        assert_eq!(stats.system_frees, 1);
        assert_eq!(stats.in_use, 0);
        assert_eq!(stats.available, 0);

        let buf = pool.allocate(128, 64).unwrap();
        drop(buf);
        assert_eq!(pool.stats().system_frees, 2);
    }

    #[test]
    fn test_cached_allocate_reuses_without_system_call() {
        let pool = MemoryPool::new();
        let mut buf = pool.allocate(1024, 64).unwrap();
        buf.as_ids_mut()[0] = 7;
        let slab = buf.slab();
        buf.recycle();

        let stats = pool.stats();
        assert_eq!(stats.available, 1);
        assert_eq!(stats.in_use, 0);

        let reused = pool.cached_allocate(512, 64).unwrap();
        assert_eq!(reused.slab(), slab);
        assert_eq!(reused.len(), 512);
        assert_eq!(reused.as_ids()[0], 7, "cached memory is not re-zeroed");

        let stats = pool.stats();
        assert_eq!(stats.system_allocations, 1);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.available, 0);
    }

    #[test]
    fn test_cached_allocate_picks_smallest_fitting_slab() {
        let pool = MemoryPool::new();
        let big = pool.allocate(4096, 64).unwrap();
        let small = pool.allocate(256, 64).unwrap();
        let mid = pool.allocate(1024, 64).unwrap();
        let mid_slab = mid.slab();
        big.recycle();
        small.recycle();
        mid.recycle();

        let buf = pool.cached_allocate(600, 64).unwrap();
        assert_eq!(buf.slab(), mid_slab);
    }

    #[test]
    fn test_cached_allocate_falls_back_when_too_small() {
        let pool = MemoryPool::new();
        pool.allocate(64, 64).unwrap().recycle();
        let buf = pool.cached_allocate(4096, 64).unwrap();
        assert_eq!(buf.len(), 4096);
        let stats = pool.stats();
        assert_eq!(stats.system_allocations, 2);
        assert_eq!(stats.cache_hits, 0);
        assert_eq!(stats.available, 1);
    }

    #[test]
    fn test_alignment_must_be_power_of_two() {
        let pool = MemoryPool::new();
        let err = pool.allocate(64, 48).unwrap_err();
        assert!(matches!(err, AnnError::InvalidConfig(_)));
    }

    #[test]
    #[should_panic(expected = "did not allocate it")]
    fn test_foreign_buffer_panics() {
        let a = MemoryPool::new();
        let b = MemoryPool::new();
        let buf = a.allocate(64, 64).unwrap();
        b.recycle(buf);
    }

    #[test]
    fn test_concurrent_allocations() {
        let pool = MemoryPool::new();
        std::thread::scope(|s| {
            for _ in 0..4 {
                let pool = Arc::clone(&pool);
                s.spawn(move || {
                    for i in 0..50 {
                        let buf = pool.cached_allocate(64 * (i % 4 + 1), 64).unwrap();
                        buf.recycle();
                    }
                });
            }
        });
        let stats = pool.stats();
        assert_eq!(stats.in_use, 0);
        assert_eq!(stats.cache_hits + stats.system_allocations, 200);
    }
}
