//! Epoch-stamped visited marks for graph traversal.
//!
//! Each vertex slot stores the epoch of its last visit; starting a new
//! traversal just bumps the epoch, so marks never need clearing except when
//! the counter wraps.

#[derive(Debug)]
pub struct VisitedList {
    marks: Vec<u16>,
    epoch: u16,
}

impl VisitedList {
    pub fn new(capacity: usize) -> Self {
        Self {
            marks: vec![0; capacity],
            epoch: 1,
        }
    }

    /// Begin a new traversal over at least `capacity` vertices.
    pub fn reset(&mut self, capacity: usize) {
        if capacity > self.marks.len() {
            self.marks.resize(capacity, 0);
        }
        if self.epoch == u16::MAX {
            self.marks.fill(0);
            self.epoch = 1;
        } else {
            self.epoch += 1;
        }
    }

    /// Mark `id`. Returns `true` the first time `id` is seen in this traversal.
    #[inline]
    pub fn mark(&mut self, id: u32) -> bool {
        let slot = &mut self.marks[id as usize];
        if *slot == self.epoch {
            return false;
        }
        *slot = self.epoch;
        true
    }
}

impl Default for VisitedList {
    fn default() -> Self {
        Self::new(0)
    }
}
