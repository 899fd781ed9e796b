//! Scratch memory handed to each simulation step.

use std::mem;

/// Reusable per-step scratch buffers with usage accounting.
///
/// Index buffers returned to the allocator keep their capacity and are handed out again on the next step. Every
/// step-scoped allocation is counted against the byte budget; going over it logs a warning but never fails.
#[derive(Debug)]
pub struct TempAllocator {
    budget: usize,
    in_use: usize,
    peak: usize,
    warned: bool,
    index_buffers: Vec<Vec<u32>>,
}

impl TempAllocator {
    /// Default budget of 10 MiB.
    pub const DEFAULT_BUDGET: usize = 10 * 1024 * 1024;

    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            in_use: 0,
            peak: 0,
            warned: false,
            index_buffers: Vec::new(),
        }
    }

    #[inline]
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Bytes counted since the current step started.
    #[inline]
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    /// Largest number of bytes a single step has used.
    #[inline]
    pub fn peak_usage(&self) -> usize {
        self.peak
    }

    pub fn reset_peak(&mut self) {
        self.peak = self.in_use;
    }

    /// Counts an allocation of `count` values of `T` against the budget.
    pub fn record<T>(&mut self, count: usize) {
        self.in_use += count * mem::size_of::<T>();
        self.peak = self.peak.max(self.in_use);
        if self.in_use > self.budget && !self.warned {
            self.warned = true;
            tracing::warn!(
                in_use = self.in_use,
                budget = self.budget,
                "temp allocator budget exceeded, falling back to the heap"
            );
        }
    }

    /// Takes an index buffer of exactly `count` elements, all set to `fill`.
    pub fn take_indices(&mut self, count: usize, fill: u32) -> Vec<u32> {
        self.record::<u32>(count);
        let mut buffer = self.index_buffers.pop().unwrap_or_default();
        buffer.clear();
        buffer.resize(count, fill);
        buffer
    }

    /// Gives an index buffer back for reuse.
    pub fn return_indices(&mut self, buffer: Vec<u32>) {
        self.index_buffers.push(buffer);
    }

    /// Ends a step: all recorded usage is released.
    pub fn end_step(&mut self) {
        self.in_use = 0;
        self.warned = false;
    }
}

impl Default for TempAllocator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BUDGET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_are_reused() {
        let mut allocator = TempAllocator::new(1024);
        let mut buffer = allocator.take_indices(16, 7);
        assert!(buffer.iter().all(|&i| i == 7));
        buffer.reserve(100);
        let capacity = buffer.capacity();
        allocator.return_indices(buffer);
        let again = allocator.take_indices(4, 0);
        assert_eq!(again.len(), 4);
        assert_eq!(again.capacity(), capacity);
    }

    #[test]
    fn peak_survives_the_end_of_a_step() {
        let mut allocator = TempAllocator::new(8);
        allocator.record::<u64>(4);
        assert_eq!(allocator.in_use(), 32);
        allocator.end_step();
        assert_eq!(allocator.in_use(), 0);
        assert_eq!(allocator.peak_usage(), 32);
    }
}
