// SPDX-License-Identifier: MPL-2.0

//! Smallest-free integer ID allocation over an interval set.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Allocates integral IDs in `[lb, ub]`, always returning the smallest
/// currently-free value. Allocation and release are both `O(log n)` in the
/// number of free intervals.
///
/// Internally this is a set of disjoint `[lb, ub]` intervals keyed by their
/// lower bound, mirroring the interval-set allocator this core's object
/// and handle spaces were modeled on. Coalescing adjacent intervals on
/// `free` is an optimization, not a correctness requirement, so it is
/// performed opportunistically rather than exhaustively.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    free_intervals: BTreeMap<u32, u32>,
}

impl IdAllocator {
    /// Creates an allocator covering `[lb, ub]` inclusive.
    pub fn new(lb: u32, ub: u32) -> Self {
        let mut free_intervals = BTreeMap::new();
        free_intervals.insert(lb, ub);
        Self { free_intervals }
    }

    /// Creates an allocator over `[1, u32::MAX]`, the common case for
    /// mode-object IDs and BO handles.
    pub fn starting_at_one() -> Self {
        Self::new(1, u32::MAX)
    }

    /// Returns the smallest free ID and marks it allocated.
    pub fn allocate(&mut self) -> Result<u32> {
        let (&lb, &ub) = self
            .free_intervals
            .iter()
            .next()
            .ok_or(Error::IdsExhausted)?;

        self.free_intervals.remove(&lb);
        if lb < ub {
            self.free_intervals.insert(lb + 1, ub);
        }
        Ok(lb)
    }

    /// Returns `id` to the pool. Freeing an id that is not currently
    /// allocated is a caller bug but is not checked here, matching the
    /// reference allocator's `free` contract.
    pub fn free(&mut self, id: u32) {
        let mut lb = id;
        let mut ub = id;

        if let Some((&prev_lb, &prev_ub)) = self.free_intervals.range(..id).next_back() {
            if prev_ub.checked_add(1) == Some(id) {
                lb = prev_lb;
                self.free_intervals.remove(&prev_lb);
            }
        }
        if let Some(&next_ub) = self.free_intervals.get(&(ub.wrapping_add(1))) {
            if ub.checked_add(1).is_some() {
                ub = next_ub;
                self.free_intervals.remove(&(id + 1));
            }
        }

        self.free_intervals.insert(lb, ub);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_smallest_free_first() {
        let mut alloc = IdAllocator::starting_at_one();
        assert_eq!(alloc.allocate().unwrap(), 1);
        assert_eq!(alloc.allocate().unwrap(), 2);
        assert_eq!(alloc.allocate().unwrap(), 3);
    }

    #[test]
    fn freed_id_is_reused_before_higher_ids() {
        let mut alloc = IdAllocator::starting_at_one();
        let a = alloc.allocate().unwrap();
        let b = alloc.allocate().unwrap();
        let _c = alloc.allocate().unwrap();
        alloc.free(b);
        assert_eq!(alloc.allocate().unwrap(), b);
        assert_ne!(a, b);
    }

    #[test]
    fn exhausted_allocator_errors() {
        let mut alloc = IdAllocator::new(1, 1);
        assert_eq!(alloc.allocate().unwrap(), 1);
        assert!(alloc.allocate().is_err());
    }

    #[test]
    fn coalesces_adjacent_free_intervals() {
        let mut alloc = IdAllocator::new(1, 10);
        for _ in 0..5 {
            alloc.allocate().unwrap();
        }
        alloc.free(3);
        alloc.free(2);
        alloc.free(1);
        // ids 1..=3 should have coalesced into a single free interval.
        assert_eq!(alloc.free_intervals.len(), 2);
    }
}
