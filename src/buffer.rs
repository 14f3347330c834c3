// SPDX-License-Identifier: MPL-2.0

//! Buffer objects (BOs): the GEM-like backing store for framebuffers and
//! dumb-buffer allocations, opaque to this core beyond size and the mmap
//! offset it is reachable at.

use std::sync::atomic::{AtomicU32, Ordering};

/// Sentinel meaning "no mmap slot assigned yet". `install_mapping` races
/// a compare-exchange against this value so concurrent callers converge
/// on the same slot rather than leaking one.
const NO_SLOT: u32 = u32::MAX;

/// A single buffer object. The core never interprets its contents; it
/// only tracks identity, size, and the mmap slot lazily assigned to it
/// by [`Device::install_mapping`](crate::device::Device::install_mapping),
/// and forwards reads/writes to the [`Driver`](crate::driver::Driver).
#[derive(Debug)]
pub struct BufferObject {
    pub id: u32,
    pub size: u64,
    pub pitch: u32,
    pub height: u32,
    mmap_slot: AtomicU32,
    handle_count: AtomicU32,
}

impl BufferObject {
    pub fn new(id: u32, size: u64, pitch: u32, height: u32) -> Self {
        Self {
            id,
            size,
            pitch,
            height,
            mmap_slot: AtomicU32::new(NO_SLOT),
            handle_count: AtomicU32::new(0),
        }
    }

    pub fn mmap_slot(&self) -> Option<u32> {
        match self.mmap_slot.load(Ordering::SeqCst) {
            NO_SLOT => None,
            slot => Some(slot),
        }
    }

    pub fn mmap_offset(&self) -> Option<u64> {
        self.mmap_slot().map(|slot| (slot as u64) << 32)
    }

    /// Assigns `slot` as this BO's mmap slot, unless one is already set.
    /// Returns the slot now in effect (the new one, or the pre-existing
    /// one if this lost the race), giving `install_mapping` idempotence
    /// without a lock.
    pub fn assign_mmap_slot(&self, slot: u32) -> u32 {
        match self
            .mmap_slot
            .compare_exchange(NO_SLOT, slot, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => slot,
            Err(existing) => existing,
        }
    }

    pub fn ref_handle(&self) {
        self.handle_count.fetch_add(1, Ordering::SeqCst);
    }

    /// Drops one handle's reference; returns `true` if this was the last
    /// one, meaning the BO and its mmap slot are now reclaimable.
    pub fn unref_handle(&self) -> bool {
        self.handle_count.fetch_sub(1, Ordering::SeqCst) == 1
    }

    pub fn handle_count(&self) -> u32 {
        self.handle_count.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_mmap_slot_is_idempotent() {
        let bo = BufferObject::new(1, 4096, 64, 64);
        assert_eq!(bo.assign_mmap_slot(5), 5);
        assert_eq!(bo.assign_mmap_slot(9), 5);
        assert_eq!(bo.mmap_offset(), Some(5u64 << 32));
    }
}
