//! Capability-selector space
//!
//! Every kernel object the manager creates on behalf of a child sits at a
//! selector taken from this space. The space is process-wide: all children
//! and all worker CPUs allocate from the same instance.

use crate::range::RangeAllocator;
use crate::{ResourceError, ResourceKind};
use core_types::CapSel;
use parking_lot::Mutex;

/// Process-wide selector allocator
#[derive(Debug)]
pub struct CapSelSpace {
    base: u64,
    size: u64,
    ranges: Mutex<RangeAllocator>,
}

impl CapSelSpace {
    /// Creates a space managing selectors `[base, base + size)`
    pub fn new(base: u64, size: u64) -> Self {
        Self {
            base,
            size,
            ranges: Mutex::new(RangeAllocator::new(base, size)),
        }
    }

    /// Allocates `count` consecutive selectors and returns the first one.
    pub fn allocate(&self, count: u64) -> Result<CapSel, ResourceError> {
        let mut ranges = self.ranges.lock();
        ranges
            .allocate(count)
            .map(CapSel::new)
            .ok_or(ResourceError::Exhausted {
                resource: ResourceKind::CapSelectors,
                requested: count,
                available: ranges.available(),
            })
    }

    /// Returns `count` selectors starting at `base` to the space.
    ///
    /// # Panics
    ///
    /// Panics if any of the selectors is not currently allocated. That means
    /// two owners believed they held the same selector, and the capability
    /// space can no longer be trusted.
    pub fn free(&self, base: CapSel, count: u64) {
        let released = self.ranges.lock().release(base.raw(), count);
        assert!(
            released,
            "capability selectors {}+{} released but not allocated",
            base, count
        );
    }

    /// Number of selectors currently free
    pub fn available(&self) -> u64 {
        self.ranges.lock().available()
    }

    /// Total number of selectors managed
    pub fn capacity(&self) -> u64 {
        self.size
    }

    /// Returns true if `sel` lies inside this space
    pub fn contains(&self, sel: CapSel) -> bool {
        sel.raw() >= self.base && sel.raw() < self.base + self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_allocate_and_free() {
        let space = CapSelSpace::new(0x100, 0x100);
        let a = space.allocate(1).unwrap();
        let b = space.allocate(4).unwrap();
        assert_eq!(a, CapSel::new(0x100));
        assert_eq!(b, CapSel::new(0x101));
        assert_eq!(space.available(), 0x100 - 5);

        space.free(a, 1);
        space.free(b, 4);
        assert_eq!(space.available(), space.capacity());
    }

    #[test]
    fn test_exhaustion() {
        let space = CapSelSpace::new(0, 2);
        space.allocate(2).unwrap();
        let err = space.allocate(1).unwrap_err();
        assert_eq!(
            err,
            ResourceError::Exhausted {
                resource: ResourceKind::CapSelectors,
                requested: 1,
                available: 0
            }
        );
    }

    #[test]
    #[should_panic(expected = "released but not allocated")]
    fn test_double_free_panics() {
        let space = CapSelSpace::new(0, 8);
        let sel = space.allocate(1).unwrap();
        space.free(sel, 1);
        space.free(sel, 1);
    }

    #[test]
    fn test_contains() {
        let space = CapSelSpace::new(0x10, 0x10);
        assert!(space.contains(CapSel::new(0x10)));
        assert!(space.contains(CapSel::new(0x1f)));
        assert!(!space.contains(CapSel::new(0x20)));
        assert!(!space.contains(CapSel::INVALID));
    }

    #[test]
    fn test_concurrent_allocation_is_unique() {
        let space = Arc::new(CapSelSpace::new(0, 4096));
        let mut workers = Vec::new();
        for _ in 0..4 {
            let space = Arc::clone(&space);
            workers.push(thread::spawn(move || {
                (0..256)
                    .map(|_| space.allocate(1).unwrap())
                    .collect::<Vec<_>>()
            }));
        }

        let mut all: Vec<CapSel> = workers
            .into_iter()
            .flat_map(|w| w.join().unwrap())
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 1024);
        assert_eq!(space.available(), 4096 - 1024);
    }
}
