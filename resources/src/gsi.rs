//! Global system interrupts
//!
//! A GSI is assigned to at most one child at a time. [`GsiSpace`] is the
//! process-wide arbiter; each child remembers the lines it holds in its own
//! [`GsiBitmap`] so they can be handed back on teardown.

use crate::{ResourceError, ResourceKind};
use parking_lot::Mutex;

/// Fixed-size bitmap of interrupt lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GsiBitmap {
    words: Vec<u64>,
    bits: u32,
}

impl GsiBitmap {
    /// Creates an empty bitmap able to hold lines `0..bits`
    pub fn new(bits: u32) -> Self {
        let words = (bits as usize + 63) / 64;
        Self {
            words: vec![0; words],
            bits,
        }
    }

    /// Number of lines the bitmap covers
    pub fn capacity(&self) -> u32 {
        self.bits
    }

    pub fn is_set(&self, gsi: u32) -> bool {
        gsi < self.bits && self.words[(gsi / 64) as usize] & (1 << (gsi % 64)) != 0
    }

    /// Sets a bit; returns false if it was already set or out of range.
    pub fn set(&mut self, gsi: u32) -> bool {
        if gsi >= self.bits || self.is_set(gsi) {
            return false;
        }
        self.words[(gsi / 64) as usize] |= 1 << (gsi % 64);
        true
    }

    /// Clears a bit; returns false if it was not set.
    pub fn clear(&mut self, gsi: u32) -> bool {
        if !self.is_set(gsi) {
            return false;
        }
        self.words[(gsi / 64) as usize] &= !(1 << (gsi % 64));
        true
    }

    /// Number of set bits
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Lowest clear bit, if any
    pub fn first_clear(&self) -> Option<u32> {
        (0..self.bits).find(|gsi| !self.is_set(*gsi))
    }

    /// Set bits in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.bits).filter(move |gsi| self.is_set(*gsi))
    }
}

/// Process-wide GSI arbiter
#[derive(Debug)]
pub struct GsiSpace {
    taken: Mutex<GsiBitmap>,
}

impl GsiSpace {
    pub fn new(max_gsis: u32) -> Self {
        Self {
            taken: Mutex::new(GsiBitmap::new(max_gsis)),
        }
    }

    /// Claims a specific interrupt line.
    pub fn allocate(&self, gsi: u32) -> Result<(), ResourceError> {
        let mut taken = self.taken.lock();
        if gsi >= taken.capacity() {
            return Err(ResourceError::OutOfRange {
                resource: ResourceKind::Gsis,
                value: gsi as u64,
            });
        }
        if !taken.set(gsi) {
            return Err(ResourceError::Unavailable {
                resource: ResourceKind::Gsis,
                base: gsi as u64,
                count: 1,
            });
        }
        Ok(())
    }

    /// Claims the lowest free interrupt line.
    pub fn allocate_any(&self) -> Result<u32, ResourceError> {
        let mut taken = self.taken.lock();
        let gsi = taken.first_clear().ok_or(ResourceError::Exhausted {
            resource: ResourceKind::Gsis,
            requested: 1,
            available: 0,
        })?;
        taken.set(gsi);
        Ok(gsi)
    }

    /// Returns an interrupt line.
    ///
    /// # Panics
    ///
    /// Panics if the line is not currently claimed.
    pub fn release(&self, gsi: u32) {
        let released = self.taken.lock().clear(gsi);
        assert!(released, "GSI {} released but not allocated", gsi);
    }

    /// Number of unclaimed lines
    pub fn available(&self) -> usize {
        let taken = self.taken.lock();
        taken.capacity() as usize - taken.count()
    }

    pub fn max_gsis(&self) -> u32 {
        self.taken.lock().capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_set_clear() {
        let mut bits = GsiBitmap::new(130);
        assert!(bits.set(0));
        assert!(bits.set(64));
        assert!(bits.set(129));
        assert!(!bits.set(129));
        assert!(!bits.set(130));
        assert_eq!(bits.count(), 3);
        assert_eq!(bits.iter().collect::<Vec<_>>(), vec![0, 64, 129]);

        assert!(bits.clear(64));
        assert!(!bits.clear(64));
        assert_eq!(bits.count(), 2);
        assert_eq!(bits.first_clear(), Some(1));
    }

    #[test]
    fn test_bitmap_empty() {
        let bits = GsiBitmap::new(16);
        assert!(bits.is_empty());
        assert_eq!(bits.iter().count(), 0);
    }

    #[test]
    fn test_space_exclusive() {
        let space = GsiSpace::new(4);
        space.allocate(2).unwrap();
        assert_eq!(
            space.allocate(2),
            Err(ResourceError::Unavailable {
                resource: ResourceKind::Gsis,
                base: 2,
                count: 1
            })
        );
        assert_eq!(space.available(), 3);

        space.release(2);
        assert!(space.allocate(2).is_ok());
    }

    #[test]
    fn test_space_allocate_any() {
        let space = GsiSpace::new(2);
        assert_eq!(space.allocate_any(), Ok(0));
        assert_eq!(space.allocate_any(), Ok(1));
        assert!(matches!(
            space.allocate_any(),
            Err(ResourceError::Exhausted { .. })
        ));
    }

    #[test]
    fn test_space_out_of_range() {
        let space = GsiSpace::new(8);
        assert!(matches!(
            space.allocate(8),
            Err(ResourceError::OutOfRange { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "GSI 3 released but not allocated")]
    fn test_space_release_unheld_panics() {
        let space = GsiSpace::new(8);
        space.release(3);
    }
}
