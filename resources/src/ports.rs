//! IO port ranges
//!
//! [`PortSpace`] arbitrates the machine's IO port space between children;
//! [`PortManager`] records which ranges one child holds.

use crate::range::RangeAllocator;
use crate::{ResourceError, ResourceKind};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Number of IO ports on x86
pub const IO_PORT_COUNT: u32 = 0x10000;

/// A contiguous range of IO ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub base: u32,
    pub count: u32,
}

impl PortRange {
    pub fn new(base: u32, count: u32) -> Self {
        Self { base, count }
    }

    pub fn end(&self) -> u32 {
        self.base + self.count
    }

    pub fn contains(&self, port: u32) -> bool {
        port >= self.base && port < self.end()
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}..{:#x}", self.base, self.end())
    }
}

/// Process-wide IO port arbiter
#[derive(Debug)]
pub struct PortSpace {
    ranges: Mutex<RangeAllocator>,
    size: u32,
}

impl PortSpace {
    pub fn new(size: u32) -> Self {
        Self {
            ranges: Mutex::new(RangeAllocator::new(0, size as u64)),
            size,
        }
    }

    /// Claims exactly `range`.
    pub fn allocate(&self, range: PortRange) -> Result<(), ResourceError> {
        let mut ranges = self.ranges.lock();
        if !ranges.contains(range.base as u64, range.count as u64) {
            return Err(ResourceError::OutOfRange {
                resource: ResourceKind::IoPorts,
                value: range.base as u64,
            });
        }
        if !ranges.allocate_at(range.base as u64, range.count as u64) {
            return Err(ResourceError::Unavailable {
                resource: ResourceKind::IoPorts,
                base: range.base as u64,
                count: range.count as u64,
            });
        }
        Ok(())
    }

    /// Gives `range` back.
    ///
    /// # Panics
    ///
    /// Panics if any port in the range is not currently claimed.
    pub fn release(&self, range: PortRange) {
        let released = self
            .ranges
            .lock()
            .release(range.base as u64, range.count as u64);
        assert!(released, "IO ports {} released but not allocated", range);
    }

    /// Number of unclaimed ports
    pub fn available(&self) -> u64 {
        self.ranges.lock().available()
    }

    pub fn capacity(&self) -> u32 {
        self.size
    }
}

impl Default for PortSpace {
    fn default() -> Self {
        Self::new(IO_PORT_COUNT)
    }
}

/// IO port ranges held by one child
#[derive(Debug, Clone, Default)]
pub struct PortManager {
    ranges: BTreeMap<u32, u32>,
}

impl PortManager {
    pub fn new() -> Self {
        Self {
            ranges: BTreeMap::new(),
        }
    }

    /// Records a range the child now holds.
    pub fn insert(&mut self, range: PortRange) {
        self.ranges.insert(range.base, range.count);
    }

    /// Forgets a range; only an exact match of a recorded range is removed.
    pub fn remove(&mut self, range: PortRange) -> bool {
        if self.ranges.get(&range.base) == Some(&range.count) {
            self.ranges.remove(&range.base);
            true
        } else {
            false
        }
    }

    /// Returns true if the child holds `port`
    pub fn contains(&self, port: u32) -> bool {
        self.ranges
            .range(..=port)
            .next_back()
            .map_or(false, |(base, count)| port < base + count)
    }

    pub fn ranges(&self) -> Vec<PortRange> {
        self.ranges
            .iter()
            .map(|(base, count)| PortRange::new(*base, *count))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Removes and returns every recorded range.
    pub fn drain(&mut self) -> Vec<PortRange> {
        let ranges = self.ranges();
        self.ranges.clear();
        ranges
    }
}
