//! A child's virtual memory map
//!
//! Regions never overlap. Placement is first-fit on page boundaries inside
//! the child's window `[base, limit)`.

use crate::{ResourceError, ResourceKind};
use core_types::{checked_page_align_up, is_page_aligned, CapSel, MemoryPerms, RegionKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One mapped region of a child's address space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub addr: usize,
    pub size: usize,
    pub perms: MemoryPerms,
    pub kind: RegionKind,
    /// Memory object backing the region, if the manager created one
    pub backing: Option<CapSel>,
}

impl Region {
    pub fn new(addr: usize, size: usize, perms: MemoryPerms, kind: RegionKind) -> Self {
        Self {
            addr,
            size,
            perms,
            kind,
            backing: None,
        }
    }

    /// Builder: records the backing memory object
    pub fn with_backing(mut self, backing: CapSel) -> Self {
        self.backing = Some(backing);
        self
    }

    pub fn end(&self) -> usize {
        self.addr + self.size
    }

    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.addr && addr < self.end()
    }

    fn overlaps(&self, addr: usize, size: usize) -> bool {
        addr < self.end() && self.addr < addr + size
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#010x}..{:#010x} {} {}",
            self.addr,
            self.end(),
            self.perms,
            self.kind
        )
    }
}

/// Ordered, non-overlapping set of regions
#[derive(Debug, Clone)]
pub struct RegionList {
    base: usize,
    limit: usize,
    regions: BTreeMap<usize, Region>,
}

impl RegionList {
    /// Creates an empty map for the window `[base, limit)`
    pub fn new(base: usize, limit: usize) -> Self {
        Self {
            base,
            limit,
            regions: BTreeMap::new(),
        }
    }

    /// Finds the lowest page-aligned gap that fits `size` bytes.
    ///
    /// `size` is rounded up to whole pages. Nothing is reserved; the caller
    /// inserts the region once its backing exists.
    pub fn find_free(&self, size: usize) -> Result<usize, ResourceError> {
        let exhausted = |requested: usize| ResourceError::Exhausted {
            resource: ResourceKind::VirtualMemory,
            requested: requested as u64,
            available: self.free_bytes() as u64,
        };
        let size = checked_page_align_up(size.max(1)).ok_or_else(|| exhausted(size))?;
        let mut candidate = checked_page_align_up(self.base).ok_or_else(|| exhausted(size))?;
        for region in self.regions.values() {
            if candidate
                .checked_add(size)
                .map_or(false, |end| end <= region.addr)
            {
                break;
            }
            let next = checked_page_align_up(region.end()).ok_or_else(|| exhausted(size))?;
            candidate = candidate.max(next);
        }
        if candidate
            .checked_add(size)
            .map_or(true, |end| end > self.limit)
        {
            return Err(exhausted(size));
        }
        Ok(candidate)
    }

    /// Adds a region; it must be page aligned, inside the window and must
    /// not overlap an existing one.
    pub fn insert(&mut self, region: Region) -> Result<(), ResourceError> {
        let in_window = region.addr >= self.base
            && region
                .addr
                .checked_add(region.size)
                .map_or(false, |end| end <= self.limit);
        if region.size == 0 || !is_page_aligned(region.addr) || !in_window {
            return Err(ResourceError::OutOfRange {
                resource: ResourceKind::VirtualMemory,
                value: region.addr as u64,
            });
        }
        let clash = self
            .regions
            .range(..region.end())
            .next_back()
            .map_or(false, |(_, r)| r.overlaps(region.addr, region.size));
        if clash {
            return Err(ResourceError::Unavailable {
                resource: ResourceKind::VirtualMemory,
                base: region.addr as u64,
                count: region.size as u64,
            });
        }
        self.regions.insert(region.addr, region);
        Ok(())
    }

    /// Removes the region starting exactly at `addr`.
    pub fn remove(&mut self, addr: usize) -> Option<Region> {
        self.regions.remove(&addr)
    }

    /// Region starting exactly at `addr`
    pub fn get(&self, addr: usize) -> Option<&Region> {
        self.regions.get(&addr)
    }

    /// Region covering `addr`, if any
    pub fn find_containing(&self, addr: usize) -> Option<&Region> {
        self.regions
            .range(..=addr)
            .next_back()
            .map(|(_, r)| r)
            .filter(|r| r.contains(addr))
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    /// Removes every region, lowest address first.
    pub fn drain(&mut self) -> Vec<Region> {
        std::mem::take(&mut self.regions).into_values().collect()
    }

    /// Total bytes currently mapped
    pub fn mapped_bytes(&self) -> usize {
        self.regions.values().map(|r| r.size).sum()
    }

    /// Bytes of the window not covered by a region
    pub fn free_bytes(&self) -> usize {
        (self.limit - self.base).saturating_sub(self.mapped_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::PAGE_SIZE;

    fn data(addr: usize, size: usize) -> Region {
        Region::new(addr, size, MemoryPerms::read_write(), RegionKind::Data)
    }

    #[test]
    fn test_first_fit_placement() {
        let mut map = RegionList::new(0x1000, 0x10000);
        let a = map.find_free(0x2000).unwrap();
        assert_eq!(a, 0x1000);
        map.insert(data(a, 0x2000)).unwrap();

        let b = map.find_free(1).unwrap();
        assert_eq!(b, 0x3000);
        map.insert(data(b, PAGE_SIZE)).unwrap();

        map.remove(a);
        assert_eq!(map.find_free(0x1000).unwrap(), 0x1000);
        assert_eq!(map.find_free(0x3000).unwrap(), 0x4000);
    }

    #[test]
    fn test_huge_request_is_exhausted() {
        let mut map = RegionList::new(0x1000, 0x10000);
        assert!(matches!(
            map.find_free(usize::MAX),
            Err(ResourceError::Exhausted { .. })
        ));
        map.insert(data(0x1000, 0x2000)).unwrap();
        map.insert(data(0x4000, 0x1000)).unwrap();
        assert!(matches!(
            map.find_free(usize::MAX & !(PAGE_SIZE - 1)),
            Err(ResourceError::Exhausted { .. })
        ));
        assert_eq!(map.find_free(PAGE_SIZE).unwrap(), 0x3000);
    }

    #[test]
    fn test_overlap_rejected() {
        let mut map = RegionList::new(0x1000, 0x10000);
        map.insert(data(0x2000, 0x2000)).unwrap();
        assert!(matches!(
            map.insert(data(0x3000, 0x1000)),
            Err(ResourceError::Unavailable { .. })
        ));
        assert!(matches!(
            map.insert(data(0x1000, 0x2000)),
            Err(ResourceError::Unavailable { .. })
        ));
        assert!(map.insert(data(0x1000, 0x1000)).is_ok());
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_window_enforced() {
        let mut map = RegionList::new(0x1000, 0x4000);
        assert!(matches!(
            map.insert(data(0x0, 0x1000)),
            Err(ResourceError::OutOfRange { .. })
        ));
        assert!(matches!(
            map.insert(data(0x3000, 0x2000)),
            Err(ResourceError::OutOfRange { .. })
        ));
        assert!(matches!(
            map.insert(data(0x1800, 0x1000)),
            Err(ResourceError::OutOfRange { .. })
        ));
        assert!(matches!(
            map.find_free(0x4000),
            Err(ResourceError::Exhausted { .. })
        ));
    }

    #[test]
    fn test_find_containing() {
        let mut map = RegionList::new(0x1000, 0x10000);
        map.insert(data(0x4000, 0x2000)).unwrap();
        assert_eq!(map.find_containing(0x5fff).map(|r| r.addr), Some(0x4000));
        assert!(map.find_containing(0x6000).is_none());
        assert!(map.find_containing(0x3fff).is_none());
    }

    #[test]
    fn test_drain_and_accounting() {
        let mut map = RegionList::new(0x1000, 0x10000);
        map.insert(data(0x2000, 0x1000)).unwrap();
        map.insert(
            Region::new(0x1000, 0x1000, MemoryPerms::read_only(), RegionKind::Hip)
                .with_backing(CapSel::new(7)),
        )
        .unwrap();
        assert_eq!(map.mapped_bytes(), 0x2000);

        let drained = map.drain();
        assert_eq!(drained[0].kind, RegionKind::Hip);
        assert_eq!(drained[0].backing, Some(CapSel::new(7)));
        assert!(map.is_empty());
    }
}
