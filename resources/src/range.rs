//! First-fit range allocator shared by the selector and port spaces.

use std::collections::BTreeMap;

/// Free list of half-open ranges `[start, start + len)`, kept coalesced.
#[derive(Debug)]
pub(crate) struct RangeAllocator {
    base: u64,
    size: u64,
    free: BTreeMap<u64, u64>,
    available: u64,
}

impl RangeAllocator {
    pub(crate) fn new(base: u64, size: u64) -> Self {
        let mut free = BTreeMap::new();
        if size > 0 {
            free.insert(base, size);
        }
        Self {
            base,
            size,
            free,
            available: size,
        }
    }

    pub(crate) fn available(&self) -> u64 {
        self.available
    }

    pub(crate) fn contains(&self, start: u64, count: u64) -> bool {
        start >= self.base
            && start
                .checked_add(count)
                .map_or(false, |end| end <= self.base + self.size)
    }

    /// Takes the first free range that fits `count` items.
    pub(crate) fn allocate(&mut self, count: u64) -> Option<u64> {
        if count == 0 {
            return None;
        }
        let (start, len) = self
            .free
            .iter()
            .find(|(_, len)| **len >= count)
            .map(|(start, len)| (*start, *len))?;
        self.free.remove(&start);
        if len > count {
            self.free.insert(start + count, len - count);
        }
        self.available -= count;
        Some(start)
    }

    /// Takes exactly `[start, start + count)` if all of it is free.
    pub(crate) fn allocate_at(&mut self, start: u64, count: u64) -> bool {
        if count == 0 || !self.contains(start, count) {
            return false;
        }
        let Some((&free_start, &free_len)) = self.free.range(..=start).next_back() else {
            return false;
        };
        let free_end = free_start + free_len;
        let end = start + count;
        if end > free_end {
            return false;
        }
        self.free.remove(&free_start);
        if free_start < start {
            self.free.insert(free_start, start - free_start);
        }
        if end < free_end {
            self.free.insert(end, free_end - end);
        }
        self.available -= count;
        true
    }

    /// Returns `[start, start + count)` to the free list.
    ///
    /// Fails without changing anything if any part of the range is already
    /// free or lies outside the managed space.
    pub(crate) fn release(&mut self, start: u64, count: u64) -> bool {
        if count == 0 || !self.contains(start, count) {
            return false;
        }
        let end = start + count;
        if let Some((&prev_start, &prev_len)) = self.free.range(..=start).next_back() {
            if prev_start + prev_len > start {
                return false;
            }
        }
        if let Some((&next_start, _)) = self.free.range(start..).next() {
            if next_start < end {
                return false;
            }
        }

        let mut new_start = start;
        let mut new_len = count;
        if let Some((&prev_start, &prev_len)) = self.free.range(..start).next_back() {
            if prev_start + prev_len == start {
                self.free.remove(&prev_start);
                new_start = prev_start;
                new_len += prev_len;
            }
        }
        if let Some(next_len) = self.free.remove(&end) {
            new_len += next_len;
        }
        self.free.insert(new_start, new_len);
        self.available += count;
        true
    }
}
