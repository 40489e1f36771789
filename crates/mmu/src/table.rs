//! One page table node: 512 packed entries filling exactly one frame.

use crate::addr::ENTRIES_PER_TABLE;
use crate::entry::{PageTableEntry, Pte};

/// A 4KB-aligned page table with 512 entries.
#[derive(Clone)]
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageTableEntry; ENTRIES_PER_TABLE],
}

/// Shared view of a frame nobody has written yet.
pub static ZERO_TABLE: PageTable = PageTable::new();

impl PageTable {
    /// Create a new empty page table.
    pub const fn new() -> Self {
        Self {
            entries: [PageTableEntry::empty(); ENTRIES_PER_TABLE],
        }
    }

    /// Zero all entries.
    pub fn zero(&mut self) {
        for entry in &mut self.entries {
            entry.clear();
        }
    }

    /// Get entry at index.
    #[inline]
    pub fn entry(&self, index: usize) -> &PageTableEntry {
        &self.entries[index]
    }

    /// Get mutable entry at index.
    #[inline]
    pub fn entry_mut(&mut self, index: usize) -> &mut PageTableEntry {
        &mut self.entries[index]
    }

    /// Decode the entry at `index` as seen from `level`.
    #[inline]
    pub fn read(&self, index: usize, level: usize) -> Pte {
        self.entries[index].decode(level)
    }

    /// Check if all entries in the table are invalid.
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|e| !e.is_valid())
    }

    /// Number of valid entries.
    pub fn valid_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_valid()).count()
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::new()
    }
}
