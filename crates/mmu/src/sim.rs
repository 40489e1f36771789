//! Simulated physical memory and a bump frame allocator.
//!
//! Lets the engine run on the host: frames are boxed tables in a sparse map,
//! materialized the first time they are written.

use alloc::boxed::Box;
use core::sync::atomic::{AtomicU64, Ordering};

use pw_utils::HashMap;

use crate::addr::Ppn;
use crate::engine::PageTableEngine;
use crate::table::{PageTable, ZERO_TABLE};
use crate::traits::{PageAllocator, PhysMemory};

/// Configuration of the simulated frame allocator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimConfig {
    /// First frame handed out. Frame 0 is kept back by default.
    pub first_frame: u64,
    /// Maximum number of frames to hand out, `None` for unlimited.
    pub frame_limit: Option<u64>,
}

impl SimConfig {
    pub const fn new() -> Self {
        Self {
            first_frame: 1,
            frame_limit: None,
        }
    }

    pub const fn with_first_frame(mut self, first_frame: u64) -> Self {
        self.first_frame = first_frame;
        self
    }

    pub const fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Memory
// ============================================================================

/// Sparse physical memory holding page tables.
#[derive(Default)]
pub struct SimMemory {
    frames: HashMap<Ppn, Box<PageTable>>,
}

impl SimMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames that have been written at least once.
    pub fn materialized(&self) -> usize {
        self.frames.len()
    }

    pub fn contains(&self, frame: Ppn) -> bool {
        self.frames.contains_key(&frame)
    }

    /// Raw packed entry, for layout checks.
    pub fn raw_entry(&self, frame: Ppn, index: usize) -> u64 {
        self.table(frame).entry(index).bits()
    }
}

impl PhysMemory for SimMemory {
    fn table(&self, frame: Ppn) -> &PageTable {
        match self.frames.get(&frame) {
            Some(table) => &**table,
            None => &ZERO_TABLE,
        }
    }

    fn table_mut(&mut self, frame: Ppn) -> &mut PageTable {
        self.frames
            .entry(frame)
            .or_insert_with(|| Box::new(PageTable::new()))
    }
}

// ============================================================================
// Allocator
// ============================================================================

/// Hands out consecutive frames starting at `first_frame`. Never reuses.
pub struct BumpFrameAllocator {
    next: AtomicU64,
    first: u64,
    limit: Option<u64>,
}

impl BumpFrameAllocator {
    pub const fn new(config: SimConfig) -> Self {
        Self {
            next: AtomicU64::new(config.first_frame),
            first: config.first_frame,
            limit: config.frame_limit,
        }
    }

    /// Frames handed out so far.
    pub fn allocated(&self) -> u64 {
        self.next.load(Ordering::SeqCst) - self.first
    }

    /// Frames still available, `None` when unlimited.
    pub fn remaining(&self) -> Option<u64> {
        self.limit.map(|limit| limit.saturating_sub(self.allocated()))
    }
}

impl PageAllocator for BumpFrameAllocator {
    fn alloc_frame(&self) -> Option<Ppn> {
        self.next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |next| {
                let under_limit = match self.limit {
                    Some(limit) => next - self.first < limit,
                    None => true,
                };
                (under_limit && next <= Ppn::MAX.raw()).then_some(next + 1)
            })
            .ok()
            .map(Ppn::new)
    }
}

impl PageTableEngine<SimMemory, BumpFrameAllocator> {
    /// Engine over fresh simulated memory.
    pub fn simulated(config: SimConfig) -> Self {
        Self::new(SimMemory::new(), BumpFrameAllocator::new(config))
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::entry::Pte;

    #[test]
    fn test_unwritten_frame_reads_zero() {
        let mem = SimMemory::new();
        assert!(mem.table(Ppn::new(12345)).is_empty());
        assert_eq!(mem.materialized(), 0);
        assert!(!mem.contains(Ppn::new(12345)));
    }

    #[test]
    fn test_write_materializes_frame() {
        let mut mem = SimMemory::new();
        mem.table_mut(Ppn::new(3))
            .entry_mut(1)
            .set(Pte::Leaf(Ppn::new(8)));
        assert_eq!(mem.materialized(), 1);
        assert_eq!(mem.raw_entry(Ppn::new(3), 1), (8 << 12) | 1);
        // Other frames untouched
        assert!(mem.table(Ppn::new(4)).is_empty());
    }

    #[test]
    fn test_bump_sequential() {
        let frames = BumpFrameAllocator::new(SimConfig::default());
        assert_eq!(frames.alloc_frame(), Some(Ppn::new(1)));
        assert_eq!(frames.alloc_frame(), Some(Ppn::new(2)));
        assert_eq!(frames.allocated(), 2);
        assert_eq!(frames.remaining(), None);
    }

    #[test]
    fn test_bump_limit() {
        let frames = BumpFrameAllocator::new(
            SimConfig::new().with_first_frame(0x100).with_frame_limit(2),
        );
        assert_eq!(frames.alloc_frame(), Some(Ppn::new(0x100)));
        assert_eq!(frames.remaining(), Some(1));
        assert_eq!(frames.alloc_frame(), Some(Ppn::new(0x101)));
        assert_eq!(frames.alloc_frame(), None);
        assert_eq!(frames.alloc_frame(), None);
        assert_eq!(frames.allocated(), 2);
    }

    #[test]
    fn test_bump_stops_at_widest_ppn() {
        let frames = BumpFrameAllocator::new(SimConfig::new().with_first_frame(Ppn::MAX.raw()));
        assert_eq!(frames.alloc_frame(), Some(Ppn::MAX));
        assert_eq!(frames.alloc_frame(), None);
    }

    #[test]
    fn test_bump_concurrent_unique() {
        use std::collections::HashSet;
        use std::sync::Arc;
        use std::thread;

        let frames = Arc::new(BumpFrameAllocator::new(SimConfig::default()));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let frames = Arc::clone(&frames);
                thread::spawn(move || {
                    (0..256)
                        .filter_map(|_| frames.alloc_frame())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for frame in h.join().expect("thread") {
                assert!(seen.insert(frame));
            }
        }
        assert_eq!(seen.len(), 1024);
        assert_eq!(frames.allocated(), 1024);
    }
}
