//! Collaborators the page table engine is built against.
//!
//! The engine never touches memory or hands out frames on its own. A kernel
//! plugs in its frame allocator and its physical-to-virtual window; tests
//! plug in [`crate::sim`].

use crate::addr::Ppn;
use crate::table::PageTable;

/// Source of fresh physical frames for intermediate tables.
pub trait PageAllocator: Send + Sync {
    /// Allocate a previously unused 4KB frame.
    ///
    /// Returns `None` when exhausted. Must never return
    /// [`NO_MAPPING`](crate::addr::NO_MAPPING). The engine zeroes the frame
    /// before linking it and never hands it back.
    fn alloc_frame(&self) -> Option<Ppn>;
}

impl<A: PageAllocator + ?Sized> PageAllocator for &A {
    fn alloc_frame(&self) -> Option<Ppn> {
        (**self).alloc_frame()
    }
}

/// Direct access to the page table stored in a physical frame.
///
/// Both methods always succeed: any frame number yields a view.
pub trait PhysMemory {
    /// Read view of the 512 entries in `frame`.
    fn table(&self, frame: Ppn) -> &PageTable;

    /// Write view of the 512 entries in `frame`.
    fn table_mut(&mut self, frame: Ppn) -> &mut PageTable;
}

impl<M: PhysMemory + ?Sized> PhysMemory for &mut M {
    fn table(&self, frame: Ppn) -> &PageTable {
        (**self).table(frame)
    }

    fn table_mut(&mut self, frame: Ppn) -> &mut PageTable {
        (**self).table_mut(frame)
    }
}
