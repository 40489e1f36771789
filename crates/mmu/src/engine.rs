//! Five-level page table walk: update and query.
//!
//! Every operation descends from a caller-supplied root frame, level 4 to
//! level 0, visiting at most five tables. Missing intermediate tables are
//! created on insert. Nothing is ever freed: clearing the last leaf under a
//! table leaves the table (and its ancestors) linked in.

use log::{debug, trace, warn};

use crate::MmuError;
use crate::addr::{LEAF_LEVEL, LEVELS, NO_MAPPING, Ppn, ROOT_LEVEL, Vpn, split_va};
use crate::entry::Pte;
use crate::traits::{PageAllocator, PhysMemory};

// ============================================================================
// Walk record
// ============================================================================

/// One level visited by [`walk`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WalkStep {
    /// Level of `table` (4 = root).
    pub level: usize,
    /// Frame holding the table.
    pub table: Ppn,
    /// Index used inside `table`.
    pub index: usize,
    /// Decoded entry found there.
    pub entry: Pte,
}

/// Path taken through the tree for one VPN.
///
/// `steps[0]` is the root. The walk stops at the first invalid entry, so a
/// complete translation has five steps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Walk {
    steps: [Option<WalkStep>; LEVELS],
    len: usize,
}

impl Walk {
    fn new() -> Self {
        Self {
            steps: [None; LEVELS],
            len: 0,
        }
    }

    fn push(&mut self, step: WalkStep) {
        self.steps[self.len] = Some(step);
        self.len += 1;
    }

    pub fn steps(&self) -> impl Iterator<Item = &WalkStep> {
        self.steps.iter().flatten()
    }

    /// Number of tables visited.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Frames of every table visited, root first.
    pub fn tables(&self) -> impl Iterator<Item = Ppn> + '_ {
        self.steps().map(|step| step.table)
    }

    /// Mapped PPN, or [`NO_MAPPING`] if the walk stopped early.
    pub fn ppn(&self) -> Ppn {
        match self.steps().last() {
            Some(WalkStep {
                entry: Pte::Leaf(ppn),
                ..
            }) => *ppn,
            _ => NO_MAPPING,
        }
    }
}

// ============================================================================
// Operations
// ============================================================================

/// Allocate and zero a table frame.
fn alloc_table<M, A>(mem: &mut M, frames: &A) -> Result<Ppn, MmuError>
where
    M: PhysMemory + ?Sized,
    A: PageAllocator + ?Sized,
{
    let Some(frame) = frames.alloc_frame() else {
        warn!("mmu: frame allocator exhausted");
        return Err(MmuError::AllocationFailed);
    };
    if frame.is_no_mapping() || !frame.fits_entry() {
        warn!("mmu: allocator returned unusable frame {frame:#x}");
        return Err(MmuError::InvalidFrame);
    }

    mem.table_mut(frame).zero();
    Ok(frame)
}

/// Map `vpn` to `ppn` under `root`, or remove the mapping if `ppn` is
/// [`NO_MAPPING`].
///
/// Creates missing tables on the way down (at most four). Removal never
/// allocates: it returns as soon as it meets a missing table. On allocation
/// failure the tables linked so far stay in place.
pub fn update<M, A>(mem: &mut M, frames: &A, root: Ppn, vpn: Vpn, ppn: Ppn) -> Result<(), MmuError>
where
    M: PhysMemory + ?Sized,
    A: PageAllocator + ?Sized,
{
    let remove = ppn.is_no_mapping();
    if !remove && !ppn.fits_entry() {
        return Err(MmuError::PpnOutOfRange);
    }

    let mut table = root;
    for level in (LEAF_LEVEL + 1..LEVELS).rev() {
        let index = vpn.index(level);

        if let Pte::NextLevel(child) = mem.table(table).read(index, level) {
            table = child;
            continue;
        }

        if remove {
            // Nothing mapped below here
            return Ok(());
        }

        let child = alloc_table(mem, frames)?;
        mem.table_mut(table)
            .entry_mut(index)
            .set(Pte::NextLevel(child));
        trace!("mmu: L{} table {child:#x} linked at {table:#x}[{index}]", level - 1);
        table = child;
    }

    let leaf = if remove { Pte::Invalid } else { Pte::Leaf(ppn) };
    mem.table_mut(table)
        .entry_mut(vpn.index(LEAF_LEVEL))
        .set(leaf);
    debug!("mmu: {vpn} -> {ppn} (root {root:#x})");

    Ok(())
}

/// Translate `vpn` under `root`. Returns [`NO_MAPPING`] if any level is
/// missing. Never allocates or writes.
pub fn query<M>(mem: &M, root: Ppn, vpn: Vpn) -> Ppn
where
    M: PhysMemory + ?Sized,
{
    let mut table = root;
    for level in (LEAF_LEVEL..LEVELS).rev() {
        match mem.table(table).read(vpn.index(level), level) {
            Pte::Invalid => return NO_MAPPING,
            Pte::NextLevel(child) => table = child,
            Pte::Leaf(ppn) => return ppn,
        }
    }
    NO_MAPPING
}

/// Same descent as [`query`], recording every table visited.
pub fn walk<M>(mem: &M, root: Ppn, vpn: Vpn) -> Walk
where
    M: PhysMemory + ?Sized,
{
    let mut record = Walk::new();
    let mut table = root;
    for level in (LEAF_LEVEL..LEVELS).rev() {
        let index = vpn.index(level);
        let entry = mem.table(table).read(index, level);
        record.push(WalkStep {
            level,
            table,
            index,
            entry,
        });
        match entry {
            Pte::NextLevel(child) => table = child,
            Pte::Invalid | Pte::Leaf(_) => break,
        }
    }
    record
}

// ============================================================================
// Engine
// ============================================================================

/// A physical memory plus the allocator that feeds it tables.
///
/// One engine serves any number of page tables; each call names its root.
/// Not synchronized: wrap in [`crate::sync::LockedEngine`] to share.
pub struct PageTableEngine<M, A> {
    memory: M,
    frames: A,
}

impl<M: PhysMemory, A: PageAllocator> PageTableEngine<M, A> {
    pub const fn new(memory: M, frames: A) -> Self {
        Self { memory, frames }
    }

    /// Allocate a zeroed table to serve as the root of a new page table.
    ///
    /// The caller owns the returned frame; the engine keeps no record of it.
    pub fn new_root(&mut self) -> Result<Ppn, MmuError> {
        let root = alloc_table(&mut self.memory, &self.frames)?;
        trace!("mmu: L{ROOT_LEVEL} root table {root:#x}");
        Ok(root)
    }

    /// See [`update`].
    pub fn update(&mut self, root: Ppn, vpn: Vpn, ppn: Ppn) -> Result<(), MmuError> {
        update(&mut self.memory, &self.frames, root, vpn, ppn)
    }

    /// See [`query`].
    pub fn query(&self, root: Ppn, vpn: Vpn) -> Ppn {
        query(&self.memory, root, vpn)
    }

    /// Insert or overwrite a mapping. Rejects the removal sentinel.
    pub fn map(&mut self, root: Ppn, vpn: Vpn, ppn: Ppn) -> Result<(), MmuError> {
        if ppn.is_no_mapping() {
            return Err(MmuError::PpnOutOfRange);
        }
        self.update(root, vpn, ppn)
    }

    /// Remove a mapping if present.
    pub fn unmap(&mut self, root: Ppn, vpn: Vpn) -> Result<(), MmuError> {
        self.update(root, vpn, NO_MAPPING)
    }

    pub fn translate(&self, root: Ppn, vpn: Vpn) -> Option<Ppn> {
        self.query(root, vpn).mapping()
    }

    /// Translate a full virtual address to a physical byte address.
    pub fn translate_address(&self, root: Ppn, va: u64) -> Option<u64> {
        let (vpn, offset) = split_va(va);
        self.translate(root, vpn)
            .map(|ppn| ppn.address() | offset)
    }

    /// See [`walk`].
    pub fn walk(&self, root: Ppn, vpn: Vpn) -> Walk {
        walk(&self.memory, root, vpn)
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn frames(&self) -> &A {
        &self.frames
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::sim::{BumpFrameAllocator, SimConfig, SimMemory};
    use core::sync::atomic::{AtomicUsize, Ordering};

    fn engine() -> (PageTableEngine<SimMemory, BumpFrameAllocator>, Ppn) {
        let mut engine = PageTableEngine::simulated(SimConfig::default());
        let root = engine.new_root().expect("root");
        (engine, root)
    }

    #[test]
    fn test_cold_query() {
        let (engine, root) = engine();
        assert_eq!(engine.query(root, Vpn::new(0)), NO_MAPPING);
        assert_eq!(engine.query(root, Vpn::new(Vpn::MASK)), NO_MAPPING);
        assert_eq!(engine.frames().allocated(), 1); // root only
    }

    #[test]
    fn test_first_insert_allocates_four_tables() {
        let (mut engine, root) = engine();
        engine.update(root, Vpn::new(0x1_0000_0000), Ppn::new(5)).expect("update");
        assert_eq!(engine.frames().allocated(), 1 + 4);
        assert_eq!(engine.query(root, Vpn::new(0x1_0000_0000)), Ppn::new(5));
    }

    #[test]
    fn test_leaf_entry_bits() {
        let (mut engine, root) = engine();
        let vpn = Vpn::new(0x1_0000_0000);
        engine.update(root, vpn, Ppn::new(5)).expect("update");

        let walk = engine.walk(root, vpn);
        let leaf = walk.steps().last().expect("leaf step");
        let raw = engine.memory().table(leaf.table).entry(leaf.index).bits();
        assert_eq!(raw, (5 << 12) | 1);
    }

    #[test]
    fn test_remove_absent_does_not_allocate() {
        let (mut engine, root) = engine();
        engine.update(root, Vpn::new(0x42), NO_MAPPING).expect("remove");
        assert_eq!(engine.frames().allocated(), 1);
        assert!(engine.memory().table(root).is_empty());
    }

    #[test]
    fn test_remove_keeps_tables() {
        let (mut engine, root) = engine();
        let vpn = Vpn::new(0x1234);
        engine.map(root, vpn, Ppn::new(9)).expect("map");
        let before = engine.walk(root, vpn);

        engine.unmap(root, vpn).expect("unmap");
        let after = engine.walk(root, vpn);

        assert_eq!(engine.query(root, vpn), NO_MAPPING);
        assert_eq!(after.len(), LEVELS);
        assert!(before.tables().eq(after.tables()));
        assert_eq!(after.ppn(), NO_MAPPING);
        assert_eq!(after.steps().last().map(|s| s.entry), Some(Pte::Invalid));
    }

    #[test]
    fn test_walk_stops_at_missing_table() {
        let (engine, root) = engine();
        let walk = engine.walk(root, Vpn::new(0x1_0000_0000));
        assert_eq!(walk.len(), 1);
        let step = walk.steps().next().expect("root step");
        assert_eq!(step.level, ROOT_LEVEL);
        assert_eq!(step.table, root);
        assert_eq!(step.entry, Pte::Invalid);
    }

    #[test]
    fn test_map_rejects_sentinel() {
        let (mut engine, root) = engine();
        assert_eq!(
            engine.map(root, Vpn::new(1), NO_MAPPING),
            Err(MmuError::PpnOutOfRange)
        );
    }

    #[test]
    fn test_ppn_too_wide_rejected_before_walk() {
        let (mut engine, root) = engine();
        let wide = Ppn::new(Ppn::MAX.raw() + 1);
        assert_eq!(
            engine.update(root, Vpn::new(1), wide),
            Err(MmuError::PpnOutOfRange)
        );
        assert_eq!(engine.frames().allocated(), 1);
    }

    #[test]
    fn test_translate_address() {
        let (mut engine, root) = engine();
        let va = 0x0000_1234_5678_9ABC_u64;
        let (vpn, _) = split_va(va);
        engine.map(root, vpn, Ppn::new(0x77)).expect("map");
        assert_eq!(engine.translate_address(root, va), Some((0x77 << 12) | 0xABC));
        assert_eq!(engine.translate_address(root, va + 0x1000), None);
    }

    /// Allocator that fails after a fixed number of frames
    struct Limited {
        left: AtomicUsize,
        next: AtomicUsize,
    }

    impl PageAllocator for Limited {
        fn alloc_frame(&self) -> Option<Ppn> {
            self.left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .ok()
                .map(|_| Ppn::new(self.next.fetch_add(1, Ordering::SeqCst) as u64))
        }
    }

    #[test]
    fn test_exhaustion_leaves_partial_path() {
        let frames = Limited {
            left: AtomicUsize::new(2),
            next: AtomicUsize::new(100),
        };
        let mut mem = SimMemory::new();
        let root = Ppn::new(1);
        let vpn = Vpn::new(0x1_0000_0000);

        assert_eq!(
            update(&mut mem, &frames, root, vpn, Ppn::new(5)),
            Err(MmuError::AllocationFailed)
        );
        // L3 and L2 tables got linked before the allocator ran dry
        let walk = walk(&mem, root, vpn);
        assert_eq!(walk.len(), 3);
        assert_eq!(walk.ppn(), NO_MAPPING);
        assert_eq!(query(&mem, root, vpn), NO_MAPPING);
    }

    /// Allocator that always hands out the same frame
    struct Fixed(Ppn);

    impl PageAllocator for Fixed {
        fn alloc_frame(&self) -> Option<Ppn> {
            Some(self.0)
        }
    }

    #[test]
    fn test_sentinel_frame_rejected() {
        let mut mem = SimMemory::new();
        assert_eq!(
            update(&mut mem, &Fixed(NO_MAPPING), Ppn::new(1), Vpn::new(0), Ppn::new(1)),
            Err(MmuError::InvalidFrame)
        );
        assert!(mem.table(Ppn::new(1)).is_empty());
    }

    #[test]
    fn test_frame_too_wide_rejected() {
        let mut mem = SimMemory::new();
        let wide = Fixed(Ppn::new(Ppn::MAX.raw() + 1));
        assert_eq!(
            update(&mut mem, &wide, Ppn::new(1), Vpn::new(0), Ppn::new(1)),
            Err(MmuError::InvalidFrame)
        );
        assert!(mem.table(Ppn::new(1)).is_empty());
        assert!(!mem.contains(wide.0));
    }
}
