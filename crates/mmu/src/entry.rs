//! Page table entries.
//!
//! In memory an entry is a packed `u64`:
//!
//! ```text
//! |63        target (52)        12|11  reserved  1| V |
//! ```
//!
//! Everything above the codec works with the tagged [`Pte`]. The packed
//! form only exists inside [`PageTable`](crate::table::PageTable).

use bitflags::bitflags;

use crate::addr::{LEAF_LEVEL, PAGE_SHIFT, Ppn};

bitflags! {
    /// Low flag bits of an entry.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PteFlags: u64 {
        /// Entry is valid (bit 0)
        const VALID = 1 << 0;
    }
}

/// Bits [63:12], the target frame or PPN
pub const TARGET_MASK: u64 = !((1 << PAGE_SHIFT) - 1);
/// Bits [11:1], never written by the engine
pub const RESERVED_MASK: u64 = !TARGET_MASK & !PteFlags::VALID.bits();

/// Decoded meaning of an entry at a known level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pte {
    /// Valid bit clear. The target bits are meaningless.
    Invalid,
    /// Levels 4..1: frame of the next table down.
    NextLevel(Ppn),
    /// Level 0: the mapped physical page.
    Leaf(Ppn),
}

impl Pte {
    pub const fn is_valid(self) -> bool {
        !matches!(self, Pte::Invalid)
    }

    /// Frame or PPN the entry points at, if valid.
    pub const fn target(self) -> Option<Ppn> {
        match self {
            Pte::Invalid => None,
            Pte::NextLevel(ppn) | Pte::Leaf(ppn) => Some(ppn),
        }
    }
}

/// A packed 64-bit page table entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct PageTableEntry(u64);

impl PageTableEntry {
    /// Create an empty (invalid) entry.
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        (self.0 & PteFlags::VALID.bits()) != 0
    }

    /// Raw target field, bits [63:12] shifted down.
    #[inline]
    pub const fn target(self) -> Ppn {
        Ppn::new(self.0 >> PAGE_SHIFT)
    }

    #[inline]
    pub fn flags(self) -> PteFlags {
        PteFlags::from_bits_truncate(self.0)
    }

    /// Interpret the entry as it would be at `level`.
    pub const fn decode(self, level: usize) -> Pte {
        if !self.is_valid() {
            Pte::Invalid
        } else if level == LEAF_LEVEL {
            Pte::Leaf(self.target())
        } else {
            Pte::NextLevel(self.target())
        }
    }

    /// Pack a tagged entry. Invalid packs to all-zero.
    pub const fn encode(pte: Pte) -> Self {
        match pte {
            Pte::Invalid => Self::empty(),
            Pte::NextLevel(ppn) | Pte::Leaf(ppn) => {
                debug_assert!(ppn.fits_entry());
                Self((ppn.raw() << PAGE_SHIFT) | PteFlags::VALID.bits())
            }
        }
    }

    /// Overwrite the entry.
    #[inline]
    pub fn set(&mut self, pte: Pte) {
        *self = Self::encode(pte);
    }

    /// Clear the entry.
    #[inline]
    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

impl From<Pte> for PageTableEntry {
    fn from(pte: Pte) -> Self {
        Self::encode(pte)
    }
}
