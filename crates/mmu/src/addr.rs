//! Page numbers and address decomposition.
//!
//! A 64-bit virtual address is split as:
//!
//! ```text
//! |63  sign ext  57|56        VPN (45)        12|11  offset  0|
//! ```
//!
//! The 45-bit VPN is consumed 9 bits per level, level 4 first.

use core::fmt;

// ============================================================================
// Constants
// ============================================================================

/// Page shift (log2 of page size)
pub const PAGE_SHIFT: u32 = 12;
/// Page size: 4KB, not configurable
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;
/// Mask of the in-page byte offset
pub const PAGE_OFFSET_MASK: u64 = (1 << PAGE_SHIFT) - 1;

/// Bits of VPN consumed per level
pub const INDEX_BITS: u32 = 9;
/// Mask of one level index
pub const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;
/// Entries per page table (4KB / 8-byte entries)
pub const ENTRIES_PER_TABLE: usize = 1 << INDEX_BITS;

/// Number of levels in the tree
pub const LEVELS: usize = 5;
/// Level of the root table
pub const ROOT_LEVEL: usize = LEVELS - 1;
/// Level whose entries hold the mapped PPN
pub const LEAF_LEVEL: usize = 0;

/// Significant VPN bits (5 levels x 9 bits)
pub const VPN_BITS: u32 = INDEX_BITS * LEVELS as u32;
/// Width of the target field of an entry, bits [63:12]
pub const PPN_BITS: u32 = u64::BITS - PAGE_SHIFT;

// ============================================================================
// Virtual Page Number
// ============================================================================

/// A virtual page number.
///
/// Only the low 45 bits take part in translation. Higher bits are carried
/// along untouched and ignored by [`Vpn::index`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Vpn(u64);

impl Vpn {
    /// Mask of the significant bits.
    pub const MASK: u64 = (1 << VPN_BITS) - 1;

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Page number of a 64-bit virtual address (sign extension and offset dropped).
    pub const fn from_va(va: u64) -> Self {
        Self((va >> PAGE_SHIFT) & Self::MASK)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    /// The VPN with the ignored high bits cleared.
    pub const fn significant(self) -> u64 {
        self.0 & Self::MASK
    }

    /// Table index used at `level` (0 = leaf, 4 = root).
    #[inline]
    pub const fn index(self, level: usize) -> usize {
        debug_assert!(level < LEVELS);
        let shift = INDEX_BITS as usize * level;
        ((self.0 & (INDEX_MASK << shift)) >> shift) as usize
    }

    /// Indices for every level, `[level 0, .., level 4]`.
    pub fn indices(self) -> [usize; LEVELS] {
        core::array::from_fn(|level| self.index(level))
    }
}

impl From<u64> for Vpn {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::LowerHex for Vpn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl fmt::Display for Vpn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

// ============================================================================
// Physical Page Number
// ============================================================================

/// A physical page number. Also names the frame a table lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Ppn(u64);

/// Sentinel meaning "no mapping". All ones, so it never fits the 52-bit
/// target field and can never be decoded from an entry.
pub const NO_MAPPING: Ppn = Ppn(u64::MAX);

impl Ppn {
    /// Largest PPN an entry can hold.
    pub const MAX: Ppn = Ppn((1 << PPN_BITS) - 1);

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_no_mapping(self) -> bool {
        self.0 == NO_MAPPING.0
    }

    /// Whether the value survives the `<< 12` packing into an entry.
    #[inline]
    pub const fn fits_entry(self) -> bool {
        self.0 <= Self::MAX.0
    }

    /// `None` for the sentinel.
    pub const fn mapping(self) -> Option<Ppn> {
        if self.is_no_mapping() { None } else { Some(self) }
    }

    /// Physical byte address of the first byte of this page.
    pub const fn address(self) -> u64 {
        self.0 << PAGE_SHIFT
    }
}

impl From<u64> for Ppn {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<Option<Ppn>> for Ppn {
    fn from(ppn: Option<Ppn>) -> Self {
        ppn.unwrap_or(NO_MAPPING)
    }
}

impl fmt::LowerHex for Ppn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl fmt::Display for Ppn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_no_mapping() {
            f.write_str("none")
        } else {
            write!(f, "{:#x}", self.0)
        }
    }
}

/// Split a virtual address into its page number and in-page offset.
#[inline]
pub const fn split_va(va: u64) -> (Vpn, u64) {
    (Vpn::from_va(va), va & PAGE_OFFSET_MASK)
}
