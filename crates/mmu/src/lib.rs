#![cfg_attr(not(feature = "std"), no_std)]

//! Five-level radix page table.
//!
//! Translates a 45-bit virtual page number into a physical page number by
//! walking up to five 512-entry tables, each occupying one physical frame.
//! The tables live in memory reached through [`traits::PhysMemory`]; new
//! intermediate tables come from a [`traits::PageAllocator`].
//!
//! Unit tests are gated on `std`. Run with: `cargo test -p pw_mmu --features std`

extern crate alloc;

pub mod addr;
pub mod engine;
pub mod entry;
pub mod sim;
pub mod sync;
pub mod table;
pub mod traits;

pub use addr::{NO_MAPPING, Ppn, Vpn};
pub use engine::{PageTableEngine, Walk, WalkStep, query, update, walk};
pub use entry::{PageTableEntry, Pte};
pub use sim::{BumpFrameAllocator, SimConfig, SimMemory};
pub use sync::LockedEngine;
pub use table::PageTable;
pub use traits::{PageAllocator, PhysMemory};

use pw_error::define_error;

define_error! {
    /// Page table engine errors (subsystem 0x01).
    pub enum MmuError(0x01) {
        /// Frame allocator exhausted while creating an intermediate table
        AllocationFailed = 0x01 => "Page table allocation failed",
        /// Frame allocator returned the sentinel or a frame too wide for an entry
        InvalidFrame = 0x02 => "Allocator returned an unusable frame",
        /// PPN does not fit the 52-bit target field
        PpnOutOfRange = 0x03 => "Physical page number out of range",
    }
}
