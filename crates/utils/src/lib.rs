#![cfg_attr(not(feature = "std"), no_std)]

pub mod num;

// spin types are the lock API for every crate in the workspace.
pub use spin::{Mutex, MutexGuard};

pub use hashbrown::HashMap;
