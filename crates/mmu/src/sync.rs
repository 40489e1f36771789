//! Tree-wide lock around an engine.
//!
//! Creating an intermediate table writes into its parent, so two walks that
//! only share an ancestor can still race. The only safe granularity is the
//! whole memory the engine manages: every call takes the one lock.

use pw_utils::{Mutex, MutexGuard};

use crate::MmuError;
use crate::addr::{Ppn, Vpn};
use crate::engine::PageTableEngine;
use crate::traits::{PageAllocator, PhysMemory};

/// An engine shareable between threads.
pub struct LockedEngine<M, A> {
    inner: Mutex<PageTableEngine<M, A>>,
}

impl<M: PhysMemory, A: PageAllocator> LockedEngine<M, A> {
    pub const fn new(engine: PageTableEngine<M, A>) -> Self {
        Self {
            inner: Mutex::new(engine),
        }
    }

    /// Hold the lock across several operations.
    pub fn lock(&self) -> MutexGuard<'_, PageTableEngine<M, A>> {
        self.inner.lock()
    }

    /// Returns `None` if another context holds the lock.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, PageTableEngine<M, A>>> {
        self.inner.try_lock()
    }

    pub fn new_root(&self) -> Result<Ppn, MmuError> {
        self.inner.lock().new_root()
    }

    pub fn update(&self, root: Ppn, vpn: Vpn, ppn: Ppn) -> Result<(), MmuError> {
        self.inner.lock().update(root, vpn, ppn)
    }

    pub fn query(&self, root: Ppn, vpn: Vpn) -> Ppn {
        self.inner.lock().query(root, vpn)
    }

    pub fn into_inner(self) -> PageTableEngine<M, A> {
        self.inner.into_inner()
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::addr::NO_MAPPING;
    use crate::sim::SimConfig;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_try_lock_while_held() {
        let engine = LockedEngine::new(PageTableEngine::simulated(SimConfig::default()));
        let root = engine.new_root().expect("root");
        {
            let mut guard = engine.lock();
            guard.map(root, Vpn::new(1), Ppn::new(2)).expect("map");
            assert!(engine.try_lock().is_none());
        }
        assert_eq!(engine.query(root, Vpn::new(1)), Ppn::new(2));
    }

    #[test]
    fn test_threads_sharing_one_tree() {
        let engine = Arc::new(LockedEngine::new(PageTableEngine::simulated(
            SimConfig::default(),
        )));
        let root = engine.new_root().expect("root");

        // Neighbouring VPNs share every ancestor table
        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    for i in 0..64u64 {
                        let vpn = Vpn::new(0x1_0000_0000 + t * 64 + i);
                        engine
                            .update(root, vpn, Ppn::new(t * 1000 + i))
                            .expect("update");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread");
        }

        for t in 0..4u64 {
            for i in 0..64u64 {
                let vpn = Vpn::new(0x1_0000_0000 + t * 64 + i);
                assert_eq!(engine.query(root, vpn), Ppn::new(t * 1000 + i));
            }
        }
        let engine = Arc::try_unwrap(engine).ok().expect("sole owner").into_inner();
        // root + one table per level, however the threads interleaved
        assert_eq!(engine.frames().allocated(), 5);
        assert_eq!(engine.query(root, Vpn::new(0x1_0000_0000 + 256)), NO_MAPPING);
    }
}
