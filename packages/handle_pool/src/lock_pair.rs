use std::num::NonZero;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::SlotRegistry;

/// The two locks of a handle pool.
///
/// * `concurrency` gates whether the pool accepts new checkouts at all. Checkouts hold it shared
///   while they mutate the registry, a blockade holds it exclusively for as long as it lasts.
/// * `memory` guards the consistency of the registry itself.
///
/// Whenever both are needed, `concurrency` is acquired first. The only way to reach the memory
/// lock after entering `concurrency` is through the guard that represents having entered it, so
/// the order is enforced by the shape of the API. Paths that only need the registry (returning a
/// handle, purging, statistics) take `memory` alone.
pub(crate) struct LockPair<H, const SLOTS: usize> {
    concurrency: RwLock<()>,
    memory: RwLock<SlotRegistry<H, SLOTS>>,
}

impl<H, const SLOTS: usize> LockPair<H, SLOTS> {
    pub(crate) fn new(max_alive: NonZero<usize>) -> Self {
        Self {
            concurrency: RwLock::new(()),
            memory: RwLock::new(SlotRegistry::new(max_alive)),
        }
    }

    /// Enters the concurrency lock in shared mode without waiting.
    ///
    /// Returns `None` if a blockade holds the lock or is in the process of acquiring it.
    pub(crate) fn try_enter(&self) -> Option<Entered<'_, H, SLOTS>> {
        let concurrency = self.concurrency.try_read()?;

        Some(Entered {
            memory: &self.memory,
            _concurrency: concurrency,
        })
    }

    /// Takes the concurrency lock exclusively, waiting for in-flight checkouts to leave it.
    pub(crate) fn blockade(&self) -> Exclusive<'_, H, SLOTS> {
        Exclusive {
            memory: &self.memory,
            _concurrency: self.concurrency.write(),
        }
    }

    pub(crate) fn is_blockaded(&self) -> bool {
        self.concurrency.is_locked_exclusive()
    }

    pub(crate) fn read_registry(&self) -> RwLockReadGuard<'_, SlotRegistry<H, SLOTS>> {
        self.memory.read()
    }

    pub(crate) fn write_registry(&self) -> RwLockWriteGuard<'_, SlotRegistry<H, SLOTS>> {
        self.memory.write()
    }
}

/// Proof of holding the concurrency lock in shared mode.
pub(crate) struct Entered<'a, H, const SLOTS: usize> {
    memory: &'a RwLock<SlotRegistry<H, SLOTS>>,

    _concurrency: RwLockReadGuard<'a, ()>,
}

impl<'a, H, const SLOTS: usize> Entered<'a, H, SLOTS> {
    pub(crate) fn write_registry(&self) -> RwLockWriteGuard<'a, SlotRegistry<H, SLOTS>> {
        self.memory.write()
    }
}

/// Proof of holding the concurrency lock exclusively.
pub(crate) struct Exclusive<'a, H, const SLOTS: usize> {
    memory: &'a RwLock<SlotRegistry<H, SLOTS>>,

    _concurrency: RwLockWriteGuard<'a, ()>,
}

impl<'a, H, const SLOTS: usize> Exclusive<'a, H, SLOTS> {
    pub(crate) fn read_registry(&self) -> RwLockReadGuard<'a, SlotRegistry<H, SLOTS>> {
        self.memory.read()
    }

    pub(crate) fn write_registry(&self) -> RwLockWriteGuard<'a, SlotRegistry<H, SLOTS>> {
        self.memory.write()
    }
}
