use std::collections::HashMap;
use std::num::NonZero;
use std::sync::Arc;

use foldhash::fast::RandomState;

use crate::Slot;

/// Returned by [`SlotRegistry::admit_new()`] when the registry is already at its limit.
#[derive(Debug, Eq, PartialEq)]
pub(crate) struct CapacityReached;

/// Bookkeeping of the handles known to a pool, per slot.
///
/// Every handle the pool has created and not yet destroyed is in the alive set of its slot. The
/// subset that is not currently checked out by any thread is additionally in the free list of the
/// slot. Handles are identified by the address of their allocation.
///
/// The registry never drops handles itself. Anything removed is handed back to the caller so it
/// can be dropped after the registry lock has been released.
pub(crate) struct SlotRegistry<H, const SLOTS: usize> {
    alive: [HashMap<usize, Arc<H>, RandomState>; SLOTS],

    // LIFO - the most recently returned handle is the most likely to still be warm.
    free: [Vec<Arc<H>>; SLOTS],

    max_alive: NonZero<usize>,
}

impl<H, const SLOTS: usize> SlotRegistry<H, SLOTS> {
    pub(crate) fn new(max_alive: NonZero<usize>) -> Self {
        Self {
            alive: std::array::from_fn(|_| HashMap::default()),
            free: std::array::from_fn(|_| Vec::new()),
            max_alive,
        }
    }

    pub(crate) fn max_alive(&self) -> NonZero<usize> {
        self.max_alive
    }

    #[expect(
        clippy::indexing_slicing,
        reason = "the pool rejects out of range slots before they reach the registry"
    )]
    fn alive(&self, slot: Slot) -> &HashMap<usize, Arc<H>, RandomState> {
        &self.alive[slot.index()]
    }

    #[expect(
        clippy::indexing_slicing,
        reason = "the pool rejects out of range slots before they reach the registry"
    )]
    fn alive_mut(&mut self, slot: Slot) -> &mut HashMap<usize, Arc<H>, RandomState> {
        &mut self.alive[slot.index()]
    }

    #[expect(
        clippy::indexing_slicing,
        reason = "the pool rejects out of range slots before they reach the registry"
    )]
    fn free(&self, slot: Slot) -> &[Arc<H>] {
        &self.free[slot.index()]
    }

    #[expect(
        clippy::indexing_slicing,
        reason = "the pool rejects out of range slots before they reach the registry"
    )]
    fn free_mut(&mut self, slot: Slot) -> &mut Vec<Arc<H>> {
        &mut self.free[slot.index()]
    }

    /// Takes a free handle of `slot`, if there is one. The handle stays alive.
    pub(crate) fn acquire_free(&mut self, slot: Slot) -> Option<Arc<H>> {
        self.free_mut(slot).pop()
    }

    /// Whether another handle may be admitted without exceeding the limit.
    pub(crate) fn has_capacity(&self) -> bool {
        self.alive_count() < self.max_alive.get()
    }

    /// Registers a newly created handle as alive (and checked out) in `slot`.
    pub(crate) fn admit_new(
        &mut self,
        slot: Slot,
        handle: &Arc<H>,
    ) -> Result<(), CapacityReached> {
        if !self.has_capacity() {
            return Err(CapacityReached);
        }

        let previous = self.alive_mut(slot).insert(key_of(handle), Arc::clone(handle));
        debug_assert!(previous.is_none(), "handle admitted twice");

        Ok(())
    }

    /// Returns a checked out handle to the free list of `slot`.
    pub(crate) fn release(&mut self, slot: Slot, handle: Arc<H>) {
        debug_assert!(
            self.alive(slot).contains_key(&key_of(&handle)),
            "released handle is not alive in slot {slot}"
        );
        debug_assert!(
            !self.free(slot).iter().any(|free| Arc::ptr_eq(free, &handle)),
            "handle released twice into slot {slot}"
        );

        self.free_mut(slot).push(handle);
    }

    /// Forgets a handle that was taken from the free list but is not going to be handed out.
    pub(crate) fn discard(&mut self, slot: Slot, handle: Arc<H>) -> Arc<H> {
        let removed = self.alive_mut(slot).remove(&key_of(&handle));
        debug_assert!(removed.is_some(), "discarded handle is not alive in slot {slot}");

        handle
    }

    /// Removes every free handle of every slot. Checked out handles are left alone.
    #[must_use]
    pub(crate) fn purge(&mut self) -> Vec<Arc<H>> {
        let mut purged = Vec::new();

        for (alive, free) in self.alive.iter_mut().zip(self.free.iter_mut()) {
            for handle in free.drain(..) {
                alive.remove(&key_of(&handle));
                purged.push(handle);
            }
        }

        purged
    }

    /// Removes every handle, free or not.
    #[must_use]
    pub(crate) fn clear(&mut self) -> Vec<Arc<H>> {
        for free in &mut self.free {
            free.clear();
        }

        self.alive
            .iter_mut()
            .flat_map(|alive| alive.drain().map(|(_, handle)| handle))
            .collect()
    }

    pub(crate) fn alive_count(&self) -> usize {
        self.alive.iter().map(HashMap::len).sum()
    }

    #[cfg(test)]
    pub(crate) fn free_count(&self, slot: Slot) -> usize {
        self.free(slot).len()
    }

    pub(crate) fn active_count(&self, slot: Slot) -> usize {
        self.alive(slot)
            .len()
            .checked_sub(self.free(slot).len())
            .expect("free handles are always a subset of alive handles")
    }

    pub(crate) fn total_active_count(&self) -> usize {
        Slot::all::<SLOTS>().map(|slot| self.active_count(slot)).sum()
    }

    pub(crate) fn alive_handles(&self, slot: Slot) -> Vec<Arc<H>> {
        self.alive(slot).values().cloned().collect()
    }
}

fn key_of<H>(handle: &Arc<H>) -> usize {
    Arc::as_ptr(handle).addr()
}
