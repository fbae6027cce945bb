use std::cell::RefCell;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use thread_local::ThreadLocal;

use crate::{Error, Slot};

/// Per-thread state of one handle pool.
///
/// Every thread that touches the pool gets its own [`ThreadState`], created on first use. Only
/// the owning thread ever reads or writes it, which is what allows a thread to re-enter a slot it
/// already holds without taking any pool lock.
pub(crate) struct ThreadCache<H: Send + Sync, const SLOTS: usize> {
    states: ThreadLocal<RefCell<ThreadState<H, SLOTS>>>,
}

struct ThreadState<H, const SLOTS: usize> {
    owner: ThreadId,

    entries: [CacheEntry<H>; SLOTS],

    last_error: Option<Error>,
}

struct CacheEntry<H> {
    // Populated if and only if `references` is non-zero.
    handle: Option<Arc<H>>,

    references: usize,
}

impl<H> CacheEntry<H> {
    const fn vacant() -> Self {
        Self {
            handle: None,
            references: 0,
        }
    }
}

impl<H, const SLOTS: usize> ThreadState<H, SLOTS> {
    fn new(owner: ThreadId) -> Self {
        Self {
            owner,
            entries: std::array::from_fn(|_| CacheEntry::vacant()),
            last_error: None,
        }
    }

    #[expect(
        clippy::indexing_slicing,
        reason = "the pool rejects out of range slots before they reach the cache"
    )]
    fn entry_mut(&mut self, slot: Slot) -> &mut CacheEntry<H> {
        &mut self.entries[slot.index()]
    }
}

impl<H: Send + Sync, const SLOTS: usize> ThreadCache<H, SLOTS> {
    pub(crate) fn new() -> Self {
        Self {
            states: ThreadLocal::new(),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ThreadState<H, SLOTS>) -> R) -> R {
        let current = thread::current().id();
        let state = self.states.get_or(|| RefCell::new(ThreadState::new(current)));

        // Nothing calls out of this module while the state is borrowed, so the borrow can only
        // fail if this module itself is broken.
        let mut state = state.borrow_mut();

        // `ThreadLocal` hands the state of an exited thread to the next thread that reuses its
        // index. None of it belongs to the new thread.
        if state.owner != current {
            *state = ThreadState::new(current);
        }

        f(&mut state)
    }

    /// If the current thread already holds `slot`, takes one more reference to the same handle.
    pub(crate) fn reenter(&self, slot: Slot) -> Option<Arc<H>> {
        self.with_state(|state| {
            let entry = state.entry_mut(slot);

            if entry.references == 0 {
                return None;
            }

            entry.references = entry
                .references
                .checked_add(1)
                .expect("reference count overflow is not a realistic scenario");

            Some(Arc::clone(
                entry
                    .handle
                    .as_ref()
                    .expect("a referenced cache entry always holds a handle"),
            ))
        })
    }

    /// Records that the current thread has just checked out `handle` for `slot`.
    pub(crate) fn install(&self, slot: Slot, handle: Arc<H>) {
        self.with_state(|state| {
            let entry = state.entry_mut(slot);
            debug_assert_eq!(entry.references, 0, "slot {slot} is already held by this thread");

            entry.handle = Some(handle);
            entry.references = 1;
        });
    }

    /// Drops one reference of the current thread to `slot`.
    ///
    /// Returns the handle if that was the last reference, in which case it must be returned to
    /// the pool by the caller.
    pub(crate) fn leave(&self, slot: Slot) -> Option<Arc<H>> {
        self.with_state(|state| {
            let entry = state.entry_mut(slot);

            entry.references = entry
                .references
                .checked_sub(1)
                .expect("a checkout is released exactly once");

            if entry.references > 0 {
                return None;
            }

            Some(
                entry
                    .handle
                    .take()
                    .expect("a referenced cache entry always holds a handle"),
            )
        })
    }

    /// Whether the current thread holds any slot of the pool.
    pub(crate) fn holds_any(&self) -> bool {
        self.with_state(|state| state.entries.iter().any(|entry| entry.references > 0))
    }

    #[cfg(test)]
    pub(crate) fn references(&self, slot: Slot) -> usize {
        self.with_state(|state| state.entry_mut(slot).references)
    }

    pub(crate) fn record_error(&self, error: Error) {
        self.with_state(|state| state.last_error = Some(error));
    }

    pub(crate) fn last_error(&self) -> Option<Error> {
        self.with_state(|state| state.last_error.clone())
    }
}
