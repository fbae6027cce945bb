use std::fmt;
use std::num::NonZero;
use std::sync::Arc;

use event_listener::Event;
use tracing::{debug, trace};

use crate::{
    Blockade, CapacityReached, CheckoutHandle, Error, HandleFactory, HandlePoolBuilder, LockPair,
    Result, Slot, SlotRegistry, ThreadCache,
};

/// A thread-safe pool of reusable handles, grouped into `SLOTS` slots.
///
/// Handles are created on demand by the [`HandleFactory`] `F` and are reused after being returned.
/// At most one thread uses a given handle at any point in time. The total number of alive handles
/// is bounded (see [`HandlePoolBuilder::max_alive_handles()`]); when the bound is reached and no
/// handle is free, checkouts fail with [`Error::CapacityExceeded`] instead of waiting.
///
/// # Checkout
///
/// [`checkout()`][Self::checkout] hands out a [`CheckoutHandle`]. If the calling thread already
/// holds a checkout for the same slot, it receives the same handle again and no lock is taken.
/// Otherwise a free handle of the slot is reused (if the factory agrees) or a new one is generated.
///
/// # Maintenance
///
/// [`blockade()`][Self::blockade] stops new checkouts from starting. The returned [`Blockade`]
/// can [`drain()`][Blockade::drain] the pool, waiting until every checkout has been released and
/// then running a callback with exclusive access to whatever resource the handles point at.
/// Other slots and unrelated pools are not affected.
///
/// [`purge()`][Self::purge] sheds idle handles at any time without disturbing checkouts.
///
/// # Thread safety
///
/// The pool is `Send` and `Sync` and is typically shared via `Arc` or a reference. Checkouts and
/// blockades are bound to the thread that created them.
pub struct HandlePool<F: HandleFactory, const SLOTS: usize> {
    path: Arc<str>,

    locks: LockPair<F::Handle, SLOTS>,

    threads: ThreadCache<F::Handle, SLOTS>,

    // Notified whenever the number of checked out handles across all slots drops to zero.
    drained: Event,

    factory: F,
}

impl<F: HandleFactory, const SLOTS: usize> HandlePool<F, SLOTS> {
    /// Creates a pool for the resource identified by `path`, with the default configuration.
    ///
    /// The path is only used to identify the pool in errors and logs.
    ///
    /// # Panics
    ///
    /// Panics if `SLOTS` is zero.
    ///
    /// # Example
    ///
    /// ```
    /// # use handle_pool::{BoxedError, HandleFactory, Slot};
    /// # struct Connector;
    /// # impl HandleFactory for Connector {
    /// #     type Handle = ();
    /// #     fn generate(&self, _slot: Slot) -> Result<(), BoxedError> { Ok(()) }
    /// #     fn will_reuse(&self, _slot: Slot, _handle: &()) -> bool { true }
    /// # }
    /// use handle_pool::HandlePool;
    ///
    /// let pool = HandlePool::<_, 2>::new("/data/main.db", Connector);
    ///
    /// assert_eq!(pool.path(), "/data/main.db");
    /// assert!(!pool.is_alive());
    /// ```
    #[must_use]
    pub fn new(path: impl Into<Arc<str>>, factory: F) -> Self {
        Self::builder(path, factory).build()
    }

    /// Creates a builder for configuring the pool.
    pub fn builder(path: impl Into<Arc<str>>, factory: F) -> HandlePoolBuilder<F, SLOTS> {
        HandlePoolBuilder::new(path.into(), factory)
    }

    pub(crate) fn new_inner(path: Arc<str>, factory: F, max_alive: NonZero<usize>) -> Self {
        assert!(SLOTS > 0, "a handle pool must have at least one slot");

        debug!(%path, slots = SLOTS, max_alive, "created handle pool");

        Self {
            path,
            locks: LockPair::new(max_alive),
            threads: ThreadCache::new(),
            drained: Event::new(),
            factory,
        }
    }

    /// The identity of the resource the pool is for.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The maximum number of handles that may be alive at the same time, across all slots.
    #[must_use]
    pub fn max_alive_handles(&self) -> NonZero<usize> {
        self.locks.read_registry().max_alive()
    }

    /// Checks out a handle for `slot`.
    ///
    /// If the calling thread already holds a checkout for `slot`, the same handle is returned
    /// again without taking any lock. Otherwise a free handle of the slot is reused, provided
    /// [`HandleFactory::will_reuse()`] accepts it, or a new handle is generated.
    ///
    /// # Errors
    ///
    /// * [`Error::Blockaded`] if the pool is blockaded.
    /// * [`Error::CapacityExceeded`] if no handle is free and the pool is at its limit.
    /// * [`Error::GenerationFailed`] if the factory failed to create a handle.
    ///
    /// The error is also recorded as the [`last_error()`][Self::last_error] of the calling thread.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is not a valid slot of this pool.
    ///
    /// # Example
    ///
    /// ```
    /// # use std::sync::atomic::{AtomicUsize, Ordering};
    /// # use handle_pool::{BoxedError, HandleFactory, Slot};
    /// # #[derive(Default)]
    /// # struct Connector(AtomicUsize);
    /// # impl HandleFactory for Connector {
    /// #     type Handle = usize;
    /// #     fn generate(&self, _slot: Slot) -> Result<usize, BoxedError> {
    /// #         Ok(self.0.fetch_add(1, Ordering::Relaxed))
    /// #     }
    /// #     fn will_reuse(&self, _slot: Slot, _handle: &usize) -> bool { true }
    /// # }
    /// use handle_pool::HandlePool;
    ///
    /// let pool = HandlePool::<_, 1>::new("/data/main.db", Connector::default());
    ///
    /// let first = *pool.checkout(Slot::new(0)).unwrap();
    ///
    /// // The handle was returned to the pool above, so it is reused here.
    /// let second = *pool.checkout(Slot::new(0)).unwrap();
    ///
    /// assert_eq!(first, second);
    /// assert_eq!(pool.alive_count(), 1);
    /// ```
    pub fn checkout(&self, slot: Slot) -> Result<CheckoutHandle<'_, F, SLOTS>> {
        self.assert_valid(slot);

        if let Some(handle) = self.threads.reenter(slot) {
            trace!(path = %self.path, %slot, "reentered checked out handle");
            return Ok(CheckoutHandle::new(self, slot, handle));
        }

        match self.flow_out(slot) {
            Ok(handle) => {
                self.threads.install(slot, Arc::clone(&handle));
                Ok(CheckoutHandle::new(self, slot, handle))
            }
            Err(error) => {
                debug!(path = %self.path, %slot, %error, "checkout failed");
                self.threads.record_error(error.clone());
                Err(error)
            }
        }
    }

    /// Obtains a handle for a thread that does not hold `slot` yet.
    fn flow_out(&self, slot: Slot) -> Result<Arc<F::Handle>> {
        let Some(entered) = self.locks.try_enter() else {
            return Err(Error::Blockaded {
                path: Arc::clone(&self.path),
            });
        };

        let mut registry = entered.write_registry();

        let rejected = match registry.acquire_free(slot) {
            Some(handle) if self.factory.will_reuse(slot, &handle) => {
                trace!(path = %self.path, %slot, "reusing free handle");
                return Ok(handle);
            }
            Some(handle) => {
                trace!(path = %self.path, %slot, "factory rejected free handle");
                Some(registry.discard(slot, handle))
            }
            None => None,
        };

        let result = self.generate(&mut registry, slot);

        // The rejected handle is dropped only once the locks are released.
        drop(registry);
        drop(entered);
        drop(rejected);

        result
    }

    fn generate(
        &self,
        registry: &mut SlotRegistry<F::Handle, SLOTS>,
        slot: Slot,
    ) -> Result<Arc<F::Handle>> {
        let max = registry.max_alive().get();
        let capacity_exceeded = || Error::CapacityExceeded {
            path: Arc::clone(&self.path),
            slot,
            max,
        };

        if !registry.has_capacity() {
            return Err(capacity_exceeded());
        }

        let handle = self
            .factory
            .generate(slot)
            .map(Arc::new)
            .map_err(|source| Error::GenerationFailed {
                path: Arc::clone(&self.path),
                slot,
                source: Arc::from(source),
            })?;

        registry
            .admit_new(slot, &handle)
            .map_err(|CapacityReached| capacity_exceeded())?;

        debug!(
            path = %self.path,
            %slot,
            alive = registry.alive_count(),
            "generated new handle"
        );

        Ok(handle)
    }

    /// Releases one checkout of `slot` held by the calling thread.
    pub(crate) fn flow_back(&self, slot: Slot) {
        let Some(handle) = self.threads.leave(slot) else {
            // The thread still holds the slot through another checkout.
            return;
        };

        let active = {
            let mut registry = self.locks.write_registry();
            registry.release(slot, handle);
            registry.total_active_count()
        };

        trace!(path = %self.path, %slot, active, "returned handle");

        if active == 0 {
            self.drained.notify(usize::MAX);
        }
    }

    /// Stops new checkouts from starting until the returned [`Blockade`] is dropped.
    ///
    /// Waits for checkouts that are in the middle of being handed out to complete, but not for
    /// handles that are already checked out. Use [`Blockade::drain()`] for that.
    ///
    /// # Example
    ///
    /// ```
    /// # use handle_pool::{BoxedError, HandleFactory, Slot};
    /// # struct Connector;
    /// # impl HandleFactory for Connector {
    /// #     type Handle = ();
    /// #     fn generate(&self, _slot: Slot) -> Result<(), BoxedError> { Ok(()) }
    /// #     fn will_reuse(&self, _slot: Slot, _handle: &()) -> bool { true }
    /// # }
    /// use handle_pool::{Error, HandlePool};
    ///
    /// let pool = HandlePool::<_, 1>::new("/data/main.db", Connector);
    ///
    /// let blockade = pool.blockade();
    /// assert!(matches!(pool.checkout(Slot::new(0)), Err(Error::Blockaded { .. })));
    ///
    /// blockade.unblockade();
    /// assert!(pool.checkout(Slot::new(0)).is_ok());
    /// ```
    pub fn blockade(&self) -> Blockade<'_, F, SLOTS> {
        debug!(path = %self.path, "blockading handle pool");

        let exclusive = self.locks.blockade();

        debug!(path = %self.path, "handle pool blockaded");

        Blockade::new(self, exclusive)
    }

    /// Whether the pool is currently blockaded (or a blockade is about to take effect).
    ///
    /// This does not block.
    #[must_use]
    pub fn is_blockaded(&self) -> bool {
        self.locks.is_blockaded()
    }

    /// Drops every handle that is not currently checked out, in all slots.
    ///
    /// This can be called at any time, whether blockaded or not.
    ///
    /// # Example
    ///
    /// ```
    /// # use handle_pool::{BoxedError, HandleFactory, Slot};
    /// # struct Connector;
    /// # impl HandleFactory for Connector {
    /// #     type Handle = ();
    /// #     fn generate(&self, _slot: Slot) -> Result<(), BoxedError> { Ok(()) }
    /// #     fn will_reuse(&self, _slot: Slot, _handle: &()) -> bool { true }
    /// # }
    /// use handle_pool::HandlePool;
    ///
    /// let pool = HandlePool::<_, 2>::new("/data/main.db", Connector);
    ///
    /// let busy = pool.checkout(Slot::new(0)).unwrap();
    /// drop(pool.checkout(Slot::new(1)).unwrap());
    /// assert_eq!(pool.alive_count(), 2);
    ///
    /// pool.purge();
    /// assert_eq!(pool.alive_count(), 1);
    /// # drop(busy);
    /// ```
    pub fn purge(&self) {
        let purged = self.locks.write_registry().purge();

        if !purged.is_empty() {
            debug!(path = %self.path, purged = purged.len(), "purged free handles");
        }
    }

    /// The number of alive handles across all slots, whether checked out or free.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.locks.read_registry().alive_count()
    }

    /// The number of handles of `slot` that are currently checked out.
    ///
    /// A handle checked out several times by the same thread counts once.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is not a valid slot of this pool.
    #[must_use]
    pub fn active_count(&self, slot: Slot) -> usize {
        self.assert_valid(slot);

        self.locks.read_registry().active_count(slot)
    }

    /// Whether the pool has any alive handle in any slot.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive_count() > 0
    }

    /// A snapshot of the alive handles of `slot`, checked out or not.
    ///
    /// This is meant for operations that must reach every handle (e.g. interrupting them all).
    /// The snapshot does not grant ownership: other threads may be using any of these handles
    /// concurrently.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is not a valid slot of this pool.
    #[must_use]
    pub fn alive_handles(&self, slot: Slot) -> Vec<Arc<F::Handle>> {
        self.assert_valid(slot);

        self.locks.read_registry().alive_handles(slot)
    }

    /// The error of the most recent failed checkout on the calling thread, if any.
    ///
    /// Successful checkouts do not clear it.
    #[must_use]
    pub fn last_error(&self) -> Option<Error> {
        self.threads.last_error()
    }

    pub(crate) fn threads(&self) -> &ThreadCache<F::Handle, SLOTS> {
        &self.threads
    }

    pub(crate) fn drained_event(&self) -> &Event {
        &self.drained
    }

    fn assert_valid(&self, slot: Slot) {
        assert!(
            slot.index() < SLOTS,
            "slot {slot} is out of range for handle pool '{}' with {SLOTS} slots",
            self.path
        );
    }
}

impl<F: HandleFactory, const SLOTS: usize> Drop for HandlePool<F, SLOTS> {
    fn drop(&mut self) {
        let cleared = self.locks.write_registry().clear();

        debug!(path = %self.path, closed = cleared.len(), "dropped handle pool");
    }
}

impl<F: HandleFactory, const SLOTS: usize> fmt::Debug for HandlePool<F, SLOTS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.locks.read_registry();

        f.debug_struct("HandlePool")
            .field("path", &self.path)
            .field("slots", &SLOTS)
            .field("is_blockaded", &self.is_blockaded())
            .field("alive", &registry.alive_count())
            .field("active", &registry.total_active_count())
            .field("max_alive", &registry.max_alive())
            .finish_non_exhaustive()
    }
}
