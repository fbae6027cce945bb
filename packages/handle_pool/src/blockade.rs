use std::fmt;

use event_listener::Listener;
use tracing::debug;

use crate::{Exclusive, HandleFactory, HandlePool};

/// An exclusivity barrier on a [`HandlePool`], obtained from [`HandlePool::blockade()`].
///
/// While a `Blockade` exists, no new checkout can start on the pool: [`HandlePool::checkout()`]
/// fails immediately with [`Error::Blockaded`][crate::Error::Blockaded]. Checkouts that were
/// already handed out stay valid and can be used until released; a thread that already holds a
/// slot can even re-enter it.
///
/// Use [`drain()`][Self::drain] to wait until all of them have been returned. The blockade ends
/// when this value is dropped or [`unblockade()`][Self::unblockade] is called.
///
/// This type is bound to the thread that created it and cannot be sent to another thread.
#[must_use = "the pool is unblockaded as soon as the blockade is dropped"]
pub struct Blockade<'p, F: HandleFactory, const SLOTS: usize> {
    pool: &'p HandlePool<F, SLOTS>,

    exclusive: Exclusive<'p, F::Handle, SLOTS>,
}

impl<'p, F: HandleFactory, const SLOTS: usize> Blockade<'p, F, SLOTS> {
    pub(crate) fn new(
        pool: &'p HandlePool<F, SLOTS>,
        exclusive: Exclusive<'p, F::Handle, SLOTS>,
    ) -> Self {
        Self { pool, exclusive }
    }

    /// Waits until no handle of any slot is checked out, closes all pooled handles and then
    /// calls `on_drained`, returning its result.
    ///
    /// The callback runs while the blockade is still in force, so it observes a pool without
    /// alive handles and no checkout can start while it runs. The pool remains blockaded after
    /// this returns.
    ///
    /// Draining cannot fail. It waits for as long as it takes for the outstanding checkouts to
    /// be released.
    ///
    /// # Panics
    ///
    /// Panics if the calling thread itself holds a checkout of this pool, as the drain could
    /// never complete.
    ///
    /// # Example
    ///
    /// ```
    /// # use handle_pool::{BoxedError, HandleFactory, HandlePool, Slot};
    /// # struct Connector;
    /// # impl HandleFactory for Connector {
    /// #     type Handle = ();
    /// #     fn generate(&self, _slot: Slot) -> Result<(), BoxedError> { Ok(()) }
    /// #     fn will_reuse(&self, _slot: Slot, _handle: &()) -> bool { true }
    /// # }
    /// let pool = HandlePool::<_, 1>::new("/data/main.db", Connector);
    ///
    /// let blockade = pool.blockade();
    /// let alive_in_callback = blockade.drain(|| pool.alive_count());
    ///
    /// assert_eq!(alive_in_callback, 0);
    /// ```
    pub fn drain<R>(&self, on_drained: impl FnOnce() -> R) -> R {
        assert!(
            !self.pool.threads().holds_any(),
            "cannot drain handle pool '{}' from a thread that holds one of its checkouts",
            self.pool.path()
        );

        debug!(path = %self.pool.path(), "draining handle pool");

        loop {
            // Register before checking so a release between the check and the wait is not lost.
            let listener = self.pool.drained_event().listen();

            if self.exclusive.read_registry().total_active_count() == 0 {
                break;
            }

            listener.wait();
        }

        let cleared = self.exclusive.write_registry().clear();
        debug!(path = %self.pool.path(), closed = cleared.len(), "handle pool drained");

        // Close the handles outside the registry lock, before the callback gets to run.
        drop(cleared);

        on_drained()
    }

    /// Ends the blockade, allowing checkouts again.
    ///
    /// Equivalent to dropping the blockade.
    pub fn unblockade(self) {
        drop(self);
    }
}

impl<F: HandleFactory, const SLOTS: usize> Drop for Blockade<'_, F, SLOTS> {
    fn drop(&mut self) {
        debug!(path = %self.pool.path(), "handle pool unblockaded");
    }
}

impl<F: HandleFactory, const SLOTS: usize> fmt::Debug for Blockade<'_, F, SLOTS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blockade")
            .field("pool", &self.pool.path())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Barrier, mpsc};
    use std::thread;
    use std::time::Duration;

    use static_assertions::assert_not_impl_any;

    use super::*;
    use crate::{BoxedError, Error, Slot, TestFactory};

    const A: Slot = Slot::new(0);
    const B: Slot = Slot::new(1);

    #[derive(Default)]
    struct Counter {
        generated: AtomicUsize,
    }

    impl HandleFactory for Counter {
        type Handle = usize;

        fn generate(&self, _slot: Slot) -> Result<usize, BoxedError> {
            Ok(self.generated.fetch_add(1, Ordering::Relaxed))
        }

        fn will_reuse(&self, _slot: Slot, _handle: &usize) -> bool {
            true
        }
    }

    assert_not_impl_any!(Blockade<'static, Counter, 1>: Send);

    #[test]
    fn blockade_rejects_checkouts_until_dropped() {
        let pool = HandlePool::<_, 2>::new("counter", Counter::default());

        let blockade = pool.blockade();
        assert!(pool.is_blockaded());
        assert!(matches!(pool.checkout(A), Err(Error::Blockaded { .. })));
        assert!(matches!(pool.last_error(), Some(Error::Blockaded { .. })));

        blockade.unblockade();
        assert!(!pool.is_blockaded());
        assert!(pool.checkout(A).is_ok());
    }

    #[test]
    fn drain_of_idle_pool_closes_all_handles() {
        let pool = HandlePool::<_, 2>::new("counter", Counter::default());
        drop(pool.checkout(A).unwrap());
        drop(pool.checkout(B).unwrap());
        assert_eq!(pool.alive_count(), 2);

        let blockade = pool.blockade();
        let observed = blockade.drain(|| (pool.alive_count(), pool.is_blockaded()));

        assert_eq!(observed, (0, true));
        assert!(pool.is_blockaded());
    }

    #[test]
    fn existing_checkout_can_reenter_while_blockaded() {
        let pool = HandlePool::<_, 1>::new("counter", Counter::default());

        let outer = pool.checkout(A).unwrap();
        let blockade = pool.blockade();

        let inner = pool.checkout(A).unwrap();
        assert_eq!(*inner, *outer);

        drop(inner);
        drop(outer);
        drop(blockade);
    }

    #[test]
    #[should_panic]
    fn drain_while_holding_checkout_panics() {
        let pool = HandlePool::<_, 1>::new("counter", Counter::default());

        let _checkout = pool.checkout(A).unwrap();
        let blockade = pool.blockade();

        blockade.drain(|| ());
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn drain_waits_for_outstanding_checkout() {
        let pool = HandlePool::<_, 1>::new("counter", Counter::default());
        let pool = &pool;
        let calls = AtomicUsize::new(0);
        let checked_out = &Barrier::new(2);
        let (release_tx, release_rx) = mpsc::channel::<()>();

        thread::scope(|s| {
            let holder = s.spawn(move || {
                let checkout = pool.checkout(A).unwrap();
                checked_out.wait();

                release_rx.recv().unwrap();
                drop(checkout);
            });

            checked_out.wait();
            let blockade = pool.blockade();

            let releaser = s.spawn(move || {
                thread::sleep(Duration::from_millis(50));
                assert_eq!(pool.active_count(A), 1);
                release_tx.send(()).unwrap();
            });

            blockade.drain(|| {
                calls.fetch_add(1, Ordering::Relaxed);
                assert_eq!(pool.active_count(A), 0);
            });

            releaser.join().unwrap();
            holder.join().unwrap();
        });

        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn drain_destroys_idle_handles_before_callback() {
        let factory = TestFactory::new();
        let handles = factory.handles();
        let pool = HandlePool::<_, 2>::new("test", factory);
        drop(pool.checkout(A).unwrap());
        drop(pool.checkout(B).unwrap());
        assert_eq!(handles.open(), 2);

        let blockade = pool.blockade();
        let open_in_callback = blockade.drain(|| handles.open());

        assert_eq!(open_in_callback, 0);
        assert_eq!(handles.issued(), 2);
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn drain_callback_never_sees_handle_released_by_other_thread() {
        for _ in 0..200 {
            let factory = TestFactory::new();
            let handles = factory.handles();
            let pool = HandlePool::<_, 1>::new("test", factory);
            let pool = &pool;
            let checked_out = &Barrier::new(2);
            let blockaded = &Barrier::new(2);

            let open_in_callback = thread::scope(|s| {
                s.spawn(move || {
                    let checkout = pool.checkout(A).unwrap();
                    checked_out.wait();

                    // Released while the drain is starting up or already waiting.
                    blockaded.wait();
                    drop(checkout);
                });

                checked_out.wait();
                let blockade = pool.blockade();
                blockaded.wait();

                blockade.drain(|| handles.open())
            });

            assert_eq!(open_in_callback, 0);
            assert_eq!(handles.issued(), 1);
        }
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn blockade_waits_for_checkouts_in_flight() {
        let pool = HandlePool::<_, 1>::new("counter", Counter::default());

        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..100 {
                        if let Ok(checkout) = pool.checkout(A) {
                            drop(checkout);
                        }
                    }
                });
            }

            for _ in 0..10 {
                let blockade = pool.blockade();
                blockade.drain(|| assert_eq!(pool.alive_count(), 0));
            }
        });
    }
}
