use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::sync::Arc;

use crate::{HandleFactory, HandlePool, Slot};

/// A handle checked out of a [`HandlePool`], returned to the pool when dropped.
///
/// Dereferences to the pooled handle. While any `CheckoutHandle` for a slot exists on a thread,
/// further checkouts of the same slot on the same thread yield the same handle without touching
/// any pool lock. The handle becomes available to other threads once the last of them is dropped.
///
/// This type is bound to the thread that created it and cannot be sent to another thread.
///
/// # Example
///
/// ```
/// # use handle_pool::{BoxedError, HandleFactory, HandlePool, Slot};
/// # struct Connector;
/// # impl HandleFactory for Connector {
/// #     type Handle = String;
/// #     fn generate(&self, _slot: Slot) -> Result<String, BoxedError> { Ok("conn".to_string()) }
/// #     fn will_reuse(&self, _slot: Slot, _handle: &String) -> bool { true }
/// # }
/// let pool = HandlePool::<_, 1>::new("/data/main.db", Connector);
///
/// let checkout = pool.checkout(Slot::new(0)).unwrap();
/// assert_eq!(checkout.len(), 4);
/// assert_eq!(pool.active_count(Slot::new(0)), 1);
///
/// checkout.release();
/// assert_eq!(pool.active_count(Slot::new(0)), 0);
/// ```
#[must_use = "the handle is returned to the pool as soon as the checkout is dropped"]
pub struct CheckoutHandle<'p, F: HandleFactory, const SLOTS: usize> {
    pool: &'p HandlePool<F, SLOTS>,
    slot: Slot,

    // Released before the checkout flows back, so that once the pool observes the return, no
    // reference to the handle remains on this thread.
    handle: ManuallyDrop<Arc<F::Handle>>,

    _single_threaded: PhantomData<*const ()>,
}

impl<'p, F: HandleFactory, const SLOTS: usize> CheckoutHandle<'p, F, SLOTS> {
    pub(crate) fn new(pool: &'p HandlePool<F, SLOTS>, slot: Slot, handle: Arc<F::Handle>) -> Self {
        Self {
            pool,
            slot,
            handle: ManuallyDrop::new(handle),
            _single_threaded: PhantomData,
        }
    }

    /// The slot the handle was checked out for.
    #[must_use]
    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// Returns the handle to the pool.
    ///
    /// Equivalent to dropping the checkout.
    pub fn release(self) {
        drop(self);
    }
}

impl<F: HandleFactory, const SLOTS: usize> Deref for CheckoutHandle<'_, F, SLOTS> {
    type Target = F::Handle;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl<F: HandleFactory, const SLOTS: usize> Drop for CheckoutHandle<'_, F, SLOTS> {
    fn drop(&mut self) {
        // SAFETY: The field is never touched again after this, as we are in the destructor.
        unsafe {
            ManuallyDrop::drop(&mut self.handle);
        }

        self.pool.flow_back(self.slot);
    }
}

impl<F: HandleFactory, const SLOTS: usize> fmt::Debug for CheckoutHandle<'_, F, SLOTS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutHandle")
            .field("pool", &self.pool.path())
            .field("slot", &self.slot)
            .field("handle", &Arc::as_ptr(&*self.handle))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_not_impl_any;

    use super::*;
    use crate::BoxedError;

    struct Numbers;

    impl HandleFactory for Numbers {
        type Handle = usize;

        fn generate(&self, slot: Slot) -> Result<usize, BoxedError> {
            Ok(slot.index())
        }

        fn will_reuse(&self, _slot: Slot, _handle: &usize) -> bool {
            true
        }
    }

    assert_not_impl_any!(CheckoutHandle<'static, Numbers, 1>: Send, Sync, Clone);

    #[test]
    fn derefs_to_handle() {
        let pool = HandlePool::<_, 3>::new("numbers", Numbers);

        let checkout = pool.checkout(Slot::new(2)).unwrap();

        assert_eq!(*checkout, 2);
        assert_eq!(checkout.slot(), Slot::new(2));
    }

    #[test]
    fn debug_names_pool_and_slot() {
        let pool = HandlePool::<_, 1>::new("numbers", Numbers);

        let checkout = pool.checkout(Slot::new(0)).unwrap();
        let debug = format!("{checkout:?}");

        assert!(debug.contains("numbers"));
        assert!(debug.contains("slot: Slot(0)"));
    }
}
