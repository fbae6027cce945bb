//! Shared fixtures for the unit tests of this package.
#![cfg_attr(coverage_nightly, coverage(off))]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use testing::{LiveCounter, LiveToken};

use crate::{BoxedError, HandleFactory, Slot};

/// A handle that knows who created it and detects concurrent use.
#[derive(Debug)]
pub(crate) struct TestHandle {
    pub(crate) id: usize,
    pub(crate) created_for: Slot,

    users: AtomicUsize,

    _open: LiveToken,
}

impl TestHandle {
    /// Marks the handle as in use by the calling thread for the duration of `f`.
    ///
    /// # Panics
    ///
    /// Panics if another thread is using the handle at the same time.
    pub(crate) fn use_exclusively<R>(&self, f: impl FnOnce() -> R) -> R {
        let previous = self.users.fetch_add(1, Ordering::SeqCst);
        assert_eq!(previous, 0, "handle {} is used by two threads at once", self.id);

        let result = f();

        self.users.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// A factory whose behavior can be switched at runtime.
#[derive(Debug)]
pub(crate) struct TestFactory {
    handles: LiveCounter,

    generated: AtomicUsize,
    reuse_checks: AtomicUsize,

    reuse: AtomicBool,
    fail: AtomicBool,
}

impl TestFactory {
    pub(crate) fn new() -> Self {
        Self {
            handles: LiveCounter::new(),
            generated: AtomicUsize::new(0),
            reuse_checks: AtomicUsize::new(0),
            reuse: AtomicBool::new(true),
            fail: AtomicBool::new(false),
        }
    }

    /// A counter of the handles this factory created that have not been destroyed yet.
    ///
    /// Clones of the counter stay valid after the factory has been moved into a pool.
    pub(crate) fn handles(&self) -> LiveCounter {
        self.handles.clone()
    }

    pub(crate) fn generated(&self) -> usize {
        self.generated.load(Ordering::SeqCst)
    }

    pub(crate) fn reuse_checks(&self) -> usize {
        self.reuse_checks.load(Ordering::SeqCst)
    }

    pub(crate) fn set_reuse(&self, reuse: bool) {
        self.reuse.store(reuse, Ordering::SeqCst);
    }

    pub(crate) fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl HandleFactory for TestFactory {
    type Handle = TestHandle;

    fn generate(&self, slot: Slot) -> Result<TestHandle, BoxedError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err("generation switched off".into());
        }

        Ok(TestHandle {
            id: self.generated.fetch_add(1, Ordering::SeqCst),
            created_for: slot,
            users: AtomicUsize::new(0),
            _open: self.handles.issue(),
        })
    }

    fn will_reuse(&self, _slot: Slot, _handle: &TestHandle) -> bool {
        self.reuse_checks.fetch_add(1, Ordering::SeqCst);
        self.reuse.load(Ordering::SeqCst)
    }
}
