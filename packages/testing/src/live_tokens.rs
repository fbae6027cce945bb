use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts how many resources that it issued tokens for are still open.
///
/// Test handles embed a [`LiveToken`]; the counter then tells whether the handle has actually
/// been destroyed, as opposed to merely being forgotten by the pool's bookkeeping.
///
/// # Example
///
/// ```rust
/// use testing::LiveCounter;
///
/// let counter = LiveCounter::new();
///
/// let token = counter.issue();
/// assert_eq!(counter.open(), 1);
///
/// drop(token);
/// assert_eq!(counter.open(), 0);
/// assert_eq!(counter.issued(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct LiveCounter {
    counts: Arc<Counts>,
}

#[derive(Debug, Default)]
struct Counts {
    open: AtomicUsize,
    issued: AtomicUsize,
}

impl LiveCounter {
    /// Creates a counter with nothing open.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks one more resource as open until the returned token is dropped.
    #[must_use]
    pub fn issue(&self) -> LiveToken {
        self.counts.open.fetch_add(1, Ordering::SeqCst);
        self.counts.issued.fetch_add(1, Ordering::SeqCst);

        LiveToken {
            counts: Arc::clone(&self.counts),
        }
    }

    /// How many issued tokens have not been dropped yet.
    #[must_use]
    pub fn open(&self) -> usize {
        self.counts.open.load(Ordering::SeqCst)
    }

    /// How many tokens have been issued in total.
    #[must_use]
    pub fn issued(&self) -> usize {
        self.counts.issued.load(Ordering::SeqCst)
    }
}

/// Keeps one resource counted as open in its [`LiveCounter`] for as long as it exists.
#[derive(Debug)]
pub struct LiveToken {
    counts: Arc<Counts>,
}

impl Drop for LiveToken {
    fn drop(&mut self) {
        self.counts.open.fetch_sub(1, Ordering::SeqCst);
    }
}
