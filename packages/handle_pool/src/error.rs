use std::sync::Arc;

use thiserror::Error;

use crate::Slot;

/// Error type returned by a [`HandleFactory`][crate::HandleFactory] when it fails to create a
/// new handle.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur when checking out a handle from a [`HandlePool`][crate::HandlePool].
///
/// All errors are recoverable. The same error is also recorded for the calling thread and can be
/// read back via [`HandlePool::last_error()`][crate::HandlePool::last_error].
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The pool already holds the maximum number of alive handles and none of them is free.
    ///
    /// This is backpressure: retry after some handles have been returned.
    #[error("handle pool '{path}' has reached its limit of {max} alive handles (slot {slot})")]
    CapacityExceeded {
        /// Identity of the pool that refused the checkout.
        path: Arc<str>,

        /// The slot for which a handle was requested.
        slot: Slot,

        /// The maximum number of alive handles the pool permits.
        max: usize,
    },

    /// The [`HandleFactory`][crate::HandleFactory] failed to create a new handle.
    #[error("handle pool '{path}' failed to generate a handle for slot {slot}")]
    GenerationFailed {
        /// Identity of the pool that attempted the generation.
        path: Arc<str>,

        /// The slot for which a handle was requested.
        slot: Slot,

        /// The error returned by the factory.
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// The pool is blockaded and does not accept new checkouts.
    ///
    /// Retry after the blockade has been lifted, or treat this as a signal to abort.
    #[error("handle pool '{path}' is blockaded")]
    Blockaded {
        /// Identity of the blockaded pool.
        path: Arc<str>,
    },
}

/// A specialized `Result` type for handle pool operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;
