use crate::{BoxedError, Slot};

/// Creates and vets the handles managed by a [`HandlePool`][crate::HandlePool].
///
/// The pool owns the bookkeeping; the factory owns the meaning of a handle. Both methods are
/// called while the pool holds its internal registry lock, so they should be quick and must not
/// call back into the same pool.
///
/// # Example
///
/// ```
/// use handle_pool::{BoxedError, HandleFactory, Slot};
///
/// struct Connection {
///     broken: bool,
/// }
///
/// struct Connector;
///
/// impl HandleFactory for Connector {
///     type Handle = Connection;
///
///     fn generate(&self, slot: Slot) -> Result<Connection, BoxedError> {
///         if slot.index() > 1 {
///             return Err(format!("no such slot: {slot}").into());
///         }
///
///         Ok(Connection { broken: false })
///     }
///
///     fn will_reuse(&self, _slot: Slot, handle: &Connection) -> bool {
///         !handle.broken
///     }
/// }
/// ```
pub trait HandleFactory: Send + Sync {
    /// The pooled resource.
    ///
    /// A handle is only ever used by one thread at a time but it moves between threads over its
    /// lifetime, hence the `Send + Sync` requirement.
    type Handle: Send + Sync;

    /// Creates a new handle for `slot`.
    ///
    /// Called when a checkout finds no reusable handle and the pool still has capacity. An error
    /// fails the checkout with [`Error::GenerationFailed`][crate::Error::GenerationFailed] and
    /// leaves the pool unchanged.
    ///
    /// # Errors
    ///
    /// Any error from setting up the underlying resource.
    fn generate(&self, slot: Slot) -> Result<Self::Handle, BoxedError>;

    /// Decides whether a previously returned handle may be handed to a new borrower.
    ///
    /// This is the place to validate or reset the handle. Returning `false` removes the handle
    /// from the pool (it is dropped) and the checkout falls back to [`generate()`][Self::generate].
    fn will_reuse(&self, slot: Slot, handle: &Self::Handle) -> bool;
}
