use derive_more::Display;

/// A category under which handles are grouped in a [`HandlePool`][crate::HandlePool].
///
/// Every slot has its own set of alive handles and its own free list. What the slots mean is up
/// to the owner of the pool (e.g. one slot for readers and one for the single writer). The number
/// of slots is fixed by the `SLOTS` parameter of the pool and a slot is valid for a pool if its
/// [`index()`][Self::index] is less than that number.
///
/// # Example
///
/// ```
/// use handle_pool::Slot;
///
/// const READER: Slot = Slot::new(0);
/// const WRITER: Slot = Slot::new(1);
///
/// assert_eq!(WRITER.index(), 1);
/// assert_ne!(READER, WRITER);
/// ```
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("{_0}")]
pub struct Slot(usize);

impl Slot {
    /// Creates a slot with the given index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The zero-based index of the slot.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }

    /// Returns an iterator over all slots of a pool with `SLOTS` slots.
    pub(crate) fn all<const SLOTS: usize>() -> impl Iterator<Item = Self> {
        (0..SLOTS).map(Self)
    }
}
