#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A thread-safe pool of reusable handles, grouped into a fixed set of slots.
//!
//! Handles are typically exclusive connections to some shared backing resource (a database file,
//! a device, a socket endpoint). The pool lets many threads borrow handles concurrently while
//! guaranteeing that no handle is ever used by two threads at the same time. What a handle is and
//! how many slots exist is decided by the owner of the pool through a [`HandleFactory`].
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use handle_pool::{BoxedError, HandleFactory, HandlePool, Slot};
//!
//! struct Connection {
//!     id: usize,
//! }
//!
//! #[derive(Default)]
//! struct Connector {
//!     opened: AtomicUsize,
//! }
//!
//! impl HandleFactory for Connector {
//!     type Handle = Connection;
//!
//!     fn generate(&self, _slot: Slot) -> Result<Connection, BoxedError> {
//!         let id = self.opened.fetch_add(1, Ordering::Relaxed);
//!         Ok(Connection { id })
//!     }
//!
//!     fn will_reuse(&self, _slot: Slot, _handle: &Connection) -> bool {
//!         true
//!     }
//! }
//!
//! const READ: Slot = Slot::new(0);
//!
//! let pool = HandlePool::<_, 2>::new("/data/main.db", Connector::default());
//!
//! let outer = pool.checkout(READ).unwrap();
//!
//! // The same thread gets the same handle again while it still holds a checkout for the slot.
//! let inner = pool.checkout(READ).unwrap();
//! assert_eq!(outer.id, inner.id);
//! assert_eq!(pool.active_count(READ), 1);
//!
//! drop(inner);
//! drop(outer);
//!
//! assert_eq!(pool.active_count(READ), 0);
//! assert_eq!(pool.alive_count(), 1);
//! ```
//!
//! # Reentrant checkout
//!
//! Each thread keeps its own cache of the handles it has checked out, one entry per slot. Checking
//! out a slot that the thread already holds only bumps a per-thread reference count and touches no
//! lock. The handle returns to the pool when the last [`CheckoutHandle`] for that slot on that
//! thread is dropped.
//!
//! # Exclusive maintenance
//!
//! [`HandlePool::blockade()`] stops new checkouts from starting. While blockaded,
//! [`Blockade::drain()`] waits for every outstanding checkout to be returned, closes all pooled
//! handles and then runs a callback that is guaranteed to observe a pool with no handles in use.
//! Dropping the [`Blockade`] (or calling [`Blockade::unblockade()`]) opens the pool again.
//!
//! ```rust
//! # use handle_pool::{BoxedError, HandleFactory, HandlePool, Slot};
//! # struct Connector;
//! # impl HandleFactory for Connector {
//! #     type Handle = ();
//! #     fn generate(&self, _slot: Slot) -> Result<(), BoxedError> { Ok(()) }
//! #     fn will_reuse(&self, _slot: Slot, _handle: &()) -> bool { true }
//! # }
//! let pool = HandlePool::<_, 1>::new("/data/main.db", Connector);
//! drop(pool.checkout(Slot::new(0)).unwrap());
//!
//! let blockade = pool.blockade();
//! assert!(pool.is_blockaded());
//! assert!(pool.checkout(Slot::new(0)).is_err());
//!
//! blockade.drain(|| {
//!     // Nobody is using the backing resource here. Move it, truncate it, close it.
//! });
//! assert!(!pool.is_alive());
//!
//! blockade.unblockade();
//! assert!(pool.checkout(Slot::new(0)).is_ok());
//! ```
//!
//! # Errors
//!
//! A failed checkout returns an [`Error`] and also records it in a per-thread cell that can be
//! read back later through [`HandlePool::last_error()`].

mod blockade;
mod builder;
mod checkout_handle;
mod clients;
mod error;
mod factory;
mod lock_pair;
mod pool;
mod registry;
mod slot;
#[cfg(test)]
mod test_utils;
mod thread_cache;

pub use blockade::*;
pub use builder::*;
pub use checkout_handle::*;
pub(crate) use clients::*;
pub use error::*;
pub use factory::*;
pub(crate) use lock_pair::*;
pub use pool::*;
pub(crate) use registry::*;
pub use slot::*;
#[cfg(test)]
pub(crate) use test_utils::*;
pub(crate) use thread_cache::*;
