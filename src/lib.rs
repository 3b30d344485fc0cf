#![warn(future_incompatible, unreachable_pub)]
//#![deny(missing_debug_implementations)]
//#![warn(missing_docs)]

//! Deferred values for Rust, following the Promise/A+ resolution model.
//!
//! A [`Deferred`] represents the eventual result of an asynchronous
//! operation. It starts out pending and settles exactly once: fulfilled with
//! a value, or rejected with an [`Error`]. Continuations chain off it with
//! [`then`](Deferred::then), [`and_then`](Deferred::and_then),
//! [`catch`](Deferred::catch) and [`then_with`](Deferred::then_with), and
//! [`all`] and [`race`] combine many of them.
//!
//! # Examples
//!
//! ```
//! use deferred::{all, runtime::block_on, Deferred, Error};
//!
//! let parsed = Deferred::new(|fulfill, _reject| {
//!     fulfill.fulfill("42");
//!     Ok(())
//! })
//! .then(|text| text.parse::<u32>().map_err(Error::other))
//! .and_then(|n| Ok(Deferred::resolve(n + 1)));
//!
//! let both = all([parsed, Deferred::resolve(7)]);
//! assert_eq!(block_on(both.wait()).unwrap(), vec![43, 7]);
//! ```
//!
//! # Design Decisions
//!
//! Continuations never run inside the call that registers them or the call
//! that settles the value. They are queued on the current thread's
//! [`runtime::Reactor`] and run on a later turn, in registration order. The
//! reactor is turned by [`runtime::block_on`], by awaiting a value inside it,
//! or by hand with [`runtime::Reactor::turn`].
//!
//! Everything is single-threaded: a `Deferred` is a reference-counted cell
//! and is neither `Send` nor `Sync`. Rejection reasons are a single, cheaply
//! cloned [`Error`] type, so one reason can be delivered to every
//! continuation.
//!
//! Handlers that panic reject the downstream value with
//! [`Error::Panicked`] instead of unwinding through the reactor.

mod combinator;
mod deferred;
mod error;
pub mod runtime;

pub use combinator::{all, race};
pub use deferred::{Deferred, Fulfill, Reject, Resolution, Snapshot, Status, Thenable, Wait};
pub use error::{Error, Result};

#[cfg(feature = "macros")]
pub use deferred_macro::attr_macro_main as main;
#[cfg(feature = "macros")]
pub use deferred_macro::attr_macro_test as test;
