//! Deferred dispatch support.
//!
//! Every thread owns one [`Reactor`]: a FIFO queue of jobs. Settling a
//! [`Deferred`](crate::Deferred) never runs continuations in place; it queues
//! them on the reactor, and they run on a later turn. Call [`block_on()`] to
//! drive a future while turning the reactor, or step it by hand with
//! [`Reactor::turn`] and [`Reactor::run_until_stalled`].

#![deny(missing_debug_implementations, nonstandard_style)]
#![warn(missing_docs, unreachable_pub)]

mod block_on;
mod reactor;
mod task;

use std::cell::Cell;

pub use block_on::block_on;
pub use reactor::Reactor;

pub(crate) use task::CatchUnwind;

thread_local! {
    pub(crate) static REACTOR: ThreadReactor = ThreadReactor(Reactor::new());

    /// Set while a `block_on` call is driving this thread's reactor.
    pub(crate) static RUNNING: Cell<bool> = const { Cell::new(false) };
}

/// The reactor owned by a thread.
///
/// Queued jobs and tasks hold deferred values, which hold the reactor, so
/// leftover work is dropped when the thread exits to break those cycles.
pub(crate) struct ThreadReactor(pub(crate) Reactor);

impl Drop for ThreadReactor {
    fn drop(&mut self) {
        self.0.clear();
    }
}
