//! The deferred value and its state machine.

mod capability;
mod then;
mod wait;

pub use capability::{Fulfill, Reject};
pub use then::{Resolution, Thenable};
pub use wait::Wait;

use crate::runtime::{CatchUnwind, Reactor};
use crate::{Error, Result};

use core::cell::RefCell;
use core::future::Future;
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::task::Waker;

use slab::Slab;

/// A continuation waiting for a deferred value to settle.
type Reaction<T> = Box<dyn FnOnce(Result<T>)>;

/// The eventual result of an asynchronous operation.
///
/// A `Deferred` starts out pending and settles exactly once, either
/// fulfilled with a `T` or rejected with an [`Error`]. Continuations
/// registered with [`then`](Deferred::then) and friends always run on a later
/// turn of the current thread's [`Reactor`], never inside the call that
/// registers them or the call that settles the value.
///
/// Cloning a `Deferred` is cheap: all clones share the same state.
///
/// # Examples
///
/// ```
/// use deferred::{runtime::block_on, Deferred};
///
/// let doubled = Deferred::new(|fulfill, _reject| {
///     fulfill.fulfill(21);
///     Ok(())
/// })
/// .then(|n| Ok(n * 2));
///
/// assert_eq!(block_on(doubled.wait()).unwrap(), 42);
/// ```
pub struct Deferred<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

struct Inner<T> {
    state: State<T>,
    reactions: Vec<Reaction<T>>,
    wakers: Slab<Waker>,
    /// A capability has been used; later capability calls are ignored.
    locked: bool,
    /// Something observed the outcome, so a rejection is not reported.
    handled: bool,
    reactor: Reactor,
}

enum State<T> {
    Pending,
    Fulfilled(T),
    Rejected(Error),
}

impl<T> State<T> {
    fn status(&self) -> Status {
        match self {
            State::Pending => Status::Pending,
            State::Fulfilled(_) => Status::Fulfilled,
            State::Rejected(_) => Status::Rejected,
        }
    }

    fn outcome(&self) -> Option<Result<T>>
    where
        T: Clone,
    {
        match self {
            State::Pending => None,
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(reason.clone())),
        }
    }
}

/// Where a [`Deferred`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Status {
    /// Not settled yet.
    Pending,
    /// Settled with a value.
    Fulfilled,
    /// Settled with a reason.
    Rejected,
}

/// A copy of the state of a [`Deferred`], see [`Deferred::inspect`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "status", content = "payload", rename_all = "lowercase")
)]
pub enum Snapshot<T> {
    /// Not settled yet.
    Pending,
    /// Settled with this value.
    Fulfilled(T),
    /// Settled with this reason.
    Rejected(#[cfg_attr(feature = "serde", serde(serialize_with = "serialize_reason"))] Error),
}

#[cfg(feature = "serde")]
fn serialize_reason<S>(reason: &Error, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_str(reason)
}

impl<T> Deferred<T> {
    /// A pending value dispatching on the given reactor.
    fn pending_on(reactor: Reactor) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                state: State::Pending,
                reactions: Vec::new(),
                wakers: Slab::new(),
                locked: false,
                handled: false,
                reactor,
            })),
        }
    }

    /// A pending value dispatching on the current thread's reactor.
    fn pending() -> Self {
        Self::pending_on(Reactor::current())
    }

    /// Where this value is in its lifecycle.
    pub fn status(&self) -> Status {
        self.inner.borrow().state.status()
    }

    /// Returns `true` once [`Fulfill`] or [`Reject`] has been used, even if the
    /// value is still pending because it adopted another one.
    pub fn is_locked(&self) -> bool {
        self.inner.borrow().locked
    }

    /// Returns `true` if both handles share the same state.
    pub fn ptr_eq(&self, other: &Deferred<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn reactor(&self) -> Reactor {
        self.inner.borrow().reactor.clone()
    }

    /// Claim the right to settle for a capability call.
    fn lock(&self) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.locked {
            return false;
        }
        inner.locked = true;
        true
    }
}

impl<T: Clone + 'static> Deferred<T> {
    /// Create a deferred value and run `init` right away to settle it.
    ///
    /// `init` receives the two capabilities that settle the value. Only the
    /// first capability call counts. If `init` returns an error or panics
    /// before that, the value is rejected with it; otherwise the error is
    /// dropped.
    pub fn new<F>(init: F) -> Self
    where
        F: FnOnce(Fulfill<T>, Reject<T>) -> Result<()>,
    {
        let (deferred, fulfill, reject) = Self::with_resolvers();
        let fallback = reject.clone();
        if let Err(err) = guarded(move || init(fulfill, reject)) {
            tracing::trace!(error = %err, "initializer failed");
            fallback.reject(err);
        }
        deferred
    }

    /// A pending value together with the capabilities that settle it.
    ///
    /// ```
    /// use deferred::{runtime::Reactor, Deferred, Status};
    ///
    /// let (deferred, fulfill, _reject) = Deferred::with_resolvers();
    /// assert_eq!(deferred.status(), Status::Pending);
    /// fulfill.fulfill("ready");
    /// assert_eq!(deferred.status(), Status::Fulfilled);
    /// # Reactor::current().run_until_stalled();
    /// ```
    pub fn with_resolvers() -> (Self, Fulfill<T>, Reject<T>) {
        let deferred = Self::pending();
        let fulfill = Fulfill::new(deferred.clone());
        let reject = Reject::new(deferred.clone());
        (deferred, fulfill, reject)
    }

    /// A value that is already fulfilled.
    pub fn resolve(value: T) -> Self {
        let deferred = Self::pending();
        deferred.settle(Ok(value));
        deferred
    }

    /// A value that is already rejected.
    pub fn reject(reason: impl Into<Error>) -> Self {
        let deferred = Self::pending();
        deferred.settle(Err(reason.into()));
        deferred
    }

    /// A new value that settles the same way as `source`.
    ///
    /// Accepts another [`Deferred`] as well as any foreign [`Thenable`].
    pub fn adopt<S>(source: S) -> Self
    where
        S: Thenable<T> + 'static,
    {
        Self::new(move |fulfill, _| {
            fulfill.resolve(Resolution::Thenable(Box::new(source)));
            Ok(())
        })
    }

    /// Run `future` on the reactor and settle with its output.
    ///
    /// A panic inside the future rejects the value with
    /// [`Error::Panicked`].
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Result<T>> + 'static,
    {
        Self::new(move |fulfill, reject| {
            Reactor::current().spawn(async move {
                match CatchUnwind::new(future).await.and_then(|res| res) {
                    Ok(value) => fulfill.fulfill(value),
                    Err(err) => reject.reject(err),
                }
            });
            Ok(())
        })
    }

    /// A copy of the current state.
    pub fn inspect(&self) -> Snapshot<T> {
        match self.inner.borrow().state.outcome() {
            None => Snapshot::Pending,
            Some(Ok(value)) => Snapshot::Fulfilled(value),
            Some(Err(reason)) => Snapshot::Rejected(reason),
        }
    }

    /// Register a pair of callbacks, one of which runs on a later turn once
    /// this value settles.
    ///
    /// Callbacks registered while pending run in registration order. If the
    /// value has already settled, the matching callback is queued right
    /// away. A panic inside a callback propagates out of
    /// [`Reactor::turn`]; use [`then_with`](Deferred::then_with) to turn
    /// panics into rejections instead.
    pub fn subscribe<F, R>(&self, on_fulfilled: F, on_rejected: R)
    where
        F: FnOnce(T) + 'static,
        R: FnOnce(Error) + 'static,
    {
        self.register(Box::new(move |outcome| match outcome {
            Ok(value) => on_fulfilled(value),
            Err(reason) => on_rejected(reason),
        }));
    }

    fn register(&self, reaction: Reaction<T>) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.handled = true;
            if matches!(inner.state, State::Pending) {
                inner.reactions.push(reaction);
                return;
            }
        }
        // The payload is cloned under a shared borrow so `T::clone` may inspect this value.
        let inner = self.inner.borrow();
        if let Some(outcome) = inner.state.outcome() {
            let reactor = inner.reactor.clone();
            drop(inner);
            reactor.schedule(move || reaction(outcome));
        }
    }

    /// Leave the pending state. Later calls are ignored.
    fn settle(&self, outcome: Result<T>) {
        if !matches!(self.inner.borrow().state, State::Pending) {
            tracing::debug!(
                status = ?self.status(),
                "ignoring settlement of an already settled deferred value"
            );
            return;
        }
        let stored = match &outcome {
            Ok(value) => State::Fulfilled(value.clone()),
            Err(reason) => State::Rejected(reason.clone()),
        };
        let (reactions, wakers, reactor) = {
            let mut inner = self.inner.borrow_mut();
            // `T::clone` may itself have settled this value.
            if !matches!(inner.state, State::Pending) {
                return;
            }
            inner.locked = true;
            inner.state = stored;
            tracing::trace!(
                status = ?inner.state.status(),
                reactions = inner.reactions.len(),
                "settled deferred value"
            );
            (
                mem::take(&mut inner.reactions),
                inner.wakers.drain().collect::<Vec<_>>(),
                inner.reactor.clone(),
            )
        };
        for waker in wakers {
            waker.wake();
        }
        for reaction in reactions {
            let outcome = outcome.clone();
            reactor.schedule(move || reaction(outcome));
        }
    }
}

/// Run a user callback, turning a panic into an error.
fn guarded<R>(f: impl FnOnce() -> Result<R>) -> Result<R> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| Err(Error::from_panic(payload)))
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("Deferred")
                .field("status", &inner.state.status())
                .field("reactions", &inner.reactions.len())
                .finish(),
            Err(_) => f.debug_struct("Deferred").finish_non_exhaustive(),
        }
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        if let State::Rejected(reason) = &self.state {
            if !self.handled {
                self.reactor.report_unhandled(reason);
            }
        }
    }
}
