use super::{guarded, Deferred};
use crate::{Error, Result};

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// A value that can notify callbacks once it settles.
///
/// This is how foreign future-like types take part in chaining: a handler
/// may return one wrapped in [`Resolution::Thenable`], and the downstream
/// [`Deferred`] adopts its outcome.
///
/// Implementations are not trusted. Only the first callback call counts, and
/// an error returned after a callback was called is ignored.
pub trait Thenable<T> {
    /// Arrange for exactly one of the callbacks to be called with the outcome.
    fn subscribe(
        self: Box<Self>,
        on_fulfilled: Box<dyn FnOnce(T)>,
        on_rejected: Box<dyn FnOnce(Error)>,
    ) -> Result<()>;
}

impl<T: Clone + 'static> Thenable<T> for Deferred<T> {
    fn subscribe(
        self: Box<Self>,
        on_fulfilled: Box<dyn FnOnce(T)>,
        on_rejected: Box<dyn FnOnce(Error)>,
    ) -> Result<()> {
        Deferred::subscribe(&*self, on_fulfilled, on_rejected);
        Ok(())
    }
}

impl<T> Thenable<T> for Box<dyn Thenable<T>> {
    fn subscribe(
        self: Box<Self>,
        on_fulfilled: Box<dyn FnOnce(T)>,
        on_rejected: Box<dyn FnOnce(Error)>,
    ) -> Result<()> {
        (*self).subscribe(on_fulfilled, on_rejected)
    }
}

/// What a handler settles the downstream value with.
pub enum Resolution<T> {
    /// Fulfill with this value.
    Value(T),
    /// Adopt the outcome of another deferred value.
    Deferred(Deferred<T>),
    /// Adopt the outcome of a foreign thenable.
    Thenable(Box<dyn Thenable<T>>),
}

impl<T> From<Deferred<T>> for Resolution<T> {
    fn from(deferred: Deferred<T>) -> Self {
        Resolution::Deferred(deferred)
    }
}

impl<T: fmt::Debug> fmt::Debug for Resolution<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Resolution::Deferred(deferred) => f.debug_tuple("Deferred").field(deferred).finish(),
            Resolution::Thenable(_) => f.write_str("Thenable(..)"),
        }
    }
}

impl<T: Clone + 'static> Deferred<T> {
    /// Chain both outcomes of this value into a new one.
    ///
    /// Once this value settles, the matching handler runs on a later turn and
    /// its result settles the returned value through the resolution
    /// procedure. A handler that returns `Err` or panics rejects the returned
    /// value. A handler that resolves to the returned value itself rejects it
    /// with [`Error::ChainingCycle`].
    pub fn then_with<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Deferred<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<Resolution<U>> + 'static,
        R: FnOnce(Error) -> Result<Resolution<U>> + 'static,
    {
        let next = Deferred::pending_on(self.reactor());
        let target = next.clone();
        self.register(Box::new(move |outcome| {
            let resolution = match outcome {
                Ok(value) => guarded(move || on_fulfilled(value)),
                Err(reason) => guarded(move || on_rejected(reason)),
            };
            match resolution {
                Ok(resolution) => target.resolve_with(resolution),
                Err(err) => target.settle(Err(err)),
            }
        }));
        next
    }

    /// Map the fulfilled value. Rejections pass through unchanged.
    pub fn then<U, F>(&self, on_fulfilled: F) -> Deferred<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<U> + 'static,
    {
        self.then_with(
            move |value| on_fulfilled(value).map(Resolution::Value),
            |reason| Err(reason),
        )
    }

    /// Continue with another deferred value once this one fulfills.
    /// Rejections pass through unchanged.
    pub fn and_then<U, F>(&self, on_fulfilled: F) -> Deferred<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<Deferred<U>> + 'static,
    {
        self.then_with(
            move |value| on_fulfilled(value).map(Resolution::Deferred),
            |reason| Err(reason),
        )
    }

    /// Recover from a rejection. Fulfilled values pass through unchanged.
    pub fn catch<F>(&self, on_rejected: F) -> Deferred<T>
    where
        F: FnOnce(Error) -> Result<T> + 'static,
    {
        self.then_with(
            |value| Ok(Resolution::Value(value)),
            move |reason| on_rejected(reason).map(Resolution::Value),
        )
    }

    /// Settle this value from a handler result.
    pub(super) fn resolve_with(&self, resolution: Resolution<T>) {
        match resolution {
            Resolution::Value(value) => self.settle(Ok(value)),
            Resolution::Deferred(source) if source.ptr_eq(self) => {
                tracing::debug!("deferred value resolved with itself");
                self.settle(Err(Error::ChainingCycle));
            }
            Resolution::Deferred(source) => {
                let on_fulfilled = self.clone();
                let on_rejected = self.clone();
                source.subscribe(
                    move |value| on_fulfilled.settle(Ok(value)),
                    move |reason| on_rejected.settle(Err(reason)),
                );
            }
            Resolution::Thenable(thenable) => self.adopt_thenable(thenable),
        }
    }

    fn adopt_thenable(&self, thenable: Box<dyn Thenable<T>>) {
        let called = Rc::new(Cell::new(false));
        let on_fulfilled: Box<dyn FnOnce(T)> = {
            let called = called.clone();
            let target = self.clone();
            Box::new(move |value| {
                if !called.replace(true) {
                    target.settle(Ok(value));
                }
            })
        };
        let on_rejected: Box<dyn FnOnce(Error)> = {
            let called = called.clone();
            let target = self.clone();
            Box::new(move |reason| {
                if !called.replace(true) {
                    target.settle(Err(reason));
                }
            })
        };
        if let Err(err) = guarded(move || thenable.subscribe(on_fulfilled, on_rejected)) {
            if called.replace(true) {
                tracing::debug!(error = %err, "ignoring thenable error after it settled");
            } else {
                self.settle(Err(err));
            }
        }
    }
}
