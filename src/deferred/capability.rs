use super::{Deferred, Resolution};
use crate::Error;

use std::fmt;

/// The capability to fulfill a [`Deferred`], handed to its initializer.
///
/// Only the first call to this or the matching [`Reject`] has an effect.
pub struct Fulfill<T> {
    deferred: Deferred<T>,
}

/// The capability to reject a [`Deferred`], handed to its initializer.
///
/// Only the first call to this or the matching [`Fulfill`] has an effect.
pub struct Reject<T> {
    deferred: Deferred<T>,
}

impl<T: Clone + 'static> Fulfill<T> {
    pub(super) fn new(deferred: Deferred<T>) -> Self {
        Self { deferred }
    }

    /// Fulfill with `value`.
    pub fn fulfill(&self, value: T) {
        if self.deferred.lock() {
            self.deferred.settle(Ok(value));
        } else {
            tracing::debug!("ignoring fulfill of a locked deferred value");
        }
    }

    /// Settle through the resolution procedure: adopt another deferred value
    /// or thenable, or fulfill with a plain value.
    ///
    /// Resolving a value with itself rejects it with
    /// [`Error::ChainingCycle`].
    pub fn resolve(&self, resolution: Resolution<T>) {
        if self.deferred.lock() {
            self.deferred.resolve_with(resolution);
        } else {
            tracing::debug!("ignoring resolve of a locked deferred value");
        }
    }
}

impl<T: Clone + 'static> Reject<T> {
    pub(super) fn new(deferred: Deferred<T>) -> Self {
        Self { deferred }
    }

    /// Reject with `reason`.
    pub fn reject(&self, reason: impl Into<Error>) {
        let reason = reason.into();
        if self.deferred.lock() {
            self.deferred.settle(Err(reason));
        } else {
            tracing::debug!(error = %reason, "ignoring reject of a locked deferred value");
        }
    }
}

impl<T> Clone for Fulfill<T> {
    fn clone(&self) -> Self {
        Self {
            deferred: self.deferred.clone(),
        }
    }
}

impl<T> Clone for Reject<T> {
    fn clone(&self) -> Self {
        Self {
            deferred: self.deferred.clone(),
        }
    }
}

impl<T> fmt::Debug for Fulfill<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Fulfill").field(&self.deferred).finish()
    }
}

impl<T> fmt::Debug for Reject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reject").field(&self.deferred).finish()
    }
}
