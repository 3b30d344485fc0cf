use super::{Deferred, State};
use crate::Result;

use core::future::{Future, IntoFuture};
use core::pin::Pin;
use core::task::{Context, Poll};

use futures_core::future::FusedFuture;

/// Waits for a [`Deferred`] to settle.
///
/// This `struct` is created by [`Deferred::wait`], or by `.await`ing a
/// [`Deferred`] directly.
#[must_use = "futures do nothing unless polled or .awaited"]
#[derive(Debug)]
pub struct Wait<T> {
    deferred: Deferred<T>,
    key: Option<usize>,
    done: bool,
}

impl<T: Clone + 'static> Deferred<T> {
    /// A future resolving to the outcome of this value.
    pub fn wait(&self) -> Wait<T> {
        Wait {
            deferred: self.clone(),
            key: None,
            done: false,
        }
    }
}

impl<T: Clone + 'static> IntoFuture for Deferred<T> {
    type Output = Result<T>;
    type IntoFuture = Wait<T>;

    fn into_future(self) -> Self::IntoFuture {
        self.wait()
    }
}

impl<T: Clone + 'static> Future for Wait<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        this.deferred.inner.borrow_mut().handled = true;
        if let Some(outcome) = this.deferred.inner.borrow().state.outcome() {
            this.key = None;
            this.done = true;
            return Poll::Ready(outcome);
        }
        let mut inner = this.deferred.inner.borrow_mut();
        match this.key.and_then(|key| inner.wakers.get_mut(key)) {
            Some(waker) => waker.clone_from(cx.waker()),
            None => this.key = Some(inner.wakers.insert(cx.waker().clone())),
        }
        Poll::Pending
    }
}

impl<T: Clone + 'static> FusedFuture for Wait<T> {
    fn is_terminated(&self) -> bool {
        self.done
    }
}

impl<T> Drop for Wait<T> {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };
        // Settling drains the wakers, so only a pending value still holds ours.
        if let Ok(mut inner) = self.deferred.inner.try_borrow_mut() {
            if matches!(inner.state, State::Pending) && inner.wakers.contains(key) {
                inner.wakers.remove(key);
            }
        }
    }
}
