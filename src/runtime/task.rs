use crate::Error;

use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll, Waker};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::Wake;

use pin_project_lite::pin_project;

/// Keys of spawned tasks that were woken since the last reactor turn.
///
/// Wakers must be `Send + Sync`, so this is the one piece of reactor state
/// behind a lock.
#[derive(Debug, Clone, Default)]
pub(crate) struct WakeQueue(Arc<Mutex<VecDeque<usize>>>);

impl WakeQueue {
    fn push(&self, key: usize) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(key);
    }

    pub(crate) fn drain(&self) -> Vec<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// A future spawned onto the reactor.
pub(crate) struct Task {
    future: Pin<Box<dyn Future<Output = ()>>>,
    waker: Waker,
}

impl Task {
    pub(crate) fn new(key: usize, woken: &WakeQueue, future: Pin<Box<dyn Future<Output = ()>>>) -> Self {
        let waker = Waker::from(Arc::new(TaskWaker {
            key,
            woken: woken.clone(),
        }));
        Self { future, waker }
    }

    pub(crate) fn poll(&mut self) -> Poll<()> {
        let mut cx = Context::from_waker(&self.waker);
        self.future.as_mut().poll(&mut cx)
    }

    /// Queue the task for its first poll.
    pub(crate) fn schedule(&self) {
        self.waker.wake_by_ref();
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}

struct TaskWaker {
    key: usize,
    woken: WakeQueue,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.woken.push(self.key);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.woken.push(self.key);
    }
}

pin_project! {
    /// Turns a panic while polling the inner future into an [`Error::Panicked`].
    #[must_use = "futures do nothing unless polled or .awaited"]
    pub(crate) struct CatchUnwind<F> {
        #[pin]
        future: F,
    }
}

impl<F: Future> CatchUnwind<F> {
    pub(crate) fn new(future: F) -> Self {
        Self { future }
    }
}

impl<F: Future> Future for CatchUnwind<F> {
    type Output = Result<F::Output, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let future = self.project().future;
        match panic::catch_unwind(AssertUnwindSafe(|| future.poll(cx))) {
            Ok(Poll::Ready(output)) => Poll::Ready(Ok(output)),
            Ok(Poll::Pending) => Poll::Pending,
            Err(payload) => Poll::Ready(Err(Error::from_panic(payload))),
        }
    }
}
