use super::{Reactor, RUNNING};

use core::future::Future;
use core::pin::pin;
use core::task::Waker;
use core::task::{Context, Poll};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::Wake;

/// Start the event loop
///
/// Polls `fut` on the current thread, turning the thread's [`Reactor`]
/// whenever the future is pending. Jobs still queued when the future
/// completes stay queued.
///
/// # Panics
///
/// Panics if called inside another `block_on` on the same thread, and if the
/// future is pending while the reactor has no work left: nothing could ever
/// wake it again.
pub fn block_on<Fut>(fut: Fut) -> Fut::Output
where
    Fut: Future,
{
    if RUNNING.with(|running| running.replace(true)) {
        panic!("cannot deferred::runtime::block_on inside an existing block_on!")
    }
    let _running = RunningGuard;

    let reactor = Reactor::current();

    // Pin the future so it can be polled
    let mut fut = pin!(fut);

    // Create a new context to be passed to the future.
    let waker_impl = Arc::new(ReactorWaker::new());
    let waker = Waker::from(Arc::clone(&waker_impl));
    let mut cx = Context::from_waker(&waker);

    // Either the future completes and we return, or we turn the reactor
    // until something wakes it.
    loop {
        match fut.as_mut().poll(&mut cx) {
            Poll::Ready(res) => break res,
            Poll::Pending => {
                while !waker_impl.awake() {
                    if !reactor.turn() {
                        panic!("deferred::runtime::block_on stalled: the future is pending and no work is scheduled")
                    }
                }
                waker_impl.set_awake(false);
            }
        }
    }
}

/// Clears the running flag, also when the future panics.
struct RunningGuard;

impl Drop for RunningGuard {
    fn drop(&mut self) {
        RUNNING.with(|running| running.set(false));
    }
}

struct ReactorWaker {
    awake: AtomicBool,
}

impl ReactorWaker {
    fn new() -> Self {
        Self {
            awake: AtomicBool::new(false),
        }
    }

    #[inline]
    fn set_awake(&self, awake: bool) {
        self.awake.store(awake, Ordering::Relaxed);
    }

    #[inline]
    fn awake(&self) -> bool {
        self.awake.load(Ordering::Relaxed)
    }
}

impl Wake for ReactorWaker {
    fn wake(self: Arc<Self>) {
        self.set_awake(true);
    }
}
