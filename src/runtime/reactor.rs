use super::task::{CatchUnwind, Task, WakeQueue};
use super::REACTOR;
use crate::Error;

use core::cell::RefCell;
use core::future::Future;
use core::task::Poll;
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::rc::Rc;

use slab::Slab;

/// A unit of deferred work.
enum Job {
    /// Run a closure.
    Call(Box<dyn FnOnce()>),
    /// Poll the spawned task stored under this key.
    Poll(usize),
}

type UnhandledHook = Rc<dyn Fn(&Error)>;

/// The deferred-dispatch queue of the current thread.
///
/// Jobs run strictly in the order they were scheduled, one per
/// [`turn`](Reactor::turn), and never inside the call that scheduled them.
#[derive(Clone)]
pub struct Reactor {
    inner: Rc<RefCell<InnerReactor>>,
}

/// The private, internal `Reactor` implementation - factored out so we can take
/// a borrow of the whole.
struct InnerReactor {
    jobs: VecDeque<Job>,
    tasks: Slab<Option<Task>>,
    woken: WakeQueue,
    unhandled: Option<UnhandledHook>,
}

impl InnerReactor {
    /// Move woken tasks onto the back of the job queue.
    fn collect_woken(&mut self) {
        for key in self.woken.drain() {
            self.jobs.push_back(Job::Poll(key));
        }
    }
}

impl Reactor {
    /// Return the `Reactor` of the current thread.
    pub fn current() -> Self {
        REACTOR.with(|local| local.0.clone())
    }

    /// Create a new instance of `Reactor`
    pub(crate) fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(InnerReactor {
                jobs: VecDeque::new(),
                tasks: Slab::new(),
                woken: WakeQueue::default(),
                unhandled: None,
            })),
        }
    }

    /// Schedule `job` to run on a later turn.
    pub fn schedule<F>(&self, job: F)
    where
        F: FnOnce() + 'static,
    {
        self.inner
            .borrow_mut()
            .jobs
            .push_back(Job::Call(Box::new(job)));
    }

    /// Run a future on this reactor.
    ///
    /// The future is first polled on a later turn, and again each time its
    /// waker fires. A task that panics is dropped and the panic is logged.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + 'static,
    {
        let future = Box::pin(async move {
            if let Err(err) = CatchUnwind::new(future).await {
                tracing::error!(error = %err, "spawned task panicked");
            }
        });
        let mut reactor = self.inner.borrow_mut();
        let woken = reactor.woken.clone();
        let entry = reactor.tasks.vacant_entry();
        let key = entry.key();
        let task = Task::new(key, &woken, future);
        task.schedule();
        entry.insert(Some(task));
        tracing::trace!(key, "spawned task");
    }

    /// Run the next queued job.
    ///
    /// Returns `false` if there was nothing to run. A panic raised by the job
    /// propagates to the caller.
    pub fn turn(&self) -> bool {
        let job = {
            let mut reactor = self.inner.borrow_mut();
            reactor.collect_woken();
            reactor.jobs.pop_front()
        };
        match job {
            Some(Job::Call(job)) => {
                tracing::trace!("running deferred job");
                job();
                true
            }
            Some(Job::Poll(key)) => {
                self.poll_task(key);
                true
            }
            None => false,
        }
    }

    /// Turn the reactor until no work is left, returning the number of turns.
    ///
    /// Jobs scheduled by running jobs are run too. This does not return if
    /// the jobs keep rescheduling themselves.
    pub fn run_until_stalled(&self) -> usize {
        let mut turns = 0;
        while self.turn() {
            turns += 1;
        }
        turns
    }

    /// The number of jobs waiting to run, including woken tasks.
    pub fn pending_jobs(&self) -> usize {
        let reactor = self.inner.borrow();
        reactor.jobs.len() + reactor.woken.len()
    }

    /// Returns `true` if no job is waiting to run.
    pub fn is_idle(&self) -> bool {
        self.pending_jobs() == 0
    }

    /// Install the hook called when a rejected [`Deferred`](crate::Deferred)
    /// is dropped without any handler ever being attached to it.
    ///
    /// Without a hook such rejections are logged at `warn` level.
    pub fn on_unhandled_rejection<F>(&self, hook: F)
    where
        F: Fn(&Error) + 'static,
    {
        self.inner.borrow_mut().unhandled = Some(Rc::new(hook));
    }

    /// Drop every queued job and spawned task without running them.
    ///
    /// Unhandled rejections kept alive only by that work are reported.
    pub(crate) fn clear(&self) {
        loop {
            let (jobs, tasks) = {
                let mut reactor = self.inner.borrow_mut();
                reactor.woken.drain();
                (mem::take(&mut reactor.jobs), mem::take(&mut reactor.tasks))
            };
            if jobs.is_empty() && tasks.is_empty() {
                return;
            }
            tracing::trace!(jobs = jobs.len(), tasks = tasks.len(), "dropping unfinished work");
            drop(jobs);
            drop(tasks);
        }
    }

    pub(crate) fn report_unhandled(&self, err: &Error) {
        let hook = self
            .inner
            .try_borrow()
            .ok()
            .and_then(|reactor| reactor.unhandled.clone());
        match hook {
            Some(hook) => hook(err),
            None => tracing::warn!(error = %err, "unhandled rejection of a deferred value"),
        }
    }

    fn poll_task(&self, key: usize) {
        // Take the task out so it can schedule work on this reactor while polled.
        let task = self
            .inner
            .borrow_mut()
            .tasks
            .get_mut(key)
            .and_then(Option::take);
        let Some(mut task) = task else {
            return;
        };
        tracing::trace!(key, "polling task");
        match task.poll() {
            Poll::Ready(()) => {
                self.inner.borrow_mut().tasks.remove(key);
                tracing::trace!(key, "task completed");
            }
            Poll::Pending => {
                if let Some(slot) = self.inner.borrow_mut().tasks.get_mut(key) {
                    *slot = Some(task);
                }
            }
        }
    }
}

impl fmt::Debug for Reactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(reactor) => f
                .debug_struct("Reactor")
                .field("jobs", &reactor.jobs.len())
                .field("tasks", &reactor.tasks.len())
                .field("woken", &reactor.woken.len())
                .finish(),
            Err(_) => f.debug_struct("Reactor").finish_non_exhaustive(),
        }
    }
}
