use std::cell::RefCell;
use std::rc::Rc;

use deferred::runtime::{block_on, Reactor};
use deferred::{race, Deferred, Error};
use futures_core::future::FusedFuture;

fn explode() -> deferred::Result<u8> {
    panic!("in future")
}

#[test]
#[should_panic(expected = "inside an existing block_on")]
fn nested_block_on_panics() {
    block_on(async { block_on(async {}) })
}

#[test]
#[should_panic(expected = "stalled")]
fn awaiting_a_race_of_nothing_stalls() {
    let _ = block_on(race(Vec::<Deferred<u8>>::new()).wait());
}

#[test_log::test]
fn block_on_can_be_called_again() {
    assert_eq!(block_on(Deferred::resolve(1).wait()).unwrap(), 1);
    assert_eq!(block_on(Deferred::resolve(2).wait()).unwrap(), 2);
}

#[deferred::test]
async fn from_future_settles_with_output() {
    let deferred = Deferred::from_future(async {
        let n = Deferred::resolve(1).await?;
        Ok(n + 1)
    });
    assert_eq!(deferred.await.unwrap(), 2);
}

#[deferred::test]
async fn from_future_rejects_on_error_and_panic() {
    let failed = Deferred::<u8>::from_future(async { Err(Error::from("async failure")) });
    assert_eq!(failed.await.unwrap_err().to_string(), "async failure");

    let panicked = Deferred::from_future(async { explode() });
    assert!(matches!(panicked.await, Err(Error::Panicked(_))));
}

#[deferred::test]
async fn dropped_wait_is_deregistered() {
    let (deferred, fulfill, _) = Deferred::with_resolvers();
    assert!(futures_lite::future::poll_once(deferred.wait()).await.is_none());
    fulfill.fulfill(4);
    assert_eq!(deferred.await.unwrap(), 4);
}

#[deferred::test]
async fn wait_is_fused() {
    let mut wait = Deferred::resolve(1).wait();
    assert!(!wait.is_terminated());
    assert_eq!((&mut wait).await.unwrap(), 1);
    assert!(wait.is_terminated());
}

#[test_log::test]
fn unhandled_rejections_are_reported() {
    let reactor = Reactor::current();
    let seen = Rc::new(RefCell::new(Vec::new()));
    {
        let seen = seen.clone();
        reactor.on_unhandled_rejection(move |reason| seen.borrow_mut().push(reason.to_string()));
    }

    drop(Deferred::<u8>::reject("nobody listened"));

    let handled = Deferred::<u8>::reject("caught");
    let recovered = handled.catch(|_| Ok(0));
    drop(handled);

    let forwarded = Deferred::<u8>::reject("forwarded").then(Ok);
    reactor.run_until_stalled();
    drop(recovered);
    assert_eq!(*seen.borrow(), vec!["nobody listened"]);

    drop(forwarded);
    assert_eq!(*seen.borrow(), vec!["nobody listened", "forwarded"]);
}

#[test]
fn thread_exit_drops_queued_work() {
    let (sender, receiver) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let reactor = Reactor::current();
        reactor.on_unhandled_rejection(move |reason| {
            let _ = sender.send(reason.to_string());
        });
        let rejected = Deferred::<u8>::reject("left behind");
        reactor.schedule(move || drop(rejected));
    })
    .join()
    .unwrap();
    assert_eq!(receiver.try_recv().ok().as_deref(), Some("left behind"));
}
