use std::cell::{Cell, RefCell};
use std::rc::Rc;

use deferred::runtime::Reactor;
use deferred::{Deferred, Error, Resolution, Snapshot, Status, Thenable};

/// Calls both callbacks right away, then reports an error.
struct Eager(i32);

impl Thenable<i32> for Eager {
    fn subscribe(
        self: Box<Self>,
        on_fulfilled: Box<dyn FnOnce(i32)>,
        on_rejected: Box<dyn FnOnce(Error)>,
    ) -> deferred::Result<()> {
        on_fulfilled(self.0);
        on_rejected(Error::from("ignored rejection"));
        Err(Error::from("ignored error"))
    }
}

/// Fails before calling either callback.
struct Broken;

impl Thenable<i32> for Broken {
    fn subscribe(
        self: Box<Self>,
        _on_fulfilled: Box<dyn FnOnce(i32)>,
        _on_rejected: Box<dyn FnOnce(Error)>,
    ) -> deferred::Result<()> {
        Err(Error::from("cannot subscribe"))
    }
}

/// Fulfills on a later reactor turn.
struct Later(i32);

impl Thenable<i32> for Later {
    fn subscribe(
        self: Box<Self>,
        on_fulfilled: Box<dyn FnOnce(i32)>,
        _on_rejected: Box<dyn FnOnce(Error)>,
    ) -> deferred::Result<()> {
        let value = self.0;
        Reactor::current().schedule(move || on_fulfilled(value));
        Ok(())
    }
}

#[deferred::test]
async fn resolve_then_identity() -> deferred::Result<()> {
    for value in [0, 1, -7, i64::MAX] {
        let out = Deferred::resolve(value).then(Ok).await?;
        assert_eq!(out, value);
    }
    let text = Deferred::resolve(String::from("meow")).then(Ok).await?;
    assert_eq!(text, "meow");
    Ok(())
}

#[deferred::test]
async fn then_maps_values() -> deferred::Result<()> {
    let out = Deferred::resolve(20)
        .then(|n| Ok(n + 1))
        .then(|n| Ok(n * 2))
        .then(|n| Ok(format!("{n}")))
        .await?;
    assert_eq!(out, "42");
    Ok(())
}

#[deferred::test]
async fn handler_error_rejects_downstream() {
    let chained = Deferred::resolve(1).then(|_| -> deferred::Result<i32> { Err(Error::from("bad")) });
    let fulfilled = Rc::new(Cell::new(false));
    {
        let fulfilled = fulfilled.clone();
        chained.subscribe(move |_| fulfilled.set(true), |_| {});
    }
    let err = chained.wait().await.unwrap_err();
    assert_eq!(err.to_string(), "bad");
    Reactor::current().run_until_stalled();
    assert!(!fulfilled.get());
}

#[deferred::test]
async fn handler_panic_rejects_downstream() {
    let chained = Deferred::resolve(1).then(|_| -> deferred::Result<i32> { panic!("handler blew up") });
    let err = chained.await.unwrap_err();
    assert!(matches!(err, Error::Panicked(_)));
    assert_eq!(err.to_string(), "panicked: handler blew up");
}

#[deferred::test]
async fn rejection_passes_through_then() {
    let recovered = Deferred::<i32>::reject("e")
        .then(|n| Ok(n + 1))
        .then(|n| Ok(n * 2))
        .catch(|reason| {
            assert_eq!(reason.to_string(), "e");
            Ok(-1)
        });
    assert_eq!(recovered.await.unwrap(), -1);
}

#[deferred::test]
async fn fulfillment_passes_through_catch() {
    let out = Deferred::resolve(5).catch(|_| Ok(0)).await.unwrap();
    assert_eq!(out, 5);
}

#[deferred::test]
async fn catch_can_rethrow() {
    let err = Deferred::<u8>::reject("first")
        .catch(|reason| Err(Error::msg(format!("wrapped {reason}"))))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "wrapped first");
}

#[deferred::test]
async fn then_with_recovers_from_rejection() {
    let out = Deferred::<u8>::reject("nope")
        .then_with(
            |n| Ok(Resolution::Value(n.to_string())),
            |reason| Ok(Resolution::Value(format!("recovered from {reason}"))),
        )
        .await
        .unwrap();
    assert_eq!(out, "recovered from nope");
}

#[deferred::test]
async fn chaining_cycle_is_rejected() {
    let slot: Rc<RefCell<Option<Deferred<i32>>>> = Rc::new(RefCell::new(None));
    let chained = {
        let slot = slot.clone();
        Deferred::resolve(1).and_then(move |_| {
            let current = slot.borrow().clone();
            current.ok_or_else(|| Error::from("unset"))
        })
    };
    *slot.borrow_mut() = Some(chained.clone());
    let err = chained.await.unwrap_err();
    assert!(err.is_chaining_cycle());
    slot.borrow_mut().take();
}

#[deferred::test]
async fn nested_deferreds_flatten() {
    let out = Deferred::resolve(1)
        .and_then(|n| Ok(Deferred::resolve(n + 1).and_then(|m| Ok(Deferred::resolve(m * 10)))))
        .await
        .unwrap();
    assert_eq!(out, 20);
}

#[test_log::test]
fn adopted_value_forwards_a_later_rejection() {
    let (inner, _fulfill, reject) = Deferred::<i32>::with_resolvers();
    let chained = {
        let inner = inner.clone();
        Deferred::resolve(()).and_then(move |_| Ok(inner))
    };
    let reactor = Reactor::current();
    reactor.run_until_stalled();
    assert_eq!(chained.status(), Status::Pending);

    reject.reject("inner failed");
    reactor.run_until_stalled();
    match chained.inspect() {
        Snapshot::Rejected(reason) => assert_eq!(reason.to_string(), "inner failed"),
        other => panic!("unexpected state: {other:?}"),
    }
    let _ = chained.catch(|_| Ok(0));
}

#[deferred::test]
async fn untrusted_thenable_only_counts_first_call() {
    let out = Deferred::resolve(())
        .then_with(
            |_| Ok(Resolution::<i32>::Thenable(Box::new(Eager(9)))),
            |reason| Err(reason),
        )
        .await
        .unwrap();
    assert_eq!(out, 9);
}

#[deferred::test]
async fn thenable_error_rejects() {
    let err = Deferred::<i32>::adopt(Broken).await.unwrap_err();
    assert_eq!(err.to_string(), "cannot subscribe");
}

#[deferred::test]
async fn thenable_settling_later_is_adopted() {
    let out = Deferred::<i32>::adopt(Later(11)).then(|n| Ok(n + 1)).await.unwrap();
    assert_eq!(out, 12);
}

#[deferred::test]
async fn adopt_mirrors_another_deferred() {
    let source = Deferred::resolve(3);
    let mirror = Deferred::adopt(source.clone());
    assert!(!mirror.ptr_eq(&source));
    assert_eq!(mirror.await.unwrap(), 3);
}

#[test_log::test]
fn continuation_is_never_run_inline() {
    let ran = Rc::new(Cell::new(false));
    let chained = {
        let ran = ran.clone();
        Deferred::resolve(1).then(move |n| {
            ran.set(true);
            Ok(n)
        })
    };
    assert!(!ran.get());
    assert_eq!(chained.status(), Status::Pending);
    Reactor::current().run_until_stalled();
    assert!(ran.get());
    assert_eq!(chained.status(), Status::Fulfilled);
}
