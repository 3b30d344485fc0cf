use crate::{Deferred, Thenable};

use std::cell::RefCell;
use std::rc::Rc;

/// Results collected so far, one slot per input.
struct Slots<T> {
    values: Vec<Option<T>>,
    remaining: usize,
}

/// Wait for every input to fulfill.
///
/// The returned value fulfills with the results in input order, or rejects
/// with the first reason any input rejects with. Inputs settling after that
/// are observed but ignored. An empty input fulfills with an empty `Vec`.
///
/// Each input is adopted first, so a foreign [`Thenable`] only counts with
/// its first callback, and an error it returns after that is ignored.
///
/// # Examples
///
/// ```
/// use deferred::{all, runtime::block_on, Deferred};
///
/// let values = all([Deferred::resolve(1), Deferred::resolve(2), Deferred::resolve(3)]);
/// assert_eq!(block_on(values.wait()).unwrap(), vec![1, 2, 3]);
/// ```
pub fn all<T, I>(values: I) -> Deferred<Vec<T>>
where
    T: Clone + 'static,
    I: IntoIterator,
    I::Item: Thenable<T> + 'static,
{
    let values: Vec<_> = values.into_iter().collect();
    Deferred::new(move |fulfill, reject| {
        if values.is_empty() {
            fulfill.fulfill(Vec::new());
            return Ok(());
        }
        let slots = Rc::new(RefCell::new(Slots {
            values: values.iter().map(|_| None).collect(),
            remaining: values.len(),
        }));
        for (index, value) in values.into_iter().enumerate() {
            let slots = slots.clone();
            let fulfill = fulfill.clone();
            let reject = reject.clone();
            Deferred::<T>::adopt(value).subscribe(
                move |value| {
                    let mut slots = slots.borrow_mut();
                    slots.values[index] = Some(value);
                    slots.remaining -= 1;
                    if slots.remaining == 0 {
                        let values = slots.values.drain(..).flatten().collect();
                        drop(slots);
                        fulfill.fulfill(values);
                    }
                },
                move |reason| reject.reject(reason),
            );
        }
        Ok(())
    })
}
