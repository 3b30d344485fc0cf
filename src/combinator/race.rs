use crate::{Deferred, Thenable};

/// Settle the same way as whichever input settles first.
///
/// Later settlements are ignored, including extra callbacks from a foreign
/// [`Thenable`]. With no inputs the returned value stays
/// pending forever; awaiting it inside
/// [`block_on`](crate::runtime::block_on) panics once the reactor runs dry.
///
/// # Examples
///
/// ```
/// use deferred::{race, runtime::block_on, Deferred};
///
/// let never = Deferred::new(|_, _| Ok(()));
/// let winner = race([never, Deferred::resolve("fast")]);
/// assert_eq!(block_on(winner.wait()).unwrap(), "fast");
/// ```
pub fn race<T, I>(values: I) -> Deferred<T>
where
    T: Clone + 'static,
    I: IntoIterator,
    I::Item: Thenable<T> + 'static,
{
    Deferred::new(move |fulfill, reject| {
        for value in values {
            let fulfill = fulfill.clone();
            let reject = reject.clone();
            Deferred::<T>::adopt(value).subscribe(
                move |value| fulfill.fulfill(value),
                move |reason| reject.reject(reason),
            );
        }
        Ok(())
    })
}
