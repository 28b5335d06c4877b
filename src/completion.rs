//! Bridges between promises and other completion mechanisms.
//!
//! [`wrap`] turns anything that reports completion through a one-shot
//! listener into a promise. [`into_future`] goes the other way and exposes a
//! promise as a [`Future`], driven by a leaf subscription on the promise.
use crate::{lock, BoxPromise, Error, FulfillablePromise, Leaf, Promise, Reason};
use std::{
    fmt,
    future::Future,
    panic::{self, AssertUnwindSafe},
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll, Waker},
    thread,
};

/// The settable end handed to an external completion source by [`wrap`].
///
/// Settling consumes the listener, so it can only happen once. Dropping it
/// unsettled rejects the promise with [`Error::Abandoned`].
pub struct Listener<V>
where
    V: Clone + Send + 'static,
{
    promise: Option<FulfillablePromise<V>>,
}

impl<V> Listener<V>
where
    V: Clone + Send + 'static,
{
    pub fn fulfill(self, value: V) {
        self.settle(Ok(value))
    }

    pub fn reject(self, reason: impl Into<Reason>) {
        self.settle(Err(reason.into()))
    }

    pub fn settle(mut self, outcome: Result<V, Reason>) {
        if let Some(promise) = self.promise.take() {
            match outcome {
                Ok(value) => promise.fulfill(value),
                Err(reason) => promise.reject(reason),
            }
        }
    }
}

impl<V> Drop for Listener<V>
where
    V: Clone + Send + 'static,
{
    /// If this listener was never settled, reject with `Abandoned`.
    fn drop(&mut self) {
        if let Some(promise) = self.promise.take() {
            tracing::debug!("completion listener dropped without settling");
            if !thread::panicking() {
                promise.reject(Error::Abandoned);
                return;
            }
            // Already unwinding: a second panic escaping here would abort.
            let contained =
                panic::catch_unwind(AssertUnwindSafe(|| promise.try_reject(Error::Abandoned)));
            if contained.is_err() {
                tracing::warn!("unhandled rejection discarded while unwinding");
            }
        }
    }
}

impl<V> fmt::Debug for Listener<V>
where
    V: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("settled", &self.promise.is_none())
            .finish()
    }
}

/// Builds a promise from a source that reports completion to a listener.
///
/// # Examples
///
/// ```
/// use promise_chain::{completion, Leaf, Promise};
/// use std::{sync::mpsc::channel, thread};
/// let promise = completion::wrap(|listener| {
///     thread::spawn(move || listener.fulfill(String::from("🍓")));
/// });
/// let (tx, rx) = channel();
/// promise.done(Leaf::on_fulfilled(move |v| tx.send(v).unwrap()));
/// assert_eq!(rx.recv().unwrap(), "🍓");
/// ```
pub fn wrap<V, F>(subscribe: F) -> BoxPromise<V>
where
    V: Clone + Send + 'static,
    F: FnOnce(Listener<V>),
{
    let promise = FulfillablePromise::new();
    subscribe(Listener {
        promise: Some(promise.clone()),
    });
    Box::new(promise)
}

#[derive(Debug)]
enum WakerState {
    Fresh,
    Tainted,
}

struct Inner<V> {
    value: Option<Result<V, Reason>>,
    waker: Result<Waker, WakerState>,
}

/// A [`Future`] resolving to the outcome of a promise.
///
/// # Examples
///
/// ```
/// use promise_chain::{completion, FulfillablePromise};
/// use futures::executor::block_on;
/// use std::thread;
/// let promise = FulfillablePromise::<u32>::new();
/// let completion = completion::into_future(&promise);
///
/// let task = thread::spawn(move || block_on(completion));
/// promise.fulfill(7);
/// assert_eq!(task.join().expect("The task thread has panicked.").unwrap(), 7);
/// ```
pub struct Completion<V> {
    promise: Arc<Mutex<Inner<V>>>,
}

/// The write side of a [`Completion`], owned by the leaf subscription.
struct Notifier<V> {
    promise: Arc<Mutex<Inner<V>>>,
}

/// Subscribes to `promise` and returns a future of its outcome.
///
/// If the subscription is discarded without ever firing (the promise was
/// dropped while pending), the future resolves to [`Error::Abandoned`].
pub fn into_future<V, P>(promise: &P) -> Completion<V>
where
    V: Send + 'static,
    P: Promise<V> + ?Sized,
{
    let inner = Arc::new(Mutex::new(Inner {
        value: None,
        waker: Err(WakerState::Fresh),
    }));
    let notifier = Notifier {
        promise: inner.clone(),
    };
    promise.done(Leaf::from_fn(move |outcome| notifier.complete(outcome)));
    Completion { promise: inner }
}

impl<V> Notifier<V> {
    fn complete(self, outcome: Result<V, Reason>) {
        let mut promise = lock(&self.promise);
        promise.value = Some(outcome);
        if let Ok(waker) = std::mem::replace(&mut promise.waker, Err(WakerState::Tainted)) {
            waker.wake()
        }
    }
}

impl<V> Drop for Notifier<V> {
    /// If the outcome never arrived, wake the consumer so it sees `Abandoned`.
    fn drop(&mut self) {
        let mut promise = lock(&self.promise);
        if let Ok(waker) = std::mem::replace(&mut promise.waker, Err(WakerState::Tainted)) {
            waker.wake()
        }
    }
}

impl<V> Future for Completion<V> {
    type Output = Result<V, Reason>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut promise = lock(&self.promise);
        match promise.value.take() {
            Some(outcome) => Poll::Ready(outcome),
            None => match std::mem::replace(&mut promise.waker, Ok(cx.waker().clone())) {
                Err(WakerState::Tainted) => Poll::Ready(Err(Error::Abandoned.into())),
                _ => Poll::Pending,
            },
        }
    }
}

impl<V> fmt::Debug for Completion<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let promise = lock(&self.promise);
        f.debug_struct("Completion")
            .field("ready", &promise.value.is_some())
            .field("waker", &promise.waker.as_ref().err())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{into_future, wrap};
    use crate::{rejected, Error, FulfillablePromise, Leaf, Promise, Reason};
    use futures::executor::block_on;
    use std::{
        panic::{self, AssertUnwindSafe},
        sync::mpsc::channel,
        thread,
    };

    #[test]
    fn test_into_future_resolve() {
        let promise = FulfillablePromise::<String>::new();
        let completion = into_future(&promise);
        let task1 = thread::spawn(move || block_on(completion));
        let task2 = thread::spawn(move || {
            block_on(async {
                promise.fulfill(String::from("🍓"));
            })
        });
        task2.join().expect("The task2 thread has panicked");
        let value = task1.join().expect("The task1 thread has panicked");
        assert_eq!(value.unwrap(), "🍓");
    }

    #[test]
    fn test_into_future_already_rejected() {
        let reason = Reason::msg("reject!!");
        let outcome = block_on(into_future(&rejected::<()>(reason.clone())));
        assert!(outcome.unwrap_err().ptr_eq(&reason));
    }

    #[test]
    fn test_into_future_unresolved() {
        let promise = FulfillablePromise::<String>::new();
        let completion = into_future(&promise);
        let task1 = thread::spawn(move || block_on(completion));
        let task2 = thread::spawn(move || {
            // The last handle goes away with the leaf still queued.
            std::mem::drop(promise);
        });
        task2.join().expect("The task2 thread has panicked");
        let outcome = task1.join().expect("The task1 thread has panicked");
        assert_eq!(
            outcome.unwrap_err().downcast_ref::<Error>(),
            Some(&Error::Abandoned)
        );
    }

    #[test]
    fn test_wrap_settles_once() {
        let (tx, rx) = channel();
        let promise = wrap::<i32, _>(|listener| {
            thread::spawn(move || listener.reject(Reason::msg("refused")))
                .join()
                .expect("The listener thread has panicked");
        });
        promise.done(Leaf::new(|_| panic!("unexpected fulfillment"), move |r| {
            tx.send(r.to_string()).unwrap()
        }));
        assert_eq!(rx.recv().unwrap(), "refused");
    }

    #[test]
    fn test_wrap_dropped_listener_is_abandoned() {
        let mut kept = None;
        let promise = wrap::<i32, _>(|listener| kept = Some(listener));
        let (tx, rx) = channel();
        promise.done(Leaf::new(|_| panic!("unexpected fulfillment"), move |r: Reason| {
            tx.send(r.downcast_ref::<Error>().cloned()).unwrap()
        }));
        assert!(rx.try_recv().is_err());
        drop(kept);
        assert_eq!(rx.recv().unwrap(), Some(Error::Abandoned));
    }

    #[test]
    fn test_listener_dropped_while_unwinding_is_contained() {
        let mut kept = None;
        let promise = wrap::<i32, _>(|listener| kept = Some(listener));
        let (tx, rx) = channel();
        promise.done(Leaf::on_fulfilled(|_| {}));
        promise.done(Leaf::new(|_| panic!("unexpected fulfillment"), move |r: Reason| {
            tx.send(r.downcast_ref::<Error>().cloned()).unwrap()
        }));

        let listener = kept.take();
        let payload = panic::catch_unwind(AssertUnwindSafe(move || {
            let _listener = listener;
            panic!("source failed");
        }))
        .unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"source failed"));
        assert_eq!(rx.recv().unwrap(), Some(Error::Abandoned));
    }

    #[test]
    fn test_round_trip_through_future() {
        let promise = wrap(|listener| listener.settle(Ok(5_u8)));
        assert_eq!(block_on(into_future(&promise)).unwrap(), 5);
    }
}
