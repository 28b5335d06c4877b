//! The two shapes of subscriber a [`Promise`](crate::Promise) accepts.
//!
//! A [`Leaf`] is chain-terminal: it consumes the outcome and returns nothing.
//! A [`Chain`] produces another promise, which the promise returned from
//! [`Promise::then`](crate::Promise::then) adopts.
use crate::{FulfillablePromise, Promise, Reason};
use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
};

type LeafFn<V> = Box<dyn FnOnce(Result<V, Reason>) + Send>;
type ChainFn<V, R> = Box<dyn FnOnce(Result<V, Reason>) -> Result<Box<dyn Promise<R>>, Reason> + Send>;

/// A terminal subscriber.
///
/// # Examples
///
/// ```
/// use promise_chain::{fulfilled, Leaf, Promise};
/// use std::sync::mpsc::channel;
/// let (tx, rx) = channel();
/// fulfilled(7).done(Leaf::on_fulfilled(move |v| tx.send(v).unwrap()));
/// assert_eq!(rx.recv().unwrap(), 7);
/// ```
pub struct Leaf<V> {
    call: LeafFn<V>,
}

impl<V> Leaf<V> {
    pub fn new<F, G>(on_fulfilled: F, on_rejected: G) -> Self
    where
        F: FnOnce(V) + Send + 'static,
        G: FnOnce(Reason) + Send + 'static,
    {
        Self::from_fn(move |outcome| match outcome {
            Ok(value) => on_fulfilled(value),
            Err(reason) => on_rejected(reason),
        })
    }

    /// A leaf that only handles fulfillment.
    ///
    /// A rejection reaching this leaf is not swallowed: it unwinds out of
    /// whichever call delivered it (the `reject` that settled the promise, or
    /// the `done` that subscribed to an already rejected one) with the
    /// [`Reason`] as panic payload.
    pub fn on_fulfilled<F>(on_fulfilled: F) -> Self
    where
        F: FnOnce(V) + Send + 'static,
    {
        Self::new(on_fulfilled, escalate)
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce(Result<V, Reason>) + Send + 'static,
    {
        Self { call: Box::new(f) }
    }

    pub(crate) fn call(self, outcome: Result<V, Reason>) {
        (self.call)(outcome)
    }
}

impl<V> fmt::Debug for Leaf<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Leaf").finish_non_exhaustive()
    }
}

fn escalate(reason: Reason) {
    tracing::warn!(%reason, "unhandled rejection reached a leaf callback");
    panic::panic_any(reason)
}

/// A subscriber that produces the next promise in a chain.
///
/// Either branch may fail by returning `Err(reason)` or by panicking; both
/// become the rejection of the derived promise and never reach the caller
/// that registered or settled.
///
/// # Examples
///
/// ```
/// use promise_chain::{Chain, FulfillablePromise, Leaf, Promise};
/// use std::sync::mpsc::channel;
/// let source = FulfillablePromise::<i32>::new();
/// let inner = FulfillablePromise::<&str>::new();
/// let next = inner.clone();
/// let (tx, rx) = channel();
/// source
///     .then(Chain::new(move |_| Ok(next)))
///     .done(Leaf::on_fulfilled(move |v| tx.send(v).unwrap()));
/// source.fulfill(1);
/// assert!(rx.try_recv().is_err());
/// inner.fulfill("done");
/// assert_eq!(rx.recv().unwrap(), "done");
/// ```
pub struct Chain<V, R> {
    call: ChainFn<V, R>,
}

impl<V, R> Chain<V, R> {
    /// Chains on fulfillment; a rejection passes through unchanged.
    pub fn new<F, P>(on_fulfilled: F) -> Self
    where
        F: FnOnce(V) -> Result<P, Reason> + Send + 'static,
        P: Promise<R> + 'static,
    {
        Self::from_fn(move |outcome| match outcome {
            Ok(value) => on_fulfilled(value),
            Err(reason) => Err(reason),
        })
    }

    pub fn with_rejected<F, G, P, Q>(on_fulfilled: F, on_rejected: G) -> Self
    where
        F: FnOnce(V) -> Result<P, Reason> + Send + 'static,
        G: FnOnce(Reason) -> Result<Q, Reason> + Send + 'static,
        P: Promise<R> + 'static,
        Q: Promise<R> + 'static,
    {
        Self {
            call: Box::new(move |outcome: Result<V, Reason>| match outcome {
                Ok(value) => on_fulfilled(value).map(|p| Box::new(p) as Box<dyn Promise<R>>),
                Err(reason) => on_rejected(reason).map(|q| Box::new(q) as Box<dyn Promise<R>>),
            }),
        }
    }

    pub fn from_fn<F, P>(f: F) -> Self
    where
        F: FnOnce(Result<V, Reason>) -> Result<P, Reason> + Send + 'static,
        P: Promise<R> + 'static,
    {
        Self {
            call: Box::new(move |outcome| f(outcome).map(|p| Box::new(p) as Box<dyn Promise<R>>)),
        }
    }

    /// Runs the matching branch, turning a panic into a rejection.
    fn call(self, outcome: Result<V, Reason>) -> Result<Box<dyn Promise<R>>, Reason> {
        let call = self.call;
        match panic::catch_unwind(AssertUnwindSafe(move || call(outcome))) {
            Ok(next) => next,
            Err(payload) => Err(Reason::from_panic(payload)),
        }
    }
}

impl<V, R> Chain<V, R>
where
    R: Clone + Send + 'static,
{
    /// Runs the callback and makes `derived` follow whatever it produced.
    pub(crate) fn settle_into(self, outcome: Result<V, Reason>, derived: FulfillablePromise<R>) {
        match self.call(outcome) {
            Ok(next) => derived.adopt(&*next),
            Err(reason) => {
                tracing::debug!(%reason, "chaining callback failed, rejecting derived promise");
                derived.reject(reason);
            }
        }
    }
}

impl<V, R> fmt::Debug for Chain<V, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain").finish_non_exhaustive()
    }
}
