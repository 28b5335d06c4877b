//! Promises with callback chaining.
//!
//! A promise is a read-only handle to a value (or a [`Reason`] for failure)
//! that becomes available at most once. Producers own a
//! [`FulfillablePromise`] and hand out the [`Promise`] contract; consumers
//! subscribe with a terminal [`Leaf`] or build new promises with a [`Chain`].
//!
//! There is no executor: callbacks run synchronously on the thread that
//! settles the promise, or on the subscribing thread when the promise is
//! already settled.
//!
//! # Examples
//!
//! ```
//! use promise_chain::{fulfilled, wait, FulfillablePromise, Leaf, Promise};
//! use std::sync::mpsc::channel;
//!
//! let price = FulfillablePromise::<i32>::new();
//! let (tx, rx) = channel();
//! wait([price.clone().into_boxed(), fulfilled(3).into_boxed()])
//!     .map(|v: Vec<i32>| Ok(v.iter().product::<i32>()))
//!     .done(Leaf::on_fulfilled(move |total| tx.send(total).unwrap()));
//!
//! price.fulfill(14);
//! assert_eq!(rx.recv().unwrap(), 42);
//! ```
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

mod callback;
pub mod completion;
mod error;
mod forwarding;
mod fulfillable;
mod settled;
mod wait;

pub use callback::{Chain, Leaf};
pub use error::{Error, Reason};
pub use forwarding::Forwarding;
pub use fulfillable::FulfillablePromise;
pub use settled::{fulfilled, rejected, Settled};
pub use wait::wait;

/// A type-erased promise, as returned by chaining.
pub type BoxPromise<V> = Box<dyn Promise<V> + Send + Sync>;

/// A value of type `V` that may not be available yet.
///
/// A promise is pending, fulfilled with a value, or rejected with a
/// [`Reason`]. It leaves pending exactly once and never changes afterwards.
///
/// Only [`done`](Promise::done) has to be implemented; chaining is built on
/// top of it, so every implementation chains the same way.
pub trait Promise<V> {
    /// Registers a terminal callback.
    ///
    /// Runs it right away when the promise is already settled, otherwise
    /// when it settles, after every callback registered before it.
    fn done(&self, callback: Leaf<V>);

    /// Registers a chaining callback and returns the promise it feeds.
    ///
    /// The returned promise settles the way the promise produced by the
    /// callback eventually settles. A callback that fails rejects it.
    fn then<R>(&self, callback: Chain<V, R>) -> BoxPromise<R>
    where
        Self: Sized,
        V: 'static,
        R: Clone + Send + 'static,
    {
        let derived = FulfillablePromise::new();
        let target = derived.clone();
        self.done(Leaf::from_fn(move |outcome| callback.settle_into(outcome, target)));
        Box::new(derived)
    }

    /// Shorthand for `then(Chain::new(f))`.
    fn and_then<R, F, P>(&self, f: F) -> BoxPromise<R>
    where
        Self: Sized,
        V: 'static,
        R: Clone + Send + 'static,
        F: FnOnce(V) -> Result<P, Reason> + Send + 'static,
        P: Promise<R> + 'static,
    {
        self.then(Chain::new(f))
    }

    /// Maps the fulfilled value directly, without producing a promise.
    fn map<R, F>(&self, f: F) -> BoxPromise<R>
    where
        Self: Sized,
        V: 'static,
        R: Clone + Send + 'static,
        F: FnOnce(V) -> Result<R, Reason> + Send + 'static,
    {
        self.then(Chain::new(move |value| f(value).map(fulfilled)))
    }

    /// Turns a rejection back into a value; fulfillment passes through.
    fn recover<F>(&self, f: F) -> BoxPromise<V>
    where
        Self: Sized,
        V: Clone + Send + 'static,
        F: FnOnce(Reason) -> Result<V, Reason> + Send + 'static,
    {
        self.then(Chain::with_rejected(
            |value| Ok(fulfilled(value)),
            move |reason| f(reason).map(fulfilled),
        ))
    }

    /// Erases the promise type, for mixing promise kinds in one collection.
    fn into_boxed(self) -> BoxPromise<V>
    where
        Self: Sized + Send + Sync + 'static,
    {
        Box::new(self)
    }
}

impl<V, P> Promise<V> for Box<P>
where
    P: Promise<V> + ?Sized,
{
    fn done(&self, callback: Leaf<V>) {
        (**self).done(callback)
    }
}

impl<V, P> Promise<V> for Arc<P>
where
    P: Promise<V> + ?Sized,
{
    fn done(&self, callback: Leaf<V>) {
        (**self).done(callback)
    }
}

impl<V, P> Promise<V> for &P
where
    P: Promise<V> + ?Sized,
{
    fn done(&self, callback: Leaf<V>) {
        (**self).done(callback)
    }
}

/// Locks `mutex`, ignoring poison: callbacks never run under our locks.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
