use crate::{lock, Error, Leaf, Promise, Reason};
use std::{
    fmt, mem,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard},
};

/// The settable side of a promise.
///
/// Clones share the same state, so a producer can keep one handle to settle
/// and hand others out as the read-only [`Promise`] contract.
///
/// # Examples
///
/// ```
/// use promise_chain::{FulfillablePromise, Leaf, Promise};
/// use futures::executor::block_on;
/// use std::{sync::mpsc::channel, thread};
/// let promise = FulfillablePromise::<String>::new();
/// let (tx, rx) = channel();
/// promise.done(Leaf::on_fulfilled(move |v| tx.send(v).unwrap()));
///
/// let producer = promise.clone();
/// let task = thread::spawn(move || block_on(async {
///     producer.fulfill(String::from("🍓"));
/// }));
/// task.join().expect("The task thread has panicked.");
/// assert_eq!(rx.recv().unwrap(), "🍓");
/// ```
pub struct FulfillablePromise<V> {
    promise: Arc<Mutex<Inner<V>>>,
}

enum Inner<V> {
    /// Callbacks waiting for settlement, in registration order.
    Pending(Vec<Leaf<V>>),
    Settled(Result<V, Reason>),
}

impl<V> FulfillablePromise<V> {
    pub fn new() -> Self {
        Self {
            promise: Arc::new(Mutex::new(Inner::Pending(Vec::new()))),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.inner(), Inner::Pending(_))
    }

    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }

    fn inner(&self) -> MutexGuard<'_, Inner<V>> {
        lock(&self.promise)
    }
}

impl<V> FulfillablePromise<V>
where
    V: Clone + Send + 'static,
{
    /// Fulfills the promise and runs every waiting callback, in order.
    ///
    /// # Panics
    ///
    /// If the promise is already settled, or if a waiting [`Leaf`] lets a
    /// failure escape.
    pub fn fulfill(&self, value: V) {
        if let Err(err) = self.try_fulfill(value) {
            tracing::error!(%err, "fulfill called on an already settled promise");
            panic!("cannot fulfill promise: {err}");
        }
    }

    /// Rejects the promise and runs every waiting callback, in order.
    ///
    /// # Panics
    ///
    /// If the promise is already settled, or if a waiting [`Leaf`] does not
    /// handle the rejection.
    pub fn reject(&self, reason: impl Into<Reason>) {
        if let Err(err) = self.try_reject(reason) {
            tracing::error!(%err, "reject called on an already settled promise");
            panic!("cannot reject promise: {err}");
        }
    }

    pub fn try_fulfill(&self, value: V) -> Result<(), Error> {
        self.settle(Ok(value))
    }

    pub fn try_reject(&self, reason: impl Into<Reason>) -> Result<(), Error> {
        self.settle(Err(reason.into()))
    }

    /// Makes this promise settle the way `source` eventually settles.
    pub(crate) fn adopt<P>(&self, source: &P)
    where
        P: Promise<V> + ?Sized,
    {
        let on_fulfilled = self.clone();
        let on_rejected = self.clone();
        source.done(Leaf::new(
            move |value| on_fulfilled.fulfill(value),
            move |reason| on_rejected.reject(reason),
        ));
    }

    fn settle(&self, outcome: Result<V, Reason>) -> Result<(), Error> {
        let handlers = {
            let mut inner = self.inner();
            match mem::replace(&mut *inner, Inner::Settled(outcome.clone())) {
                Inner::Pending(handlers) => handlers,
                previous @ Inner::Settled(_) => {
                    *inner = previous;
                    return Err(Error::AlreadySettled);
                }
            }
        };
        tracing::trace!(
            fulfilled = outcome.is_ok(),
            handlers = handlers.len(),
            "promise settled"
        );
        // Run outside the lock so callbacks may subscribe to this promise.
        // An escaping failure is held until every handler has run.
        let mut escaped = None;
        for handler in handlers {
            let outcome = outcome.clone();
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler.call(outcome))) {
                escaped.get_or_insert(payload);
            }
        }
        if let Some(payload) = escaped {
            panic::resume_unwind(payload);
        }
        Ok(())
    }
}

impl<V> Promise<V> for FulfillablePromise<V>
where
    V: Clone,
{
    fn done(&self, callback: Leaf<V>) {
        let outcome = {
            let mut inner = self.inner();
            match &mut *inner {
                Inner::Pending(handlers) => {
                    handlers.push(callback);
                    return;
                }
                Inner::Settled(outcome) => outcome.clone(),
            }
        };
        callback.call(outcome);
    }
}

impl<V> Clone for FulfillablePromise<V> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
        }
    }
}

impl<V> Default for FulfillablePromise<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for FulfillablePromise<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.inner() {
            Inner::Pending(handlers) => f
                .debug_struct("FulfillablePromise")
                .field("handlers", &handlers.len())
                .finish(),
            Inner::Settled(outcome) => f
                .debug_struct("FulfillablePromise")
                .field("outcome", outcome)
                .finish(),
        }
    }
}
