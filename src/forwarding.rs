use crate::{Leaf, Promise};
use std::sync::OnceLock;

/// A promise with no state of its own that defers to a delegate.
///
/// The delegate is obtained from `resolve` the first time anything
/// subscribes, which lets a type present itself as a promise before the
/// promise backing it exists.
///
/// # Examples
///
/// ```
/// use promise_chain::{Forwarding, FulfillablePromise, Leaf, Promise};
/// use std::sync::mpsc::channel;
/// let engine = FulfillablePromise::<u16>::new();
/// let shared = engine.clone();
/// let response = Forwarding::new(move || shared.clone());
/// let (tx, rx) = channel();
/// response.done(Leaf::on_fulfilled(move |status| tx.send(status).unwrap()));
/// engine.fulfill(200);
/// assert_eq!(rx.recv().unwrap(), 200);
/// ```
pub struct Forwarding<P, F> {
    delegate: OnceLock<P>,
    resolve: F,
}

impl<P, F> Forwarding<P, F>
where
    F: Fn() -> P,
{
    pub fn new(resolve: F) -> Self {
        Self {
            delegate: OnceLock::new(),
            resolve,
        }
    }

    /// The promise every call is forwarded to, resolved on first use.
    pub fn delegate(&self) -> &P {
        self.delegate.get_or_init(|| (self.resolve)())
    }
}

impl<P> Forwarding<P, fn() -> P> {
    /// A forwarding promise whose delegate already exists.
    pub fn resolved(delegate: P) -> Self {
        Self {
            delegate: OnceLock::from(delegate),
            resolve: || unreachable!("delegate is set at construction"),
        }
    }
}

impl<V, P, F> Promise<V> for Forwarding<P, F>
where
    P: Promise<V>,
    F: Fn() -> P,
{
    fn done(&self, callback: Leaf<V>) {
        self.delegate().done(callback)
    }
}
