use crate::{lock, BoxPromise, FulfillablePromise, Leaf, Promise, Reason};
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

/// Waits for every promise and fulfills with their values, in input order.
///
/// Rejects with the first rejection to arrive; later outcomes are ignored.
/// An empty input fulfills right away with an empty `Vec`.
///
/// # Examples
///
/// ```
/// use promise_chain::{fulfilled, rejected, wait, Leaf, Promise, Reason};
/// use std::sync::mpsc::channel;
/// let (tx, rx) = channel();
/// wait([fulfilled("a"), fulfilled("b")])
///     .done(Leaf::on_fulfilled(move |v| tx.send(v).unwrap()));
/// assert_eq!(rx.recv().unwrap(), vec!["a", "b"]);
///
/// let (tx, rx) = channel();
/// wait([fulfilled(1), rejected(Reason::msg("no"))])
///     .done(Leaf::new(|_| unreachable!(), move |r| tx.send(r.to_string()).unwrap()));
/// assert_eq!(rx.recv().unwrap(), "no");
/// ```
pub fn wait<V, P, I>(promises: I) -> BoxPromise<Vec<V>>
where
    I: IntoIterator<Item = P>,
    P: Promise<V>,
    V: Clone + Send + 'static,
{
    let promises: Vec<P> = promises.into_iter().collect();
    let result = FulfillablePromise::new();
    if promises.is_empty() {
        result.fulfill(Vec::new());
        return Box::new(result);
    }

    let join = Arc::new(Join {
        slots: promises.iter().map(|_| Mutex::new(None)).collect(),
        remaining: AtomicUsize::new(promises.len()),
        completed: AtomicBool::new(false),
        result: result.clone(),
    });
    for (index, promise) in promises.iter().enumerate() {
        let on_fulfilled = join.clone();
        let on_rejected = join.clone();
        promise.done(Leaf::new(
            move |value| on_fulfilled.fill(index, value),
            move |reason| on_rejected.fail(reason),
        ));
    }
    Box::new(result)
}

/// State shared by the subscriptions of one `wait` call.
struct Join<V> {
    slots: Vec<Mutex<Option<V>>>,
    remaining: AtomicUsize,
    completed: AtomicBool,
    result: FulfillablePromise<Vec<V>>,
}

impl<V> Join<V>
where
    V: Clone + Send + 'static,
{
    fn fill(&self, index: usize, value: V) {
        if self.completed.load(Ordering::Acquire) {
            return;
        }
        *lock(&self.slots[index]) = Some(value);
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 && self.claim() {
            let values: Vec<V> = self
                .slots
                .iter()
                .filter_map(|slot| lock(slot).take())
                .collect();
            debug_assert_eq!(values.len(), self.slots.len());
            self.result.fulfill(values);
        }
    }

    fn fail(&self, reason: Reason) {
        if self.claim() {
            self.result.reject(reason);
        } else {
            tracing::trace!(%reason, "discarding rejection after wait completed");
        }
    }

    /// Wins the right to settle the aggregate; true for exactly one caller.
    fn claim(&self) -> bool {
        self.completed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
