use crate::{Leaf, Promise, Reason};

/// A promise that was settled when it was built.
///
/// Holds no lock and no queue: every callback runs immediately on the
/// subscribing thread.
#[derive(Debug, Clone)]
pub struct Settled<V> {
    outcome: Result<V, Reason>,
}

/// A promise already fulfilled with `value`.
///
/// # Examples
///
/// ```
/// use promise_chain::{fulfilled, Promise, Leaf};
/// use std::sync::mpsc::channel;
/// let (tx, rx) = channel();
/// fulfilled(2)
///     .map(|v: i32| Ok(v + 1))
///     .done(Leaf::on_fulfilled(move |v| tx.send(v).unwrap()));
/// assert_eq!(rx.try_recv().unwrap(), 3);
/// ```
pub fn fulfilled<V>(value: V) -> Settled<V> {
    Settled { outcome: Ok(value) }
}

/// A promise already rejected with `reason`.
pub fn rejected<V>(reason: impl Into<Reason>) -> Settled<V> {
    Settled {
        outcome: Err(reason.into()),
    }
}

impl<V> Settled<V> {
    pub fn is_fulfilled(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn into_result(self) -> Result<V, Reason> {
        self.outcome
    }
}

impl<V> Promise<V> for Settled<V>
where
    V: Clone,
{
    fn done(&self, callback: Leaf<V>) {
        callback.call(self.outcome.clone());
    }
}
