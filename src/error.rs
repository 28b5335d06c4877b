use std::{any::Any, fmt, sync::Arc};
use thiserror::Error;

/// Errors raised by the promise machinery itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("promise is already settled")]
    AlreadySettled,
    #[error("callback panicked: {message}")]
    CallbackPanicked { message: String },
    #[error("completion was dropped before the promise settled")]
    Abandoned,
}

/// Why a promise was rejected.
///
/// A `Reason` is a cheap handle: every subscriber of a rejected promise sees
/// a clone pointing at the same underlying error, so [`Reason::ptr_eq`] tells
/// whether two rejections carry the very same reason.
///
/// ```
/// use promise_chain::Reason;
/// let reason = Reason::msg("boom");
/// let seen = reason.clone();
/// assert!(reason.ptr_eq(&seen));
/// assert_eq!(seen.to_string(), "boom");
/// ```
#[derive(Clone)]
pub struct Reason {
    inner: Arc<dyn std::error::Error + Send + Sync + 'static>,
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Message {}

impl Reason {
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self { inner: Arc::new(err) }
    }

    /// A reason carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(Message(message.into()))
    }

    /// Returns true if both handles point at the same underlying error.
    pub fn ptr_eq(&self, other: &Reason) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.inner.downcast_ref::<E>()
    }

    /// Turns a panic payload into a reason.
    ///
    /// A payload that already is a `Reason` (an unhandled rejection escaping a
    /// leaf) is adopted unchanged; anything else becomes
    /// [`Error::CallbackPanicked`].
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let payload = match payload.downcast::<Reason>() {
            Ok(reason) => return *reason,
            Err(payload) => payload,
        };
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_owned()
        };
        Error::CallbackPanicked { message }.into()
    }
}

impl fmt::Debug for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reason").field(&self.inner).finish()
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl From<Error> for Reason {
    fn from(err: Error) -> Self {
        Reason::new(err)
    }
}
