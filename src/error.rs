use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// The reason a [`Deferred`](crate::Deferred) was rejected.
///
/// Reasons are shared with every continuation registered on the rejected
/// value, so the type is cheap to clone. Like the rest of this crate it is
/// not `Send`.
#[derive(Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A handler resolved a deferred value with that very value.
    #[error("chaining cycle detected for deferred value")]
    ChainingCycle,

    /// A plain rejection reason.
    #[error("{0}")]
    Message(Rc<str>),

    /// An initializer or handler panicked.
    #[error("panicked: {0}")]
    Panicked(Rc<str>),

    /// Any other error type.
    #[error("{0}")]
    Other(Rc<dyn std::error::Error>),
}

/// The `deferred` result type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a reason from a message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Error::Message(message.to_string().into())
    }

    /// Wrap an arbitrary error as a rejection reason.
    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + 'static,
    {
        Error::Other(Rc::new(error))
    }

    /// Returns `true` if this is the chaining cycle error.
    pub fn is_chaining_cycle(&self) -> bool {
        matches!(self, Error::ChainingCycle)
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message: Rc<str> = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).into()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.as_str().into()
        } else {
            "Box<dyn Any>".into()
        };
        Error::Panicked(message)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ChainingCycle => f.write_str("ChainingCycle"),
            Error::Message(m) => f.debug_tuple("Message").field(m).finish(),
            Error::Panicked(m) => f.debug_tuple("Panicked").field(m).finish(),
            Error::Other(e) => f.debug_tuple("Other").field(e).finish(),
        }
    }
}

impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Error::Message(message.into())
    }
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Error::Message(message.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::other(error)
    }
}
