use serde::{Deserialize, Serialize};

/// Readiness a connection can wait for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interest {
    Readable,
    Writable,
}

impl Interest {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Readable => "readable",
            Self::Writable => "writable",
        }
    }
}

/// Registration interface of the event loop hosting a connection
///
/// A connection holds at most one interest at a time: `register` replaces
/// whatever was registered before. The host reports activity back through the
/// connection's notification entry point.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
pub trait Reactor {
    /// Ask to be notified when the descriptor becomes ready for `interest`
    fn register(&mut self, interest: Interest);

    /// Withdraw any registered interest; a no-op when nothing is registered
    fn deregister(&mut self);
}
