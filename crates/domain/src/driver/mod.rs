mod reactor;
mod transport;

pub use reactor::{Interest, Reactor};
pub use transport::Transport;

#[cfg(any(test, feature = "mocks"))]
pub use reactor::MockReactor;
