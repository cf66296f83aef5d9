use std::io;
use std::os::fd::{AsRawFd, RawFd};

use tokio::io::Interest as IoInterest;
use tokio::io::unix::{AsyncFd, AsyncFdReadyGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use domain::{DomainError, Interest, Reactor, Transport};

use super::Connection;

/// Reactor that remembers the single interest a connection registered
#[derive(Debug, Default)]
pub struct InterestSlot {
    interest: Option<Interest>,
}

impl InterestSlot {
    pub fn interest(&self) -> Option<Interest> {
        self.interest
    }
}

impl Reactor for InterestSlot {
    fn register(&mut self, interest: Interest) {
        self.interest = Some(interest);
    }

    fn deregister(&mut self) {
        self.interest = None;
    }
}

/// Descriptor handed to tokio; the connection keeps ownership of the line
struct LineFd(RawFd);

impl AsRawFd for LineFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

/// Actor that hosts one connection's exchange cycle on the tokio reactor
pub struct MeterActor<T> {
    connection: Connection<T>,
    cancel_token: CancellationToken,
}

impl<T: Transport + AsRawFd> MeterActor<T> {
    /// `connection` must already have a completion handler registered
    pub fn new(connection: Connection<T>) -> Self {
        Self {
            connection,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Runs the cycle until the handler stops it, an exchange fails, or the
    /// token is cancelled. Hands the connection back, idle.
    pub async fn run(self) -> Result<Connection<T>, DomainError> {
        let MeterActor {
            mut connection,
            cancel_token,
        } = self;

        let fd = AsyncFd::with_interest(
            LineFd(connection.transport().as_raw_fd()),
            IoInterest::READABLE | IoInterest::WRITABLE,
        )
        .map_err(|e| {
            DomainError::DriverError(format!("Failed to register line with reactor: {}", e))
        })?;

        let mut slot = InterestSlot::default();
        connection.start(&mut slot)?;
        info!("Starting MeterActor");

        loop {
            let Some(interest) = slot.interest() else {
                info!("Exchange cycle ended");
                break;
            };
            debug_assert_eq!(connection.state().interest(), Some(interest));

            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!("Shutdown signal received");
                    connection.stop(&mut slot);
                    break;
                }
                ready = wait_ready(&fd, interest) => {
                    let mut guard = match ready {
                        Ok(guard) => guard,
                        Err(e) => {
                            error!(error = %e, "Reactor wait failed");
                            connection.stop(&mut slot);
                            return Err(DomainError::DriverError(format!(
                                "Reactor wait failed: {}",
                                e
                            )));
                        }
                    };

                    let before = connection.state();
                    connection.on_ready(&mut slot, interest);

                    // No progress means the line reported would-block.
                    if connection.state() == before {
                        guard.clear_ready();
                    }
                }
            }
        }

        debug!(state = ?connection.state(), "MeterActor finished");
        Ok(connection)
    }
}

async fn wait_ready(
    fd: &AsyncFd<LineFd>,
    interest: Interest,
) -> io::Result<AsyncFdReadyGuard<'_, LineFd>> {
    match interest {
        Interest::Readable => fd.readable().await,
        Interest::Writable => fd.writable().await,
    }
}
