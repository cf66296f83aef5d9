//! Event-driven exchange cycle.
//!
//! The host reactor calls [`Connection::on_ready`] whenever the interest the
//! connection registered fires. Each state has its own step function; the
//! connection never blocks, sleeps or polls on its own. After a successful
//! exchange the cycle re-arms itself until stopped, and any error ends it.

use domain::protocol::{PAYLOAD_LEN, REQUEST_MARKER, RESPONSE_MARKER};
use domain::{
    DomainError, ExchangeError, Interest, Measurement, ProtocolState, Reactor, Transport,
};
use infrastructure::drivers::{read_bounded, write_bounded};
use tracing::{debug, trace, warn};

use super::Connection;

/// Result of one exchange as seen by the completion handler
pub type Outcome = Result<Measurement, ExchangeError>;

pub(crate) type Handler = Box<dyn FnMut(Outcome, &mut Control)>;

/// Handed to the completion handler so it can end the cycle
#[derive(Debug, Default)]
pub struct Control {
    stop: bool,
}

impl Control {
    /// Stop the cycle once the handler returns, as [`Connection::stop`] would
    pub fn stop(&mut self) {
        self.stop = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stop
    }
}

impl<T: Transport> Connection<T> {
    /// Registers the completion handler and switches the line to non-blocking mode.
    ///
    /// The handler runs once per finished exchange, with either a measurement or
    /// the error that ended the cycle. Context travels in the closure's captures.
    pub fn init_async<F>(&mut self, handler: F) -> Result<(), DomainError>
    where
        F: FnMut(Outcome, &mut Control) + 'static,
    {
        if self.state.is_running() {
            return Err(DomainError::CycleRunning);
        }

        self.enter_nonblocking()?;
        self.handler = Some(Box::new(handler));
        Ok(())
    }

    /// Begins the repeating exchange: flushes stale input and waits for writability.
    ///
    /// Calling it on a running cycle restarts it from scratch. A line switched
    /// back to blocking mode by [`Connection::read_measurement`] is made
    /// non-blocking again.
    pub fn start(&mut self, reactor: &mut dyn Reactor) -> Result<(), DomainError> {
        if self.handler.is_none() {
            return Err(DomainError::HandlerMissing);
        }
        self.enter_nonblocking()?;

        self.transport
            .discard_pending()
            .map_err(|e| DomainError::DriverError(format!("Failed to flush line: {}", e)))?;
        self.payload = [0u8; PAYLOAD_LEN];
        self.state = ProtocolState::AwaitingWriteReady;
        reactor.register(Interest::Writable);

        debug!("Exchange cycle started");
        Ok(())
    }

    /// Halts the cycle and discards unread line data. Idempotent.
    pub fn stop(&mut self, reactor: &mut dyn Reactor) {
        self.halt(reactor);
        self.discard_input();
        debug!("Exchange cycle stopped");
    }

    /// Notification entry point for the host reactor.
    ///
    /// Notifications that do not match the current state are ignored.
    pub fn on_ready(&mut self, reactor: &mut dyn Reactor, readiness: Interest) {
        use ProtocolState::{AwaitingPayload, AwaitingResponseByte, AwaitingWriteReady};

        match (self.state, readiness) {
            (AwaitingWriteReady, Interest::Writable) => self.send_request(reactor),
            (AwaitingResponseByte, Interest::Readable) => self.read_response_marker(reactor),
            (AwaitingPayload { .. }, Interest::Readable) => self.read_payload(reactor),
            (state, readiness) => {
                trace!(?state, readiness = readiness.as_str(), "Ignoring notification");
            }
        }
    }

    pub(crate) fn send_request(&mut self, reactor: &mut dyn Reactor) {
        match write_bounded(&mut self.transport, &[REQUEST_MARKER]) {
            Ok(()) => {
                self.state = ProtocolState::AwaitingResponseByte;
                reactor.register(Interest::Readable);
            }
            Err(e) => self.fail(reactor, e.into()),
        }
    }

    pub(crate) fn read_response_marker(&mut self, reactor: &mut dyn Reactor) {
        let mut marker = [0u8; 1];
        let progress = match read_bounded(&mut self.transport, &mut marker) {
            Ok(progress) => progress,
            Err(e) => return self.fail(reactor, e.into()),
        };

        if progress.count == 0 {
            if progress.is_end_of_stream() {
                self.fail(
                    reactor,
                    ExchangeError::Truncated {
                        expected: 1,
                        received: 0,
                    },
                );
            } else {
                trace!("Response marker not there yet");
            }
            return;
        }

        if marker[0] != RESPONSE_MARKER {
            return self.fail(
                reactor,
                ExchangeError::UnexpectedResponse { found: marker[0] },
            );
        }

        // More of the reply may already be buffered.
        self.state = ProtocolState::AwaitingPayload { received: 0 };
        self.read_payload(reactor);
    }

    pub(crate) fn read_payload(&mut self, reactor: &mut dyn Reactor) {
        let received = self.state.cursor();
        let progress = match read_bounded(&mut self.transport, &mut self.payload[received..]) {
            Ok(progress) => progress,
            Err(e) => return self.fail(reactor, e.into()),
        };

        let received = received + progress.count;
        if received < PAYLOAD_LEN {
            if progress.is_end_of_stream() {
                return self.fail(
                    reactor,
                    ExchangeError::Truncated {
                        expected: PAYLOAD_LEN,
                        received,
                    },
                );
            }
            trace!(received, "Partial payload");
            self.state = ProtocolState::AwaitingPayload { received };
            return;
        }

        let measurement = Measurement::decode(&self.payload);
        self.payload = [0u8; PAYLOAD_LEN];
        self.state = ProtocolState::AwaitingWriteReady;

        if self.deliver(Ok(measurement)) {
            self.stop(reactor);
        } else {
            reactor.register(Interest::Writable);
        }
    }

    /// Ends the run and reports `error`; nothing is re-armed
    fn fail(&mut self, reactor: &mut dyn Reactor, error: ExchangeError) {
        warn!(error = %error, state = ?self.state, "Exchange failed");
        self.halt(reactor);
        if self.deliver(Err(error)) {
            self.discard_input();
        }
    }

    fn enter_nonblocking(&mut self) -> Result<(), DomainError> {
        self.set_nonblocking(true).map_err(|e| {
            DomainError::DriverError(format!("Failed to switch line to non-blocking mode: {}", e))
        })
    }

    fn halt(&mut self, reactor: &mut dyn Reactor) {
        reactor.deregister();
        self.payload = [0u8; PAYLOAD_LEN];
        self.state = ProtocolState::Idle;
    }

    fn discard_input(&mut self) {
        if let Err(e) = self.transport.discard_pending() {
            warn!(error = %e, "Failed to discard pending line data");
        }
    }

    /// Runs the handler, returning whether it asked to stop
    fn deliver(&mut self, outcome: Outcome) -> bool {
        let mut control = Control::default();
        match self.handler.as_mut() {
            Some(handler) => handler(outcome, &mut control),
            None => warn!("No completion handler registered, outcome dropped"),
        }
        control.is_stopped()
    }
}
