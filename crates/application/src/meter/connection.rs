use std::io;

use domain::protocol::{PAYLOAD_LEN, REQUEST_MARKER, RESPONSE_MARKER};
use domain::{DomainError, ExchangeError, Measurement, ProtocolState, Transport};
use infrastructure::drivers::{
    ReadProgress, ReadStop, SerialConfig, SerialLine, read_bounded, write_bounded,
};
use tracing::{debug, warn};

use super::poller::Handler;

/// An open line to one PF9802 meter
///
/// Owns the transport and the state of the event-driven exchange. At most one
/// exchange is in flight at any time: the blocking [`Connection::read_measurement`]
/// and the event-driven cycle are mutually exclusive.
pub struct Connection<T> {
    pub(crate) transport: T,
    pub(crate) state: ProtocolState,
    pub(crate) payload: [u8; PAYLOAD_LEN],
    pub(crate) handler: Option<Handler>,
    pub(crate) nonblocking: bool,
}

impl Connection<SerialLine> {
    /// Opens and configures the serial port at `path` with the meter's line settings
    pub fn open(path: &str) -> Result<Self, DomainError> {
        Self::open_with(&SerialConfig::new(path))
    }

    pub fn open_with(config: &SerialConfig) -> Result<Self, DomainError> {
        let line = SerialLine::open(config)?;
        debug!(port = %line.port(), "Meter connection opened");
        Ok(Self::new(line))
    }
}

impl<T: Transport> Connection<T> {
    /// Wraps a transport that is already configured for the meter, in blocking mode
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: ProtocolState::Idle,
            payload: [0u8; PAYLOAD_LEN],
            handler: None,
            nonblocking: false,
        }
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Releases the line
    pub fn close(self) {
        if self.state.is_running() {
            warn!(state = ?self.state, "Closing meter connection mid-exchange");
        }
        debug!("Meter connection closed");
    }

    /// Performs one complete blocking exchange: request, response marker, payload.
    ///
    /// A line left non-blocking by the event-driven cycle is switched back to
    /// blocking mode first. A failure leaves the stream at an unknown position;
    /// flush with [`Transport::discard_pending`] before retrying.
    ///
    /// # Panics
    ///
    /// Panics if the event-driven cycle is running on this connection.
    pub fn read_measurement(&mut self) -> Result<Measurement, ExchangeError> {
        assert!(
            self.state.is_idle(),
            "blocking exchange attempted while the event-driven cycle is running"
        );

        self.set_nonblocking(false)
            .map_err(ExchangeError::from)
            .and_then(|_| self.exchange())
            .inspect_err(|e| {
                warn!(error = %e, "Blocking exchange failed");
            })
    }

    /// Switches the line mode, skipping the call when it already matches
    pub(crate) fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        if self.nonblocking != nonblocking {
            self.transport.set_nonblocking(nonblocking)?;
            self.nonblocking = nonblocking;
            debug!(nonblocking, "Line mode switched");
        }
        Ok(())
    }

    fn exchange(&mut self) -> Result<Measurement, ExchangeError> {
        write_bounded(&mut self.transport, &[REQUEST_MARKER])?;

        let mut marker = [0u8; 1];
        let progress = read_bounded(&mut self.transport, &mut marker)?;
        if !progress.is_complete() {
            return Err(short_read(progress, 1));
        }
        if marker[0] != RESPONSE_MARKER {
            return Err(ExchangeError::UnexpectedResponse { found: marker[0] });
        }

        let mut payload = [0u8; PAYLOAD_LEN];
        let progress = read_bounded(&mut self.transport, &mut payload)?;
        if !progress.is_complete() {
            return Err(short_read(progress, PAYLOAD_LEN));
        }

        Ok(Measurement::decode(&payload))
    }
}

/// Error for a blocking read that stopped before `expected` bytes
fn short_read(progress: ReadProgress, expected: usize) -> ExchangeError {
    match progress.stop {
        ReadStop::EndOfStream => ExchangeError::Truncated {
            expected,
            received: progress.count,
        },
        ReadStop::WouldBlock | ReadStop::Filled => {
            io::Error::from(io::ErrorKind::WouldBlock).into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meter::InterestSlot;
    use domain::ExchangeErrorKind;
    use infrastructure::drivers::{ReadStep, ScriptedLine, WriteStep};
    use std::io::ErrorKind;

    fn reply(m: &Measurement) -> Vec<u8> {
        let mut bytes = vec![RESPONSE_MARKER];
        bytes.extend_from_slice(&m.encode());
        bytes
    }

    #[test]
    fn test_read_measurement_success() {
        let line = ScriptedLine::new();
        let expected = Measurement::new(229.8, 0.42, 0.97, 50.02, 93.6);
        line.push_bytes(&reply(&expected));

        let mut conn = Connection::new(line.clone());
        let m = conn.read_measurement().unwrap();

        assert_eq!(m, expected);
        assert_eq!(line.written(), vec![REQUEST_MARKER]);
        assert!(conn.state().is_idle());
    }

    #[test]
    fn test_read_measurement_across_short_reads() {
        let line = ScriptedLine::new();
        let expected = Measurement::new(1.0, 2.0, 3.0, 4.0, 5.0);
        for byte in reply(&expected) {
            line.push_read(ReadStep::Interrupted);
            line.push_bytes(&[byte]);
        }

        let mut conn = Connection::new(line);
        assert_eq!(conn.read_measurement().unwrap(), expected);
    }

    #[test]
    fn test_wrong_marker_is_response_error() {
        let line = ScriptedLine::new();
        line.push_bytes(&[0x00]);

        let mut conn = Connection::new(line);
        let err = conn.read_measurement().unwrap_err();
        assert_eq!(err, ExchangeError::UnexpectedResponse { found: 0x00 });
    }

    #[test]
    fn test_missing_marker_is_truncated() {
        let line = ScriptedLine::new();
        line.push_read(ReadStep::EndOfStream);

        let mut conn = Connection::new(line);
        let err = conn.read_measurement().unwrap_err();
        assert_eq!(err.kind(), ExchangeErrorKind::Truncated);
    }

    #[test]
    fn test_short_payload_is_truncated() {
        let line = ScriptedLine::new();
        line.push_bytes(&[RESPONSE_MARKER]);
        line.push_bytes(&[0u8; 10]);
        line.push_read(ReadStep::EndOfStream);

        let mut conn = Connection::new(line);
        let err = conn.read_measurement().unwrap_err();
        assert_eq!(
            err,
            ExchangeError::Truncated {
                expected: PAYLOAD_LEN,
                received: 10
            }
        );
    }

    #[test]
    fn test_silent_line_is_would_block_not_truncated() {
        let line = ScriptedLine::new();

        let mut conn = Connection::new(line);
        let err = conn.read_measurement().unwrap_err();
        assert_eq!(err.kind(), ExchangeErrorKind::Io);
        assert!(matches!(
            err,
            ExchangeError::Io {
                kind: ErrorKind::WouldBlock,
                ..
            }
        ));
    }

    #[test]
    fn test_payload_stall_is_would_block() {
        let line = ScriptedLine::new();
        line.push_bytes(&[RESPONSE_MARKER]);
        line.push_bytes(&[0u8; 8]);

        let mut conn = Connection::new(line);
        let err = conn.read_measurement().unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::Io {
                kind: ErrorKind::WouldBlock,
                ..
            }
        ));
    }

    #[test]
    fn test_blocking_mode_restored_after_cycle() {
        let line = ScriptedLine::new();
        let mut conn = Connection::new(line.clone());
        conn.init_async(|_, _| {}).unwrap();

        let mut slot = InterestSlot::default();
        conn.start(&mut slot).unwrap();
        conn.stop(&mut slot);
        assert!(line.is_nonblocking());

        let expected = Measurement::new(230.0, 1.5, 0.8, 50.0, 276.0);
        line.push_bytes(&reply(&expected));
        assert_eq!(conn.read_measurement().unwrap(), expected);
        assert!(!line.is_nonblocking());

        // The cycle can be started again afterwards
        conn.start(&mut slot).unwrap();
        assert!(line.is_nonblocking());
        assert_eq!(slot.interest(), Some(domain::Interest::Writable));
    }

    #[test]
    fn test_write_failure_is_io_error() {
        let line = ScriptedLine::new();
        line.push_write(WriteStep::Fail(ErrorKind::BrokenPipe));

        let mut conn = Connection::new(line);
        let err = conn.read_measurement().unwrap_err();
        assert_eq!(err.kind(), ExchangeErrorKind::Io);
        assert_eq!(err.code(), 3);
    }

    #[test]
    fn test_open_missing_port_fails() {
        assert!(Connection::open("/dev/pf9802-does-not-exist").is_err());
    }
}
