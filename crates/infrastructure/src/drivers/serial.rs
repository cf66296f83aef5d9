use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;

use domain::DomainError;
use domain::Transport;
use domain::protocol::DEFAULT_BAUD_RATE;
use nix::fcntl::{FcntlArg, OFlag, fcntl};
use nix::sys::termios::{
    self, BaudRate, ControlFlags, FlushArg, InputFlags, SetArg, SpecialCharacterIndices,
};
use serde::{Deserialize, Serialize};

/// Serial line configuration
///
/// The meter only speaks 8N1 without flow control, so the framing is fixed and
/// only the port and the speed are configurable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

impl SerialConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: default_baud_rate(),
        }
    }

    fn to_baud_rate(&self) -> Result<BaudRate, DomainError> {
        match self.baud_rate {
            1200 => Ok(BaudRate::B1200),
            2400 => Ok(BaudRate::B2400),
            4800 => Ok(BaudRate::B4800),
            9600 => Ok(BaudRate::B9600),
            19200 => Ok(BaudRate::B19200),
            38400 => Ok(BaudRate::B38400),
            57600 => Ok(BaudRate::B57600),
            115200 => Ok(BaudRate::B115200),
            _ => Err(DomainError::InvalidDriverConfig(format!(
                "Invalid baud rate: {}",
                self.baud_rate
            ))),
        }
    }

    /// Check the configuration without touching the device
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.port.trim().is_empty() {
            return Err(DomainError::InvalidDriverConfig(
                "Serial port path is empty".to_string(),
            ));
        }
        self.to_baud_rate().map(|_| ())
    }
}

/// An open, configured serial line to the meter
///
/// Opened in blocking mode, raw, 8N1, no flow control. Dropping the line
/// closes the descriptor.
#[derive(Debug)]
pub struct SerialLine {
    file: File,
    port: String,
}

impl SerialLine {
    pub fn open(config: &SerialConfig) -> Result<Self, DomainError> {
        config.validate()?;
        let baud_rate = config.to_baud_rate()?;

        tracing::debug!(
            port = %config.port,
            baud_rate = config.baud_rate,
            "Opening serial port"
        );

        // O_NONBLOCK keeps open() from waiting on carrier detect; cleared below.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags((OFlag::O_NOCTTY | OFlag::O_NONBLOCK).bits())
            .open(&config.port)
            .map_err(|e| {
                tracing::warn!(port = %config.port, error = %e, "Failed to open serial port");
                DomainError::DriverError(format!(
                    "Failed to open serial port {}: {}",
                    config.port, e
                ))
            })?;

        let mut line = Self {
            file,
            port: config.port.clone(),
        };

        line.configure(baud_rate)
            .and_then(|_| line.set_nonblocking(false))
            .map_err(|e| {
                tracing::warn!(port = %config.port, error = %e, "Failed to configure serial port");
                DomainError::DriverError(format!(
                    "Failed to configure serial port {}: {}",
                    config.port, e
                ))
            })?;

        tracing::debug!(port = %line.port, "Serial port opened successfully");
        Ok(line)
    }

    fn configure(&self, baud_rate: BaudRate) -> io::Result<()> {
        let mut tio = termios::tcgetattr(&self.file)?;

        termios::cfmakeraw(&mut tio);
        termios::cfsetspeed(&mut tio, baud_rate)?;

        tio.control_flags |= ControlFlags::CLOCAL | ControlFlags::CREAD;
        tio.control_flags &= !(ControlFlags::PARENB
            | ControlFlags::CSTOPB
            | ControlFlags::CSIZE
            | ControlFlags::CRTSCTS);
        tio.control_flags |= ControlFlags::CS8;
        tio.input_flags &= !(InputFlags::IXON | InputFlags::IXOFF | InputFlags::IXANY);

        // Block until at least one byte; non-blocking mode overrides this with EAGAIN.
        tio.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        tio.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;

        termios::tcsetattr(&self.file, SetArg::TCSANOW, &tio)?;
        Ok(())
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn is_nonblocking(&self) -> io::Result<bool> {
        let flags = fcntl(self.file.as_raw_fd(), FcntlArg::F_GETFL)?;
        Ok(OFlag::from_bits_truncate(flags).contains(OFlag::O_NONBLOCK))
    }
}

impl Read for SerialLine {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for SerialLine {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Transport for SerialLine {
    fn discard_pending(&mut self) -> io::Result<()> {
        termios::tcflush(&self.file, FlushArg::TCIOFLUSH)?;
        Ok(())
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        let fd = self.file.as_raw_fd();
        let mut flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
        flags.set(OFlag::O_NONBLOCK, nonblocking);
        fcntl(fd, FcntlArg::F_SETFL(flags))?;
        Ok(())
    }
}

impl AsRawFd for SerialLine {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl AsFd for SerialLine {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}
