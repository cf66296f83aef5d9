use std::io::{self, Read, Write};

/// Byte stream to the meter that infrastructure implementations must provide
///
/// `read` must report "nothing available yet" as [`io::ErrorKind::WouldBlock`]
/// and end-of-stream as `Ok(0)`. The two are never conflated.
pub trait Transport: Read + Write {
    /// Drop bytes received but not yet read, and bytes written but not yet sent
    fn discard_pending(&mut self) -> io::Result<()>;

    /// Switch between blocking and non-blocking reads and writes
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn discard_pending(&mut self) -> io::Result<()> {
        (**self).discard_pending()
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        (**self).set_nonblocking(nonblocking)
    }
}
