//! Bounded reads and writes over a byte stream.
//!
//! The only place where raw `io::ErrorKind`s are interpreted. Callers get one
//! of three outcomes: a full transfer, a short transfer with an explicit
//! reason, or an error.

use std::io::{self, ErrorKind, Read, Write};

/// Why a bounded read returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStop {
    /// The whole buffer was filled
    Filled,
    /// Nothing more available right now; try again after the next readable notification
    WouldBlock,
    /// The peer closed the stream
    EndOfStream,
}

/// Result of [`read_bounded`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadProgress {
    /// Bytes stored at the front of the buffer, never more than its length
    pub count: usize,
    pub stop: ReadStop,
}

impl ReadProgress {
    pub fn is_complete(&self) -> bool {
        self.stop == ReadStop::Filled
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.stop == ReadStop::EndOfStream
    }
}

/// Reads until `buf` is full, the source would block, or the stream ends.
///
/// `Interrupted` is retried. Would-block and end-of-stream are not errors: they
/// return the bytes collected so far with the matching [`ReadStop`]. Every other
/// error aborts the read, discarding the count.
pub fn read_bounded<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<ReadProgress> {
    let mut count = 0;

    while count < buf.len() {
        match reader.read(&mut buf[count..]) {
            Ok(0) => {
                return Ok(ReadProgress {
                    count,
                    stop: ReadStop::EndOfStream,
                });
            }
            Ok(n) => count += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                return Ok(ReadProgress {
                    count,
                    stop: ReadStop::WouldBlock,
                });
            }
            Err(e) => return Err(e),
        }
    }

    Ok(ReadProgress {
        count,
        stop: ReadStop::Filled,
    })
}

/// Writes all of `buf`, retrying `Interrupted`.
///
/// A write that makes no progress fails with [`ErrorKind::WriteZero`]. Would-block
/// is a failure here: callers only write once the line is known to accept data.
pub fn write_bounded<W: Write + ?Sized>(writer: &mut W, buf: &[u8]) -> io::Result<()> {
    let mut written = 0;

    while written < buf.len() {
        match writer.write(&buf[written..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    ErrorKind::WriteZero,
                    format!("wrote {} of {} bytes", written, buf.len()),
                ));
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{ReadStep, ScriptedLine, WriteStep};

    #[test]
    fn test_read_fills_buffer_from_one_chunk() {
        let mut line = ScriptedLine::new();
        line.push_bytes(&[1, 2, 3, 4]);

        let mut buf = [0u8; 4];
        let progress = read_bounded(&mut line, &mut buf).unwrap();
        assert_eq!(progress.count, 4);
        assert!(progress.is_complete());
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn test_read_leaves_excess_for_next_call() {
        let mut line = ScriptedLine::new();
        line.push_bytes(&[1, 2, 3, 4, 5]);

        let mut buf = [0u8; 2];
        read_bounded(&mut line, &mut buf).unwrap();
        assert_eq!(buf, [1, 2]);
        read_bounded(&mut line, &mut buf).unwrap();
        assert_eq!(buf, [3, 4]);
    }

    #[test]
    fn test_zero_length_read_is_complete() {
        let mut line = ScriptedLine::new();
        let progress = read_bounded(&mut line, &mut []).unwrap();
        assert_eq!(progress.count, 0);
        assert!(progress.is_complete());
    }

    #[test]
    fn test_read_retries_interrupt() {
        let mut line = ScriptedLine::new();
        line.push_bytes(&[9]);
        line.push_read(ReadStep::Interrupted);
        line.push_bytes(&[8]);

        let mut buf = [0u8; 2];
        let progress = read_bounded(&mut line, &mut buf).unwrap();
        assert!(progress.is_complete());
        assert_eq!(buf, [9, 8]);
    }

    #[test]
    fn test_read_stops_on_would_block() {
        let mut line = ScriptedLine::new();
        line.push_bytes(&[1, 2, 3]);
        line.push_read(ReadStep::WouldBlock);
        line.push_bytes(&[4]);

        let mut buf = [0u8; 20];
        let progress = read_bounded(&mut line, &mut buf).unwrap();
        assert_eq!(progress.count, 3);
        assert_eq!(progress.stop, ReadStop::WouldBlock);
    }

    #[test]
    fn test_read_reports_end_of_stream_with_partial_count() {
        let mut line = ScriptedLine::new();
        line.push_bytes(&[1, 2]);
        line.push_read(ReadStep::EndOfStream);

        let mut buf = [0u8; 5];
        let progress = read_bounded(&mut line, &mut buf).unwrap();
        assert_eq!(progress.count, 2);
        assert!(progress.is_end_of_stream());
    }

    #[test]
    fn test_read_failure_is_an_error() {
        let mut line = ScriptedLine::new();
        line.push_bytes(&[1]);
        line.push_read(ReadStep::Fail(ErrorKind::BrokenPipe));

        let mut buf = [0u8; 4];
        let err = read_bounded(&mut line, &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_write_retries_interrupt_and_short_writes() {
        let mut line = ScriptedLine::new();
        line.push_write(WriteStep::Accept(1));
        line.push_write(WriteStep::Interrupted);

        write_bounded(&mut line, &[0xAA, 0xBB, 0xCC]).unwrap();
        assert_eq!(line.written(), vec![0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_write_without_progress_fails() {
        let mut line = ScriptedLine::new();
        line.push_write(WriteStep::Zero);

        let err = write_bounded(&mut line, &[0x05]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WriteZero);
        assert!(line.written().is_empty());
    }

    #[test]
    fn test_write_would_block_is_a_failure() {
        let mut line = ScriptedLine::new();
        line.push_write(WriteStep::Fail(ErrorKind::WouldBlock));

        let err = write_bounded(&mut line, &[0x05]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);
    }
}
