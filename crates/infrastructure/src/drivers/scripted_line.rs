use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use domain::Transport;

/// One scripted result for a `read` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStep {
    /// Bytes handed out across as many reads as it takes
    Data(Vec<u8>),
    WouldBlock,
    Interrupted,
    /// `Ok(0)` from now on
    EndOfStream,
    Fail(ErrorKind),
}

/// One scripted result for a `write` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStep {
    /// Accept up to this many bytes
    Accept(usize),
    /// `Ok(0)`
    Zero,
    Interrupted,
    Fail(ErrorKind),
}

#[derive(Debug, Default)]
struct Script {
    reads: VecDeque<ReadStep>,
    writes: VecDeque<WriteStep>,
    written: Vec<u8>,
    discards: usize,
    nonblocking: bool,
}

/// In-memory transport with fault injection.
///
/// Reads follow the queued [`ReadStep`]s and report would-block once the queue
/// is empty. Writes follow the queued [`WriteStep`]s and accept everything once
/// that queue is empty. Clones share the same script, so a test can keep a
/// handle while the connection owns the line.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLine {
    inner: Arc<Mutex<Script>>,
}

impl ScriptedLine {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push_read(&self, step: ReadStep) {
        self.script().reads.push_back(step);
    }

    pub fn push_bytes(&self, bytes: &[u8]) {
        self.push_read(ReadStep::Data(bytes.to_vec()));
    }

    pub fn push_write(&self, step: WriteStep) {
        self.script().writes.push_back(step);
    }

    /// Everything accepted by `write` so far
    pub fn written(&self) -> Vec<u8> {
        self.script().written.clone()
    }

    /// Number of `discard_pending` calls
    pub fn discard_count(&self) -> usize {
        self.script().discards
    }

    /// Read steps not consumed yet
    pub fn pending_reads(&self) -> usize {
        self.script().reads.len()
    }

    pub fn is_nonblocking(&self) -> bool {
        self.script().nonblocking
    }
}

impl Read for ScriptedLine {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut script = self.script();
        match script.reads.pop_front() {
            None | Some(ReadStep::WouldBlock) => Err(ErrorKind::WouldBlock.into()),
            Some(ReadStep::Interrupted) => Err(ErrorKind::Interrupted.into()),
            Some(ReadStep::Fail(kind)) => Err(kind.into()),
            Some(ReadStep::EndOfStream) => {
                script.reads.push_front(ReadStep::EndOfStream);
                Ok(0)
            }
            Some(ReadStep::Data(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    script.reads.push_front(ReadStep::Data(bytes.split_off(n)));
                }
                Ok(n)
            }
        }
    }
}

impl Write for ScriptedLine {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut script = self.script();
        match script.writes.pop_front() {
            None => {
                script.written.extend_from_slice(buf);
                Ok(buf.len())
            }
            Some(WriteStep::Accept(limit)) => {
                let n = limit.min(buf.len());
                script.written.extend_from_slice(&buf[..n]);
                Ok(n)
            }
            Some(WriteStep::Zero) => Ok(0),
            Some(WriteStep::Interrupted) => Err(ErrorKind::Interrupted.into()),
            Some(WriteStep::Fail(kind)) => Err(kind.into()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for ScriptedLine {
    /// Drops queued input, like a line flush; anything scripted later still arrives.
    /// A hung-up line stays hung up.
    fn discard_pending(&mut self) -> io::Result<()> {
        let mut script = self.script();
        let hung_up = script.reads.contains(&ReadStep::EndOfStream);
        script.reads.clear();
        if hung_up {
            script.reads.push_back(ReadStep::EndOfStream);
        }
        script.discards += 1;
        Ok(())
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        self.script().nonblocking = nonblocking;
        Ok(())
    }
}
