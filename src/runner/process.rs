use std::io::{self, BufRead, PipeReader};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};

use crate::error::{MuxError, Result};

/// Child handle shared between the worker thread and `terminate`.
pub(crate) type ChildSlot = Arc<Mutex<Option<Child>>>;

/// Spawn `argv` with stdout and stderr writing into one pipe.
pub(crate) fn spawn_merged(argv: &[String]) -> io::Result<(Child, PipeReader)> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;

    let (reader, writer) = io::pipe()?;
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::piped())
        .stdout(writer.try_clone()?)
        .stderr(writer);
    let child = command.spawn()?;
    // The command still owns the parent's copies of the write end; the reader
    // only sees EOF once they are gone.
    drop(command);
    Ok((child, reader))
}

/// Status line pushed into the panel once the process is gone.
pub(crate) fn exit_message(status: Option<ExitStatus>) -> String {
    match status {
        Some(status) => match status.code() {
            Some(code) => format!("Process exited with status code {code}"),
            None => format!("Process exited with {status}"),
        },
        None => "Process exited with unknown status".to_string(),
    }
}

/// Splits a byte stream into lines ending in `\n`, `\r\n` or a lone `\r`.
/// A line is handed out as soon as its terminator arrives, so progress output
/// that only ever rewinds with `\r` still shows up line by line.
pub(crate) struct LineReader<R> {
    inner: R,
    skip_lf: bool,
}

impl<R: BufRead> LineReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner,
            skip_lf: false,
        }
    }

    /// Read the next line into `line`, without its terminator. Returns
    /// `false` once the stream is exhausted and nothing was read.
    pub(crate) fn next_line(&mut self, line: &mut Vec<u8>) -> io::Result<bool> {
        line.clear();
        loop {
            let (complete, used) = {
                let available = match self.inner.fill_buf() {
                    Ok(available) => available,
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => return Err(err),
                };
                if available.is_empty() {
                    return Ok(!line.is_empty());
                }

                let mut start = 0;
                if std::mem::take(&mut self.skip_lf) && available[0] == b'\n' {
                    start = 1;
                }
                match available[start..]
                    .iter()
                    .position(|byte| matches!(byte, b'\n' | b'\r'))
                {
                    Some(offset) => {
                        let end = start + offset;
                        line.extend_from_slice(&available[start..end]);
                        self.skip_lf = available[end] == b'\r';
                        (true, end + 1)
                    }
                    None => {
                        line.extend_from_slice(&available[start..]);
                        (false, available.len())
                    }
                }
            };
            self.inner.consume(used);
            if complete {
                return Ok(true);
            }
        }
    }
}

/// Blocking reap operation handed out by `Runner::terminate`.
#[must_use = "call wait() to reap the killed process"]
pub struct ExitWaiter {
    child: Option<ChildSlot>,
}

impl ExitWaiter {
    pub(crate) fn new(child: Option<ChildSlot>) -> Self {
        Self { child }
    }

    /// Waiter for a runner that never spawned anything.
    pub fn noop() -> Self {
        Self { child: None }
    }

    pub fn is_noop(&self) -> bool {
        self.child.is_none()
    }

    /// Block until the process has exited. Safe on processes that were
    /// already reaped; returns `None` when there was no process.
    pub fn wait(self) -> Result<Option<ExitStatus>> {
        let Some(slot) = self.child else {
            return Ok(None);
        };
        let mut guard = slot.lock().map_err(|_| MuxError::LockPoisoned("child"))?;
        match guard.as_mut() {
            Some(child) => Ok(Some(child.wait()?)),
            None => Ok(None),
        }
    }
}
