#![forbid(unsafe_code)]

//! Byte source over a terminal (or any pollable) descriptor.

use std::fs::File;
use std::io::{self, Read};
use std::os::fd::AsFd;
use std::time::{Duration, Instant};

use lumen_core::decoder::ByteSource;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::termios::{FlushArg, tcflush};

/// Reads single bytes from a descriptor, with poll(2)-bounded waits.
#[derive(Debug)]
pub struct TtyByteSource {
    file: File,
    is_terminal: bool,
}

impl TtyByteSource {
    #[must_use]
    pub fn new(file: File) -> Self {
        let is_terminal = rustix::termios::isatty(&file);
        Self { file, is_terminal }
    }

    /// Whether the descriptor is a terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.is_terminal
    }

    /// The underlying descriptor.
    #[must_use]
    pub fn file(&self) -> &File {
        &self.file
    }

    /// Wait up to `timeout` for the descriptor to become readable.
    ///
    /// A zero timeout is a non-blocking check. A signal arriving mid-wait
    /// does not end it; the wait resumes with the time left.
    ///
    /// # Errors
    ///
    /// Returns the poll(2) error other than `EINTR`.
    pub fn poll_ready(&self, timeout: Duration) -> io::Result<bool> {
        self.poll_until(timeout, || false)
    }

    /// Like [`poll_ready`](Self::poll_ready), but an interrupted wait ends
    /// early (not ready) once `stop` returns true.
    ///
    /// # Errors
    ///
    /// Returns the poll(2) error other than `EINTR`.
    pub fn poll_until<F>(&self, timeout: Duration, stop: F) -> io::Result<bool>
    where
        F: Fn() -> bool,
    {
        let start = Instant::now();
        let mut poll_fds = [PollFd::new(self.file.as_fd(), PollFlags::POLLIN)];
        loop {
            let remaining = timeout.saturating_sub(start.elapsed());
            let timeout_ms: u16 = remaining.as_millis().try_into().unwrap_or(u16::MAX);
            match poll(&mut poll_fds, PollTimeout::from(timeout_ms)) {
                Ok(n) => return Ok(n > 0),
                Err(nix::errno::Errno::EINTR) => {
                    if stop() || remaining.is_zero() {
                        return Ok(false);
                    }
                }
                Err(e) => return Err(io::Error::from(e)),
            }
        }
    }

    /// Discard input queued on the descriptor.
    ///
    /// Terminals are flushed with `tcflush(TCIFLUSH)`; anything else (or a
    /// failed flush) is drained with non-blocking reads.
    pub fn flush_input(&mut self) {
        if self.is_terminal && tcflush(&self.file, FlushArg::TCIFLUSH).is_ok() {
            return;
        }
        let mut buf = [0u8; 256];
        while matches!(self.poll_ready(Duration::ZERO), Ok(true)) {
            match self.file.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
    }

    fn read_one(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        loop {
            match self.file.read(&mut buf) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
                Ok(_) => return Ok(buf[0]),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }
}

impl ByteSource for TtyByteSource {
    fn read_byte(&mut self) -> io::Result<u8> {
        self.read_one()
    }

    fn read_byte_timeout(&mut self, timeout: Duration) -> Option<u8> {
        match self.poll_ready(timeout) {
            Ok(true) => self.read_one().ok(),
            _ => None,
        }
    }
}
