#![forbid(unsafe_code)]

//! The per-session input aggregate.
//!
//! [`InputHandler`] owns the terminal mode controller, the byte source, the
//! event decoder and the resize watcher. The application creates one per
//! session, polls it for [`InputEvent`]s, and drops it on the way out;
//! dropping restores the terminal.
//!
//! # Example
//!
//! ```no_run
//! use std::ops::ControlFlow;
//! use std::time::Duration;
//!
//! use lumen_core::config::SessionConfig;
//! use lumen_core::event::KeyCode;
//! use lumen_tty::{InputHandler, ShutdownToken};
//!
//! # fn main() -> lumen_core::Result<()> {
//! let config = SessionConfig::from_env();
//! let mut input = InputHandler::open(&config)?;
//! let selection = input.select_protocol(&config);
//! input.enable_raw_mode()?;
//!
//! let token = ShutdownToken::new();
//! token.install_signal_handlers()?;
//! input.run(&token, Duration::from_millis(100), |event| {
//!     if event.is_key_press(KeyCode::Char('q')) {
//!         ControlFlow::Break(())
//!     } else {
//!         ControlFlow::Continue(())
//!     }
//! })?;
//! # let _ = selection;
//! # Ok(())
//! # }
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::ops::ControlFlow;
use std::os::fd::AsFd;
use std::time::Duration;

use lumen_core::caps_probe::ProbeIo;
use lumen_core::config::SessionConfig;
use lumen_core::decoder::{ByteSource, EventDecoder};
use lumen_core::event::{EventKind, InputEvent};
use lumen_core::protocol::{self, ProtocolSelection};
use lumen_core::terminal_capabilities::PassiveCapabilities;
use lumen_core::{Error, Result};
use nix::sys::termios::{self, SetArg, Termios};

use crate::FALLBACK_SIZE;
use crate::mode::{TerminalModeController, raw_settings};
use crate::signals::{ResizeWatcher, ShutdownToken};
use crate::source::TtyByteSource;

/// Terminal input for one session.
pub struct InputHandler<W: Write = io::Stdout> {
    mode: TerminalModeController<W>,
    source: TtyByteSource,
    decoder: EventDecoder,
    width: u16,
    height: u16,
    resize: Option<ResizeWatcher>,
}

impl InputHandler {
    /// Open the controlling terminal for input and stdout for output.
    ///
    /// Falls back to a duplicate of stdin when there is no controlling
    /// terminal.
    ///
    /// # Errors
    ///
    /// [`Error::Open`] if neither `/dev/tty` nor stdin can be opened.
    pub fn open(config: &SessionConfig) -> Result<Self> {
        let input = match OpenOptions::new().read(true).write(true).open("/dev/tty") {
            Ok(file) => file,
            Err(_) => {
                lumen_core::debug!("/dev/tty unavailable; reading stdin");
                File::from(io::stdin().as_fd().try_clone_to_owned().map_err(Error::Open)?)
            }
        };
        let stdout = io::stdout();
        let output_is_tty = rustix::termios::isatty(&stdout);
        Self::from_parts(input, stdout, output_is_tty, config)
    }
}

impl<W: Write> InputHandler<W> {
    /// Build a handler over explicit descriptors.
    ///
    /// `input` is both read from and reconfigured. `output_is_tty` gates
    /// every sequence written to `output`.
    ///
    /// # Errors
    ///
    /// [`Error::Open`] if `input` cannot be duplicated.
    pub fn from_parts(
        input: File,
        output: W,
        output_is_tty: bool,
        config: &SessionConfig,
    ) -> Result<Self> {
        let control = input.try_clone().map_err(Error::Open)?;
        let mode =
            TerminalModeController::new(control, output, output_is_tty, config.alternate_screen);
        let source = TtyByteSource::new(input);
        let (width, height) = measure(source.file()).unwrap_or(FALLBACK_SIZE);
        let resize = match ResizeWatcher::new() {
            Ok(watcher) => Some(watcher),
            Err(_) => {
                lumen_core::warn!("SIGWINCH watcher unavailable; resize events disabled");
                None
            }
        };
        lumen_core::debug!(width, height, "input handler created");

        Ok(Self {
            mode,
            source,
            decoder: EventDecoder::new(),
            width,
            height,
            resize,
        })
    }

    /// The mode controller.
    #[must_use]
    pub fn mode(&self) -> &TerminalModeController<W> {
        &self.mode
    }

    // ── Events ───────────────────────────────────────────────────────────

    /// Whether [`next_event`](Self::next_event) can return without waiting
    /// for the user: an event is buffered, a resize is pending, or the
    /// descriptor is readable right now.
    #[must_use]
    pub fn has_pending_input(&self) -> bool {
        self.decoder.has_pending()
            || self.resize_pending()
            || self.source.poll_ready(Duration::ZERO).unwrap_or(false)
    }

    /// Wait up to `timeout` for input.
    ///
    /// # Errors
    ///
    /// [`Error::Terminal`] if polling the descriptor fails.
    pub fn wait_for_input(&self, timeout: Duration) -> Result<bool> {
        if self.decoder.has_pending() || self.resize_pending() {
            return Ok(true);
        }
        let ready = self
            .source
            .poll_until(timeout, || self.resize_pending())
            .map_err(Error::Terminal)?;
        Ok(ready || self.resize_pending())
    }

    /// Produce the next event, blocking until one is available.
    ///
    /// A buffered event comes first, then a pending resize, then decoded
    /// input.
    ///
    /// # Errors
    ///
    /// [`Error::Terminal`] if the blocking read fails, including end of
    /// input.
    pub fn next_event(&mut self) -> Result<InputEvent> {
        if self.decoder.has_pending() {
            return self.decoder.decode(&mut self.source, (self.width, self.height));
        }
        if self.resize.as_ref().is_some_and(ResizeWatcher::take) {
            let (width, height) = self.refresh_size();
            return Ok(InputEvent::new(
                EventKind::Resize { width, height },
                width,
                height,
            ));
        }
        self.decoder.decode(&mut self.source, (self.width, self.height))
    }

    /// Return `event` from the next [`next_event`](Self::next_event) call.
    ///
    /// Ignored if an event is already buffered.
    pub fn unget(&mut self, event: InputEvent) {
        self.decoder.unget(event);
    }

    /// Drop the buffered event and any input queued on the descriptor.
    pub fn flush(&mut self) {
        self.decoder.clear_pending();
        self.source.flush_input();
    }

    /// Cached terminal size as (columns, rows).
    #[must_use]
    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// Re-measure the terminal size. The cache is kept if measuring fails.
    pub fn refresh_size(&mut self) -> (u16, u16) {
        if let Some((width, height)) = measure(self.source.file()) {
            self.width = width;
            self.height = height;
        }
        (self.width, self.height)
    }

    fn resize_pending(&self) -> bool {
        self.resize.as_ref().is_some_and(ResizeWatcher::is_pending)
    }

    // ── Modes ────────────────────────────────────────────────────────────

    /// Enter raw mode (and the alternate screen, per configuration).
    ///
    /// # Errors
    ///
    /// [`Error::Terminal`] if the terminal settings cannot be changed.
    pub fn enable_raw_mode(&mut self) -> Result<()> {
        self.mode.enable_raw_mode()
    }

    /// Restore the terminal. Best-effort; never fails.
    pub fn disable_raw_mode(&mut self) {
        self.mode.disable_raw_mode();
    }

    /// Whether raw mode is active.
    #[must_use]
    pub fn is_raw_mode(&self) -> bool {
        self.mode.is_raw()
    }

    /// Turn on SGR mouse reporting.
    ///
    /// # Errors
    ///
    /// [`Error::Terminal`] if the sequence cannot be written.
    pub fn enable_mouse_tracking(&mut self) -> Result<()> {
        self.mode.enable_mouse_tracking()
    }

    /// Turn off mouse reporting.
    ///
    /// # Errors
    ///
    /// [`Error::Terminal`] if the sequence cannot be written.
    pub fn disable_mouse_tracking(&mut self) -> Result<()> {
        self.mode.disable_mouse_tracking()
    }

    // ── Protocol negotiation ─────────────────────────────────────────────

    /// Resolve the graphics protocol against the process environment,
    /// probing this terminal if needed.
    pub fn select_protocol(&mut self, config: &SessionConfig) -> ProtocolSelection {
        let hints = PassiveCapabilities::detect();
        self.select_protocol_with(config, &hints)
    }

    /// Resolve the graphics protocol against explicit `hints`.
    ///
    /// When probing is needed and raw mode is off, the input is switched to
    /// raw settings for the duration of the probes so replies are neither
    /// echoed nor line-buffered.
    pub fn select_protocol_with(
        &mut self,
        config: &SessionConfig,
        hints: &PassiveCapabilities,
    ) -> ProtocolSelection {
        let needs_probe = !config.force_text && config.protocol.forced().is_none() && !hints.any();
        let saved = if needs_probe && !self.mode.is_raw() && self.is_interactive() {
            self.enter_probe_termios()
        } else {
            None
        };

        let probe: &mut dyn ProbeIo = &mut *self;
        let selection = protocol::select_protocol(config, hints, Some(probe));

        if let Some(original) = saved
            && termios::tcsetattr(self.source.file(), SetArg::TCSANOW, &original).is_err()
        {
            lumen_core::warn!("failed to restore terminal settings after probing");
        }
        selection
    }

    fn enter_probe_termios(&self) -> Option<Termios> {
        let original = termios::tcgetattr(self.source.file()).ok()?;
        termios::tcsetattr(
            self.source.file(),
            SetArg::TCSANOW,
            &raw_settings(&original),
        )
        .ok()?;
        Some(original)
    }

    // ── Driving loop ─────────────────────────────────────────────────────

    /// Deliver events to `on_event` until `token` is cancelled or the
    /// callback breaks.
    ///
    /// The token is checked between events; each wait is bounded by
    /// `poll_interval`.
    ///
    /// # Errors
    ///
    /// [`Error::Terminal`] if polling or reading fails, including end of
    /// input (see [`Error::is_eof`]).
    pub fn run<F>(
        &mut self,
        token: &ShutdownToken,
        poll_interval: Duration,
        mut on_event: F,
    ) -> Result<()>
    where
        F: FnMut(InputEvent) -> ControlFlow<()>,
    {
        while !token.is_cancelled() {
            if !self.wait_for_input(poll_interval)? {
                continue;
            }
            let event = self.next_event()?;
            if on_event(event).is_break() {
                return Ok(());
            }
        }
        lumen_core::debug!("input loop cancelled");
        Ok(())
    }
}

impl<W: Write> ByteSource for InputHandler<W> {
    fn read_byte(&mut self) -> io::Result<u8> {
        self.source.read_byte()
    }

    fn read_byte_timeout(&mut self, timeout: Duration) -> Option<u8> {
        self.source.read_byte_timeout(timeout)
    }
}

impl<W: Write> ProbeIo for InputHandler<W> {
    fn is_interactive(&self) -> bool {
        self.source.is_terminal() && self.mode.output_is_tty()
    }

    fn flush_input(&mut self) {
        self.source.flush_input();
    }

    fn write_query(&mut self, query: &[u8]) -> io::Result<()> {
        self.mode.write_flush(query)
    }
}

impl<W: Write> std::fmt::Debug for InputHandler<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputHandler")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("raw", &self.mode.is_raw())
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Window size of `file`, if it reports a non-zero one.
fn measure(file: &File) -> Option<(u16, u16)> {
    let ws = rustix::termios::tcgetwinsize(file).ok()?;
    (ws.ws_col > 0 && ws.ws_row > 0).then_some((ws.ws_col, ws.ws_row))
}
