#![forbid(unsafe_code)]

//! Terminal line discipline and screen state.
//!
//! [`TerminalModeController`] applies raw mode, the alternate screen and
//! cursor hiding as one reversible transaction. Every transition is
//! idempotent, and restoration is best-effort: each step is attempted even
//! when an earlier one failed.
//!
//! Raw mode here is not `cfmakeraw`: `ISIG` stays on so Ctrl-C still raises
//! SIGINT, and output post-processing is left untouched.

use std::fs::File;
use std::io::{self, Write};

use lumen_core::{Error, Result};
use nix::sys::termios::{
    self, ControlFlags, InputFlags, LocalFlags, SetArg, SpecialCharacterIndices, Termios,
};

use crate::{ALT_SCREEN_ENTER, CURSOR_HIDE, MOUSE_DISABLE, MOUSE_ENABLE, write_cleanup_sequence};

/// Owner of the terminal's raw-mode and screen state.
///
/// Dropping the controller disables mouse tracking and raw mode if either is
/// still active.
pub struct TerminalModeController<W: Write = io::Stdout> {
    input: File,
    output: W,
    input_is_tty: bool,
    output_is_tty: bool,
    use_alternate_screen: bool,
    raw: bool,
    alt_screen_active: bool,
    mouse_tracking: bool,
    saved: Option<Termios>,
}

impl<W: Write> TerminalModeController<W> {
    /// Create a controller for `input` (the terminal whose modes change) and
    /// `output` (where screen sequences go).
    ///
    /// `output_is_tty` gates every sequence written to `output`. The
    /// alternate-screen policy is fixed for the controller's lifetime.
    pub fn new(input: File, output: W, output_is_tty: bool, use_alternate_screen: bool) -> Self {
        let input_is_tty = rustix::termios::isatty(&input);
        Self {
            input,
            output,
            input_is_tty,
            output_is_tty,
            use_alternate_screen,
            raw: false,
            alt_screen_active: false,
            mouse_tracking: false,
            saved: None,
        }
    }

    /// Whether raw mode is active.
    #[must_use]
    pub fn is_raw(&self) -> bool {
        self.raw
    }

    /// Whether the alternate screen is active.
    #[must_use]
    pub fn is_alt_screen_active(&self) -> bool {
        self.alt_screen_active
    }

    /// Whether mouse reporting is enabled.
    #[must_use]
    pub fn is_mouse_tracking(&self) -> bool {
        self.mouse_tracking
    }

    /// Whether the input end is a terminal.
    #[must_use]
    pub fn input_is_tty(&self) -> bool {
        self.input_is_tty
    }

    /// Whether the output end is a terminal.
    #[must_use]
    pub fn output_is_tty(&self) -> bool {
        self.output_is_tty
    }

    /// The output writer.
    #[must_use]
    pub fn output(&self) -> &W {
        &self.output
    }

    /// Enter raw mode.
    ///
    /// No-op if already raw or if the input is not a terminal. When the
    /// output is a terminal, also enters the alternate screen (per policy)
    /// and hides the cursor.
    ///
    /// # Errors
    ///
    /// [`Error::Terminal`] if reading or applying the terminal settings fails,
    /// or if writing the screen sequences fails.
    pub fn enable_raw_mode(&mut self) -> Result<()> {
        if self.raw || !self.input_is_tty {
            return Ok(());
        }

        let original = termios::tcgetattr(&self.input).map_err(errno)?;
        let raw = raw_settings(&original);
        termios::tcsetattr(&self.input, SetArg::TCSAFLUSH, &raw).map_err(errno)?;
        self.saved = Some(original);
        self.raw = true;
        lumen_core::info!("raw mode enabled");

        if self.output_is_tty {
            if self.use_alternate_screen {
                self.output.write_all(ALT_SCREEN_ENTER)?;
                self.alt_screen_active = true;
                lumen_core::info!("entered alternate screen");
            }
            self.output.write_all(CURSOR_HIDE)?;
            self.output.flush()?;
        }
        Ok(())
    }

    /// Leave raw mode, restoring the captured settings.
    ///
    /// No-op if raw mode is not active. Never fails: a failed restore falls
    /// back to re-enabling line buffering and echo, and the screen sequences
    /// are written regardless.
    pub fn disable_raw_mode(&mut self) {
        if !self.raw {
            return;
        }

        let restored = self
            .saved
            .take()
            .is_some_and(|orig| termios::tcsetattr(&self.input, SetArg::TCSAFLUSH, &orig).is_ok());
        if !restored {
            lumen_core::warn!("termios restore failed; re-enabling canonical mode and echo");
            if let Ok(mut current) = termios::tcgetattr(&self.input) {
                current
                    .local_flags
                    .insert(LocalFlags::ICANON | LocalFlags::ECHO);
                let _ = termios::tcsetattr(&self.input, SetArg::TCSAFLUSH, &current);
            }
        }
        self.raw = false;
        lumen_core::info!("raw mode disabled");

        if self.output_is_tty {
            let _ = write_cleanup_sequence(false, self.alt_screen_active, &mut self.output);
            let _ = self.output.flush();
        }
        if self.alt_screen_active {
            self.alt_screen_active = false;
            lumen_core::info!("left alternate screen");
        }
    }

    /// Turn on SGR mouse reporting (buttons and drag motion).
    ///
    /// # Errors
    ///
    /// [`Error::Terminal`] if the sequence cannot be written.
    pub fn enable_mouse_tracking(&mut self) -> Result<()> {
        if self.mouse_tracking {
            return Ok(());
        }
        if self.output_is_tty {
            self.write_flush(MOUSE_ENABLE)?;
        }
        self.mouse_tracking = true;
        lumen_core::info!("mouse tracking enabled");
        Ok(())
    }

    /// Turn off mouse reporting.
    ///
    /// # Errors
    ///
    /// [`Error::Terminal`] if the sequence cannot be written.
    pub fn disable_mouse_tracking(&mut self) -> Result<()> {
        if !self.mouse_tracking {
            return Ok(());
        }
        self.mouse_tracking = false;
        if self.output_is_tty {
            self.write_flush(MOUSE_DISABLE)?;
        }
        lumen_core::info!("mouse tracking disabled");
        Ok(())
    }

    /// Write `bytes` to the output and flush.
    ///
    /// # Errors
    ///
    /// Returns the underlying write error.
    pub fn write_flush(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.output.write_all(bytes)?;
        self.output.flush()
    }
}

impl<W: Write> Drop for TerminalModeController<W> {
    fn drop(&mut self) {
        // Best-effort: a failed write must not stop termios restoration.
        let _ = self.disable_mouse_tracking();
        self.disable_raw_mode();
    }
}

/// Raw input settings derived from `original`.
pub(crate) fn raw_settings(original: &Termios) -> Termios {
    let mut raw = original.clone();
    raw.local_flags
        .remove(LocalFlags::ICANON | LocalFlags::ECHO | LocalFlags::IEXTEN);
    raw.input_flags.remove(
        InputFlags::BRKINT
            | InputFlags::ICRNL
            | InputFlags::INPCK
            | InputFlags::ISTRIP
            | InputFlags::IXON,
    );
    raw.control_flags.remove(ControlFlags::CSIZE);
    raw.control_flags.insert(ControlFlags::CS8);
    raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
    raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
    raw
}

fn errno(err: nix::errno::Errno) -> Error {
    Error::Terminal(io::Error::from(err))
}
