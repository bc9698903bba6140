#![forbid(unsafe_code)]
//! Native Unix terminal input backend for Lumen.
//!
//! This crate owns the terminal device: termios raw mode, poll(2)-bounded
//! byte reads, window size, SIGWINCH notifications and shutdown signals. The
//! platform-independent decoding and negotiation logic lives in `lumen-core`.
//!
//! ## Escape Sequence Reference
//!
//! | Feature           | Enable                    | Disable                   |
//! |-------------------|---------------------------|---------------------------|
//! | Alternate screen  | `CSI ? 1049 h`            | `CSI ? 1049 l`            |
//! | Mouse (SGR)       | `CSI ? 1000;1002;1006 h`  | `CSI ? 1000;1002;1006 l`  |
//! | Cursor show/hide  | `CSI ? 25 h`              | `CSI ? 25 l`              |
//! | Reset attributes  | `CSI 0 m`                 |                           |
//!
//! Capability queries are defined in `lumen_core::caps_probe`.

use std::io::{self, Write};

#[cfg(unix)]
pub mod handler;
#[cfg(unix)]
pub mod mode;
#[cfg(unix)]
pub mod signals;
#[cfg(unix)]
pub mod source;

#[cfg(unix)]
pub use handler::InputHandler;
#[cfg(unix)]
pub use mode::TerminalModeController;
#[cfg(unix)]
pub use signals::{ResizeWatcher, ShutdownToken};
#[cfg(unix)]
pub use source::TtyByteSource;

// ── Escape Sequences ─────────────────────────────────────────────────────

pub const ALT_SCREEN_ENTER: &[u8] = b"\x1b[?1049h";
pub const ALT_SCREEN_LEAVE: &[u8] = b"\x1b[?1049l";

pub const MOUSE_ENABLE: &[u8] = b"\x1b[?1000;1002;1006h";
pub const MOUSE_DISABLE: &[u8] = b"\x1b[?1000;1002;1006l";

pub const CURSOR_SHOW: &[u8] = b"\x1b[?25h";
pub const CURSOR_HIDE: &[u8] = b"\x1b[?25l";

pub const RESET_ATTRIBUTES: &[u8] = b"\x1b[0m";

/// Size reported when the device does not know its own.
pub const FALLBACK_SIZE: (u16, u16) = (80, 24);

// ── Utility: write cleanup sequence to a byte buffer (for testing) ───────

/// Write the output-side restore sequence for the given state to `writer`.
///
/// Mouse reporting is turned off first, then the alternate screen is left,
/// then the cursor is shown and attributes are reset. Every step is
/// attempted even if an earlier one fails; the first error is returned.
pub fn write_cleanup_sequence(
    mouse_tracking: bool,
    alt_screen: bool,
    writer: &mut impl Write,
) -> io::Result<()> {
    let steps = [
        mouse_tracking.then_some(MOUSE_DISABLE),
        alt_screen.then_some(ALT_SCREEN_LEAVE),
        Some(CURSOR_SHOW),
        Some(RESET_ATTRIBUTES),
    ];
    let mut first_err = None;
    for seq in steps.into_iter().flatten() {
        if let Err(err) = writer.write_all(seq) {
            first_err.get_or_insert(err);
        }
    }
    first_err.map_or(Ok(()), Err)
}
