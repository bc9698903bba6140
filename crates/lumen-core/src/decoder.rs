#![forbid(unsafe_code)]

//! Timeout-bounded input decoder.
//!
//! Unlike a push parser fed whole read buffers, [`EventDecoder`] pulls bytes
//! one at a time from a [`ByteSource`] and returns exactly one
//! [`InputEvent`] per call. Disambiguation happens with bounded waits:
//!
//! | Situation                        | Wait per byte |
//! |----------------------------------|---------------|
//! | Byte after a lone `ESC`          | 50 ms         |
//! | Each byte of a CSI/SS3 sequence  | 50 ms         |
//! | UTF-8 continuation after `0xEF`  | 5 ms          |
//!
//! A wait that elapses is not an error. A lone `ESC` becomes
//! [`KeyCode::Escape`]; a truncated sequence becomes [`KeyCode::Unknown`].
//!
//! # Mouse post-processing
//!
//! SGR mouse reports (`ESC [ < B ; X ; Y M|m`) go through two filters:
//!
//! - **Double click**: a press of the same button within 400 ms, at most one
//!   column away and on the same row, becomes [`EventKind::MouseDoubleClick`].
//!   The click memory is then cleared so a third click starts over.
//! - **Scroll debounce**: a wheel report of the same button within 150 ms of
//!   the last *accepted* one becomes [`EventKind::MouseRelease`], which
//!   callers ignore.
//!
//! # Lookahead
//!
//! One event can be pushed back with [`EventDecoder::unget`]. The next
//! [`EventDecoder::decode`] returns it verbatim without touching the source.

use std::io;
use std::time::Duration;

use crate::clock::{Clock, MonotonicClock};
use crate::error::{Error, Result};
use crate::event::{EventKind, InputEvent, KeyCode, KeyEvent, Modifiers, MouseEvent};

/// Wait for each byte after `ESC`.
pub const ESCAPE_TIMEOUT: Duration = Duration::from_millis(50);

/// Wait for each continuation byte of a UTF-8 lead byte.
pub const UTF8_CONTINUATION_TIMEOUT: Duration = Duration::from_millis(5);

/// Maximum gap between two presses that form a double click.
pub const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(400);

/// Minimum gap between two accepted wheel reports of the same button.
pub const SCROLL_DEBOUNCE_WINDOW: Duration = Duration::from_millis(150);

/// Hard bound on an escape sequence body, terminator included.
pub const MAX_SEQUENCE_LEN: usize = 32;

const ESC: u8 = 0x1b;

/// Lead byte of U+FF5E FULLWIDTH TILDE (`EF BD 9E`).
const FULLWIDTH_TILDE: [u8; 3] = [0xef, 0xbd, 0x9e];

/// Wheel reports have bit 64 set.
const WHEEL_BIT: u16 = 64;

// ── Byte Source ──────────────────────────────────────────────────────────

/// Where the decoder gets its bytes.
///
/// Implementations may be a terminal device, a pipe, or a scripted buffer,
/// as long as the timeout contract holds.
pub trait ByteSource {
    /// Block until one byte is available.
    ///
    /// End of input is reported as [`io::ErrorKind::UnexpectedEof`].
    fn read_byte(&mut self) -> io::Result<u8>;

    /// Wait at most `timeout` for one byte.
    ///
    /// `None` means nothing arrived in time (or the source failed); the
    /// decoder treats both as "no more bytes available now". A signal
    /// interrupting the wait must not end it early.
    fn read_byte_timeout(&mut self, timeout: Duration) -> Option<u8>;
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read_byte(&mut self) -> io::Result<u8> {
        (**self).read_byte()
    }

    fn read_byte_timeout(&mut self, timeout: Duration) -> Option<u8> {
        (**self).read_byte_timeout(timeout)
    }
}

// ── Sequence Buffer ──────────────────────────────────────────────────────

/// Fixed-capacity accumulator for the bytes after `ESC [` / `ESC O`.
struct SequenceBuffer {
    bytes: [u8; MAX_SEQUENCE_LEN],
    len: usize,
}

impl SequenceBuffer {
    const fn new() -> Self {
        Self {
            bytes: [0; MAX_SEQUENCE_LEN],
            len: 0,
        }
    }

    /// Append a byte. Returns `false` when the buffer was already full.
    fn push(&mut self, byte: u8) -> bool {
        if self.len == MAX_SEQUENCE_LEN {
            return false;
        }
        self.bytes[self.len] = byte;
        self.len += 1;
        true
    }

    fn is_full(&self) -> bool {
        self.len == MAX_SEQUENCE_LEN
    }

    fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

const fn is_terminator(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'~'
}

// ── Decoder State ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct ClickRecord {
    at: Duration,
    button: u16,
    x: u16,
    y: u16,
}

#[derive(Debug, Clone, Copy)]
struct ScrollRecord {
    at: Duration,
    button: u16,
    // Recorded but not compared; duplicates are matched on button and time.
    #[allow(dead_code)]
    x: u16,
    #[allow(dead_code)]
    y: u16,
}

/// Stateful byte-to-event decoder.
#[derive(Debug)]
pub struct EventDecoder<C: Clock = MonotonicClock> {
    clock: C,
    last_click: Option<ClickRecord>,
    last_scroll: Option<ScrollRecord>,
    pending: Option<InputEvent>,
}

impl Default for EventDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDecoder {
    /// Create a decoder timed by the process monotonic clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::new())
    }
}

impl<C: Clock> EventDecoder<C> {
    /// Create a decoder timed by `clock`.
    #[must_use]
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            last_click: None,
            last_scroll: None,
            pending: None,
        }
    }

    /// Whether an event is waiting in the lookahead slot.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Store `event` for the next [`decode`](Self::decode) call.
    ///
    /// Ignored if an event is already pending; the first one is kept.
    pub fn unget(&mut self, event: InputEvent) {
        if self.pending.is_none() {
            self.pending = Some(event);
        } else {
            crate::trace!("unget ignored: lookahead slot occupied");
        }
    }

    /// Take the pending event, if any, leaving the slot empty.
    pub fn clear_pending(&mut self) -> Option<InputEvent> {
        self.pending.take()
    }

    /// Forget click and scroll history.
    pub fn reset_mouse_state(&mut self) {
        self.last_click = None;
        self.last_scroll = None;
    }

    /// Decode exactly one event.
    ///
    /// `size` is the cached terminal size stamped onto the event.
    ///
    /// # Errors
    ///
    /// [`Error::Terminal`] if the blocking read of the first byte fails,
    /// including end of input.
    pub fn decode<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        size: (u16, u16),
    ) -> Result<InputEvent> {
        if let Some(event) = self.pending.take() {
            return Ok(event);
        }

        let byte = source.read_byte().map_err(Error::Terminal)?;
        let kind = match byte {
            ESC => self.decode_escape(source),
            lead if lead == FULLWIDTH_TILDE[0] => decode_fullwidth_tilde(source),
            other => key_press(KeyCode::from_byte(other)),
        };
        Ok(InputEvent::new(kind, size.0, size.1))
    }

    fn decode_escape<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> EventKind {
        let Some(introducer) = source.read_byte_timeout(ESCAPE_TIMEOUT) else {
            return key_press(KeyCode::Escape);
        };
        if introducer != b'[' && introducer != b'O' {
            crate::trace!(byte = introducer, "uninterpreted escape sequence");
            return key_press(KeyCode::Unknown);
        }

        let Some(seq) = read_sequence(source) else {
            crate::debug!("escape sequence truncated or too long");
            return key_press(KeyCode::Unknown);
        };

        match seq.as_slice().split_last() {
            Some((&terminator @ (b'M' | b'm'), body)) => self.decode_mouse(body, terminator),
            _ => EventKind::KeyPress(classify_key(seq.as_slice())),
        }
    }

    fn decode_mouse(&mut self, body: &[u8], terminator: u8) -> EventKind {
        let Some(mouse) = parse_sgr_fields(body) else {
            crate::debug!("malformed SGR mouse report");
            return key_press(KeyCode::Unknown);
        };
        let pressed = terminator == b'M';

        if mouse.button >= WHEEL_BIT {
            if !pressed {
                return EventKind::MouseRelease(mouse);
            }
            return self.classify_scroll(mouse);
        }

        if pressed {
            self.classify_press(mouse)
        } else {
            EventKind::MouseRelease(mouse)
        }
    }

    fn classify_scroll(&mut self, mouse: MouseEvent) -> EventKind {
        let now = self.clock.now_mono();
        if let Some(last) = self.last_scroll
            && last.button == mouse.button
            && now.saturating_sub(last.at) < SCROLL_DEBOUNCE_WINDOW
        {
            crate::trace!(button = mouse.button, "scroll debounced");
            return EventKind::MouseRelease(mouse);
        }

        self.last_scroll = Some(ScrollRecord {
            at: now,
            button: mouse.button,
            x: mouse.x,
            y: mouse.y,
        });
        EventKind::MouseScroll(mouse)
    }

    fn classify_press(&mut self, mouse: MouseEvent) -> EventKind {
        let now = self.clock.now_mono();
        if let Some(last) = self.last_click
            && now.saturating_sub(last.at) < DOUBLE_CLICK_WINDOW
            && mouse.x.abs_diff(last.x) <= 1
            && mouse.y == last.y
            && mouse.button == last.button
        {
            crate::debug!(x = mouse.x, y = mouse.y, "double click");
            self.last_click = None;
            return EventKind::MouseDoubleClick(mouse);
        }

        self.last_click = Some(ClickRecord {
            at: now,
            button: mouse.button,
            x: mouse.x,
            y: mouse.y,
        });
        EventKind::MousePress(mouse)
    }
}

// ── Sequence Classification ──────────────────────────────────────────────

const fn key_press(code: KeyCode) -> EventKind {
    EventKind::KeyPress(KeyEvent::new(code))
}

/// Accumulate bytes until a terminator. `None` on timeout or overflow.
fn read_sequence<S: ByteSource + ?Sized>(source: &mut S) -> Option<SequenceBuffer> {
    let mut seq = SequenceBuffer::new();
    loop {
        let byte = source.read_byte_timeout(ESCAPE_TIMEOUT)?;
        if !seq.push(byte) {
            return None;
        }
        if is_terminator(byte) {
            return Some(seq);
        }
        if seq.is_full() {
            return None;
        }
    }
}

/// Parse `<B;X;Y` (leading `<` optional). Extra fields are ignored.
///
/// Fields are strict decimal `u16`: an empty, non-numeric or out-of-range
/// field (past 65535) rejects the whole report rather than truncating it.
fn parse_sgr_fields(body: &[u8]) -> Option<MouseEvent> {
    let body = body.strip_prefix(b"<").unwrap_or(body);
    let s = std::str::from_utf8(body).ok()?;
    let mut parts = s.split(';');

    let button: u16 = parts.next()?.parse().ok()?;
    let x: u16 = parts.next()?.parse().ok()?;
    let y: u16 = parts.next()?.parse().ok()?;
    Some(MouseEvent::new(button, x, y))
}

/// Classify a non-mouse sequence body by its first three non-`;` bytes.
fn classify_key(seq: &[u8]) -> KeyEvent {
    let mut sig = [0u8; 3];
    let mut n = 0;
    for &byte in seq.iter().filter(|&&b| b != b';') {
        if n == sig.len() {
            return KeyEvent::unknown();
        }
        sig[n] = byte;
        n += 1;
    }

    let code = match &sig[..n] {
        [final_byte] => match final_byte {
            b'A' | b'B' | b'C' | b'D' => arrow(*final_byte),
            b'H' => KeyCode::Home,
            b'F' => KeyCode::End,
            b'P' => KeyCode::F(1),
            b'Q' => KeyCode::F(2),
            b'R' => KeyCode::F(3),
            b'S' => KeyCode::F(4),
            _ => KeyCode::Unknown,
        },
        [digit, b'~'] => match digit {
            b'1' | b'7' => KeyCode::Home,
            b'2' => KeyCode::Insert,
            b'3' => KeyCode::Delete,
            b'4' | b'8' => KeyCode::End,
            b'5' => KeyCode::PageUp,
            b'6' => KeyCode::PageDown,
            _ => KeyCode::Unknown,
        },
        [b'1', digit, b'~'] => match digit {
            b'5' => KeyCode::F(5),
            b'7' => KeyCode::F(6),
            b'8' => KeyCode::F(7),
            b'9' => KeyCode::F(8),
            _ => KeyCode::Unknown,
        },
        [b'2', digit, b'~'] => match digit {
            b'0' => KeyCode::F(9),
            b'1' => KeyCode::F(10),
            b'3' => KeyCode::F(11),
            b'4' => KeyCode::F(12),
            _ => KeyCode::Unknown,
        },
        [_, modifier, final_byte @ b'A'..=b'D'] => {
            return KeyEvent::new(arrow(*final_byte)).with_modifiers(modifier_from_digit(*modifier));
        }
        _ => KeyCode::Unknown,
    };
    KeyEvent::new(code)
}

const fn arrow(final_byte: u8) -> KeyCode {
    match final_byte {
        b'A' => KeyCode::Up,
        b'B' => KeyCode::Down,
        b'C' => KeyCode::Right,
        _ => KeyCode::Left,
    }
}

/// xterm modifier digit `2..=8` to a modifier set; anything else is none.
fn modifier_from_digit(digit: u8) -> Modifiers {
    match digit {
        b'2'..=b'8' => Modifiers::from_bits_truncate(digit - b'1'),
        _ => Modifiers::NONE,
    }
}

/// Both continuation bytes are consumed before comparing, so a different
/// three-byte character yields a single unknown key.
fn decode_fullwidth_tilde<S: ByteSource + ?Sized>(source: &mut S) -> EventKind {
    let mut tail = [0u8; 2];
    for slot in &mut tail {
        match source.read_byte_timeout(UTF8_CONTINUATION_TIMEOUT) {
            Some(byte) => *slot = byte,
            None => return key_press(KeyCode::Unknown),
        }
    }
    if tail == FULLWIDTH_TILDE[1..] {
        key_press(KeyCode::Char('~'))
    } else {
        key_press(KeyCode::Unknown)
    }
}
