#![forbid(unsafe_code)]

//! Canonical input event types.
//!
//! # Design Notes
//!
//! - Mouse coordinates are 1-indexed, exactly as the terminal reports them.
//! - Mouse button codes are kept raw; [`MouseEvent::kind`] and
//!   [`MouseEvent::modifiers`] decode them on demand.
//! - Every [`InputEvent`] carries the terminal size cached by the handler at
//!   decode time. It is not re-measured per event.

use bitflags::bitflags;

/// A decoded input event stamped with the cached terminal size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    /// What happened.
    pub kind: EventKind,
    /// Terminal width in cells when the event was decoded.
    pub width: u16,
    /// Terminal height in cells when the event was decoded.
    pub height: u16,
}

impl InputEvent {
    /// Create an event stamped with the given terminal size.
    #[must_use]
    pub const fn new(kind: EventKind, width: u16, height: u16) -> Self {
        Self {
            kind,
            width,
            height,
        }
    }

    /// The key event, if this is a key press or release.
    #[must_use]
    pub const fn key(&self) -> Option<KeyEvent> {
        match self.kind {
            EventKind::KeyPress(key) | EventKind::KeyRelease(key) => Some(key),
            _ => None,
        }
    }

    /// The mouse event, if this is any mouse variant.
    #[must_use]
    pub const fn mouse(&self) -> Option<MouseEvent> {
        match self.kind {
            EventKind::MousePress(m)
            | EventKind::MouseRelease(m)
            | EventKind::MouseDoubleClick(m)
            | EventKind::MouseScroll(m) => Some(m),
            _ => None,
        }
    }

    /// Whether this is a key press of the given code.
    #[must_use]
    pub fn is_key_press(&self, code: KeyCode) -> bool {
        matches!(self.kind, EventKind::KeyPress(key) if key.code == code)
    }
}

/// Event variants. Exactly one is active per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A key was pressed.
    KeyPress(KeyEvent),
    /// A key was released.
    KeyRelease(KeyEvent),
    /// A mouse button was pressed.
    MousePress(MouseEvent),
    /// A mouse button was released, or a duplicate scroll was debounced.
    MouseRelease(MouseEvent),
    /// Second press of the same button at (almost) the same cell.
    MouseDoubleClick(MouseEvent),
    /// Mouse wheel report.
    MouseScroll(MouseEvent),
    /// Terminal was resized.
    Resize {
        /// New terminal width in columns.
        width: u16,
        /// New terminal height in rows.
        height: u16,
    },
}

/// A keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    /// The key code.
    pub code: KeyCode,
    /// Modifier keys held during the event.
    pub modifiers: Modifiers,
}

impl KeyEvent {
    /// Create a key event without modifiers.
    #[must_use]
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::NONE,
        }
    }

    /// Create a key event with modifiers.
    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Key event for an unrecognised or malformed sequence.
    #[must_use]
    pub const fn unknown() -> Self {
        Self::new(KeyCode::Unknown)
    }

    /// Check if this is a specific character key.
    #[must_use]
    pub fn is_char(&self, c: char) -> bool {
        matches!(self.code, KeyCode::Char(ch) if ch == c)
    }

    /// Check if Ctrl modifier is held.
    #[must_use]
    pub const fn ctrl(&self) -> bool {
        self.modifiers.contains(Modifiers::CTRL)
    }

    /// Check if Alt modifier is held.
    #[must_use]
    pub const fn alt(&self) -> bool {
        self.modifiers.contains(Modifiers::ALT)
    }

    /// Check if Shift modifier is held.
    #[must_use]
    pub const fn shift(&self) -> bool {
        self.modifiers.contains(Modifiers::SHIFT)
    }
}

/// Key codes for keyboard events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A byte delivered as-is. The char's scalar value equals the byte value,
    /// so control bytes (Enter is `'\r'`, Tab is `'\t'`) arrive unchanged.
    Char(char),
    /// Escape key pressed on its own.
    Escape,
    /// Up arrow key.
    Up,
    /// Down arrow key.
    Down,
    /// Left arrow key.
    Left,
    /// Right arrow key.
    Right,
    /// Home key.
    Home,
    /// End key.
    End,
    /// Page Up key.
    PageUp,
    /// Page Down key.
    PageDown,
    /// Insert key.
    Insert,
    /// Delete key.
    Delete,
    /// Function key (F1-F12).
    F(u8),
    /// Unrecognised or malformed input.
    Unknown,
}

impl KeyCode {
    /// Key code for a single non-escape input byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        Self::Char(byte as char)
    }
}

bitflags! {
    /// Modifier keys held during a key event.
    ///
    /// Bit values equal the xterm modifier parameter minus one.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        /// No modifiers.
        const NONE  = 0b000;
        /// Shift key.
        const SHIFT = 0b001;
        /// Alt/Option key.
        const ALT   = 0b010;
        /// Control key.
        const CTRL  = 0b100;
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Self::NONE
    }
}

/// A mouse report in SGR encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MouseEvent {
    /// Raw SGR button code (bit 64 and above reserved for the wheel).
    pub button: u16,
    /// Column, 1-indexed.
    pub x: u16,
    /// Row, 1-indexed.
    pub y: u16,
}

impl MouseEvent {
    /// Create a mouse event from a raw button code and 1-based position.
    #[must_use]
    pub const fn new(button: u16, x: u16, y: u16) -> Self {
        Self { button, x, y }
    }

    /// Get the position as a tuple.
    #[must_use]
    pub const fn position(&self) -> (u16, u16) {
        (self.x, self.y)
    }

    /// Decode the button identity.
    #[must_use]
    pub const fn kind(&self) -> MouseButton {
        if self.button & 64 != 0 {
            return match self.button & 0b11 {
                0 => MouseButton::WheelUp,
                1 => MouseButton::WheelDown,
                _ => MouseButton::Other(self.button),
            };
        }
        match self.button & 0b11 {
            0 => MouseButton::Left,
            1 => MouseButton::Middle,
            2 => MouseButton::Right,
            _ => MouseButton::Other(self.button),
        }
    }

    /// Modifier keys encoded in the button code.
    #[must_use]
    pub fn modifiers(&self) -> Modifiers {
        let mut mods = Modifiers::NONE;
        if self.button & 4 != 0 {
            mods |= Modifiers::SHIFT;
        }
        if self.button & 8 != 0 {
            mods |= Modifiers::ALT;
        }
        if self.button & 16 != 0 {
            mods |= Modifiers::CTRL;
        }
        mods
    }

    /// Whether the report came from motion tracking (button held while moving).
    #[must_use]
    pub const fn is_motion(&self) -> bool {
        self.button & 32 != 0
    }
}

/// Decoded mouse button identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Left mouse button.
    Left,
    /// Middle mouse button.
    Middle,
    /// Right mouse button.
    Right,
    /// Wheel scrolled up.
    WheelUp,
    /// Wheel scrolled down.
    WheelDown,
    /// Any other raw code (release-all, extra buttons).
    Other(u16),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_event_builders() {
        let key = KeyEvent::new(KeyCode::Up).with_modifiers(Modifiers::CTRL | Modifiers::SHIFT);
        assert!(key.ctrl());
        assert!(key.shift());
        assert!(!key.alt());
        assert!(KeyEvent::new(KeyCode::Char('q')).is_char('q'));
        assert_eq!(KeyEvent::unknown().code, KeyCode::Unknown);
    }

    #[test]
    fn from_byte_preserves_value() {
        assert_eq!(KeyCode::from_byte(b'a'), KeyCode::Char('a'));
        assert_eq!(KeyCode::from_byte(0x0d), KeyCode::Char('\r'));
        assert_eq!(KeyCode::from_byte(0xe9), KeyCode::Char('\u{e9}'));
    }

    #[test]
    fn mouse_button_decoding() {
        assert_eq!(MouseEvent::new(0, 1, 1).kind(), MouseButton::Left);
        assert_eq!(MouseEvent::new(1, 1, 1).kind(), MouseButton::Middle);
        assert_eq!(MouseEvent::new(2, 1, 1).kind(), MouseButton::Right);
        assert_eq!(MouseEvent::new(64, 1, 1).kind(), MouseButton::WheelUp);
        assert_eq!(MouseEvent::new(65, 1, 1).kind(), MouseButton::WheelDown);
        assert_eq!(MouseEvent::new(3, 1, 1).kind(), MouseButton::Other(3));
    }

    #[test]
    fn mouse_modifier_and_motion_bits() {
        let m = MouseEvent::new(0b1_1100, 3, 4);
        assert_eq!(
            m.modifiers(),
            Modifiers::SHIFT | Modifiers::ALT | Modifiers::CTRL
        );
        assert!(!m.is_motion());
        assert!(MouseEvent::new(32, 3, 4).is_motion());
        assert_eq!(m.position(), (3, 4));
    }

    #[test]
    fn accessors_follow_the_active_variant() {
        let key = InputEvent::new(EventKind::KeyPress(KeyEvent::new(KeyCode::End)), 80, 24);
        assert!(key.is_key_press(KeyCode::End));
        assert!(key.mouse().is_none());

        let scroll = InputEvent::new(EventKind::MouseScroll(MouseEvent::new(65, 2, 3)), 80, 24);
        assert_eq!(scroll.mouse(), Some(MouseEvent::new(65, 2, 3)));
        assert!(scroll.key().is_none());

        let resize = InputEvent::new(
            EventKind::Resize {
                width: 100,
                height: 40,
            },
            100,
            40,
        );
        assert!(resize.key().is_none() && resize.mouse().is_none());
    }
}
