//! Property-based invariant tests for the event decoder.
//!
//! 1. A lone ordinary byte decodes to a key press carrying that byte.
//! 2. Arbitrary input never panics and every decode consumes input.
//! 3. Decoded events carry the size passed in.
//! 4. SGR press reports round-trip their fields on a fresh decoder.
//! 5. Double clicks need the same row, at most one column of drift and
//!    less than 400 ms.
//! 6. Wheel reports of one button closer than 150 ms are debounced.
//! 7. An unget event comes back verbatim without reading.
//! 8. Escape sequence accumulation is bounded.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use lumen_core::clock::ManualClock;
use lumen_core::decoder::{ByteSource, EventDecoder, MAX_SEQUENCE_LEN};
use lumen_core::event::{EventKind, InputEvent, KeyCode, KeyEvent, MouseEvent};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

struct Script {
    bytes: VecDeque<u8>,
}

impl Script {
    fn new(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.iter().copied().collect(),
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        self.bytes.extend(bytes);
    }
}

impl ByteSource for Script {
    fn read_byte(&mut self) -> io::Result<u8> {
        self.bytes
            .pop_front()
            .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))
    }

    fn read_byte_timeout(&mut self, _timeout: Duration) -> Option<u8> {
        self.bytes.pop_front()
    }
}

fn decoder() -> (EventDecoder<ManualClock>, ManualClock) {
    let clock = ManualClock::new();
    (EventDecoder::with_clock(clock.clone()), clock)
}

fn press(button: u16, x: u16, y: u16) -> Vec<u8> {
    format!("\x1b[<{button};{x};{y}M").into_bytes()
}

fn ordinary_byte() -> impl Strategy<Value = u8> {
    any::<u8>().prop_filter("not ESC or 0xEF", |b| *b != 0x1b && *b != 0xef)
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Ordinary bytes
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn ordinary_byte_is_key_press(b in ordinary_byte()) {
        let (mut dec, _) = decoder();
        let mut src = Script::new(&[b]);
        let ev = dec.decode(&mut src, (80, 24)).unwrap();
        prop_assert_eq!(ev.kind, EventKind::KeyPress(KeyEvent::new(KeyCode::Char(b as char))));
        prop_assert!(!dec.has_pending());
        prop_assert!(src.bytes.is_empty());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2 + 3. Arbitrary input terminates with the right stamp
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn arbitrary_input_drains(
        bytes in proptest::collection::vec(any::<u8>(), 0..256),
        w in 1u16..500,
        h in 1u16..500,
    ) {
        let (mut dec, _) = decoder();
        let mut src = Script::new(&bytes);
        let mut decoded = 0usize;
        loop {
            let before = src.bytes.len();
            match dec.decode(&mut src, (w, h)) {
                Ok(ev) => {
                    prop_assert!(src.bytes.len() < before, "decode consumed nothing");
                    prop_assert_eq!((ev.width, ev.height), (w, h));
                    decoded += 1;
                }
                Err(err) => {
                    prop_assert!(err.is_eof());
                    prop_assert!(src.bytes.is_empty());
                    break;
                }
            }
        }
        prop_assert!(decoded <= bytes.len());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. SGR press fields
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn sgr_press_fields(button in 0u16..64, x in 1u16..=1000, y in 1u16..=1000) {
        let (mut dec, _) = decoder();
        let mut src = Script::new(&press(button, x, y));
        let ev = dec.decode(&mut src, (80, 24)).unwrap();
        prop_assert_eq!(ev.kind, EventKind::MousePress(MouseEvent::new(button, x, y)));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Double-click tolerance
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn double_click_tolerance(
        x in 4u16..1000,
        y in 1u16..1000,
        dx in -3i32..=3,
        dy in -1i32..=1,
        gap_ms in 0u64..800,
    ) {
        let (mut dec, clock) = decoder();
        let mut src = Script::new(&press(0, x, y));
        dec.decode(&mut src, (80, 24)).unwrap();

        clock.advance(Duration::from_millis(gap_ms));
        let x2 = u16::try_from(i32::from(x) + dx).unwrap();
        let y2 = u16::try_from(i32::from(y) + dy).unwrap();
        src.push(&press(0, x2, y2));
        let kind = dec.decode(&mut src, (80, 24)).unwrap().kind;

        let expect_double = gap_ms < 400 && dx.abs() <= 1 && dy == 0;
        prop_assert_eq!(matches!(kind, EventKind::MouseDoubleClick(_)), expect_double);
        prop_assert_eq!(matches!(kind, EventKind::MousePress(_)), !expect_double);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Scroll debounce
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn scroll_debounce_window(button in 64u16..=65, gap_ms in 0u64..400) {
        let (mut dec, clock) = decoder();
        let mut src = Script::new(&press(button, 5, 5));
        let first = dec.decode(&mut src, (80, 24)).unwrap().kind;
        prop_assert!(matches!(first, EventKind::MouseScroll(_)));

        clock.advance(Duration::from_millis(gap_ms));
        src.push(&press(button, 5, 5));
        let second = dec.decode(&mut src, (80, 24)).unwrap().kind;
        if gap_ms < 150 {
            prop_assert!(matches!(second, EventKind::MouseRelease(_)));
        } else {
            prop_assert!(matches!(second, EventKind::MouseScroll(_)));
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 7. Lookahead
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn unget_is_verbatim(
        bytes in proptest::collection::vec(any::<u8>(), 0..16),
        w in any::<u16>(),
        h in any::<u16>(),
        c in any::<char>(),
    ) {
        let (mut dec, _) = decoder();
        let mut src = Script::new(&bytes);
        let stored = InputEvent::new(EventKind::KeyPress(KeyEvent::new(KeyCode::Char(c))), w, h);
        dec.unget(stored);
        prop_assert_eq!(dec.decode(&mut src, (1, 1)).unwrap(), stored);
        prop_assert_eq!(src.bytes.len(), bytes.len());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 8. Bounded accumulation
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn accumulation_is_bounded(
        body in proptest::collection::vec(b'0'..=b'9', 0..100),
        introducer in prop_oneof![Just(b'['), Just(b'O')],
    ) {
        let mut bytes = vec![0x1b, introducer];
        bytes.extend(&body);
        bytes.push(b'A');
        let (mut dec, _) = decoder();
        let mut src = Script::new(&bytes);
        dec.decode(&mut src, (80, 24)).unwrap();
        let consumed = bytes.len() - src.bytes.len();
        prop_assert!(consumed <= 2 + MAX_SEQUENCE_LEN);
    }
}
