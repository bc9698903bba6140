#![forbid(unsafe_code)]

//! Active graphics capability probing.
//!
//! Each probe writes a query to the terminal and reads the reply through a
//! [`ProbeIo`] transport. Probing is the last resort of protocol selection:
//! it only runs when configuration and environment hints were inconclusive.
//!
//! # Safety Contract
//!
//! - **Interactive only**: a transport that is not a terminal on both ends
//!   reports every protocol unsupported without writing anything.
//! - **Bounded reads**: bytes are awaited in 20 ms windows under an overall
//!   deadline on the monotonic clock; the reply is capped at 256 bytes. Once
//!   some data has arrived, one empty window ends the read.
//! - **Fail-closed**: a timeout, an empty reply or an unrecognised reply
//!   means "unsupported". None of these are errors.
//!
//! # Queries
//!
//! | Protocol | Query                                             | Positive reply         |
//! |----------|---------------------------------------------------|------------------------|
//! | sixel    | `ESC [ c` (DA1)                                   | attribute `4`          |
//! | iTerm2   | `ESC ] 1337 ; ReportCellSize BEL` + DA1           | `1337;ReportCellSize=` |
//! | kitty    | `ESC _ G i=31,s=1,v=1,a=q,t=d,f=24;AAAA ST` + DA1 | `_Gi=31;OK`            |
//!
//! The iTerm2 and kitty queries are followed by a DA1 sentinel. Terminals
//! answer DA1 universally, so the sentinel's reply marks the end of the
//! response whether or not the graphics query was understood.

use std::io;
use std::time::{Duration, Instant};

use crate::decoder::ByteSource;
use crate::protocol::GraphicsProtocol;

/// Maximum bytes read for one probe reply.
pub const MAX_RESPONSE_LEN: usize = 256;

/// Per-byte wait while reading a probe reply.
pub const PROBE_BYTE_TIMEOUT: Duration = Duration::from_millis(20);

/// Default overall deadline per probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Primary Device Attributes query.
pub const DA1_QUERY: &[u8] = b"\x1b[c";

/// iTerm2 cell-size report request followed by the DA1 sentinel.
pub const ITERM2_QUERY: &[u8] = b"\x1b]1337;ReportCellSize\x07\x1b[c";

/// Kitty graphics query for a 1x1 RGB image followed by the DA1 sentinel.
pub const KITTY_QUERY: &[u8] = b"\x1b_Gi=31,s=1,v=1,a=q,t=d,f=24;AAAA\x1b\\\x1b[c";

const DA1_REPLY_PREFIX: &[u8] = b"\x1b[?";
const KITTY_OK: &[u8] = b"_Gi=31;OK";
const ITERM2_CELL_SIZE: &[u8] = b"1337;ReportCellSize=";

/// DA1 attribute code for sixel graphics.
const DA1_SIXEL: u32 = 4;

// ── Transport ────────────────────────────────────────────────────────────

/// Terminal transport used by the probes.
pub trait ProbeIo: ByteSource {
    /// Whether both the input and output ends are terminals.
    fn is_interactive(&self) -> bool;

    /// Discard input that arrived before the query.
    fn flush_input(&mut self);

    /// Write and flush a query.
    ///
    /// # Errors
    ///
    /// Returns the underlying write error.
    fn write_query(&mut self, query: &[u8]) -> io::Result<()>;
}

/// Read a reply until `complete` accepts it, the buffer fills, the deadline
/// passes, or an idle window follows some data.
pub fn read_response<P, F>(io: &mut P, timeout: Duration, complete: F) -> Vec<u8>
where
    P: ProbeIo + ?Sized,
    F: Fn(&[u8]) -> bool,
{
    let deadline = Instant::now() + timeout;
    let mut response = Vec::with_capacity(64);

    while response.len() < MAX_RESPONSE_LEN {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match io.read_byte_timeout(PROBE_BYTE_TIMEOUT.min(remaining)) {
            Some(byte) => {
                response.push(byte);
                if complete(&response) {
                    break;
                }
            }
            None if !response.is_empty() => break,
            None => {}
        }
    }

    response
}

fn send_probe<P, F>(io: &mut P, query: &[u8], timeout: Duration, complete: F) -> Option<Vec<u8>>
where
    P: ProbeIo + ?Sized,
    F: Fn(&[u8]) -> bool,
{
    if !io.is_interactive() {
        return None;
    }
    io.flush_input();
    if io.write_query(query).is_err() {
        crate::debug!("probe query write failed");
        return None;
    }

    let response = read_response(io, timeout, complete);
    if response.is_empty() {
        None
    } else {
        Some(response)
    }
}

// ── Response Grammar ─────────────────────────────────────────────────────

/// Find the first occurrence of `needle` in `haystack`.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// A DA1 reply (`ESC [ ? ... c`) has been fully received.
#[must_use]
pub fn da1_reply_complete(buf: &[u8]) -> bool {
    find_subsequence(buf, DA1_REPLY_PREFIX)
        .is_some_and(|start| buf[start + DA1_REPLY_PREFIX.len()..].contains(&b'c'))
}

/// Completion rule for the sixel probe: a full DA1 reply, or any reply whose
/// last byte is `c`.
#[must_use]
pub fn sixel_reply_complete(buf: &[u8]) -> bool {
    buf.last() == Some(&b'c') || da1_reply_complete(buf)
}

/// Every run of decimal digits in `buf`, in order.
///
/// Runs too large for `u32` are skipped.
#[must_use]
pub fn parse_da1_attributes(buf: &[u8]) -> Vec<u32> {
    buf.split(|b| !b.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .filter_map(|run| std::str::from_utf8(run).ok()?.parse().ok())
        .collect()
}

/// DA1 reply lists the sixel attribute.
#[must_use]
pub fn sixel_supported(buf: &[u8]) -> bool {
    !buf.is_empty() && parse_da1_attributes(buf).contains(&DA1_SIXEL)
}

/// Kitty acknowledged the graphics query.
#[must_use]
pub fn kitty_supported(buf: &[u8]) -> bool {
    find_subsequence(buf, KITTY_OK).is_some()
}

/// iTerm2 answered the cell-size report.
#[must_use]
pub fn iterm2_supported(buf: &[u8]) -> bool {
    find_subsequence(buf, ITERM2_CELL_SIZE).is_some()
}

// ── Probes ───────────────────────────────────────────────────────────────

/// Probe sixel support via DA1.
pub fn probe_sixel<P: ProbeIo + ?Sized>(io: &mut P, timeout: Duration) -> bool {
    let supported = send_probe(io, DA1_QUERY, timeout, sixel_reply_complete)
        .is_some_and(|reply| sixel_supported(&reply));
    crate::debug!(supported, "sixel probe");
    supported
}

/// Probe iTerm2 inline image support.
pub fn probe_iterm2<P: ProbeIo + ?Sized>(io: &mut P, timeout: Duration) -> bool {
    let supported = send_probe(io, ITERM2_QUERY, timeout, da1_reply_complete)
        .is_some_and(|reply| iterm2_supported(&reply));
    crate::debug!(supported, "iTerm2 probe");
    supported
}

/// Probe kitty graphics support.
pub fn probe_kitty<P: ProbeIo + ?Sized>(io: &mut P, timeout: Duration) -> bool {
    let supported = send_probe(io, KITTY_QUERY, timeout, da1_reply_complete)
        .is_some_and(|reply| kitty_supported(&reply));
    crate::debug!(supported, "kitty probe");
    supported
}

/// Try sixel, then iTerm2, then kitty; stop at the first success.
///
/// Returns `None` if nothing answered positively. `timeout` applies to each
/// probe separately.
pub fn probe_graphics<P: ProbeIo + ?Sized>(io: &mut P, timeout: Duration) -> Option<GraphicsProtocol> {
    if !io.is_interactive() {
        return None;
    }
    if probe_sixel(io, timeout) {
        Some(GraphicsProtocol::Sixel)
    } else if probe_iterm2(io, timeout) {
        Some(GraphicsProtocol::Iterm2)
    } else if probe_kitty(io, timeout) {
        Some(GraphicsProtocol::Kitty)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Terminal stand-in that answers known queries with canned replies.
    #[derive(Default)]
    struct FakeTerminal {
        interactive: bool,
        input: VecDeque<u8>,
        written: Vec<u8>,
        replies: Vec<(&'static [u8], &'static [u8])>,
        flushes: usize,
    }

    impl FakeTerminal {
        fn interactive() -> Self {
            Self {
                interactive: true,
                ..Self::default()
            }
        }

        fn reply(mut self, query: &'static [u8], reply: &'static [u8]) -> Self {
            self.replies.push((query, reply));
            self
        }
    }

    impl ByteSource for FakeTerminal {
        fn read_byte(&mut self) -> io::Result<u8> {
            self.input
                .pop_front()
                .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))
        }

        fn read_byte_timeout(&mut self, _timeout: Duration) -> Option<u8> {
            self.input.pop_front()
        }
    }

    impl ProbeIo for FakeTerminal {
        fn is_interactive(&self) -> bool {
            self.interactive
        }

        fn flush_input(&mut self) {
            self.flushes += 1;
            self.input.clear();
        }

        fn write_query(&mut self, query: &[u8]) -> io::Result<()> {
            self.written.extend_from_slice(query);
            if let Some((_, reply)) = self.replies.iter().find(|(q, _)| *q == query) {
                self.input.extend(reply.iter());
            }
            Ok(())
        }
    }

    const SHORT: Duration = Duration::from_millis(30);

    // --- Grammar ---

    #[test]
    fn da1_attributes_anywhere() {
        assert_eq!(parse_da1_attributes(b"\x1b[?62;4;6c"), vec![62, 4, 6]);
        assert_eq!(parse_da1_attributes(b"?62;4;6c"), vec![62, 4, 6]);
        assert_eq!(parse_da1_attributes(b"junk 1 [22"), vec![1, 22]);
        assert!(parse_da1_attributes(b"").is_empty());
        assert_eq!(parse_da1_attributes(b"99999999999;4c"), vec![4]);
    }

    #[test]
    fn sixel_attribute_detection() {
        assert!(sixel_supported(b"?62;4;6c"));
        assert!(!sixel_supported(b"?62;6c"));
        assert!(!sixel_supported(b"?64;44c"));
        assert!(!sixel_supported(b""));
    }

    #[test]
    fn reply_completion_rules() {
        assert!(da1_reply_complete(b"\x1b[?62;4c"));
        assert!(!da1_reply_complete(b"\x1b[?62;4"));
        assert!(!da1_reply_complete(b"62;4c"));
        assert!(da1_reply_complete(b"\x1b_Gi=31;OK\x1b\\\x1b[?62c"));

        assert!(sixel_reply_complete(b"62;4c"));
        assert!(!sixel_reply_complete(b"\x1b[?62"));
    }

    #[test]
    fn graphics_reply_grammars() {
        assert!(kitty_supported(b"\x1b_Gi=31;OK\x1b\\\x1b[?62;22c"));
        assert!(!kitty_supported(b"\x1b_Gi=31;ENOENT:no\x1b\\\x1b[?62c"));
        assert!(iterm2_supported(
            b"\x1b]1337;ReportCellSize=17.0;8.0;1.0\x1b\\\x1b[?62c"
        ));
        assert!(!iterm2_supported(b"\x1b[?62c"));
    }

    // --- Read loop ---

    #[test]
    fn read_response_stops_at_completion() {
        let mut term = FakeTerminal::interactive();
        term.input.extend(b"\x1b[?62;4cEXTRA".iter());
        let reply = read_response(&mut term, SHORT, da1_reply_complete);
        assert_eq!(reply, b"\x1b[?62;4c");
        assert_eq!(term.input.len(), 5);
    }

    #[test]
    fn read_response_is_capped() {
        let mut term = FakeTerminal::interactive();
        term.input.extend(std::iter::repeat_n(b'x', 1000));
        let reply = read_response(&mut term, Duration::from_secs(5), |_| false);
        assert_eq!(reply.len(), MAX_RESPONSE_LEN);
    }

    #[test]
    fn read_response_idle_window_ends_partial_reply() {
        let mut term = FakeTerminal::interactive();
        term.input.extend(b"\x1b[?62".iter());
        let start = Instant::now();
        let reply = read_response(&mut term, Duration::from_secs(5), da1_reply_complete);
        assert_eq!(reply, b"\x1b[?62");
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn read_response_empty_waits_for_deadline() {
        let mut term = FakeTerminal::interactive();
        let start = Instant::now();
        let reply = read_response(&mut term, SHORT, da1_reply_complete);
        assert!(reply.is_empty());
        assert!(start.elapsed() >= SHORT);
    }

    // --- Probes ---

    #[test]
    fn non_interactive_probes_write_nothing() {
        let mut term = FakeTerminal::default().reply(DA1_QUERY, b"\x1b[?62;4c");
        assert!(!probe_sixel(&mut term, SHORT));
        assert!(!probe_kitty(&mut term, SHORT));
        assert_eq!(probe_graphics(&mut term, SHORT), None);
        assert!(term.written.is_empty());
    }

    #[test]
    fn stale_input_is_flushed_before_query() {
        let mut term = FakeTerminal::interactive().reply(DA1_QUERY, b"\x1b[?62;6c");
        term.input.extend(b"4;4;4".iter());
        assert!(!probe_sixel(&mut term, SHORT));
        assert_eq!(term.flushes, 1);
    }

    #[test]
    fn sixel_wins_first() {
        let mut term = FakeTerminal::interactive()
            .reply(DA1_QUERY, b"\x1b[?62;4;22c")
            .reply(KITTY_QUERY, b"\x1b_Gi=31;OK\x1b\\\x1b[?62;4c");
        assert_eq!(probe_graphics(&mut term, SHORT), Some(GraphicsProtocol::Sixel));
        assert_eq!(term.written, DA1_QUERY);
    }

    #[test]
    fn iterm2_before_kitty() {
        let mut term = FakeTerminal::interactive()
            .reply(DA1_QUERY, b"\x1b[?62;22c")
            .reply(ITERM2_QUERY, b"\x1b]1337;ReportCellSize=17.0;8.0\x07\x1b[?62;22c")
            .reply(KITTY_QUERY, b"\x1b_Gi=31;OK\x1b\\\x1b[?62;22c");
        assert_eq!(probe_graphics(&mut term, SHORT), Some(GraphicsProtocol::Iterm2));
        assert_eq!(term.flushes, 2);
    }

    #[test]
    fn kitty_last() {
        let mut term = FakeTerminal::interactive()
            .reply(DA1_QUERY, b"\x1b[?62;22c")
            .reply(ITERM2_QUERY, b"\x1b[?62;22c")
            .reply(KITTY_QUERY, b"\x1b_Gi=31;OK\x1b\\\x1b[?62;22c");
        assert_eq!(probe_graphics(&mut term, SHORT), Some(GraphicsProtocol::Kitty));
        let mut expected = Vec::new();
        expected.extend_from_slice(DA1_QUERY);
        expected.extend_from_slice(ITERM2_QUERY);
        expected.extend_from_slice(KITTY_QUERY);
        assert_eq!(term.written, expected);
    }

    #[test]
    fn silent_terminal_supports_nothing() {
        let mut term = FakeTerminal::interactive();
        assert_eq!(probe_graphics(&mut term, SHORT), None);
    }
}
