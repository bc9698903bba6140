#![forbid(unsafe_code)]

//! Passive graphics capability hints.
//!
//! A static table maps terminal identities to the graphics protocols they
//! speak. Matching reads three kinds of signal from the environment:
//!
//! - `TERM`: compared exactly against [`TerminalHint::terms`]
//! - `TERM_PROGRAM`: compared case-insensitively against
//!   [`TerminalHint::programs`]
//! - marker variables: [`TerminalHint::markers`] match on presence alone;
//!   the value is ignored
//!
//! # Precedence
//!
//! [`match_environment`] returns the *first* matching entry in declaration
//! order, so wrappers (tmux, GNU screen) that leave the outer terminal's
//! variables behind are reported as themselves.
//!
//! The `supports_*` accessors scan the *whole* table: any matching entry
//! declaring the capability is enough. An outer WezTerm seen through tmux
//! therefore still reports kitty graphics.
//!
//! | Terminal   | kitty | iTerm2 | sixel |
//! |------------|:-----:|:------:|:-----:|
//! | tmux       |       |        |       |
//! | GNU screen |       |        |       |
//! | kitty      |   ✓   |        |       |
//! | Ghostty    |   ✓   |        |       |
//! | WezTerm    |   ✓   |   ✓    |   ✓   |
//! | iTerm2     |       |   ✓    |   ✓   |
//! | Konsole    |   ✓   |        |   ✓   |
//! | foot       |       |        |   ✓   |
//! | mlterm     |       |        |   ✓   |
//! | Contour    |       |        |   ✓   |
//! | mintty     |       |   ✓    |   ✓   |
//! | Rio        |       |   ✓    |   ✓   |
//! | Black Box  |       |        |   ✓   |
//! | xterm-sixel|       |        |   ✓   |

/// One known terminal identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalHint {
    /// Display name.
    pub name: &'static str,
    /// Exact `TERM` values.
    pub terms: &'static [&'static str],
    /// `TERM_PROGRAM` values, compared case-insensitively.
    pub programs: &'static [&'static str],
    /// Variables whose presence identifies the terminal.
    pub markers: &'static [&'static str],
    /// Kitty graphics protocol.
    pub kitty: bool,
    /// iTerm2 inline images (OSC 1337).
    pub iterm2: bool,
    /// DEC sixel graphics.
    pub sixel: bool,
}

impl TerminalHint {
    /// Whether this entry matches the environment seen through `get_env`.
    pub fn matches<F>(&self, get_env: &F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(term) = get_env("TERM")
            && self.terms.iter().any(|t| *t == term)
        {
            return true;
        }
        if let Some(program) = get_env("TERM_PROGRAM")
            && self
                .programs
                .iter()
                .any(|p| p.eq_ignore_ascii_case(program.trim()))
        {
            return true;
        }
        self.markers.iter().any(|marker| get_env(marker).is_some())
    }
}

const fn hint(
    name: &'static str,
    terms: &'static [&'static str],
    programs: &'static [&'static str],
    markers: &'static [&'static str],
    [kitty, iterm2, sixel]: [bool; 3],
) -> TerminalHint {
    TerminalHint {
        name,
        terms,
        programs,
        markers,
        kitty,
        iterm2,
        sixel,
    }
}

const NONE: [bool; 3] = [false, false, false];
const KITTY: [bool; 3] = [true, false, false];
const SIXEL: [bool; 3] = [false, false, true];
const ITERM2_SIXEL: [bool; 3] = [false, true, true];

static HINT_TABLE: &[TerminalHint] = &[
    hint("tmux", &["tmux", "tmux-256color"], &["tmux"], &["TMUX"], NONE),
    hint("GNU screen", &["screen", "screen-256color"], &[], &["STY"], NONE),
    hint("kitty", &["xterm-kitty"], &["kitty"], &["KITTY_WINDOW_ID", "KITTY_PID"], KITTY),
    hint("Ghostty", &["xterm-ghostty"], &["ghostty"], &["GHOSTTY_RESOURCES_DIR"], KITTY),
    hint(
        "WezTerm",
        &["wezterm"],
        &["WezTerm"],
        &["WEZTERM_EXECUTABLE", "WEZTERM_PANE"],
        [true, true, true],
    ),
    hint("iTerm2", &[], &["iTerm.app"], &["ITERM_SESSION_ID"], ITERM2_SIXEL),
    hint(
        "Konsole",
        &["konsole", "konsole-256color"],
        &["konsole"],
        &["KONSOLE_VERSION", "KONSOLE_DBUS_SESSION"],
        [true, false, true],
    ),
    hint("foot", &["foot", "foot-extra"], &["foot"], &[], SIXEL),
    hint("mlterm", &["mlterm"], &["mlterm"], &["MLTERM"], SIXEL),
    hint("Contour", &["contour"], &["contour"], &["CONTOUR_PROFILE"], SIXEL),
    hint("mintty", &["mintty"], &["mintty"], &["MINTTY_SHORTCUT"], ITERM2_SIXEL),
    hint("Rio", &["rio"], &["rio"], &[], ITERM2_SIXEL),
    hint("Black Box", &[], &["BlackBox"], &["BLACKBOX_THEMES_DIR"], SIXEL),
    hint("xterm-sixel", &["xterm-sixel"], &[], &[], SIXEL),
];

/// The full hint table in precedence order.
#[must_use]
pub fn hint_table() -> &'static [TerminalHint] {
    HINT_TABLE
}

/// First table entry matching the process environment.
#[must_use]
pub fn match_environment() -> Option<&'static TerminalHint> {
    match_environment_with(|key| std::env::var(key).ok())
}

/// First table entry matching a custom environment lookup (for tests).
#[must_use]
pub fn match_environment_with<F>(get_env: F) -> Option<&'static TerminalHint>
where
    F: Fn(&str) -> Option<String>,
{
    let found = HINT_TABLE.iter().find(|entry| entry.matches(&get_env));
    if let Some(entry) = found {
        crate::debug!(terminal = entry.name, "environment matched terminal hint");
    }
    found
}

/// Whether any matching entry declares kitty graphics.
#[must_use]
pub fn supports_kitty() -> bool {
    PassiveCapabilities::detect().kitty
}

/// Whether any matching entry declares iTerm2 inline images.
#[must_use]
pub fn supports_iterm2() -> bool {
    PassiveCapabilities::detect().iterm2
}

/// Whether any matching entry declares sixel.
#[must_use]
pub fn supports_sixel() -> bool {
    PassiveCapabilities::detect().sixel
}

/// Graphics capabilities inferred from the environment without touching the
/// terminal device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassiveCapabilities {
    /// First matching table entry.
    pub terminal: Option<&'static TerminalHint>,
    /// Some matching entry declares kitty graphics.
    pub kitty: bool,
    /// Some matching entry declares iTerm2 inline images.
    pub iterm2: bool,
    /// Some matching entry declares sixel.
    pub sixel: bool,
}

impl PassiveCapabilities {
    /// Inspect the process environment.
    #[must_use]
    pub fn detect() -> Self {
        Self::detect_with(|key| std::env::var(key).ok())
    }

    /// Inspect a custom environment lookup (for tests).
    #[must_use]
    pub fn detect_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut caps = Self::default();
        for entry in HINT_TABLE.iter().filter(|entry| entry.matches(&get_env)) {
            caps.terminal.get_or_insert(entry);
            caps.kitty |= entry.kitty;
            caps.iterm2 |= entry.iterm2;
            caps.sixel |= entry.sixel;
        }
        crate::trace!(
            kitty = caps.kitty,
            iterm2 = caps.iterm2,
            sixel = caps.sixel,
            "passive graphics hints"
        );
        caps
    }

    /// Whether any graphics protocol was hinted.
    #[must_use]
    pub const fn any(&self) -> bool {
        self.kitty || self.iterm2 || self.sixel
    }
}
