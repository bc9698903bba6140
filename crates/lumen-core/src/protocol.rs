#![forbid(unsafe_code)]

//! Graphics protocol selection.
//!
//! The resolved protocol is chosen once at startup. Resolution order:
//!
//! 1. `force_text` always wins and selects plain text.
//! 2. An explicit override other than `auto` is taken as-is.
//! 3. Passive hints, preferring kitty, then iTerm2, then sixel.
//! 4. Active probes, only when a transport is available: sixel, then
//!    iTerm2, then kitty.
//! 5. Plain text.

use std::fmt;
use std::str::FromStr;

use crate::caps_probe::{self, ProbeIo};
use crate::config::SessionConfig;
use crate::error::Error;
use crate::terminal_capabilities::PassiveCapabilities;

/// User-requested protocol, or `Auto` to detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProtocolOverride {
    /// Detect from hints and probes.
    #[default]
    Auto,
    /// Plain text rendering.
    Text,
    /// DEC sixel.
    Sixel,
    /// Kitty graphics protocol.
    Kitty,
    /// iTerm2 inline images.
    Iterm2,
}

impl ProtocolOverride {
    /// Canonical setting value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Text => "text",
            Self::Sixel => "sixel",
            Self::Kitty => "kitty",
            Self::Iterm2 => "iterm2",
        }
    }

    /// The forced protocol, or `None` for `Auto`.
    #[must_use]
    pub const fn forced(&self) -> Option<GraphicsProtocol> {
        match self {
            Self::Auto => None,
            Self::Text => Some(GraphicsProtocol::Text),
            Self::Sixel => Some(GraphicsProtocol::Sixel),
            Self::Kitty => Some(GraphicsProtocol::Kitty),
            Self::Iterm2 => Some(GraphicsProtocol::Iterm2),
        }
    }
}

impl FromStr for ProtocolOverride {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "text" | "none" | "ascii" => Ok(Self::Text),
            "sixel" => Ok(Self::Sixel),
            "kitty" => Ok(Self::Kitty),
            "iterm" | "iterm2" => Ok(Self::Iterm2),
            _ => Err(Error::invalid_argument("protocol", s)),
        }
    }
}

impl fmt::Display for ProtocolOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A concrete output protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GraphicsProtocol {
    /// Plain text, no inline images.
    #[default]
    Text,
    /// DEC sixel.
    Sixel,
    /// Kitty graphics protocol.
    Kitty,
    /// iTerm2 inline images.
    Iterm2,
}

impl GraphicsProtocol {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Sixel => "sixel",
            Self::Kitty => "kitty",
            Self::Iterm2 => "iterm2",
        }
    }
}

impl fmt::Display for GraphicsProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolved protocol plus the gamma the media views apply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtocolSelection {
    /// The chosen protocol.
    pub protocol: GraphicsProtocol,
    /// Gamma carried unchanged from configuration.
    pub gamma: f32,
}

impl ProtocolSelection {
    #[must_use]
    pub const fn new(protocol: GraphicsProtocol, gamma: f32) -> Self {
        Self { protocol, gamma }
    }

    /// Plain text selected.
    #[must_use]
    pub const fn text(&self) -> bool {
        matches!(self.protocol, GraphicsProtocol::Text)
    }

    /// Sixel selected.
    #[must_use]
    pub const fn sixel(&self) -> bool {
        matches!(self.protocol, GraphicsProtocol::Sixel)
    }

    /// Kitty graphics selected.
    #[must_use]
    pub const fn kitty(&self) -> bool {
        matches!(self.protocol, GraphicsProtocol::Kitty)
    }

    /// iTerm2 inline images selected.
    #[must_use]
    pub const fn iterm2(&self) -> bool {
        matches!(self.protocol, GraphicsProtocol::Iterm2)
    }
}

/// Resolve the session's graphics protocol.
///
/// `probe` is consulted only when configuration and `hints` leave the
/// choice open. Pass `None` to skip probing entirely.
pub fn select_protocol(
    config: &SessionConfig,
    hints: &PassiveCapabilities,
    probe: Option<&mut dyn ProbeIo>,
) -> ProtocolSelection {
    let protocol = resolve(config, hints, probe);
    crate::info!(protocol = protocol.as_str(), "graphics protocol selected");
    ProtocolSelection::new(protocol, config.gamma)
}

fn resolve(
    config: &SessionConfig,
    hints: &PassiveCapabilities,
    probe: Option<&mut dyn ProbeIo>,
) -> GraphicsProtocol {
    if config.force_text {
        return GraphicsProtocol::Text;
    }
    if let Some(forced) = config.protocol.forced() {
        return forced;
    }
    if hints.kitty {
        return GraphicsProtocol::Kitty;
    }
    if hints.iterm2 {
        return GraphicsProtocol::Iterm2;
    }
    if hints.sixel {
        return GraphicsProtocol::Sixel;
    }
    probe
        .and_then(|io| caps_probe::probe_graphics(io, config.probe_timeout))
        .unwrap_or(GraphicsProtocol::Text)
}
