#![forbid(unsafe_code)]

//! Core: input decoding, terminal capability hints, and graphics protocol
//! negotiation for Lumen.
//!
//! # Role in Lumen
//! `lumen-core` is the platform-independent half of the input layer. It turns
//! bytes delivered by a [`ByteSource`](decoder::ByteSource) into typed
//! [`InputEvent`](event::InputEvent)s and decides which terminal graphics
//! protocol the media views should speak.
//!
//! # Primary responsibilities
//! - **EventDecoder**: timeout-bounded escape-sequence and SGR mouse decoding,
//!   double-click recognition, scroll debounce, one-event lookahead.
//! - **Terminal hints**: a static table of known terminals and the graphics
//!   protocols they speak.
//! - **Capability probing**: query grammars and the bounded response reader,
//!   generic over a [`ProbeIo`](caps_probe::ProbeIo) transport.
//! - **Protocol selection**: combine overrides, hints, and probes.
//!
//! # How it fits in the system
//! `lumen-tty` supplies the Unix descriptors (raw mode, poll(2) reads, window
//! size) and drives the decoder from its `InputHandler`.

pub mod caps_probe;
pub mod clock;
pub mod config;
pub mod decoder;
pub mod error;
pub mod event;
pub mod logging;
pub mod protocol;
pub mod terminal_capabilities;

pub use error::{Error, Result};

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, info, trace, warn};
