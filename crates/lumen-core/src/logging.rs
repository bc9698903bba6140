#![forbid(unsafe_code)]

//! Logging facade.
//!
//! With the `tracing` feature the crate root re-exports the `tracing` macros.
//! Without it, the same macro names expand to nothing, so call sites such as
//! `crate::debug!(...)` compile identically in both configurations.
//!
//! The `tracing-json` feature adds [`init_json_subscriber`] for binaries that
//! want newline-delimited JSON logs filtered by `RUST_LOG`.

#[cfg(feature = "tracing")]
pub use tracing::{debug, info, trace, warn};

// Level macros used by this workspace; each swallows its arguments.
#[cfg(not(feature = "tracing"))]
mod disabled {
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    #[macro_export]
    macro_rules! info {
        ($($arg:tt)*) => {};
    }

    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {};
    }
}

/// Install a global JSON subscriber filtered by `RUST_LOG`.
///
/// Returns `false` if another global subscriber was already installed.
/// Log output goes to stderr so it never interleaves with terminal control
/// sequences written to stdout.
#[cfg(feature = "tracing-json")]
pub fn init_json_subscriber() -> bool {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
