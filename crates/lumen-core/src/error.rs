#![forbid(unsafe_code)]

//! Error type shared by the input layer.
//!
//! Only conditions the driving loop must act on are errors. Malformed escape
//! sequences decode to [`KeyCode::Unknown`](crate::event::KeyCode::Unknown)
//! and probe timeouts are negative capability results.

use std::fmt;
use std::io;

/// Input layer error.
#[derive(Debug)]
pub enum Error {
    /// The terminal device could not be opened or duplicated, so no handler
    /// could be constructed.
    Open(io::Error),
    /// A terminal mode get/set call failed, or a blocking read failed.
    ///
    /// End-of-file on a blocking read is reported here with
    /// [`io::ErrorKind::UnexpectedEof`].
    Terminal(io::Error),
    /// A configuration value could not be interpreted.
    InvalidArgument {
        /// Setting name.
        key: String,
        /// Rejected value.
        value: String,
    },
}

/// Result alias for the input layer.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build an [`Error::InvalidArgument`].
    pub fn invalid_argument(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidArgument {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Whether this error reports end-of-input on the terminal device.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Terminal(err) if err.kind() == io::ErrorKind::UnexpectedEof)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open(err) => write!(f, "cannot open terminal device: {err}"),
            Self::Terminal(err) => write!(f, "terminal mode or read failure: {err}"),
            Self::InvalidArgument { key, value } => {
                write!(f, "invalid value {value:?} for setting {key:?}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open(err) | Self::Terminal(err) => Some(err),
            Self::InvalidArgument { .. } => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Terminal(err)
    }
}
