use std::{ffi::NulError, fmt};

use crate::adapter::ErrorCode;

pub type Result<T> = std::result::Result<T, Error>;

/// A protocol error reported by the server for a request issued inside a trap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XError {
    code: ErrorCode,
    name: String,
}

impl XError {
    pub(crate) fn new(code: ErrorCode, name: String) -> Self {
        Self { code, name }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for XError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "XError: {}", self.name)
    }
}

impl std::error::Error for XError {}

#[derive(Debug)]
pub enum Error {
    // trap errors
    Protocol(XError),

    // native binding errors
    LibraryUnavailable(String),
    NoDisplay(String),

    // other modules errors
    Context { error: Box<Error>, message: String },
    FallBack(Box<dyn std::error::Error>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Protocol(err) => write!(f, "{err}"),
            Error::LibraryUnavailable(reason) => write!(f, "X11 library unavailable: {reason}"),
            Error::NoDisplay(reason) => write!(f, "Unable to open display: {reason}"),
            Error::Context { error, message } => write!(f, "{message}: {error}"),
            Error::FallBack(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Protocol(err) => Some(err),
            Error::Context { error, .. } => Some(error.as_ref()),
            Error::FallBack(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<XError> for Error {
    fn from(value: XError) -> Self {
        Error::Protocol(value)
    }
}

impl From<NulError> for Error {
    fn from(value: NulError) -> Self {
        Error::FallBack(Box::new(value))
    }
}

/// Error types the trap combinators can carry.
///
/// Protocol errors have to be recognizable inside the caller's own error type:
/// swallowing regions discard them while letting every other failure through.
pub trait TrapFailure: From<XError> + fmt::Display {
    fn as_x_error(&self) -> Option<&XError>;
}

impl TrapFailure for XError {
    fn as_x_error(&self) -> Option<&XError> {
        Some(self)
    }
}

impl TrapFailure for Error {
    fn as_x_error(&self) -> Option<&XError> {
        match self {
            Error::Protocol(err) => Some(err),
            Error::Context { error, .. } => error.as_x_error(),
            _ => None,
        }
    }
}

macro_rules! error_context{
    ($result : expr, $($t : tt)*) => {
        $result.map_err(|e| crate::error::Error::Context {
            error   : Box::new(e.into()),
            message : format!($($t)*)
        })
    };
}

macro_rules! fallback_error {
    ($($t : tt)*) => {
        crate::error::Error::FallBack(format!($($t)*).into())
    };
}

pub(crate) use error_context;
pub(crate) use fallback_error;
