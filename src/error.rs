use std::io;
use trackable::error::{ErrorKind as TrackableErrorKind, ErrorKindExt, TrackableError};

use crate::Result;

/// This crate specific `Error` type.
#[derive(Debug, Clone, TrackableError)]
pub struct Error(TrackableError<ErrorKind>);
impl From<io::Error> for Error {
    fn from(f: io::Error) -> Self {
        if f.kind() == io::ErrorKind::UnexpectedEof {
            ErrorKind::Truncated.cause(f).into()
        } else {
            ErrorKind::Other.cause(f).into()
        }
    }
}

/// Possible error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input does not have the expected container format
    /// (no stable TS sync framing, or no leading sequence header).
    FormatMismatch,

    /// The end of the input was reached in the middle of a header, section or packet.
    Truncated,

    /// A PSI section could not be assembled consistently within the retry budget.
    SectionIntegrity,

    /// A requested stream, PID or sample does not exist.
    NotFound,

    /// Input is invalid.
    InvalidInput,

    /// Other errors (e.g., I/O error).
    Other,
}
impl TrackableErrorKind for ErrorKind {}

/// Conversion of "ran out of bytes" failures into a normal end of stream.
pub(crate) trait TruncatedAsEos<T> {
    fn or_eos(self) -> Result<Option<T>>;
}
impl<T> TruncatedAsEos<T> for Result<Option<T>> {
    fn or_eos(self) -> Result<Option<T>> {
        match self {
            Err(ref e) if *e.kind() == ErrorKind::Truncated => Ok(None),
            other => other,
        }
    }
}
