//! Crate-specific errors.

use std::io;
use thiserror::Error;

/// Crate-specific errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The byte source ended in the middle of a record, header, or ray.
    #[error("truncated stream: {0}")]
    TruncatedStream(String),

    /// A header field violates its declared range.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// A data mask bit is set but no data type is registered for it.
    #[error("data mask bit {0} does not name a known data type")]
    UnknownDataType(u16),

    /// Wraps [std::io::Error] for OS-level read, write, and socket failures.
    #[error("io error: {0}")]
    Io(io::Error),

    /// A malformed request, the wrong ancillary-data shape, or an
    /// unsupported subcommand arrived on the daemon socket.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A caller-supplied argument is unusable.
    ///
    /// The message is written as-is to the error channel, e.g.
    /// "KDPX is not a Sigmet data type.".
    #[error("{0}")]
    BadArgument(String),

    /// An allocation failed or the process ran out of file descriptors.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The daemon reported a failure; the message is the text it wrote to
    /// the error channel.
    #[error("{0}")]
    Daemon(String),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        // Running off the end of the source is a format-level failure, not
        // an OS one.
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Error::TruncatedStream("unexpected end of stream".to_string())
        } else {
            Error::Io(err)
        }
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(err: std::collections::TryReserveError) -> Error {
        Error::ResourceExhausted(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_eof_is_truncated_stream() {
        let err = Error::from(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert!(matches!(err, Error::TruncatedStream(_)));
    }

    #[test]
    fn other_io_errors_stay_io() {
        let err = Error::from(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        assert!(matches!(err, Error::Io(_)));
    }
}
