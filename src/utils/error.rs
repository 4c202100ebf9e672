use std::fmt;
use std::io;

/// Comprehensive error types for fanlog operations.
///
/// Configuration errors surface to the caller; emission errors are reported
/// through the process-wide error hook and never returned from log calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The supplied options failed validation (e.g. bad network, bad facility).
    OptionsInvalid(String),
    /// A file sink target could not be opened or its parent created.
    FilepathUnavailable(String),
    /// A sink could not be constructed from its options fragment.
    SinkConstructFailed(String),
    /// A syslog transport could not be dialed or lost its connection.
    TransportUnavailable(String),
    /// The sink is draining; its queue is full and no longer accepts writes.
    SinkClosing,
    /// The sink has been closed; writes are rejected.
    SinkClosed,
    /// The logger has been closed; the io-writer adapter rejects input.
    LoggerClosed,
    /// JSON input was not a flat object.
    MalformedJson(String),
    /// An entry could not be serialized for a sink.
    FormatFailed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OptionsInvalid(detail) => {
                write!(f, "invalid options: {}", detail)
            }
            Error::FilepathUnavailable(path) => {
                write!(f, "log file path unavailable: {}", path)
            }
            Error::SinkConstructFailed(detail) => {
                write!(f, "sink construction failed: {}", detail)
            }
            Error::TransportUnavailable(detail) => {
                write!(f, "syslog transport unavailable: {}", detail)
            }
            Error::SinkClosing => write!(f, "sink is draining and rejects new writes"),
            Error::SinkClosed => write!(f, "sink is closed"),
            Error::LoggerClosed => write!(f, "logger is closed"),
            Error::MalformedJson(detail) => {
                write!(f, "malformed JSON, expected a flat object: {}", detail)
            }
            Error::FormatFailed(detail) => {
                write!(f, "entry formatting failed: {}", detail)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<Error> for io::Error {
    /// Converts fanlog errors to `io::Error` for the `io::Write` adapter.
    ///
    /// Closed-pipeline states map to `BrokenPipe`; everything else is
    /// surfaced as `Other` with the display message preserved.
    fn from(err: Error) -> io::Error {
        match err {
            Error::SinkClosing | Error::SinkClosed | Error::LoggerClosed => {
                io::Error::new(io::ErrorKind::BrokenPipe, err.to_string())
            }
            _ => io::Error::other(err.to_string()),
        }
    }
}

/// Convenient Result type alias for fanlog operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::FilepathUnavailable("/var/log/app.log".to_string());
        assert!(err.to_string().contains("/var/log/app.log"));

        let err = Error::OptionsInvalid("network must be tcp or udp".to_string());
        assert!(err.to_string().contains("invalid options"));
    }

    #[test]
    fn test_io_error_conversion() {
        let err: io::Error = Error::LoggerClosed.into();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

        let err: io::Error = Error::FormatFailed("bad value".to_string()).into();
        assert!(err.to_string().contains("bad value"));
    }
}
