use std::fmt::Display;

/// EmberDB errors.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// The requested key does not exist in the index.
    KeyNotFound,
    /// A list index is outside the list's bounds.
    WrongIndex,
    /// A log entry failed its checksum, typically corruption or a torn write.
    InvalidCrc,
    /// No further entries at this offset. Terminates replay and GC scans;
    /// never surfaced to callers of the public API.
    EndOfEntry,
    /// An index locator points at a log file that is no longer present.
    /// Indicates a bug or external tampering with the data directory.
    LogFileNotFound(u32),
    /// Inconsistent or undecodable index state, typically a malformed
    /// composite key.
    Index(String),
    /// Rejected configuration.
    InvalidOptions(String),
    /// An IO error.
    Io(String),
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::KeyNotFound => write!(f, "key not found"),
            Error::WrongIndex => write!(f, "list index out of range"),
            Error::InvalidCrc => write!(f, "invalid crc, log entry is corrupted"),
            Error::EndOfEntry => write!(f, "end of entries in log file"),
            Error::LogFileNotFound(fid) => write!(f, "log file {fid} not found"),
            Error::Index(msg) => write!(f, "index error: {msg}"),
            Error::InvalidOptions(msg) => write!(f, "invalid options: {msg}"),
            Error::Io(msg) => write!(f, "io error: {msg}"),
        }
    }
}

/// An EmberDB Result returning Error.
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Error::Io(err.to_string())
    }
}
