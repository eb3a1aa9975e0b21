use std::fmt::{Display, Formatter, Result as FmtResult};

use bincode::Error as BincodeError;
use std::error::Error as StandardError;
use std::io::Error as IOError;

/// Identifies the category of an [`Error`] without carrying its text.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ErrorCode {
    // Lifecycle related.
    NotTrained,
    AlreadyTrained,

    // Shape and parameter related.
    InvalidShape,
    DimensionMismatch,
    InvalidParam,
    InsufficientData,

    // External data related.
    MalformedFile,
    IoError,
}

/// The native error type for IVFADC operations.
#[derive(Debug)]
pub struct Error {
    /// Category of the failure.
    pub code: ErrorCode,
    /// Details about why the error occurred.
    pub message: String,
}

impl Error {
    /// Creates a new error instance.
    /// - `code`: Error category.
    /// - `message`: Details why the error occurred.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl StandardError for Error {}

impl From<IOError> for Error {
    fn from(err: IOError) -> Self {
        Error::new(ErrorCode::IoError, err.to_string())
    }
}

impl From<BincodeError> for Error {
    fn from(err: BincodeError) -> Self {
        Error::new(ErrorCode::IoError, err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::new(ErrorCode::MalformedFile, err.to_string())
    }
}

/// Shorthand result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_code_and_message() {
        let err = Error::new(ErrorCode::NotTrained, "index has not been trained");
        let rendered = err.to_string();
        assert!(rendered.contains("NotTrained"));
        assert!(rendered.contains("has not been trained"));
    }

    #[test]
    fn converts_from_io_error() {
        let io_err = IOError::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert_eq!(err.code, ErrorCode::IoError);
    }
}
