//! Error types for liveconf
//!
//! Errors are structured: a kind that callers can match on, the
//! configuration path involved, the underlying cause and an actionable
//! help message.

use std::fmt;
use std::path::Path;

/// Result type alias for liveconf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for liveconf operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Config path (e.g. "database.port") or file path the error refers to
    pub path: Option<String>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// Malformed path expression
    #[error("Invalid key")]
    InvalidKey,
    /// Negative, non-numeric or out-of-range sequence index
    #[error("Invalid slice index")]
    InvalidSliceIndex,
    /// A path segment is absent at its level of the tree
    #[error("Key not found")]
    KeyNotFound,
    /// Cached value for the path holds another type than the one requested
    #[error("Type mismatch")]
    TypeMismatch,
    /// A fragment does not have the requested shape
    #[error("Decode error")]
    Decode,
    /// Configuration source does not exist or is not a regular file
    #[error("File not found")]
    FileNotFound,
    /// I/O error while reading or fingerprinting a source
    #[error("I/O error")]
    Io,
    /// Reload monitor lifecycle violation
    #[error("Monitor error")]
    Monitor,
}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            path: None,
            help: None,
            cause: None,
        }
    }

    /// Create an invalid key error
    pub fn invalid_key(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            help: Some("Use dotted keys with optional indices, e.g. 'servers[0].host'".into()),
            cause: Some(reason.into()),
            ..Self::new(ErrorKind::InvalidKey)
        }
    }

    /// Create an invalid slice index error
    pub fn invalid_slice_index(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            cause: Some(reason.into()),
            ..Self::new(ErrorKind::InvalidSliceIndex)
        }
    }

    /// Create an index out of range error
    pub fn index_out_of_range(path: impl Into<String>, index: usize, len: usize) -> Self {
        Self::invalid_slice_index(
            path,
            format!("Index {} is out of range for a sequence of length {}", index, len),
        )
    }

    /// Create a key not found error
    pub fn key_not_found(path: impl Into<String>) -> Self {
        let path_str = path.into();
        Self {
            help: Some(format!(
                "Check that '{}' exists in the configuration",
                path_str
            )),
            path: Some(path_str),
            ..Self::new(ErrorKind::KeyNotFound)
        }
    }

    /// Create a type mismatch error for a cached value
    pub fn type_mismatch(
        path: impl Into<String>,
        expected: impl Into<String>,
        got: impl Into<String>,
    ) -> Self {
        Self {
            path: Some(path.into()),
            help: Some(format!(
                "The value was first read as {}; read it with the same type",
                got.into()
            )),
            cause: Some(format!("Requested: {}", expected.into())),
            ..Self::new(ErrorKind::TypeMismatch)
        }
    }

    /// Create a decode error
    pub fn decode(
        path: impl Into<String>,
        expected: impl Into<String>,
        cause: impl fmt::Display,
    ) -> Self {
        Self {
            path: Some(path.into()),
            help: Some(format!("Ensure the value is a valid {}", expected.into())),
            cause: Some(cause.to_string()),
            ..Self::new(ErrorKind::Decode)
        }
    }

    /// Create a file not found error
    pub fn file_not_found(file: &Path) -> Self {
        Self {
            path: Some(file.display().to_string()),
            help: Some("Check that the configuration file exists and is a regular file".into()),
            ..Self::new(ErrorKind::FileNotFound)
        }
    }

    /// Create an I/O error
    pub fn io(file: &Path, cause: impl fmt::Display) -> Self {
        Self {
            path: Some(file.display().to_string()),
            cause: Some(cause.to_string()),
            ..Self::new(ErrorKind::Io)
        }
    }

    /// Create a monitor lifecycle error
    pub fn monitor(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Monitor)
        }
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if let Some(path) = &self.path {
            write!(f, "\n  Path: {}", path)?;
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}
