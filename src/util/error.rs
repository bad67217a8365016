//! Error types for the SigMF library.

use std::path::PathBuf;
use thiserror::Error;

/// Broad class of an [`Error`].
///
/// Every error maps onto exactly one kind so callers can decide what to do
/// without matching on individual variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller supplied an unusable combination of inputs.
    Configuration,
    /// Missing file, missing dataset, bad container, or any I/O failure.
    File,
    /// Metadata, checksum or collection consistency check failed.
    Validation,
    /// Capture or sample index outside the recording.
    Bounds,
}

/// Main error type for SigMF operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Writer or reader was set up with an unusable target
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Generic file-level failure (missing name, missing dataset, bad container)
    #[error("File error: {0}")]
    File(String),

    /// Path carries an extension other than the one required
    #[error("Extension mismatch for {path}: expected {expected}, got {actual}")]
    ExtensionMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// Metadata rejected by the validator
    #[error("Validation failed for '{name}': {reason}")]
    Validation { name: String, reason: String },

    /// Dataset bytes do not hash to the value stored in the metadata
    #[error("Checksum mismatch for '{name}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// Collection does not describe the given recordings
    #[error("Collection mismatch: {0}")]
    CollectionMismatch(String),

    /// Datatype string could not be parsed
    #[error("Invalid datatype: {0}")]
    InvalidDatatype(String),

    /// Byte buffer could not be shaped into samples
    #[error("Sample decode failed: {0}")]
    Decode(String),

    /// Metadata text is not well formed
    #[error("Malformed metadata: {0}")]
    Json(#[from] serde_json::Error),

    /// Capture index out of bounds
    #[error("Capture index {index} out of bounds (count: {count})")]
    CaptureOutOfBounds { index: usize, count: usize },

    /// Sample range out of bounds
    #[error("Samples {start}..{end} out of bounds (count: {count})")]
    SampleOutOfBounds { start: u64, end: u64, count: u64 },

    /// Byte range outside the backing source
    #[error("Unexpected end of data at position {0}")]
    UnexpectedEof(u64),

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// Create a configuration error from a string.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a file error from a string.
    pub fn file(msg: impl Into<String>) -> Self {
        Self::File(msg.into())
    }

    /// Create a validation error for the named recording.
    pub fn validation(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Taxonomy class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::FileNotFound(_)
            | Self::File(_)
            | Self::ExtensionMismatch { .. }
            | Self::UnexpectedEof(_)
            | Self::MmapFailed(_)
            | Self::Io(_)
            | Self::Utf8(_) => ErrorKind::File,
            Self::Validation { .. }
            | Self::ChecksumMismatch { .. }
            | Self::CollectionMismatch(_)
            | Self::InvalidDatatype(_)
            | Self::Decode(_)
            | Self::Json(_) => ErrorKind::Validation,
            Self::CaptureOutOfBounds { .. } | Self::SampleOutOfBounds { .. } => ErrorKind::Bounds,
        }
    }

    /// True for configuration errors.
    #[inline]
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    /// True for file-class errors, I/O included.
    #[inline]
    pub fn is_file(&self) -> bool {
        self.kind() == ErrorKind::File
    }

    /// True for validation-class errors.
    #[inline]
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

/// Result type alias for SigMF operations.
pub type Result<T> = std::result::Result<T, Error>;
