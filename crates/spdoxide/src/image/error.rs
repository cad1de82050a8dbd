//! Error and warning types for SPD operations.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Fatal errors raised while loading, decoding or patching an SPD image.
#[derive(Error, Debug)]
pub enum SpdError {
    /// Image length does not match any known SPD size.
    #[error("Image length {len} does not match a known SPD size: {message}")]
    Format { len: usize, message: String },

    /// Memory-type or module-type code that no decoder handles.
    #[error("Unsupported {what} code {code:#04x} at byte {offset}")]
    UnsupportedGeneration {
        what: String,
        offset: usize,
        code: u8,
    },

    /// A read past the end of a byte source.
    #[error("Read of {width} byte(s) at offset {offset} exceeds image length {len}")]
    OutOfRange {
        offset: usize,
        width: usize,
        len: usize,
    },

    /// A field spec reaches beyond the image (decoder table bug).
    #[error("Field '{field}' at offset {offset} (width {width}) exceeds image length {len}")]
    OutOfRangeField {
        field: String,
        offset: usize,
        width: usize,
        len: usize,
    },

    /// Source and target images cannot be patched together.
    #[error("Patch incompatible: {0}")]
    PatchIncompatibility(String),

    /// Post-patch checksum validation failed.
    #[error("Patched image fails checksum '{slot}': stored {stored:#06x}, computed {computed:#06x}")]
    PatchCrcInconsistency {
        slot: String,
        stored: u16,
        computed: u16,
    },

    /// Invalid parameter provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Vendor table could not be loaded.
    #[error("Vendor table error: {0}")]
    Vendor(#[from] jep106::VendorError),
}

impl SpdError {
    /// Create a Format error.
    pub fn format(len: usize, msg: impl Into<String>) -> Self {
        SpdError::Format {
            len,
            message: msg.into(),
        }
    }

    /// Create an UnsupportedGeneration error.
    pub fn unsupported(what: impl Into<String>, offset: usize, code: u8) -> Self {
        SpdError::UnsupportedGeneration {
            what: what.into(),
            offset,
            code,
        }
    }

    /// Create an OutOfRange error.
    pub fn out_of_range(offset: usize, width: usize, len: usize) -> Self {
        SpdError::OutOfRange { offset, width, len }
    }

    /// Create an OutOfRangeField error.
    pub fn out_of_range_field(field: impl Into<String>, offset: usize, width: usize, len: usize) -> Self {
        SpdError::OutOfRangeField {
            field: field.into(),
            offset,
            width,
            len,
        }
    }

    /// Create a PatchIncompatibility error.
    pub fn incompatible(msg: impl Into<String>) -> Self {
        SpdError::PatchIncompatibility(msg.into())
    }
}

/// Result type for SPD operations.
pub type SpdResult<T> = Result<T, SpdError>;

/// Soft problems attached to a decoded record instead of aborting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// No coverage variant of a checksum slot matches the stored value.
    CrcMismatch {
        slot: String,
        coverage: String,
        stored: u16,
        computed: u16,
    },
    /// The stored checksum matches only a coverage range other than the declared one.
    CrcUndeclaredCoverage {
        slot: String,
        declared: String,
        matched: String,
    },
    /// Declared and derived timing values disagree.
    TimingInconsistency { message: String },
    /// A patch was written despite a failed safety check.
    PatchForced { message: String },
    /// A field carries a reserved or out-of-table code.
    UnusualEncoding { field: String, message: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::CrcMismatch {
                slot,
                coverage,
                stored,
                computed,
            } => write!(
                f,
                "checksum '{}' over {} does not match: stored {:#06x}, computed {:#06x}",
                slot, coverage, stored, computed
            ),
            Warning::CrcUndeclaredCoverage {
                slot,
                declared,
                matched,
            } => write!(
                f,
                "checksum '{}' matches coverage {} but {} is declared",
                slot, matched, declared
            ),
            Warning::TimingInconsistency { message } => write!(f, "timing: {}", message),
            Warning::PatchForced { message } => write!(f, "forced patch: {}", message),
            Warning::UnusualEncoding { field, message } => write!(f, "{}: {}", field, message),
        }
    }
}
