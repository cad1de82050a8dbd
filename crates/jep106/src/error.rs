//! Error types for the JEP-106 crate.

use thiserror::Error;

/// Vendor table loading errors.
#[derive(Debug, Error)]
pub enum VendorError {
    #[error("vendor table not found: {0}")]
    FileNotFound(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("XZ/LZMA decompression error: {0}")]
    Decompression(String),

    #[error("JSON parse error: {0}")]
    JsonParse(String),

    #[error("invalid vendor entry '{name}': bank {bank} is out of range (max 127)")]
    InvalidBank { name: String, bank: u8 },
}

pub type VendorResult<T> = Result<T, VendorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_bank_message() {
        let err = VendorError::InvalidBank {
            name: "Acme".into(),
            bank: 42,
        };
        let msg = err.to_string();
        assert!(msg.contains("Acme"));
        assert!(msg.contains("42"));
    }
}
