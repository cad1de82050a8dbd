//! Decode options, loadable from JSON.

use crate::image::{SpdError, SpdResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Knobs for a decode run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Decode an Intel XMP block when the signature is present (DDR3).
    pub decode_xmp: bool,
    /// Try common CRC-16 parameter sets when every coverage variant fails.
    pub crc_algorithm_sweep: bool,
    /// JEP-106 table (`.json` or `.json.xz`) merged over the built-in one.
    pub vendor_table: Option<PathBuf>,
    /// Reject unknown module-type codes instead of decoding the common block only.
    pub strict_sub_type: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            decode_xmp: true,
            crc_algorithm_sweep: true,
            vendor_table: None,
            strict_sub_type: true,
        }
    }
}

impl DecodeOptions {
    /// Parse options from JSON text. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> SpdResult<Self> {
        serde_json::from_str(json).map_err(|e| SpdError::Config(format!("{}", e)))
    }

    /// Parse options from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> SpdResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SpdError::Config(format!("reading {}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let opts = DecodeOptions::default();
        assert!(opts.decode_xmp);
        assert!(opts.crc_algorithm_sweep);
        assert!(opts.strict_sub_type);
        assert!(opts.vendor_table.is_none());
    }

    #[test]
    fn test_partial_json() {
        let opts = DecodeOptions::from_json_str(r#"{"decode_xmp": false}"#).unwrap();
        assert!(!opts.decode_xmp);
        assert!(opts.crc_algorithm_sweep);
    }

    #[test]
    fn test_bad_json() {
        let err = DecodeOptions::from_json_str("{decode_xmp: yes}").unwrap_err();
        assert!(matches!(err, SpdError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, r#"{{"strict_sub_type": false, "vendor_table": "/tmp/vendors.json"}}"#).unwrap();
        let opts = DecodeOptions::from_file(tmp.path()).unwrap();
        assert!(!opts.strict_sub_type);
        assert_eq!(opts.vendor_table, Some(PathBuf::from("/tmp/vendors.json")));
    }

    #[test]
    fn test_missing_file() {
        let err = DecodeOptions::from_file("/nonexistent/options.json").unwrap_err();
        assert!(matches!(err, SpdError::Config(_)));
    }
}
