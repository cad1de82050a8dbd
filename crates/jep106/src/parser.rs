//! Vendor table parser for plain JSON and .json.xz compressed files.

use crate::error::{VendorError, VendorResult};
use crate::types::{VendorFile, VendorTable};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;
use xz2::read::XzDecoder;

/// Highest bank number representable in the 7-bit continuation count.
const MAX_BANK: u8 = 0x7F;

/// Parse a vendor table file from a filesystem path.
///
/// Files ending in `.xz` are LZMA-decompressed before parsing; anything else
/// is read as plain JSON.
///
/// The returned table contains only the file's entries; merge it onto
/// [`VendorTable::builtin`] with [`VendorTable::merge`] if needed.
pub fn parse_vendor_file(path: impl AsRef<Path>) -> VendorResult<VendorTable> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(VendorError::FileNotFound(path.display().to_string()));
    }

    let file = File::open(path)
        .map_err(|e| VendorError::Io(format!("opening {}: {}", path.display(), e)))?;
    let reader = BufReader::new(file);

    let mut buf = Vec::new();
    if path.to_string_lossy().to_lowercase().ends_with(".xz") {
        XzDecoder::new(reader)
            .read_to_end(&mut buf)
            .map_err(|e| VendorError::Decompression(format!("{}: {}", path.display(), e)))?;
    } else {
        let mut reader = reader;
        reader
            .read_to_end(&mut buf)
            .map_err(|e| VendorError::Io(format!("reading {}: {}", path.display(), e)))?;
    }

    let table = parse_vendor_bytes(&buf)?;
    debug!("Loaded vendor table {} ({} entries)", path.display(), table.len());
    Ok(table)
}

/// Parse a vendor table from raw JSON bytes (already decompressed).
pub fn parse_vendor_bytes(json_bytes: &[u8]) -> VendorResult<VendorTable> {
    let file: VendorFile = serde_json::from_slice(json_bytes)
        .map_err(|e| VendorError::JsonParse(format!("{}", e)))?;

    convert_to_table(file)
}

/// Parse a vendor table from a JSON string.
pub fn parse_vendor_str(json_str: &str) -> VendorResult<VendorTable> {
    let file: VendorFile =
        serde_json::from_str(json_str).map_err(|e| VendorError::JsonParse(format!("{}", e)))?;

    convert_to_table(file)
}

fn convert_to_table(file: VendorFile) -> VendorResult<VendorTable> {
    if let Some(bad) = file.vendors.iter().find(|v| v.bank > MAX_BANK) {
        return Err(VendorError::InvalidBank {
            name: bad.name.clone(),
            bank: bad.bank,
        });
    }

    let mut table = VendorTable::empty();
    table.extend(file.vendors);
    Ok(table)
}
