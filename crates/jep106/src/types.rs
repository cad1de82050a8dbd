//! Manufacturer ID and vendor table types.

use crate::builtin::BUILTIN_VENDORS;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Continuation code used by the DDR2-era multi-byte ID layout.
const CONTINUATION: u8 = 0x7F;

/// A JEP-106 manufacturer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManufacturerId {
    /// Number of continuation codes preceding the code (0-based bank).
    pub bank: u8,
    /// The manufacturer code byte, parity bit included.
    pub code: u8,
}

impl ManufacturerId {
    pub const fn new(bank: u8, code: u8) -> Self {
        ManufacturerId { bank, code }
    }

    /// Decode the DDR3/DDR4 layout: LSB holds the continuation count in
    /// bits 6:0 (bit 7 is odd parity), MSB holds the code.
    pub fn from_spd_pair(lsb: u8, msb: u8) -> Self {
        ManufacturerId {
            bank: lsb & 0x7F,
            code: msb,
        }
    }

    /// Decode the DDR2 layout: a run of `0x7F` continuation bytes followed by
    /// the code. Returns `None` when no code byte is present.
    pub fn from_continuation_bytes(bytes: &[u8]) -> Option<Self> {
        let bank = bytes.iter().take_while(|&&b| b == CONTINUATION).count();
        let code = *bytes.get(bank)?;
        if code == 0x00 || code == 0xFF {
            return None;
        }
        Some(ManufacturerId {
            bank: u8::try_from(bank).ok()?,
            code,
        })
    }

    /// True for the erased / never-programmed patterns.
    pub fn is_blank(&self) -> bool {
        (self.bank == 0 && self.code == 0) || (self.bank == 0x7F && self.code == 0xFF)
    }
}

impl fmt::Display for ManufacturerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bank {}, Code 0x{:02X}", self.bank, self.code)
    }
}

/// One entry of an on-disk vendor table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorEntry {
    pub bank: u8,
    pub code: u8,
    pub name: String,
}

/// Top-level on-disk vendor table structure.
#[derive(Debug, Deserialize)]
pub struct VendorFile {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub vendors: Vec<VendorEntry>,
}

/// Read-only lookup from manufacturer ID to name.
#[derive(Debug, Clone, Default)]
pub struct VendorTable {
    names: HashMap<ManufacturerId, String>,
}

impl VendorTable {
    /// An empty table (every lookup misses).
    pub fn empty() -> Self {
        VendorTable::default()
    }

    /// The built-in table.
    pub fn builtin() -> Self {
        let names = BUILTIN_VENDORS
            .iter()
            .map(|v| (ManufacturerId::new(v.bank, v.code), v.name.to_string()))
            .collect();
        VendorTable { names }
    }

    /// Add or replace one entry.
    pub fn insert(&mut self, id: ManufacturerId, name: impl Into<String>) {
        self.names.insert(id, name.into());
    }

    /// Merge entries on top of this table; later entries win.
    pub fn extend<I: IntoIterator<Item = VendorEntry>>(&mut self, entries: I) {
        for e in entries {
            self.names.insert(ManufacturerId::new(e.bank, e.code), e.name);
        }
    }

    /// Merge another table on top of this one; its entries win.
    pub fn merge(&mut self, other: VendorTable) {
        self.names.extend(other.names);
    }

    /// Look up a manufacturer name.
    pub fn lookup(&self, id: ManufacturerId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Human-readable label, e.g. `Micron Technology (Bank 0, Code 0x2C)`.
    pub fn describe(&self, id: ManufacturerId) -> String {
        match self.lookup(id) {
            Some(name) => format!("{} ({})", name, id),
            None => format!("Unknown ({})", id),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_spd_pair_strips_parity() {
        let id = ManufacturerId::from_spd_pair(0x80, 0xCE);
        assert_eq!(id, ManufacturerId::new(0, 0xCE));
        let id = ManufacturerId::from_spd_pair(0x01, 0x98);
        assert_eq!(id.bank, 1);
    }

    #[test]
    fn test_from_continuation_bytes() {
        let id = ManufacturerId::from_continuation_bytes(&[0x7F, 0x7F, 0x7F, 0x1B, 0, 0, 0, 0]);
        assert_eq!(id, Some(ManufacturerId::new(3, 0x1B)));

        let id = ManufacturerId::from_continuation_bytes(&[0xCE, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(id, Some(ManufacturerId::new(0, 0xCE)));

        assert_eq!(ManufacturerId::from_continuation_bytes(&[0x7F; 8]), None);
        assert_eq!(ManufacturerId::from_continuation_bytes(&[0; 8]), None);
    }

    #[test]
    fn test_describe() {
        let table = VendorTable::builtin();
        assert_eq!(
            table.describe(ManufacturerId::new(1, 0x98)),
            "Kingston (Bank 1, Code 0x98)"
        );
        assert_eq!(
            table.describe(ManufacturerId::new(9, 0x42)),
            "Unknown (Bank 9, Code 0x42)"
        );
    }

    #[test]
    fn test_extend_overrides() {
        let mut table = VendorTable::builtin();
        let before = table.len();
        table.extend(vec![
            VendorEntry { bank: 0, code: 0x2C, name: "Micron".into() },
            VendorEntry { bank: 9, code: 0x42, name: "Acme".into() },
        ]);
        assert_eq!(table.len(), before + 1);
        assert_eq!(table.lookup(ManufacturerId::new(0, 0x2C)), Some("Micron"));
        assert_eq!(table.lookup(ManufacturerId::new(9, 0x42)), Some("Acme"));
    }

    #[test]
    fn test_merge_tables() {
        let mut table = VendorTable::builtin();
        let mut extra = VendorTable::empty();
        extra.insert(ManufacturerId::new(1, 0x98), "Kingston Technology");
        table.merge(extra);
        assert_eq!(
            table.lookup(ManufacturerId::new(1, 0x98)),
            Some("Kingston Technology")
        );
    }

    #[test]
    fn test_blank_ids() {
        assert!(ManufacturerId::new(0, 0).is_blank());
        assert!(ManufacturerId::from_spd_pair(0xFF, 0xFF).is_blank());
        assert!(!ManufacturerId::new(0, 0x2C).is_blank());
    }
}
