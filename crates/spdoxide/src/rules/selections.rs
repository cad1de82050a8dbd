//! Named byte ranges a patch can copy between images.

use crate::field::ByteSpan;
use crate::profile::Generation;
use jep106::ManufacturerId;

/// Tag that opens an HP SmartMemory block.
pub const HP_TAG: [u8; 4] = *b"HPT\0";

/// JEP-106 IDs HP modules are sold under.
pub static HP_MANUFACTURERS: &[ManufacturerId] = &[
    ManufacturerId::new(0, 0x04),
    ManufacturerId::new(0, 0x54),
];

/// A named copy selection.
pub struct NamedSelection {
    pub generation: Generation,
    pub name: &'static str,
    pub start: usize,
    /// Inclusive.
    pub end: usize,
    /// Requires an HP target unless forced.
    pub hp: bool,
    pub description: &'static str,
}

impl NamedSelection {
    pub fn span(&self) -> ByteSpan {
        ByteSpan::new(self.start, self.end)
    }
}

/// Known copy selections.
pub static SELECTIONS: &[NamedSelection] = &[
    // -- DDR2 --
    NamedSelection { generation: Generation::Ddr2, name: "mfg-id", start: 64, end: 71, hp: false, description: "JEP-106 module manufacturer ID" },
    NamedSelection { generation: Generation::Ddr2, name: "part-number", start: 73, end: 90, hp: false, description: "Module part number" },
    NamedSelection { generation: Generation::Ddr2, name: "vendor", start: 99, end: 127, hp: false, description: "Manufacturer-specific data" },
    // -- DDR3 --
    NamedSelection { generation: Generation::Ddr3, name: "mfg-id", start: 117, end: 118, hp: false, description: "JEP-106 module manufacturer ID" },
    NamedSelection { generation: Generation::Ddr3, name: "part-number", start: 128, end: 145, hp: false, description: "Module part number" },
    NamedSelection { generation: Generation::Ddr3, name: "vendor", start: 176, end: 255, hp: false, description: "Customer-use area (XMP / vendor blocks)" },
    NamedSelection { generation: Generation::Ddr3, name: "hp", start: 176, end: 191, hp: true, description: "HP SmartMemory block" },
    // -- DDR4 --
    NamedSelection { generation: Generation::Ddr4, name: "mfg-id", start: 320, end: 321, hp: false, description: "JEP-106 module manufacturer ID" },
    NamedSelection { generation: Generation::Ddr4, name: "part-number", start: 329, end: 348, hp: false, description: "Module part number" },
    NamedSelection { generation: Generation::Ddr4, name: "vendor", start: 384, end: 511, hp: false, description: "End-user programmable area" },
];

/// Look up a selection by generation and name.
pub fn find_selection(generation: Generation, name: &str) -> Option<&'static NamedSelection> {
    SELECTIONS
        .iter()
        .find(|s| s.generation == generation && s.name.eq_ignore_ascii_case(name))
}

/// Offset of the HP SmartMemory tag, for generations that define one.
pub fn hp_tag_offset(generation: Generation) -> Option<usize> {
    match generation {
        Generation::Ddr3 => Some(176),
        Generation::Ddr2 | Generation::Ddr4 => None,
    }
}

/// True for an HP module manufacturer ID.
pub fn is_hp_manufacturer(id: ManufacturerId) -> bool {
    HP_MANUFACTURERS.contains(&id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_selection() {
        let hp = find_selection(Generation::Ddr3, "hp").unwrap();
        assert_eq!(hp.span().len(), 16);
        assert!(hp.hp);
        assert_eq!(find_selection(Generation::Ddr4, "Part-Number").unwrap().start, 329);
        assert!(find_selection(Generation::Ddr4, "hp").is_none());
    }

    #[test]
    fn test_hp_manufacturers() {
        assert!(is_hp_manufacturer(ManufacturerId::from_spd_pair(0x80, 0x54)));
        assert!(is_hp_manufacturer(ManufacturerId::from_spd_pair(0x80, 0x04)));
        // Kingston.
        assert!(!is_hp_manufacturer(ManufacturerId::from_spd_pair(0x01, 0x98)));
    }

    #[test]
    fn test_selections_fit_their_generation() {
        for s in SELECTIONS {
            assert!(s.start <= s.end);
            assert!(s.end < s.generation.image_len(), "{} {}", s.generation, s.name);
        }
    }
}
