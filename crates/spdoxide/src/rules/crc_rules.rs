//! Checksum slots and their coverage-rule variants.
//!
//! A slot is one stored checksum. Revisions of the JEDEC layouts disagree on
//! which bytes some slots cover, so every slot lists each coverage range seen
//! in the field; the validator checks all of them.

use crate::field::ByteSpan;
use crate::profile::Generation;

/// Checksum algorithm of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    /// CRC-16/XMODEM, stored little-endian in two bytes.
    Crc16,
    /// 8-bit sum of the covered bytes, stored in one byte.
    Sum8,
}

impl ChecksumKind {
    pub fn stored_width(self) -> usize {
        match self {
            ChecksumKind::Crc16 => 2,
            ChecksumKind::Sum8 => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ChecksumKind::Crc16 => "CRC-16/XMODEM",
            ChecksumKind::Sum8 => "SUM8",
        }
    }
}

/// One candidate coverage range.
pub struct CoverageRule {
    pub name: &'static str,
    pub start: usize,
    /// Inclusive.
    pub end: usize,
}

impl CoverageRule {
    pub fn span(&self) -> ByteSpan {
        ByteSpan::new(self.start, self.end)
    }
}

/// How the image declares which variant applies.
pub enum DeclaredCoverage {
    /// Always the variant at this index.
    Fixed(usize),
    /// DDR3 byte 0 bit 7: clear selects variant 0, set selects variant 1.
    Byte0Bit7,
}

/// A stored checksum location.
pub struct ChecksumSlot {
    pub generation: Generation,
    pub name: &'static str,
    pub kind: ChecksumKind,
    pub stored_at: usize,
    pub variants: &'static [CoverageRule],
    pub declared: DeclaredCoverage,
}

impl ChecksumSlot {
    /// Bytes holding the stored checksum.
    pub fn stored_span(&self) -> ByteSpan {
        ByteSpan::new(self.stored_at, self.stored_at + self.kind.stored_width() - 1)
    }

    /// Index into `variants` of the coverage the image itself declares.
    pub fn declared_index(&self, image: &[u8]) -> usize {
        let idx = match self.declared {
            DeclaredCoverage::Fixed(i) => i,
            DeclaredCoverage::Byte0Bit7 => match image.first() {
                Some(b) if b & 0x80 != 0 => 1,
                _ => 0,
            },
        };
        idx.min(self.variants.len().saturating_sub(1))
    }
}

/// Known checksum slots.
pub static CHECKSUM_SLOTS: &[ChecksumSlot] = &[
    // -- DDR2: byte 63 holds the sum of bytes 0..62 --
    ChecksumSlot {
        generation: Generation::Ddr2,
        name: "base",
        kind: ChecksumKind::Sum8,
        stored_at: 63,
        variants: &[CoverageRule { name: "0..=62", start: 0, end: 62 }],
        declared: DeclaredCoverage::Fixed(0),
    },
    // -- DDR3: bytes 126-127, coverage declared by byte 0 bit 7 --
    ChecksumSlot {
        generation: Generation::Ddr3,
        name: "base",
        kind: ChecksumKind::Crc16,
        stored_at: 126,
        variants: &[
            CoverageRule { name: "0..=125", start: 0, end: 125 },
            CoverageRule { name: "0..=116", start: 0, end: 116 },
        ],
        declared: DeclaredCoverage::Byte0Bit7,
    },
    // -- DDR4: base block and module-specific block --
    ChecksumSlot {
        generation: Generation::Ddr4,
        name: "base",
        kind: ChecksumKind::Crc16,
        stored_at: 126,
        variants: &[CoverageRule { name: "0..=125", start: 0, end: 125 }],
        declared: DeclaredCoverage::Fixed(0),
    },
    ChecksumSlot {
        generation: Generation::Ddr4,
        name: "module",
        kind: ChecksumKind::Crc16,
        stored_at: 254,
        variants: &[CoverageRule { name: "128..=253", start: 128, end: 253 }],
        declared: DeclaredCoverage::Fixed(0),
    },
];

/// Checksum slots of one generation.
pub fn slots_for(generation: Generation) -> impl Iterator<Item = &'static ChecksumSlot> {
    CHECKSUM_SLOTS.iter().filter(move |s| s.generation == generation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_fit_their_generation() {
        for slot in CHECKSUM_SLOTS {
            let len = slot.generation.image_len();
            assert!(slot.stored_span().end < len, "{}", slot.name);
            for v in slot.variants {
                assert!(v.end < len);
                assert!(!v.span().overlaps(&slot.stored_span()), "{} {}", slot.name, v.name);
            }
        }
    }

    #[test]
    fn test_ddr3_declared_index() {
        let slot = slots_for(Generation::Ddr3).next().unwrap();
        let mut image = vec![0u8; 256];
        image[0] = 0x92;
        assert_eq!(slot.declared_index(&image), 1);
        image[0] = 0x12;
        assert_eq!(slot.declared_index(&image), 0);
    }

    #[test]
    fn test_slot_counts() {
        assert_eq!(slots_for(Generation::Ddr2).count(), 1);
        assert_eq!(slots_for(Generation::Ddr3).count(), 1);
        assert_eq!(slots_for(Generation::Ddr4).count(), 2);
    }
}
