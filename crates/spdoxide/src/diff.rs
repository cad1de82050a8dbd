//! Byte-level and field-level comparison of two images.

use crate::record::ModuleRecord;
use serde::Serialize;
use std::fmt;

/// One differing byte position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ByteMismatch {
    pub offset: usize,
    pub a: u8,
    pub b: u8,
}

impl fmt::Display for ByteMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#05x}: {:02X} != {:02X}", self.offset, self.a, self.b)
    }
}

/// Result of comparing two buffers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffReport {
    pub len_a: usize,
    pub len_b: usize,
    /// Differences over the common prefix, in offset order.
    pub mismatches: Vec<ByteMismatch>,
}

impl DiffReport {
    /// Buffers of different lengths. Reported separately from byte mismatches.
    pub fn length_mismatch(&self) -> bool {
        self.len_a != self.len_b
    }

    pub fn is_identical(&self) -> bool {
        !self.length_mismatch() && self.mismatches.is_empty()
    }
}

/// Compare two buffers byte by byte. Bytes past the shorter buffer are not
/// mismatches; the length difference is reported on its own.
pub fn diff(a: impl AsRef<[u8]>, b: impl AsRef<[u8]>) -> DiffReport {
    let (a, b) = (a.as_ref(), b.as_ref());
    let mismatches = a
        .iter()
        .zip(b)
        .enumerate()
        .filter(|(_, (x, y))| x != y)
        .map(|(offset, (&a, &b))| ByteMismatch { offset, a, b })
        .collect();
    DiffReport {
        len_a: a.len(),
        len_b: b.len(),
        mismatches,
    }
}

/// A mismatch with the fields each side decodes at that offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotatedMismatch {
    #[serde(flatten)]
    pub mismatch: ByteMismatch,
    pub fields_a: Vec<String>,
    pub fields_b: Vec<String>,
}

/// Map each mismatch to the field names covering it in both records.
pub fn annotate(report: &DiffReport, a: &ModuleRecord, b: &ModuleRecord) -> Vec<AnnotatedMismatch> {
    let names = |record: &ModuleRecord, offset: usize| -> Vec<String> {
        record
            .fields_at(offset)
            .into_iter()
            .map(|f| f.name.clone())
            .collect()
    };
    report
        .mismatches
        .iter()
        .map(|m| AnnotatedMismatch {
            mismatch: *m,
            fields_a: names(a, m.offset),
            fields_b: names(b, m.offset),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::SpdDecoder;
    use crate::fixtures;

    #[test]
    fn test_identical() {
        let report = diff(fixtures::ddr3_udimm(), fixtures::ddr3_udimm());
        assert!(report.is_identical());
        assert!(report.mismatches.is_empty());
    }

    #[test]
    fn test_mismatches_in_order() {
        let a = [1u8, 2, 3, 4];
        let b = [1u8, 9, 3, 8];
        let report = diff(a, b);
        assert_eq!(
            report.mismatches,
            vec![
                ByteMismatch { offset: 1, a: 2, b: 9 },
                ByteMismatch { offset: 3, a: 4, b: 8 },
            ]
        );
        assert_eq!(report.mismatches[0].to_string(), "0x001: 02 != 09");
    }

    #[test]
    fn test_length_mismatch_is_not_a_crash() {
        let report = diff(fixtures::ddr2_udimm(), fixtures::ddr3_udimm());
        assert!(report.length_mismatch());
        assert_eq!((report.len_a, report.len_b), (128, 256));
        assert!(!report.is_identical());

        let short = diff([0xAAu8; 4], [0xAAu8; 8]);
        assert!(short.mismatches.is_empty());
        assert!(short.length_mismatch());
    }

    #[test]
    fn test_annotate_with_fields() {
        let decoder = SpdDecoder::new();
        let a = decoder.decode_bytes(fixtures::ddr3_udimm()).unwrap();
        let b = decoder.decode_bytes(fixtures::ddr3_hp()).unwrap();
        let report = diff(&a.source, &b.source);
        let annotated = annotate(&report, &a.record, &b.record);

        let at_118 = annotated.iter().find(|m| m.mismatch.offset == 118).unwrap();
        assert!(at_118.fields_a.iter().any(|n| n == "Module Manufacturer"));
        assert!(at_118.fields_b.iter().any(|n| n == "Module Manufacturer"));

        let at_180 = annotated.iter().find(|m| m.mismatch.offset == 180).unwrap();
        assert!(at_180.fields_b.iter().any(|n| n.starts_with("HP SmartMemory")));
    }
}
