//! Checksum computation and multi-variant validation.

use crate::field::ByteSpan;
use crate::image::{ByteSource, Warning};
use crate::profile::Generation;
use crate::rules::crc_rules::{slots_for, ChecksumKind, ChecksumSlot, CoverageRule};
use serde::Serialize;
use tracing::debug;

/// CRC-16/XMODEM (poly 0x1021, init 0, no reflection).
pub fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// 8-bit wrapping sum.
pub fn sum8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Generic CRC-16 parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc16Params {
    pub name: &'static str,
    pub poly: u16,
    pub init: u16,
    pub refin: bool,
    pub refout: bool,
    pub xorout: u16,
}

impl Crc16Params {
    pub const XMODEM: Crc16Params = Crc16Params { name: "XMODEM", poly: 0x1021, init: 0x0000, refin: false, refout: false, xorout: 0x0000 };
    pub const ARC: Crc16Params = Crc16Params { name: "ARC", poly: 0x8005, init: 0x0000, refin: true, refout: true, xorout: 0x0000 };
    pub const MODBUS: Crc16Params = Crc16Params { name: "MODBUS", poly: 0x8005, init: 0xFFFF, refin: true, refout: true, xorout: 0x0000 };
    pub const X25: Crc16Params = Crc16Params { name: "X-25", poly: 0x1021, init: 0xFFFF, refin: true, refout: true, xorout: 0xFFFF };
    pub const KERMIT: Crc16Params = Crc16Params { name: "KERMIT", poly: 0x1021, init: 0x0000, refin: true, refout: true, xorout: 0x0000 };

    pub fn compute(&self, data: &[u8]) -> u16 {
        let mut crc = self.init;
        for &byte in data {
            let b = if self.refin { byte.reverse_bits() } else { byte };
            crc ^= (b as u16) << 8;
            for _ in 0..8 {
                if crc & 0x8000 != 0 {
                    crc = (crc << 1) ^ self.poly;
                } else {
                    crc <<= 1;
                }
            }
        }
        if self.refout {
            crc = crc.reverse_bits();
        }
        crc ^ self.xorout
    }
}

/// Parameter sets tried when no coverage variant matches.
pub static CRC16_SWEEP: &[Crc16Params] = &[
    Crc16Params::XMODEM,
    Crc16Params::ARC,
    Crc16Params::MODBUS,
    Crc16Params::X25,
    Crc16Params::KERMIT,
];

/// Outcome of checking one coverage variant of one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrcCheckResult {
    pub slot: String,
    pub variant: String,
    pub algorithm: String,
    pub coverage: ByteSpan,
    pub stored_span: ByteSpan,
    pub stored: u16,
    pub computed: u16,
    /// The image's own header selects this variant.
    pub declared: bool,
    pub passed: bool,
    /// Parameter set that reproduces the stored value when the standard one does not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep_match: Option<String>,
}

/// Checksum of `image` under one coverage rule.
pub fn compute(kind: ChecksumKind, rule: &CoverageRule, image: &[u8]) -> u16 {
    let end = (rule.end + 1).min(image.len());
    let covered = image.get(rule.start..end).unwrap_or(&[]);
    match kind {
        ChecksumKind::Crc16 => crc16_xmodem(covered),
        ChecksumKind::Sum8 => u16::from(sum8(covered)),
    }
}

/// Value stored in a slot (0 when the slot lies outside the image).
pub fn stored_value(slot: &ChecksumSlot, image: &[u8]) -> u16 {
    let lo = image.get(slot.stored_at).copied().unwrap_or(0);
    match slot.kind {
        ChecksumKind::Crc16 => {
            let hi = image.get(slot.stored_at + 1).copied().unwrap_or(0);
            u16::from_le_bytes([lo, hi])
        }
        ChecksumKind::Sum8 => u16::from(lo),
    }
}

/// Recompute a slot's declared variant and write it into `image`.
/// Returns the new value.
pub fn rewrite(slot: &ChecksumSlot, image: &mut [u8]) -> u16 {
    let rule = &slot.variants[slot.declared_index(image)];
    let value = compute(slot.kind, rule, image);
    let stored = value.to_le_bytes();
    let width = slot.kind.stored_width();
    if let Some(dst) = image.get_mut(slot.stored_at..slot.stored_at + width) {
        dst.copy_from_slice(&stored[..width]);
    }
    value
}

/// Check every coverage variant of every slot the generation defines.
pub fn validate(src: &ByteSource, generation: Generation, sweep: bool) -> Vec<CrcCheckResult> {
    validate_slots(src.as_bytes(), slots_for(generation), sweep)
}

/// Check every coverage variant of the given slots.
pub fn validate_slots<'a>(
    image: &[u8],
    slots: impl IntoIterator<Item = &'a ChecksumSlot>,
    sweep: bool,
) -> Vec<CrcCheckResult> {
    let mut results = Vec::new();
    for slot in slots {
        let stored = stored_value(slot, image);
        let declared_idx = slot.declared_index(image);
        let first = results.len();

        for (idx, rule) in slot.variants.iter().enumerate() {
            let computed = compute(slot.kind, rule, image);
            let passed = computed == stored;
            debug!(
                "Checksum {}/{}: stored={:#06x} computed={:#06x} passed={}",
                slot.name, rule.name, stored, computed, passed
            );
            results.push(CrcCheckResult {
                slot: slot.name.to_string(),
                variant: rule.name.to_string(),
                algorithm: slot.kind.name().to_string(),
                coverage: rule.span(),
                stored_span: slot.stored_span(),
                stored,
                computed,
                declared: idx == declared_idx,
                passed,
                sweep_match: None,
            });
        }

        let all_failed = results[first..].iter().all(|r| !r.passed);
        if sweep && all_failed && slot.kind == ChecksumKind::Crc16 {
            for (result, rule) in results[first..].iter_mut().zip(slot.variants) {
                let end = (rule.end + 1).min(image.len());
                let covered = image.get(rule.start..end).unwrap_or(&[]);
                result.sweep_match = CRC16_SWEEP
                    .iter()
                    .find(|p| p.compute(covered) == stored)
                    .map(|p| p.name.to_string());
                if let Some(name) = &result.sweep_match {
                    debug!("Checksum {}/{} reproduced by {}", slot.name, rule.name, name);
                }
            }
        }
    }
    results
}

/// True when at least one variant of `slot` passes.
pub fn slot_passes(results: &[CrcCheckResult], slot: &str) -> bool {
    results.iter().any(|r| r.slot == slot && r.passed)
}

/// Advisory warnings for a set of results: one per slot whose declared
/// variant fails.
pub fn warnings(results: &[CrcCheckResult]) -> Vec<Warning> {
    let mut out = Vec::new();
    let mut seen: Vec<&str> = Vec::new();
    for r in results {
        if seen.contains(&r.slot.as_str()) {
            continue;
        }
        seen.push(r.slot.as_str());

        let slot_results: Vec<&CrcCheckResult> = results.iter().filter(|x| x.slot == r.slot).collect();
        let Some(declared) = slot_results.iter().find(|x| x.declared) else {
            continue;
        };
        if declared.passed {
            continue;
        }
        match slot_results.iter().find(|x| x.passed) {
            Some(matched) => out.push(Warning::CrcUndeclaredCoverage {
                slot: r.slot.clone(),
                declared: declared.variant.clone(),
                matched: matched.variant.clone(),
            }),
            None => out.push(Warning::CrcMismatch {
                slot: r.slot.clone(),
                coverage: declared.variant.clone(),
                stored: declared.stored,
                computed: declared.computed,
            }),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    const CHECK: &[u8] = b"123456789";

    #[test]
    fn test_crc16_check_values() {
        assert_eq!(crc16_xmodem(CHECK), 0x31C3);
        assert_eq!(Crc16Params::XMODEM.compute(CHECK), 0x31C3);
        assert_eq!(Crc16Params::ARC.compute(CHECK), 0xBB3D);
        assert_eq!(Crc16Params::MODBUS.compute(CHECK), 0x4B37);
        assert_eq!(Crc16Params::X25.compute(CHECK), 0x906E);
        assert_eq!(Crc16Params::KERMIT.compute(CHECK), 0x2189);
    }

    #[test]
    fn test_sum8() {
        assert_eq!(sum8(&[0xFF, 0x02]), 0x01);
        assert_eq!(sum8(&[]), 0);
    }

    #[test]
    fn test_known_good_ddr3_passes_declared() {
        let src = ByteSource::load(fixtures::ddr3_udimm()).unwrap();
        let results = validate(&src, Generation::Ddr3, true);
        assert_eq!(results.len(), 2);
        let declared = results.iter().find(|r| r.declared).unwrap();
        assert_eq!(declared.variant, "0..=116");
        assert!(declared.passed);
        assert!(warnings(&results).is_empty());
    }

    #[test]
    fn test_corrupted_byte_fails_a_variant() {
        let mut bytes = fixtures::ddr3_udimm();
        bytes[16] ^= 0x01;
        let src = ByteSource::load(bytes).unwrap();
        let results = validate(&src, Generation::Ddr3, true);
        assert!(results.iter().any(|r| !r.passed));
        assert!(matches!(warnings(&results)[..], [Warning::CrcMismatch { .. }]));
    }

    #[test]
    fn test_undeclared_coverage_match() {
        let mut bytes = fixtures::ddr3_udimm();
        // Store the 0..=125 CRC while byte 0 still declares 0..=116.
        let crc = crc16_xmodem(&bytes[0..126]);
        bytes[126..128].copy_from_slice(&crc.to_le_bytes());
        let src = ByteSource::load(bytes).unwrap();
        let results = validate(&src, Generation::Ddr3, true);
        assert!(slot_passes(&results, "base"));
        match &warnings(&results)[..] {
            [Warning::CrcUndeclaredCoverage { declared, matched, .. }] => {
                assert_eq!(declared, "0..=116");
                assert_eq!(matched, "0..=125");
            }
            other => panic!("unexpected warnings: {:?}", other),
        }
    }

    #[test]
    fn test_sweep_identifies_other_algorithm() {
        let mut bytes = fixtures::ddr3_udimm();
        let arc = Crc16Params::ARC.compute(&bytes[0..117]);
        bytes[126..128].copy_from_slice(&arc.to_le_bytes());
        let src = ByteSource::load(bytes).unwrap();

        let results = validate(&src, Generation::Ddr3, true);
        let declared = results.iter().find(|r| r.declared).unwrap();
        assert_eq!(declared.sweep_match.as_deref(), Some("ARC"));

        let results = validate(&src, Generation::Ddr3, false);
        assert!(results.iter().all(|r| r.sweep_match.is_none()));
    }

    #[test]
    fn test_ddr4_two_slots() {
        let src = ByteSource::load(fixtures::ddr4_udimm()).unwrap();
        let results = validate(&src, Generation::Ddr4, true);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.passed));

        let mut bytes = fixtures::ddr4_udimm();
        bytes[200] ^= 0xFF;
        let src = ByteSource::load(bytes).unwrap();
        let results = validate(&src, Generation::Ddr4, true);
        assert!(slot_passes(&results, "base"));
        assert!(!slot_passes(&results, "module"));
    }

    #[test]
    fn test_ddr2_sum8() {
        let src = ByteSource::load(fixtures::ddr2_udimm()).unwrap();
        let results = validate(&src, Generation::Ddr2, true);
        assert_eq!(results.len(), 1);
        assert!(results[0].passed);
        assert_eq!(results[0].algorithm, "SUM8");
    }

    #[test]
    fn test_rewrite_restores_validity() {
        let mut bytes = fixtures::ddr3_udimm();
        bytes[20] = 0x70;
        let slot = slots_for(Generation::Ddr3).next().unwrap();
        let value = rewrite(slot, &mut bytes);
        assert_eq!(value, crc16_xmodem(&bytes[0..117]));
        assert_eq!(stored_value(slot, &bytes), value);
    }
}
