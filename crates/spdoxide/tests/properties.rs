use proptest::collection::{btree_set, vec};
use proptest::prelude::*;
use spdoxide::crc;
use spdoxide::rules::crc_rules::slots_for;
use spdoxide::{diff, ByteSource, Generation, PatchEngine, Selection, SpdDecoder};
use tracing_subscriber::EnvFilter;

/// Log to the test writer; `RUST_LOG=debug` shows checksum and patch decisions.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// DDR3-1600 UDIMM with valid checksums.
fn ddr3_image() -> Vec<u8> {
    let mut b = vec![0u8; 256];
    b[..34].copy_from_slice(&[
        0x92, 0x11, 0x0B, 0x02, 0x03, 0x19, 0x00, 0x09, 0x03, 0x11, 0x01, 0x08, 0x0A, 0x00,
        0xFE, 0x00, 0x69, 0x78, 0x69, 0x30, 0x69, 0x11, 0x18, 0x81, 0x00, 0x05, 0x3C, 0x3C,
        0x00, 0xF0, 0x83, 0x05, 0x00, 0x00,
    ]);
    b[60..64].copy_from_slice(&[0x0F, 0x11, 0x01, 0x00]);
    b[117..126].copy_from_slice(&[0x01, 0x98, 0x01, 0x12, 0x34, 0x12, 0x34, 0x56, 0x78]);
    b[128..146].copy_from_slice(b"KVR16N11/4        ");
    finalize(&mut b);
    b
}

fn finalize(bytes: &mut [u8]) {
    for slot in slots_for(Generation::Ddr3) {
        crc::rewrite(slot, bytes);
    }
}

proptest! {
    #[test]
    fn diff_of_identical_buffers_is_empty(x in vec(any::<u8>(), 0..600)) {
        let report = diff(&x, &x);
        prop_assert!(report.mismatches.is_empty());
        prop_assert!(!report.length_mismatch());
    }

    #[test]
    fn diff_counts_differing_positions(
        x in vec(any::<u8>(), 256),
        flips in btree_set(0usize..256, 0..64),
        mask in 1u8..=255,
    ) {
        let mut y = x.clone();
        for &i in &flips {
            y[i] ^= mask;
        }
        let report = diff(&x, &y);
        prop_assert_eq!(report.mismatches.len(), flips.len());
        let offsets: Vec<usize> = report.mismatches.iter().map(|m| m.offset).collect();
        let expected: Vec<usize> = flips.iter().copied().collect();
        prop_assert_eq!(offsets, expected);
    }

    #[test]
    fn diff_reports_length_mismatch(a in vec(any::<u8>(), 0..300), extra in 1usize..64) {
        let mut b = a.clone();
        b.extend(std::iter::repeat(0u8).take(extra));
        let report = diff(&a, &b);
        prop_assert!(report.length_mismatch());
        prop_assert!(report.mismatches.is_empty());
    }

    #[test]
    fn load_rejects_unknown_lengths(len in 0usize..700) {
        prop_assume!(![128, 256, 512].contains(&len));
        prop_assert!(ByteSource::load(vec![0u8; len]).is_err());
    }

    #[test]
    fn decode_is_deterministic(edits in vec((117usize..176, any::<u8>()), 0..24)) {
        init_tracing();
        let mut bytes = ddr3_image();
        for (offset, value) in edits {
            bytes[offset] = value;
        }
        let src = ByteSource::load(bytes).unwrap();
        let decoder = SpdDecoder::new();
        let first = decoder.decode(&src).unwrap();
        let second = decoder.decode(&src).unwrap();
        prop_assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn patched_output_passes_checksum(part in vec(0x20u8..0x7F, 18), mfg in any::<[u8; 2]>()) {
        init_tracing();
        let mut source = ddr3_image();
        source[128..146].copy_from_slice(&part);
        source[117..119].copy_from_slice(&mfg);
        finalize(&mut source);

        let engine = PatchEngine::new();
        let decoded = SpdDecoder::new().decode_bytes(source).unwrap();
        let target = ByteSource::load(ddr3_image()).unwrap();
        for name in ["part-number", "mfg-id"] {
            let plan = engine.plan(&decoded, &target, &Selection::Named(name.into())).unwrap();
            let mut out = Vec::new();
            let outcome = engine.apply(&plan, &mut out, false).unwrap();
            let recheck = crc::validate(&outcome.output, Generation::Ddr3, false);
            prop_assert!(recheck.iter().any(|r| r.declared && r.passed));
            prop_assert!(outcome.warnings.is_empty());
        }
    }
}
