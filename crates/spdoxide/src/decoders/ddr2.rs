//! DDR2 SDRAM decoder (JEDEC 21-C Annex J, 128-byte image).

use super::common::{bcd_year, push_timing};
use super::{DecodeContext, GenerationDecoder};
use crate::codec;
use crate::field::{ByteSpan, Category, DecodeRule, FieldSpec, FieldValue};
use crate::image::{SpdResult, Warning};
use crate::profile::{Generation, SubType};
use crate::record::{ModuleRecord, RecordBuilder};
use crate::timing::{self, TimingInput, TimingParam};
use jep106::ManufacturerId;

use Category::*;
use DecodeRule::*;

/// Byte 40 fractional-ns codes for tRC and tRFC, in picoseconds.
const FRACTIONS_PS: [i64; 6] = [0, 250, 333, 500, 667, 750];

/// Rank density bitmap (byte 31), bit n → bytes per rank.
const RANK_DENSITY: [u64; 8] = [1 << 30, 2 << 30, 4 << 30, 8 << 30, 16 << 30, 128 << 20, 256 << 20, 512 << 20];

static DIMM_TYPES: &[(u64, &str)] = &[
    (0x01, "RDIMM"),
    (0x02, "UDIMM"),
    (0x04, "SO-DIMM"),
    (0x06, "72b-SO-CDIMM"),
    (0x07, "72b-SO-RDIMM"),
    (0x08, "Micro-DIMM"),
    (0x10, "Mini-RDIMM"),
    (0x20, "Mini-UDIMM"),
];

fn spd_total_size(raw: u64) -> Option<FieldValue> {
    (1..=15).contains(&raw).then(|| FieldValue::Integer(1i64 << raw))
}

fn burst_lengths(raw: u64) -> Option<FieldValue> {
    let mut lengths = Vec::new();
    if raw & 0x04 != 0 {
        lengths.push(4);
    }
    if raw & 0x08 != 0 {
        lengths.push(8);
    }
    Some(FieldValue::List(lengths))
}

fn cas_latencies(raw: u64) -> Option<FieldValue> {
    Some(FieldValue::List(codec::cas_bitmap(&[raw as u8 & 0x7C], 0)))
}

fn rank_density(raw: u64) -> Option<FieldValue> {
    let bytes = rank_density_bytes(raw as u8);
    (bytes > 0).then(|| FieldValue::Text(codec::format_size(bytes)))
}

fn rank_density_bytes(bitmap: u8) -> u64 {
    RANK_DENSITY
        .iter()
        .enumerate()
        .filter(|(i, _)| bitmap & (1u8 << *i) != 0)
        .map(|(_, &v)| v)
        .sum()
}

/// Common block, bytes 0..=62.
pub static BASE_FIELDS: &[FieldSpec] = &[
    FieldSpec::byte("SPD Bytes Used", Identity, 0, Integer),
    FieldSpec::byte("SPD Total Size", Identity, 1, Custom(spd_total_size)).with_unit("bytes"),
    FieldSpec::byte("Memory Type", Identity, 2, Enumerated(&[(0x08, "DDR2 SDRAM")])),
    FieldSpec::bits("Row Address Bits", Organization, 3, 0, 5, Integer),
    FieldSpec::bits("Column Address Bits", Organization, 4, 0, 4, Integer),
    FieldSpec::bits("Ranks", Organization, 5, 0, 3, Offset(1)),
    FieldSpec::bits("Card on Card", Organization, 5, 3, 1, Flag),
    FieldSpec::bits("Stacked Package", Organization, 5, 4, 1, Flag),
    FieldSpec::bits(
        "Module Height",
        ModuleSpecific,
        5,
        5,
        3,
        Enumerated(&[
            (0, "< 25.4 mm"),
            (1, "25.4 mm"),
            (2, "25.4 - 30.0 mm"),
            (3, "30.0 mm"),
            (4, "30.5 mm"),
            (5, "> 30.5 mm"),
        ]),
    ),
    FieldSpec::byte("Data Width", Organization, 6, Integer).with_unit("bits"),
    FieldSpec::byte(
        "Voltage Interface",
        Voltage,
        8,
        Enumerated(&[
            (0, "TTL/5 V"),
            (1, "LVTTL"),
            (2, "HSTL 1.5 V"),
            (3, "SSTL 3.3 V"),
            (4, "SSTL 2.5 V"),
            (5, "SSTL 1.8 V"),
        ]),
    ),
    FieldSpec::bits("Data Parity", Features, 11, 0, 1, Flag),
    FieldSpec::bits("Data ECC", Features, 11, 1, 1, Flag),
    FieldSpec::bits("Address/Command Parity", Features, 11, 2, 1, Flag),
    FieldSpec::bits(
        "Refresh Rate",
        Features,
        12,
        0,
        7,
        Enumerated(&[
            (0, "15.625 us"),
            (1, "3.9 us"),
            (2, "7.8 us"),
            (3, "31.3 us"),
            (4, "62.5 us"),
            (5, "125 us"),
        ]),
    ),
    FieldSpec::bits("Self Refresh", Features, 12, 7, 1, Flag),
    FieldSpec::byte("Device Width", Organization, 13, Integer).with_unit("bits"),
    FieldSpec::byte("ECC Device Width", Organization, 14, Integer).with_unit("bits"),
    FieldSpec::byte("Burst Lengths", Features, 16, Custom(burst_lengths)),
    FieldSpec::byte("Banks", Organization, 17, Integer),
    FieldSpec::byte("CAS Latencies", Timings, 18, Custom(cas_latencies)),
    FieldSpec::byte("DIMM Type", Identity, 20, Enumerated(DIMM_TYPES)),
    FieldSpec::bits("Weak Driver", Features, 22, 0, 1, Flag),
    FieldSpec::bits("50 Ohm ODT", Features, 22, 1, 1, Flag),
    FieldSpec::bits("Partial Array Self Refresh", Features, 22, 2, 1, Flag),
    FieldSpec::byte("Rank Density", Capacity, 31, Custom(rank_density)),
    FieldSpec::byte("SPD Revision", Identity, 62, Revision),
];

/// Registered module attributes, byte 21.
pub static REGISTERED_FIELDS: &[FieldSpec] = &[
    FieldSpec::byte("Module Attributes", ModuleSpecific, 21, Hex),
    FieldSpec::bits("FET Switch External", ModuleSpecific, 21, 4, 1, Flag),
    FieldSpec::bits("Analysis Probe", ModuleSpecific, 21, 6, 1, Flag),
];

/// Module-supplier block, bytes 64..=98.
pub static MANUFACTURING_FIELDS: &[FieldSpec] = &[
    FieldSpec::bytes("Module Manufacturer", Manufacturer, 64, 8, JedecIdRun),
    FieldSpec::byte("Manufacturing Location", Manufacturer, 72, Integer),
    FieldSpec::bytes("Module Part Number", Manufacturer, 73, 18, Ascii),
    FieldSpec::bytes("Module Revision", Manufacturer, 91, 2, Hex),
    FieldSpec::byte("Manufacturing Year", Manufacturer, 93, Custom(bcd_year)),
    FieldSpec::byte("Manufacturing Week", Manufacturer, 94, Bcd),
    FieldSpec::bytes("Serial Number", Manufacturer, 95, 4, Hex),
];

/// DDR2 decoder.
pub struct Ddr2Decoder;

impl GenerationDecoder for Ddr2Decoder {
    fn generation(&self) -> Generation {
        Generation::Ddr2
    }

    fn field_specs(&self, sub_type: SubType) -> Vec<&'static [FieldSpec]> {
        let mut tables = vec![BASE_FIELDS];
        if sub_type.is_registered() {
            tables.push(REGISTERED_FIELDS);
        }
        tables.push(MANUFACTURING_FIELDS);
        tables
    }

    fn decode(&self, ctx: &DecodeContext<'_>) -> SpdResult<ModuleRecord> {
        let src = ctx.source;
        let mut b = RecordBuilder::new(src, ctx.vendors);

        for table in self.field_specs(ctx.classification.sub_type) {
            b.apply_all(table)?;
        }
        decode_capacity(&mut b)?;
        decode_timings(&mut b)?;

        if let Some(id) = ManufacturerId::from_continuation_bytes(src.read(64, 8)?) {
            b.set_module_manufacturer(id);
        }
        Ok(b.finish(&ctx.classification))
    }
}

/// `ns.tenths` clock byte (bytes 9, 23, 25). Low nibbles A..D are quarter/third steps.
fn clock_ps(byte: u8) -> Option<i64> {
    let frac = match byte & 0x0F {
        n @ 0..=9 => i64::from(n) * 100,
        0xA => 250,
        0xB => 333,
        0xC => 667,
        0xD => 750,
        _ => return None,
    };
    Some(i64::from(byte >> 4) * 1000 + frac)
}

/// Quarter-nanosecond byte: bits 7:2 ns, bits 1:0 quarters.
fn quarter_ps(byte: u8) -> i64 {
    i64::from(byte >> 2) * 1000 + i64::from(byte & 0x03) * 250
}

/// Rank density times ranks, cross-checked against the addressing bytes.
fn decode_capacity(b: &mut RecordBuilder<'_>) -> SpdResult<()> {
    let src = b.source();
    let ranks = u64::from(src.byte(5)? & 0x07) + 1;
    let per_rank = rank_density_bytes(src.byte(31)?);
    if per_rank == 0 {
        b.warn(Warning::UnusualEncoding {
            field: "Rank Density".into(),
            message: "no density bit set".into(),
        });
        return Ok(());
    }

    let bytes = per_rank * ranks;
    b.set_capacity(bytes);
    b.derived(
        "Module Capacity",
        Category::Capacity,
        vec![ByteSpan::single(5), ByteSpan::single(31)],
        FieldValue::Text(codec::format_size(bytes)),
        None,
    )?;

    let rows = u32::from(src.byte(3)? & 0x1F);
    let cols = u32::from(src.byte(4)? & 0x0F);
    let banks = u64::from(src.byte(17)?);
    let device_width = u64::from(src.byte(13)?);
    let data_width = match u64::from(src.byte(6)?) {
        72 => 64,
        w => w,
    };
    if device_width > 0 && rows + cols < 40 {
        let die_bits = (1u64 << (rows + cols)) * banks * device_width;
        let addressed = die_bits / 8 * (data_width / device_width);
        if addressed != per_rank {
            b.warn(Warning::UnusualEncoding {
                field: "Rank Density".into(),
                message: format!(
                    "addressing implies {} per rank, density bitmap says {}",
                    codec::format_size(addressed),
                    codec::format_size(per_rank)
                ),
            });
        }
    }
    Ok(())
}

fn decode_timings(b: &mut RecordBuilder<'_>) -> SpdResult<()> {
    let src = b.source();
    let byte = |i: usize| src.byte(i);
    let s = ByteSpan::single;

    let tck = match clock_ps(byte(9)?) {
        Some(ps) => ps,
        None => {
            b.warn(Warning::UnusualEncoding {
                field: "tCKmin".into(),
                message: format!("reserved fraction nibble in {:#04x}", byte(9)?),
            });
            i64::from(byte(9)? >> 4) * 1000
        }
    };
    b.derived("tCKmin", Timings, vec![s(9)], FieldValue::Float(codec::ps_to_ns(tck)), Some("ns"))?;

    let b10 = byte(10)?;
    let tac = i64::from(b10 >> 4) * 100 + i64::from(b10 & 0x0F) * 10;
    b.derived("tAC", Timings, vec![s(10)], FieldValue::Float(codec::ps_to_ns(tac)), Some("ns"))?;

    let cas = codec::cas_bitmap(&[byte(18)? & 0x7C], 0);
    let cl_max = cas.last().copied().unwrap_or(0);

    // Reduced-CL clock periods for CL X-1 and X-2.
    for (offset, step) in [(23usize, 1u32), (25, 2)] {
        let raw = byte(offset)?;
        if raw == 0 || cl_max <= step {
            continue;
        }
        if let Some(ps) = clock_ps(raw) {
            b.derived(
                &format!("tCK at CL{}", cl_max - step),
                Timings,
                vec![s(offset)],
                FieldValue::Float(codec::ps_to_ns(ps)),
                Some("ns"),
            )?;
        }
    }

    let b40 = byte(40)?;
    let mut fraction = |code: u8, field: &str| match FRACTIONS_PS.get(usize::from(code)) {
        Some(&ps) => ps,
        None => {
            b.warn(Warning::UnusualEncoding {
                field: field.to_string(),
                message: format!("reserved fraction code {} in byte 40", code),
            });
            0
        }
    };
    let trc_frac = fraction((b40 >> 4) & 0x07, "tRC");
    let trfc_frac = fraction((b40 >> 1) & 0x07, "tRFC");
    let trfc_ext = if b40 & 0x01 != 0 { 256_000 } else { 0 };

    let mut params = Vec::new();
    // DDR2 stores no tAAmin; it is CL x tCK at the highest CAS latency.
    let taa = i64::from(cl_max) * tck;
    b.derived("tAA (CL x tCK)", Timings, vec![s(18), s(9)], FieldValue::Float(codec::ps_to_ns(taa)), Some("ns"))?;
    params.push(TimingParam::new("tAA", taa, vec![s(18), s(9)]));
    push_timing(b, &mut params, "tRCD", quarter_ps(byte(29)?), vec![s(29)])?;
    push_timing(b, &mut params, "tRP", quarter_ps(byte(27)?), vec![s(27)])?;
    push_timing(b, &mut params, "tRAS", i64::from(byte(30)?) * 1000, vec![s(30)])?;
    push_timing(b, &mut params, "tRC", i64::from(byte(41)?) * 1000 + trc_frac, vec![s(41), s(40)])?;
    push_timing(b, &mut params, "tRFC", i64::from(byte(42)?) * 1000 + trfc_ext + trfc_frac, vec![s(42), s(40)])?;
    push_timing(b, &mut params, "tRRD", quarter_ps(byte(28)?), vec![s(28)])?;
    push_timing(b, &mut params, "tWR", quarter_ps(byte(36)?), vec![s(36)])?;
    push_timing(b, &mut params, "tWTR", quarter_ps(byte(37)?), vec![s(37)])?;
    push_timing(b, &mut params, "tRTP", quarter_ps(byte(38)?), vec![s(38)])?;

    let (report, warnings) = timing::analyze(&TimingInput {
        generation: Generation::Ddr2,
        tck_ps: tck,
        cas_latencies: cas,
        check_cas: false,
        params: &params,
        low_voltage: false,
    });
    b.extend_warnings(warnings);

    b.derived("Data Rate", Timings, vec![s(9)], FieldValue::Integer(i64::from(report.data_rate)), Some("MT/s"))?;
    b.derived("Module Name", Identity, vec![s(9)], FieldValue::Text(report.module_name.clone()), None)?;
    b.derived(
        "Primary Timings",
        Timings,
        vec![s(9), s(18), s(27), s(29), s(30)],
        FieldValue::Text(report.primary.to_string()),
        Some("clocks"),
    )?;
    b.set_timings(report);
    Ok(())
}
