//! DDR3 SDRAM decoder (JEDEC 21-C Annex K, 256-byte image).

use super::common::{self, bcd_year, inverted_flag, module_height, module_thickness, push_timing};
use super::{DecodeContext, GenerationDecoder};
use crate::codec::{self, Timebase};
use crate::field::{ByteSpan, Category, DecodeRule, FieldSpec, FieldValue};
use crate::image::{SpdResult, Warning};
use crate::profile::{Generation, SubType};
use crate::record::{ModuleRecord, RecordBuilder};
use crate::rules::selections::hp_tag_offset;
use crate::timing::{self, TimingInput};
use crate::xmp;
use jep106::ManufacturerId;
use tracing::debug;

use Category::*;
use DecodeRule::*;

static MODULE_TYPES: &[(u64, &str)] = &[
    (0x1, "RDIMM"),
    (0x2, "UDIMM"),
    (0x3, "SO-DIMM"),
    (0x4, "Micro-DIMM"),
    (0x5, "Mini-RDIMM"),
    (0x6, "Mini-UDIMM"),
    (0x8, "72b-SO-UDIMM"),
    (0x9, "72b-SO-RDIMM"),
    (0xB, "LRDIMM"),
];

fn cas_latencies(raw: u64) -> Option<FieldValue> {
    let bytes = (raw as u16).to_le_bytes();
    Some(FieldValue::List(codec::cas_bitmap(&[bytes[0], bytes[1] & 0x7F], 4)))
}

/// Common block, bytes 0..=59.
pub static BASE_FIELDS: &[FieldSpec] = &[
    FieldSpec::bits("SPD Bytes Used", Identity, 0, 0, 4, Enumerated(&[(1, "128"), (2, "176"), (3, "256")])),
    FieldSpec::bits("SPD Bytes Total", Identity, 0, 4, 3, Enumerated(&[(1, "256")])),
    FieldSpec::bits("CRC Coverage", Checksum, 0, 7, 1, Enumerated(&[(0, "0..=125"), (1, "0..=116")])),
    FieldSpec::byte("SPD Revision", Identity, 1, Revision),
    FieldSpec::byte("Memory Type", Identity, 2, Enumerated(&[(0x0B, "DDR3 SDRAM")])),
    FieldSpec::bits("Module Type", Identity, 3, 0, 4, Enumerated(MODULE_TYPES)),
    FieldSpec::bits("SDRAM Density", Capacity, 4, 0, 4, Table(&[256, 512, 1024, 2048, 4096, 8192, 16384]))
        .with_unit("Mb"),
    FieldSpec::bits("Banks", Organization, 4, 4, 3, Table(&[8, 16, 32, 64])),
    FieldSpec::bits("Column Address Bits", Organization, 5, 0, 3, Offset(9)),
    FieldSpec::bits("Row Address Bits", Organization, 5, 3, 3, Offset(12)),
    FieldSpec::bits("1.5 V Operable", Voltage, 6, 0, 1, Custom(inverted_flag)),
    FieldSpec::bits("1.35 V Operable", Voltage, 6, 1, 1, Flag),
    FieldSpec::bits("1.25 V Operable", Voltage, 6, 2, 1, Flag),
    FieldSpec::bits("Device Width", Organization, 7, 0, 3, Table(&[4, 8, 16, 32])).with_unit("bits"),
    FieldSpec::bits("Ranks", Organization, 7, 3, 3, Table(&[1, 2, 3, 4])),
    FieldSpec::bits("Primary Bus Width", Organization, 8, 0, 3, Table(&[8, 16, 32, 64])).with_unit("bits"),
    FieldSpec::bits("Bus Width Extension", Organization, 8, 3, 2, Table(&[0, 8])).with_unit("bits"),
    FieldSpec::byte("Fine Timebase", Timings, 9, Hex),
    FieldSpec::bytes("Medium Timebase", Timings, 10, 2, Hex),
    FieldSpec::bytes("CAS Latencies", Timings, 14, 2, Custom(cas_latencies)),
    FieldSpec::bits("RZQ/6", Features, 30, 0, 1, Flag),
    FieldSpec::bits("RZQ/7", Features, 30, 1, 1, Flag),
    FieldSpec::bits("DLL-Off Mode", Features, 30, 7, 1, Flag),
    FieldSpec::bits("Extended Temperature Range", Features, 31, 0, 1, Flag),
    FieldSpec::bits("Extended Temperature 1X Refresh", Features, 31, 1, 1, Flag),
    FieldSpec::bits("Auto Self Refresh", Features, 31, 2, 1, Flag),
    FieldSpec::bits("On-Die Thermal Sensor", Features, 31, 3, 1, Flag),
    FieldSpec::bits("Partial Array Self Refresh", Features, 31, 7, 1, Flag),
    FieldSpec::bits("Thermal Sensor", Features, 32, 7, 1, Flag),
    FieldSpec::bits(
        "Signal Loading",
        Organization,
        33,
        0,
        2,
        Enumerated(&[(0, "Not specified"), (1, "Multi load stack"), (2, "Single load stack")]),
    ),
    FieldSpec::bits(
        "Die Count",
        Organization,
        33,
        4,
        3,
        Enumerated(&[(0, "Not specified"), (1, "1"), (2, "2"), (3, "4"), (4, "8")]),
    ),
    FieldSpec::bits("Non-Standard Device", Organization, 33, 7, 1, Flag),
];

/// Unbuffered block, bytes 60..=63.
pub static UNBUFFERED_FIELDS: &[FieldSpec] = &[
    FieldSpec::bits("Module Height", ModuleSpecific, 60, 0, 5, Custom(module_height)),
    FieldSpec::bits("Front Thickness", ModuleSpecific, 61, 0, 4, Custom(module_thickness)),
    FieldSpec::bits("Back Thickness", ModuleSpecific, 61, 4, 4, Custom(module_thickness)),
    FieldSpec::bits("Rank 1 Address Mirroring", ModuleSpecific, 63, 0, 1, Flag),
];

/// Registered block, bytes 60..=76.
pub static REGISTERED_FIELDS: &[FieldSpec] = &[
    FieldSpec::bits("Module Height", ModuleSpecific, 60, 0, 5, Custom(module_height)),
    FieldSpec::bits("Front Thickness", ModuleSpecific, 61, 0, 4, Custom(module_thickness)),
    FieldSpec::bits("Back Thickness", ModuleSpecific, 61, 4, 4, Custom(module_thickness)),
    FieldSpec::bits("Registers", ModuleSpecific, 63, 0, 2, Table(&[0, 1, 2, 4])),
    FieldSpec::bits("DRAM Rows", ModuleSpecific, 63, 2, 2, Table(&[0, 1, 2, 4])),
    FieldSpec::bits("Heat Spreader", ModuleSpecific, 64, 7, 1, Flag),
    FieldSpec::bytes("Register Manufacturer", ModuleSpecific, 65, 2, JedecId),
    FieldSpec::byte("Register Revision", ModuleSpecific, 67, Hex),
    FieldSpec::bits("Register Type", ModuleSpecific, 68, 0, 3, Enumerated(&[(0, "SSTE32882")])),
    FieldSpec::bytes("RC Control Words", ModuleSpecific, 69, 8, Hex),
];

/// Load-reduced block, bytes 60..=116.
pub static LRDIMM_FIELDS: &[FieldSpec] = &[
    FieldSpec::bits("Module Height", ModuleSpecific, 60, 0, 5, Custom(module_height)),
    FieldSpec::bits("Front Thickness", ModuleSpecific, 61, 0, 4, Custom(module_thickness)),
    FieldSpec::bits("Back Thickness", ModuleSpecific, 61, 4, 4, Custom(module_thickness)),
    FieldSpec::byte("Module Attributes", ModuleSpecific, 63, Hex),
    FieldSpec::byte("Memory Buffer Revision", ModuleSpecific, 64, Hex),
    FieldSpec::bytes("Memory Buffer Manufacturer", ModuleSpecific, 65, 2, JedecId),
    FieldSpec::bytes("Personality Bytes", ModuleSpecific, 102, 15, Hex),
];

/// Module-supplier block, bytes 117..=149.
pub static MANUFACTURING_FIELDS: &[FieldSpec] = &[
    FieldSpec::bytes("Module Manufacturer", Manufacturer, 117, 2, JedecId),
    FieldSpec::byte("Manufacturing Location", Manufacturer, 119, Integer),
    FieldSpec::byte("Manufacturing Year", Manufacturer, 120, Custom(bcd_year)),
    FieldSpec::byte("Manufacturing Week", Manufacturer, 121, Bcd),
    FieldSpec::bytes("Serial Number", Manufacturer, 122, 4, Hex),
    FieldSpec::bytes("Module Part Number", Manufacturer, 128, 18, Ascii),
    FieldSpec::bytes("Module Revision", Manufacturer, 146, 2, Hex),
    FieldSpec::bytes("DRAM Manufacturer", Manufacturer, 148, 2, JedecId),
];

/// DDR3 decoder.
pub struct Ddr3Decoder;

impl GenerationDecoder for Ddr3Decoder {
    fn generation(&self) -> Generation {
        Generation::Ddr3
    }

    fn field_specs(&self, sub_type: SubType) -> Vec<&'static [FieldSpec]> {
        let mut tables = vec![BASE_FIELDS];
        match sub_type {
            SubType::Lrdimm => tables.push(LRDIMM_FIELDS),
            s if s.is_registered() => tables.push(REGISTERED_FIELDS),
            s if s.is_unbuffered() => tables.push(UNBUFFERED_FIELDS),
            _ => {}
        }
        tables.push(MANUFACTURING_FIELDS);
        tables
    }

    fn decode(&self, ctx: &DecodeContext<'_>) -> SpdResult<ModuleRecord> {
        let src = ctx.source;
        let sub_type = ctx.classification.sub_type;
        let mut b = RecordBuilder::new(src, ctx.vendors);

        for table in self.field_specs(sub_type) {
            b.apply_all(table)?;
        }
        if !matches!(sub_type, SubType::Unknown(_)) {
            common::push_raw_card(&mut b, 60, 62)?;
        }

        decode_capacity(&mut b)?;
        decode_timings(&mut b)?;

        b.set_module_manufacturer(ManufacturerId::from_spd_pair(src.byte(117)?, src.byte(118)?));

        let hp = hp_tag_offset(Generation::Ddr3).and_then(|offset| common::hp_block(src, offset));
        if let Some(block) = hp {
            debug!("HP SmartMemory code {}", codec::hex(&block.code));
            b.derived(
                "HP SmartMemory Code",
                Category::Vendor,
                vec![block.span],
                FieldValue::Text(format!("{:08X}", block.code_u32())),
                None,
            )?;
            b.set_vendor_block(block);
        }

        if ctx.options.decode_xmp {
            if let Some(block) = xmp::decode_xmp(src) {
                b.derived(
                    "XMP Version",
                    Category::Xmp,
                    vec![xmp::HEADER_SPAN],
                    FieldValue::Text(block.version.clone()),
                    None,
                )?;
                for p in &block.profiles {
                    let rate = match p.command_rate {
                        Some(n) => format!(" {}T", n),
                        None => String::new(),
                    };
                    b.derived(
                        &format!("XMP Profile {}", p.index),
                        Category::Xmp,
                        vec![p.span],
                        FieldValue::Text(format!(
                            "DDR3-{} {} {:.2} V{}",
                            p.data_rate, p.timings, p.voltage, rate
                        )),
                        None,
                    )?;
                }
                b.set_xmp(block);
            }
        }

        Ok(b.finish(&ctx.classification))
    }
}

/// Module capacity from density, device width, bus width and ranks, with a
/// cross-check against the row/column addressing.
fn decode_capacity(b: &mut RecordBuilder<'_>) -> SpdResult<()> {
    let src = b.source();
    let (b4, b5, b7, b8) = (src.byte(4)?, src.byte(5)?, src.byte(7)?, src.byte(8)?);

    let width_code = b7 & 0x07;
    let bus_code = b8 & 0x07;
    let die_bits = match codec::ddr3_density_bits(b4 & 0x0F) {
        Some(bits) if width_code <= 3 && bus_code <= 3 => bits,
        _ => {
            b.warn(Warning::UnusualEncoding {
                field: "Module Capacity".into(),
                message: format!("reserved organization codes (bytes 4/7/8: {:#04x} {:#04x} {:#04x})", b4, b7, b8),
            });
            return Ok(());
        }
    };

    let device_width = 4u32 << width_code;
    let bus_width = 8u32 << bus_code;
    let ranks = u32::from((b7 >> 3) & 0x07) + 1;
    let bytes = codec::module_capacity_bytes(die_bits, bus_width, device_width, ranks);
    b.set_capacity(bytes);
    b.derived(
        "Module Capacity",
        Category::Capacity,
        vec![ByteSpan::single(4), ByteSpan::single(7), ByteSpan::single(8)],
        FieldValue::Text(codec::format_size(bytes)),
        None,
    )?;

    let rows = 12 + u32::from((b5 >> 3) & 0x07);
    let cols = 9 + u32::from(b5 & 0x07);
    let banks = 8u64 << ((b4 >> 4) & 0x07);
    let addressed = (1u64 << (rows + cols)) * banks * u64::from(device_width);
    if addressed != die_bits {
        b.warn(Warning::UnusualEncoding {
            field: "SDRAM Density".into(),
            message: format!(
                "{} rows x {} columns x {} banks implies {} Mb per die, density code says {} Mb",
                rows,
                cols,
                banks,
                addressed >> 20,
                die_bits >> 20
            ),
        });
    }
    Ok(())
}

fn decode_timings(b: &mut RecordBuilder<'_>) -> SpdResult<()> {
    let src = b.source();
    let byte = |i: usize| src.byte(i);
    let s = ByteSpan::single;

    let tb = match Timebase::from_ratios(byte(10)?, byte(11)?, byte(9)?) {
        Some(tb) => tb,
        None => {
            b.warn(Warning::UnusualEncoding {
                field: "Medium Timebase".into(),
                message: "zero divisor, assuming 1/8 ns MTB and 1 ps FTB".into(),
            });
            Timebase::STANDARD
        }
    };
    let mtb = |i: usize| -> SpdResult<u32> { Ok(u32::from(src.byte(i)?)) };
    let fine = |i: usize| -> SpdResult<i8> { Ok(codec::signed(src.byte(i)?)) };

    let tck = tb.ps(mtb(12)?, fine(34)?);
    b.derived("tCKmin", Timings, vec![s(12), s(34)], FieldValue::Float(codec::ps_to_ns(tck)), Some("ns"))?;

    let b21 = byte(21)?;
    let tras = codec::u12(b21 & 0x0F, byte(22)?);
    let trc = codec::u12(b21 >> 4, byte(23)?);
    let tfaw = codec::u12(byte(28)? & 0x0F, byte(29)?);

    let mut params = Vec::new();
    push_timing(b, &mut params, "tAA", tb.ps(mtb(16)?, fine(35)?), vec![s(16), s(35)])?;
    push_timing(b, &mut params, "tRCD", tb.ps(mtb(18)?, fine(36)?), vec![s(18), s(36)])?;
    push_timing(b, &mut params, "tRP", tb.ps(mtb(20)?, fine(37)?), vec![s(20), s(37)])?;
    push_timing(b, &mut params, "tRAS", tb.ps(u32::from(tras), 0), vec![s(21), s(22)])?;
    push_timing(b, &mut params, "tRC", tb.ps(u32::from(trc), fine(38)?), vec![s(21), s(23), s(38)])?;
    push_timing(b, &mut params, "tRFC", tb.ps(u32::from(src.read_u16_le(24)?), 0), vec![ByteSpan::new(24, 25)])?;
    push_timing(b, &mut params, "tWR", tb.ps(mtb(17)?, 0), vec![s(17)])?;
    push_timing(b, &mut params, "tRRD", tb.ps(mtb(19)?, 0), vec![s(19)])?;
    push_timing(b, &mut params, "tWTR", tb.ps(mtb(26)?, 0), vec![s(26)])?;
    push_timing(b, &mut params, "tRTP", tb.ps(mtb(27)?, 0), vec![s(27)])?;
    push_timing(b, &mut params, "tFAW", tb.ps(u32::from(tfaw), 0), vec![s(28), s(29)])?;

    let cas = codec::cas_bitmap(&[byte(14)?, byte(15)? & 0x7F], 4);
    let low_voltage = byte(6)? & 0x02 != 0;
    let (report, warnings) = timing::analyze(&TimingInput {
        generation: Generation::Ddr3,
        tck_ps: tck,
        cas_latencies: cas,
        check_cas: true,
        params: &params,
        low_voltage,
    });
    b.extend_warnings(warnings);

    b.derived("Data Rate", Timings, vec![s(12), s(34)], FieldValue::Integer(i64::from(report.data_rate)), Some("MT/s"))?;
    b.derived("Module Name", Identity, vec![s(12), s(6)], FieldValue::Text(report.module_name.clone()), None)?;
    b.derived(
        "Primary Timings",
        Timings,
        vec![s(12), s(16), s(18), s(20), s(21), s(22)],
        FieldValue::Text(report.primary.to_string()),
        Some("clocks"),
    )?;
    b.set_timings(report);
    Ok(())
}
