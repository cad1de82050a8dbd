//! DDR4 SDRAM decoder (JEDEC 21-C Annex L, 512-byte image).

use super::common::{self, bcd_year, module_height, module_thickness, push_timing};
use super::{DecodeContext, GenerationDecoder};
use crate::codec::{self, Timebase};
use crate::field::{ByteSpan, Category, DecodeRule, FieldSpec, FieldValue};
use crate::image::{SpdResult, Warning};
use crate::profile::{Generation, SubType};
use crate::record::{ModuleRecord, RecordBuilder};
use crate::timing::{self, TimingInput};
use jep106::ManufacturerId;

use Category::*;
use DecodeRule::*;

static MODULE_TYPES: &[(u64, &str)] = &[
    (0x1, "RDIMM"),
    (0x2, "UDIMM"),
    (0x3, "SO-DIMM"),
    (0x4, "LRDIMM"),
    (0x5, "Mini-RDIMM"),
    (0x6, "Mini-UDIMM"),
    (0x8, "72b-SO-RDIMM"),
    (0x9, "72b-SO-UDIMM"),
];

/// CAS bitmap bytes 20..=23. Bit 31 moves the base from CL7 to CL23.
fn cas_bitmap(bytes: [u8; 4]) -> Vec<u32> {
    let first = if bytes[3] & 0x80 != 0 { 23 } else { 7 };
    codec::cas_bitmap(&[bytes[0], bytes[1], bytes[2], bytes[3] & 0x3F], first)
}

fn cas_latencies(raw: u64) -> Option<FieldValue> {
    let b = (raw as u32).to_le_bytes();
    Some(FieldValue::List(cas_bitmap(b)))
}

/// Common block, bytes 0..=127 (timings are derived separately).
pub static BASE_FIELDS: &[FieldSpec] = &[
    FieldSpec::bits(
        "SPD Bytes Used",
        Identity,
        0,
        0,
        4,
        Enumerated(&[(1, "128"), (2, "256"), (3, "384"), (4, "512")]),
    ),
    FieldSpec::bits("SPD Bytes Total", Identity, 0, 4, 3, Enumerated(&[(1, "256"), (2, "512")])),
    FieldSpec::byte("SPD Revision", Identity, 1, Revision),
    FieldSpec::byte("Memory Type", Identity, 2, Enumerated(&[(0x0C, "DDR4 SDRAM"), (0x0E, "DDR4E SDRAM")])),
    FieldSpec::bits("Module Type", Identity, 3, 0, 4, Enumerated(MODULE_TYPES)),
    FieldSpec::bits(
        "SDRAM Density",
        Capacity,
        4,
        0,
        4,
        Table(&[256, 512, 1024, 2048, 4096, 8192, 16384, 32768, 12288, 24576]),
    )
    .with_unit("Mb"),
    FieldSpec::bits("Banks per Group", Organization, 4, 4, 2, Table(&[4, 8])),
    FieldSpec::bits("Bank Groups", Organization, 4, 6, 2, Table(&[1, 2, 4])),
    FieldSpec::bits("Column Address Bits", Organization, 5, 0, 3, Offset(9)),
    FieldSpec::bits("Row Address Bits", Organization, 5, 3, 3, Offset(12)),
    FieldSpec::bits(
        "Signal Loading",
        Organization,
        6,
        0,
        2,
        Enumerated(&[(0, "Not specified"), (1, "Multi load stack"), (2, "Single load stack (3DS)")]),
    ),
    FieldSpec::bits("Die Count", Organization, 6, 4, 3, Offset(1)),
    FieldSpec::bits("Package Type", Organization, 6, 7, 1, Enumerated(&[(0, "Monolithic"), (1, "Non-monolithic")])),
    FieldSpec::bits(
        "Maximum Activate Count",
        Features,
        7,
        0,
        4,
        Enumerated(&[
            (0, "Untested"),
            (1, "700K"),
            (2, "600K"),
            (3, "500K"),
            (4, "400K"),
            (5, "300K"),
            (6, "200K"),
            (8, "Unlimited"),
        ]),
    ),
    FieldSpec::bits(
        "Post Package Repair",
        Features,
        9,
        6,
        2,
        Enumerated(&[(0, "Not supported"), (1, "One row per bank group")]),
    ),
    FieldSpec::bits("Soft PPR", Features, 9, 5, 1, Flag),
    FieldSpec::bits("1.2 V Operable", Voltage, 11, 0, 1, Flag),
    FieldSpec::bits("1.2 V Endurant", Voltage, 11, 1, 1, Flag),
    FieldSpec::bits("Device Width", Organization, 12, 0, 3, Table(&[4, 8, 16, 32])).with_unit("bits"),
    FieldSpec::bits("Package Ranks", Organization, 12, 3, 3, Offset(1)),
    FieldSpec::bits("Rank Mix", Organization, 12, 6, 1, Enumerated(&[(0, "Symmetrical"), (1, "Asymmetrical")])),
    FieldSpec::bits("Primary Bus Width", Organization, 13, 0, 3, Table(&[8, 16, 32, 64])).with_unit("bits"),
    FieldSpec::bits("Bus Width Extension", Organization, 13, 3, 2, Table(&[0, 8])).with_unit("bits"),
    FieldSpec::bits("Thermal Sensor", Features, 14, 7, 1, Flag),
    FieldSpec::byte("Timebases", Timings, 17, Hex),
    FieldSpec::bytes("CAS Latencies", Timings, 20, 4, Custom(cas_latencies)),
];

/// Unbuffered block, bytes 128..=131.
pub static UNBUFFERED_FIELDS: &[FieldSpec] = &[
    FieldSpec::bits("Module Height", ModuleSpecific, 128, 0, 5, Custom(module_height)),
    FieldSpec::bits("Front Thickness", ModuleSpecific, 129, 0, 4, Custom(module_thickness)),
    FieldSpec::bits("Back Thickness", ModuleSpecific, 129, 4, 4, Custom(module_thickness)),
    FieldSpec::bits("Rank 1 Address Mirroring", ModuleSpecific, 131, 0, 1, Flag),
];

/// Registered block, bytes 128..=138.
pub static REGISTERED_FIELDS: &[FieldSpec] = &[
    FieldSpec::bits("Module Height", ModuleSpecific, 128, 0, 5, Custom(module_height)),
    FieldSpec::bits("Front Thickness", ModuleSpecific, 129, 0, 4, Custom(module_thickness)),
    FieldSpec::bits("Back Thickness", ModuleSpecific, 129, 4, 4, Custom(module_thickness)),
    FieldSpec::bits("Registers", ModuleSpecific, 131, 0, 2, Table(&[0, 1, 2, 4])),
    FieldSpec::bits("DRAM Rows", ModuleSpecific, 131, 2, 2, Table(&[0, 1, 2, 4])),
    FieldSpec::bits("Heat Spreader", ModuleSpecific, 132, 7, 1, Flag),
    FieldSpec::bytes("Register Manufacturer", ModuleSpecific, 133, 2, JedecId),
    FieldSpec::byte("Register Revision", ModuleSpecific, 135, Hex),
    FieldSpec::bits("Rank 1 Address Mirroring", ModuleSpecific, 136, 0, 1, Flag),
    FieldSpec::bytes("Output Drive Strength", ModuleSpecific, 137, 2, Hex),
];

/// Load-reduced block, bytes 128..=135.
pub static LRDIMM_FIELDS: &[FieldSpec] = &[
    FieldSpec::bits("Module Height", ModuleSpecific, 128, 0, 5, Custom(module_height)),
    FieldSpec::bits("Front Thickness", ModuleSpecific, 129, 0, 4, Custom(module_thickness)),
    FieldSpec::bits("Back Thickness", ModuleSpecific, 129, 4, 4, Custom(module_thickness)),
    FieldSpec::byte("Module Attributes", ModuleSpecific, 131, Hex),
    FieldSpec::bits("Heat Spreader", ModuleSpecific, 132, 7, 1, Flag),
    FieldSpec::bytes("Memory Buffer Manufacturer", ModuleSpecific, 133, 2, JedecId),
    FieldSpec::byte("Memory Buffer Revision", ModuleSpecific, 135, Hex),
];

/// Module-supplier block, bytes 320..=352.
pub static MANUFACTURING_FIELDS: &[FieldSpec] = &[
    FieldSpec::bytes("Module Manufacturer", Manufacturer, 320, 2, JedecId),
    FieldSpec::byte("Manufacturing Location", Manufacturer, 322, Integer),
    FieldSpec::byte("Manufacturing Year", Manufacturer, 323, Custom(bcd_year)),
    FieldSpec::byte("Manufacturing Week", Manufacturer, 324, Bcd),
    FieldSpec::bytes("Serial Number", Manufacturer, 325, 4, Hex),
    FieldSpec::bytes("Module Part Number", Manufacturer, 329, 20, Ascii),
    FieldSpec::byte("Module Revision", Manufacturer, 349, Hex),
    FieldSpec::bytes("DRAM Manufacturer", Manufacturer, 350, 2, JedecId),
    FieldSpec::byte("DRAM Stepping", Manufacturer, 352, Hex),
];

/// DDR4 decoder.
pub struct Ddr4Decoder;

impl GenerationDecoder for Ddr4Decoder {
    fn generation(&self) -> Generation {
        Generation::Ddr4
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
            common::push_raw_card(&mut b, 128, 130)?;
        }

        decode_capacity(&mut b)?;
        decode_timings(&mut b)?;

        b.set_module_manufacturer(ManufacturerId::from_spd_pair(src.byte(320)?, src.byte(321)?));
        Ok(b.finish(&ctx.classification))
    }
}

/// Capacity from density, widths and logical ranks. 3DS packages multiply
/// package ranks by the die count.
fn decode_capacity(b: &mut RecordBuilder<'_>) -> SpdResult<()> {
    let src = b.source();
    let (b4, b5, b6, b12, b13) = (src.byte(4)?, src.byte(5)?, src.byte(6)?, src.byte(12)?, src.byte(13)?);

    let width_code = b12 & 0x07;
    let bus_code = b13 & 0x07;
    let die_bits = match codec::ddr4_density_bits(b4 & 0x0F) {
        Some(bits) if width_code <= 3 && bus_code <= 3 => bits,
        _ => {
            b.warn(Warning::UnusualEncoding {
                field: "Module Capacity".into(),
                message: format!("reserved organization codes (bytes 4/12/13: {:#04x} {:#04x} {:#04x})", b4, b12, b13),
            });
            return Ok(());
        }
    };

    let device_width = 4u32 << width_code;
    let bus_width = 8u32 << bus_code;
    let package_ranks = u32::from((b12 >> 3) & 0x07) + 1;
    let three_ds = b6 & 0x80 != 0 && b6 & 0x03 == 0x02;
    let ranks = if three_ds {
        package_ranks * (u32::from((b6 >> 4) & 0x07) + 1)
    } else {
        package_ranks
    };

    let bytes = codec::module_capacity_bytes(die_bits, bus_width, device_width, ranks);
    b.set_capacity(bytes);
    b.derived(
        "Module Capacity",
        Category::Capacity,
        vec![ByteSpan::single(4), ByteSpan::single(6), ByteSpan::single(12), ByteSpan::single(13)],
        FieldValue::Text(codec::format_size(bytes)),
        None,
    )?;
    b.derived(
        "Logical Ranks",
        Category::Organization,
        vec![ByteSpan::single(6), ByteSpan::single(12)],
        FieldValue::Integer(i64::from(ranks)),
        None,
    )?;

    // Power-of-two densities only; 12 Gb and 24 Gb dies use non-binary row counts.
    if die_bits.is_power_of_two() {
        let rows = 12 + u32::from((b5 >> 3) & 0x07);
        let cols = 9 + u32::from(b5 & 0x07);
        let banks = (4u64 << ((b4 >> 4) & 0x03)) * (1u64 << ((b4 >> 6) & 0x03));
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
    }
    Ok(())
}

fn decode_timings(b: &mut RecordBuilder<'_>) -> SpdResult<()> {
    let src = b.source();
    let byte = |i: usize| src.byte(i);
    let s = ByteSpan::single;

    let b17 = byte(17)?;
    // Only MTB 125 ps / FTB 1 ps is defined.
    if b17 & 0x0F != 0 {
        b.warn(Warning::UnusualEncoding {
            field: "Timebases".into(),
            message: format!("reserved timebase code {:#04x}, assuming 125 ps / 1 ps", b17),
        });
    }
    let tb = Timebase::STANDARD;
    let mtb = |i: usize| -> SpdResult<u32> { Ok(u32::from(src.byte(i)?)) };
    let fine = |i: usize| -> SpdResult<i8> { Ok(codec::signed(src.byte(i)?)) };
    let mtb12 = |hi: u8, lo: usize| -> SpdResult<u32> { Ok(u32::from(codec::u12(hi, src.byte(lo)?))) };

    let tck = tb.ps(mtb(18)?, fine(125)?);
    b.derived("tCKmin", Timings, vec![s(18), s(125)], FieldValue::Float(codec::ps_to_ns(tck)), Some("ns"))?;

    let b27 = byte(27)?;
    let b43 = byte(43)?;
    let mut params = Vec::new();
    push_timing(b, &mut params, "tAA", tb.ps(mtb(24)?, fine(123)?), vec![s(24), s(123)])?;
    push_timing(b, &mut params, "tRCD", tb.ps(mtb(25)?, fine(122)?), vec![s(25), s(122)])?;
    push_timing(b, &mut params, "tRP", tb.ps(mtb(26)?, fine(121)?), vec![s(26), s(121)])?;
    push_timing(b, &mut params, "tRAS", tb.ps(mtb12(b27 & 0x0F, 28)?, 0), vec![s(27), s(28)])?;
    push_timing(b, &mut params, "tRC", tb.ps(mtb12(b27 >> 4, 29)?, fine(120)?), vec![s(27), s(29), s(120)])?;
    push_timing(b, &mut params, "tRFC1", tb.ps(u32::from(src.read_u16_le(30)?), 0), vec![ByteSpan::new(30, 31)])?;
    push_timing(b, &mut params, "tRFC2", tb.ps(u32::from(src.read_u16_le(32)?), 0), vec![ByteSpan::new(32, 33)])?;
    push_timing(b, &mut params, "tRFC4", tb.ps(u32::from(src.read_u16_le(34)?), 0), vec![ByteSpan::new(34, 35)])?;
    push_timing(b, &mut params, "tFAW", tb.ps(mtb12(byte(36)? & 0x0F, 37)?, 0), vec![s(36), s(37)])?;
    push_timing(b, &mut params, "tRRD_S", tb.ps(mtb(38)?, fine(119)?), vec![s(38), s(119)])?;
    push_timing(b, &mut params, "tRRD_L", tb.ps(mtb(39)?, fine(118)?), vec![s(39), s(118)])?;
    push_timing(b, &mut params, "tCCD_L", tb.ps(mtb(40)?, fine(117)?), vec![s(40), s(117)])?;
    push_timing(b, &mut params, "tWR", tb.ps(mtb12(byte(41)? & 0x0F, 42)?, 0), vec![s(41), s(42)])?;
    push_timing(b, &mut params, "tWTR_S", tb.ps(mtb12(b43 & 0x0F, 44)?, 0), vec![s(43), s(44)])?;
    push_timing(b, &mut params, "tWTR_L", tb.ps(mtb12(b43 >> 4, 45)?, 0), vec![s(43), s(45)])?;

    let cas = cas_bitmap([byte(20)?, byte(21)?, byte(22)?, byte(23)?]);
    let (report, warnings) = timing::analyze(&TimingInput {
        generation: Generation::Ddr4,
        tck_ps: tck,
        cas_latencies: cas,
        check_cas: true,
        params: &params,
        low_voltage: false,
    });
    b.extend_warnings(warnings);

    b.derived("Data Rate", Timings, vec![s(18), s(125)], FieldValue::Integer(i64::from(report.data_rate)), Some("MT/s"))?;
    b.derived("Module Name", Identity, vec![s(18), s(125)], FieldValue::Text(report.module_name.clone()), None)?;
    b.derived(
        "Primary Timings",
        Timings,
        vec![s(18), s(24), s(25), s(26), s(27), s(28)],
        FieldValue::Text(report.primary.to_string()),
        Some("clocks"),
    )?;
    b.set_timings(report);
    Ok(())
}
