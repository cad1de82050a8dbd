//! Intel XMP 1.x profile decoding for DDR3 images.
//!
//! Layout (bytes 176..=254):
//! - 176/177: magic `0x0C 0x4A`
//! - 178: bit 0 / bit 1 profile enable, bits 3:2 / 5:4 DIMMs per channel - 1
//! - 179: version, major in bits 7:4, minor in bits 3:0
//! - 180..=183: per-profile MTB dividend/divisor
//! - 185 and 220: profile blocks, 35 bytes each
//!
//! Decoding is best-effort: a missing magic yields no block and a profile
//! with tCK = 0 is skipped.

use crate::codec::{bits, cas_bitmap, ps_to_ns, u12};
use crate::field::ByteSpan;
use crate::image::ByteSource;
use crate::profile::Generation;
use crate::timing::{clock_cycles, data_rate, PrimaryTimings, TimingValue};
use serde::Serialize;
use tracing::debug;

pub const XMP_MAGIC: [u8; 2] = [0x0C, 0x4A];

/// Header bytes.
pub const HEADER_SPAN: ByteSpan = ByteSpan::new(176, 184);

/// First byte of each profile block.
pub const PROFILE_BASES: [usize; 2] = [185, 220];

const PROFILE_LEN: usize = 35;

/// Undecoded per-profile bytes, exposed as read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct XmpRawBytes {
    pub turnaround: u8,
    pub back_to_back: u8,
    pub command_rate_mode: u8,
    pub asr_performance: u8,
    pub vendor_personality: u8,
}

/// One decoded profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XmpProfile {
    pub index: u8,
    pub enabled: bool,
    pub dimms_per_channel: u8,
    pub span: ByteSpan,
    pub mtb_ns: f64,
    pub voltage: f64,
    pub tck_ns: f64,
    pub data_rate: u32,
    pub cas_latencies: Vec<u32>,
    pub timings: PrimaryTimings,
    pub values: Vec<TimingValue>,
    /// 1T or 2T when the mode byte resolves to one of them.
    pub command_rate: Option<u8>,
    pub raw: XmpRawBytes,
}

/// A decoded XMP block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XmpBlock {
    pub version: String,
    pub profiles: Vec<XmpProfile>,
}

/// Module voltage byte: bits 6:5 volts, bits 4:1 tenths, bit 0 adds 0.05 V.
pub fn decode_voltage(byte: u8) -> f64 {
    let units = f64::from(bits(byte, 5, 2));
    let tenths = f64::from(bits(byte, 1, 4));
    let twentieth = if byte & 0x01 != 0 { 0.05 } else { 0.0 };
    ((units + tenths / 10.0 + twentieth) * 1000.0).round() / 1000.0
}

/// Decode the XMP block of a DDR3 image, if present.
pub fn decode_xmp(src: &ByteSource) -> Option<XmpBlock> {
    let data = src.as_bytes();
    if data.get(176..178)? != XMP_MAGIC {
        return None;
    }

    let enable = *data.get(178)?;
    let version_byte = *data.get(179)?;
    let version = format!("{}.{}", version_byte >> 4, version_byte & 0x0F);

    let mut profiles = Vec::new();
    for (i, &base) in PROFILE_BASES.iter().enumerate() {
        let mtb_ps = profile_mtb_ps(data, 180 + i * 2)?;
        let enabled = enable & (1 << i) != 0;
        let dimms = bits(enable, 2 + 2 * i as u8, 2) + 1;
        match decode_profile(data, base, i as u8 + 1, mtb_ps, enabled, dimms) {
            Some(p) => profiles.push(p),
            None => debug!("XMP profile {} at byte {} is empty", i + 1, base),
        }
    }

    debug!("XMP {} with {} profile(s)", version, profiles.len());
    Some(XmpBlock { version, profiles })
}

/// Profile MTB in picoseconds; a zero divisor falls back to the base MTB.
fn profile_mtb_ps(data: &[u8], offset: usize) -> Option<f64> {
    let (dividend, divisor) = (*data.get(offset)?, *data.get(offset + 1)?);
    if divisor != 0 {
        return Some(f64::from(dividend) * 1000.0 / f64::from(divisor));
    }
    let base_dividend = data.get(10).copied().filter(|&v| v != 0).unwrap_or(1);
    let base_divisor = data.get(11).copied().filter(|&v| v != 0).unwrap_or(8);
    Some(f64::from(base_dividend) * 1000.0 / f64::from(base_divisor))
}

fn decode_profile(
    data: &[u8],
    base: usize,
    index: u8,
    mtb_ps: f64,
    enabled: bool,
    dimms_per_channel: u8,
) -> Option<XmpProfile> {
    let block = data.get(base..base + PROFILE_LEN)?;
    let tck_mtb = block[1];
    if tck_mtb == 0 {
        return None;
    }

    let ps = |count: u32| (f64::from(count) * mtb_ps).round() as i64;
    let tck_ps = ps(u32::from(tck_mtb));

    let named: [(&str, i64); 14] = [
        ("tCK", tck_ps),
        ("tAA", ps(u32::from(block[2]))),
        ("tCWL", ps(u32::from(block[5]))),
        ("tRP", ps(u32::from(block[6]))),
        ("tRCD", ps(u32::from(block[7]))),
        ("tWR", ps(u32::from(block[8]))),
        ("tRAS", ps(u32::from(u12(block[9], block[10])))),
        ("tRC", ps(u32::from(u12(block[9] >> 4, block[11])))),
        ("tREFI", ps(u32::from(u16::from_le_bytes([block[12], block[13]])))),
        ("tRFC", ps(u32::from(u16::from_le_bytes([block[14], block[15]])))),
        ("tRTP", ps(u32::from(block[16]))),
        ("tRRD", ps(u32::from(block[17]))),
        ("tFAW", ps(u32::from(u12(block[18], block[19])))),
        ("tWTR", ps(u32::from(block[20]))),
    ];
    let get = |name: &str| named.iter().find(|(n, _)| *n == name).map_or(0, |(_, v)| *v);

    let timings = PrimaryTimings {
        cl: clock_cycles(get("tAA"), tck_ps),
        trcd: clock_cycles(get("tRCD"), tck_ps),
        trp: clock_cycles(get("tRP"), tck_ps),
        tras: clock_cycles(get("tRAS"), tck_ps),
    };

    let cmd_mode = block[23];
    let command_rate = if cmd_mode != 0 && tck_ps > 0 {
        let guess = (f64::from(cmd_mode) * mtb_ps / tck_ps as f64).round() as u8;
        matches!(guess, 1 | 2).then_some(guess)
    } else {
        None
    };

    Some(XmpProfile {
        index,
        enabled,
        dimms_per_channel,
        span: ByteSpan::new(base, base + PROFILE_LEN - 1),
        mtb_ns: mtb_ps / 1000.0,
        voltage: decode_voltage(block[0]),
        tck_ns: ps_to_ns(tck_ps),
        data_rate: data_rate(Generation::Ddr3, tck_ps),
        cas_latencies: cas_bitmap(&[block[3], block[4] & 0x7F], 4),
        timings,
        values: named
            .iter()
            .map(|(name, v)| TimingValue {
                name: (*name).to_string(),
                ns: ps_to_ns(*v),
                clocks: clock_cycles(*v, tck_ps),
            })
            .collect(),
        command_rate,
        raw: XmpRawBytes {
            turnaround: block[21],
            back_to_back: block[22],
            command_rate_mode: cmd_mode,
            asr_performance: block[24],
            vendor_personality: block[34],
        },
    })
}
