//! Helpers shared by the generation decoders.

use crate::codec;
use crate::field::{ByteSpan, Category, FieldValue};
use crate::image::{ByteSource, SpdResult};
use crate::record::{RecordBuilder, VendorBlock};
use crate::rules::selections::HP_TAG;
use crate::timing::TimingParam;

/// JEDEC reference raw card letters, base set (bit 7 of the raw card byte clear).
static RAW_CARDS: [&str; 32] = [
    "A", "B", "C", "D", "E", "F", "G", "H", "J", "K", "L", "M", "N", "P", "R", "T", "U", "V",
    "W", "Y", "AA", "AB", "AC", "AD", "AE", "AF", "AG", "AH", "AJ", "AK", "AL", "ZZ",
];

/// Extended set (bit 7 set).
static RAW_CARDS_EXT: [&str; 32] = [
    "AM", "AN", "AP", "AR", "AT", "AU", "AV", "AW", "AY", "BA", "BB", "BC", "BD", "BE", "BF",
    "BG", "BH", "BJ", "BK", "BL", "BM", "BN", "BP", "BR", "BT", "BU", "BV", "BW", "BY", "CA",
    "CB", "ZZ",
];

/// BCD year byte as a four-digit year.
pub fn bcd_year(raw: u64) -> Option<FieldValue> {
    codec::bcd(raw as u8).map(|y| FieldValue::Integer(2000 + i64::from(y)))
}

/// Flag stored active-low.
pub fn inverted_flag(raw: u64) -> Option<FieldValue> {
    Some(FieldValue::Flag(raw == 0))
}

/// Nominal module height, bits 4:0 of the DDR3/DDR4 height byte.
pub fn module_height(raw: u64) -> Option<FieldValue> {
    let text = match raw {
        0 => "<= 15 mm".to_string(),
        31 => "> 45 mm".to_string(),
        n => format!("{} < h <= {} mm", 14 + n, 15 + n),
    };
    Some(FieldValue::Text(text))
}

/// Maximum thickness nibble.
pub fn module_thickness(raw: u64) -> Option<FieldValue> {
    let text = match raw {
        0 => "<= 1 mm".to_string(),
        n => format!("{} < t <= {} mm", n, n + 1),
    };
    Some(FieldValue::Text(text))
}

/// Reference raw card name and revision, e.g. `B1`.
///
/// `card` is the raw card byte; `extension` the 3-bit raw card extension from
/// the height byte, which lifts the revision above 3.
pub fn raw_card(card: u8, extension: u8) -> String {
    let index = usize::from(card & 0x1F);
    let letters = if card & 0x80 != 0 { &RAW_CARDS_EXT } else { &RAW_CARDS };
    let name = letters[index];
    if name == "ZZ" {
        return name.to_string();
    }
    let revision = if extension > 0 {
        u32::from(extension) + 3
    } else {
        u32::from((card >> 5) & 0x03)
    };
    format!("{}{}", name, revision)
}

/// Record the reference raw card as a field spanning both source bytes.
pub fn push_raw_card(b: &mut RecordBuilder<'_>, height_at: usize, card_at: usize) -> SpdResult<()> {
    let src = b.source();
    let extension = codec::bits(src.byte(height_at)?, 5, 3);
    let name = raw_card(src.byte(card_at)?, extension);
    b.derived(
        "Reference Raw Card",
        Category::ModuleSpecific,
        vec![ByteSpan::single(card_at), ByteSpan::single(height_at)],
        FieldValue::Text(name),
        None,
    )
}

/// Record a timing value as a field and queue it for the analyzer.
pub fn push_timing(
    b: &mut RecordBuilder<'_>,
    params: &mut Vec<TimingParam>,
    name: &'static str,
    ps: i64,
    spans: Vec<ByteSpan>,
) -> SpdResult<()> {
    b.derived(name, Category::Timings, spans.clone(), FieldValue::Float(codec::ps_to_ns(ps)), Some("ns"))?;
    params.push(TimingParam::new(name, ps, spans));
    Ok(())
}

/// The HP SmartMemory block: `HPT\0` followed by a 4-byte code.
pub fn hp_block(src: &ByteSource, offset: usize) -> Option<VendorBlock> {
    let bytes = src.read(offset, 8).ok()?;
    if bytes[..4] != HP_TAG {
        return None;
    }
    Some(VendorBlock {
        name: "HP SmartMemory".to_string(),
        span: ByteSpan::new(offset, offset + 7),
        code: bytes[4..8].to_vec(),
    })
}
