//! Field specs and the decoded values they produce.

use crate::codec;
use crate::image::{ByteSource, SpdError, SpdResult, Warning};
use jep106::{ManufacturerId, VendorTable};
use serde::Serialize;
use std::fmt;

/// Grouping of decoded fields within a module record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Identity,
    Capacity,
    Organization,
    Timings,
    Voltage,
    Features,
    Manufacturer,
    ModuleSpecific,
    Xmp,
    Vendor,
    Checksum,
}

/// Inclusive byte range within an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ByteSpan {
    pub start: usize,
    pub end: usize,
}

impl ByteSpan {
    pub const fn new(start: usize, end: usize) -> Self {
        ByteSpan { start, end }
    }

    pub const fn single(offset: usize) -> Self {
        ByteSpan {
            start: offset,
            end: offset,
        }
    }

    /// Saturates at `usize::MAX` for a span ending at `usize::MAX`.
    pub fn len(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        (self.end - self.start).saturating_add(1)
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn contains(&self, offset: usize) -> bool {
        (self.start..=self.end).contains(&offset)
    }

    pub fn overlaps(&self, other: &ByteSpan) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for ByteSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Sub-byte position of a bit-field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BitRange {
    pub offset: u8,
    pub width: u8,
}

/// How the raw bits of a field are interpreted.
#[derive(Debug, Clone, Copy)]
pub enum DecodeRule {
    /// Unsigned little-endian integer.
    Integer,
    /// Integer plus a constant (e.g. `rows = 12 + code`).
    Offset(i64),
    /// Raw value indexes a table of numeric values.
    Table(&'static [u64]),
    /// Raw value maps to a name.
    Enumerated(&'static [(u64, &'static str)]),
    /// Non-zero means set.
    Flag,
    /// Packed BCD byte.
    Bcd,
    /// Printable ASCII string.
    Ascii,
    /// Opaque bytes shown as hex.
    Hex,
    /// `major.minor` nibbles.
    Revision,
    /// JEP-106 (continuation count, code) byte pair.
    JedecId,
    /// JEP-106 `0x7F` continuation run followed by the code.
    JedecIdRun,
    /// Formula applied to the raw integer.
    Custom(fn(u64) -> Option<FieldValue>),
}

/// An interpreted field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<u32>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Flag(b) => write!(f, "{}", if *b { "yes" } else { "no" }),
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", (v * 1000.0).round() / 1000.0),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::List(items) => {
                let parts: Vec<String> = items.iter().map(u32::to_string).collect();
                f.write_str(&parts.join(", "))
            }
        }
    }
}

/// Location, name and interpretation of one SPD field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub category: Category,
    pub offset: usize,
    /// Width in bytes.
    pub width: usize,
    pub bit_offset: u8,
    /// Zero for whole-byte fields.
    pub bit_width: u8,
    pub rule: DecodeRule,
    pub unit: Option<&'static str>,
}

impl FieldSpec {
    /// Whole single byte.
    pub const fn byte(name: &'static str, category: Category, offset: usize, rule: DecodeRule) -> Self {
        Self::bytes(name, category, offset, 1, rule)
    }

    /// Multi-byte field.
    pub const fn bytes(
        name: &'static str,
        category: Category,
        offset: usize,
        width: usize,
        rule: DecodeRule,
    ) -> Self {
        FieldSpec {
            name,
            category,
            offset,
            width,
            bit_offset: 0,
            bit_width: 0,
            rule,
            unit: None,
        }
    }

    /// Bit-field inside one byte.
    pub const fn bits(
        name: &'static str,
        category: Category,
        offset: usize,
        bit_offset: u8,
        bit_width: u8,
        rule: DecodeRule,
    ) -> Self {
        FieldSpec {
            name,
            category,
            offset,
            width: 1,
            bit_offset,
            bit_width,
            rule,
            unit: None,
        }
    }

    pub const fn with_unit(self, unit: &'static str) -> Self {
        FieldSpec {
            unit: Some(unit),
            ..self
        }
    }

    /// Inclusive byte span covered.
    pub fn span(&self) -> ByteSpan {
        ByteSpan::new(self.offset, self.offset + self.width.max(1) - 1)
    }

    /// Apply this spec to an image.
    pub fn decode(
        &self,
        src: &ByteSource,
        vendors: &VendorTable,
    ) -> SpdResult<(DecodedField, Option<Warning>)> {
        let bytes = src.read(self.offset, self.width).map_err(|_| {
            SpdError::out_of_range_field(self.name, self.offset, self.width, src.len())
        })?;

        let raw = if self.bit_width > 0 {
            u64::from(codec::bits(bytes[0], self.bit_offset, self.bit_width))
        } else {
            bytes
                .iter()
                .take(8)
                .rev()
                .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
        };

        let mut warning = None;
        let mut unusual = |message: String| {
            warning = Some(Warning::UnusualEncoding {
                field: self.name.to_string(),
                message,
            });
        };

        let value = match self.rule {
            DecodeRule::Integer => FieldValue::Integer(raw as i64),
            DecodeRule::Offset(n) => FieldValue::Integer(raw as i64 + n),
            DecodeRule::Table(values) => match values.get(raw as usize) {
                Some(&v) => FieldValue::Integer(v as i64),
                None => {
                    unusual(format!("reserved code {:#x}", raw));
                    FieldValue::Text(format!("Reserved ({:#04x})", raw))
                }
            },
            DecodeRule::Enumerated(names) => match names.iter().find(|(code, _)| *code == raw) {
                Some((_, name)) => FieldValue::Text((*name).to_string()),
                None => {
                    unusual(format!("unknown code {:#x}", raw));
                    FieldValue::Text(format!("Unknown ({:#04x})", raw))
                }
            },
            DecodeRule::Flag => FieldValue::Flag(raw != 0),
            DecodeRule::Bcd => match codec::bcd(bytes[0]) {
                Some(v) => FieldValue::Integer(i64::from(v)),
                None => {
                    unusual(format!("{:#04x} is not BCD", bytes[0]));
                    FieldValue::Integer(i64::from(bytes[0]))
                }
            },
            DecodeRule::Ascii => FieldValue::Text(codec::ascii(bytes)),
            DecodeRule::Hex => FieldValue::Text(codec::hex(bytes)),
            DecodeRule::Revision => FieldValue::Text(format!("{}.{}", raw >> 4, raw & 0x0F)),
            DecodeRule::JedecId => {
                let id = ManufacturerId::from_spd_pair(bytes[0], bytes.get(1).copied().unwrap_or(0));
                if id.is_blank() {
                    FieldValue::Text("Not specified".to_string())
                } else {
                    FieldValue::Text(vendors.describe(id))
                }
            }
            DecodeRule::JedecIdRun => match ManufacturerId::from_continuation_bytes(bytes) {
                Some(id) => FieldValue::Text(vendors.describe(id)),
                None => FieldValue::Text("Not specified".to_string()),
            },
            DecodeRule::Custom(f) => match f(raw) {
                Some(v) => v,
                None => {
                    unusual(format!("reserved code {:#x}", raw));
                    FieldValue::Text(format!("Reserved ({:#04x})", raw))
                }
            },
        };

        let field = DecodedField {
            name: self.name.to_string(),
            category: self.category,
            spans: vec![self.span()],
            bits: (self.bit_width > 0).then_some(BitRange {
                offset: self.bit_offset,
                width: self.bit_width,
            }),
            raw: bytes.to_vec(),
            value,
            unit: self.unit.map(str::to_string),
        };
        Ok((field, warning))
    }
}

/// A field decoded from an image. Carries its own raw bytes so a record never
/// needs the original buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedField {
    pub name: String,
    pub category: Category,
    pub spans: Vec<ByteSpan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bits: Option<BitRange>,
    pub raw: Vec<u8>,
    pub value: FieldValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl DecodedField {
    /// A value computed from one or more byte spans rather than a single spec.
    pub fn derived(
        name: impl Into<String>,
        category: Category,
        spans: Vec<ByteSpan>,
        src: &ByteSource,
        value: FieldValue,
        unit: Option<&str>,
    ) -> SpdResult<Self> {
        let name = name.into();
        let mut raw = Vec::new();
        for span in &spans {
            let bytes = src
                .read(span.start, span.len())
                .map_err(|_| SpdError::out_of_range_field(name.as_str(), span.start, span.len(), src.len()))?;
            raw.extend_from_slice(bytes);
        }
        Ok(DecodedField {
            name,
            category,
            spans,
            bits: None,
            raw,
            value,
            unit: unit.map(str::to_string),
        })
    }

    pub fn covers(&self, offset: usize) -> bool {
        self.spans.iter().any(|s| s.contains(offset))
    }

    /// Lowest offset covered.
    pub fn first_offset(&self) -> usize {
        self.spans.iter().map(|s| s.start).min().unwrap_or(0)
    }

    /// Highest offset covered.
    pub fn last_offset(&self) -> usize {
        self.spans.iter().map(|s| s.end).max().unwrap_or(0)
    }
}
