//! Module records: the self-describing output of a decode.

use crate::codec;
use crate::crc::CrcCheckResult;
use crate::field::{ByteSpan, Category, DecodedField, FieldSpec, FieldValue};
use crate::image::{ByteSource, SpdResult, Warning};
use crate::profile::{Classification, Generation, SubType};
use crate::timing::TimingReport;
use crate::xmp::XmpBlock;
use jep106::{ManufacturerId, VendorTable};
use serde::Serialize;

/// A vendor-specific block found in the customer-use area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VendorBlock {
    pub name: String,
    pub span: ByteSpan,
    /// Code bytes as stored.
    pub code: Vec<u8>,
}

impl VendorBlock {
    /// Code as a big-endian u32, the form HP part lists use.
    pub fn code_u32(&self) -> u32 {
        self.code.iter().take(4).fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
    }
}

/// Decoded view of one SPD image. Owns everything it reports, so renderers
/// never need the original bytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleRecord {
    pub generation: Generation,
    pub sub_type: SubType,
    pub image_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_manufacturer: Option<ManufacturerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_bytes: Option<u64>,
    pub fields: Vec<DecodedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timings: Option<TimingReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xmp: Option<XmpBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_block: Option<VendorBlock>,
    pub crc: Vec<CrcCheckResult>,
    pub warnings: Vec<Warning>,
}

impl ModuleRecord {
    /// First field with this name.
    pub fn field(&self, name: &str) -> Option<&DecodedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Value of the named field.
    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.field(name).map(|f| &f.value)
    }

    /// Every field covering `offset`.
    pub fn fields_at(&self, offset: usize) -> Vec<&DecodedField> {
        self.fields.iter().filter(|f| f.covers(offset)).collect()
    }

    /// Fields of one category, in decode order.
    pub fn category(&self, category: Category) -> impl Iterator<Item = &DecodedField> {
        self.fields.iter().filter(move |f| f.category == category)
    }

    /// True when the HP SmartMemory tag is present.
    pub fn has_hp_tag(&self) -> bool {
        self.vendor_block.is_some()
    }

    /// Inclusive byte ranges not covered by any decoded field, checksum slot,
    /// XMP profile or vendor block.
    pub fn undecoded_gaps(&self) -> Vec<ByteSpan> {
        let mut used = vec![false; self.image_len];
        let mut mark = |span: &ByteSpan| {
            for b in used.iter_mut().take(span.end + 1).skip(span.start) {
                *b = true;
            }
        };

        for field in &self.fields {
            field.spans.iter().for_each(&mut mark);
        }
        for result in &self.crc {
            mark(&result.stored_span);
        }
        if let Some(xmp) = &self.xmp {
            for p in &xmp.profiles {
                mark(&p.span);
            }
        }
        if let Some(block) = &self.vendor_block {
            mark(&block.span);
        }

        let mut gaps = Vec::new();
        let mut start = None;
        for (i, &u) in used.iter().enumerate() {
            match (u, start) {
                (false, None) => start = Some(i),
                (true, Some(s)) => {
                    gaps.push(ByteSpan::new(s, i - 1));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            gaps.push(ByteSpan::new(s, self.image_len - 1));
        }
        gaps
    }

    /// One line per field, `offset-range  name  raw-hex  value`, in offset order.
    pub fn field_map(&self) -> Vec<String> {
        let mut fields: Vec<&DecodedField> = self.fields.iter().collect();
        fields.sort_by_key(|f| (f.first_offset(), f.last_offset()));
        fields
            .iter()
            .map(|f| {
                format!(
                    "{:03}-{:03}  {:<28} {:<24} {}",
                    f.first_offset(),
                    f.last_offset(),
                    f.name,
                    codec::hex(&f.raw),
                    f.value
                )
            })
            .collect()
    }
}

/// Accumulates fields and warnings while a generation decoder runs.
pub struct RecordBuilder<'a> {
    src: &'a ByteSource,
    vendors: &'a VendorTable,
    fields: Vec<DecodedField>,
    warnings: Vec<Warning>,
    module_manufacturer: Option<ManufacturerId>,
    capacity_bytes: Option<u64>,
    timings: Option<TimingReport>,
    xmp: Option<XmpBlock>,
    vendor_block: Option<VendorBlock>,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(src: &'a ByteSource, vendors: &'a VendorTable) -> Self {
        RecordBuilder {
            src,
            vendors,
            fields: Vec::new(),
            warnings: Vec::new(),
            module_manufacturer: None,
            capacity_bytes: None,
            timings: None,
            xmp: None,
            vendor_block: None,
        }
    }

    pub fn source(&self) -> &'a ByteSource {
        self.src
    }

    pub fn vendors(&self) -> &'a VendorTable {
        self.vendors
    }

    /// Decode one spec and keep the result.
    pub fn apply(&mut self, spec: &FieldSpec) -> SpdResult<()> {
        let (field, warning) = spec.decode(self.src, self.vendors)?;
        self.fields.push(field);
        self.warnings.extend(warning);
        Ok(())
    }

    /// Decode a whole table.
    pub fn apply_all(&mut self, specs: &[FieldSpec]) -> SpdResult<()> {
        specs.iter().try_for_each(|s| self.apply(s))
    }

    /// Add a value computed from several spans.
    pub fn derived(
        &mut self,
        name: &str,
        category: Category,
        spans: Vec<ByteSpan>,
        value: FieldValue,
        unit: Option<&str>,
    ) -> SpdResult<()> {
        let field = DecodedField::derived(name, category, spans, self.src, value, unit)?;
        self.fields.push(field);
        Ok(())
    }

    pub fn warn(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    pub fn extend_warnings(&mut self, warnings: impl IntoIterator<Item = Warning>) {
        self.warnings.extend(warnings);
    }

    pub fn set_module_manufacturer(&mut self, id: ManufacturerId) {
        self.module_manufacturer = (!id.is_blank()).then_some(id);
    }

    pub fn set_capacity(&mut self, bytes: u64) {
        self.capacity_bytes = Some(bytes);
    }

    pub fn set_timings(&mut self, report: TimingReport) {
        self.timings = Some(report);
    }

    pub fn set_xmp(&mut self, xmp: XmpBlock) {
        self.xmp = Some(xmp);
    }

    pub fn set_vendor_block(&mut self, block: VendorBlock) {
        self.vendor_block = Some(block);
    }

    /// Assemble the record. Checksum results are attached by the caller.
    pub fn finish(self, classification: &Classification) -> ModuleRecord {
        ModuleRecord {
            generation: classification.generation,
            sub_type: classification.sub_type,
            image_len: self.src.len(),
            module_manufacturer: self.module_manufacturer,
            capacity_bytes: self.capacity_bytes,
            fields: self.fields,
            timings: self.timings,
            xmp: self.xmp,
            vendor_block: self.vendor_block,
            crc: Vec::new(),
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::DecodeRule;

    fn record() -> ModuleRecord {
        let mut bytes = vec![0u8; 128];
        bytes[2] = 0x08;
        bytes[20] = 0x02;
        bytes[73..77].copy_from_slice(b"ABCD");
        let src = ByteSource::load(bytes).unwrap();
        let vendors = VendorTable::empty();
        let mut b = RecordBuilder::new(&src, &vendors);
        b.apply_all(&[
            FieldSpec::byte("Memory Type", Category::Identity, 2, DecodeRule::Integer),
            FieldSpec::byte("Module Type", Category::Identity, 20, DecodeRule::Integer),
            FieldSpec::bytes("Part Number", Category::Manufacturer, 73, 18, DecodeRule::Ascii),
        ])
        .unwrap();
        b.derived(
            "Capacity",
            Category::Capacity,
            vec![ByteSpan::single(5), ByteSpan::single(31)],
            FieldValue::Text("1 GB".into()),
            None,
        )
        .unwrap();
        let classification = Classification {
            generation: Generation::Ddr2,
            sub_type: SubType::Udimm,
            module_type_code: 0x02,
        };
        b.finish(&classification)
    }

    #[test]
    fn test_field_lookup() {
        let r = record();
        assert_eq!(r.value("Part Number"), Some(&FieldValue::Text("ABCD".into())));
        assert_eq!(r.fields_at(80).len(), 1);
        assert_eq!(r.fields_at(31)[0].name, "Capacity");
        assert!(r.fields_at(100).is_empty());
        assert_eq!(r.category(Category::Identity).count(), 2);
    }

    #[test]
    fn test_undecoded_gaps() {
        let r = record();
        assert_eq!(
            r.undecoded_gaps(),
            vec![
                ByteSpan::new(0, 1),
                ByteSpan::new(3, 4),
                ByteSpan::new(6, 19),
                ByteSpan::new(21, 30),
                ByteSpan::new(32, 72),
                ByteSpan::new(91, 127),
            ]
        );
    }

    #[test]
    fn test_field_map_sorted() {
        let lines = record().field_map();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("002-002  Memory Type"));
        assert!(lines[1].starts_with("005-031  Capacity"));
        assert!(lines[3].starts_with("073-090  Part Number"));
        assert!(lines[3].ends_with("ABCD"));
    }

    #[test]
    fn test_vendor_block_code() {
        let block = VendorBlock {
            name: "HP SmartMemory".into(),
            span: ByteSpan::new(176, 183),
            code: vec![0xDE, 0xAD, 0xBE, 0xEF],
        };
        assert_eq!(block.code_u32(), 0xDEAD_BEEF);
    }
}
