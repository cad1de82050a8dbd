//! Generation decoders and the registry that selects them.
//!
//! Each generation implements [`GenerationDecoder`] with its own field-spec
//! tables. The [`DecoderRegistry`] maps a classification to a decoder; new
//! generations or sub-type overrides are added by registering, not by editing
//! a dispatch function.

pub mod common;
pub mod ddr2;
pub mod ddr3;
pub mod ddr4;

use crate::config::DecodeOptions;
use crate::crc;
use crate::field::FieldSpec;
use crate::image::{ByteSource, SpdError, SpdResult};
use crate::profile::{detect_with, Classification, Generation, SubType, MEMORY_TYPE_OFFSET};
use crate::record::ModuleRecord;
use jep106::VendorTable;
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub use ddr2::Ddr2Decoder;
pub use ddr3::Ddr3Decoder;
pub use ddr4::Ddr4Decoder;

/// Everything a decoder needs for one image.
pub struct DecodeContext<'a> {
    pub source: &'a ByteSource,
    pub classification: Classification,
    pub vendors: &'a VendorTable,
    pub options: &'a DecodeOptions,
}

/// One generation's decoder.
pub trait GenerationDecoder: Send + Sync {
    /// Generation this decoder handles.
    fn generation(&self) -> Generation;

    /// Field-spec tables applied for a sub-type, in decode order.
    fn field_specs(&self, sub_type: SubType) -> Vec<&'static [FieldSpec]>;

    /// Decode an image that has already been classified for this generation.
    /// Checksums are validated by the caller.
    fn decode(&self, ctx: &DecodeContext<'_>) -> SpdResult<ModuleRecord>;
}

/// Registry key. `sub_type: None` is the generation-wide default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecoderKey {
    pub generation: Generation,
    pub sub_type: Option<SubType>,
}

impl DecoderKey {
    pub fn generation(generation: Generation) -> Self {
        DecoderKey { generation, sub_type: None }
    }
}

/// Classification → decoder map.
#[derive(Default)]
pub struct DecoderRegistry {
    decoders: HashMap<DecoderKey, Box<dyn GenerationDecoder>>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the DDR2, DDR3 and DDR4 decoders.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_generation(Box::new(Ddr2Decoder));
        registry.register_generation(Box::new(Ddr3Decoder));
        registry.register_generation(Box::new(Ddr4Decoder));
        registry
    }

    /// Register under an explicit key, returning any decoder it replaces.
    pub fn register(
        &mut self,
        key: DecoderKey,
        decoder: Box<dyn GenerationDecoder>,
    ) -> Option<Box<dyn GenerationDecoder>> {
        debug!("Registering decoder for {} {:?}", key.generation, key.sub_type);
        self.decoders.insert(key, decoder)
    }

    /// Register as the default for the decoder's own generation.
    pub fn register_generation(&mut self, decoder: Box<dyn GenerationDecoder>) {
        let key = DecoderKey::generation(decoder.generation());
        self.register(key, decoder);
    }

    /// Exact sub-type match first, then the generation default.
    pub fn resolve(&self, classification: &Classification) -> Option<&dyn GenerationDecoder> {
        let exact = DecoderKey {
            generation: classification.generation,
            sub_type: Some(classification.sub_type),
        };
        self.decoders
            .get(&exact)
            .or_else(|| self.decoders.get(&DecoderKey::generation(classification.generation)))
            .map(|d| d.as_ref())
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

/// A decoded image together with the bytes it came from.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub source: ByteSource,
    pub record: ModuleRecord,
}

/// Detect, decode and validate SPD images.
pub struct SpdDecoder {
    registry: DecoderRegistry,
    vendors: VendorTable,
    options: DecodeOptions,
}

impl Default for SpdDecoder {
    fn default() -> Self {
        SpdDecoder {
            registry: DecoderRegistry::with_defaults(),
            vendors: VendorTable::builtin(),
            options: DecodeOptions::default(),
        }
    }
}

impl SpdDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder configured from options. A configured vendor table is loaded
    /// and merged over the built-in one.
    pub fn with_options(options: DecodeOptions) -> SpdResult<Self> {
        let mut vendors = VendorTable::builtin();
        if let Some(path) = &options.vendor_table {
            let extra = jep106::parse_vendor_file(path)?;
            info!("Merged {} vendor entries from {}", extra.len(), path.display());
            vendors.merge(extra);
        }
        Ok(SpdDecoder {
            registry: DecoderRegistry::with_defaults(),
            vendors,
            options,
        })
    }

    /// Replace the manufacturer lookup table.
    pub fn with_vendor_table(mut self, vendors: VendorTable) -> Self {
        self.vendors = vendors;
        self
    }

    pub fn registry_mut(&mut self) -> &mut DecoderRegistry {
        &mut self.registry
    }

    pub fn vendors(&self) -> &VendorTable {
        &self.vendors
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Classify an image under the configured strictness.
    pub fn classify(&self, src: &ByteSource) -> SpdResult<Classification> {
        detect_with(src, self.options.strict_sub_type)
    }

    /// Decode one image into a module record with checksum results attached.
    pub fn decode(&self, src: &ByteSource) -> SpdResult<ModuleRecord> {
        let classification = self.classify(src)?;
        let decoder = self.registry.resolve(&classification).ok_or_else(|| {
            SpdError::unsupported(
                "memory type",
                MEMORY_TYPE_OFFSET,
                classification.generation.type_code(),
            )
        })?;
        info!("Decoding {} {}", classification.generation, classification.sub_type);

        let ctx = DecodeContext {
            source: src,
            classification,
            vendors: &self.vendors,
            options: &self.options,
        };
        let mut record = decoder.decode(&ctx)?;

        let results = crc::validate(src, classification.generation, self.options.crc_algorithm_sweep);
        let crc_warnings = crc::warnings(&results);
        for w in &crc_warnings {
            warn!("{}", w);
        }
        record.warnings.extend(crc_warnings);
        record.crc = results;

        debug!(
            "Decoded {} fields, {} warnings",
            record.fields.len(),
            record.warnings.len()
        );
        Ok(record)
    }

    /// Decode and keep the source alongside the record.
    pub fn decode_image(&self, source: ByteSource) -> SpdResult<DecodedImage> {
        let record = self.decode(&source)?;
        Ok(DecodedImage { source, record })
    }

    /// Load raw bytes and decode them.
    pub fn decode_bytes(&self, bytes: impl Into<Vec<u8>>) -> SpdResult<DecodedImage> {
        self.decode_image(ByteSource::load(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Category, FieldValue};
    use crate::fixtures;
    use crate::image::Warning;
    use crate::record::RecordBuilder;
    use std::io::Write;
    use tempfile::NamedTempFile;

    struct MarkerDecoder;

    impl GenerationDecoder for MarkerDecoder {
        fn generation(&self) -> Generation {
            Generation::Ddr3
        }

        fn field_specs(&self, _sub_type: SubType) -> Vec<&'static [FieldSpec]> {
            Vec::new()
        }

        fn decode(&self, ctx: &DecodeContext<'_>) -> SpdResult<ModuleRecord> {
            let mut b = RecordBuilder::new(ctx.source, ctx.vendors);
            b.derived(
                "Marker",
                Category::Vendor,
                vec![crate::field::ByteSpan::single(0)],
                FieldValue::Flag(true),
                None,
            )?;
            Ok(b.finish(&ctx.classification))
        }
    }

    #[test]
    fn test_default_registry() {
        let registry = DecoderRegistry::with_defaults();
        assert_eq!(registry.len(), 3);
        let classification = Classification {
            generation: Generation::Ddr4,
            sub_type: SubType::Rdimm,
            module_type_code: 1,
        };
        let decoder = registry.resolve(&classification).unwrap();
        assert_eq!(decoder.generation(), Generation::Ddr4);
    }

    #[test]
    fn test_sub_type_override() {
        let mut decoder = SpdDecoder::new();
        decoder.registry_mut().register(
            DecoderKey {
                generation: Generation::Ddr3,
                sub_type: Some(SubType::Rdimm),
            },
            Box::new(MarkerDecoder),
        );

        let rdimm = decoder.decode(&ByteSource::load(fixtures::ddr3_rdimm()).unwrap()).unwrap();
        assert!(rdimm.field("Marker").is_some());

        let udimm = decoder.decode(&ByteSource::load(fixtures::ddr3_udimm()).unwrap()).unwrap();
        assert!(udimm.field("Marker").is_none());
        assert!(udimm.field("Module Part Number").is_some());
    }

    #[test]
    fn test_empty_registry_rejects() {
        let mut decoder = SpdDecoder::new();
        *decoder.registry_mut() = DecoderRegistry::new();
        let err = decoder.decode(&ByteSource::load(fixtures::ddr3_udimm()).unwrap()).unwrap_err();
        assert!(matches!(err, SpdError::UnsupportedGeneration { offset: 2, .. }));
    }

    #[test]
    fn test_crc_results_attached() {
        let decoded = SpdDecoder::new().decode_bytes(fixtures::ddr3_udimm()).unwrap();
        assert!(!decoded.record.crc.is_empty());
        assert!(crc::slot_passes(&decoded.record.crc, "base"));
        assert!(decoded
            .record
            .warnings
            .iter()
            .all(|w| !matches!(w, Warning::CrcMismatch { .. })));
    }

    #[test]
    fn test_corrupt_byte_warns() {
        let mut bytes = fixtures::ddr3_udimm();
        bytes[20] ^= 0x01;
        let record = SpdDecoder::new().decode(&ByteSource::load(bytes).unwrap()).unwrap();
        assert!(record
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::CrcMismatch { .. })));
    }

    #[test]
    fn test_decode_is_deterministic() {
        let decoder = SpdDecoder::new();
        let src = ByteSource::load(fixtures::ddr4_udimm()).unwrap();
        let a = serde_json::to_string(&decoder.decode(&src).unwrap()).unwrap();
        let b = serde_json::to_string(&decoder.decode(&src).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_options_vendor_table() {
        let mut tmp = NamedTempFile::with_suffix(".json").unwrap();
        write!(
            tmp,
            r#"{{"vendors": [{{"bank": 1, "code": 152, "name": "Kingston Technology"}}]}}"#
        )
        .unwrap();
        let options = DecodeOptions {
            vendor_table: Some(tmp.path().to_path_buf()),
            ..DecodeOptions::default()
        };
        let decoder = SpdDecoder::with_options(options).unwrap();
        let record = decoder.decode(&ByteSource::load(fixtures::ddr3_udimm()).unwrap()).unwrap();
        assert_eq!(
            record.value("Module Manufacturer"),
            Some(&FieldValue::Text("Kingston Technology (Bank 1, Code 0x98)".into()))
        );
    }

    #[test]
    fn test_options_missing_vendor_table() {
        let options = DecodeOptions {
            vendor_table: Some("/nonexistent/vendors.json".into()),
            ..DecodeOptions::default()
        };
        assert!(matches!(
            SpdDecoder::with_options(options),
            Err(SpdError::Vendor(_))
        ));
    }
}
