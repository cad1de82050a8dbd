//! Decoder, validator, patcher and differ for memory-module SPD EEPROM images.
//!
//! SPD (Serial Presence Detect) images describe a DIMM's organization, timings
//! and manufacturer. This crate reads raw DDR2 (128 byte), DDR3 (256 byte) and
//! DDR4 (512 byte) images and provides:
//!
//! - Generation and sub-type detection
//! - Field-by-field decoding into a serializable [`ModuleRecord`], with every
//!   field tied back to the bytes it came from
//! - Timing analysis (cycle counts, speed grade, JEDEC module name) and Intel
//!   XMP 1.x profiles for DDR3
//! - Checksum validation under every known coverage variant
//! - Patching selections between images with checksum repair
//! - Byte and field level diffs
//!
//! # Example
//!
//! ```rust,ignore
//! use spdoxide::{ByteSource, SpdDecoder};
//!
//! let src = ByteSource::open("dimm0.bin")?;
//! let record = SpdDecoder::new().decode(&src)?;
//! println!("{} {}", record.generation, record.sub_type);
//! for field in &record.fields {
//!     println!("{}: {}", field.name, field.value);
//! }
//! ```

pub mod codec;
pub mod config;
pub mod crc;
pub mod decoders;
pub mod diff;
pub mod field;
pub mod image;
pub mod patch;
pub mod profile;
pub mod record;
pub mod rules;
pub mod timing;
pub mod xmp;

#[cfg(test)]
mod fixtures;

// Re-export key types at crate root.
pub use config::DecodeOptions;
pub use crc::CrcCheckResult;
pub use decoders::{DecodedImage, DecoderKey, DecoderRegistry, GenerationDecoder, SpdDecoder};
pub use diff::{annotate, diff, AnnotatedMismatch, ByteMismatch, DiffReport};
pub use field::{ByteSpan, Category, DecodedField, FieldSpec, FieldValue};
pub use image::{ByteSource, SpdError, SpdResult, Warning};
pub use patch::{FileSink, PatchEngine, PatchOutcome, PatchPlan, PatchSink, Selection};
pub use profile::{detect, Classification, Generation, SubType};
pub use record::{ModuleRecord, VendorBlock};
pub use timing::TimingReport;
pub use xmp::{XmpBlock, XmpProfile};
