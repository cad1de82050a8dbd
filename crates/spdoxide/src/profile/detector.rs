//! Module type detection.
//!
//! Classification reads two fixed offsets:
//! - byte 2 (memory type) selects the generation, and the image length must
//!   match that generation's SPD size
//! - the module-type byte (DDR2 byte 20, DDR3/DDR4 byte 3 bits 3:0) selects
//!   the sub-type
//!
//! Unknown codes are errors rather than guesses: decoding a layout against
//! the wrong table produces plausible-looking garbage.

use crate::image::source::{DDR2_SIZE, DDR3_SIZE, DDR4_SIZE};
use crate::image::{ByteSource, SpdError, SpdResult};
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

/// Offset of the memory-type byte in every generation.
pub const MEMORY_TYPE_OFFSET: usize = 2;

/// DRAM generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Generation {
    #[serde(rename = "DDR2")]
    Ddr2,
    #[serde(rename = "DDR3")]
    Ddr3,
    #[serde(rename = "DDR4")]
    Ddr4,
}

impl Generation {
    /// Value of SPD byte 2.
    pub fn type_code(self) -> u8 {
        match self {
            Generation::Ddr2 => 0x08,
            Generation::Ddr3 => 0x0B,
            Generation::Ddr4 => 0x0C,
        }
    }

    pub fn from_type_code(code: u8) -> Option<Self> {
        match code {
            0x08 => Some(Generation::Ddr2),
            0x0B => Some(Generation::Ddr3),
            0x0C => Some(Generation::Ddr4),
            _ => None,
        }
    }

    /// SPD image size for this generation.
    pub fn image_len(self) -> usize {
        match self {
            Generation::Ddr2 => DDR2_SIZE,
            Generation::Ddr3 => DDR3_SIZE,
            Generation::Ddr4 => DDR4_SIZE,
        }
    }

    /// Offset of the module-type byte.
    pub fn module_type_offset(self) -> usize {
        match self {
            Generation::Ddr2 => 20,
            Generation::Ddr3 | Generation::Ddr4 => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Generation::Ddr2 => "DDR2",
            Generation::Ddr3 => "DDR3",
            Generation::Ddr4 => "DDR4",
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Module form factor / buffering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SubType {
    Udimm,
    SoDimm,
    Rdimm,
    Lrdimm,
    MicroDimm,
    MiniRdimm,
    MiniUdimm,
    /// 72-bit SO-RDIMM.
    SoRdimm,
    /// 72-bit SO-UDIMM.
    SoUdimm,
    /// Code accepted only when strict sub-type checking is off.
    Unknown(u8),
}

impl SubType {
    /// Registered or load-reduced (carries a register/buffer block).
    pub fn is_registered(self) -> bool {
        matches!(
            self,
            SubType::Rdimm | SubType::MiniRdimm | SubType::SoRdimm | SubType::Lrdimm
        )
    }

    /// Unbuffered form factors.
    pub fn is_unbuffered(self) -> bool {
        matches!(
            self,
            SubType::Udimm | SubType::SoDimm | SubType::MicroDimm | SubType::MiniUdimm | SubType::SoUdimm
        )
    }

    pub fn name(self) -> String {
        match self {
            SubType::Udimm => "UDIMM".into(),
            SubType::SoDimm => "SO-DIMM".into(),
            SubType::Rdimm => "RDIMM".into(),
            SubType::Lrdimm => "LRDIMM".into(),
            SubType::MicroDimm => "Micro-DIMM".into(),
            SubType::MiniRdimm => "Mini-RDIMM".into(),
            SubType::MiniUdimm => "Mini-UDIMM".into(),
            SubType::SoRdimm => "72b-SO-RDIMM".into(),
            SubType::SoUdimm => "72b-SO-UDIMM".into(),
            SubType::Unknown(code) => format!("Unknown ({:#04x})", code),
        }
    }
}

impl fmt::Display for SubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Detector output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Classification {
    pub generation: Generation,
    pub sub_type: SubType,
    /// Raw module-type byte (DDR3/DDR4 masked to bits 3:0).
    pub module_type_code: u8,
}

/// Map a module-type code to a sub-type.
pub fn sub_type_for(generation: Generation, code: u8) -> Option<SubType> {
    match generation {
        Generation::Ddr2 => match code {
            0x01 => Some(SubType::Rdimm),
            0x02 => Some(SubType::Udimm),
            0x04 => Some(SubType::SoDimm),
            0x07 => Some(SubType::SoRdimm),
            0x08 => Some(SubType::MicroDimm),
            0x10 => Some(SubType::MiniRdimm),
            0x20 => Some(SubType::MiniUdimm),
            _ => None,
        },
        Generation::Ddr3 => match code & 0x0F {
            0x01 => Some(SubType::Rdimm),
            0x02 => Some(SubType::Udimm),
            0x03 => Some(SubType::SoDimm),
            0x04 => Some(SubType::MicroDimm),
            0x05 => Some(SubType::MiniRdimm),
            0x06 => Some(SubType::MiniUdimm),
            0x08 => Some(SubType::SoUdimm),
            0x09 => Some(SubType::SoRdimm),
            0x0B => Some(SubType::Lrdimm),
            _ => None,
        },
        Generation::Ddr4 => match code & 0x0F {
            0x01 => Some(SubType::Rdimm),
            0x02 => Some(SubType::Udimm),
            0x03 => Some(SubType::SoDimm),
            0x04 => Some(SubType::Lrdimm),
            0x05 => Some(SubType::MiniRdimm),
            0x06 => Some(SubType::MiniUdimm),
            0x08 => Some(SubType::SoRdimm),
            0x09 => Some(SubType::SoUdimm),
            _ => None,
        },
    }
}

/// Classify an image, rejecting unknown module-type codes.
pub fn detect(src: &ByteSource) -> SpdResult<Classification> {
    detect_with(src, true)
}

/// Classify an image. With `strict_sub_type` off, an unknown module-type
/// code yields [`SubType::Unknown`] instead of an error.
pub fn detect_with(src: &ByteSource, strict_sub_type: bool) -> SpdResult<Classification> {
    let type_code = src.byte(MEMORY_TYPE_OFFSET)?;
    let generation = Generation::from_type_code(type_code)
        .ok_or_else(|| SpdError::unsupported("memory type", MEMORY_TYPE_OFFSET, type_code))?;

    if src.len() != generation.image_len() {
        return Err(SpdError::format(
            src.len(),
            format!(
                "memory type {:#04x} ({}) requires {} bytes",
                type_code,
                generation,
                generation.image_len()
            ),
        ));
    }

    let offset = generation.module_type_offset();
    let raw = src.byte(offset)?;
    let module_type_code = match generation {
        Generation::Ddr2 => raw,
        Generation::Ddr3 | Generation::Ddr4 => raw & 0x0F,
    };

    let sub_type = match sub_type_for(generation, raw) {
        Some(s) => s,
        None if strict_sub_type => {
            return Err(SpdError::unsupported(
                format!("{} module type", generation),
                offset,
                module_type_code,
            ));
        }
        None => {
            warn!(
                "Unknown {} module type {:#04x} at byte {}, decoding common fields only",
                generation, module_type_code, offset
            );
            SubType::Unknown(module_type_code)
        }
    };

    debug!("Detected {} {} ({} bytes)", generation, sub_type, src.len());

    Ok(Classification {
        generation,
        sub_type,
        module_type_code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(len: usize, type_code: u8, module_offset: usize, module_code: u8) -> ByteSource {
        let mut bytes = vec![0u8; len];
        bytes[2] = type_code;
        bytes[module_offset] = module_code;
        ByteSource::load(bytes).unwrap()
    }

    #[test]
    fn test_detect_each_generation() {
        let c = detect(&image(128, 0x08, 20, 0x02)).unwrap();
        assert_eq!((c.generation, c.sub_type), (Generation::Ddr2, SubType::Udimm));

        let c = detect(&image(256, 0x0B, 3, 0x0B)).unwrap();
        assert_eq!((c.generation, c.sub_type), (Generation::Ddr3, SubType::Lrdimm));

        let c = detect(&image(512, 0x0C, 3, 0x01)).unwrap();
        assert_eq!((c.generation, c.sub_type), (Generation::Ddr4, SubType::Rdimm));
    }

    #[test]
    fn test_ddr3_hybrid_bits_ignored() {
        let c = detect(&image(256, 0x0B, 3, 0xF3)).unwrap();
        assert_eq!(c.sub_type, SubType::SoDimm);
        assert_eq!(c.module_type_code, 0x03);
    }

    #[test]
    fn test_unknown_memory_type() {
        match detect(&image(256, 0x12, 3, 0x02)).unwrap_err() {
            SpdError::UnsupportedGeneration { offset, code, .. } => {
                assert_eq!(offset, 2);
                assert_eq!(code, 0x12);
            }
            other => panic!("Expected UnsupportedGeneration, got: {:?}", other),
        }
    }

    #[test]
    fn test_length_mismatch_is_format_error() {
        assert!(matches!(
            detect(&image(256, 0x0C, 3, 0x02)),
            Err(SpdError::Format { len: 256, .. })
        ));
        assert!(matches!(
            detect(&image(512, 0x0B, 3, 0x02)),
            Err(SpdError::Format { len: 512, .. })
        ));
    }

    #[test]
    fn test_unknown_module_type_strict_and_lenient() {
        let src = image(256, 0x0B, 3, 0x0E);
        match detect(&src).unwrap_err() {
            SpdError::UnsupportedGeneration { offset, code, .. } => {
                assert_eq!(offset, 3);
                assert_eq!(code, 0x0E);
            }
            other => panic!("Expected UnsupportedGeneration, got: {:?}", other),
        }

        let c = detect_with(&src, false).unwrap();
        assert_eq!(c.sub_type, SubType::Unknown(0x0E));
    }

    #[test]
    fn test_sub_type_groups() {
        assert!(SubType::Lrdimm.is_registered());
        assert!(SubType::SoDimm.is_unbuffered());
        assert!(!SubType::Unknown(0).is_registered());
        assert!(!SubType::Unknown(0).is_unbuffered());
    }
}
