//! Immutable, bounds-checked SPD byte buffer.

use crate::image::error::{SpdError, SpdResult};
use std::fs;
use std::path::Path;
use tracing::debug;

/// DDR2 SPD image size.
pub const DDR2_SIZE: usize = 128;
/// DDR3 SPD image size.
pub const DDR3_SIZE: usize = 256;
/// DDR4 SPD image size.
pub const DDR4_SIZE: usize = 512;

/// Image sizes accepted at load time.
pub const KNOWN_SIZES: [usize; 3] = [DDR2_SIZE, DDR3_SIZE, DDR4_SIZE];

/// A loaded SPD image. The length is validated once and the bytes are never
/// mutated; patching builds a new source via [`ByteSource::with_bytes`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ByteSource {
    bytes: Box<[u8]>,
}

impl ByteSource {
    /// Wrap a raw image buffer.
    pub fn load(bytes: impl Into<Vec<u8>>) -> SpdResult<Self> {
        let bytes = bytes.into();
        if !KNOWN_SIZES.contains(&bytes.len()) {
            return Err(SpdError::format(
                bytes.len(),
                "expected 128 (DDR2), 256 (DDR3) or 512 (DDR4) bytes",
            ));
        }
        Ok(ByteSource {
            bytes: bytes.into_boxed_slice(),
        })
    }

    /// Read an image file. Binary files of a known size load directly; anything
    /// else is parsed as a `0xNN` text dump.
    pub fn open(path: impl AsRef<Path>) -> SpdResult<Self> {
        let path = path.as_ref();
        let raw = fs::read(path)?;
        if KNOWN_SIZES.contains(&raw.len()) {
            debug!("Loaded {} byte binary image from {}", raw.len(), path.display());
            return Self::load(raw);
        }

        let text = String::from_utf8_lossy(&raw);
        let parsed = parse_hex_tokens(&text);
        if parsed.is_empty() {
            return Err(SpdError::format(
                raw.len(),
                format!("{} is neither a binary image nor a text hex dump", path.display()),
            ));
        }
        debug!("Parsed {} bytes from text dump {}", parsed.len(), path.display());
        Self::load(parsed)
    }

    /// Parse a text dump made of `0xNN` tokens; other text is ignored.
    pub fn from_hex_text(text: &str) -> SpdResult<Self> {
        Self::load(parse_hex_tokens(text))
    }

    /// Image length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false for a loaded image; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Read `width` bytes starting at `offset`.
    pub fn read(&self, offset: usize, width: usize) -> SpdResult<&[u8]> {
        let end = offset
            .checked_add(width)
            .ok_or_else(|| SpdError::out_of_range(offset, width, self.len()))?;
        self.bytes
            .get(offset..end)
            .ok_or_else(|| SpdError::out_of_range(offset, width, self.len()))
    }

    /// Read a single byte.
    pub fn byte(&self, offset: usize) -> SpdResult<u8> {
        self.bytes
            .get(offset)
            .copied()
            .ok_or_else(|| SpdError::out_of_range(offset, 1, self.len()))
    }

    /// Read a little-endian u16.
    pub fn read_u16_le(&self, offset: usize) -> SpdResult<u16> {
        let b = self.read(offset, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read a little-endian integer of up to 8 bytes.
    pub fn read_uint_le(&self, offset: usize, width: usize) -> SpdResult<u64> {
        if width > 8 {
            return Err(SpdError::InvalidParameter(format!(
                "integer width {} exceeds 8 bytes",
                width
            )));
        }
        let b = self.read(offset, width)?;
        Ok(b.iter()
            .rev()
            .fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte)))
    }

    /// Extract `bit_width` bits starting at `bit_offset` (LSB = 0) of one byte.
    pub fn bits(&self, offset: usize, bit_offset: u8, bit_width: u8) -> SpdResult<u8> {
        if bit_offset >= 8 || bit_width == 0 || bit_offset + bit_width > 8 {
            return Err(SpdError::InvalidParameter(format!(
                "bit range {}+{} does not fit in a byte",
                bit_offset, bit_width
            )));
        }
        Ok(crate::codec::bits(self.byte(offset)?, bit_offset, bit_width))
    }

    /// New source with `data` written at `offset`. `self` is left untouched.
    pub fn with_bytes(&self, offset: usize, data: &[u8]) -> SpdResult<ByteSource> {
        let end = offset
            .checked_add(data.len())
            .filter(|&end| end <= self.len())
            .ok_or_else(|| SpdError::out_of_range(offset, data.len(), self.len()))?;
        let mut bytes = self.bytes.to_vec();
        bytes[offset..end].copy_from_slice(data);
        Ok(ByteSource {
            bytes: bytes.into_boxed_slice(),
        })
    }
}

impl AsRef<[u8]> for ByteSource {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Collect every `0x` followed by one or two hex digits.
fn parse_hex_tokens(text: &str) -> Vec<u8> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i + 1 < chars.len() {
        if chars[i] == '0' && matches!(chars.get(i + 1), Some('x') | Some('X')) {
            let digits: String = chars[i + 2..]
                .iter()
                .take(2)
                .take_while(|c| c.is_ascii_hexdigit())
                .collect();
            if let Ok(v) = u8::from_str_radix(&digits, 16) {
                out.push(v);
                i += 2 + digits.len();
                continue;
            }
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_rejects_unknown_length() {
        for len in [0usize, 127, 255, 384, 1024] {
            match ByteSource::load(vec![0u8; len]).unwrap_err() {
                SpdError::Format { len: l, .. } => assert_eq!(l, len),
                other => panic!("Expected Format, got: {:?}", other),
            }
        }
    }

    #[test]
    fn test_read_bounds() {
        let src = ByteSource::load(vec![0xAA; 128]).unwrap();
        assert_eq!(src.read(120, 8).unwrap().len(), 8);
        assert!(matches!(
            src.read(121, 8),
            Err(SpdError::OutOfRange { offset: 121, width: 8, len: 128 })
        ));
        assert!(src.byte(128).is_err());
        assert!(src.read(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_integer_reads() {
        let mut bytes = vec![0u8; 256];
        bytes[126] = 0x34;
        bytes[127] = 0x12;
        bytes[122..126].copy_from_slice(&[0x78, 0x56, 0x34, 0x12]);
        bytes[5] = 0b0001_1010;
        let src = ByteSource::load(bytes).unwrap();
        assert_eq!(src.read_u16_le(126).unwrap(), 0x1234);
        assert_eq!(src.read_uint_le(122, 4).unwrap(), 0x1234_5678);
        assert_eq!(src.bits(5, 0, 3).unwrap(), 0b010);
        assert_eq!(src.bits(5, 3, 3).unwrap(), 0b011);
        assert!(src.bits(5, 6, 3).is_err());
    }

    #[test]
    fn test_with_bytes_leaves_original() {
        let src = ByteSource::load(vec![0u8; 256]).unwrap();
        let patched = src.with_bytes(176, b"HPT\0").unwrap();
        assert_eq!(&patched.as_bytes()[176..180], b"HPT\0");
        assert!(src.as_bytes().iter().all(|&b| b == 0));
        assert!(src.with_bytes(254, b"abc").is_err());
    }

    #[test]
    fn test_from_hex_text() {
        let text: String = (0..128).map(|i| format!("0x{:02X}, ", i)).collect();
        let src = ByteSource::from_hex_text(&text).unwrap();
        assert_eq!(src.len(), 128);
        assert_eq!(src.byte(127).unwrap(), 127);

        assert!(ByteSource::from_hex_text("0x01 0x02").is_err());
    }

    #[test]
    fn test_parse_hex_tokens_single_digit() {
        assert_eq!(parse_hex_tokens("0x1 0xAB junk 0Xf"), vec![0x01, 0xAB, 0x0F]);
        assert!(parse_hex_tokens("0x").is_empty());
    }

    #[test]
    fn test_open_binary_and_text() {
        let mut bin = NamedTempFile::new().unwrap();
        bin.write_all(&[0x11u8; 256]).unwrap();
        bin.flush().unwrap();
        let src = ByteSource::open(bin.path()).unwrap();
        assert_eq!(src.len(), 256);

        let mut txt = NamedTempFile::new().unwrap();
        let dump: String = (0..512).map(|i| format!("0x{:02x}\n", i % 256)).collect();
        txt.write_all(dump.as_bytes()).unwrap();
        txt.flush().unwrap();
        let src = ByteSource::open(txt.path()).unwrap();
        assert_eq!(src.len(), 512);
        assert_eq!(src.byte(257).unwrap(), 1);
    }

    #[test]
    fn test_open_garbage() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"hello").unwrap();
        f.flush().unwrap();
        assert!(matches!(ByteSource::open(f.path()), Err(SpdError::Format { len: 5, .. })));
        assert!(matches!(
            ByteSource::open("/nonexistent/spd.bin"),
            Err(SpdError::Io(_))
        ));
    }
}
