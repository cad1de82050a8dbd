//! Stateless field primitives and JEDEC unit conversions.

/// Extract `width` bits starting at `offset` (LSB = 0).
pub fn bits(byte: u8, offset: u8, width: u8) -> u8 {
    let mask = if width >= 8 { 0xFF } else { (1u8 << width) - 1 };
    (byte >> offset) & mask
}

/// Decode a packed BCD byte. `None` when either nibble is above 9.
pub fn bcd(byte: u8) -> Option<u8> {
    let (hi, lo) = (byte >> 4, byte & 0x0F);
    if hi > 9 || lo > 9 {
        return None;
    }
    Some(hi * 10 + lo)
}

/// Printable ASCII with padding (spaces, NUL, 0xFF) trimmed from the end.
/// Non-printable bytes inside the string become `.`.
pub fn ascii(bytes: &[u8]) -> String {
    let end = bytes
        .iter()
        .rposition(|&b| !matches!(b, 0x00 | 0x20 | 0xFF))
        .map_or(0, |p| p + 1);
    bytes[..end]
        .iter()
        .map(|&b| if (0x20..=0x7E).contains(&b) { b as char } else { '.' })
        .collect()
}

/// Space-separated upper-case hex.
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Two's-complement reinterpretation of a fine-timebase byte.
pub fn signed(byte: u8) -> i8 {
    byte as i8
}

/// 12-bit value from an upper nibble and an LSB byte.
pub fn u12(upper_nibble: u8, lsb: u8) -> u16 {
    (u16::from(upper_nibble & 0x0F) << 8) | u16::from(lsb)
}

/// Medium/fine timebase pair, both in picoseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timebase {
    pub mtb_ps: f64,
    pub ftb_ps: f64,
}

impl Timebase {
    /// 125 ps MTB with 1 ps FTB, the value every shipping DDR3/DDR4 part uses.
    pub const STANDARD: Timebase = Timebase {
        mtb_ps: 125.0,
        ftb_ps: 1.0,
    };

    /// Build from DDR3 dividend/divisor bytes. `None` when a divisor is zero.
    pub fn from_ratios(mtb_dividend: u8, mtb_divisor: u8, ftb_byte: u8) -> Option<Self> {
        let ftb_dividend = ftb_byte >> 4;
        let ftb_divisor = ftb_byte & 0x0F;
        if mtb_divisor == 0 || ftb_divisor == 0 || mtb_dividend == 0 {
            return None;
        }
        Some(Timebase {
            mtb_ps: f64::from(mtb_dividend) * 1000.0 / f64::from(mtb_divisor),
            ftb_ps: f64::from(ftb_dividend) / f64::from(ftb_divisor),
        })
    }

    /// `MTB_raw * MTB + FTB_raw * FTB`, rounded to whole picoseconds.
    pub fn ps(&self, mtb_raw: u32, ftb_raw: i8) -> i64 {
        (f64::from(mtb_raw) * self.mtb_ps + f64::from(ftb_raw) * self.ftb_ps).round() as i64
    }
}

/// Picoseconds to nanoseconds.
pub fn ps_to_ns(ps: i64) -> f64 {
    ps as f64 / 1000.0
}

/// DDR3 SDRAM density code (byte 4 bits 3:0) to bits per die.
pub fn ddr3_density_bits(code: u8) -> Option<u64> {
    (code <= 6).then(|| (256u64 << 20) << code)
}

/// DDR4 SDRAM density code (byte 4 bits 3:0) to bits per die.
pub fn ddr4_density_bits(code: u8) -> Option<u64> {
    match code {
        0..=7 => Some((256u64 << 20) << code),
        8 => Some(12u64 << 30),
        9 => Some(24u64 << 30),
        _ => None,
    }
}

/// Module capacity from die density and organization.
pub fn module_capacity_bytes(die_bits: u64, bus_width: u32, device_width: u32, ranks: u32) -> u64 {
    if device_width == 0 {
        return 0;
    }
    die_bits / 8 * u64::from(bus_width / device_width) * u64::from(ranks)
}

/// Human-readable size with binary units, e.g. `2 GB`, `512 MB`.
pub fn format_size(bytes: u64) -> String {
    const MB: u64 = 1 << 20;
    const GB: u64 = 1 << 30;
    if bytes >= GB && bytes % GB == 0 {
        format!("{} GB", bytes / GB)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else {
        format!("{} MB", bytes / MB)
    }
}

/// Supported CAS latencies from a little-endian bitmap whose bit 0 is `first_cl`.
pub fn cas_bitmap(bytes: &[u8], first_cl: u32) -> Vec<u32> {
    let mut out = Vec::new();
    for (i, &b) in bytes.iter().enumerate() {
        for bit in 0..8u32 {
            if b & (1 << bit) != 0 {
                out.push(first_cl + i as u32 * 8 + bit);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits() {
        assert_eq!(bits(0b1011_0110, 0, 3), 0b110);
        assert_eq!(bits(0b1011_0110, 4, 4), 0b1011);
        assert_eq!(bits(0xFF, 0, 8), 0xFF);
    }

    #[test]
    fn test_bcd() {
        assert_eq!(bcd(0x15), Some(15));
        assert_eq!(bcd(0x09), Some(9));
        assert_eq!(bcd(0x1A), None);
    }

    #[test]
    fn test_ascii_trims_padding() {
        assert_eq!(ascii(b"KHX1600C9D3/4G    "), "KHX1600C9D3/4G");
        assert_eq!(ascii(b"M378B5273DH0\0\0\xFF"), "M378B5273DH0");
        assert_eq!(ascii(b"AB\x01C  "), "AB.C");
        assert_eq!(ascii(&[0u8; 4]), "");
    }

    #[test]
    fn test_timebase() {
        let tb = Timebase::from_ratios(1, 8, 0x11).unwrap();
        assert_eq!(tb, Timebase::STANDARD);
        assert_eq!(tb.ps(0x0A, 0), 1250);
        assert_eq!(tb.ps(7, signed(0xD6)), 833);
        assert_eq!(tb.ps(0x6B, signed(0xC9)), 13320);
        assert!(Timebase::from_ratios(1, 0, 0x11).is_none());
    }

    #[test]
    fn test_density_tables() {
        assert_eq!(ddr3_density_bits(0x02), Some(1 << 30));
        assert_eq!(ddr3_density_bits(0x03), Some(2 << 30));
        assert_eq!(ddr3_density_bits(0x07), None);
        assert_eq!(ddr4_density_bits(0x05), Some(8 << 30));
        assert_eq!(ddr4_density_bits(0x08), Some(12 << 30));
    }

    #[test]
    fn test_capacity_and_format() {
        let bytes = module_capacity_bytes(1 << 30, 64, 8, 2);
        assert_eq!(format_size(bytes), "2 GB");
        assert_eq!(format_size(512 << 20), "512 MB");
        assert_eq!(format_size(3 << 29), "1.50 GB");
    }

    #[test]
    fn test_cas_bitmap() {
        assert_eq!(cas_bitmap(&[0xFE, 0x00], 4), vec![5, 6, 7, 8, 9, 10, 11]);
        assert_eq!(cas_bitmap(&[0x00, 0x01], 4), vec![12]);
    }
}
