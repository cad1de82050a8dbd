//! Built-in manufacturer table.
//!
//! Covers the module assemblers, DRAM makers and register/buffer vendors most
//! often seen in DDR2/DDR3/DDR4 SPD dumps. Callers can merge larger tables
//! loaded from disk on top of this one.

/// A known manufacturer entry.
pub struct KnownVendor {
    pub bank: u8,
    pub code: u8,
    pub name: &'static str,
}

/// Known manufacturers, keyed by (bank, code).
pub static BUILTIN_VENDORS: &[KnownVendor] = &[
    // -- Bank 0 --
    KnownVendor { bank: 0, code: 0x04, name: "HP Inc." },
    KnownVendor { bank: 0, code: 0x1C, name: "Mitsubishi" },
    KnownVendor { bank: 0, code: 0x2C, name: "Micron Technology" },
    KnownVendor { bank: 0, code: 0x2D, name: "SK Hynix (Hyundai)" },
    KnownVendor { bank: 0, code: 0x33, name: "IDT (Integrated Device Technology)" },
    KnownVendor { bank: 0, code: 0x4E, name: "Samsung" },
    KnownVendor { bank: 0, code: 0x54, name: "Hewlett-Packard (HP)" },
    KnownVendor { bank: 0, code: 0x98, name: "Kingston" },
    KnownVendor { bank: 0, code: 0xAD, name: "SK hynix" },
    KnownVendor { bank: 0, code: 0xCE, name: "Samsung" },
    KnownVendor { bank: 0, code: 0xFE, name: "ELPIDA" },
    // -- Bank 1 --
    KnownVendor { bank: 1, code: 0x0D, name: "Patriot Scientific" },
    KnownVendor { bank: 1, code: 0x2C, name: "Micron Technology" },
    KnownVendor { bank: 1, code: 0x32, name: "Mushkin Enhanced Memory" },
    KnownVendor { bank: 1, code: 0x98, name: "Kingston" },
    KnownVendor { bank: 1, code: 0x9E, name: "Corsair" },
    // -- Bank 2 --
    KnownVendor { bank: 2, code: 0x1E, name: "Corsair" },
    KnownVendor { bank: 2, code: 0x4D, name: "G.Skill Intl" },
    KnownVendor { bank: 2, code: 0x7E, name: "Elpida (now Micron)" },
    KnownVendor { bank: 2, code: 0x9B, name: "G.Skill" },
    KnownVendor { bank: 2, code: 0x9E, name: "Corsair" },
    // -- Bank 3 --
    KnownVendor { bank: 3, code: 0x02, name: "Patriot Memory" },
    KnownVendor { bank: 3, code: 0x1B, name: "Crucial Technology" },
    KnownVendor { bank: 3, code: 0x4B, name: "A-DATA Technology" },
    KnownVendor { bank: 3, code: 0x51, name: "Qimonda" },
    KnownVendor { bank: 3, code: 0x6F, name: "Team Group Inc." },
    // -- Bank 4 --
    KnownVendor { bank: 4, code: 0x33, name: "IDT (Integrated Device Technology)" },
    KnownVendor { bank: 4, code: 0x51, name: "Qimonda" },
    // -- Bank 5 --
    KnownVendor { bank: 5, code: 0x9B, name: "G.Skill" },
];

/// Look up a manufacturer name in the built-in table.
pub fn find_builtin(bank: u8, code: u8) -> Option<&'static str> {
    BUILTIN_VENDORS
        .iter()
        .find(|v| v.bank == bank && v.code == code)
        .map(|v| v.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_builtin() {
        assert_eq!(find_builtin(0, 0x2C), Some("Micron Technology"));
        assert_eq!(find_builtin(1, 0x98), Some("Kingston"));
        assert_eq!(find_builtin(7, 0x01), None);
    }

    #[test]
    fn test_no_duplicate_keys() {
        for (i, a) in BUILTIN_VENDORS.iter().enumerate() {
            for b in &BUILTIN_VENDORS[i + 1..] {
                assert!(
                    !(a.bank == b.bank && a.code == b.code),
                    "duplicate entry for bank {} code {:#04x}",
                    a.bank,
                    a.code
                );
            }
        }
    }
}
