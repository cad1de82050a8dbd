//! JEP-106 manufacturer identification for SPD images.
//!
//! Memory-module SPD data names the module and DRAM makers with JEDEC JEP-106
//! codes: a bank (number of `0x7F` continuation codes) plus a code byte. This
//! crate provides:
//!
//! - [`ManufacturerId`] decoding from the two layouts SPD images use
//!   (DDR3/DDR4 byte pairs, DDR2 continuation runs)
//! - A built-in [`VendorTable`] of common module and DRAM makers
//! - Loading of additional tables from `.json` and `.json.xz` files
//!
//! # Example
//!
//! ```rust,ignore
//! use jep106::{ManufacturerId, VendorTable};
//!
//! let table = VendorTable::builtin();
//! let id = ManufacturerId::from_spd_pair(0x01, 0x98);
//! assert_eq!(table.describe(id), "Kingston (Bank 1, Code 0x98)");
//! ```

pub mod builtin;
pub mod error;
pub mod parser;
pub mod types;

// Re-export key types at crate root.
pub use error::{VendorError, VendorResult};
pub use parser::{parse_vendor_bytes, parse_vendor_file, parse_vendor_str};
pub use types::{ManufacturerId, VendorEntry, VendorFile, VendorTable};
