//! Static rule data for decoding, validation and patching.
//!
//! These tables encode JEDEC standard speed bins, the checksum slots each
//! generation carries, and the named byte ranges a patch can copy.

pub mod crc_rules;
pub mod selections;
pub mod speed_bins;
