//! Synthetic SPD images shared by unit tests.

use crate::crc::rewrite;
use crate::profile::Generation;
use crate::rules::crc_rules::slots_for;

/// Recompute every declared checksum.
pub fn finalize(bytes: &mut [u8], generation: Generation) {
    for slot in slots_for(generation) {
        rewrite(slot, bytes);
    }
}

fn put(bytes: &mut [u8], offset: usize, data: &[u8]) {
    bytes[offset..offset + data.len()].copy_from_slice(data);
}

fn padded(text: &str, len: usize) -> Vec<u8> {
    let mut out = text.as_bytes().to_vec();
    out.resize(len, b' ');
    out
}

/// DDR3-1600 CL11 UDIMM, 4 GB, 2 ranks of x8 2 Gb dies, Kingston.
pub fn ddr3_udimm() -> Vec<u8> {
    let mut b = vec![0u8; 256];
    put(&mut b, 0, &[
        0x92, 0x11, 0x0B, 0x02, 0x03, 0x19, 0x00, 0x09, 0x03, 0x11, 0x01, 0x08, 0x0A, 0x00,
        0xFE, 0x00, 0x69, 0x78, 0x69, 0x30, 0x69, 0x11, 0x18, 0x81, 0x00, 0x05, 0x3C, 0x3C,
        0x00, 0xF0, 0x83, 0x05, 0x00, 0x00,
    ]);
    put(&mut b, 60, &[0x0F, 0x11, 0x01, 0x00]);
    put(&mut b, 117, &[0x01, 0x98, 0x01, 0x12, 0x34, 0x12, 0x34, 0x56, 0x78]);
    put(&mut b, 128, &padded("KVR16N11/4", 18));
    put(&mut b, 148, &[0x80, 0xAD]);
    finalize(&mut b, Generation::Ddr3);
    b
}

/// Same module with the 1.35 V bit set.
pub fn ddr3_low_voltage() -> Vec<u8> {
    let mut b = ddr3_udimm();
    b[6] = 0x02;
    finalize(&mut b, Generation::Ddr3);
    b
}

/// DDR3 UDIMM carrying one XMP 1.2 profile (DDR3-2000 9-9-9, 1.65 V, 2T).
pub fn ddr3_with_xmp() -> Vec<u8> {
    let mut b = ddr3_udimm();
    put(&mut b, 176, &[0x0C, 0x4A, 0x01, 0x12, 0x01, 0x08, 0x01, 0x08, 0x00]);
    put(&mut b, 185, &[
        0x2D, 0x08, 0x48, 0xFC, 0x00, 0x38, 0x48, 0x48, 0x78, 0x10, 0xC0, 0x08, 0xC0, 0xF3,
        0x00, 0x05, 0x3C, 0x30, 0x00, 0xF0, 0x3C, 0x00, 0x00, 0x10, 0x00,
    ]);
    finalize(&mut b, Generation::Ddr3);
    b
}

/// DDR3 UDIMM made by HP with an HP SmartMemory block.
pub fn ddr3_hp() -> Vec<u8> {
    let mut b = ddr3_udimm();
    put(&mut b, 117, &[0x80, 0x54]);
    put(&mut b, 128, &padded("HP647650-071", 18));
    put(&mut b, 176, b"HPT\0");
    put(&mut b, 180, &[0xDE, 0xAD, 0xBE, 0xEF]);
    put(&mut b, 184, &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
    finalize(&mut b, Generation::Ddr3);
    b
}

/// DDR3 RDIMM with ECC, one register.
pub fn ddr3_rdimm() -> Vec<u8> {
    let mut b = ddr3_udimm();
    b[3] = 0x01;
    b[8] = 0x0B;
    put(&mut b, 63, &[0x05, 0x80, 0x80, 0x33, 0x31, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
    finalize(&mut b, Generation::Ddr3);
    b
}

/// DDR4-2400 CL16 UDIMM, 8 GB, 1 rank of x8 8 Gb dies, Samsung.
pub fn ddr4_udimm() -> Vec<u8> {
    let mut b = vec![0u8; 512];
    put(&mut b, 0, &[
        0x23, 0x11, 0x0C, 0x02, 0x85, 0x21, 0x00, 0x08, 0x00, 0x60, 0x00, 0x03, 0x01, 0x03,
        0x80, 0x00, 0x00, 0x00, 0x07, 0x0D, 0xF8, 0x0F, 0x00, 0x00, 0x6B, 0x6B, 0x6B, 0x11,
        0x00, 0x6B, 0xF0, 0x0A, 0x20, 0x08, 0x00, 0x05, 0x00, 0xA8, 0x1B, 0x28, 0x28, 0x00,
        0x78, 0x00, 0x14, 0x3C,
    ]);
    put(&mut b, 117, &[0x00, 0x00, 0x00, 0xC9, 0xC9, 0xC9, 0xC9, 0x00, 0xD6]);
    put(&mut b, 128, &[0x11, 0x01, 0x01, 0x00]);
    put(&mut b, 320, &[0x80, 0xCE, 0x01, 0x17, 0x22, 0x01, 0x02, 0x03, 0x04]);
    put(&mut b, 329, &padded("M378A1K43CB2-CRC", 20));
    put(&mut b, 350, &[0x80, 0xCE, 0x00]);
    finalize(&mut b, Generation::Ddr4);
    b
}

/// DDR4 RDIMM variant of [`ddr4_udimm`].
pub fn ddr4_rdimm() -> Vec<u8> {
    let mut b = ddr4_udimm();
    b[3] = 0x01;
    put(&mut b, 131, &[0x05, 0x80, 0x80, 0xB3, 0x31]);
    finalize(&mut b, Generation::Ddr4);
    b
}

/// DDR2-800 CL5 UDIMM, 2 GB, 2 ranks of x8 1 Gb dies, Samsung.
pub fn ddr2_udimm() -> Vec<u8> {
    let mut b = vec![0u8; 128];
    put(&mut b, 0, &[
        0x80, 0x08, 0x08, 0x0E, 0x0A, 0x61, 0x40, 0x00, 0x05, 0x25, 0x40, 0x00, 0x82, 0x08,
        0x00, 0x00, 0x0C, 0x08, 0x38, 0x00, 0x02, 0x00, 0x03, 0x30, 0x45, 0x3D, 0x50, 0x32,
        0x1E, 0x32, 0x2D, 0x01,
    ]);
    put(&mut b, 36, &[0x3C, 0x1E, 0x1E, 0x00, 0x36, 0x39, 0x7F]);
    b[62] = 0x12;
    put(&mut b, 64, &[0xCE, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01]);
    put(&mut b, 73, &padded("M378T5663QZ3-CF7", 18));
    put(&mut b, 93, &[0x08, 0x25, 0x00, 0x00, 0x12, 0x34]);
    finalize(&mut b, Generation::Ddr2);
    b
}
