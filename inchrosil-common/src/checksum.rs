// CRC-32/ISO-HDLC (the zlib/PNG CRC-32)
// Reflected polynomial 0xEDB88320, init and xor-out 0xFFFFFFFF

/// Checksum a byte span using the accelerated path.
///
/// `crc32fast` selects SSE4.2/PCLMUL or ARMv8 CRC instructions at runtime
/// and falls back to a table implementation; output is bit-identical to
/// `crc32_reference` for every input.
#[inline]
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Portable byte-at-a-time reference implementation.
///
/// This is the semantic definition of the checksum; the fast path is
/// tested against it.
pub fn crc32_reference(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &b in data {
        crc ^= b as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}
