// Nucleotide alphabet validation
// Scalar reference plus a NEON path processing 16 bytes per iteration

/// Index of the first byte outside {A, C, G, T, N}, or `None` if the
/// whole sequence is valid.
///
/// Selects the widest implementation available for the platform; every
/// implementation returns exactly what the scalar reference returns.
#[inline]
pub fn first_invalid(seq: &[u8]) -> Option<usize> {
    #[cfg(target_arch = "aarch64")]
    {
        unsafe { first_invalid_neon(seq) }
    }

    #[cfg(not(target_arch = "aarch64"))]
    {
        first_invalid_scalar(seq)
    }
}

/// Byte-by-byte reference implementation
pub fn first_invalid_scalar(seq: &[u8]) -> Option<usize> {
    seq.iter()
        .position(|&b| !matches!(b, b'A' | b'C' | b'G' | b'T' | b'N'))
}

/// NEON implementation: compare 16 bytes at a time against the five
/// accepted letters, falling back to the scalar scan only inside a chunk
/// known to contain an invalid byte.
///
/// # Safety
///
/// NEON is baseline on aarch64; loads go through `vld1q_u8` on in-bounds
/// pointers only.
#[cfg(target_arch = "aarch64")]
pub unsafe fn first_invalid_neon(seq: &[u8]) -> Option<usize> {
    use std::arch::aarch64::*;

    let valid_a = vdupq_n_u8(b'A');
    let valid_c = vdupq_n_u8(b'C');
    let valid_g = vdupq_n_u8(b'G');
    let valid_t = vdupq_n_u8(b'T');
    let valid_n = vdupq_n_u8(b'N');

    let mut i = 0;
    while i + 16 <= seq.len() {
        let data = vld1q_u8(seq.as_ptr().add(i));

        let is_a = vceqq_u8(data, valid_a);
        let is_c = vceqq_u8(data, valid_c);
        let is_g = vceqq_u8(data, valid_g);
        let is_t = vceqq_u8(data, valid_t);
        let is_n = vceqq_u8(data, valid_n);

        let valid = vorrq_u8(
            vorrq_u8(vorrq_u8(is_a, is_c), vorrq_u8(is_g, is_t)),
            is_n,
        );

        let valid64 = vreinterpretq_u64_u8(valid);
        let low = vgetq_lane_u64::<0>(valid64);
        let high = vgetq_lane_u64::<1>(valid64);
        if low & high != u64::MAX {
            return first_invalid_scalar(&seq[i..i + 16]).map(|j| i + j);
        }

        i += 16;
    }

    first_invalid_scalar(&seq[i..]).map(|j| i + j)
}
