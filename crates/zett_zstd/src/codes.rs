//! Length-to-code mappings shared by the sequence decoder and encoder
//! (RFC 8878 §3.1.1.3.2.1).

use zett_foundation::highest_bit;

/// `(baseline, extra_bits)` per literals-length code.
pub(crate) const LITERALS_LENGTH_BASE: [(u32, u8); 36] = [
    (0, 0),
    (1, 0),
    (2, 0),
    (3, 0),
    (4, 0),
    (5, 0),
    (6, 0),
    (7, 0),
    (8, 0),
    (9, 0),
    (10, 0),
    (11, 0),
    (12, 0),
    (13, 0),
    (14, 0),
    (15, 0),
    (16, 1),
    (18, 1),
    (20, 1),
    (22, 1),
    (24, 2),
    (28, 2),
    (32, 3),
    (40, 3),
    (48, 4),
    (64, 6),
    (128, 7),
    (256, 8),
    (512, 9),
    (1024, 10),
    (2048, 11),
    (4096, 12),
    (8192, 13),
    (16384, 14),
    (32768, 15),
    (65536, 16),
];

/// `(baseline, extra_bits)` per match-length code; baselines start at the
/// 3-byte minimum match.
pub(crate) const MATCH_LENGTH_BASE: [(u32, u8); 53] = [
    (3, 0),
    (4, 0),
    (5, 0),
    (6, 0),
    (7, 0),
    (8, 0),
    (9, 0),
    (10, 0),
    (11, 0),
    (12, 0),
    (13, 0),
    (14, 0),
    (15, 0),
    (16, 0),
    (17, 0),
    (18, 0),
    (19, 0),
    (20, 0),
    (21, 0),
    (22, 0),
    (23, 0),
    (24, 0),
    (25, 0),
    (26, 0),
    (27, 0),
    (28, 0),
    (29, 0),
    (30, 0),
    (31, 0),
    (32, 0),
    (33, 0),
    (34, 0),
    (35, 1),
    (37, 1),
    (39, 1),
    (41, 1),
    (43, 2),
    (47, 2),
    (51, 3),
    (59, 3),
    (67, 4),
    (83, 4),
    (99, 5),
    (131, 7),
    (259, 8),
    (515, 9),
    (1027, 10),
    (2051, 11),
    (4099, 12),
    (8195, 13),
    (16387, 14),
    (32771, 15),
    (65539, 16),
];

#[rustfmt::skip]
const LITERALS_LENGTH_CODE: [u8; 64] = [
     0,  1,  2,  3,  4,  5,  6,  7,  8,  9, 10, 11, 12, 13, 14, 15,
    16, 16, 17, 17, 18, 18, 19, 19, 20, 20, 20, 20, 21, 21, 21, 21,
    22, 22, 22, 22, 22, 22, 22, 22, 23, 23, 23, 23, 23, 23, 23, 23,
    24, 24, 24, 24, 24, 24, 24, 24, 24, 24, 24, 24, 24, 24, 24, 24,
];

#[rustfmt::skip]
const MATCH_LENGTH_CODE: [u8; 128] = [
     0,  1,  2,  3,  4,  5,  6,  7,  8,  9, 10, 11, 12, 13, 14, 15,
    16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31,
    32, 32, 33, 33, 34, 34, 35, 35, 36, 36, 36, 36, 37, 37, 37, 37,
    38, 38, 38, 38, 38, 38, 38, 38, 39, 39, 39, 39, 39, 39, 39, 39,
    40, 40, 40, 40, 40, 40, 40, 40, 40, 40, 40, 40, 40, 40, 40, 40,
    41, 41, 41, 41, 41, 41, 41, 41, 41, 41, 41, 41, 41, 41, 41, 41,
    42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42,
    42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 42,
];

#[inline(always)]
pub(crate) fn literals_length_code(literals_length: u32) -> u8 {
    if literals_length >= 64 {
        (highest_bit(literals_length) + 19) as u8
    } else {
        LITERALS_LENGTH_CODE[literals_length as usize]
    }
}

/// `match_length_base` is the match length minus the 3-byte minimum.
#[inline(always)]
pub(crate) fn match_length_code(match_length_base: u32) -> u8 {
    if match_length_base >= 128 {
        (highest_bit(match_length_base) + 36) as u8
    } else {
        MATCH_LENGTH_CODE[match_length_base as usize]
    }
}

#[inline(always)]
pub(crate) fn literals_length_bits(code: u8) -> u8 {
    LITERALS_LENGTH_BASE[code as usize].1
}

#[inline(always)]
pub(crate) fn match_length_bits(code: u8) -> u8 {
    MATCH_LENGTH_BASE[code as usize].1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_tables_invert_base_tables() {
        // every representable literals length maps to a code whose
        // baseline/extra-bits window contains it
        for length in 0..(1u32 << 17) {
            let code = literals_length_code(length) as usize;
            let (base, bits) = LITERALS_LENGTH_BASE[code];
            assert!(base <= length && length < base + (1 << bits), "ll {}", length);
            // the extra-bit field is just the low bits of the raw length
            assert_eq!(length & ((1 << bits) - 1), length - base);
        }

        for base_len in 0..(1u32 << 17) {
            let code = match_length_code(base_len) as usize;
            let (base, bits) = MATCH_LENGTH_BASE[code];
            let length = base_len + 3;
            assert!(base <= length && length < base + (1 << bits), "ml {}", length);
            assert_eq!(base_len & ((1 << bits) - 1), length - base);
        }
    }
}
