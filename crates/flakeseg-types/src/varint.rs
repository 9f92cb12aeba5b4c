//! Variable-length integer primitives used by the persisted history format.
//!
//! Varints follow the SQLite scheme: 1-9 bytes, big-endian 7-bit groups with
//! the high bit as a continuation flag, except the 9th byte which carries all
//! 8 bits. Signed deltas are zig-zag mapped first so small negative values
//! stay short.

/// Largest encoded varint, in bytes.
pub const MAX_VARINT_LEN: usize = 9;

/// Read a varint from a byte slice, returning `(value, bytes_consumed)`.
///
/// Returns `None` when the slice ends before the varint does.
pub fn read_varint(buf: &[u8]) -> Option<(u64, usize)> {
    if buf.is_empty() {
        return None;
    }

    let mut value: u64 = 0;
    for (i, &byte) in buf.iter().enumerate().take(8) {
        if byte & 0x80 == 0 {
            value = (value << 7) | u64::from(byte);
            return Some((value, i + 1));
        }
        value = (value << 7) | u64::from(byte & 0x7F);
    }

    // 9th byte (if present) uses all 8 bits
    if buf.len() > 8 {
        value = (value << 8) | u64::from(buf[8]);
        Some((value, MAX_VARINT_LEN))
    } else {
        None
    }
}

/// Compute the number of bytes needed to encode a value as a varint.
pub const fn varint_len(value: u64) -> usize {
    if value <= 0x7F {
        1
    } else if value <= 0x3FFF {
        2
    } else if value <= 0x001F_FFFF {
        3
    } else if value <= 0x0FFF_FFFF {
        4
    } else if value <= 0x07_FFFF_FFFF {
        5
    } else if value <= 0x03FF_FFFF_FFFF {
        6
    } else if value <= 0x01_FFFF_FFFF_FFFF {
        7
    } else if value <= 0xFF_FFFF_FFFF_FFFF {
        8
    } else {
        9
    }
}

/// Append the varint encoding of `value` to `out`, returning the number of
/// bytes written.
#[allow(clippy::cast_possible_truncation)]
pub fn put_varint(out: &mut Vec<u8>, value: u64) -> usize {
    let len = varint_len(value);
    let mut buf = [0u8; MAX_VARINT_LEN];

    if len == 1 {
        buf[0] = value as u8;
    } else if len == MAX_VARINT_LEN {
        let mut v = value >> 8;
        for i in (0..8).rev() {
            buf[i] = (v as u8 & 0x7F) | 0x80;
            v >>= 7;
        }
        buf[8] = value as u8;
    } else {
        let mut v = value;
        for i in (0..len).rev() {
            if i == len - 1 {
                buf[i] = v as u8 & 0x7F;
            } else {
                buf[i] = (v as u8 & 0x7F) | 0x80;
            }
            v >>= 7;
        }
    }

    out.extend_from_slice(&buf[..len]);
    len
}

/// Map a signed value onto the unsigned range so that small magnitudes of
/// either sign encode to short varints.
#[allow(clippy::cast_sign_loss)]
pub const fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
#[allow(clippy::cast_possible_wrap)]
pub const fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}
