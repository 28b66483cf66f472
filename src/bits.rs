//! Bit-field helpers shared by the format parsers, the compressed expander,
//! the CSR bank and the page table walker.
//!
//! Ranges are inclusive and given as `hi..=lo` bit positions, matching the
//! `inst[31:20]` notation of the ISA manual.

use crate::Uxlen;

/// Mask with the low `width` bits set. `width` may be 0..=64.
#[inline]
pub const fn mask(width: u32) -> Uxlen {
    if width >= Uxlen::BITS {
        Uxlen::MAX
    } else {
        (1 << width) - 1
    }
}

/// Extracts `value[hi:lo]`, right aligned.
#[inline]
pub const fn extract(value: Uxlen, hi: u32, lo: u32) -> Uxlen {
    (value >> lo) & mask(hi - lo + 1)
}

/// Extracts `inst[hi:lo]` of a 32-bit instruction word.
#[inline]
pub const fn field(inst: u32, hi: u32, lo: u32) -> u32 {
    extract(inst as Uxlen, hi, lo) as u32
}

/// Replaces `value[hi:lo]` with the low bits of `bits`.
#[inline]
pub const fn set(value: Uxlen, hi: u32, lo: u32, bits: Uxlen) -> Uxlen {
    let m = mask(hi - lo + 1) << lo;
    (value & !m) | ((bits << lo) & m)
}

/// Clears `value[hi:lo]`.
#[inline]
pub const fn clear(value: Uxlen, hi: u32, lo: u32) -> Uxlen {
    value & !(mask(hi - lo + 1) << lo)
}

/// Sign extends the low `width` bits of `value` to 64 bits.
///
/// If bit `width - 1` is set, the immediate is OR-ed with the complement of the
/// field mask, giving the two's complement value. Bits above `width` in the input
/// must be zero.
#[inline]
pub const fn sign_extend(value: Uxlen, width: u32) -> Uxlen {
    if value & (1 << (width - 1)) != 0 {
        value | !mask(width)
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn extract_and_set() {
        assert_eq!(extract(0xdead_beef, 15, 8), 0xbe);
        assert_eq!(set(0xdead_beef, 15, 8, 0x12), 0xdead_12ef);
        assert_eq!(clear(0xdead_beef, 31, 16), 0xbeef);
        assert_eq!(field(0x8000_0000, 31, 31), 1);
        assert_eq!(mask(64), u64::MAX);
        assert_eq!(mask(0), 0);
    }

    #[test]
    fn sign_extend_positive_is_identity() {
        assert_eq!(sign_extend(0x7ff, 12), 0x7ff);
        assert_eq!(sign_extend(0, 12), 0);
    }

    #[test]
    fn sign_extend_negative() {
        assert_eq!(sign_extend(0xfff, 12), u64::MAX);
        assert_eq!(sign_extend(0x800, 12) as i64, -2048);
        assert_eq!(sign_extend(0x20, 6) as i64, -32);
    }

    proptest! {
        #[test]
        fn twelve_bit_negative_values(v in 0x800u64..0x1000) {
            prop_assert_eq!(sign_extend(v, 12) as i64, v as i64 - 4096);
        }

        #[test]
        fn set_then_extract(value: u64, bits in 0u64..0x200, lo in 0u32..55) {
            let hi = lo + 8;
            prop_assert_eq!(extract(set(value, hi, lo, bits), hi, lo), bits);
        }
    }
}
