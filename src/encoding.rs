//! Sparse hash encoding.
//!
//! While a sketch is sparse it stores one 32-bit word per observed hash
//! instead of updating a register array. The word keeps enough of the
//! original 64-bit hash to reproduce exactly the `(index, rank)` pair the
//! dense representation would have derived, at the higher sparse precision
//! `PP`. Two layouts are distinguished by the least significant bit:
//!
//! - LSB = 0: `[ hash prefix: PP bits | 0 ]`. The bits between the dense
//!   index and the sparse index are non-zero, so the rank can be recomputed
//!   from the stored prefix.
//! - LSB = 1: `[ index: PP bits | rank: 6 bits | 1 ]`. Those bits are all
//!   zero, so the rank had to be computed from the discarded low bits and is
//!   carried explicitly.
//!
//! Sorting encoded words ascending groups them by sparse index, which is
//! what keeps the compressed list mergeable in a single linear pass.

/// Sparse precision: number of hash prefix bits kept by the sparse
/// representation. Fixed by the encoding layout (`PP + 6 + 1 = 32`).
pub(crate) const PP: u8 = 25;

/// Number of virtual registers addressed while sparse.
pub(crate) const MP: u32 = 1 << PP;

/// Extract `length` bits of `v` starting at bit `start` (LSB 0 numbering).
#[inline]
pub(crate) fn bextr(v: u64, start: u8, length: u8) -> u64 {
    (v >> start) & ((1 << length) - 1)
}

/// 32-bit variant of [`bextr`], extracting bits `[lo, hi)`.
#[inline]
pub(crate) fn eb32(bits: u32, hi: u8, lo: u8) -> u32 {
    let m = ((1u32 << (hi - lo)) - 1) << lo;
    (bits & m) >> lo
}

/// Encode a 64-bit hash into its 32-bit sparse form.
#[inline]
pub(crate) fn encode_hash(x: u64, p: u8) -> u32 {
    let idx = bextr(x, 64 - PP, PP) as u32;

    if bextr(x, 64 - PP, PP - p) == 0 {
        // The run of zeros reaches past the sparse prefix; count it over the
        // remaining low bits, bounded by a sentinel, and store it.
        let zeros = ((bextr(x, 0, 64 - PP) << PP) | ((1 << PP) - 1)).leading_zeros() + 1;
        (idx << 7) | (zeros << 1) | 1
    } else {
        idx << 1
    }
}

/// Decode a 32-bit sparse form back into the dense `(index, rank)` pair.
#[inline]
pub(crate) fn decode_hash(k: u32, p: u8) -> (u32, u8) {
    let r = if k & 1 == 1 {
        eb32(k, 7, 1) as u8 + PP - p
    } else {
        // The 64-bit clz reduced by 32 doubles as a 32-bit clz.
        (((k << (32 - PP + p - 1)) as u64).leading_zeros() - 31) as u8
    };
    (get_index(k, p), r)
}

/// Dense register index stored in an encoded sparse hash.
#[inline]
pub(crate) fn get_index(k: u32, p: u8) -> u32 {
    if k & 1 == 1 {
        eb32(k, 32, 32 - p)
    } else {
        eb32(k, PP + 1, PP - p + 1)
    }
}
