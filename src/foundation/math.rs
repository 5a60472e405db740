/// `round(x * y / 255)` for 8-bit operands.
pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

/// Approximate division by 255 with shifts, exact for the products produced by 8-bit blending
/// once the caller has added the rounding bias.
#[inline]
pub(crate) fn shift_div255(v: u32) -> u32 {
    ((v >> 8) + v) >> 8
}

/// `floor(255 * num / den)`. `den` must be non-zero.
///
/// Widened to u128: frame counts may use the whole u64 range.
pub(crate) fn ramp_floor_u8(num: u64, den: u64) -> u8 {
    debug_assert!(den > 0);
    ((255 * u128::from(num)) / u128::from(den)).min(255) as u8
}

/// `round(255 * num / den)` with halves rounded up. `den` must be non-zero.
pub(crate) fn ramp_round_u8(num: u64, den: u64) -> u8 {
    debug_assert!(den > 0);
    let (num, den) = (u128::from(num), u128::from(den));
    ((510 * num + den) / (2 * den)).min(255) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
