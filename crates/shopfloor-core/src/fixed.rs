use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Convert an f64 to Fixed64. Use only when resolving parameters, never in the tick loop.
///
/// Non-finite input maps to zero; out-of-range input saturates.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    if v.is_finite() {
        Fixed64::saturating_from_num(v)
    } else {
        Fixed64::ZERO
    }
}

/// Convert Fixed64 to f64. Use only for display and reporting.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// `num / den` as Fixed64, or zero when `den` is zero.
#[inline]
pub fn ratio(num: u64, den: u64) -> Fixed64 {
    if den == 0 {
        return Fixed64::ZERO;
    }
    Fixed64::saturating_from_num(num) / Fixed64::saturating_from_num(den)
}
