//! Fixed-point arithmetic for collateralization checks.
//!
//! Contract values are unsigned integers carrying an implicit 1e18 scale.
//! Products of three scaled values exceed 256 bits for realistic inputs,
//! so comparisons are carried out in a 1024-bit integer.

use alloy::primitives::{Uint, U256};

/// Contract fixed-point scale: 1e18.
pub const FIXED_POINT_SCALE: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// Number of decimals implied by [`FIXED_POINT_SCALE`].
pub const FIXED_POINT_DECIMALS: usize = 18;

/// Wide enough for `U256 * U256 * U256` without overflow.
type Wide = Uint<1024, 16>;

#[inline(always)]
fn widen(value: U256) -> Wide {
    Wide::from_limbs_slice(value.as_limbs())
}

/// Check whether a position is undercollateralized.
///
/// All inputs are 1e18-scaled. Returns true iff
/// `num_tokens * token_redemption_value * collateral_requirement > amount_collateral * S * S`.
/// Equality is not undercollateralized.
///
/// Example: 100 tokens, 50 collateral, price 1.0, requirement 1.2
/// → `100 * 1 * 1.2 = 120 > 50` → true.
#[inline]
pub fn is_undercollateralized(
    num_tokens: U256,
    amount_collateral: U256,
    token_redemption_value: U256,
    collateral_requirement: U256,
) -> bool {
    let scale = widen(FIXED_POINT_SCALE);
    let required = widen(num_tokens) * widen(token_redemption_value) * widen(collateral_requirement);
    let held = widen(amount_collateral) * scale * scale;
    required > held
}

/// Parse a decimal string such as `"1.2"` into a 1e18-scaled value.
///
/// Returns `None` for empty input, signs, more than 18 fractional digits,
/// or values that do not fit in 256 bits.
pub fn from_decimal_str(s: &str) -> Option<U256> {
    let s = s.trim();
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if frac_part.len() > FIXED_POINT_DECIMALS {
        return None;
    }
    let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) {
        return None;
    }

    let int_value = if int_part.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(int_part, 10).ok()?
    };

    let mut frac_padded = frac_part.to_string();
    frac_padded.extend(std::iter::repeat('0').take(FIXED_POINT_DECIMALS - frac_part.len()));
    let frac_value = U256::from_str_radix(&frac_padded, 10).ok()?;

    int_value
        .checked_mul(FIXED_POINT_SCALE)?
        .checked_add(frac_value)
}

/// Convert a 1e18-scaled value to f64.
/// Use only for display/logging, not for computation.
#[inline(always)]
pub fn to_f64(value: U256) -> f64 {
    if value <= U256::from(u128::MAX) {
        let raw: u128 = value.to();
        raw as f64 / 1e18
    } else {
        let limbs = value.as_limbs();
        let mut acc = 0.0f64;
        for limb in limbs.iter().rev() {
            acc = acc * (u64::MAX as f64 + 1.0) + *limb as f64;
        }
        acc / 1e18
    }
}
