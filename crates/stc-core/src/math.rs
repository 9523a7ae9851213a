//! 256-bit integer helpers for fixed-point pricing and profit accounting.
//!
//! Products of two u128 values always fit in a U256, so `mul_div_floor` only
//! fails on a zero denominator or when the quotient does not fit the caller's
//! narrowing.

use primitive_types::U256;

use crate::error::{SaleError, SaleResult};

/// 10^exp as a U256.
pub fn pow10(exp: u8) -> U256 {
    U256::exp10(exp as usize)
}

/// floor(a * b / d)
pub fn mul_div_floor(a: U256, b: U256, d: U256) -> SaleResult<U256> {
    if d.is_zero() {
        return Err(SaleError::ArithmeticOverflow);
    }
    let product = a.checked_mul(b).ok_or(SaleError::ArithmeticOverflow)?;
    Ok(product / d)
}

/// ceil(n / d)
pub fn div_ceil(n: U256, d: U256) -> SaleResult<U256> {
    if d.is_zero() {
        return Err(SaleError::ArithmeticOverflow);
    }
    let q = n / d;
    if (n % d).is_zero() {
        Ok(q)
    } else {
        q.checked_add(U256::one()).ok_or(SaleError::ArithmeticOverflow)
    }
}

/// Narrow a U256 to u128, failing instead of truncating.
pub fn to_u128(v: U256) -> SaleResult<u128> {
    if v > U256::from(u128::MAX) {
        return Err(SaleError::ArithmeticOverflow);
    }
    Ok(v.low_u128())
}

/// Rescale a value with `decimals` fractional digits to `target` digits.
/// Only upscaling is allowed; callers reject `decimals > target` up front.
pub fn rescale_up(value: u128, decimals: u8, target: u8) -> SaleResult<U256> {
    if decimals > target {
        return Err(SaleError::ArithmeticOverflow);
    }
    U256::from(value)
        .checked_mul(pow10(target - decimals))
        .ok_or(SaleError::ArithmeticOverflow)
}
