//! Trapping arithmetic for monetary math.
//!
//! These four functions (plus [`mul_div`]) are the only arithmetic
//! primitives used for money anywhere in the core. They map the hardware
//! hazards - wrap-around, `i64::MIN / -1`, division by zero - to a typed
//! error the sequencer escalates to a halt.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArithmeticError {
    #[error("integer overflow in {0}")]
    Overflow(&'static str),
    #[error("division by zero")]
    DivideByZero,
}

pub fn add(a: i64, b: i64) -> Result<i64, ArithmeticError> {
    a.checked_add(b).ok_or(ArithmeticError::Overflow("add"))
}

pub fn sub(a: i64, b: i64) -> Result<i64, ArithmeticError> {
    a.checked_sub(b).ok_or(ArithmeticError::Overflow("sub"))
}

pub fn mul(a: i64, b: i64) -> Result<i64, ArithmeticError> {
    a.checked_mul(b).ok_or(ArithmeticError::Overflow("mul"))
}

/// Division. Divisor zero and `i64::MIN / -1` are both errors.
pub fn div(a: i64, b: i64) -> Result<i64, ArithmeticError> {
    if b == 0 {
        return Err(ArithmeticError::DivideByZero);
    }
    a.checked_div(b).ok_or(ArithmeticError::Overflow("div"))
}

/// `a * b / d` widened through i128 so the intermediate product cannot
/// overflow. Used for `qty × price / scale` style conversions (fills,
/// equity).
pub fn mul_div(a: i64, b: i64, d: i64) -> Result<i64, ArithmeticError> {
    if d == 0 {
        return Err(ArithmeticError::DivideByZero);
    }
    let wide = (a as i128) * (b as i128) / (d as i128);
    i64::try_from(wide).map_err(|_| ArithmeticError::Overflow("mul_div"))
}
