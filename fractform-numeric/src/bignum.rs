//! Arbitrary-precision backend on top of `rug` (MPC/MPFR).
//!
//! Precision is requested in decimal digits and converted to a binary
//! mantissa width of `digits * 3.33 + 16` bits. A result that is not a
//! finite number is reported as a fault, which the evaluator turns into an
//! escaped orbit.

use rug::{Complex as BigComplex, Float};

use crate::error::{NumericError, NumericResult};
use crate::ops::{BinaryOp, Function, NumericOps};
use crate::types::Complex;

/// Fewest decimal digits accepted.
pub const MIN_DIGITS: u32 = 8;

/// Most decimal digits accepted.
pub const MAX_DIGITS: u32 = 2_000;

/// Evaluates formulas on MPC complex values.
#[derive(Debug, Clone, Copy)]
pub struct BigOps {
    prec: u32,
}

impl BigOps {
    /// Create a backend carrying `digits` significant decimal digits.
    ///
    /// Returns `None` outside `MIN_DIGITS..=MAX_DIGITS`.
    #[must_use]
    pub fn with_digits(digits: u32) -> Option<Self> {
        if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits) {
            return None;
        }
        Some(Self {
            prec: digits * 333 / 100 + 16,
        })
    }

    /// Binary precision in bits.
    #[must_use]
    pub const fn precision(&self) -> u32 {
        self.prec
    }

    fn new_value(&self, re: Float, im: Float) -> BigComplex {
        BigComplex::with_val(self.prec, (re, im))
    }

    fn real_only(&self, re: Float) -> BigComplex {
        BigComplex::with_val(self.prec, (re, 0))
    }

    fn truth(&self, flag: bool) -> BigComplex {
        BigComplex::with_val(self.prec, (i32::from(flag), 0))
    }

    fn is_zero(value: &BigComplex) -> bool {
        value.real().is_zero() && value.imag().is_zero()
    }

    fn checked(value: BigComplex, what: &'static str) -> NumericResult<BigComplex> {
        if value.real().is_nan() || value.imag().is_nan() {
            Err(NumericError::Domain(what))
        } else if value.real().is_infinite() || value.imag().is_infinite() {
            Err(NumericError::Overflow(what))
        } else {
            Ok(value)
        }
    }

    fn norm_sqr(&self, value: &BigComplex) -> Float {
        let re2 = Float::with_val(self.prec, value.real() * value.real());
        let im2 = Float::with_val(self.prec, value.imag() * value.imag());
        re2 + &im2
    }

    fn log(&self, value: &BigComplex) -> BigComplex {
        if Self::is_zero(value) {
            self.zero()
        } else {
            value.clone().ln()
        }
    }

    fn recip(&self, value: &BigComplex, what: &'static str) -> NumericResult<BigComplex> {
        if Self::is_zero(value) {
            return Err(NumericError::Domain(what));
        }
        Ok(value.clone().recip())
    }

    fn per_component(&self, value: &BigComplex, f: impl Fn(Float) -> Float) -> BigComplex {
        self.new_value(f(value.real().clone()), f(value.imag().clone()))
    }
}

impl NumericOps for BigOps {
    type Value = BigComplex;

    fn name(&self) -> &'static str {
        "arbitrary"
    }

    fn from_complex(&self, z: Complex) -> NumericResult<BigComplex> {
        Self::checked(BigComplex::with_val(self.prec, (z.re, z.im)), "constant")
    }

    fn to_complex(&self, value: &BigComplex) -> Complex {
        Complex::new(value.real().to_f64(), value.imag().to_f64())
    }

    fn zero(&self) -> BigComplex {
        BigComplex::new(self.prec)
    }

    fn binary(
        &self,
        op: BinaryOp,
        lhs: &BigComplex,
        rhs: &BigComplex,
    ) -> NumericResult<BigComplex> {
        let value = match op {
            BinaryOp::Add => BigComplex::with_val(self.prec, lhs + rhs),
            BinaryOp::Sub => BigComplex::with_val(self.prec, lhs - rhs),
            BinaryOp::Mul => BigComplex::with_val(self.prec, lhs * rhs),
            BinaryOp::Div => {
                if Self::is_zero(rhs) {
                    return Err(NumericError::Domain("/"));
                }
                BigComplex::with_val(self.prec, lhs / rhs)
            }
            BinaryOp::Pow => {
                if Self::is_zero(lhs) {
                    self.zero()
                } else {
                    BigComplex::with_val(self.prec, &self.log(lhs) * rhs).exp()
                }
            }
            BinaryOp::Lt => self.truth(lhs.real() < rhs.real()),
            BinaryOp::Le => self.truth(lhs.real() <= rhs.real()),
            BinaryOp::Gt => self.truth(lhs.real() > rhs.real()),
            BinaryOp::Ge => self.truth(lhs.real() >= rhs.real()),
            BinaryOp::Eq => self.truth(lhs.real() == rhs.real()),
            BinaryOp::Ne => self.truth(lhs.real() != rhs.real()),
            BinaryOp::And => self.truth(!lhs.real().is_zero() && !rhs.real().is_zero()),
            BinaryOp::Or => self.truth(!lhs.real().is_zero() || !rhs.real().is_zero()),
        };
        Self::checked(value, op.symbol())
    }

    fn negate(&self, value: &BigComplex) -> NumericResult<BigComplex> {
        Ok(BigComplex::with_val(self.prec, -value))
    }

    fn modulus(&self, value: &BigComplex) -> NumericResult<BigComplex> {
        Self::checked(self.real_only(self.norm_sqr(value)), "|z|")
    }

    fn apply(&self, function: Function, value: &BigComplex) -> NumericResult<BigComplex> {
        let v = value.clone();
        let result = match function {
            Function::Sin => v.sin(),
            Function::Sinh => v.sinh(),
            Function::Cos => v.cos(),
            Function::Cosh => v.cosh(),
            Function::Sqr => v.square(),
            Function::Log => self.log(value),
            Function::Exp => v.exp(),
            Function::Abs => self.per_component(value, Float::abs),
            Function::Conj => v.conj(),
            Function::Real => self.real_only(value.real().clone()),
            Function::Imag => self.real_only(value.imag().clone()),
            Function::Flip => self.new_value(value.imag().clone(), value.real().clone()),
            Function::Tan => v.tan(),
            Function::Tanh => v.tanh(),
            Function::Cotan => self.recip(&v.tan(), "cotan")?,
            Function::Cotanh => self.recip(&v.tanh(), "cotanh")?,
            Function::CosXX => v.cos().conj(),
            Function::Srand | Function::Ident => v,
            Function::Asin => v.asin(),
            Function::Asinh => v.asinh(),
            Function::Acos => v.acos(),
            Function::Acosh => v.acosh(),
            Function::Atan => v.atan(),
            Function::Atanh => v.atanh(),
            Function::Sqrt => {
                if Self::is_zero(&v) {
                    v
                } else {
                    v.sqrt()
                }
            }
            Function::Cabs => self.real_only(self.norm_sqr(value).sqrt()),
            Function::Floor => self.per_component(value, Float::floor),
            Function::Ceil => self.per_component(value, Float::ceil),
            Function::Trunc => self.per_component(value, Float::trunc),
            Function::Round => self.per_component(value, Float::round),
            Function::Recip => self.recip(value, "recip")?,
            Function::Zero => self.zero(),
            Function::One => self.truth(true),
        };
        Self::checked(result, function.name())
    }

    fn is_false(&self, value: &BigComplex) -> bool {
        value.real().is_zero()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
