//! Fixed-point backend.
//!
//! Each component is an `i32` holding `value * 2^bitshift`. Products and
//! quotients are formed in `i128` and narrowed back with an overflow check.
//! Transcendental functions are computed in double precision and converted
//! back, failing when the result leaves the representable range.
//!
//! | Quantity   | Value                       |
//! |------------|-----------------------------|
//! | `fg`       | `2^bitshift`                |
//! | `fg_limit` | `i32::MAX / fg`             |
//! | one        | `fg` in the real component  |

use crate::error::{NumericError, NumericResult};
use crate::math;
use crate::ops::{BinaryOp, Function, NumericOps};
use crate::types::{Complex, Scalar, MAX_BITSHIFT, MIN_BITSHIFT};

/// Pixels whose squared magnitude reaches this bound are replaced by
/// [`FAR_PIXEL`] before evaluation.
pub const PIXEL_LIMIT: Scalar = 127.0;

/// Stand-in for pixels outside the fixed-point comfort zone.
pub const FAR_PIXEL: Complex = Complex::new(8.0, 8.0);

/// A complex number in fixed-point representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FixedComplex {
    pub re: i32,
    pub im: i32,
}

impl FixedComplex {
    #[must_use]
    pub const fn new(re: i32, im: i32) -> Self {
        Self { re, im }
    }
}

/// Evaluates formulas on [`FixedComplex`] values.
#[derive(Debug, Clone, Copy)]
pub struct FixedOps {
    bitshift: u32,
    fg: Scalar,
    fg_limit: Scalar,
}

impl FixedOps {
    /// Create a backend with `bitshift` fractional bits.
    ///
    /// Returns `None` outside `MIN_BITSHIFT..=MAX_BITSHIFT`.
    #[must_use]
    pub fn new(bitshift: u32) -> Option<Self> {
        if !(MIN_BITSHIFT..=MAX_BITSHIFT).contains(&bitshift) {
            return None;
        }
        let fg = Scalar::from(1_u32 << bitshift);
        Some(Self {
            bitshift,
            fg,
            fg_limit: Scalar::from(i32::MAX) / fg,
        })
    }

    /// Number of fractional bits.
    #[must_use]
    pub const fn bitshift(&self) -> u32 {
        self.bitshift
    }

    /// Largest magnitude a component may hold.
    #[must_use]
    pub const fn fg_limit(&self) -> Scalar {
        self.fg_limit
    }

    fn one(&self) -> FixedComplex {
        FixedComplex::new(1_i32 << self.bitshift, 0)
    }

    fn truth(&self, flag: bool) -> FixedComplex {
        if flag {
            self.one()
        } else {
            FixedComplex::default()
        }
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "range checked against fg_limit first"
    )]
    fn to_fixed(&self, x: Scalar, what: &'static str) -> NumericResult<i32> {
        if x.is_nan() || x.abs() >= self.fg_limit {
            return Err(NumericError::Overflow(what));
        }
        Ok((x * self.fg).round() as i32)
    }

    fn encode(&self, z: Complex, what: &'static str) -> NumericResult<FixedComplex> {
        Ok(FixedComplex::new(
            self.to_fixed(z.re, what)?,
            self.to_fixed(z.im, what)?,
        ))
    }

    fn narrow(wide: i128, what: &'static str) -> NumericResult<i32> {
        i32::try_from(wide).map_err(|_| NumericError::Overflow(what))
    }

    fn mul(&self, a: FixedComplex, b: FixedComplex) -> NumericResult<FixedComplex> {
        let (ar, ai) = (i128::from(a.re), i128::from(a.im));
        let (br, bi) = (i128::from(b.re), i128::from(b.im));
        Ok(FixedComplex::new(
            Self::narrow((ar * br - ai * bi) >> self.bitshift, "*")?,
            Self::narrow((ar * bi + ai * br) >> self.bitshift, "*")?,
        ))
    }

    fn div(&self, a: FixedComplex, b: FixedComplex) -> NumericResult<FixedComplex> {
        let (ar, ai) = (i128::from(a.re), i128::from(a.im));
        let (br, bi) = (i128::from(b.re), i128::from(b.im));
        let denom = br * br + bi * bi;
        if denom == 0 {
            return Err(NumericError::Domain("/"));
        }
        Ok(FixedComplex::new(
            Self::narrow(((ar * br + ai * bi) << self.bitshift) / denom, "/")?,
            Self::narrow(((ai * br - ar * bi) << self.bitshift) / denom, "/")?,
        ))
    }

    fn norm_sqr(&self, a: FixedComplex) -> NumericResult<i32> {
        let (ar, ai) = (i128::from(a.re), i128::from(a.im));
        Self::narrow((ar * ar + ai * ai) >> self.bitshift, "|z|")
    }

    fn via_float(&self, function: Function, a: FixedComplex) -> NumericResult<FixedComplex> {
        let z = math::apply(function, self.to_complex(&a))?;
        self.encode(z, function.name())
    }
}

impl NumericOps for FixedOps {
    type Value = FixedComplex;

    fn name(&self) -> &'static str {
        "fixed"
    }

    fn from_complex(&self, z: Complex) -> NumericResult<FixedComplex> {
        self.encode(z, "constant")
    }

    fn to_complex(&self, value: &FixedComplex) -> Complex {
        Complex::new(
            Scalar::from(value.re) / self.fg,
            Scalar::from(value.im) / self.fg,
        )
    }

    fn zero(&self) -> FixedComplex {
        FixedComplex::default()
    }

    fn pixel(&self, z: Complex) -> NumericResult<FixedComplex> {
        if math::norm_sqr(z) >= PIXEL_LIMIT {
            self.encode(FAR_PIXEL, "pixel")
        } else {
            self.encode(z, "pixel")
        }
    }

    fn binary(
        &self,
        op: BinaryOp,
        lhs: &FixedComplex,
        rhs: &FixedComplex,
    ) -> NumericResult<FixedComplex> {
        let (a, b) = (*lhs, *rhs);
        let value = match op {
            BinaryOp::Add => FixedComplex::new(
                a.re.checked_add(b.re).ok_or(NumericError::Overflow("+"))?,
                a.im.checked_add(b.im).ok_or(NumericError::Overflow("+"))?,
            ),
            BinaryOp::Sub => FixedComplex::new(
                a.re.checked_sub(b.re).ok_or(NumericError::Overflow("-"))?,
                a.im.checked_sub(b.im).ok_or(NumericError::Overflow("-"))?,
            ),
            BinaryOp::Mul => self.mul(a, b)?,
            BinaryOp::Div => self.div(a, b)?,
            BinaryOp::Pow => {
                let z = math::pow(self.to_complex(&a), self.to_complex(&b));
                self.encode(z, "^")?
            }
            BinaryOp::Lt => self.truth(a.re < b.re),
            BinaryOp::Le => self.truth(a.re <= b.re),
            BinaryOp::Gt => self.truth(a.re > b.re),
            BinaryOp::Ge => self.truth(a.re >= b.re),
            BinaryOp::Eq => self.truth(a.re == b.re),
            BinaryOp::Ne => self.truth(a.re != b.re),
            BinaryOp::And => self.truth(a.re != 0 && b.re != 0),
            BinaryOp::Or => self.truth(a.re != 0 || b.re != 0),
        };
        Ok(value)
    }

    fn negate(&self, value: &FixedComplex) -> NumericResult<FixedComplex> {
        Ok(FixedComplex::new(
            value.re.checked_neg().ok_or(NumericError::Overflow("-"))?,
            value.im.checked_neg().ok_or(NumericError::Overflow("-"))?,
        ))
    }

    fn modulus(&self, value: &FixedComplex) -> NumericResult<FixedComplex> {
        Ok(FixedComplex::new(self.norm_sqr(*value)?, 0))
    }

    fn apply(&self, function: Function, value: &FixedComplex) -> NumericResult<FixedComplex> {
        let a = *value;
        match function {
            Function::Sqr => self.mul(a, a),
            Function::Abs => Ok(FixedComplex::new(
                a.re.checked_abs().ok_or(NumericError::Overflow("abs"))?,
                a.im.checked_abs().ok_or(NumericError::Overflow("abs"))?,
            )),
            Function::Conj => Ok(FixedComplex::new(
                a.re,
                a.im.checked_neg().ok_or(NumericError::Overflow("conj"))?,
            )),
            Function::Real => Ok(FixedComplex::new(a.re, 0)),
            Function::Imag => Ok(FixedComplex::new(a.im, 0)),
            Function::Flip => Ok(FixedComplex::new(a.im, a.re)),
            Function::Srand | Function::Ident => Ok(a),
            Function::Zero => Ok(FixedComplex::default()),
            Function::One => Ok(self.one()),
            Function::Recip => self.div(self.one(), a),
            other => self.via_float(other, a),
        }
    }

    fn is_false(&self, value: &FixedComplex) -> bool {
        value.re == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
