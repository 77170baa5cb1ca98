//! Double-precision backend.

use crate::error::{NumericError, NumericResult};
use crate::math;
use crate::ops::{BinaryOp, Function, NumericOps};
use crate::types::Complex;

/// Evaluates formulas on [`Complex`] values.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatOps;

impl FloatOps {
    fn finite(z: Complex, what: &'static str) -> NumericResult<Complex> {
        if z.re.is_nan() || z.im.is_nan() {
            Err(NumericError::Domain(what))
        } else {
            Ok(z)
        }
    }
}

impl NumericOps for FloatOps {
    type Value = Complex;

    fn name(&self) -> &'static str {
        "float"
    }

    fn from_complex(&self, z: Complex) -> NumericResult<Complex> {
        Ok(z)
    }

    fn to_complex(&self, value: &Complex) -> Complex {
        *value
    }

    fn zero(&self) -> Complex {
        Complex::new(0.0, 0.0)
    }

    fn binary(&self, op: BinaryOp, lhs: &Complex, rhs: &Complex) -> NumericResult<Complex> {
        Self::finite(math::binary(op, *lhs, *rhs)?, op.symbol())
    }

    fn negate(&self, value: &Complex) -> NumericResult<Complex> {
        Ok(-*value)
    }

    fn modulus(&self, value: &Complex) -> NumericResult<Complex> {
        Ok(Complex::new(math::norm_sqr(*value), 0.0))
    }

    fn apply(&self, function: Function, value: &Complex) -> NumericResult<Complex> {
        Self::finite(math::apply(function, *value)?, function.name())
    }

    fn is_false(&self, value: &Complex) -> bool {
        value.re == 0.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
