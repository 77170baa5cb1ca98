//! Double-precision complex math used by formula evaluation.
//!
//! Most functions defer to `num-complex`. The exceptions follow the
//! conventions formula authors rely on:
//! - `log 0 = 0` and `0^y = 0` instead of infinities,
//! - `tan`, `tanh`, `cotan` and `cotanh` use the doubled-angle forms and
//!   report a domain error when the denominator vanishes,
//! - `abs` is component-wise, `cabs` is the true magnitude,
//! - `floor`, `ceil`, `trunc` and `round` act on each component.
//!
//! The fixed-point backend also routes its transcendental functions through
//! this module.

use crate::error::{NumericError, NumericResult};
use crate::ops::{BinaryOp, Function};
use crate::types::{truth, Complex, Scalar, DBL_MIN};

// ---------------------------------------------------------------------------
// Elementary helpers
// ---------------------------------------------------------------------------

/// Squared magnitude `x² + y²`.
#[inline]
#[must_use]
pub fn norm_sqr(z: Complex) -> Scalar {
    z.re.mul_add(z.re, z.im * z.im)
}

/// Complex logarithm with `log 0 = 0`.
#[must_use]
pub fn log(z: Complex) -> Complex {
    if z.re == 0.0 && z.im == 0.0 {
        return Complex::new(0.0, 0.0);
    }
    Complex::new(norm_sqr(z).ln() / 2.0, z.im.atan2(z.re))
}

/// Complex exponential.
#[must_use]
pub fn exp(z: Complex) -> Complex {
    let scale = z.re.exp();
    Complex::new(scale * z.im.cos(), scale * z.im.sin())
}

/// Complex power `x^y = exp(y * log x)`, with `0^y = 0`.
#[must_use]
pub fn pow(x: Complex, y: Complex) -> Complex {
    if x.re == 0.0 && x.im == 0.0 {
        return Complex::new(0.0, 0.0);
    }
    exp(log(x) * y)
}

/// Principal square root, `sqrt 0 = 0`.
#[must_use]
pub fn sqrt(z: Complex) -> Complex {
    if z.re == 0.0 && z.im == 0.0 {
        return Complex::new(0.0, 0.0);
    }
    let mag = norm_sqr(z).sqrt().sqrt();
    let theta = z.im.atan2(z.re) / 2.0;
    Complex::new(mag * theta.cos(), mag * theta.sin())
}

/// Complex division with a domain check on the denominator.
///
/// # Errors
///
/// Returns [`NumericError::Domain`] when `|rhs|²` is not a normal number.
pub fn div(lhs: Complex, rhs: Complex) -> NumericResult<Complex> {
    let denom = norm_sqr(rhs);
    check_denominator(denom, "/")?;
    Ok(Complex::new(
        lhs.re.mul_add(rhs.re, lhs.im * rhs.im) / denom,
        lhs.im.mul_add(rhs.re, -(lhs.re * rhs.im)) / denom,
    ))
}

/// Reciprocal `1 / z`.
///
/// # Errors
///
/// Returns [`NumericError::Domain`] for `z = 0`.
pub fn recip(z: Complex) -> NumericResult<Complex> {
    let denom = norm_sqr(z);
    check_denominator(denom, "recip")?;
    Ok(Complex::new(z.re / denom, -z.im / denom))
}

fn check_denominator(denom: Scalar, what: &'static str) -> NumericResult<()> {
    if denom.abs() <= DBL_MIN {
        Err(NumericError::Domain(what))
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Doubled-angle trigonometry
// ---------------------------------------------------------------------------

/// `tan z = sin 2x / (cos 2x + cosh 2y) + i sinh 2y / (cos 2x + cosh 2y)`.
///
/// # Errors
///
/// Returns [`NumericError::Domain`] when the denominator vanishes.
pub fn tan(z: Complex) -> NumericResult<Complex> {
    let (x, y) = (2.0 * z.re, 2.0 * z.im);
    let denom = x.cos() + y.cosh();
    check_denominator(denom, "tan")?;
    Ok(Complex::new(x.sin() / denom, y.sinh() / denom))
}

/// `tanh z = sinh 2x / (cosh 2x + cos 2y) + i sin 2y / (cosh 2x + cos 2y)`.
///
/// # Errors
///
/// Returns [`NumericError::Domain`] when the denominator vanishes.
pub fn tanh(z: Complex) -> NumericResult<Complex> {
    let (x, y) = (2.0 * z.re, 2.0 * z.im);
    let denom = x.cosh() + y.cos();
    check_denominator(denom, "tanh")?;
    Ok(Complex::new(x.sinh() / denom, y.sin() / denom))
}

/// `cotan z = sin 2x / (cosh 2y - cos 2x) - i sinh 2y / (cosh 2y - cos 2x)`.
///
/// # Errors
///
/// Returns [`NumericError::Domain`] when the denominator vanishes.
pub fn cotan(z: Complex) -> NumericResult<Complex> {
    let (x, y) = (2.0 * z.re, 2.0 * z.im);
    let denom = y.cosh() - x.cos();
    check_denominator(denom, "cotan")?;
    Ok(Complex::new(x.sin() / denom, -y.sinh() / denom))
}

/// `cotanh z = sinh 2x / (cosh 2x - cos 2y) - i sin 2y / (cosh 2x - cos 2y)`.
///
/// # Errors
///
/// Returns [`NumericError::Domain`] when the denominator vanishes.
pub fn cotanh(z: Complex) -> NumericResult<Complex> {
    let (x, y) = (2.0 * z.re, 2.0 * z.im);
    let denom = x.cosh() - y.cos();
    check_denominator(denom, "cotanh")?;
    Ok(Complex::new(x.sinh() / denom, -y.sin() / denom))
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Apply a binary operator in double precision.
///
/// # Errors
///
/// Division reports [`NumericError::Domain`] for a zero divisor.
pub fn binary(op: BinaryOp, lhs: Complex, rhs: Complex) -> NumericResult<Complex> {
    let value = match op {
        BinaryOp::Add => lhs + rhs,
        BinaryOp::Sub => lhs - rhs,
        BinaryOp::Mul => lhs * rhs,
        BinaryOp::Div => div(lhs, rhs)?,
        BinaryOp::Pow => pow(lhs, rhs),
        BinaryOp::Lt => truth(lhs.re < rhs.re),
        BinaryOp::Le => truth(lhs.re <= rhs.re),
        BinaryOp::Gt => truth(lhs.re > rhs.re),
        BinaryOp::Ge => truth(lhs.re >= rhs.re),
        BinaryOp::Eq => truth(lhs.re == rhs.re),
        BinaryOp::Ne => truth(lhs.re != rhs.re),
        BinaryOp::And => truth(lhs.re != 0.0 && rhs.re != 0.0),
        BinaryOp::Or => truth(lhs.re != 0.0 || rhs.re != 0.0),
    };
    Ok(value)
}

/// Apply a one-operand function in double precision.
///
/// # Errors
///
/// The doubled-angle functions and `recip` report [`NumericError::Domain`]
/// at their poles.
pub fn apply(function: Function, z: Complex) -> NumericResult<Complex> {
    let value = match function {
        Function::Sin => z.sin(),
        Function::Sinh => z.sinh(),
        Function::Cos => z.cos(),
        Function::Cosh => z.cosh(),
        Function::Sqr => z * z,
        Function::Log => log(z),
        Function::Exp => exp(z),
        Function::Abs => Complex::new(z.re.abs(), z.im.abs()),
        Function::Conj => z.conj(),
        Function::Real => Complex::new(z.re, 0.0),
        Function::Imag => Complex::new(z.im, 0.0),
        Function::Flip => Complex::new(z.im, z.re),
        Function::Tan => tan(z)?,
        Function::Tanh => tanh(z)?,
        Function::Cotan => cotan(z)?,
        Function::Cotanh => cotanh(z)?,
        Function::CosXX => z.cos().conj(),
        Function::Srand | Function::Ident => z,
        Function::Asin => z.asin(),
        Function::Asinh => z.asinh(),
        Function::Acos => z.acos(),
        Function::Acosh => z.acosh(),
        Function::Atan => z.atan(),
        Function::Atanh => z.atanh(),
        Function::Sqrt => sqrt(z),
        Function::Cabs => Complex::new(norm_sqr(z).sqrt(), 0.0),
        Function::Floor => Complex::new(z.re.floor(), z.im.floor()),
        Function::Ceil => Complex::new(z.re.ceil(), z.im.ceil()),
        Function::Trunc => Complex::new(z.re.trunc(), z.im.trunc()),
        Function::Round => Complex::new(z.re.round(), z.im.round()),
        Function::Recip => recip(z)?,
        Function::Zero => Complex::new(0.0, 0.0),
        Function::One => Complex::new(1.0, 0.0),
    };
    Ok(value)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    const EPS: Scalar = 1e-12;

    fn close(a: Complex, b: Complex) -> bool {
        (a - b).norm() < 1e-9
    }

    #[test]
    fn log_of_zero_is_zero() {
        assert_eq!(log(Complex::new(0.0, 0.0)), Complex::new(0.0, 0.0));
    }

    #[test]
    fn log_exp_inverse() {
        let z = Complex::new(0.3, -1.2);
        assert!(close(exp(log(z)), z));
    }

    #[test]
    fn pow_of_zero_base_is_zero() {
        let r = pow(Complex::new(0.0, 0.0), Complex::new(0.0, 0.0));
        assert_eq!(r, Complex::new(0.0, 0.0));
    }

    #[test]
    fn pow_matches_repeated_multiplication() {
        let z = Complex::new(1.5, 0.5);
        assert!(close(pow(z, Complex::new(3.0, 0.0)), z * z * z));
    }

    #[test]
    fn sqrt_squares_back() {
        let z = Complex::new(-3.0, 4.0);
        let r = sqrt(z);
        assert!(close(r * r, z));
        assert!(r.re >= 0.0);
    }

    #[test]
    fn tan_matches_sin_over_cos() {
        let z = Complex::new(0.4, 0.7);
        let expected = z.sin() / z.cos();
        assert!(close(tan(z).unwrap(), expected));
    }

    #[test]
    fn cotanh_is_reciprocal_of_tanh() {
        let z = Complex::new(0.9, -0.2);
        let product = cotanh(z).unwrap() * tanh(z).unwrap();
        assert!(close(product, Complex::new(1.0, 0.0)));
    }

    #[test]
    fn cotan_pole_is_domain_error() {
        assert_eq!(
            cotan(Complex::new(0.0, 0.0)),
            Err(NumericError::Domain("cotan"))
        );
    }

    #[test]
    fn division_by_zero_is_domain_error() {
        let r = binary(BinaryOp::Div, Complex::new(1.0, 0.0), Complex::new(0.0, 0.0));
        assert_eq!(r, Err(NumericError::Domain("/")));
    }

    #[test]
    fn comparisons_use_real_parts() {
        let a = Complex::new(1.0, 100.0);
        let b = Complex::new(2.0, -100.0);
        assert_eq!(binary(BinaryOp::Lt, a, b).unwrap(), Complex::new(1.0, 0.0));
        assert_eq!(binary(BinaryOp::Ge, a, b).unwrap(), Complex::new(0.0, 0.0));
        assert_eq!(
            binary(BinaryOp::Eq, a, Complex::new(1.0, 0.0)).unwrap(),
            Complex::new(1.0, 0.0)
        );
    }

    #[test]
    fn logic_operators() {
        let t = Complex::new(1.0, 0.0);
        let f = Complex::new(0.0, 5.0);
        assert_eq!(binary(BinaryOp::And, t, f).unwrap(), Complex::new(0.0, 0.0));
        assert_eq!(binary(BinaryOp::Or, t, f).unwrap(), Complex::new(1.0, 0.0));
    }

    #[test]
    fn projections_and_flip() {
        let z = Complex::new(3.0, -4.0);
        assert_eq!(apply(Function::Real, z).unwrap(), Complex::new(3.0, 0.0));
        assert_eq!(apply(Function::Imag, z).unwrap(), Complex::new(-4.0, 0.0));
        assert_eq!(apply(Function::Flip, z).unwrap(), Complex::new(-4.0, 3.0));
        assert_eq!(apply(Function::Abs, z).unwrap(), Complex::new(3.0, 4.0));
        assert!((apply(Function::Cabs, z).unwrap().re - 5.0).abs() < EPS);
    }

    #[test]
    fn rounding_is_per_component() {
        let z = Complex::new(1.5, -1.5);
        assert_eq!(apply(Function::Floor, z).unwrap(), Complex::new(1.0, -2.0));
        assert_eq!(apply(Function::Ceil, z).unwrap(), Complex::new(2.0, -1.0));
        assert_eq!(apply(Function::Trunc, z).unwrap(), Complex::new(1.0, -1.0));
        assert_eq!(apply(Function::Round, z).unwrap(), Complex::new(2.0, -2.0));
    }

    #[test]
    fn cosxx_is_conjugated_cos() {
        let z = Complex::new(0.2, 0.3);
        assert!(close(apply(Function::CosXX, z).unwrap(), z.cos().conj()));
    }
}
