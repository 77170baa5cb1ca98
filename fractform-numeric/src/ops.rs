//! The precision-independent operation vocabulary and the [`NumericOps`]
//! capability trait.
//!
//! A compiled formula stores only the identifiers defined here. Before any
//! pixel is evaluated the runtime picks one `NumericOps` implementation
//! (float, fixed-point or arbitrary precision) and resolves every identifier
//! through it.
//!
//! | Identifier        | Meaning                                           |
//! |-------------------|---------------------------------------------------|
//! | [`BinaryOp`]      | `+ - * / ^`, comparisons, `&&`, `||`              |
//! | [`Function`]      | every callable (`sin`, `sqr`, ...), plus the extra |
//! |                   | targets a `fnN` slot may be bound to              |
//! | `negate`          | unary minus                                       |
//! | `modulus`         | `|z|`, the squared magnitude                      |

use std::fmt;

use crate::error::NumericResult;
use crate::types::Complex;

// ---------------------------------------------------------------------------
// Binary operators
// ---------------------------------------------------------------------------

/// Two-operand operations.
///
/// Comparisons and logic operators look at real parts only and produce
/// `(1, 0)` for true and `(0, 0)` for false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    /// Complex power `x^y = exp(y * log x)`, with `0^y = 0`.
    Pow,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    /// Source spelling of the operator.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Pow => "^",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }

    /// Whether the result is a truth value rather than arithmetic.
    #[must_use]
    pub const fn is_predicate(self) -> bool {
        !matches!(
            self,
            Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Pow
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

/// One-operand functions.
///
/// The first group is callable by name from formula text. `Recip`, `Ident`,
/// `Zero` and `One` are only reachable by binding a `fn1`..`fn4` slot to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Sin,
    Sinh,
    Cos,
    Cosh,
    /// Square; also updates the `LastSqr` variable.
    Sqr,
    Log,
    Exp,
    /// Component-wise absolute value.
    Abs,
    Conj,
    Real,
    Imag,
    /// Swap real and imaginary parts.
    Flip,
    Tan,
    Tanh,
    Cotan,
    Cotanh,
    /// `conj(cos z)`.
    CosXX,
    /// Reseed the random generator from the argument.
    Srand,
    Asin,
    Asinh,
    Acos,
    Acosh,
    Atan,
    Atanh,
    Sqrt,
    /// `sqrt(x² + y²)` on the real axis.
    Cabs,
    Floor,
    Ceil,
    Trunc,
    Round,
    Recip,
    Ident,
    Zero,
    One,
}

impl Function {
    /// Every function, in a stable order.
    pub const ALL: [Self; 34] = [
        Self::Sin,
        Self::Sinh,
        Self::Cos,
        Self::Cosh,
        Self::Sqr,
        Self::Log,
        Self::Exp,
        Self::Abs,
        Self::Conj,
        Self::Real,
        Self::Imag,
        Self::Flip,
        Self::Tan,
        Self::Tanh,
        Self::Cotan,
        Self::Cotanh,
        Self::CosXX,
        Self::Srand,
        Self::Asin,
        Self::Asinh,
        Self::Acos,
        Self::Acosh,
        Self::Atan,
        Self::Atanh,
        Self::Sqrt,
        Self::Cabs,
        Self::Floor,
        Self::Ceil,
        Self::Trunc,
        Self::Round,
        Self::Recip,
        Self::Ident,
        Self::Zero,
        Self::One,
    ];

    /// Lower-case name as written in formulas and in `fnN` bindings.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sin => "sin",
            Self::Sinh => "sinh",
            Self::Cos => "cos",
            Self::Cosh => "cosh",
            Self::Sqr => "sqr",
            Self::Log => "log",
            Self::Exp => "exp",
            Self::Abs => "abs",
            Self::Conj => "conj",
            Self::Real => "real",
            Self::Imag => "imag",
            Self::Flip => "flip",
            Self::Tan => "tan",
            Self::Tanh => "tanh",
            Self::Cotan => "cotan",
            Self::Cotanh => "cotanh",
            Self::CosXX => "cosxx",
            Self::Srand => "srand",
            Self::Asin => "asin",
            Self::Asinh => "asinh",
            Self::Acos => "acos",
            Self::Acosh => "acosh",
            Self::Atan => "atan",
            Self::Atanh => "atanh",
            Self::Sqrt => "sqrt",
            Self::Cabs => "cabs",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Trunc => "trunc",
            Self::Round => "round",
            Self::Recip => "recip",
            Self::Ident => "ident",
            Self::Zero => "zero",
            Self::One => "one",
        }
    }

    /// Look a function up by its (case-insensitive) name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    }

    /// Whether a `fnN` slot may be bound to this function.
    #[must_use]
    pub const fn is_bindable(self) -> bool {
        !matches!(self, Self::Srand)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Capability trait
// ---------------------------------------------------------------------------

/// The full set of numeric operations a compiled formula needs.
///
/// Implemented once per precision mode. The runtime is generic over this
/// trait, so the dispatch from identifier to implementation is resolved
/// when the evaluator is built, not per instruction.
pub trait NumericOps {
    /// The complex value representation.
    type Value: Clone + fmt::Debug;

    /// Short human-readable name of the representation.
    fn name(&self) -> &'static str;

    /// Convert a double-precision value into this representation.
    fn from_complex(&self, z: Complex) -> NumericResult<Self::Value>;

    /// Convert a value back to double precision (may lose precision).
    fn to_complex(&self, value: &Self::Value) -> Complex;

    /// The value `(0, 0)`.
    fn zero(&self) -> Self::Value;

    /// Convert a pixel coordinate. Backends with a narrow range may clamp.
    fn pixel(&self, z: Complex) -> NumericResult<Self::Value> {
        self.from_complex(z)
    }

    /// Apply a binary operator.
    fn binary(&self, op: BinaryOp, lhs: &Self::Value, rhs: &Self::Value)
        -> NumericResult<Self::Value>;

    /// Unary minus.
    fn negate(&self, value: &Self::Value) -> NumericResult<Self::Value>;

    /// `|z|`: the squared magnitude on the real axis.
    fn modulus(&self, value: &Self::Value) -> NumericResult<Self::Value>;

    /// Apply a one-operand function. `Srand` is handled by the caller and
    /// behaves as the identity here.
    fn apply(&self, function: Function, value: &Self::Value) -> NumericResult<Self::Value>;

    /// Square a value, also returning the squared magnitude written to
    /// `LastSqr`.
    fn square(&self, value: &Self::Value) -> NumericResult<(Self::Value, Self::Value)> {
        Ok((self.apply(Function::Sqr, value)?, self.modulus(value)?))
    }

    /// Whether the real part is exactly zero (false for conditions,
    /// "escaped" for the bailout test).
    fn is_false(&self, value: &Self::Value) -> bool;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn function_names_are_unique() {
        let mut seen = HashSet::new();
        for f in Function::ALL {
            assert!(seen.insert(f.name()), "duplicate function name: {f}");
        }
    }

    #[test]
    fn function_lookup_is_case_insensitive() {
        assert_eq!(Function::from_name("SIN"), Some(Function::Sin));
        assert_eq!(Function::from_name("CosXX"), Some(Function::CosXX));
        assert_eq!(Function::from_name("nope"), None);
    }

    #[test]
    fn srand_is_not_bindable() {
        assert!(!Function::Srand.is_bindable());
        assert!(Function::Recip.is_bindable());
    }

    #[test]
    fn predicates() {
        assert!(BinaryOp::Lt.is_predicate());
        assert!(BinaryOp::Or.is_predicate());
        assert!(!BinaryOp::Pow.is_predicate());
        assert_eq!(BinaryOp::Le.to_string(), "<=");
    }
}
