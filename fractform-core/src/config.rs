//! Compile and evaluation settings.
//!
//! | Type             | Supplied                    | Bound into                    |
//! |------------------|-----------------------------|-------------------------------|
//! | [`Precision`]    | once per evaluator          | the numeric backend           |
//! | [`FormulaParams`]| once per image              | `p1..p5`, `maxit`, `fn1..fn4` |
//! | [`PixelInput`]   | once per pixel              | `pixel`, `scrnpix`, `whitesq` |
//! | [`CompileOptions`]| once per compile           | header checking               |

use std::fmt;
use std::str::FromStr;

use fractform_numeric::ops::Function;
use fractform_numeric::types::{Complex, DEFAULT_BITSHIFT};

use crate::catalog::{DEFAULT_PARAM_FUNCTIONS, PARAM_FUNCTIONS};
use crate::error::CompileError;

// ---------------------------------------------------------------------------
// Precision
// ---------------------------------------------------------------------------

/// Numeric representation used to evaluate a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    /// Double-precision floating point.
    #[default]
    Float,
    /// Scaled 32-bit integers with `bitshift` fractional bits.
    Fixed { bitshift: u32 },
    /// Arbitrary precision with `digits` decimal digits.
    Arbitrary { digits: u32 },
}

impl Precision {
    /// Fixed point with the default fractional width.
    #[must_use]
    pub const fn fixed() -> Self {
        Self::Fixed {
            bitshift: DEFAULT_BITSHIFT,
        }
    }

    /// Width of the fractions produced by `rand`.
    #[must_use]
    pub const fn rand_bitshift(self) -> u32 {
        match self {
            Self::Fixed { bitshift } => bitshift,
            Self::Float | Self::Arbitrary { .. } => DEFAULT_BITSHIFT,
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float => f.write_str("float"),
            Self::Fixed { bitshift } => write!(f, "fixed:{bitshift}"),
            Self::Arbitrary { digits } => write!(f, "arbitrary:{digits}"),
        }
    }
}

impl FromStr for Precision {
    type Err = CompileError;

    /// Accepts `float`, `fixed`, `fixed:<bits>` and `arbitrary:<digits>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || CompileError::Precision(s.to_owned());
        let lower = s.trim().to_ascii_lowercase();
        let (mode, arg) = match lower.split_once(':') {
            Some((mode, arg)) => (mode, Some(arg)),
            None => (lower.as_str(), None),
        };
        let number = |arg: &str| arg.trim().parse::<u32>().map_err(|_| bad());
        match (mode, arg) {
            ("float", None) => Ok(Self::Float),
            ("fixed", None) => Ok(Self::fixed()),
            ("fixed", Some(arg)) => Ok(Self::Fixed {
                bitshift: number(arg)?,
            }),
            ("arbitrary", Some(arg)) => Ok(Self::Arbitrary {
                digits: number(arg)?,
            }),
            _ => Err(bad()),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-image parameters
// ---------------------------------------------------------------------------

/// Values bound into a program once per image.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaParams {
    /// `p1`..`p5`.
    pub params: [Complex; 5],
    pub maxit: u32,
    pub ismand: bool,
    /// Image width and height in pixels (`scrnmax`).
    pub screen: (u32, u32),
    pub center: Complex,
    /// Magnification and x-magnification factor (`magxmag`).
    pub magxmag: (f64, f64),
    /// Rotation and skew in degrees (`rotskew`).
    pub rotskew: (f64, f64),
    /// Bindings of `fn1`..`fn4`.
    pub functions: [Function; PARAM_FUNCTIONS],
    /// Seed for `rand` when the formula does not call `srand`. `None`
    /// seeds from system entropy when the formula reads `rand` and the
    /// `entropy` feature is on, and from a fixed seed otherwise.
    pub rand_seed: Option<u64>,
}

impl Default for FormulaParams {
    fn default() -> Self {
        Self {
            params: [Complex::new(0.0, 0.0); 5],
            maxit: 150,
            ismand: true,
            screen: (640, 480),
            center: Complex::new(0.0, 0.0),
            magxmag: (1.0, 1.0),
            rotskew: (0.0, 0.0),
            functions: DEFAULT_PARAM_FUNCTIONS,
            rand_seed: None,
        }
    }
}

impl FormulaParams {
    /// Set `p1`..`p5` by position (1-based).
    #[must_use]
    pub fn with_param(mut self, n: usize, value: Complex) -> Self {
        if let Some(slot) = n.checked_sub(1).and_then(|i| self.params.get_mut(i)) {
            *slot = value;
        }
        self
    }

    #[must_use]
    pub const fn with_maxit(mut self, maxit: u32) -> Self {
        self.maxit = maxit;
        self
    }

    #[must_use]
    pub const fn with_ismand(mut self, ismand: bool) -> Self {
        self.ismand = ismand;
        self
    }

    #[must_use]
    pub const fn with_screen(mut self, width: u32, height: u32) -> Self {
        self.screen = (width, height);
        self
    }

    /// Bind `fnN` (1-based) to a function.
    #[must_use]
    pub fn with_function(mut self, n: usize, function: Function) -> Self {
        if let Some(slot) = n.checked_sub(1).and_then(|i| self.functions.get_mut(i)) {
            *slot = function;
        }
        self
    }

    #[must_use]
    pub const fn with_rand_seed(mut self, seed: u64) -> Self {
        self.rand_seed = Some(seed);
        self
    }
}

// ---------------------------------------------------------------------------
// Per-pixel input
// ---------------------------------------------------------------------------

/// Values bound into a program before each pixel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelInput {
    /// The complex coordinate of the pixel.
    pub pixel: Complex,
    pub col: u32,
    pub row: u32,
}

impl PixelInput {
    #[must_use]
    pub const fn new(pixel: Complex, col: u32, row: u32) -> Self {
        Self { pixel, col, row }
    }

    /// A pixel coordinate with no screen position.
    #[must_use]
    pub const fn at(pixel: Complex) -> Self {
        Self::new(pixel, 0, 0)
    }

    /// `whitesq`: 1 on the white squares of a checkerboard.
    #[must_use]
    pub const fn white_square(&self) -> bool {
        (self.row.wrapping_add(self.col)) & 1 == 1
    }
}

// ---------------------------------------------------------------------------
// Compile options
// ---------------------------------------------------------------------------

/// Switches for a compile attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Report an unknown symmetry as a warning diagnostic.
    pub report_bad_symmetry: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            report_bad_symmetry: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precision_from_str() {
        assert_eq!("float".parse::<Precision>().unwrap(), Precision::Float);
        assert_eq!("FIXED".parse::<Precision>().unwrap(), Precision::fixed());
        assert_eq!(
            "fixed:24".parse::<Precision>().unwrap(),
            Precision::Fixed { bitshift: 24 }
        );
        assert_eq!(
            "arbitrary:50".parse::<Precision>().unwrap(),
            Precision::Arbitrary { digits: 50 }
        );
        assert!("arbitrary".parse::<Precision>().is_err());
        assert!("fixed:x".parse::<Precision>().is_err());
        assert!("double".parse::<Precision>().is_err());
    }

    #[test]
    fn precision_display_round_trips() {
        for p in [
            Precision::Float,
            Precision::Fixed { bitshift: 20 },
            Precision::Arbitrary { digits: 40 },
        ] {
            assert_eq!(p.to_string().parse::<Precision>().unwrap(), p);
        }
    }

    #[test]
    fn rand_width_follows_fixed_bitshift() {
        assert_eq!(Precision::Fixed { bitshift: 20 }.rand_bitshift(), 20);
        assert_eq!(Precision::Float.rand_bitshift(), DEFAULT_BITSHIFT);
    }

    #[test]
    fn param_setters_are_one_based() {
        let params = FormulaParams::default()
            .with_param(2, Complex::new(1.0, 2.0))
            .with_param(9, Complex::new(5.0, 5.0))
            .with_function(4, Function::Exp);
        assert_eq!(params.params[1], Complex::new(1.0, 2.0));
        assert_eq!(params.functions[3], Function::Exp);
        assert_eq!(params.functions[0], Function::Sin);
    }

    #[test]
    fn checkerboard() {
        assert!(!PixelInput::new(Complex::new(0.0, 0.0), 0, 0).white_square());
        assert!(PixelInput::new(Complex::new(0.0, 0.0), 1, 0).white_square());
        assert!(!PixelInput::new(Complex::new(0.0, 0.0), 3, 5).white_square());
    }
}
