//! The fixed vocabulary of the formula language.
//!
//! Operators, built-in functions, predefined variables and flow-control
//! keywords all have stable numeric ids. The ids of the predefined
//! variables double as symbol-table slots, so their order is part of the
//! compiled program's contract with the evaluator.

use fractform_numeric::ops::{BinaryOp, Function};

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// Operator and separator tokens, numbered in their traditional order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Operator {
    Comma = 0,
    Ne = 1,
    Assign = 2,
    Eq = 3,
    Lt = 4,
    Le = 5,
    Gt = 6,
    Ge = 7,
    /// `|`, which opens or closes a modulus.
    Modulus = 8,
    Or = 9,
    And = 10,
    Colon = 11,
    Plus = 12,
    Minus = 13,
    Star = 14,
    Slash = 15,
    Caret = 16,
}

/// Every operator, indexed by id.
pub const OPERATORS: [Operator; 17] = [
    Operator::Comma,
    Operator::Ne,
    Operator::Assign,
    Operator::Eq,
    Operator::Lt,
    Operator::Le,
    Operator::Gt,
    Operator::Ge,
    Operator::Modulus,
    Operator::Or,
    Operator::And,
    Operator::Colon,
    Operator::Plus,
    Operator::Minus,
    Operator::Star,
    Operator::Slash,
    Operator::Caret,
];

impl Operator {
    /// Numeric id.
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Source spelling.
    #[must_use]
    pub const fn text(self) -> &'static str {
        match self {
            Self::Comma => ",",
            Self::Ne => "!=",
            Self::Assign => "=",
            Self::Eq => "==",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Modulus => "|",
            Self::Or => "||",
            Self::And => "&&",
            Self::Colon => ":",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Caret => "^",
        }
    }

    /// Look an operator up by its spelling.
    #[must_use]
    pub fn from_text(text: &str) -> Option<Self> {
        OPERATORS.into_iter().find(|op| op.text() == text)
    }

    /// The arithmetic or logical operation for infix operators.
    ///
    /// `-` maps to subtraction; the compiler decides when it is unary.
    #[must_use]
    pub const fn binary_op(self) -> Option<BinaryOp> {
        match self {
            Self::Ne => Some(BinaryOp::Ne),
            Self::Eq => Some(BinaryOp::Eq),
            Self::Lt => Some(BinaryOp::Lt),
            Self::Le => Some(BinaryOp::Le),
            Self::Gt => Some(BinaryOp::Gt),
            Self::Ge => Some(BinaryOp::Ge),
            Self::Or => Some(BinaryOp::Or),
            Self::And => Some(BinaryOp::And),
            Self::Plus => Some(BinaryOp::Add),
            Self::Minus => Some(BinaryOp::Sub),
            Self::Star => Some(BinaryOp::Mul),
            Self::Slash => Some(BinaryOp::Div),
            Self::Caret => Some(BinaryOp::Pow),
            Self::Comma | Self::Assign | Self::Modulus | Self::Colon => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Predefined variables
// ---------------------------------------------------------------------------

/// Variables every formula can read, pre-seeded at fixed slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Predefined {
    Pixel = 0,
    P1 = 1,
    P2 = 2,
    Z = 3,
    LastSqr = 4,
    Pi = 5,
    E = 6,
    Rand = 7,
    P3 = 8,
    WhiteSq = 9,
    ScrnPix = 10,
    ScrnMax = 11,
    MaxIt = 12,
    IsMand = 13,
    Center = 14,
    MagXMag = 15,
    RotSkew = 16,
    P4 = 17,
    P5 = 18,
}

impl Predefined {
    /// Every predefined variable, in slot order.
    pub const ALL: [Self; 19] = [
        Self::Pixel,
        Self::P1,
        Self::P2,
        Self::Z,
        Self::LastSqr,
        Self::Pi,
        Self::E,
        Self::Rand,
        Self::P3,
        Self::WhiteSq,
        Self::ScrnPix,
        Self::ScrnMax,
        Self::MaxIt,
        Self::IsMand,
        Self::Center,
        Self::MagXMag,
        Self::RotSkew,
        Self::P4,
        Self::P5,
    ];

    /// Number of pre-seeded slots.
    pub const COUNT: usize = Self::ALL.len();

    /// Symbol-table slot.
    #[must_use]
    pub const fn slot(self) -> usize {
        self as usize
    }

    /// Conventional spelling.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pixel => "pixel",
            Self::P1 => "p1",
            Self::P2 => "p2",
            Self::Z => "z",
            Self::LastSqr => "LastSqr",
            Self::Pi => "pi",
            Self::E => "e",
            Self::Rand => "rand",
            Self::P3 => "p3",
            Self::WhiteSq => "whitesq",
            Self::ScrnPix => "scrnpix",
            Self::ScrnMax => "scrnmax",
            Self::MaxIt => "maxit",
            Self::IsMand => "ismand",
            Self::Center => "center",
            Self::MagXMag => "magxmag",
            Self::RotSkew => "rotskew",
            Self::P4 => "p4",
            Self::P5 => "p5",
        }
    }

    /// Case-insensitive lookup.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }

    /// Whether this is one of the parameter variables the caller supplies
    /// per image (`p1`..`p5`, `ismand`).
    #[must_use]
    pub const fn is_param(self) -> bool {
        matches!(
            self,
            Self::P1 | Self::P2 | Self::P3 | Self::IsMand | Self::P4 | Self::P5
        )
    }
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

/// What a function name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Callable {
    Builtin(Function),
    /// `fn1`..`fn4`, stored as 0..=3 and bound per image.
    Param(u8),
}

/// One named function.
#[derive(Debug, Clone, Copy)]
pub struct FunctionEntry {
    pub name: &'static str,
    pub callable: Callable,
}

const fn builtin(name: &'static str, f: Function) -> FunctionEntry {
    FunctionEntry {
        name,
        callable: Callable::Builtin(f),
    }
}

const fn param(name: &'static str, index: u8) -> FunctionEntry {
    FunctionEntry {
        name,
        callable: Callable::Param(index),
    }
}

/// The callable names, in their traditional table order.
pub const FUNCTIONS: [FunctionEntry; 34] = [
    builtin("sin", Function::Sin),
    builtin("sinh", Function::Sinh),
    builtin("cos", Function::Cos),
    builtin("cosh", Function::Cosh),
    builtin("sqr", Function::Sqr),
    builtin("log", Function::Log),
    builtin("exp", Function::Exp),
    builtin("abs", Function::Abs),
    builtin("conj", Function::Conj),
    builtin("real", Function::Real),
    builtin("imag", Function::Imag),
    param("fn1", 0),
    param("fn2", 1),
    param("fn3", 2),
    param("fn4", 3),
    builtin("flip", Function::Flip),
    builtin("tan", Function::Tan),
    builtin("tanh", Function::Tanh),
    builtin("cotan", Function::Cotan),
    builtin("cotanh", Function::Cotanh),
    builtin("cosxx", Function::CosXX),
    builtin("srand", Function::Srand),
    builtin("asin", Function::Asin),
    builtin("asinh", Function::Asinh),
    builtin("acos", Function::Acos),
    builtin("acosh", Function::Acosh),
    builtin("atan", Function::Atan),
    builtin("atanh", Function::Atanh),
    builtin("sqrt", Function::Sqrt),
    builtin("cabs", Function::Cabs),
    builtin("floor", Function::Floor),
    builtin("ceil", Function::Ceil),
    builtin("trunc", Function::Trunc),
    builtin("round", Function::Round),
];

/// Number of parameter function slots.
pub const PARAM_FUNCTIONS: usize = 4;

/// Default bindings of `fn1`..`fn4`.
pub const DEFAULT_PARAM_FUNCTIONS: [Function; PARAM_FUNCTIONS] =
    [Function::Sin, Function::Sqr, Function::Sinh, Function::Cosh];

/// Look a function name up (the name must already be lower-case).
#[must_use]
pub fn lookup_function(name: &str) -> Option<Callable> {
    FUNCTIONS
        .iter()
        .find(|entry| entry.name == name)
        .map(|entry| entry.callable)
}

// ---------------------------------------------------------------------------
// Flow control
// ---------------------------------------------------------------------------

/// Conditional keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum JumpKeyword {
    If = 1,
    ElseIf = 2,
    Else = 3,
    EndIf = 4,
}

impl JumpKeyword {
    pub const ALL: [Self; 4] = [Self::If, Self::ElseIf, Self::Else, Self::EndIf];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::If => "if",
            Self::ElseIf => "elseif",
            Self::Else => "else",
            Self::EndIf => "endif",
        }
    }

    /// Lookup by lower-case name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Whether the keyword takes a parenthesised condition.
    #[must_use]
    pub const fn takes_condition(self) -> bool {
        matches!(self, Self::If | Self::ElseIf)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
