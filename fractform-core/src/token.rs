//! Token types for the formula lexer.
//!
//! A token is classified as soon as it is read: the lexer already knows
//! whether a name is a function, a flow-control keyword, a predefined slot
//! or a user variable, and it decodes numeric literals in place.
//!
//! | Source              | Kind                                   |
//! |---------------------|----------------------------------------|
//! | `1.5`, `.2e-3`      | `RealConstant`                         |
//! | `(1, -2)`           | `ComplexConstant` (or `RealConstant` when the imaginary part is 0) |
//! | `sin(`, `fn2(`      | `Function`, `ParamFunction`            |
//! | `pixel`, `p1`       | `PredefinedVariable`, `ParamVariable`  |
//! | `foo`               | `UserVariable`                         |
//! | `if(`, `else`       | `FlowControl`                          |
//! | `+`, `<=`, `,`      | `Operator`                             |
//! | `}` after separators| `EndOfFormula`                         |

use fractform_numeric::ops::Function;
use fractform_numeric::types::{Complex, Scalar};

use crate::catalog::{JumpKeyword, Operator, Predefined};

// ---------------------------------------------------------------------------
// Source location
// ---------------------------------------------------------------------------

/// A byte-offset span in the formula source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Create a new span.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// A zero-length span at the given position.
    #[must_use]
    pub const fn at(pos: usize) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    /// Length in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the span is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// A classified lexical unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind and payload of the token.
    pub kind: TokenKind,
    /// Source location, from the first to the last significant character.
    pub span: Span,
    /// Dense lower-case text: whitespace, comments and continuations removed.
    pub text: String,
}

/// The kind and payload of a token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind {
    Operator(Operator),
    /// A built-in function name immediately followed by `(`.
    Function(Function),
    /// `fn1`..`fn4`, stored as 0..=3.
    ParamFunction(u8),
    /// `p1`..`p5` and `ismand`.
    ParamVariable(Predefined),
    PredefinedVariable(Predefined),
    /// A name the formula introduces; the token text is the name.
    UserVariable,
    RealConstant(Scalar),
    ComplexConstant(Complex),
    FlowControl(JumpKeyword),
    OpenParen,
    CloseParen,
    /// The closing `}` together with any separators before it.
    EndOfFormula,
}

impl TokenKind {
    /// Whether this is a statement separator (`,` or `:`).
    #[must_use]
    pub const fn is_separator(&self) -> bool {
        matches!(self, Self::Operator(Operator::Comma | Operator::Colon))
    }

    /// Whether this token loads a value: any variable or constant.
    #[must_use]
    pub const fn is_operand(&self) -> bool {
        matches!(
            self,
            Self::ParamVariable(_)
                | Self::PredefinedVariable(_)
                | Self::UserVariable
                | Self::RealConstant(_)
                | Self::ComplexConstant(_)
        )
    }

    /// Whether this token names a variable slot.
    #[must_use]
    pub const fn is_variable(&self) -> bool {
        matches!(
            self,
            Self::ParamVariable(_) | Self::PredefinedVariable(_) | Self::UserVariable
        )
    }

    /// Whether this is the end of the formula.
    #[must_use]
    pub const fn is_end(&self) -> bool {
        matches!(self, Self::EndOfFormula)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
