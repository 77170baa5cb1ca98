//! Diagnostics and error types for the formula compiler.
//!
//! Syntax problems are collected as [`Diagnostic`] records (statement start,
//! error offset, numbered code) and returned together. Failures that end a
//! compile attempt are a [`CompileError`].

use std::fmt;

// ---------------------------------------------------------------------------
// Error severity
// ---------------------------------------------------------------------------

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational message.
    Info,
    /// Warning (compilation continues).
    Warning,
    /// Error (the formula is rejected).
    Error,
    /// Fatal error (compilation cannot proceed at all).
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Fatal => "fatal",
        })
    }
}

// ---------------------------------------------------------------------------
// Parse error codes
// ---------------------------------------------------------------------------

/// Numbered parse errors. The numbers are stable and appear in messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ParseErrorCode {
    ShouldBeArgument = 0,
    ShouldBeOperator = 1,
    NeedAMatchingOpenParens = 2,
    NeedMoreCloseParens = 3,
    UndefinedOperator = 4,
    UndefinedFunction = 5,
    TableOverflow = 6,
    NoMatchRightParen = 7,
    NoLeftBracketFirstLine = 8,
    UnexpectedEof = 9,
    InvalidSymmetry = 10,
    FormulaTooLarge = 11,
    InsufficientMemory = 12,
    CouldNotOpenFile = 13,
    JumpNotFirst = 14,
    NoCharAfterThisJump = 15,
    JumpNeedsBoolean = 16,
    EndifRequiredAfterElse = 17,
    EndifWithNoIf = 18,
    MisplacedElseOrElseif = 19,
    UnmatchedIfInInitSection = 20,
    IfWithNoEndif = 21,
    ErrorInParsingJumpStatements = 22,
    TooManyJumps = 23,
    FormulaNameTooLarge = 24,
    IllegalAssignment = 25,
    IllegalVarName = 26,
    InvalidConst = 27,
    IllegalChar = 28,
    NestingTooDeep = 29,
    UnmatchedModulus = 30,
    FuncUsedAsVar = 31,
    NoNegAfterExponent = 32,
    TokenTooLong = 33,
    SecondColon = 34,
}

impl ParseErrorCode {
    /// Stable numeric id.
    #[must_use]
    pub const fn number(self) -> u8 {
        self as u8
    }

    /// Canonical message text.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ShouldBeArgument => "Should be an Argument",
            Self::ShouldBeOperator => "Should be an Operator",
            Self::NeedAMatchingOpenParens => "')' needs a matching '('",
            Self::NeedMoreCloseParens => "Need more ')'",
            Self::UndefinedOperator => "Undefined Operator",
            Self::UndefinedFunction => "Undefined Function",
            Self::TableOverflow => "Table overflow",
            Self::NoMatchRightParen => "Didn't find matching ')' in symmetry declaration",
            Self::NoLeftBracketFirstLine => "No '{' found on first line",
            Self::UnexpectedEof => "Unexpected EOF!",
            Self::InvalidSymmetry => "Symmetry below is invalid, will use NOSYM",
            Self::FormulaTooLarge => "Formula is too large",
            Self::InsufficientMemory => "Insufficient memory to run fractal type 'formula'",
            Self::CouldNotOpenFile => "Could not open file where formula located",
            Self::JumpNotFirst => "No characters may precede jump instruction",
            Self::NoCharAfterThisJump => "No characters may follow this jump instruction",
            Self::JumpNeedsBoolean => "Jump instruction missing required (boolean argument)",
            Self::EndifRequiredAfterElse => "Next jump after \"else\" must be \"endif\"",
            Self::EndifWithNoIf => "\"endif\" has no matching \"if\"",
            Self::MisplacedElseOrElseif => "Misplaced \"else\" or \"elseif()\"",
            Self::UnmatchedIfInInitSection => "\"if ()\" in initialization has no matching \"endif\"",
            Self::IfWithNoEndif => "\"if ()\" has no matching \"endif\"",
            Self::ErrorInParsingJumpStatements => "Error in parsing jump statements",
            Self::TooManyJumps => "Formula has too many jump commands",
            Self::FormulaNameTooLarge => "Formula name has too many characters",
            Self::IllegalAssignment => "Only variables are allowed to left of assignment",
            Self::IllegalVarName => "Illegal variable name",
            Self::InvalidConst => "Invalid constant expression",
            Self::IllegalChar => "This character not supported by parser",
            Self::NestingTooDeep => "Nesting of parentheses exceeds maximum depth",
            Self::UnmatchedModulus => "Unmatched modulus operator \"|\" in this expression",
            Self::FuncUsedAsVar => "Can't use function name as variable",
            Self::NoNegAfterExponent => "Negative exponent must be enclosed in parens",
            Self::TokenTooLong => "Variable or constant exceeds 32 character limit",
            Self::SecondColon => "Only one \":\" permitted in a formula",
        }
    }
}

impl fmt::Display for ParseErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error({}): {}", self.number(), self.message())
    }
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// One reported problem, located in the formula source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// What went wrong.
    pub code: ParseErrorCode,
    /// Byte offset where the enclosing statement starts.
    pub start: usize,
    /// Byte offset of the offending token.
    pub offset: usize,
    /// Severity.
    pub severity: Severity,
    /// Extra context (e.g. the rejected symmetry name).
    pub detail: Option<String>,
}

impl Diagnostic {
    /// Create an error-level diagnostic.
    #[must_use]
    pub const fn new(code: ParseErrorCode, start: usize, offset: usize) -> Self {
        Self {
            code,
            start,
            offset,
            severity: Severity::Error,
            detail: None,
        }
    }

    /// Set severity.
    #[must_use]
    pub const fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Attach extra context.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Canonical message text for the code.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        self.code.message()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.offset, self.code)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Compile error
// ---------------------------------------------------------------------------

/// Why a compile attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// Lexical, structural or semantic errors (at most three).
    #[error("formula rejected with {} error(s)", .0.len())]
    Rejected(Vec<Diagnostic>),
    /// The `name(symmetry) {` header is malformed.
    #[error("{0}")]
    Header(Diagnostic),
    /// Only separators between `{` and `}`.
    #[error("Formula has no executable instructions")]
    Empty,
    /// The formula exceeds a fixed capacity.
    #[error("{}: {detail}", .code.message())]
    Resource {
        code: ParseErrorCode,
        detail: String,
    },
    /// The jump table could not be linked.
    #[error("{}", ParseErrorCode::ErrorInParsingJumpStatements.message())]
    JumpResolution,
    /// The requested formula is not in the library.
    #[error("formula not found: {0}")]
    NotFound(String),
    /// The requested precision mode is unavailable or out of range.
    #[error("unsupported precision: {0}")]
    Precision(String),
    /// An internal consistency check failed.
    #[error("internal compiler error: {0}")]
    Internal(String),
}

impl CompileError {
    /// The located diagnostics carried by this error, if any.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Rejected(diags) => diags,
            Self::Header(diag) => std::slice::from_ref(diag),
            _ => &[],
        }
    }
}

/// Convenience alias for compiler results.
pub type CompileResult<T> = Result<T, CompileError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_numbered_in_order() {
        assert_eq!(ParseErrorCode::ShouldBeArgument.number(), 0);
        assert_eq!(ParseErrorCode::EndifWithNoIf.number(), 18);
        assert_eq!(ParseErrorCode::SecondColon.number(), 34);
    }

    #[test]
    fn diagnostic_display() {
        let d = Diagnostic::new(ParseErrorCode::EndifWithNoIf, 2, 10);
        assert_eq!(d.to_string(), "[10] Error(18): \"endif\" has no matching \"if\"");
        let w = Diagnostic::new(ParseErrorCode::InvalidSymmetry, 0, 5)
            .with_severity(Severity::Warning)
            .with_detail("NOTASYM");
        assert!(w.to_string().ends_with(": NOTASYM"));
        assert_eq!(w.severity, Severity::Warning);
    }

    #[test]
    fn compile_error_messages() {
        let err = CompileError::Rejected(vec![Diagnostic::new(
            ParseErrorCode::ShouldBeArgument,
            0,
            0,
        )]);
        assert_eq!(err.to_string(), "formula rejected with 1 error(s)");
        assert_eq!(err.diagnostics().len(), 1);
        let err = CompileError::Resource {
            code: ParseErrorCode::FormulaTooLarge,
            detail: "9000 characters".into(),
        };
        assert_eq!(err.to_string(), "Formula is too large: 9000 characters");
        assert!(CompileError::Empty.diagnostics().is_empty());
    }
}
