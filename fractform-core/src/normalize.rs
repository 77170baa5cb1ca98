//! Formula header checking and body normalization.
//!
//! A formula entry reads `name(SYMMETRY) { body }`. The header must fit on
//! the first line; the symmetry is optional and falls back to
//! [`Symmetry::NoSym`] (with a warning) when unrecognized.
//!
//! [`prepare`] turns the body into a dense token stream: leading separators
//! are dropped and the lexer already collapses separator runs, so the result
//! has exactly one separator between statements and ends with the
//! end-of-formula token.

use std::fmt;

use crate::catalog::Operator;
use crate::error::{CompileError, CompileResult, Diagnostic, ParseErrorCode, Severity};
use crate::scanner::Lexer;
use crate::token::{Token, TokenKind};

/// Longest formula name.
pub const ITEM_NAME_LEN: usize = 18;

/// Largest accepted body, in significant characters.
pub const MAX_FORMULA_CHARS: usize = 8190;

/// Characters of the symmetry keyword that are kept.
const MAX_SYMMETRY_CHARS: usize = 19;

// ---------------------------------------------------------------------------
// Symmetry
// ---------------------------------------------------------------------------

/// Declared symmetry of a formula, with its traditional numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Symmetry {
    #[default]
    NoSym,
    XAxisNoParm,
    XAxis,
    YAxisNoParm,
    YAxis,
    XyAxisNoParm,
    XyAxis,
    OriginNoParm,
    Origin,
    PiSymNoParm,
    PiSym,
    XAxisNoImag,
    XAxisNoReal,
    NoPlot,
}

impl Symmetry {
    pub const ALL: [Self; 14] = [
        Self::NoSym,
        Self::XAxisNoParm,
        Self::XAxis,
        Self::YAxisNoParm,
        Self::YAxis,
        Self::XyAxisNoParm,
        Self::XyAxis,
        Self::OriginNoParm,
        Self::Origin,
        Self::PiSymNoParm,
        Self::PiSym,
        Self::XAxisNoImag,
        Self::XAxisNoReal,
        Self::NoPlot,
    ];

    /// Keyword as written in a header.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::NoSym => "NOSYM",
            Self::XAxisNoParm => "XAXIS_NOPARM",
            Self::XAxis => "XAXIS",
            Self::YAxisNoParm => "YAXIS_NOPARM",
            Self::YAxis => "YAXIS",
            Self::XyAxisNoParm => "XYAXIS_NOPARM",
            Self::XyAxis => "XYAXIS",
            Self::OriginNoParm => "ORIGIN_NOPARM",
            Self::Origin => "ORIGIN",
            Self::PiSymNoParm => "PI_SYM_NOPARM",
            Self::PiSym => "PI_SYM",
            Self::XAxisNoImag => "XAXIS_NOIMAG",
            Self::XAxisNoReal => "XAXIS_NOREAL",
            Self::NoPlot => "NOPLOT",
        }
    }

    /// Traditional numeric code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::NoSym => 0,
            Self::XAxisNoParm => -1,
            Self::XAxis => 1,
            Self::YAxisNoParm => -2,
            Self::YAxis => 2,
            Self::XyAxisNoParm => -3,
            Self::XyAxis => 3,
            Self::OriginNoParm => -4,
            Self::Origin => 4,
            Self::PiSymNoParm => -5,
            Self::PiSym => 5,
            Self::XAxisNoImag => -6,
            Self::XAxisNoReal => 6,
            Self::NoPlot => 99,
        }
    }

    /// Case-insensitive keyword lookup.
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.keyword().eq_ignore_ascii_case(keyword))
    }
}

impl fmt::Display for Symmetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// The checked `name(SYMMETRY) {` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub symmetry: Symmetry,
    /// Byte offset just past the opening `{`.
    pub body_start: usize,
    /// Warning for an unrecognized symmetry keyword.
    pub warning: Option<Diagnostic>,
}

/// Validate the header of a formula entry.
///
/// # Errors
///
/// Returns [`CompileError::Header`] when the name is too long, the header
/// runs past the first line or the end of the text, or the symmetry
/// declaration has no closing `)`.
pub fn check_header(source: &str, report_bad_symmetry: bool) -> CompileResult<Header> {
    let bytes = source.as_bytes();
    let fail = |code, at| {
        Err(CompileError::Header(
            Diagnostic::new(code, 0, at).with_severity(Severity::Fatal),
        ))
    };

    let mut pos = 0;
    // byte range of the name; every delimiter is ASCII
    let mut name_span: Option<(usize, usize)> = None;
    let mut at_end_of_name = false;
    let stop = loop {
        let Some(&c) = bytes.get(pos) else {
            return fail(ParseErrorCode::UnexpectedEof, pos);
        };
        pos += 1;
        match c {
            b'\r' | b'\n' => return fail(ParseErrorCode::NoLeftBracketFirstLine, pos - 1),
            b' ' | b'\t' => at_end_of_name |= name_span.is_some(),
            b'(' | b'{' => break c,
            _ if !at_end_of_name => {
                name_span = Some((name_span.map_or(pos - 1, |(start, _)| start), pos));
            }
            _ => {}
        }
    };
    let name = name_span
        .and_then(|(start, end)| source.get(start..end))
        .unwrap_or_default()
        .to_owned();
    if name.chars().count() > ITEM_NAME_LEN {
        return Err(CompileError::Header(
            Diagnostic::new(ParseErrorCode::FormulaNameTooLarge, 0, 0)
                .with_severity(Severity::Fatal)
                .with_detail(name),
        ));
    }

    let mut symmetry = Symmetry::NoSym;
    let mut warning = None;
    if stop == b'(' {
        let sym_start = pos;
        loop {
            let Some(&c) = bytes.get(pos) else {
                return fail(ParseErrorCode::UnexpectedEof, pos);
            };
            pos += 1;
            match c {
                b'\r' | b'\n' => return fail(ParseErrorCode::NoLeftBracketFirstLine, pos - 1),
                b'{' => return fail(ParseErrorCode::NoMatchRightParen, pos - 1),
                b')' => break,
                _ => {}
            }
        }
        let keyword: String = source
            .get(sym_start..pos - 1)
            .unwrap_or_default()
            .chars()
            .filter(|c| !matches!(c, ' ' | '\t'))
            .take(MAX_SYMMETRY_CHARS)
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match Symmetry::from_keyword(&keyword) {
            Some(s) => symmetry = s,
            None => {
                tracing::warn!(formula = %name, symmetry = %keyword, "invalid symmetry, using NOSYM");
                if report_bad_symmetry {
                    warning = Some(
                        Diagnostic::new(ParseErrorCode::InvalidSymmetry, 0, sym_start)
                            .with_severity(Severity::Warning)
                            .with_detail(keyword),
                    );
                }
            }
        }
    }

    if stop != b'{' {
        loop {
            let Some(&c) = bytes.get(pos) else {
                return fail(ParseErrorCode::UnexpectedEof, pos);
            };
            pos += 1;
            match c {
                b'\r' | b'\n' => return fail(ParseErrorCode::NoLeftBracketFirstLine, pos - 1),
                b'{' => break,
                _ => {}
            }
        }
    }

    Ok(Header {
        name,
        symmetry,
        body_start: pos,
        warning,
    })
}

// ---------------------------------------------------------------------------
// Body normalization
// ---------------------------------------------------------------------------

/// A formula body as a dense statement stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// Tokens through the end-of-formula token.
    pub tokens: Vec<Token>,
}

impl Normalized {
    /// The body with whitespace and comments removed and one separator
    /// between statements.
    #[must_use]
    pub fn dense_text(&self) -> String {
        self.tokens
            .iter()
            .filter(|t| !t.kind.is_end())
            .map(|t| t.text.as_str())
            .collect()
    }

    /// Number of significant characters.
    #[must_use]
    pub fn chars(&self) -> usize {
        self.tokens
            .iter()
            .filter(|t| !t.kind.is_end())
            .map(|t| t.text.len())
            .sum()
    }
}

/// Re-lex a body that has passed the prescan into its dense form.
///
/// # Errors
///
/// - [`CompileError::Empty`] when the body holds no statements
/// - [`CompileError::Resource`] when it exceeds [`MAX_FORMULA_CHARS`]
/// - [`CompileError::Internal`] on a lexical error the prescan should
///   already have rejected
pub fn prepare(source: &str, body_start: usize) -> CompileResult<Normalized> {
    let mut tokens = Vec::new();
    for item in Lexer::new(source, body_start) {
        let token = item.map_err(|e| CompileError::Internal(format!("prepare: {e}")))?;
        if tokens.is_empty() && token.kind == TokenKind::Operator(Operator::Comma) {
            continue;
        }
        let end = token.kind.is_end();
        tokens.push(token);
        if end {
            break;
        }
    }

    match tokens.first() {
        None => return Err(CompileError::Internal("prepare: missing end of formula".into())),
        Some(t) if t.kind.is_end() => return Err(CompileError::Empty),
        Some(_) => {}
    }
    if !tokens.last().is_some_and(|t| t.kind.is_end()) {
        return Err(CompileError::Internal("prepare: missing end of formula".into()));
    }

    let normalized = Normalized { tokens };
    let chars = normalized.chars();
    if chars > MAX_FORMULA_CHARS {
        return Err(CompileError::Resource {
            code: ParseErrorCode::FormulaTooLarge,
            detail: format!("{chars} characters"),
        });
    }
    Ok(normalized)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
