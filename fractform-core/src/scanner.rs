//! Lexer for formula bodies.
//!
//! The lexer reads the body of a formula (everything after the opening `{`)
//! one classified [`Token`] at a time. Before any token rule applies,
//! characters pass through a filter:
//!
//! | Input                | Effect                                     |
//! |----------------------|--------------------------------------------|
//! | space, tab, `\r`     | dropped everywhere, even inside names      |
//! | `\` ... newline      | line continuation: the newline is dropped  |
//! | `;` to end of line   | comment, read as a newline                 |
//! | `0x1A`               | end of file                                |
//! | `A`..`Z`             | lower-cased                                |
//!
//! Newlines, `,` and `:` are statement separators. A run of them collapses
//! into one separator (a colon if the run contains one), and a run followed
//! by `}` becomes the end-of-formula token.

use std::fmt;

use fractform_numeric::types::{Complex, Scalar};

use crate::catalog::{lookup_function, Callable, JumpKeyword, Operator, Predefined};
use crate::error::ParseErrorCode;
use crate::token::{Span, Token, TokenKind};

/// Longest accepted name or numeric literal.
pub const MAX_TOKEN_LEN: usize = 32;

/// Names are truncated to this many characters in error text.
const MAX_NAME_TEXT: usize = 79;

const EOF_MARK: u8 = 0x1A;

// ---------------------------------------------------------------------------
// Lexer error
// ---------------------------------------------------------------------------

/// Why a token could not be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorKind {
    EndOfFile,
    IllegalCharacter,
    IllegalVariableName,
    TokenTooLong,
    FuncUsedAsVar,
    JumpMissingBoolean,
    JumpWithIllegalChar,
    UndefinedFunction,
    IllegalOperator,
    IllFormedConstant,
}

impl LexErrorKind {
    /// The parse error reported for this failure.
    #[must_use]
    pub const fn code(self) -> ParseErrorCode {
        match self {
            Self::EndOfFile => ParseErrorCode::UnexpectedEof,
            Self::IllegalCharacter => ParseErrorCode::IllegalChar,
            Self::IllegalVariableName => ParseErrorCode::IllegalVarName,
            Self::TokenTooLong => ParseErrorCode::TokenTooLong,
            Self::FuncUsedAsVar => ParseErrorCode::FuncUsedAsVar,
            Self::JumpMissingBoolean => ParseErrorCode::JumpNeedsBoolean,
            Self::JumpWithIllegalChar => ParseErrorCode::NoCharAfterThisJump,
            Self::UndefinedFunction => ParseErrorCode::UndefinedFunction,
            Self::IllegalOperator => ParseErrorCode::UndefinedOperator,
            Self::IllFormedConstant => ParseErrorCode::InvalidConst,
        }
    }
}

/// A token that failed to lex, with the text read so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
    pub text: String,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lex error at {}-{}: {} ({:?})",
            self.span.start,
            self.span.end,
            self.kind.code().message(),
            self.text
        )
    }
}

impl std::error::Error for LexError {}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

/// Formula body lexer.
pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Start lexing `source` at byte offset `start`.
    #[must_use]
    pub fn new(source: &'a str, start: usize) -> Self {
        Self {
            src: source.as_bytes(),
            pos: start.min(source.len()),
        }
    }

    /// Current byte offset.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Lex the next token.
    ///
    /// # Errors
    ///
    /// Returns a [`LexError`] describing the malformed token. The lexer is
    /// left after the offending text, so lexing may continue.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        let Some((start, c)) = self.next_char() else {
            return Err(self.error(LexErrorKind::EndOfFile, self.pos, String::new()));
        };
        match c {
            b'0'..=b'9' | b'.' => self.constant(start, c),
            b'a'..=b'z' | b'_' => self.name(start, c),
            b'(' => Ok(self.open_paren(start)),
            b')' => Ok(Self::token(TokenKind::CloseParen, start, start + 1, ")")),
            b'}' => Ok(Self::token(TokenKind::EndOfFormula, start, start + 1, "}")),
            b'\n' | b',' | b':' => Ok(self.separator(start, c)),
            b'<' | b'>' | b'=' => {
                let doubled = self.accept(b'=');
                let op = match (c, doubled) {
                    (b'<', false) => Operator::Lt,
                    (b'<', true) => Operator::Le,
                    (b'>', false) => Operator::Gt,
                    (b'>', true) => Operator::Ge,
                    (_, false) => Operator::Assign,
                    (_, true) => Operator::Eq,
                };
                Ok(self.operator(op, start))
            }
            b'!' => self.required_pair(start, b'=', Operator::Ne, "!"),
            b'&' => self.required_pair(start, b'&', Operator::And, "&"),
            b'|' => {
                let op = if self.accept(b'|') {
                    Operator::Or
                } else {
                    Operator::Modulus
                };
                Ok(self.operator(op, start))
            }
            b'+' => Ok(self.operator(Operator::Plus, start)),
            b'-' => Ok(self.operator(Operator::Minus, start)),
            b'*' => Ok(self.operator(Operator::Star, start)),
            b'/' => Ok(self.operator(Operator::Slash, start)),
            b'^' => Ok(self.operator(Operator::Caret, start)),
            other => Err(self.illegal_character(start, other)),
        }
    }

    /// An unsupported character. Multi-byte characters are consumed whole.
    fn illegal_character(&mut self, start: usize, first: u8) -> LexError {
        let window = &self.src[start..(start + 4).min(self.src.len())];
        let c = window
            .utf8_chunks()
            .next()
            .and_then(|chunk| chunk.valid().chars().next())
            .filter(|c| !c.is_ascii())
            .unwrap_or_else(|| char::from(first));
        let end = start + c.len_utf8();
        self.pos = self.pos.max(end);
        LexError {
            kind: LexErrorKind::IllegalCharacter,
            span: Span::new(start, end),
            text: c.to_string(),
        }
    }

    // -- character filter --

    /// Next significant character and its offset, or `None` at end of file.
    fn next_char(&mut self) -> Option<(usize, u8)> {
        let mut line_wrap = false;
        loop {
            let at = self.pos;
            let c = *self.src.get(at)?;
            if c == EOF_MARK {
                return None;
            }
            self.pos += 1;
            let newline_at = match c {
                b'\r' | b' ' | b'\t' => continue,
                b'\\' => {
                    line_wrap = true;
                    continue;
                }
                b';' => self.skip_comment()?,
                b'\n' => at,
                other => return Some((at, other.to_ascii_lowercase())),
            };
            if !line_wrap {
                return Some((newline_at, b'\n'));
            }
            line_wrap = false;
        }
    }

    /// Skip to the end of a comment, returning the offset of its newline.
    fn skip_comment(&mut self) -> Option<usize> {
        while let Some(&c) = self.src.get(self.pos) {
            if c == EOF_MARK {
                return None;
            }
            self.pos += 1;
            if c == b'\n' {
                return Some(self.pos - 1);
            }
        }
        None
    }

    /// Consume `expected` if it is the next significant character.
    fn accept(&mut self, expected: u8) -> bool {
        let mark = self.pos;
        match self.next_char() {
            Some((_, c)) if c == expected => true,
            _ => {
                self.pos = mark;
                false
            }
        }
    }

    // -- token builders --

    fn token(kind: TokenKind, start: usize, end: usize, text: impl Into<String>) -> Token {
        Token {
            kind,
            span: Span::new(start, end),
            text: text.into(),
        }
    }

    fn operator(&self, op: Operator, start: usize) -> Token {
        Self::token(TokenKind::Operator(op), start, self.pos, op.text())
    }

    fn error(&self, kind: LexErrorKind, start: usize, text: String) -> LexError {
        LexError {
            kind,
            span: Span::new(start, self.pos.max(start)),
            text,
        }
    }

    fn required_pair(
        &mut self,
        start: usize,
        second: u8,
        op: Operator,
        alone: &str,
    ) -> Result<Token, LexError> {
        if self.accept(second) {
            Ok(self.operator(op, start))
        } else {
            Err(self.error(LexErrorKind::IllegalOperator, start, alone.to_owned()))
        }
    }

    fn separator(&mut self, start: usize, first: u8) -> Token {
        let mut colon = first == b':';
        let mut end = start + 1;
        loop {
            let mark = self.pos;
            match self.next_char() {
                Some((at, c @ (b'\n' | b',' | b':'))) => {
                    colon |= c == b':';
                    end = at + 1;
                }
                Some((at, b'}')) => {
                    return Self::token(TokenKind::EndOfFormula, start, at + 1, "}");
                }
                _ => {
                    self.pos = mark;
                    break;
                }
            }
        }
        let op = if colon { Operator::Colon } else { Operator::Comma };
        Self::token(TokenKind::Operator(op), start, end, op.text())
    }

    // -- constants --

    fn constant(&mut self, start: usize, first: u8) -> Result<Token, LexError> {
        let text = self.number_text(start, first)?;
        let value = parse_number(&text)
            .ok_or_else(|| self.error(LexErrorKind::IllFormedConstant, start, text.clone()))?;
        Ok(Self::token(TokenKind::RealConstant(value), start, self.pos, text))
    }

    /// Read the digits of a numeric literal whose first character is
    /// already consumed. The lexer is left just after the literal.
    fn number_text(&mut self, start: usize, first: u8) -> Result<String, LexError> {
        let mut text = String::from(char::from(first));
        let mut in_mantissa = true;
        let mut got_point = first == b'.';
        loop {
            let mark = self.pos;
            let Some((_, c)) = self.next_char() else {
                return Err(self.error(LexErrorKind::EndOfFile, start, text));
            };
            let last = text.as_bytes()[text.len() - 1];
            match c {
                b'0'..=b'9' => text.push(char::from(c)),
                b'.' => {
                    text.push('.');
                    if got_point || !in_mantissa {
                        return Err(self.error(LexErrorKind::IllFormedConstant, start, text));
                    }
                    got_point = true;
                }
                b'e' if in_mantissa && (last.is_ascii_digit() || (last == b'.' && text.len() > 1)) => {
                    text.push('e');
                    in_mantissa = false;
                    got_point = false;
                    let mark = self.pos;
                    match self.next_char() {
                        Some((_, sign @ (b'+' | b'-'))) => text.push(char::from(sign)),
                        _ => self.pos = mark,
                    }
                }
                c if c.is_ascii_alphabetic() || c == b'_' => {
                    text.push(char::from(c));
                    return Err(self.error(LexErrorKind::IllFormedConstant, start, text));
                }
                c if matches!(last, b'e' | b'+' | b'-') || text == "." => {
                    if c.is_ascii_graphic() {
                        text.push(char::from(c));
                    }
                    return Err(self.error(LexErrorKind::IllFormedConstant, start, text));
                }
                _ => {
                    self.pos = mark;
                    return Ok(text);
                }
            }
            if text.len() > MAX_TOKEN_LEN {
                return Err(self.error(LexErrorKind::TokenTooLong, start, text));
            }
        }
    }

    /// `(` opens either a `(re, im)` literal or a parenthesised expression.
    fn open_paren(&mut self, start: usize) -> Token {
        let after = self.pos;
        if let Some((value, text)) = self.complex_literal() {
            let kind = if value.im == 0.0 {
                TokenKind::RealConstant(value.re)
            } else {
                TokenKind::ComplexConstant(value)
            };
            return Self::token(kind, start, self.pos, text);
        }
        self.pos = after;
        Self::token(TokenKind::OpenParen, start, start + 1, "(")
    }

    fn complex_literal(&mut self) -> Option<(Complex, String)> {
        let mut text = String::from("(");
        let re = self.literal_part(&mut text)?;
        if self.next_char()?.1 != b',' {
            return None;
        }
        text.push(',');
        let im = self.literal_part(&mut text)?;
        if self.next_char()?.1 != b')' {
            return None;
        }
        text.push(')');
        Some((Complex::new(re, im), text))
    }

    fn literal_part(&mut self, text: &mut String) -> Option<Scalar> {
        let (mut at, mut c) = self.next_char()?;
        let negative = c == b'-';
        if negative {
            (at, c) = self.next_char()?;
        }
        if !(c.is_ascii_digit() || c == b'.') {
            return None;
        }
        let digits = self.number_text(at, c).ok()?;
        let value = parse_number(&digits)?;
        if negative {
            text.push('-');
        }
        text.push_str(&digits);
        Some(if negative { -value } else { value })
    }

    // -- names --

    fn name(&mut self, start: usize, first: u8) -> Result<Token, LexError> {
        let mut text = String::from(char::from(first));
        let mut end = start + 1;
        let mut too_long = false;
        loop {
            let mark = self.pos;
            let Some((at, c)) = self.next_char() else {
                return Err(self.error(LexErrorKind::EndOfFile, start, text));
            };
            if c.is_ascii_alphanumeric() || c == b'_' {
                if text.len() < MAX_NAME_TEXT {
                    text.push(char::from(c));
                }
                too_long |= text.len() > MAX_TOKEN_LEN;
                end = at + 1;
                continue;
            }
            if c == b'.' {
                text.push('.');
                return Err(self.error(LexErrorKind::IllegalVariableName, start, text));
            }
            self.pos = mark;
            if too_long {
                return Err(LexError {
                    kind: LexErrorKind::TokenTooLong,
                    span: Span::new(start, end),
                    text,
                });
            }
            return Self::classify_name(text, Span::new(start, end), c);
        }
    }

    /// Decide what a complete name means, given the character after it.
    fn classify_name(text: String, span: Span, follow: u8) -> Result<Token, LexError> {
        let fail = |kind, text| Err(LexError { kind, span, text });
        let function = lookup_function(&text);
        let keyword = JumpKeyword::from_name(&text);

        let kind = if follow == b'(' {
            match (function, keyword) {
                (Some(Callable::Builtin(f)), _) => TokenKind::Function(f),
                (Some(Callable::Param(n)), _) => TokenKind::ParamFunction(n),
                (None, Some(k)) if k.takes_condition() => TokenKind::FlowControl(k),
                (None, Some(_)) => return fail(LexErrorKind::JumpWithIllegalChar, text),
                (None, None) => return fail(LexErrorKind::UndefinedFunction, text),
            }
        } else if function.is_some() {
            return fail(LexErrorKind::FuncUsedAsVar, text);
        } else if let Some(k) = keyword {
            if k.takes_condition() {
                return fail(LexErrorKind::JumpMissingBoolean, text);
            }
            if !matches!(follow, b',' | b'\n' | b':' | b'}') {
                return fail(LexErrorKind::JumpWithIllegalChar, text);
            }
            TokenKind::FlowControl(k)
        } else {
            match Predefined::from_name(&text) {
                Some(p) if p.is_param() => TokenKind::ParamVariable(p),
                Some(p) => TokenKind::PredefinedVariable(p),
                None => TokenKind::UserVariable,
            }
        };
        Ok(Token { kind, span, text })
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    /// Yields tokens through the end of the formula; stops after `}` or
    /// at end of file.
    fn next(&mut self) -> Option<Self::Item> {
        let mark = self.pos;
        let item = self.next_token();
        match &item {
            Err(e) if e.kind == LexErrorKind::EndOfFile && mark == self.pos => {
                if self.pos >= self.src.len() || self.src[self.pos] == EOF_MARK {
                    return None;
                }
            }
            Ok(tok) if tok.kind.is_end() => self.pos = self.src.len(),
            _ => {}
        }
        Some(item)
    }
}

fn parse_number(text: &str) -> Option<Scalar> {
    text.parse::<Scalar>().ok().filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
