//! Formula libraries.
//!
//! A library is the text of a `.frm` file: any number of entries of the
//! form `name(SYMMETRY) { body }`, with `;` comments between and inside
//! them. Entries named `comment` hold prose and are never listed.
//!
//! Where library text comes from is abstracted by [`FormulaSource`]:
//! - the CLI reads files from disk
//! - the WASM surface receives text directly
//! - [`NullSource`] never finds anything

use crate::config::CompileOptions;
use crate::error::{CompileError, CompileResult};
use crate::normalize::ITEM_NAME_LEN;
use crate::{compile, Compiled};

/// Prefix that marks a formula reference in parameter files.
const FRM_PREFIX: &str = "frm:";

const EOF_MARK: u8 = 0x1A;

/// Somewhere formula libraries can be read from.
pub trait FormulaSource {
    /// Read a library by name, returning its text.
    ///
    /// Returns `None` if the library cannot be found.
    fn read_library(&self, name: &str) -> Option<String>;
}

/// A source that never finds any library.
pub struct NullSource;

impl FormulaSource for NullSource {
    fn read_library(&self, _name: &str) -> Option<String> {
        None
    }
}

// ---------------------------------------------------------------------------
// Library
// ---------------------------------------------------------------------------

/// One entry of a library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    /// The name as written.
    pub name: String,
    /// Byte offset of the name.
    pub start: usize,
    /// Byte offset just past the closing `}` (or the end of the text when
    /// the entry is unterminated).
    pub end: usize,
}

impl LibraryEntry {
    /// Whether this is a `comment` block.
    #[must_use]
    pub fn is_comment(&self) -> bool {
        self.name.eq_ignore_ascii_case("comment")
    }
}

/// The parsed index of a `.frm` text.
#[derive(Debug, Clone)]
pub struct FormulaLibrary {
    text: String,
    entries: Vec<LibraryEntry>,
}

impl FormulaLibrary {
    /// Index the entries of a library text.
    #[must_use]
    pub fn parse(text: impl Into<String>) -> Self {
        let text = text.into();
        let entries = scan_entries(&text);
        tracing::debug!(entries = entries.len(), "indexed formula library");
        Self { text, entries }
    }

    /// Read and index a library from a source.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::NotFound`] when the source has no such
    /// library.
    pub fn load(source: &dyn FormulaSource, name: &str) -> CompileResult<Self> {
        source
            .read_library(name)
            .map(Self::parse)
            .ok_or_else(|| CompileError::NotFound(name.to_owned()))
    }

    /// The formulas in the library, in file order, without `comment`
    /// blocks.
    pub fn entries(&self) -> impl Iterator<Item = &LibraryEntry> {
        self.entries.iter().filter(|e| !e.is_comment())
    }

    /// The full text of the named formula.
    ///
    /// Names match case-insensitively on their first 18 characters; an
    /// `frm:` prefix on either side is ignored.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&str> {
        let wanted = lookup_key(name);
        self.entries()
            .find(|e| lookup_key(&e.name) == wanted)
            .map(|e| &self.text[e.start..e.end])
    }

    /// Find and compile the named formula.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::NotFound`] when the library has no such
    /// entry, or any error from [`compile`].
    pub fn compile(&self, name: &str, options: &CompileOptions) -> CompileResult<Compiled> {
        let text = self
            .find(name)
            .ok_or_else(|| CompileError::NotFound(name.to_owned()))?;
        compile(text, options)
    }

    /// The whole library text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

fn lookup_key(name: &str) -> String {
    let name = name.trim();
    let name = match name.get(..FRM_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(FRM_PREFIX) => &name[FRM_PREFIX.len()..],
        _ => name,
    };
    name.chars()
        .take(ITEM_NAME_LEN)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Skip from `pos` to the newline ending a `;` comment.
fn skip_comment(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos] != b'\n' {
        pos += 1;
    }
    pos
}

fn scan_entries(text: &str) -> Vec<LibraryEntry> {
    let bytes = text.as_bytes();
    let len = bytes.iter().position(|&b| b == EOF_MARK).unwrap_or(bytes.len());
    let mut entries = Vec::new();
    let mut pos = 0;

    while pos < len {
        match bytes[pos] {
            b' ' | b'\t' | b'\r' | b'\n' => {
                pos += 1;
                continue;
            }
            b';' => {
                pos = skip_comment(bytes, pos);
                continue;
            }
            _ => {}
        }

        let start = pos;
        while pos < len && !matches!(bytes[pos], b'(' | b'{' | b' ' | b'\t' | b'\r' | b'\n' | b';')
        {
            pos += 1;
        }
        let name = text[start..pos].to_owned();

        let Some(open) = bytes[pos..len].iter().position(|&b| b == b'{') else {
            break;
        };
        pos += open + 1;
        let mut end = len;
        while pos < len {
            match bytes[pos] {
                b';' => pos = skip_comment(bytes, pos),
                b'}' => {
                    end = pos + 1;
                    break;
                }
                _ => pos += 1,
            }
        }
        entries.push(LibraryEntry { name, start, end });
        pos = end;
    }
    entries
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
