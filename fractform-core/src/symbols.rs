//! Symbol table for compiled formulas.
//!
//! One ordered table holds every value slot a program reads or writes:
//! - **Predefined variables** occupy the first [`Predefined::COUNT`] slots,
//!   in catalog order, before any formula text is seen
//! - **User variables** are appended in first-use order
//! - **Constants** (numeric literals) are appended too, interned by value so
//!   repeated identical literals share one slot
//!
//! Names are matched case-insensitively; the lexer already lower-cases
//! them, so the table keys on the text as given.

use std::collections::HashMap;
use std::f64::consts::{E, PI};

use fractform_numeric::types::Complex;

use crate::catalog::Predefined;
use crate::error::{CompileError, CompileResult, ParseErrorCode};

// ---------------------------------------------------------------------------
// Symbol identifier
// ---------------------------------------------------------------------------

/// Index of a slot in the symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u32);

impl SymbolId {
    /// The slot of a predefined variable.
    #[must_use]
    pub const fn predefined(p: Predefined) -> Self {
        Self(p as u32)
    }

    /// Get the raw slot index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

// ---------------------------------------------------------------------------
// Symbol entry
// ---------------------------------------------------------------------------

/// What occupies a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Predefined(Predefined),
    /// A name introduced by the formula.
    User,
    /// A literal with a zero imaginary part.
    RealConstant,
    /// A `(re, im)` literal.
    ComplexConstant,
}

/// One slot: a name and its initial value.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    /// Lower-case name, or the literal text for constants.
    pub name: String,
    pub kind: SymbolKind,
    /// Compile-time value: the literal for constants, `pi` and `e` for
    /// those predefined slots, zero otherwise.
    pub value: Complex,
}

impl Symbol {
    /// Whether the slot holds a literal.
    #[must_use]
    pub const fn is_constant(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::RealConstant | SymbolKind::ComplexConstant
        )
    }
}

// ---------------------------------------------------------------------------
// Symbol table
// ---------------------------------------------------------------------------

/// The slot table: maps names and literal values to slots.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    entries: Vec<Symbol>,
    /// Name → slot, for variables.
    by_name: HashMap<String, SymbolId>,
    /// Bit pattern of the value → slot, for constants.
    by_value: HashMap<(u64, u64), SymbolId>,
    capacity: usize,
}

impl SymbolTable {
    /// Create a table that holds at most `capacity` slots, with every
    /// predefined variable already in place.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut table = Self {
            entries: Vec::with_capacity(capacity.min(1024)),
            by_name: HashMap::new(),
            by_value: HashMap::new(),
            capacity: capacity.max(Predefined::COUNT),
        };
        for p in Predefined::ALL {
            let value = match p {
                Predefined::Pi => Complex::new(PI, 0.0),
                Predefined::E => Complex::new(E, 0.0),
                _ => Complex::new(0.0, 0.0),
            };
            let name = p.name().to_ascii_lowercase();
            table.by_name.insert(name.clone(), SymbolId::predefined(p));
            table.entries.push(Symbol {
                name,
                kind: SymbolKind::Predefined(p),
                value,
            });
        }
        table
    }

    /// Look up a variable by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.by_name.get(name).copied()
    }

    /// Get the slot for a variable, appending it on first use.
    ///
    /// # Errors
    ///
    /// Fails with a `TableOverflow` resource error when the table is full.
    pub fn intern_variable(&mut self, name: &str) -> CompileResult<SymbolId> {
        if let Some(id) = self.lookup(name) {
            return Ok(id);
        }
        let id = self.push(Symbol {
            name: name.to_owned(),
            kind: SymbolKind::User,
            value: Complex::new(0.0, 0.0),
        })?;
        self.by_name.insert(name.to_owned(), id);
        Ok(id)
    }

    /// Get the slot for a literal value, appending it on first use.
    ///
    /// # Errors
    ///
    /// Fails with a `TableOverflow` resource error when the table is full.
    pub fn intern_constant(&mut self, value: Complex, text: &str) -> CompileResult<SymbolId> {
        let key = (value.re.to_bits(), value.im.to_bits());
        if let Some(&id) = self.by_value.get(&key) {
            return Ok(id);
        }
        let kind = if value.im == 0.0 {
            SymbolKind::RealConstant
        } else {
            SymbolKind::ComplexConstant
        };
        let id = self.push(Symbol {
            name: text.to_owned(),
            kind,
            value,
        })?;
        self.by_value.insert(key, id);
        Ok(id)
    }

    fn push(&mut self, symbol: Symbol) -> CompileResult<SymbolId> {
        if self.entries.len() >= self.capacity {
            return Err(CompileError::Resource {
                code: ParseErrorCode::TableOverflow,
                detail: format!("more than {} symbols", self.capacity),
            });
        }
        let id = u32::try_from(self.entries.len())
            .map_err(|_| CompileError::Internal("symbol index out of range".into()))?;
        self.entries.push(symbol);
        Ok(SymbolId(id))
    }

    /// Get a slot.
    #[must_use]
    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.entries.get(id.index())
    }

    /// Number of slots in use.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no slots (never true once constructed).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over slots in order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.entries.iter()
    }

    /// Number of slots of the given kind.
    #[must_use]
    pub fn count(&self, kind: SymbolKind) -> usize {
        self.entries.iter().filter(|s| s.kind == kind).count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn predefined_slots_are_seeded() {
        let table = SymbolTable::with_capacity(64);
        assert_eq!(table.len(), Predefined::COUNT);
        assert_eq!(table.lookup("z"), Some(SymbolId::predefined(Predefined::Z)));
        assert_eq!(table.lookup("lastsqr").map(SymbolId::index), Some(4));
        let pi = table.get(SymbolId::predefined(Predefined::Pi)).unwrap();
        assert_eq!(pi.value.re, PI);
        let e = table.get(SymbolId::predefined(Predefined::E)).unwrap();
        assert_eq!(e.value.re, E);
    }

    #[test]
    fn variables_append_in_first_use_order() {
        let mut table = SymbolTable::with_capacity(64);
        let a = table.intern_variable("a").unwrap();
        let b = table.intern_variable("b").unwrap();
        assert_eq!(a.index(), Predefined::COUNT);
        assert_eq!(b.index(), Predefined::COUNT + 1);
        assert_eq!(table.intern_variable("a").unwrap(), a);
        assert_eq!(table.count(SymbolKind::User), 2);
    }

    #[test]
    fn constants_are_interned_by_value() {
        let mut table = SymbolTable::with_capacity(64);
        let one = table.intern_constant(Complex::new(1.0, 0.0), "1").unwrap();
        let again = table.intern_constant(Complex::new(1.0, 0.0), "1.0").unwrap();
        let c = table.intern_constant(Complex::new(1.0, 2.0), "(1,2)").unwrap();
        assert_eq!(one, again);
        assert_ne!(one, c);
        assert_eq!(table.count(SymbolKind::RealConstant), 1);
        assert_eq!(table.count(SymbolKind::ComplexConstant), 1);
        assert!(table.get(c).unwrap().is_constant());
    }

    #[test]
    fn a_constant_never_matches_a_variable_name() {
        let mut table = SymbolTable::with_capacity(64);
        let var = table.intern_variable("e1").unwrap();
        let lit = table.intern_constant(Complex::new(10.0, 0.0), "1e1").unwrap();
        assert_ne!(var, lit);
    }

    #[test]
    fn overflow_is_a_resource_error() {
        let mut table = SymbolTable::with_capacity(Predefined::COUNT + 1);
        table.intern_variable("a").unwrap();
        let err = table.intern_variable("b").unwrap_err();
        assert!(matches!(
            err,
            CompileError::Resource {
                code: ParseErrorCode::TableOverflow,
                ..
            }
        ));
    }
}
