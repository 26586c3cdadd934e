//! String interner, symbols and the attribute table.
//!
//! All lexeme text lives in one append-only buffer owned by the table. A
//! [`LexemeId`] names a slice of that buffer and is scope-independent; a
//! [`Symbol`] pairs it with a [`Scope`]. Both are small `Copy` handles, so
//! AST nodes reference symbols without owning them.

use std::collections::HashMap;
use std::fmt;

/// Scope-independent handle for an interned lexeme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LexemeId(u32);

/// Integer scope discriminator. 0 is the global scope; each function body
/// (and finally the main body) gets the next value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scope(pub u16);

impl Scope {
    pub const GLOBAL: Scope = Scope(0);

    pub fn is_global(self) -> bool {
        self.0 == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub lexeme: LexemeId,
    pub scope: Scope,
}

impl Symbol {
    /// Unscoped equality: the same name, wherever it was declared. Used for
    /// global fallback and struct-field matching.
    pub fn same_name(self, other: Symbol) -> bool {
        self.lexeme == other.lexeme
    }

    pub fn at_global(self) -> Symbol {
        Symbol {
            lexeme: self.lexeme,
            scope: Scope::GLOBAL,
        }
    }
}

/// Semantic type tag carried by AST nodes and attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemType {
    None,
    Int,
    Real,
    Bool,
    Void,
    Str,
    Array,
    Struct,
    Fields,
    Error,
}

impl SemType {
    pub fn is_numeric(self) -> bool {
        matches!(self, SemType::Int | SemType::Real)
    }
}

impl fmt::Display for SemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SemType::None => "none",
            SemType::Int => "integer",
            SemType::Real => "real",
            SemType::Bool => "boolean",
            SemType::Void => "void",
            SemType::Str => "string",
            SemType::Array => "array",
            SemType::Struct => "struct",
            SemType::Fields => "fields",
            SemType::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// One field of a struct type.
#[derive(Debug, Clone)]
pub struct Element {
    pub name: Symbol,
    pub ty: SemType,
}

/// The semantic record bound to a symbol.
///
/// Array variables point at their array-type symbol, whose attribute is
/// [`Attribute::Struct`] pointing at the struct-type symbol, whose attribute
/// is [`Attribute::Fields`] holding the ordered field list.
#[derive(Debug, Clone)]
pub enum Attribute {
    /// integer, real or boolean variable/constant
    Scalar(SemType),
    /// array variable or array-type name; `elem` names the element type
    Array { elem: Symbol },
    /// array-type name; `fields` names the struct type
    Struct { fields: Symbol },
    /// struct-type name; the ordered field list
    Fields(Vec<Element>),
    /// function; formal parameters keep their full attributes for call checks
    Func {
        ret: SemType,
        params: Vec<Attribute>,
    },
}

impl Attribute {
    /// The tag a referencing AST node resolves to. A function resolves to
    /// its return type, matching how call expressions are typed.
    pub fn sem_type(&self) -> SemType {
        match self {
            Attribute::Scalar(t) => *t,
            Attribute::Array { .. } => SemType::Array,
            Attribute::Struct { .. } => SemType::Struct,
            Attribute::Fields(_) => SemType::Fields,
            Attribute::Func { ret, .. } => *ret,
        }
    }

    pub fn is_func(&self) -> bool {
        matches!(self, Attribute::Func { .. })
    }
}

#[derive(Debug, Clone)]
pub struct AttrEntry {
    pub attr: Attribute,
    /// Slot number assigned during TAC emission; unset until then.
    pub offset: Option<u16>,
    pub is_param: bool,
}

impl AttrEntry {
    fn new(attr: Attribute) -> Self {
        Self {
            attr,
            offset: None,
            is_param: false,
        }
    }
}

/// Registration failure: an attribute is already bound for that exact
/// (lexeme, scope) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redefinition;

/// The symbol store plus attribute table.
#[derive(Debug, Default)]
pub struct SymbolTable {
    /// Append-only lexeme text buffer.
    text: String,
    /// `LexemeId` -> (start, len) slice of `text`.
    slices: Vec<(u32, u32)>,
    seen: HashMap<String, LexemeId>,
    entries: HashMap<Symbol, AttrEntry>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `text` under `scope`. Equal text always yields the same
    /// `LexemeId`, no matter how many times or in which scope it appears.
    pub fn intern(&mut self, text: &str, scope: Scope) -> Symbol {
        let lexeme = match self.seen.get(text) {
            Some(&id) => id,
            None => {
                let start = self.text.len() as u32;
                self.text.push_str(text);
                let id = LexemeId(self.slices.len() as u32);
                self.slices.push((start, text.len() as u32));
                self.seen.insert(text.to_string(), id);
                id
            }
        };
        Symbol { lexeme, scope }
    }

    /// Look up an already-interned lexeme without adding it.
    pub fn lookup(&self, text: &str, scope: Scope) -> Option<Symbol> {
        self.seen.get(text).map(|&lexeme| Symbol { lexeme, scope })
    }

    pub fn lexeme_text(&self, id: LexemeId) -> &str {
        let (start, len) = self.slices[id.0 as usize];
        &self.text[start as usize..(start + len) as usize]
    }

    pub fn text(&self, sym: Symbol) -> &str {
        self.lexeme_text(sym.lexeme)
    }

    /// Bind an attribute to a symbol. At most one binding per (lexeme, scope)
    /// pair; a second attempt is a redefinition and leaves the first intact.
    pub fn add_attribute(&mut self, sym: Symbol, attr: Attribute) -> Result<(), Redefinition> {
        if self.entries.contains_key(&sym) {
            return Err(Redefinition);
        }
        self.entries.insert(sym, AttrEntry::new(attr));
        Ok(())
    }

    /// Exact-scope lookup, falling back to the global scope on a miss. The
    /// fallback models unshadowed globals (functions, type names, arrays)
    /// being visible from any inner scope.
    pub fn attribute(&self, sym: Symbol) -> Option<&AttrEntry> {
        self.entries
            .get(&sym)
            .or_else(|| self.entries.get(&sym.at_global()))
    }

    fn entry_mut(&mut self, sym: Symbol) -> &mut AttrEntry {
        let key = if self.entries.contains_key(&sym) {
            sym
        } else {
            sym.at_global()
        };
        self.entries
            .get_mut(&key)
            .expect("attribute queried for unregistered symbol")
    }

    // The offset/param accessors assume type resolution has already proven
    // the attribute exists; a miss here is an internal-consistency failure.

    pub fn set_offset(&mut self, sym: Symbol, offset: u16) {
        self.entry_mut(sym).offset = Some(offset);
    }

    pub fn offset(&self, sym: Symbol) -> u16 {
        self.attribute(sym)
            .expect("offset queried for unregistered symbol")
            .offset
            .expect("offset queried before address allocation")
    }

    pub fn mark_param(&mut self, sym: Symbol) {
        self.entry_mut(sym).is_param = true;
    }

    pub fn is_param(&self, sym: Symbol) -> bool {
        self.attribute(sym)
            .map(|e| e.is_param)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_deterministic_across_scopes() {
        let mut table = SymbolTable::new();
        let a = table.intern("total", Scope(0));
        let b = table.intern("total", Scope(3));
        let c = table.intern("total", Scope(0));
        assert_eq!(a.lexeme, b.lexeme);
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert!(a.same_name(b));
        assert_eq!(table.text(b), "total");
    }

    #[test]
    fn attribute_is_at_most_once() {
        let mut table = SymbolTable::new();
        let sym = table.intern("x", Scope(1));
        assert!(table.add_attribute(sym, Attribute::Scalar(SemType::Int)).is_ok());
        assert_eq!(
            table.add_attribute(sym, Attribute::Scalar(SemType::Real)),
            Err(Redefinition)
        );
        // the original binding survives
        assert_eq!(table.attribute(sym).unwrap().attr.sem_type(), SemType::Int);
    }

    #[test]
    fn same_name_different_scope_is_distinct() {
        let mut table = SymbolTable::new();
        let global = table.intern("x", Scope::GLOBAL);
        let local = table.intern("x", Scope(2));
        table
            .add_attribute(global, Attribute::Scalar(SemType::Real))
            .unwrap();
        table
            .add_attribute(local, Attribute::Scalar(SemType::Int))
            .unwrap();
        assert_eq!(
            table.attribute(local).unwrap().attr.sem_type(),
            SemType::Int
        );
        assert_eq!(
            table.attribute(global).unwrap().attr.sem_type(),
            SemType::Real
        );
    }

    #[test]
    fn lookup_falls_back_to_global_scope() {
        let mut table = SymbolTable::new();
        let global = table.intern("fn0", Scope::GLOBAL);
        table
            .add_attribute(
                global,
                Attribute::Func {
                    ret: SemType::Int,
                    params: vec![],
                },
            )
            .unwrap();
        let inner = table.intern("fn0", Scope(4));
        let entry = table.attribute(inner).expect("global fallback");
        assert!(entry.attr.is_func());
    }

    #[test]
    fn offsets_and_params() {
        let mut table = SymbolTable::new();
        let sym = table.intern("p", Scope(1));
        table
            .add_attribute(sym, Attribute::Scalar(SemType::Int))
            .unwrap();
        assert!(!table.is_param(sym));
        table.mark_param(sym);
        table.set_offset(sym, 2);
        assert!(table.is_param(sym));
        assert_eq!(table.offset(sym), 2);
    }
}
