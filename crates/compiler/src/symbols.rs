//! Lexically scoped symbol table.
//!
//! A stack of frames: global → module → function → block. Insertion
//! fails on same-scope duplicates; lookup walks inner to outer.

use crate::ast::Visibility;
use crate::token::SourceLocation;
use crate::types::{FunctionInfo, TypeInfo};
use std::collections::HashMap;

/// Which user-visible category a type symbol belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Record,
    Entity,
    Resident,
    Choice,
    Variant,
    Mutant,
    Protocol,
}

impl TypeCategory {
    pub fn describe(self) -> &'static str {
        match self {
            TypeCategory::Record => "record",
            TypeCategory::Entity => "entity",
            TypeCategory::Resident => "resident",
            TypeCategory::Choice => "choice",
            TypeCategory::Variant => "variant",
            TypeCategory::Mutant => "mutant",
            TypeCategory::Protocol => "protocol",
        }
    }

    /// Reference semantics (pointer representation) vs. value semantics.
    pub fn is_reference(self) -> bool {
        matches!(self, TypeCategory::Entity | TypeCategory::Resident)
    }
}

/// A named program element.
#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Variable {
        type_info: TypeInfo,
        mutable: bool,
        visibility: Visibility,
        origin: SourceLocation,
    },
    Function(FunctionInfo),
    TypeParameter {
        constraints: Vec<String>,
    },
    Type {
        /// Canonical name or template base name.
        name: String,
        category: TypeCategory,
        visibility: Visibility,
    },
    Namespace {
        path: Vec<String>,
    },
    /// Compile-time constant.
    Preset {
        type_info: TypeInfo,
        visibility: Visibility,
    },
}

impl Symbol {
    pub fn describe(&self) -> &'static str {
        match self {
            Symbol::Variable { .. } => "variable",
            Symbol::Function(_) => "routine",
            Symbol::TypeParameter { .. } => "type parameter",
            Symbol::Type { category, .. } => category.describe(),
            Symbol::Namespace { .. } => "namespace",
            Symbol::Preset { .. } => "preset",
        }
    }

    pub fn visibility(&self) -> Visibility {
        match self {
            Symbol::Variable { visibility, .. } => *visibility,
            Symbol::Function(f) => {
                if f.is_external { Visibility::External } else { Visibility::Public }
            }
            Symbol::Type { visibility, .. } => *visibility,
            Symbol::Preset { visibility, .. } => *visibility,
            Symbol::TypeParameter { .. } | Symbol::Namespace { .. } => Visibility::Private,
        }
    }
}

/// What a scope frame belongs to. Function frames carry the flags the
/// analyzer consults while checking the body.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeKind {
    Global,
    Module,
    Function,
    Block,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    symbols: HashMap<String, Symbol>,
    /// Insertion order for deterministic iteration (unused-variable
    /// reporting follows declaration order).
    names: Vec<String>,
}

/// Scoped stack of symbol frames.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// A fresh table with the global frame in place.
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![Scope {
                kind: ScopeKind::Global,
                symbols: HashMap::new(),
                names: Vec::new(),
            }],
        }
    }

    pub fn push(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope { kind, symbols: HashMap::new(), names: Vec::new() });
    }

    pub fn pop(&mut self) {
        debug_assert!(self.scopes.len() > 1, "popping the global scope");
        self.scopes.pop();
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Insert into the innermost scope. Fails when the name already
    /// exists in that same scope (shadowing outer scopes is fine).
    pub fn declare(&mut self, name: impl Into<String>, symbol: Symbol) -> Result<(), Symbol> {
        let name = name.into();
        let scope = self.scopes.last_mut().expect("scope stack never empty");
        if let Some(existing) = scope.symbols.get(&name) {
            return Err(existing.clone());
        }
        scope.names.push(name.clone());
        scope.symbols.insert(name, symbol);
        Ok(())
    }

    /// Inner-to-outer lookup.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|s| s.symbols.get(name))
    }

    /// Lookup restricted to the innermost scope.
    pub fn lookup_local(&self, name: &str) -> Option<&Symbol> {
        self.scopes.last().and_then(|s| s.symbols.get(name))
    }

    /// True when `name` resolves to a function-scope local (not a global
    /// or module symbol).
    pub fn is_local(&self, name: &str) -> bool {
        for scope in self.scopes.iter().rev() {
            if scope.symbols.contains_key(name) {
                return matches!(scope.kind, ScopeKind::Function | ScopeKind::Block);
            }
        }
        false
    }

    /// Names declared in the innermost scope, in declaration order.
    pub fn local_names(&self) -> Vec<String> {
        self.scopes.last().map(|s| s.names.clone()).unwrap_or_default()
    }

    /// Run `f` inside a fresh scope of the given kind.
    pub fn scoped<T>(&mut self, kind: ScopeKind, f: impl FnOnce(&mut Self) -> T) -> T {
        self.push(kind);
        let result = f(self);
        self.pop();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Protocols;

    fn var(name: &str) -> Symbol {
        let _ = name;
        Symbol::Variable {
            type_info: TypeInfo::named("s32").with_protocols(Protocols::signed_integer()),
            mutable: false,
            visibility: Visibility::Private,
            origin: SourceLocation::new(1, 1, 0, 0),
        }
    }

    #[test]
    fn same_scope_duplicates_fail() {
        let mut table = SymbolTable::new();
        assert!(table.declare("x", var("x")).is_ok());
        assert!(table.declare("x", var("x")).is_err());
    }

    #[test]
    fn inner_scopes_shadow_and_unwind() {
        let mut table = SymbolTable::new();
        table.declare("x", var("x")).unwrap();
        table.push(ScopeKind::Function);
        assert!(table.lookup("x").is_some());
        table
            .declare(
                "x",
                Symbol::Preset {
                    type_info: TypeInfo::named("s64"),
                    visibility: Visibility::Private,
                },
            )
            .unwrap();
        assert!(matches!(table.lookup("x"), Some(Symbol::Preset { .. })));
        table.pop();
        assert!(matches!(table.lookup("x"), Some(Symbol::Variable { .. })));
    }

    #[test]
    fn is_local_distinguishes_frames() {
        let mut table = SymbolTable::new();
        table.declare("global", var("global")).unwrap();
        table.push(ScopeKind::Function);
        table.declare("param", var("param")).unwrap();
        assert!(table.is_local("param"));
        assert!(!table.is_local("global"));
        table.pop();
    }
}
