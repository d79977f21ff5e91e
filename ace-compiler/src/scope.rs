//! Identifiers and scopes (spec §3.2, §3.4).

use std::collections::HashMap;

use ace_ast::Expr;
use ace_diagnostics::SourceLocation;

use crate::types::TypeId;

bitflags::bitflags! {
    /// Bit-flags carried by every identifier (spec §3.2).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IdentifierFlags: u8 {
        const CONST = 1 << 0;
        const DECLARED_IN_FUNCTION = 1 << 1;
        const GENERIC = 1 << 2;
    }
}

/// A named binding in a scope (spec §3.2).
#[derive(Debug, Clone)]
pub struct Identifier {
    pub name: String,
    /// Index within its owning scope's identifier table.
    pub index: usize,
    /// Stack slot, assigned at emission time (`None` until then).
    pub stack_slot: Option<u32>,
    pub use_count: u32,
    pub flags: IdentifierFlags,
    pub type_id: TypeId,
    /// Current value, for compile-time constant folding of `const` bindings.
    pub current_value: Option<Expr>,
}

impl Identifier {
    pub fn new(name: impl Into<String>, index: usize, type_id: TypeId) -> Self {
        Self {
            name: name.into(),
            index,
            stack_slot: None,
            use_count: 0,
            flags: IdentifierFlags::empty(),
            type_id,
            current_value: None,
        }
    }

    pub fn is_const(&self) -> bool {
        self.flags.contains(IdentifierFlags::CONST)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Normal,
    Function,
    TypeDefinition,
    Loop,
}

bitflags::bitflags! {
    /// Function-related flags carried by a function scope.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FunctionFlags: u8 {
        const PURE = 1 << 0;
        const CLOSURE = 1 << 1;
        const GENERATOR = 1 << 2;
    }
}

/// Owns an identifier table and a (locally visible) type-name table, plus
/// function-scope bookkeeping for return-type unification and closure
/// capture (spec §3.4).
#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub function_flags: FunctionFlags,
    identifiers: Vec<Identifier>,
    by_name: HashMap<String, usize>,
    types_by_name: HashMap<String, TypeId>,
    /// Return types seen so far in a function scope, each with the location
    /// of the `return` statement that produced it.
    pub return_types: Vec<(TypeId, SourceLocation)>,
    /// Free variables captured from an enclosing function, recorded here on
    /// the *enclosing* function's scope (spec §4.2 closure capture rule).
    pub captures: Vec<String>,
}

impl Scope {
    pub fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            function_flags: FunctionFlags::empty(),
            identifiers: Vec::new(),
            by_name: HashMap::new(),
            types_by_name: HashMap::new(),
            return_types: Vec::new(),
            captures: Vec::new(),
        }
    }

    /// Declares a new identifier in this scope. Returns `None` if the name
    /// is already declared here (caller reports `Redeclared`).
    pub fn declare(&mut self, name: impl Into<String>, type_id: TypeId) -> Option<&mut Identifier> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return None;
        }
        let index = self.identifiers.len();
        self.identifiers.push(Identifier::new(name.clone(), index, type_id));
        self.by_name.insert(name, index);
        self.identifiers.last_mut()
    }

    pub fn lookup(&self, name: &str) -> Option<&Identifier> {
        self.by_name.get(name).and_then(|&i| self.identifiers.get(i))
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Identifier> {
        match self.by_name.get(name) {
            Some(&i) => self.identifiers.get_mut(i),
            None => None,
        }
    }

    pub fn declare_type(&mut self, name: impl Into<String>, type_id: TypeId) {
        self.types_by_name.insert(name.into(), type_id);
    }

    pub fn lookup_type(&self, name: &str) -> Option<TypeId> {
        self.types_by_name.get(name).copied()
    }

    pub fn identifiers(&self) -> &[Identifier] {
        &self.identifiers
    }

    pub fn is_function_scope(&self) -> bool {
        self.kind == ScopeKind::Function
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeTable;

    #[test]
    fn redeclaration_in_same_scope_is_rejected() {
        let table = TypeTable::with_builtins();
        let mut scope = Scope::new(ScopeKind::Normal);
        assert!(scope.declare("x", table.builtins.int).is_some());
        assert!(scope.declare("x", table.builtins.float).is_none());
    }

    #[test]
    fn lookup_finds_declared_identifier() {
        let table = TypeTable::with_builtins();
        let mut scope = Scope::new(ScopeKind::Normal);
        scope.declare("y", table.builtins.string);
        assert_eq!(scope.lookup("y").unwrap().type_id, table.builtins.string);
        assert!(scope.lookup("z").is_none());
    }
}
