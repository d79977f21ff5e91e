//! The module tree (spec §3.5).
//!
//! Modules form a rooted tree; the root is the "global" module created by
//! `ModuleTree::new`. Each module owns a stack-like vector of `Scope`s
//! (innermost last) plus links to its parent and named children so sibling
//! modules can be looked up by name (needed for `module::name` references
//! and import splicing).

use std::collections::HashMap;

use ace_diagnostics::SourceLocation;

use crate::scope::{Scope, ScopeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(usize);

pub struct Module {
    pub name: String,
    pub location: SourceLocation,
    pub parent: Option<ModuleId>,
    pub children: HashMap<String, ModuleId>,
    /// Innermost-first stack of open scopes; index 0 is the module's own
    /// top-level scope, which is never popped.
    scopes: Vec<Scope>,
}

impl Module {
    fn new(name: impl Into<String>, location: SourceLocation, parent: Option<ModuleId>) -> Self {
        Self {
            name: name.into(),
            location,
            parent,
            children: HashMap::new(),
            scopes: vec![Scope::new(ScopeKind::Normal)],
        }
    }

    pub fn push_scope(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope::new(kind));
    }

    pub fn pop_scope(&mut self) -> Scope {
        assert!(self.scopes.len() > 1, "cannot pop a module's top-level scope");
        self.scopes.pop().expect("scope stack non-empty after length check")
    }

    pub fn current_scope(&self) -> &Scope {
        self.scopes.last().expect("a module always has at least one scope")
    }

    pub fn current_scope_mut(&mut self) -> &mut Scope {
        self.scopes.last_mut().expect("a module always has at least one scope")
    }

    /// Innermost-first iterator over this module's open scopes.
    pub fn scopes(&self) -> impl DoubleEndedIterator<Item = &Scope> {
        self.scopes.iter().rev()
    }

    /// Innermost-first mutable iterator, for use-count bookkeeping.
    pub fn scopes_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut Scope> {
        self.scopes.iter_mut().rev()
    }

    /// Direct access to a scope by its position in the underlying stack
    /// (0 = the module's own top-level scope), for the closure-capture rule.
    pub fn scope_at_mut(&mut self, index: usize) -> Option<&mut Scope> {
        self.scopes.get_mut(index)
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

/// Owns every module created during compilation, arena-style, with the
/// global module at `ModuleTree::root()`.
pub struct ModuleTree {
    modules: Vec<Module>,
    root: ModuleId,
}

impl ModuleTree {
    pub fn new() -> Self {
        let root = Module::new("<global>", SourceLocation::unknown(), None);
        Self { modules: vec![root], root: ModuleId(0) }
    }

    pub fn root(&self) -> ModuleId {
        self.root
    }

    pub fn get(&self, id: ModuleId) -> &Module {
        &self.modules[id.0]
    }

    pub fn get_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.0]
    }

    /// Declares a new child module under `parent`, or returns the existing
    /// one of the same name (re-opening a `module Foo { ... }` block).
    pub fn declare_module(&mut self, parent: ModuleId, name: &str, location: SourceLocation) -> ModuleId {
        if let Some(&existing) = self.modules[parent.0].children.get(name) {
            return existing;
        }
        let id = ModuleId(self.modules.len());
        self.modules.push(Module::new(name, location, Some(parent)));
        self.modules[parent.0].children.insert(name.to_string(), id);
        id
    }

    /// Looks up a module by name among `from`'s siblings and ancestors'
    /// children, walking toward the root (spec §4.2 identifier lookup order
    /// includes "the registered module list").
    pub fn lookup_module(&self, from: ModuleId, name: &str) -> Option<ModuleId> {
        let mut current = Some(from);
        while let Some(id) = current {
            let module = &self.modules[id.0];
            if let Some(&found) = module.children.get(name) {
                return Some(found);
            }
            current = module.parent;
        }
        None
    }
}

impl Default for ModuleTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_module_is_idempotent_by_name() {
        let mut tree = ModuleTree::new();
        let root = tree.root();
        let a = tree.declare_module(root, "math", SourceLocation::unknown());
        let b = tree.declare_module(root, "math", SourceLocation::unknown());
        assert_eq!(a, b);
    }

    #[test]
    fn lookup_module_walks_toward_root() {
        let mut tree = ModuleTree::new();
        let root = tree.root();
        let math = tree.declare_module(root, "math", SourceLocation::unknown());
        let trig = tree.declare_module(math, "trig", SourceLocation::unknown());
        assert_eq!(tree.lookup_module(trig, "math"), Some(math));
        assert_eq!(tree.lookup_module(math, "trig"), Some(trig));
        assert_eq!(tree.lookup_module(root, "nope"), None);
    }

    #[test]
    fn scope_stack_balances() {
        let mut tree = ModuleTree::new();
        let root = tree.root();
        let module = tree.get_mut(root);
        assert_eq!(module.depth(), 1);
        module.push_scope(ScopeKind::Function);
        assert_eq!(module.depth(), 2);
        module.pop_scope();
        assert_eq!(module.depth(), 1);
    }
}
