//! The compilation unit (spec §3.6): owns the module tree, the type table,
//! the error list, and the canonicalized-path → modules cache used to skip
//! re-parsing a file that has already been imported once.

use std::collections::HashMap;

use ace_diagnostics::{Diagnostic, DiagnosticEngine};

use crate::module::{ModuleId, ModuleTree};
use crate::types::TypeTable;

pub struct CompilationUnit {
    pub modules: ModuleTree,
    pub types: TypeTable,
    pub diagnostics: DiagnosticEngine,
    /// Maps a canonicalized file path to the modules it produced, so a
    /// second `import`/`use` of the same file is a cache hit rather than a
    /// re-parse.
    imported_files: HashMap<String, Vec<ModuleId>>,
    /// The module the analyzer/emitter is currently walking into.
    current_module: ModuleId,
}

impl CompilationUnit {
    pub fn new() -> Self {
        let modules = ModuleTree::new();
        let current_module = modules.root();
        Self {
            modules,
            types: TypeTable::with_builtins(),
            diagnostics: DiagnosticEngine::new(),
            imported_files: HashMap::new(),
            current_module,
        }
    }

    pub fn current_module(&self) -> ModuleId {
        self.current_module
    }

    pub fn enter_module(&mut self, id: ModuleId) -> ModuleId {
        std::mem::replace(&mut self.current_module, id)
    }

    pub fn leave_module(&mut self, previous: ModuleId) {
        self.current_module = previous;
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.emit(diagnostic);
    }

    pub fn has_fatal_errors(&self) -> bool {
        self.diagnostics.has_fatal()
    }

    /// Looks up a previously-imported file's modules, if this compilation
    /// unit has already parsed it.
    pub fn cached_import(&self, canonical_path: &str) -> Option<&[ModuleId]> {
        self.imported_files.get(canonical_path).map(Vec::as_slice)
    }

    pub fn record_import(&mut self, canonical_path: impl Into<String>, modules: Vec<ModuleId>) {
        self.imported_files.insert(canonical_path.into(), modules);
    }
}

impl Default for CompilationUnit {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_unit_starts_at_the_global_module() {
        let unit = CompilationUnit::new();
        assert_eq!(unit.current_module(), unit.modules.root());
    }

    #[test]
    fn entering_and_leaving_a_module_restores_the_previous_one() {
        let mut unit = CompilationUnit::new();
        let root = unit.current_module();
        let child = unit.modules.declare_module(root, "child", ace_diagnostics::SourceLocation::unknown());
        let previous = unit.enter_module(child);
        assert_eq!(unit.current_module(), child);
        unit.leave_module(previous);
        assert_eq!(unit.current_module(), root);
    }

    #[test]
    fn import_cache_round_trips() {
        let mut unit = CompilationUnit::new();
        assert!(unit.cached_import("a.ace").is_none());
        unit.record_import("a.ace", vec![unit.modules.root()]);
        assert_eq!(unit.cached_import("a.ace"), Some(&[unit.modules.root()][..]));
    }
}
