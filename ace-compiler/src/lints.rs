//! Lint rules layered on top of the fatal-error analyzer pass: warnings and
//! infos that never block code generation (spec §7).

use ace_diagnostics::{Diagnostic, Kind, SourceLocation};

use crate::module::ModuleId;
use crate::unit::CompilationUnit;

pub trait LintRule {
    fn name(&self) -> &'static str;
    fn check(&self, unit: &CompilationUnit, module: ModuleId) -> Vec<Diagnostic>;
}

/// Flags identifiers declared but never read. A leading underscore opts out,
/// matching the convention the rest of the pipeline assumes.
pub struct UnusedIdentifierRule;

impl LintRule for UnusedIdentifierRule {
    fn name(&self) -> &'static str {
        "unused-identifier"
    }

    fn check(&self, unit: &CompilationUnit, module: ModuleId) -> Vec<Diagnostic> {
        let mut findings = Vec::new();
        for scope in unit.modules.get(module).scopes() {
            for identifier in scope.identifiers() {
                if identifier.use_count == 0 && !identifier.name.starts_with('_') {
                    findings.push(Diagnostic::warning(Kind::UnusedIdentifier(identifier.name.clone()), SourceLocation::unknown()));
                }
            }
        }
        findings
    }
}

/// Flags identifiers that don't follow `snake_case`.
pub struct NamingConventionRule;

impl LintRule for NamingConventionRule {
    fn name(&self) -> &'static str {
        "naming-convention"
    }

    fn check(&self, unit: &CompilationUnit, module: ModuleId) -> Vec<Diagnostic> {
        let mut findings = Vec::new();
        for scope in unit.modules.get(module).scopes() {
            for identifier in scope.identifiers() {
                if !is_snake_case(&identifier.name) {
                    findings.push(Diagnostic::warning(Kind::NamingConvention(identifier.name.clone()), SourceLocation::unknown()));
                }
            }
        }
        findings
    }
}

fn is_snake_case(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

pub fn run_all(unit: &mut CompilationUnit, module: ModuleId) {
    let rules: Vec<Box<dyn LintRule>> = vec![Box::new(UnusedIdentifierRule), Box::new(NamingConventionRule)];
    for rule in &rules {
        for diagnostic in rule.check(unit, module) {
            unit.report(diagnostic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_accepts_underscored_lowercase() {
        assert!(is_snake_case("player_health"));
        assert!(is_snake_case("_private"));
        assert!(!is_snake_case("PlayerHealth"));
        assert!(!is_snake_case("playerHealth"));
    }

    #[test]
    fn unused_identifier_rule_skips_underscore_prefixed_names() {
        let mut unit = CompilationUnit::new();
        let root = unit.current_module();
        let int = unit.types.builtins.int;
        unit.modules.get_mut(root).current_scope_mut().declare("wasted", int);
        unit.modules.get_mut(root).current_scope_mut().declare("_ignored", int);

        let findings = UnusedIdentifierRule.check(&unit, root);
        assert_eq!(findings.len(), 1);
    }
}
