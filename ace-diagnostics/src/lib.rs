//! Diagnostic model for the Ace compiler pipeline.
//!
//! Every pass (lexer, parser, semantic analyzer, optimizer, emitter) reports
//! through a shared `Diagnostic` / `DiagnosticEngine` pair so the CLI can
//! render one consistent, Rust-quality error format regardless of which pass
//! produced the message.

use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source location: (line, column, file). Totally ordered by
/// `(file, line, column)` so diagnostics sort for stable, deterministic
/// output across a multi-file compilation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// A location standing in for "no real position" (builtins, synthesized nodes).
    pub fn unknown() -> Self {
        Self {
            file: "<unknown>".to_string(),
            line: 0,
            column: 0,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Diagnostic severity. Fixed to the three levels the spec defines: fatal
/// errors halt code generation, warnings and infos never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Fatal,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Fatal => write!(f, "{}", "error".red().bold()),
            Level::Warning => write!(f, "{}", "warning".yellow().bold()),
            Level::Info => write!(f, "{}", "info".blue().bold()),
        }
    }
}

/// Lexical errors — the lexer collaborator's interface to diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexKind {
    #[error("unexpected character `{0}`")]
    UnexpectedChar(char),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("invalid escape sequence `\\{0}`")]
    BadEscape(char),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyntaxKind {
    #[error("unexpected token `{found}`, expected {expected}")]
    UnexpectedToken { found: String, expected: String },
    #[error("unbalanced `{0}`")]
    Unbalanced(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeKind {
    #[error("undeclared identifier `{0}`")]
    UndeclaredIdentifier(String),
    #[error("identifier `{0}` already declared in this scope")]
    Redeclared(String),
    #[error("`{0}` refers to a module, not a value")]
    IdentifierIsModule(String),
    #[error("`{0}` refers to a type, not a value")]
    IdentifierIsType(String),
    #[error("`{0}` is ambiguous between multiple candidates")]
    Ambiguous(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeKind {
    #[error("mismatched types: expected `{expected}`, found `{found}`")]
    Mismatched { expected: String, found: String },
    #[error("`{0}` is not a function")]
    NotAFunction(String),
    #[error("`{0}` has no data member named `{1}`")]
    NotADataMember(String, String),
    #[error("type `{0}` does not satisfy the required contract")]
    UnsatisfiedContract(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModuleKind {
    #[error("module `{0}` has not been imported")]
    NotImported(String),
    #[error("module `{0}` is already defined")]
    AlreadyDefined(String),
    #[error("imports are only permitted at global scope")]
    ImportOutsideGlobal,
    #[error("could not open module file `{0}`")]
    CouldNotOpen(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArityKind {
    #[error("too few arguments: expected at least {expected}, found {found}")]
    TooFew { expected: usize, found: usize },
    #[error("too many arguments: expected at most {expected}, found {found}")]
    TooMany { expected: usize, found: usize },
    #[error("no parameter named `{0}`")]
    NamedArgNotFound(String),
    #[error("positional argument after variadic argument")]
    ArgAfterVarargs,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SemanticsKind {
    #[error("cannot modify `const` variable `{0}`")]
    ConstModified(String),
    #[error("cannot modify an rvalue")]
    CannotModifyRvalue,
    #[error("`return` outside of a function")]
    ReturnOutsideFunction,
    #[error("`else` without a preceding `if`")]
    ElseOutsideIf,
    #[error("generic parameter `{0}` redeclared")]
    GenericParameterRedeclared(String),
}

/// The grouped error/warning/info kinds from spec §7.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Kind {
    #[error(transparent)]
    Lex(#[from] LexKind),
    #[error(transparent)]
    Syntax(#[from] SyntaxKind),
    #[error(transparent)]
    Scope(#[from] ScopeKind),
    #[error(transparent)]
    Type(#[from] TypeKind),
    #[error(transparent)]
    Module(#[from] ModuleKind),
    #[error(transparent)]
    Arity(#[from] ArityKind),
    #[error(transparent)]
    Semantics(#[from] SemanticsKind),
    #[error("unreachable code")]
    UnreachableCode,
    #[error("missing semicolon")]
    MissingSemicolon,
    #[error("unused identifier `{0}`")]
    UnusedIdentifier(String),
    #[error("identifier `{0}` does not follow the conventional naming style")]
    NamingConvention(String),
}

/// A single reported diagnostic: level, kind, location, formatted message.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: Level,
    pub kind: Kind,
    pub location: SourceLocation,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn new(level: Level, kind: impl Into<Kind>, location: SourceLocation) -> Self {
        Self {
            level,
            kind: kind.into(),
            location,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn fatal(kind: impl Into<Kind>, location: SourceLocation) -> Self {
        Self::new(Level::Fatal, kind, location)
    }

    pub fn warning(kind: impl Into<Kind>, location: SourceLocation) -> Self {
        Self::new(Level::Warning, kind, location)
    }

    pub fn info(kind: impl Into<Kind>, location: SourceLocation) -> Self {
        Self::new(Level::Info, kind, location)
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    /// Render with a source snippet, Rust-compiler style.
    pub fn format(&self, source: &str) -> String {
        let mut out = String::new();
        out.push_str(&format!("{}: {}\n", self.level, self.message().bold()));
        out.push_str(&format!(
            " {} {}\n",
            "-->".cyan().bold(),
            self.location
        ));

        if let Some(snippet) = self.source_snippet(source) {
            out.push_str(&snippet);
        }

        for note in &self.notes {
            out.push_str(&format!(" {} {}\n", "=".cyan().bold(), note.cyan()));
        }

        if let Some(help) = &self.help {
            out.push_str(&format!(" {} {}\n", "help:".green().bold(), help));
        }

        out
    }

    fn source_snippet(&self, source: &str) -> Option<String> {
        let lines: Vec<&str> = source.lines().collect();
        if self.location.line == 0 || self.location.line > lines.len() {
            return None;
        }
        let line = lines[self.location.line - 1];
        let width = self.location.line.to_string().len().max(2);

        let mut snippet = String::new();
        snippet.push_str(&format!(" {}\n", " ".repeat(width + 1).cyan()));
        snippet.push_str(&format!(
            " {} {} {}\n",
            format!("{:>width$}", self.location.line, width = width)
                .cyan()
                .bold(),
            "|".cyan().bold(),
            line
        ));
        let column = self.location.column.max(1);
        let padding = " ".repeat(width + 3 + column - 1);
        snippet.push_str(&format!(" {}{}{}\n", " ".repeat(width + 1).cyan(), padding, "^".red().bold()));
        Some(snippet)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.level, self.message(), self.location)
    }
}

/// Collects diagnostics across a compilation unit's passes. Fatal errors do
/// not stop a pass from continuing to analyze (to maximize diagnostic
/// coverage); they do stop code generation.
#[derive(Debug, Default)]
pub struct DiagnosticEngine {
    diagnostics: Vec<Diagnostic>,
    fatal_count: usize,
    warning_count: usize,
    info_count: usize,
}

impl DiagnosticEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic.level {
            Level::Fatal => self.fatal_count += 1,
            Level::Warning => self.warning_count += 1,
            Level::Info => self.info_count += 1,
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn fatal(&mut self, kind: impl Into<Kind>, location: SourceLocation) {
        self.emit(Diagnostic::fatal(kind, location));
    }

    pub fn warning(&mut self, kind: impl Into<Kind>, location: SourceLocation) {
        self.emit(Diagnostic::warning(kind, location));
    }

    pub fn info(&mut self, kind: impl Into<Kind>, location: SourceLocation) {
        self.emit(Diagnostic::info(kind, location));
    }

    /// `undeclared identifier` with a fuzzy "did you mean?" suggestion.
    pub fn undeclared_identifier(&mut self, name: &str, location: SourceLocation, candidates: &[String]) {
        let suggestions = fuzzy::find_similar_names(name, candidates, 0.7, 3);
        let mut diag = Diagnostic::fatal(ScopeKind::UndeclaredIdentifier(name.to_string()), location);
        if !suggestions.is_empty() {
            diag = diag.with_help(format!("did you mean `{}`?", suggestions.join("`, `")));
        }
        self.emit(diag);
    }

    pub fn has_fatal(&self) -> bool {
        self.fatal_count > 0
    }

    pub fn fatal_count(&self) -> usize {
        self.fatal_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn info_count(&self) -> usize {
        self.info_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn print_all(&self, source: &str) {
        for diag in &self.diagnostics {
            eprintln!("{}", diag.format(source));
        }
    }

    pub fn print_summary(&self) {
        if self.fatal_count > 0 {
            eprintln!(
                "\n{}: {} error{} emitted",
                "error".red().bold(),
                self.fatal_count,
                if self.fatal_count == 1 { "" } else { "s" }
            );
        }
        if self.warning_count > 0 {
            eprintln!(
                "{}: {} warning{} emitted",
                "warning".yellow().bold(),
                self.warning_count,
                if self.warning_count == 1 { "" } else { "s" }
            );
        }
    }

    pub fn clear(&mut self) {
        self.diagnostics.clear();
        self.fatal_count = 0;
        self.warning_count = 0;
        self.info_count = 0;
    }
}

/// Fuzzy matching for "did you mean?" suggestions (Jaro-Winkler distance).
pub mod fuzzy {
    use strsim::jaro_winkler;

    pub fn find_similar_names(
        target: &str,
        candidates: &[String],
        threshold: f64,
        max_suggestions: usize,
    ) -> Vec<String> {
        let mut scored: Vec<(String, f64)> = candidates
            .iter()
            .map(|candidate| (candidate.clone(), jaro_winkler(target, candidate)))
            .filter(|(_, score)| *score > threshold)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().take(max_suggestions).map(|(name, _)| name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_fatal_diagnostic_with_snippet() {
        let source = "let x: String = 42;\n";
        let diag = Diagnostic::fatal(
            TypeKind::Mismatched {
                expected: "String".to_string(),
                found: "Int".to_string(),
            },
            SourceLocation::new("main.ace", 1, 17),
        )
        .with_note("initializer here")
        .with_help("convert the value first");

        let formatted = diag.format(source);
        assert!(formatted.contains("mismatched types"));
        assert!(formatted.contains("main.ace:1:17"));
        assert!(formatted.contains("initializer here"));
    }

    #[test]
    fn engine_tracks_counts_by_level() {
        let mut engine = DiagnosticEngine::new();
        engine.fatal(ScopeKind::UndeclaredIdentifier("foo".into()), SourceLocation::unknown());
        engine.warning(Kind::UnreachableCode, SourceLocation::unknown());
        engine.info(Kind::UnusedIdentifier("bar".into()), SourceLocation::unknown());

        assert_eq!(engine.fatal_count(), 1);
        assert_eq!(engine.warning_count(), 1);
        assert_eq!(engine.info_count(), 1);
        assert!(engine.has_fatal());
    }

    #[test]
    fn undeclared_identifier_suggests_close_name() {
        let mut engine = DiagnosticEngine::new();
        let candidates = vec!["count".to_string(), "counter".to_string()];
        engine.undeclared_identifier("coutner", SourceLocation::unknown(), &candidates);

        let diag = &engine.diagnostics()[0];
        assert!(diag.help.as_ref().unwrap().contains("counter"));
    }
}
