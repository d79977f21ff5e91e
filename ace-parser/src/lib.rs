//! Hand-written recursive-descent parser for Ace.
//!
//! Turns the token stream produced by `ace_lexer::tokenize` into an
//! `ace_ast::Program`. The grammar itself is not specified by name anywhere;
//! it is derived directly from the AST shapes `ace-ast` declares (every
//! `StmtKind`/`ExprKind` variant has exactly one parse rule that produces it).

use ace_diagnostics::{Diagnostic, SourceLocation, SyntaxKind};
use thiserror::Error;

mod parser;
pub use parser::Parser;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} at {location}")]
pub struct ParseError {
    pub kind: SyntaxKind,
    pub location: SourceLocation,
}

impl From<ParseError> for Diagnostic {
    fn from(err: ParseError) -> Self {
        Diagnostic::fatal(err.kind, err.location)
    }
}

/// Lexes and parses `source` in one call, for callers that don't need
/// lower-level access to the token stream.
pub fn parse(file: &str, source: &str) -> Result<ace_ast::Program, ParseError> {
    let tokens = ace_lexer::tokenize(file, source).map_err(|err| ParseError {
        kind: SyntaxKind::UnexpectedToken {
            found: err.kind.to_string(),
            expected: "a valid token".to_string(),
        },
        location: err.location,
    })?;
    Parser::new(file, tokens).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ace_ast::{BinOp, ExprKind, StmtKind};

    #[test]
    fn parses_variable_decl() {
        let program = parse("t.ace", "let x: Int = 1;").unwrap();
        assert_eq!(program.len(), 1);
        match &program[0].kind {
            StmtKind::VariableDecl { name, is_const, value, .. } => {
                assert_eq!(name, "x");
                assert!(!is_const);
                assert!(value.is_some());
            }
            other => panic!("expected VariableDecl, got {other:?}"),
        }
    }

    #[test]
    fn parses_binary_precedence() {
        // `1 + 2 * 3` should parse as `1 + (2 * 3)`.
        let program = parse("t.ace", "let x = 1 + 2 * 3;").unwrap();
        let StmtKind::VariableDecl { value: Some(value), .. } = &program[0].kind else {
            panic!("expected variable decl with value");
        };
        match &value.kind {
            ExprKind::Binary { op: BinOp::Add, right, .. } => {
                assert!(matches!(right.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
            }
            other => panic!("expected top-level Add, got {other:?}"),
        }
    }

    #[test]
    fn parses_if_else() {
        let program = parse("t.ace", "if x { return 1; } else { return 2; }").unwrap();
        assert!(matches!(program[0].kind, StmtKind::If { .. }));
    }

    #[test]
    fn reports_unexpected_token() {
        let err = parse("t.ace", "let = 1;").unwrap_err();
        assert!(matches!(err.kind, SyntaxKind::UnexpectedToken { .. }));
    }
}
