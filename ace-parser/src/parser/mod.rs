//! Core parser state and statement-level grammar.
//!
//! Follows the teacher's shape: a `Parser` that owns the full token vector
//! and a cursor, with `check`/`match_token`/`advance`/`consume`/`error`
//! helpers that every higher-level `parse_*` method builds on.

mod expressions;

use ace_ast::{
    Block, ImportKind, Node, Param, Program, PrototypeMember, Stmt, StmtKind, TypeSpec,
};
use ace_diagnostics::SourceLocation;
use ace_lexer::Token;

use crate::ParseError;

pub struct Parser<'a> {
    file: &'a str,
    tokens: Vec<(Token, SourceLocation)>,
    current: usize,
}

impl<'a> Parser<'a> {
    pub fn new(file: &'a str, tokens: Vec<(Token, SourceLocation)>) -> Self {
        Self { file, tokens, current: 0 }
    }

    pub fn parse_program(mut self) -> Result<Program, ParseError> {
        let mut stmts = Vec::new();
        while !self.is_at_end() {
            stmts.push(self.parse_statement()?);
        }
        Ok(stmts)
    }

    // -- cursor helpers --------------------------------------------------

    fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current).map(|(t, _)| t)
    }

    fn peek_location(&self) -> SourceLocation {
        self.tokens
            .get(self.current)
            .map(|(_, loc)| loc.clone())
            .or_else(|| self.tokens.last().map(|(_, loc)| loc.clone()))
            .unwrap_or_else(|| SourceLocation::new(self.file.to_string(), 0, 0))
    }

    fn previous(&self) -> &(Token, SourceLocation) {
        &self.tokens[self.current - 1]
    }

    fn check(&self, token: &Token) -> bool {
        self.peek().map(|t| std::mem::discriminant(t) == std::mem::discriminant(token)).unwrap_or(false)
    }

    fn advance(&mut self) -> &(Token, SourceLocation) {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn match_token(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, token: &Token, expected: &str) -> Result<&(Token, SourceLocation), ParseError> {
        if self.check(token) {
            Ok(self.advance())
        } else {
            Err(self.error(expected))
        }
    }

    fn consume_ident(&mut self, expected: &str) -> Result<String, ParseError> {
        match self.peek() {
            Some(Token::Ident(_)) => {
                let (tok, _) = self.advance();
                match tok {
                    Token::Ident(name) => Ok(name.clone()),
                    _ => unreachable!(),
                }
            }
            _ => Err(self.error(expected)),
        }
    }

    fn error(&self, expected: &str) -> ParseError {
        let found = self
            .peek()
            .map(|t| format!("{t:?}"))
            .unwrap_or_else(|| "end of input".to_string());
        ParseError {
            kind: ace_diagnostics::SyntaxKind::UnexpectedToken {
                found,
                expected: expected.to_string(),
            },
            location: self.peek_location(),
        }
    }

    // -- statements --------------------------------------------------------

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let location = self.peek_location();
        match self.peek() {
            Some(Token::Let) | Some(Token::Const) => self.parse_variable_decl(location),
            Some(Token::Type) => self.parse_type_decl(location),
            Some(Token::Module) => self.parse_module_decl(location),
            Some(Token::Import) | Some(Token::Use) => self.parse_import(location),
            Some(Token::If) => self.parse_if(location),
            Some(Token::While) => self.parse_while(location),
            Some(Token::Try) => self.parse_try_catch(location),
            Some(Token::Return) => self.parse_return(location),
            Some(Token::Yield) => self.parse_yield(location),
            Some(Token::Meta) => self.parse_meta_block(location),
            Some(Token::LBrace) => {
                let block = self.parse_block()?;
                Ok(Node::new(StmtKind::Block(block), location))
            }
            _ => self.parse_expr_statement(location),
        }
    }

    fn parse_variable_decl(&mut self, location: SourceLocation) -> Result<Stmt, ParseError> {
        let is_const = matches!(self.peek(), Some(Token::Const));
        self.advance();
        let name = self.consume_ident("a variable name")?;
        let type_spec = if self.match_token(&Token::Colon) {
            Some(self.parse_type_spec()?)
        } else {
            None
        };
        let value = if self.match_token(&Token::Eq) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.consume(&Token::Semicolon, "`;`")?;
        Ok(Node::new(
            StmtKind::VariableDecl { name, is_const, type_spec, value },
            location,
        ))
    }

    /// `type Name = Aliasee;` or `type Name(T, U) : Base { members }`.
    fn parse_type_decl(&mut self, location: SourceLocation) -> Result<Stmt, ParseError> {
        self.advance(); // `type`
        let name = self.consume_ident("a type name")?;

        if self.match_token(&Token::Eq) {
            let aliasee = self.parse_type_spec()?;
            self.consume(&Token::Semicolon, "`;`")?;
            return Ok(Node::new(StmtKind::TypeAlias { name, aliasee }, location));
        }

        let mut type_params = Vec::new();
        if self.match_token(&Token::LParen) {
            if !self.check(&Token::RParen) {
                loop {
                    type_params.push(self.consume_ident("a type parameter name")?);
                    if !self.match_token(&Token::Comma) {
                        break;
                    }
                }
            }
            self.consume(&Token::RParen, "`)`")?;
        }

        let base = if self.match_token(&Token::Colon) {
            Some(self.consume_ident("a base type name")?)
        } else {
            None
        };

        self.consume(&Token::LBrace, "`{`")?;
        let mut members = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            members.push(self.parse_prototype_member()?);
        }
        self.consume(&Token::RBrace, "`}`")?;

        Ok(Node::new(
            StmtKind::PrototypeDecl { name, type_params, base, members },
            location,
        ))
    }

    fn parse_prototype_member(&mut self) -> Result<PrototypeMember, ParseError> {
        let name = self.consume_ident("a member name")?;
        let type_spec = if self.match_token(&Token::Colon) {
            Some(self.parse_type_spec()?)
        } else {
            None
        };
        let default_value = if self.match_token(&Token::Eq) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.match_token(&Token::Comma);
        Ok(PrototypeMember { name, type_spec, default_value })
    }

    fn parse_module_decl(&mut self, location: SourceLocation) -> Result<Stmt, ParseError> {
        self.advance(); // `module`
        let name = self.consume_ident("a module name")?;
        let body = self.parse_block()?;
        Ok(Node::new(StmtKind::ModuleDecl { name, body }, location))
    }

    fn parse_import(&mut self, location: SourceLocation) -> Result<Stmt, ParseError> {
        let kind = if matches!(self.peek(), Some(Token::Import)) {
            ImportKind::Module
        } else {
            ImportKind::Local
        };
        self.advance();
        let path = self.consume_string("an import path")?;
        let alias = if self.match_token(&Token::As) {
            Some(self.consume_ident("an alias name")?)
        } else {
            None
        };
        self.consume(&Token::Semicolon, "`;`")?;
        Ok(Node::new(StmtKind::Import { kind, path, alias }, location))
    }

    fn parse_if(&mut self, location: SourceLocation) -> Result<Stmt, ParseError> {
        self.advance(); // `if`
        let condition = self.parse_expression()?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.match_token(&Token::Else) {
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(Node::new(
            StmtKind::If { condition, then_branch, else_branch },
            location,
        ))
    }

    fn parse_while(&mut self, location: SourceLocation) -> Result<Stmt, ParseError> {
        self.advance(); // `while`
        let condition = self.parse_expression()?;
        let body = self.parse_block()?;
        Ok(Node::new(StmtKind::While { condition, body }, location))
    }

    fn parse_try_catch(&mut self, location: SourceLocation) -> Result<Stmt, ParseError> {
        self.advance(); // `try`
        let try_block = self.parse_block()?;
        self.consume(&Token::Catch, "`catch`")?;
        let catch_var = if self.match_token(&Token::LParen) {
            let name = self.consume_ident("a caught-exception name")?;
            self.consume(&Token::RParen, "`)`")?;
            Some(name)
        } else if matches!(self.peek(), Some(Token::Ident(_))) {
            Some(self.consume_ident("a caught-exception name")?)
        } else {
            None
        };
        let catch_block = self.parse_block()?;
        Ok(Node::new(
            StmtKind::TryCatch { try_block, catch_var, catch_block },
            location,
        ))
    }

    fn parse_return(&mut self, location: SourceLocation) -> Result<Stmt, ParseError> {
        self.advance(); // `return`
        let value = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(&Token::Semicolon, "`;`")?;
        Ok(Node::new(StmtKind::Return(value), location))
    }

    fn parse_yield(&mut self, location: SourceLocation) -> Result<Stmt, ParseError> {
        self.advance(); // `yield`
        let value = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(&Token::Semicolon, "`;`")?;
        Ok(Node::new(StmtKind::Yield(value), location))
    }

    fn parse_meta_block(&mut self, location: SourceLocation) -> Result<Stmt, ParseError> {
        self.advance(); // `meta`
        let body = self.parse_block()?;
        Ok(Node::new(StmtKind::MetaBlock(body), location))
    }

    fn parse_expr_statement(&mut self, location: SourceLocation) -> Result<Stmt, ParseError> {
        let expr = self.parse_expression()?;
        self.consume(&Token::Semicolon, "`;`")?;
        Ok(Node::new(StmtKind::Expr(expr), location))
    }

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        self.consume(&Token::LBrace, "`{`")?;
        let mut stmts = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            stmts.push(self.parse_statement()?);
        }
        self.consume(&Token::RBrace, "`}`")?;
        Ok(stmts)
    }

    // -- shared leaf parsers used by both statements and expressions ------

    fn consume_string(&mut self, expected: &str) -> Result<String, ParseError> {
        match self.peek() {
            Some(Token::StringLiteral(_)) => {
                let (tok, _) = self.advance();
                match tok {
                    Token::StringLiteral(s) => Ok(s.clone()),
                    _ => unreachable!(),
                }
            }
            _ => Err(self.error(expected)),
        }
    }

    fn parse_type_spec(&mut self) -> Result<TypeSpec, ParseError> {
        let base = self.consume_ident("a type name")?;
        if self.match_token(&Token::LParen) {
            let mut args = Vec::new();
            if !self.check(&Token::RParen) {
                loop {
                    args.push(self.parse_type_spec()?);
                    if !self.match_token(&Token::Comma) {
                        break;
                    }
                }
            }
            self.consume(&Token::RParen, "`)`")?;
            Ok(TypeSpec::Generic { base, args })
        } else {
            Ok(TypeSpec::Named(base))
        }
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        self.consume(&Token::LParen, "`(`")?;
        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                // `...rest: Args(T)` marks the trailing variadic parameter;
                // three consecutive `.` tokens since the lexer has no
                // dedicated ellipsis token.
                let is_variadic = self.check(&Token::Dot)
                    && matches!(self.tokens.get(self.current + 1), Some((Token::Dot, _)))
                    && matches!(self.tokens.get(self.current + 2), Some((Token::Dot, _)));
                if is_variadic {
                    self.advance();
                    self.advance();
                    self.advance();
                }
                let name = self.consume_ident("a parameter name")?;
                let type_spec = if self.match_token(&Token::Colon) {
                    Some(self.parse_type_spec()?)
                } else {
                    None
                };
                params.push(Param { name, type_spec, is_variadic });
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }
        self.consume(&Token::RParen, "`)`")?;
        Ok(params)
    }
}
