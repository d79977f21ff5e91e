//! Expression grammar, precedence-climbing from assignment down to primary.
//!
//! Mirrors the tier structure of the teacher's `expressions.rs`: each
//! precedence level is one method that parses its operand via the next
//! tighter-binding level, then loops while it sees an operator at its own
//! level.

use ace_ast::{Argument, BinOp, Expr, ExprKind, Node, UnOp};
use ace_diagnostics::SourceLocation;
use ace_lexer::Token;

use super::Parser;
use crate::ParseError;

impl<'a> Parser<'a> {
    pub(super) fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, ParseError> {
        let location = self.peek_location();
        let target = self.parse_or()?;
        if self.match_token(&Token::Eq) {
            let value = self.parse_assignment()?;
            return Ok(Node::new(
                ExprKind::Assign { target: Box::new(target), value: Box::new(value) },
                location,
            ));
        }
        Ok(target)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.match_token(&Token::OrOr) {
            let location = self.previous().1.clone();
            let right = self.parse_and()?;
            left = binary(BinOp::Or, left, right, location);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;
        while self.match_token(&Token::AndAnd) {
            let location = self.previous().1.clone();
            let right = self.parse_equality()?;
            left = binary(BinOp::And, left, right, location);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = if self.match_token(&Token::EqEq) {
                BinOp::Eq
            } else if self.match_token(&Token::NotEq) {
                BinOp::NotEq
            } else {
                break;
            };
            let location = self.previous().1.clone();
            let right = self.parse_relational()?;
            left = binary(op, left, right, location);
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = if self.match_token(&Token::Lt) {
                BinOp::Lt
            } else if self.match_token(&Token::Gt) {
                BinOp::Gt
            } else if self.match_token(&Token::LtEq) {
                BinOp::LtEq
            } else if self.match_token(&Token::GtEq) {
                BinOp::GtEq
            } else {
                break;
            };
            let location = self.previous().1.clone();
            let right = self.parse_additive()?;
            left = binary(op, left, right, location);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = if self.match_token(&Token::Plus) {
                BinOp::Add
            } else if self.match_token(&Token::Minus) {
                BinOp::Sub
            } else {
                break;
            };
            let location = self.previous().1.clone();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right, location);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.match_token(&Token::Star) {
                BinOp::Mul
            } else if self.match_token(&Token::Slash) {
                BinOp::Div
            } else if self.match_token(&Token::Percent) {
                BinOp::Mod
            } else {
                break;
            };
            let location = self.previous().1.clone();
            let right = self.parse_unary()?;
            left = binary(op, left, right, location);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let location = self.peek_location();
        let op = if self.match_token(&Token::Bang) {
            Some(UnOp::Not)
        } else if self.match_token(&Token::Minus) {
            Some(UnOp::Neg)
        } else {
            None
        };
        if let Some(op) = op {
            let operand = self.parse_unary()?;
            return Ok(Node::new(
                ExprKind::Unary { op, operand: Box::new(operand) },
                location,
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            let location = self.peek_location();
            if self.match_token(&Token::Dot) {
                let member = self.consume_ident("a member name")?;
                expr = Node::new(
                    ExprKind::MemberAccess { object: Box::new(expr), member },
                    location,
                );
            } else if self.match_token(&Token::Has) {
                let member = self.consume_ident("a member name")?;
                expr = Node::new(ExprKind::Has { object: Box::new(expr), member }, location);
            } else if self.match_token(&Token::LBracket) {
                let index = self.parse_expression()?;
                self.consume(&Token::RBracket, "`]`")?;
                expr = Node::new(
                    ExprKind::ArrayAccess { object: Box::new(expr), index: Box::new(index) },
                    location,
                );
            } else if self.check(&Token::LParen) {
                let args = self.parse_arguments()?;
                expr = Node::new(
                    ExprKind::Call { callee: Box::new(expr), args },
                    location,
                );
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> Result<Vec<Argument>, ParseError> {
        self.consume(&Token::LParen, "`(`")?;
        let mut args = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                // Named argument: `ident: expr`. Disambiguated by a lookahead
                // colon, since bare identifiers are also valid expressions.
                let name = if matches!(self.peek(), Some(Token::Ident(_)))
                    && matches!(self.tokens.get(self.current + 1), Some((Token::Colon, _)))
                {
                    let name = self.consume_ident("an argument name")?;
                    self.advance(); // `:`
                    Some(name)
                } else {
                    None
                };
                let value = self.parse_expression()?;
                args.push(Argument { name, value });
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }
        self.consume(&Token::RParen, "`)`")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let location = self.peek_location();
        match self.peek().cloned() {
            Some(Token::IntLiteral(value)) => {
                self.advance();
                Ok(Node::new(ExprKind::Int(value), location))
            }
            Some(Token::FloatLiteral(value)) => {
                self.advance();
                Ok(Node::new(ExprKind::Float(value), location))
            }
            Some(Token::StringLiteral(value)) => {
                self.advance();
                Ok(Node::new(ExprKind::Str(value), location))
            }
            Some(Token::True) => {
                self.advance();
                Ok(Node::new(ExprKind::Bool(true), location))
            }
            Some(Token::False) => {
                self.advance();
                Ok(Node::new(ExprKind::Bool(false), location))
            }
            Some(Token::Nil) => {
                self.advance();
                Ok(Node::new(ExprKind::Nil, location))
            }
            Some(Token::New) => self.parse_new(location),
            Some(Token::Func) => self.parse_function_expr(location, false),
            Some(Token::Ident(name)) => {
                self.advance();
                if self.check(&Token::LBrace) {
                    let type_name = Some(ace_ast::TypeSpec::Named(name));
                    return self.parse_object_literal(type_name, location);
                }
                Ok(Node::new(ExprKind::Identifier(name), location))
            }
            Some(Token::LParen) => self.parse_paren_or_tuple(location),
            Some(Token::LBracket) => self.parse_array_literal(location),
            Some(Token::LBrace) => self.parse_object_literal(None, location),
            _ => Err(self.error("an expression")),
        }
    }

    fn parse_new(&mut self, location: SourceLocation) -> Result<Expr, ParseError> {
        self.advance(); // `new`
        let type_spec = self.parse_type_spec()?;
        let args = if self.check(&Token::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Node::new(ExprKind::New { type_spec, args }, location))
    }

    fn parse_function_expr(&mut self, location: SourceLocation, is_generator: bool) -> Result<Expr, ParseError> {
        self.advance(); // `func`
        let name = match self.peek() {
            Some(Token::Ident(_)) => Some(self.consume_ident("a function name")?),
            _ => None,
        };
        let params = self.parse_params()?;
        let return_type = if self.match_token(&Token::Colon) {
            Some(self.parse_type_spec()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        Ok(Node::new(
            ExprKind::Function { name, params, return_type, body, is_generator },
            location,
        ))
    }

    /// `(expr)` parenthesized grouping, or `(a, b, ...)` a tuple literal.
    fn parse_paren_or_tuple(&mut self, location: SourceLocation) -> Result<Expr, ParseError> {
        self.advance(); // `(`
        if self.match_token(&Token::RParen) {
            return Ok(Node::new(ExprKind::TupleLiteral(Vec::new()), location));
        }
        let first = self.parse_expression()?;
        if self.match_token(&Token::Comma) {
            let mut elements = vec![first];
            if !self.check(&Token::RParen) {
                loop {
                    elements.push(self.parse_expression()?);
                    if !self.match_token(&Token::Comma) {
                        break;
                    }
                }
            }
            self.consume(&Token::RParen, "`)`")?;
            return Ok(Node::new(ExprKind::TupleLiteral(elements), location));
        }
        self.consume(&Token::RParen, "`)`")?;
        Ok(first)
    }

    fn parse_array_literal(&mut self, location: SourceLocation) -> Result<Expr, ParseError> {
        self.advance(); // `[`
        let mut elements = Vec::new();
        if !self.check(&Token::RBracket) {
            loop {
                elements.push(self.parse_expression()?);
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }
        self.consume(&Token::RBracket, "`]`")?;
        Ok(Node::new(ExprKind::ArrayLiteral(elements), location))
    }

    fn parse_object_literal(
        &mut self,
        type_name: Option<ace_ast::TypeSpec>,
        location: SourceLocation,
    ) -> Result<Expr, ParseError> {
        self.advance(); // `{`
        let mut fields = Vec::new();
        if !self.check(&Token::RBrace) {
            loop {
                let name = self.consume_ident("a field name")?;
                self.consume(&Token::Colon, "`:`")?;
                let value = self.parse_expression()?;
                fields.push((name, value));
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }
        self.consume(&Token::RBrace, "`}`")?;
        Ok(Node::new(ExprKind::ObjectLiteral { type_name, fields }, location))
    }
}

fn binary(op: BinOp, left: Expr, right: Expr, location: SourceLocation) -> Expr {
    Node::new(
        ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) },
        location,
    )
}
