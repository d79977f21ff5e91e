//! The `Optimize` pass (spec §2 step 6, §3.7): constant folding, inlining
//! of `const`-declared identifiers, and removal of declarations nothing
//! references.
//!
//! Runs between `analyze` (`Visit`) and the emitter (`Build`) per the
//! three-pass pipeline in the design notes. Like the emitter, this pass
//! keeps its own lightweight const-binding environment rather than reusing
//! `ace-compiler::scope::Scope`, since scopes are popped and discarded once
//! `analyze` returns.

use std::collections::HashMap;

use ace_ast::{BinOp, Block, Expr, ExprKind, Program, Stmt, StmtKind, UnOp};

/// Tracks `const` bindings with a literal value, scoped like the source
/// blocks that declare them, so `optimize_expr` can substitute a reference
/// with its value.
#[derive(Default)]
struct ConstEnv {
    scopes: Vec<HashMap<String, ExprKind>>,
}

impl ConstEnv {
    fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop(&mut self) {
        self.scopes.pop();
    }

    fn insert(&mut self, name: String, value: ExprKind) {
        self.scopes.last_mut().expect("no active scope").insert(name, value);
    }

    fn lookup(&self, name: &str) -> Option<&ExprKind> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }
}

/// Folds constant subexpressions, inlines `const` identifiers, and culls
/// unused declarations in place, in that order, bottom-up.
pub fn optimize(program: &mut Program) {
    let mut consts = ConstEnv::default();
    optimize_block(program, &mut consts);
}

fn optimize_block(block: &mut Block, consts: &mut ConstEnv) {
    consts.push();
    for stmt in block.iter_mut() {
        optimize_stmt(stmt, consts);
    }
    cull_unused(block);
    consts.pop();
}

fn optimize_stmt(stmt: &mut Stmt, consts: &mut ConstEnv) {
    match &mut stmt.kind {
        StmtKind::VariableDecl { name, is_const, value, .. } => {
            optimize_expr(value, consts);
            if *is_const {
                if let Some(literal) = as_literal(&value.kind) {
                    consts.insert(name.clone(), literal);
                }
            }
        }
        StmtKind::Expr(expr) => optimize_expr(expr, consts),
        StmtKind::If { condition, then_branch, else_branch } => {
            optimize_expr(condition, consts);
            optimize_block(then_branch, consts);
            if let Some(else_branch) = else_branch {
                optimize_block(else_branch, consts);
            }
        }
        StmtKind::While { condition, body } => {
            optimize_expr(condition, consts);
            optimize_block(body, consts);
        }
        StmtKind::Return(Some(expr)) | StmtKind::Yield(Some(expr)) => optimize_expr(expr, consts),
        StmtKind::Return(None) | StmtKind::Yield(None) => {}
        StmtKind::Block(block) => optimize_block(block, consts),
        StmtKind::TryCatch { try_block, catch_block, .. } => {
            optimize_block(try_block, consts);
            optimize_block(catch_block, consts);
        }
        StmtKind::ModuleDecl { body, .. } => optimize_block(body, consts),
        // Prototype/alias/import declarations and meta-blocks carry no
        // run-time expressions this pass needs to touch.
        StmtKind::PrototypeDecl { .. } | StmtKind::TypeAlias { .. } | StmtKind::Import { .. } | StmtKind::MetaBlock(_) => {}
    }
}

fn optimize_expr(expr: &mut Expr, consts: &mut ConstEnv) {
    match &mut expr.kind {
        ExprKind::Identifier(name) => {
            if let Some(literal) = consts.lookup(name) {
                expr.kind = literal.clone();
            }
        }
        ExprKind::Unary { op, operand } => {
            optimize_expr(operand, consts);
            if let Some(folded) = fold_unary(*op, &operand.kind) {
                expr.kind = folded;
            }
        }
        ExprKind::Binary { op, left, right } => {
            optimize_expr(left, consts);
            optimize_expr(right, consts);
            if let Some(folded) = fold_binary(*op, &left.kind, &right.kind) {
                expr.kind = folded;
            }
        }
        ExprKind::Assign { target, value } => {
            optimize_expr(target, consts);
            optimize_expr(value, consts);
        }
        ExprKind::Call { callee, args } => {
            optimize_expr(callee, consts);
            for arg in args {
                optimize_expr(&mut arg.value, consts);
            }
        }
        ExprKind::MemberAccess { object, .. } | ExprKind::Has { object, .. } => {
            optimize_expr(object, consts);
        }
        ExprKind::ArrayAccess { object, index } => {
            optimize_expr(object, consts);
            optimize_expr(index, consts);
        }
        ExprKind::ArrayLiteral(items) | ExprKind::TupleLiteral(items) => {
            for item in items {
                optimize_expr(item, consts);
            }
        }
        ExprKind::ObjectLiteral { fields, .. } => {
            for (_, value) in fields {
                optimize_expr(value, consts);
            }
        }
        ExprKind::New { args, .. } => {
            for arg in args {
                optimize_expr(&mut arg.value, consts);
            }
        }
        ExprKind::Function { body, .. } => optimize_block(body, consts),
        ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Str(_) | ExprKind::Bool(_) | ExprKind::Nil => {}
    }
}

fn as_literal(kind: &ExprKind) -> Option<ExprKind> {
    match kind {
        ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Str(_) | ExprKind::Bool(_) | ExprKind::Nil => Some(kind.clone()),
        _ => None,
    }
}

fn fold_unary(op: UnOp, operand: &ExprKind) -> Option<ExprKind> {
    match (op, operand) {
        (UnOp::Neg, ExprKind::Int(value)) => Some(ExprKind::Int(value.wrapping_neg())),
        (UnOp::Neg, ExprKind::Float(value)) => Some(ExprKind::Float(-value)),
        (UnOp::Not, ExprKind::Bool(value)) => Some(ExprKind::Bool(!value)),
        _ => None,
    }
}

fn fold_binary(op: BinOp, left: &ExprKind, right: &ExprKind) -> Option<ExprKind> {
    if let (ExprKind::Int(a), ExprKind::Int(b)) = (left, right) {
        return fold_int(op, *a, *b);
    }
    if matches!(left, ExprKind::Float(_)) || matches!(right, ExprKind::Float(_)) {
        if let (Some(a), Some(b)) = (as_f64(left), as_f64(right)) {
            return fold_float(op, a, b);
        }
    }
    if let (ExprKind::Bool(a), ExprKind::Bool(b)) = (left, right) {
        return match op {
            BinOp::And => Some(ExprKind::Bool(*a && *b)),
            BinOp::Or => Some(ExprKind::Bool(*a || *b)),
            BinOp::Eq => Some(ExprKind::Bool(a == b)),
            BinOp::NotEq => Some(ExprKind::Bool(a != b)),
            _ => None,
        };
    }
    if let (ExprKind::Str(a), ExprKind::Str(b)) = (left, right) {
        return match op {
            BinOp::Add => Some(ExprKind::Str(format!("{a}{b}"))),
            BinOp::Eq => Some(ExprKind::Bool(a == b)),
            BinOp::NotEq => Some(ExprKind::Bool(a != b)),
            _ => None,
        };
    }
    None
}

fn as_f64(kind: &ExprKind) -> Option<f64> {
    match kind {
        ExprKind::Int(v) => Some(*v as f64),
        ExprKind::Float(v) => Some(*v),
        _ => None,
    }
}

fn fold_int(op: BinOp, a: i64, b: i64) -> Option<ExprKind> {
    match op {
        BinOp::Add => Some(ExprKind::Int(a.wrapping_add(b))),
        BinOp::Sub => Some(ExprKind::Int(a.wrapping_sub(b))),
        BinOp::Mul => Some(ExprKind::Int(a.wrapping_mul(b))),
        BinOp::Div if b != 0 => Some(ExprKind::Int(a / b)),
        BinOp::Mod if b != 0 => Some(ExprKind::Int(a % b)),
        BinOp::Div | BinOp::Mod => None,
        BinOp::Eq => Some(ExprKind::Bool(a == b)),
        BinOp::NotEq => Some(ExprKind::Bool(a != b)),
        BinOp::Lt => Some(ExprKind::Bool(a < b)),
        BinOp::Gt => Some(ExprKind::Bool(a > b)),
        BinOp::LtEq => Some(ExprKind::Bool(a <= b)),
        BinOp::GtEq => Some(ExprKind::Bool(a >= b)),
        BinOp::And | BinOp::Or => None,
    }
}

fn fold_float(op: BinOp, a: f64, b: f64) -> Option<ExprKind> {
    match op {
        BinOp::Add => Some(ExprKind::Float(a + b)),
        BinOp::Sub => Some(ExprKind::Float(a - b)),
        BinOp::Mul => Some(ExprKind::Float(a * b)),
        BinOp::Div if b != 0.0 => Some(ExprKind::Float(a / b)),
        BinOp::Mod if b != 0.0 => Some(ExprKind::Float(a % b)),
        BinOp::Div | BinOp::Mod => None,
        BinOp::Eq => Some(ExprKind::Bool(a == b)),
        BinOp::NotEq => Some(ExprKind::Bool(a != b)),
        BinOp::Lt => Some(ExprKind::Bool(a < b)),
        BinOp::Gt => Some(ExprKind::Bool(a > b)),
        BinOp::LtEq => Some(ExprKind::Bool(a <= b)),
        BinOp::GtEq => Some(ExprKind::Bool(a >= b)),
        BinOp::And | BinOp::Or => None,
    }
}

/// Drops `VariableDecl`s nothing in the rest of the block references.
/// When the initializer can have a side effect (a call), the binding is
/// dropped but the initializer is kept as a bare expression statement.
fn cull_unused(block: &mut Block) {
    let mut refs: HashMap<String, usize> = HashMap::new();
    for stmt in block.iter() {
        count_stmt(stmt, &mut refs);
    }
    block.retain_mut(|stmt| {
        let StmtKind::VariableDecl { name, value, .. } = &stmt.kind else {
            return true;
        };
        if refs.get(name).copied().unwrap_or(0) > 0 {
            return true;
        }
        if has_side_effects(&value.kind) {
            stmt.kind = StmtKind::Expr(value.clone());
        } else {
            return false;
        }
        true
    });
}

fn has_side_effects(kind: &ExprKind) -> bool {
    match kind {
        ExprKind::Call { .. } | ExprKind::New { .. } | ExprKind::Assign { .. } => true,
        ExprKind::Binary { left, right, .. } => has_side_effects(&left.kind) || has_side_effects(&right.kind),
        ExprKind::Unary { operand, .. } => has_side_effects(&operand.kind),
        ExprKind::ArrayLiteral(items) | ExprKind::TupleLiteral(items) => items.iter().any(|i| has_side_effects(&i.kind)),
        ExprKind::ObjectLiteral { fields, .. } => fields.iter().any(|(_, v)| has_side_effects(&v.kind)),
        _ => false,
    }
}

fn count_stmt(stmt: &Stmt, refs: &mut HashMap<String, usize>) {
    match &stmt.kind {
        StmtKind::VariableDecl { value, .. } => count_expr(value, refs),
        StmtKind::Expr(expr) => count_expr(expr, refs),
        StmtKind::If { condition, then_branch, else_branch } => {
            count_expr(condition, refs);
            for stmt in then_branch {
                count_stmt(stmt, refs);
            }
            if let Some(else_branch) = else_branch {
                for stmt in else_branch {
                    count_stmt(stmt, refs);
                }
            }
        }
        StmtKind::While { condition, body } => {
            count_expr(condition, refs);
            for stmt in body {
                count_stmt(stmt, refs);
            }
        }
        StmtKind::Return(Some(expr)) | StmtKind::Yield(Some(expr)) => count_expr(expr, refs),
        StmtKind::Return(None) | StmtKind::Yield(None) => {}
        StmtKind::Block(block) => {
            for stmt in block {
                count_stmt(stmt, refs);
            }
        }
        StmtKind::TryCatch { try_block, catch_block, .. } => {
            for stmt in try_block {
                count_stmt(stmt, refs);
            }
            for stmt in catch_block {
                count_stmt(stmt, refs);
            }
        }
        StmtKind::ModuleDecl { body, .. } => {
            for stmt in body {
                count_stmt(stmt, refs);
            }
        }
        StmtKind::PrototypeDecl { .. } | StmtKind::TypeAlias { .. } | StmtKind::Import { .. } | StmtKind::MetaBlock(_) => {}
    }
}

fn count_expr(expr: &Expr, refs: &mut HashMap<String, usize>) {
    match &expr.kind {
        ExprKind::Identifier(name) => {
            *refs.entry(name.clone()).or_insert(0) += 1;
        }
        ExprKind::Unary { operand, .. } => count_expr(operand, refs),
        ExprKind::Binary { left, right, .. } => {
            count_expr(left, refs);
            count_expr(right, refs);
        }
        ExprKind::Assign { target, value } => {
            count_expr(target, refs);
            count_expr(value, refs);
        }
        ExprKind::Call { callee, args } => {
            count_expr(callee, refs);
            for arg in args {
                count_expr(&arg.value, refs);
            }
        }
        ExprKind::MemberAccess { object, .. } | ExprKind::Has { object, .. } => count_expr(object, refs),
        ExprKind::ArrayAccess { object, index } => {
            count_expr(object, refs);
            count_expr(index, refs);
        }
        ExprKind::ArrayLiteral(items) | ExprKind::TupleLiteral(items) => {
            for item in items {
                count_expr(item, refs);
            }
        }
        ExprKind::ObjectLiteral { fields, .. } => {
            for (_, value) in fields {
                count_expr(value, refs);
            }
        }
        ExprKind::New { args, .. } => {
            for arg in args {
                count_expr(&arg.value, refs);
            }
        }
        ExprKind::Function { body, .. } => {
            for stmt in body {
                count_stmt(stmt, refs);
            }
        }
        ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Str(_) | ExprKind::Bool(_) | ExprKind::Nil => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ace_diagnostics::SourceLocation;

    fn loc() -> SourceLocation {
        SourceLocation::unknown()
    }

    fn int(v: i64) -> Expr {
        Expr::int(v, loc())
    }

    fn bin(op: BinOp, left: Expr, right: Expr) -> Expr {
        ace_ast::Node::new(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, loc())
    }

    #[test]
    fn folds_one_plus_two_times_three_to_seven() {
        // 1 + (2 * 3)
        let mut expr = bin(BinOp::Add, int(1), bin(BinOp::Mul, int(2), int(3)));
        let mut consts = ConstEnv::default();
        consts.push();
        optimize_expr(&mut expr, &mut consts);
        assert_eq!(expr.kind, ExprKind::Int(7));
    }

    #[test]
    fn inlines_a_const_identifier_reference() {
        let mut program = vec![
            ace_ast::Node::new(
                StmtKind::VariableDecl { name: "x".into(), is_const: true, type_spec: None, value: Some(int(5)) },
                loc(),
            ),
            ace_ast::Node::new(
                StmtKind::Expr(bin(BinOp::Add, Expr::identifier("x", loc()), int(1))),
                loc(),
            ),
        ];
        optimize(&mut program);
        // the decl is now unreferenced (its use was inlined) and should be culled,
        // leaving a single statement: 5 + 1 folded to 6.
        assert_eq!(program.len(), 1);
        match &program[0].kind {
            StmtKind::Expr(expr) => assert_eq!(expr.kind, ExprKind::Int(6)),
            other => panic!("expected a bare expression statement, got {other:?}"),
        }
    }

    #[test]
    fn keeps_a_declaration_whose_initializer_has_side_effects_even_when_unused() {
        let mut program = vec![ace_ast::Node::new(
            StmtKind::VariableDecl {
                name: "ignored".into(),
                is_const: false,
                type_spec: None,
                value: Some(ace_ast::Node::new(
                    ExprKind::Call { callee: Box::new(Expr::identifier("log", loc())), args: vec![] },
                    loc(),
                )),
            },
            loc(),
        )];
        optimize(&mut program);
        assert_eq!(program.len(), 1);
        assert!(matches!(&program[0].kind, StmtKind::Expr(_)));
    }

    #[test]
    fn drops_a_pure_unused_declaration_entirely() {
        let mut program = vec![ace_ast::Node::new(
            StmtKind::VariableDecl { name: "unused".into(), is_const: false, type_spec: None, value: Some(int(42)) },
            loc(),
        )];
        optimize(&mut program);
        assert!(program.is_empty());
    }
}
