//! The `Build` pass (spec §3.8/§3.9/§4.3/§4.4): walks an analyzed
//! `Program`, allocating registers and stack slots, and produces a root
//! `Chunk` plus the static-object table that seeds the bytecode file's
//! static segment (spec §6).
//!
//! `ace-compiler::scope::Scope`s are popped and discarded once `analyze`
//! finishes, so this pass keeps its own lightweight environment
//! (name → stack slot) rather than reusing the analyzer's scope stack —
//! recorded as a deliberate simplification in `DESIGN.md`.

use std::collections::HashMap;

use ace_ast::{BinOp, Expr, ExprKind, Program, Stmt, StmtKind, UnOp};

use crate::bytecode::Opcode;
use crate::emit::chunk::{BeginTry, Buildable, Chunk, LoadFunc, LoadString, RawOp};
use crate::emit::storage::{hash_member_name, StorageOpBuilder};

/// A statically-known value lifted into the bytecode file's static segment,
/// referenced from the instruction stream by index (`LOAD_STATIC`).
#[derive(Debug, Clone, PartialEq)]
pub enum StaticObject {
    String(String),
    Function { label: usize, nargs: u8, flags: u8 },
}

/// Monotonic register counter. Ace's emitter never reuses a register
/// within one expression's evaluation; a register is freed only by
/// popping back to a saved mark once its value has been consumed.
#[derive(Debug, Default)]
struct RegisterAllocator {
    next: u8,
}

impl RegisterAllocator {
    fn alloc(&mut self) -> u8 {
        let reg = self.next;
        self.next = self.next.checked_add(1).expect("register file exhausted");
        reg
    }

    fn mark(&self) -> u8 {
        self.next
    }

    fn reset_to(&mut self, mark: u8) {
        self.next = mark;
    }
}

/// Running count of local stack slots in the current function, used to
/// compute `LOAD_OFFSET`/`MOV_OFFSET` operands.
#[derive(Debug, Default)]
struct StackAllocator {
    depth: u16,
}

impl StackAllocator {
    fn push(&mut self) -> u16 {
        let offset = self.depth;
        self.depth += 1;
        offset
    }

    fn pop_n(&mut self, n: u16) {
        self.depth = self.depth.saturating_sub(n);
    }
}

/// One lexical block's worth of locals; environments nest as a stack,
/// innermost last, mirroring the block structure of the source.
#[derive(Default)]
struct Env {
    scopes: Vec<HashMap<String, u16>>,
}

impl Env {
    fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop(&mut self) -> usize {
        self.scopes.pop().map(|s| s.len()).unwrap_or(0)
    }

    fn declare(&mut self, name: &str, offset: u16) {
        self.scopes.last_mut().expect("no active scope").insert(name.to_string(), offset);
    }

    fn lookup(&self, name: &str) -> Option<u16> {
        self.scopes.iter().rev().find_map(|s| s.get(name).copied())
    }
}

pub struct Emitter {
    registers: RegisterAllocator,
    stack: StackAllocator,
    env: Env,
    pub statics: Vec<StaticObject>,
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Emitter {
    pub fn new() -> Self {
        Self { registers: RegisterAllocator::default(), stack: StackAllocator::default(), env: Env::default(), statics: Vec::new() }
    }

    fn intern_string(&mut self, value: &str) -> u16 {
        if let Some(index) = self.statics.iter().position(|s| matches!(s, StaticObject::String(existing) if existing == value)) {
            return index as u16;
        }
        self.statics.push(StaticObject::String(value.to_string()));
        (self.statics.len() - 1) as u16
    }

    /// Emits a whole program (a module's top-level block) into a root chunk.
    pub fn emit_program(&mut self, program: &Program) -> Chunk {
        let mut chunk = Chunk::new();
        self.env.push();
        for stmt in program {
            self.emit_stmt(&mut chunk, stmt);
        }
        self.env.pop();
        chunk.append(RawOp::new(Opcode::Exit, &[]));
        chunk
    }

    fn emit_stmt(&mut self, chunk: &mut Chunk, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::VariableDecl { name, value, .. } => {
                let mark = self.registers.mark();
                let reg = self.emit_expr(chunk, value);
                let offset = self.stack.push();
                self.env.declare(name, offset);
                chunk.append(StorageOpBuilder::store(reg).local().by_offset(offset));
                self.registers.reset_to(mark);
            }
            StmtKind::Expr(expr) => {
                let mark = self.registers.mark();
                self.emit_expr(chunk, expr);
                self.registers.reset_to(mark);
            }
            StmtKind::If { condition, then_branch, else_branch } => {
                self.emit_if(chunk, condition, then_branch, else_branch.as_deref());
            }
            StmtKind::While { condition, body } => {
                self.emit_while(chunk, condition, body);
            }
            StmtKind::Return(value) => {
                let mark = self.registers.mark();
                if let Some(value) = value {
                    let reg = self.emit_expr(chunk, value);
                    if reg != 0 {
                        chunk.append(RawOp::new(Opcode::MovReg, &[0, reg]));
                    }
                }
                chunk.append(RawOp::new(Opcode::Ret, &[]));
                self.registers.reset_to(mark);
            }
            StmtKind::Block(block) => {
                self.env.push();
                for inner in block {
                    self.emit_stmt(chunk, inner);
                }
                let declared = self.env.pop() as u16;
                self.stack.pop_n(declared);
            }
            StmtKind::TryCatch { try_block, catch_block, .. } => {
                self.emit_try_catch(chunk, try_block, catch_block);
            }
            // Prototype/type-alias/module/import/yield/meta-block declarations have no
            // run-time instruction counterpart at this level; they are resolved entirely
            // during analysis (type table, module tree) and produce no bytecode here.
            StmtKind::PrototypeDecl { .. }
            | StmtKind::TypeAlias { .. }
            | StmtKind::ModuleDecl { .. }
            | StmtKind::Import { .. }
            | StmtKind::Yield(_)
            | StmtKind::MetaBlock(_) => {}
        }
    }

    fn emit_if(&mut self, chunk: &mut Chunk, condition: &Expr, then_branch: &[Stmt], else_branch: Option<&[Stmt]>) {
        let mark = self.registers.mark();
        let cond_reg = self.emit_expr(chunk, condition);
        chunk.append(RawOp::new(Opcode::Cmpz, &[cond_reg]));
        self.registers.reset_to(mark);

        let else_label = chunk.new_label();
        chunk.append(crate::emit::chunk::Jump::new(Opcode::Je, else_label));

        self.env.push();
        for stmt in then_branch {
            self.emit_stmt(chunk, stmt);
        }
        let declared = self.env.pop() as u16;
        self.stack.pop_n(declared);

        if let Some(else_branch) = else_branch {
            let end_label = chunk.new_label();
            chunk.append(crate::emit::chunk::Jump::new(Opcode::Jmp, end_label));
            chunk.place_label(else_label);
            self.env.push();
            for stmt in else_branch {
                self.emit_stmt(chunk, stmt);
            }
            let declared = self.env.pop() as u16;
            self.stack.pop_n(declared);
            chunk.place_label(end_label);
        } else {
            chunk.place_label(else_label);
        }
    }

    fn emit_while(&mut self, chunk: &mut Chunk, condition: &Expr, body: &[Stmt]) {
        let top_label = chunk.new_label();
        let end_label = chunk.new_label();
        chunk.place_label(top_label);

        let mark = self.registers.mark();
        let cond_reg = self.emit_expr(chunk, condition);
        chunk.append(RawOp::new(Opcode::Cmpz, &[cond_reg]));
        self.registers.reset_to(mark);
        chunk.append(crate::emit::chunk::Jump::new(Opcode::Je, end_label));

        self.env.push();
        for stmt in body {
            self.emit_stmt(chunk, stmt);
        }
        let declared = self.env.pop() as u16;
        self.stack.pop_n(declared);

        chunk.append(crate::emit::chunk::Jump::new(Opcode::Jmp, top_label));
        chunk.place_label(end_label);
    }

    fn emit_try_catch(&mut self, chunk: &mut Chunk, try_block: &[Stmt], catch_block: &[Stmt]) {
        let catch_label = chunk.new_label();
        chunk.append(BeginTry { catch_label });

        self.env.push();
        for stmt in try_block {
            self.emit_stmt(chunk, stmt);
        }
        let declared = self.env.pop() as u16;
        self.stack.pop_n(declared);

        chunk.append(RawOp::new(Opcode::EndTry, &[]));
        let end_label = chunk.new_label();
        chunk.append(crate::emit::chunk::Jump::new(Opcode::Jmp, end_label));

        chunk.place_label(catch_label);
        self.env.push();
        for stmt in catch_block {
            self.emit_stmt(chunk, stmt);
        }
        let declared = self.env.pop() as u16;
        self.stack.pop_n(declared);
        chunk.place_label(end_label);
    }

    /// Emits `expr`, returning the register holding its result.
    fn emit_expr(&mut self, chunk: &mut Chunk, expr: &Expr) -> u8 {
        match &expr.kind {
            ExprKind::Int(value) => {
                let reg = self.registers.alloc();
                let bytes = value.to_le_bytes();
                let mut operands = Vec::with_capacity(9);
                operands.push(reg);
                operands.extend_from_slice(&bytes);
                chunk.append(RawOp::new(Opcode::LoadI64, &operands));
                reg
            }
            ExprKind::Float(value) => {
                let reg = self.registers.alloc();
                chunk.append(self.load_f64(reg, *value));
                reg
            }
            ExprKind::Bool(value) => {
                let reg = self.registers.alloc();
                chunk.append(RawOp::new(if *value { Opcode::LoadTrue } else { Opcode::LoadFalse }, &[reg]));
                reg
            }
            ExprKind::Nil => {
                let reg = self.registers.alloc();
                chunk.append(RawOp::new(Opcode::LoadNull, &[reg]));
                reg
            }
            ExprKind::Str(value) => {
                let reg = self.registers.alloc();
                chunk.append(LoadString { reg, value: value.clone() });
                reg
            }
            ExprKind::Identifier(name) => {
                let reg = self.registers.alloc();
                if let Some(offset) = self.env.lookup(name) {
                    chunk.append(StorageOpBuilder::load(reg).local().by_offset(offset));
                } else {
                    let index = self.intern_string(name);
                    // `Operation::Load` against `Static`/`ByIndex` is the one
                    // combination `StorageError` never rejects.
                    chunk.append(StorageOpBuilder::load(reg).static_().by_index(index).expect("load+static+by_index is always valid"));
                }
                reg
            }
            ExprKind::Unary { op, operand } => {
                let reg = self.emit_expr(chunk, operand);
                match op {
                    UnOp::Neg => chunk.append(RawOp::new(Opcode::Neg, &[reg])),
                    UnOp::Not | UnOp::BitNot => chunk.append(RawOp::new(Opcode::Not, &[reg])),
                }
                reg
            }
            ExprKind::Binary { op, left, right } => self.emit_binary(chunk, *op, left, right),
            ExprKind::Assign { target, value } => self.emit_assign(chunk, target, value),
            ExprKind::MemberAccess { object, member } => {
                let obj_reg = self.emit_expr(chunk, object);
                let reg = self.registers.alloc();
                chunk.append(StorageOpBuilder::load(reg).member(obj_reg).by_hash(hash_member_name(member)));
                reg
            }
            ExprKind::Has { object, member } => {
                let obj_reg = self.emit_expr(chunk, object);
                let reg = self.registers.alloc();
                let hash = hash_member_name(member).to_le_bytes();
                chunk.append(RawOp::new(
                    Opcode::HasMemHash,
                    &[reg, obj_reg, hash[0], hash[1], hash[2], hash[3]],
                ));
                reg
            }
            ExprKind::ArrayAccess { object, index } => {
                let obj_reg = self.emit_expr(chunk, object);
                let index_reg = self.emit_expr(chunk, index);
                let reg = self.registers.alloc();
                chunk.append(StorageOpBuilder::load(reg).array(obj_reg).by_index_register(index_reg));
                reg
            }
            ExprKind::ArrayLiteral(items) | ExprKind::TupleLiteral(items) => {
                let array_reg = self.registers.alloc();
                let size = (items.len() as u32).to_le_bytes();
                chunk.append(RawOp::new(Opcode::NewArray, &[array_reg, size[0], size[1], size[2], size[3]]));
                for item in items {
                    let item_reg = self.emit_expr(chunk, item);
                    chunk.append(RawOp::new(Opcode::PushArray, &[array_reg, item_reg]));
                }
                array_reg
            }
            ExprKind::ObjectLiteral { fields, .. } => {
                let members: Vec<String> = fields.iter().map(|(name, _)| name.clone()).collect();
                let obj_reg = self.registers.alloc();
                chunk.append(crate::emit::chunk::LoadType { reg: obj_reg, name: String::from("<anon>"), members: members.clone() });
                chunk.append(RawOp::new(Opcode::New, &[obj_reg, obj_reg]));
                for (name, value) in fields {
                    let value_reg = self.emit_expr(chunk, value);
                    chunk.append(StorageOpBuilder::store(value_reg).member(obj_reg).by_hash(hash_member_name(name)));
                }
                obj_reg
            }
            ExprKind::New { args, .. } => {
                let type_reg = self.registers.alloc();
                chunk.append(RawOp::new(Opcode::LoadNull, &[type_reg]));
                let obj_reg = self.registers.alloc();
                chunk.append(RawOp::new(Opcode::New, &[obj_reg, type_reg]));
                for arg in args {
                    self.emit_expr(chunk, &arg.value);
                }
                obj_reg
            }
            ExprKind::Call { callee, args } => self.emit_call(chunk, callee, args),
            ExprKind::Function { params, body, .. } => self.emit_function_literal(chunk, params, body),
        }
    }

    fn emit_binary(&mut self, chunk: &mut Chunk, op: BinOp, left: &Expr, right: &Expr) -> u8 {
        if matches!(op, BinOp::And | BinOp::Or) {
            return self.emit_logical(chunk, left, right, op == BinOp::And);
        }
        let lhs = self.emit_expr(chunk, left);
        let rhs = self.emit_expr(chunk, right);
        match op {
            BinOp::Add => {
                let dst = self.registers.alloc();
                chunk.append(RawOp::new(Opcode::Add, &[lhs, rhs, dst]));
                dst
            }
            BinOp::Sub => {
                let dst = self.registers.alloc();
                chunk.append(RawOp::new(Opcode::Sub, &[lhs, rhs, dst]));
                dst
            }
            BinOp::Mul => {
                let dst = self.registers.alloc();
                chunk.append(RawOp::new(Opcode::Mul, &[lhs, rhs, dst]));
                dst
            }
            BinOp::Div => {
                let dst = self.registers.alloc();
                chunk.append(RawOp::new(Opcode::Div, &[lhs, rhs, dst]));
                dst
            }
            BinOp::Mod => {
                let dst = self.registers.alloc();
                chunk.append(RawOp::new(Opcode::Mod, &[lhs, rhs, dst]));
                dst
            }
            // Comparisons set CompareFlags via CMP, then materialize a bool.
            // There is no LESS flag (spec §4.4); `<`/`<=` are normalized here
            // by swapping operands, matching the VM's GREATER/EQUAL-only design.
            BinOp::Eq => self.emit_compare(chunk, lhs, rhs, &[Opcode::Je]),
            BinOp::NotEq => self.emit_compare(chunk, lhs, rhs, &[Opcode::Jne]),
            BinOp::Gt => self.emit_compare(chunk, lhs, rhs, &[Opcode::Jg]),
            BinOp::GtEq => self.emit_compare(chunk, lhs, rhs, &[Opcode::Jge]),
            BinOp::Lt => self.emit_compare(chunk, rhs, lhs, &[Opcode::Jg]),
            BinOp::LtEq => self.emit_compare(chunk, rhs, lhs, &[Opcode::Jge]),
            BinOp::And | BinOp::Or => unreachable!("short-circuit operators are handled before operand evaluation"),
        }
    }

    /// `&&`/`||`, short-circuiting: the right operand is only evaluated if
    /// the left one doesn't already decide the result. `CMPZ` + a
    /// conditional jump reads as "jump if the operand was falsy" (the same
    /// convention `emit_if`/`emit_while` use), so AND short-circuits to
    /// false on a falsy left operand and OR short-circuits to true on a
    /// truthy one.
    fn emit_logical(&mut self, chunk: &mut Chunk, left: &Expr, right: &Expr, is_and: bool) -> u8 {
        let mark = self.registers.mark();
        let lhs = self.emit_expr(chunk, left);
        chunk.append(RawOp::new(Opcode::Cmpz, &[lhs]));
        self.registers.reset_to(mark);

        let false_label = chunk.new_label();
        let true_label = chunk.new_label();
        let end_label = chunk.new_label();

        if is_and {
            chunk.append(crate::emit::chunk::Jump::new(Opcode::Je, false_label));
        } else {
            chunk.append(crate::emit::chunk::Jump::new(Opcode::Jne, true_label));
        }

        let rhs_mark = self.registers.mark();
        let rhs = self.emit_expr(chunk, right);
        chunk.append(RawOp::new(Opcode::Cmpz, &[rhs]));
        self.registers.reset_to(rhs_mark);
        chunk.append(crate::emit::chunk::Jump::new(Opcode::Je, false_label));

        let dst = self.registers.alloc();
        chunk.place_label(true_label);
        chunk.append(RawOp::new(Opcode::LoadTrue, &[dst]));
        chunk.append(crate::emit::chunk::Jump::new(Opcode::Jmp, end_label));
        chunk.place_label(false_label);
        chunk.append(RawOp::new(Opcode::LoadFalse, &[dst]));
        chunk.place_label(end_label);
        dst
    }

    fn emit_compare(&mut self, chunk: &mut Chunk, lhs: u8, rhs: u8, true_jump: &[Opcode]) -> u8 {
        chunk.append(RawOp::new(Opcode::Cmp, &[lhs, rhs]));
        let dst = self.registers.alloc();
        let false_label = chunk.new_label();
        let end_label = chunk.new_label();
        chunk.append(crate::emit::chunk::Jump::new(true_jump[0], false_label));
        chunk.append(RawOp::new(Opcode::LoadFalse, &[dst]));
        chunk.append(crate::emit::chunk::Jump::new(Opcode::Jmp, end_label));
        chunk.place_label(false_label);
        chunk.append(RawOp::new(Opcode::LoadTrue, &[dst]));
        chunk.place_label(end_label);
        dst
    }

    fn emit_assign(&mut self, chunk: &mut Chunk, target: &Expr, value: &Expr) -> u8 {
        let reg = self.emit_expr(chunk, value);
        match &target.kind {
            ExprKind::Identifier(name) => {
                if let Some(offset) = self.env.lookup(name) {
                    chunk.append(StorageOpBuilder::store(reg).local().by_offset(offset));
                } else {
                    // Assignment to an undeclared name binds a fresh local at the
                    // next free slot, matching the language's implicit-declaration
                    // assignment form.
                    let offset = self.stack.push();
                    self.env.declare(name, offset);
                    chunk.append(StorageOpBuilder::store(reg).local().by_offset(offset));
                }
            }
            ExprKind::MemberAccess { object, member } => {
                let obj_reg = self.emit_expr(chunk, object);
                chunk.append(StorageOpBuilder::store(reg).member(obj_reg).by_hash(hash_member_name(member)));
            }
            ExprKind::ArrayAccess { object, index } => {
                let obj_reg = self.emit_expr(chunk, object);
                let index_reg = self.emit_expr(chunk, index);
                chunk.append(StorageOpBuilder::store(reg).array(obj_reg).by_index_register(index_reg));
            }
            _ => unreachable!("parser only produces identifier/member/index assignment targets"),
        }
        reg
    }

    fn emit_call(&mut self, chunk: &mut Chunk, callee: &Expr, args: &[ace_ast::Argument]) -> u8 {
        let mark = self.registers.mark();
        for arg in args {
            let reg = self.emit_expr(chunk, &arg.value);
            chunk.append(RawOp::new(Opcode::Push, &[reg]));
        }
        self.registers.reset_to(mark);
        let callee_reg = self.emit_expr(chunk, callee);
        chunk.append(RawOp::new(Opcode::Call, &[callee_reg, args.len() as u8]));
        chunk.append(RawOp::new(Opcode::PopN, &[args.len() as u8]));
        let result_reg = self.registers.alloc();
        if result_reg != 0 {
            chunk.append(RawOp::new(Opcode::MovReg, &[result_reg, 0]));
        }
        result_reg
    }

    fn emit_function_literal(&mut self, chunk: &mut Chunk, params: &[ace_ast::Param], body: &ace_ast::Block) -> u8 {
        let mut body_chunk = Chunk::new();
        let saved_registers = std::mem::take(&mut self.registers);
        let saved_stack = std::mem::take(&mut self.stack);
        self.env.push();
        for param in params {
            let offset = self.stack.push();
            self.env.declare(&param.name, offset);
        }
        for stmt in body {
            self.emit_stmt(&mut body_chunk, stmt);
        }
        self.env.pop();
        body_chunk.append(RawOp::new(Opcode::Ret, &[]));
        self.registers = saved_registers;
        self.stack = saved_stack;

        let skip_label = chunk.new_label();
        chunk.append(crate::emit::chunk::Jump::new(Opcode::Jmp, skip_label));
        let entry_label = chunk.new_label();
        chunk.place_label(entry_label);
        chunk.append_chunk(body_chunk);
        chunk.place_label(skip_label);

        let reg = self.registers.alloc();
        chunk.append(LoadFunc { reg, label: entry_label, nargs: params.len() as u8, flags: 0 });
        reg
    }

    fn load_f64(&mut self, reg: u8, value: f64) -> RawOp {
        let bytes = value.to_le_bytes();
        RawOp::new(Opcode::LoadF64, &[reg, bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ace_ast::{Expr, ExprKind, Node, Stmt, StmtKind};
    use ace_diagnostics::SourceLocation;

    fn stmt(kind: StmtKind) -> Stmt {
        Node::new(kind, SourceLocation::unknown())
    }

    fn expr(kind: ExprKind) -> Expr {
        Node::new(kind, SourceLocation::unknown())
    }

    #[test]
    fn variable_declaration_allocates_a_stack_slot_and_stores_into_it() {
        let program = vec![stmt(StmtKind::VariableDecl {
            name: "x".into(),
            is_const: false,
            type_spec: None,
            value: Some(expr(ExprKind::Int(7))),
        })];
        let mut emitter = Emitter::new();
        let chunk = emitter.emit_program(&program);
        let bytes = crate::emit::chunk::build_root(&chunk);
        assert_eq!(bytes.last(), Some(&(Opcode::Exit as u8)));
        assert!(bytes.contains(&(Opcode::MovOffset as u8)));
    }

    #[test]
    fn if_without_else_emits_a_single_conditional_jump() {
        let program = vec![stmt(StmtKind::If {
            condition: expr(ExprKind::Bool(true)),
            then_branch: vec![stmt(StmtKind::Expr(expr(ExprKind::Int(1))))],
            else_branch: None,
        })];
        let mut emitter = Emitter::new();
        let chunk = emitter.emit_program(&program);
        let bytes = crate::emit::chunk::build_root(&chunk);
        assert!(bytes.contains(&(Opcode::Je as u8)));
        assert!(bytes.contains(&(Opcode::Cmpz as u8)));
    }

    #[test]
    fn while_loop_jumps_back_to_its_condition() {
        let program = vec![stmt(StmtKind::While {
            condition: expr(ExprKind::Bool(false)),
            body: vec![],
        })];
        let mut emitter = Emitter::new();
        let chunk = emitter.emit_program(&program);
        let bytes = crate::emit::chunk::build_root(&chunk);
        assert!(bytes.contains(&(Opcode::Jmp as u8)));
    }

    #[test]
    fn string_literal_interns_as_a_load_string_instruction() {
        let program = vec![stmt(StmtKind::Expr(expr(ExprKind::Str("hi".into()))))];
        let mut emitter = Emitter::new();
        let chunk = emitter.emit_program(&program);
        let bytes = crate::emit::chunk::build_root(&chunk);
        assert!(bytes.contains(&(Opcode::LoadString as u8)));
    }

    #[test]
    fn logical_and_short_circuits_without_evaluating_the_right_operand() {
        let program = vec![stmt(StmtKind::Expr(expr(ExprKind::Binary {
            op: BinOp::And,
            left: Box::new(expr(ExprKind::Bool(false))),
            right: Box::new(expr(ExprKind::Str("never evaluated".into()))),
        })))];
        let mut emitter = Emitter::new();
        let chunk = emitter.emit_program(&program);
        let bytes = crate::emit::chunk::build_root(&chunk);
        // A conditional jump guards the right operand's LOAD_STRING rather
        // than an unconditional arithmetic substitute.
        assert!(bytes.contains(&(Opcode::Je as u8)));
        assert!(bytes.contains(&(Opcode::LoadString as u8)));
        assert!(!bytes.contains(&(Opcode::Mul as u8)));
    }

    #[test]
    fn logical_or_short_circuits_to_true_on_a_truthy_left_operand() {
        let program = vec![stmt(StmtKind::Expr(expr(ExprKind::Binary {
            op: BinOp::Or,
            left: Box::new(expr(ExprKind::Bool(true))),
            right: Box::new(expr(ExprKind::Int(1))),
        })))];
        let mut emitter = Emitter::new();
        let chunk = emitter.emit_program(&program);
        let bytes = crate::emit::chunk::build_root(&chunk);
        assert!(bytes.contains(&(Opcode::Jne as u8)));
        assert!(!bytes.contains(&(Opcode::Add as u8)));
    }
}
