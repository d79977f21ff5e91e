//! Semantic analyzer: the `Visit` traversal (spec §4.2).
//!
//! Implemented as free functions taking `&mut CompilationUnit` as an
//! explicit context, per the design note on visitor mutation of shared
//! state — `ace-ast` nodes carry no analyzer logic themselves.

use ace_ast::{Argument, BinOp, Expr, ExprKind, Program, Stmt, StmtKind, TypeSpec, UnOp};
use ace_diagnostics::{ArityKind, ScopeKind as ScopeErrorKind, SemanticsKind, TypeKind};

use crate::module::ModuleId;
use crate::scope::{FunctionFlags, IdentifierFlags, ScopeKind};
use crate::types::TypeId;
use crate::unit::CompilationUnit;

/// Runs the full `Visit` pass over a top-level program.
pub fn analyze(unit: &mut CompilationUnit, program: &Program) {
    let module = unit.current_module();
    for stmt in program {
        visit_stmt(unit, module, stmt);
    }
    crate::lints::run_all(unit, module);
}

fn visit_block(unit: &mut CompilationUnit, module: ModuleId, kind: ScopeKind, body: &[Stmt]) {
    unit.modules.get_mut(module).push_scope(kind);
    for stmt in body {
        visit_stmt(unit, module, stmt);
    }
    unit.modules.get_mut(module).pop_scope();
}

fn visit_stmt(unit: &mut CompilationUnit, module: ModuleId, stmt: &Stmt) {
    match &stmt.kind {
        StmtKind::VariableDecl { name, is_const, type_spec, value } => {
            visit_variable_decl(unit, module, name, *is_const, type_spec, value, &stmt.location);
        }
        StmtKind::PrototypeDecl { name, type_params, base, members } => {
            visit_prototype_decl(unit, module, name, type_params, base, members);
        }
        StmtKind::TypeAlias { name, aliasee } => {
            let aliasee_id = resolve_type_spec(unit, module, aliasee);
            let id = unit.types.declare_alias(name.clone(), aliasee_id);
            unit.modules.get_mut(module).current_scope_mut().declare_type(name.clone(), id);
        }
        StmtKind::ModuleDecl { name, body } => {
            let child = unit.modules.declare_module(module, name, stmt.location.clone());
            let previous = unit.enter_module(child);
            for inner in body {
                visit_stmt(unit, child, inner);
            }
            unit.leave_module(previous);
        }
        StmtKind::Import { kind: _, path: _, alias: _ } => {
            let is_global_scope = module == unit.modules.root() && unit.modules.get(module).depth() == 1;
            if !is_global_scope {
                unit.report(ace_diagnostics::Diagnostic::fatal(
                    ace_diagnostics::ModuleKind::ImportOutsideGlobal,
                    stmt.location.clone(),
                ));
            }
            // File resolution is an external collaborator; the analyzer
            // only validates placement here, not import content.
        }
        StmtKind::If { condition, then_branch, else_branch } => {
            visit_expr(unit, module, condition);
            visit_block(unit, module, ScopeKind::Normal, then_branch);
            if let Some(else_branch) = else_branch {
                visit_block(unit, module, ScopeKind::Normal, else_branch);
            }
        }
        StmtKind::While { condition, body } => {
            visit_expr(unit, module, condition);
            visit_block(unit, module, ScopeKind::Loop, body);
        }
        StmtKind::TryCatch { try_block, catch_var, catch_block } => {
            visit_block(unit, module, ScopeKind::Normal, try_block);
            unit.modules.get_mut(module).push_scope(ScopeKind::Normal);
            if let Some(name) = catch_var {
                let any = unit.types.builtins.any;
                unit.modules.get_mut(module).current_scope_mut().declare(name.clone(), any);
            }
            for inner in catch_block {
                visit_stmt(unit, module, inner);
            }
            unit.modules.get_mut(module).pop_scope();
        }
        StmtKind::Return(value) => {
            let ty = value.as_ref().map(|e| visit_expr(unit, module, e)).unwrap_or(unit.types.builtins.any);
            // Record on the nearest enclosing *function* scope, not merely
            // the innermost scope — a `return` inside a nested `if`/`while`
            // block must still contribute to that function's inferred type.
            match nearest_function_scope_index(unit, module) {
                Some(function_scope) => {
                    if let Some(scope) = unit.modules.get_mut(module).scope_at_mut(function_scope) {
                        scope.return_types.push((ty, stmt.location.clone()));
                    }
                }
                None => unit.report(ace_diagnostics::Diagnostic::fatal(
                    SemanticsKind::ReturnOutsideFunction,
                    stmt.location.clone(),
                )),
            }
        }
        StmtKind::Yield(value) => {
            if let Some(value) = value {
                visit_expr(unit, module, value);
            }
            if let Some(function_scope) = nearest_function_scope_index(unit, module) {
                if let Some(scope) = unit.modules.get_mut(module).scope_at_mut(function_scope) {
                    scope.function_flags |= FunctionFlags::GENERATOR;
                }
            }
        }
        StmtKind::Block(body) => visit_block(unit, module, ScopeKind::Normal, body),
        StmtKind::MetaBlock(body) => {
            // Meta-blocks run at compile time rather than VM runtime; the
            // analyzer still resolves their contents statically.
            visit_block(unit, module, ScopeKind::Normal, body);
        }
        StmtKind::Expr(expr) => {
            visit_expr(unit, module, expr);
        }
    }
}

fn visit_variable_decl(
    unit: &mut CompilationUnit,
    module: ModuleId,
    name: &str,
    is_const: bool,
    type_spec: &Option<TypeSpec>,
    value: &Option<Expr>,
    location: &ace_diagnostics::SourceLocation,
) {
    if type_spec.is_none() && value.is_none() {
        unit.report(ace_diagnostics::Diagnostic::fatal(
            TypeKind::Mismatched { expected: "a type or initializer".to_string(), found: "neither".to_string() },
            location.clone(),
        ));
        return;
    }
    if is_const && value.is_none() {
        unit.report(ace_diagnostics::Diagnostic::fatal(
            SemanticsKind::ConstModified(name.to_string()),
            location.clone(),
        ));
        return;
    }

    let declared_type = type_spec.as_ref().map(|spec| resolve_type_spec(unit, module, spec));
    let value_type = value.as_ref().map(|expr| visit_expr(unit, module, expr));

    let final_type = match (declared_type, value_type) {
        (Some(declared), Some(actual)) => {
            if !unit.types.type_compatible(declared, actual, false) {
                unit.report(ace_diagnostics::Diagnostic::fatal(
                    TypeKind::Mismatched {
                        expected: unit.types.get(declared).name,
                        found: unit.types.get(actual).name,
                    },
                    value.as_ref().map(|e| e.location.clone()).unwrap_or_else(|| location.clone()),
                ));
            }
            declared
        }
        (Some(declared), None) => declared,
        (None, Some(actual)) => actual,
        (None, None) => unit.types.builtins.undefined,
    };

    let in_function = nearest_function_scope_index(unit, module).is_some();
    let scope = unit.modules.get_mut(module).current_scope_mut();
    match scope.declare(name.to_string(), final_type) {
        Some(identifier) => {
            if is_const {
                identifier.flags |= IdentifierFlags::CONST;
                identifier.current_value = value.clone();
            }
            if in_function {
                identifier.flags |= IdentifierFlags::DECLARED_IN_FUNCTION;
            }
        }
        None => unit.report(ace_diagnostics::Diagnostic::fatal(
            ScopeErrorKind::Redeclared(name.to_string()),
            location.clone(),
        )),
    }
}

fn visit_prototype_decl(
    unit: &mut CompilationUnit,
    module: ModuleId,
    name: &str,
    type_params: &[String],
    base: &Option<String>,
    members: &[ace_ast::PrototypeMember],
) {
    let base_id = base.as_ref().and_then(|base_name| lookup_type_by_name(unit, module, base_name));

    if type_params.is_empty() {
        let resolved_members = members
            .iter()
            .map(|m| crate::types::Member {
                name: m.name.clone(),
                type_id: m.type_spec.as_ref().map(|t| resolve_type_spec(unit, module, t)).unwrap_or(unit.types.builtins.any),
                default_value: m.default_value.clone(),
            })
            .collect();
        let id = unit.types.declare_user_type(name.to_string(), base_id, resolved_members);
        unit.modules.get_mut(module).current_scope_mut().declare_type(name.to_string(), id);
    } else {
        // A generic template: member types referencing a type-parameter
        // name resolve to freshly minted `GenericParameter` placeholders,
        // visible only while this declaration's members are resolved.
        unit.modules.get_mut(module).push_scope(ScopeKind::TypeDefinition);
        let param_ids: Vec<TypeId> = type_params
            .iter()
            .map(|p| {
                let id = unit.types.declare_generic_parameter(p.clone());
                unit.modules.get_mut(module).current_scope_mut().declare_type(p.clone(), id);
                id
            })
            .collect();
        let resolved_members = members
            .iter()
            .map(|m| crate::types::Member {
                name: m.name.clone(),
                type_id: m.type_spec.as_ref().map(|t| resolve_type_spec(unit, module, t)).unwrap_or(unit.types.builtins.any),
                default_value: m.default_value.clone(),
            })
            .collect();
        unit.modules.get_mut(module).pop_scope();
        let template_id = unit.types.declare_generic_template(name.to_string(), param_ids, base_id, resolved_members);
        unit.modules.get_mut(module).current_scope_mut().declare_type(name.to_string(), template_id);
    }
}

/// Identifier lookup order (spec §4.2): current module's scope stack
/// (innermost-first), the global module, the registered module list, then
/// the module's symbol-type table.
pub enum Lookup {
    Variable(TypeId),
    Module(ModuleId),
    Type(TypeId),
    NotFound,
}

pub fn lookup_identifier(unit: &CompilationUnit, module: ModuleId, name: &str) -> Lookup {
    for scope in unit.modules.get(module).scopes() {
        if let Some(identifier) = scope.lookup(name) {
            return Lookup::Variable(identifier.type_id);
        }
    }
    if module != unit.modules.root() {
        for scope in unit.modules.get(unit.modules.root()).scopes() {
            if let Some(identifier) = scope.lookup(name) {
                return Lookup::Variable(identifier.type_id);
            }
        }
    }
    if let Some(found) = unit.modules.lookup_module(module, name) {
        return Lookup::Module(found);
    }
    if let Some(type_id) = lookup_type_by_name(unit, module, name) {
        return Lookup::Type(type_id);
    }
    Lookup::NotFound
}

fn lookup_type_by_name(unit: &CompilationUnit, module: ModuleId, name: &str) -> Option<TypeId> {
    for scope in unit.modules.get(module).scopes() {
        if let Some(id) = scope.lookup_type(name) {
            return Some(id);
        }
    }
    builtin_type_by_name(unit, name)
}

fn builtin_type_by_name(unit: &CompilationUnit, name: &str) -> Option<TypeId> {
    let b = &unit.types.builtins;
    Some(match name {
        "Undefined" => b.undefined,
        "Any" => b.any,
        "Object" => b.object,
        "Int" => b.int,
        "Float" => b.float,
        "Number" => b.number,
        "Boolean" => b.boolean,
        "String" => b.string,
        "Null" => b.null,
        "Function" => b.function,
        "Array" => b.array,
        "Tuple" => b.tuple,
        "Args" => b.args,
        "Maybe" => b.maybe,
        "Const" => b.const_,
        "Block" => b.block,
        "Closure" => b.closure,
        "Generator" => b.generator,
        _ => return None,
    })
}

fn resolve_type_spec(unit: &mut CompilationUnit, module: ModuleId, spec: &TypeSpec) -> TypeId {
    match spec {
        TypeSpec::Named(name) => lookup_type_by_name(unit, module, name).unwrap_or(unit.types.builtins.undefined),
        TypeSpec::Generic { base, args } => {
            let Some(template) = lookup_type_by_name(unit, module, base) else {
                return unit.types.builtins.undefined;
            };
            let arg_ids: Vec<TypeId> = args.iter().map(|a| resolve_type_spec(unit, module, a)).collect();
            unit.types.instantiate_generic(template, arg_ids).unwrap_or(unit.types.builtins.undefined)
        }
    }
}

/// Finds the scope index (counted from the module's base, 0-indexed) of the
/// nearest enclosing function scope, searching from the innermost scope
/// outward. Used both for `return`/`yield` validation and the closure
/// capture rule.
fn nearest_function_scope_index(unit: &CompilationUnit, module: ModuleId) -> Option<usize> {
    let module_ref = unit.modules.get(module);
    let depth = module_ref.depth();
    for (offset, scope) in module_ref.scopes().enumerate() {
        if scope.is_function_scope() {
            return Some(depth - 1 - offset);
        }
    }
    None
}

fn visit_expr(unit: &mut CompilationUnit, module: ModuleId, expr: &Expr) -> TypeId {
    match &expr.kind {
        ExprKind::Int(_) => unit.types.builtins.int,
        ExprKind::Float(_) => unit.types.builtins.float,
        ExprKind::Str(_) => unit.types.builtins.string,
        ExprKind::Bool(_) => unit.types.builtins.boolean,
        ExprKind::Nil => unit.types.builtins.null,
        ExprKind::Identifier(name) => visit_identifier(unit, module, name, &expr.location),
        ExprKind::Binary { op, left, right } => visit_binary(unit, module, *op, left, right),
        ExprKind::Unary { op, operand } => {
            let ty = visit_expr(unit, module, operand);
            match op {
                UnOp::Not => unit.types.builtins.boolean,
                UnOp::Neg | UnOp::BitNot => ty,
            }
        }
        ExprKind::Assign { target, value } => {
            if let ExprKind::Identifier(name) = &target.kind {
                if let Some(identifier) = find_identifier(unit, module, name) {
                    if identifier.is_const() {
                        unit.report(ace_diagnostics::Diagnostic::fatal(
                            SemanticsKind::ConstModified(name.clone()),
                            target.location.clone(),
                        ));
                    }
                }
            } else if !matches!(target.kind, ExprKind::MemberAccess { .. } | ExprKind::ArrayAccess { .. }) {
                unit.report(ace_diagnostics::Diagnostic::fatal(
                    SemanticsKind::CannotModifyRvalue,
                    target.location.clone(),
                ));
            }
            visit_expr(unit, module, target);
            visit_expr(unit, module, value)
        }
        ExprKind::Call { callee, args } => visit_call(unit, module, callee, args, &expr.location),
        ExprKind::MemberAccess { object, member: _ } => {
            visit_expr(unit, module, object);
            unit.types.builtins.any
        }
        ExprKind::Has { object, member: _ } => {
            visit_expr(unit, module, object);
            unit.types.builtins.boolean
        }
        ExprKind::ArrayAccess { object, index } => {
            visit_expr(unit, module, object);
            visit_expr(unit, module, index);
            unit.types.builtins.any
        }
        ExprKind::ArrayLiteral(elements) => {
            let mut element_type = unit.types.builtins.undefined;
            for (i, element) in elements.iter().enumerate() {
                let ty = visit_expr(unit, module, element);
                element_type = if i == 0 { ty } else { unit.types.type_promotion(element_type, ty, true) };
            }
            if elements.is_empty() {
                element_type = unit.types.builtins.any;
            }
            unit.types.instantiate_generic(unit.types.builtins.array, vec![element_type]).unwrap_or(unit.types.builtins.undefined)
        }
        ExprKind::TupleLiteral(elements) => {
            for element in elements {
                visit_expr(unit, module, element);
            }
            unit.types.builtins.tuple
        }
        ExprKind::ObjectLiteral { type_name, fields } => {
            for (_, value) in fields {
                visit_expr(unit, module, value);
            }
            type_name
                .as_ref()
                .map(|spec| resolve_type_spec(unit, module, spec))
                .unwrap_or(unit.types.builtins.object)
        }
        ExprKind::New { type_spec, args } => {
            for arg in args {
                visit_expr(unit, module, &arg.value);
            }
            resolve_type_spec(unit, module, type_spec)
        }
        ExprKind::Function { name: _, params, return_type, body, is_generator } => {
            unit.modules.get_mut(module).push_scope(ScopeKind::Function);
            if *is_generator {
                unit.modules.get_mut(module).current_scope_mut().function_flags |= FunctionFlags::GENERATOR;
            }
            let mut param_types = Vec::with_capacity(params.len());
            for param in params {
                let declared = param
                    .type_spec
                    .as_ref()
                    .map(|t| resolve_type_spec(unit, module, t))
                    .unwrap_or(unit.types.builtins.any);
                let ty = if param.is_variadic {
                    unit.types.instantiate_generic(unit.types.builtins.args, vec![declared]).unwrap_or(declared)
                } else {
                    declared
                };
                unit.modules.get_mut(module).current_scope_mut().declare(param.name.clone(), ty);
                param_types.push((param.name.clone(), ty));
            }
            for stmt in body {
                visit_stmt(unit, module, stmt);
            }
            let inferred_return = unit
                .modules
                .get(module)
                .current_scope()
                .return_types
                .iter()
                .map(|(ty, _)| *ty)
                .reduce(|a, b| unit.types.type_promotion(a, b, true))
                .unwrap_or(unit.types.builtins.any);
            let declared_return = return_type.as_ref().map(|t| resolve_type_spec(unit, module, t));
            if let Some(declared) = declared_return {
                if !unit.modules.get(module).current_scope().return_types.is_empty()
                    && !unit.types.type_compatible(declared, inferred_return, false)
                {
                    unit.report(ace_diagnostics::Diagnostic::fatal(
                        TypeKind::Mismatched { expected: unit.types.get(declared).name, found: unit.types.get(inferred_return).name },
                        expr.location.clone(),
                    ));
                }
            }
            unit.modules.get_mut(module).pop_scope();
            let final_return = declared_return.unwrap_or(inferred_return);
            unit.types.declare_function(param_types, final_return)
        }
    }
}

fn visit_identifier(unit: &mut CompilationUnit, module: ModuleId, name: &str, location: &ace_diagnostics::SourceLocation) -> TypeId {
    detect_closure_capture(unit, module, name);
    match lookup_identifier(unit, module, name) {
        Lookup::Variable(ty) => {
            mark_identifier_used(unit, module, name);
            ty
        }
        Lookup::Module(_) => {
            unit.report(ace_diagnostics::Diagnostic::fatal(ScopeErrorKind::IdentifierIsModule(name.to_string()), location.clone()));
            unit.types.builtins.undefined
        }
        Lookup::Type(_) => {
            unit.report(ace_diagnostics::Diagnostic::fatal(ScopeErrorKind::IdentifierIsType(name.to_string()), location.clone()));
            unit.types.builtins.undefined
        }
        Lookup::NotFound => {
            let candidates = known_identifier_names(unit, module);
            unit.diagnostics.undeclared_identifier(name, location.clone(), &candidates);
            unit.types.builtins.undefined
        }
    }
}

fn known_identifier_names(unit: &CompilationUnit, module: ModuleId) -> Vec<String> {
    unit.modules
        .get(module)
        .scopes()
        .flat_map(|scope| scope.identifiers().iter().map(|id| id.name.clone()))
        .collect()
}

fn find_identifier<'a>(unit: &'a CompilationUnit, module: ModuleId, name: &str) -> Option<&'a crate::scope::Identifier> {
    unit.modules.get(module).scopes().find_map(|scope| scope.lookup(name))
}

/// Increments the use-count of whichever open scope actually declared
/// `name`, checking the current module's stack first and the global
/// module's stack second (mirroring the read-side lookup order).
fn mark_identifier_used(unit: &mut CompilationUnit, module: ModuleId, name: &str) {
    for scope in unit.modules.get_mut(module).scopes_mut() {
        if let Some(identifier) = scope.lookup_mut(name) {
            identifier.use_count += 1;
            return;
        }
    }
    if module != unit.modules.root() {
        let root = unit.modules.root();
        for scope in unit.modules.get_mut(root).scopes_mut() {
            if let Some(identifier) = scope.lookup_mut(name) {
                identifier.use_count += 1;
                return;
            }
        }
    }
}

/// Closure-capture rule (spec §4.2): if `name` resolves to an identifier
/// declared in an outer function scope that is not the nearest enclosing
/// function scope, record it as a free variable captured by that nearer
/// function.
fn detect_closure_capture(unit: &mut CompilationUnit, module: ModuleId, name: &str) {
    let Some(nearest_fn_index) = nearest_function_scope_index(unit, module) else {
        return;
    };
    let module_ref = unit.modules.get(module);
    let depth = module_ref.depth();
    let mut declared_index = None;
    for (offset, scope) in module_ref.scopes().enumerate() {
        if let Some(identifier) = scope.lookup(name) {
            if identifier.flags.contains(IdentifierFlags::DECLARED_IN_FUNCTION) {
                declared_index = Some(depth - 1 - offset);
            }
            break;
        }
    }
    if let Some(declared_index) = declared_index {
        if declared_index < nearest_fn_index {
            if let Some(scope) = unit.modules.get_mut(module).scope_at_mut(nearest_fn_index) {
                if !scope.captures.iter().any(|c| c == name) {
                    scope.captures.push(name.to_string());
                }
            }
        }
    }
}

fn visit_binary(unit: &mut CompilationUnit, module: ModuleId, op: BinOp, left: &Expr, right: &Expr) -> TypeId {
    let left_ty = visit_expr(unit, module, left);
    let right_ty = visit_expr(unit, module, right);
    match op {
        BinOp::And | BinOp::Or | BinOp::Eq | BinOp::NotEq | BinOp::Lt | BinOp::Gt | BinOp::LtEq | BinOp::GtEq => {
            unit.types.builtins.boolean
        }
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
            let promoted = unit.types.type_promotion(left_ty, right_ty, true);
            if promoted == unit.types.builtins.undefined {
                unit.report(ace_diagnostics::Diagnostic::fatal(
                    TypeKind::Mismatched { expected: unit.types.get(left_ty).name, found: unit.types.get(right_ty).name },
                    left.location.clone(),
                ));
            }
            promoted
        }
    }
}

fn visit_call(unit: &mut CompilationUnit, module: ModuleId, callee: &Expr, args: &[Argument], call_location: &ace_diagnostics::SourceLocation) -> TypeId {
    let callee_type = visit_expr(unit, module, callee);
    let evaluated: Vec<(Option<String>, TypeId, ace_diagnostics::SourceLocation)> = args
        .iter()
        .map(|arg| {
            let ty = visit_expr(unit, module, &arg.value);
            (arg.name.clone(), ty, arg.value.location.clone())
        })
        .collect();
    substitute_function_args(unit, callee_type, &evaluated, call_location)
}

/// `SubstituteFunctionArgs` (spec §4.2). `args` carries each argument's
/// optional name, already-inferred type, and location. Returns the call's
/// result type, reporting arity/type diagnostics as they are found.
pub fn substitute_function_args(
    unit: &mut CompilationUnit,
    callee_type: TypeId,
    args: &[(Option<String>, TypeId, ace_diagnostics::SourceLocation)],
    call_location: &ace_diagnostics::SourceLocation,
) -> TypeId {
    if callee_type == unit.types.builtins.any || callee_type == unit.types.builtins.function {
        return unit.types.builtins.any;
    }
    let unfolded = unit.types.unfold_alias(callee_type);
    let resolved = unit.types.get(unfolded);
    let (params, return_type) = match resolved.class {
        crate::types::TypeClass::Function { params, return_type } => (params, return_type),
        _ => {
            unit.report(ace_diagnostics::Diagnostic::fatal(TypeKind::NotAFunction(resolved.name.clone()), call_location.clone()));
            return unit.types.builtins.undefined;
        }
    };

    let param_names: Vec<String> = resolved.members.iter().map(|m| m.name.clone()).collect();
    let is_variadic = params
        .last()
        .map(|&p| {
            let unfolded_param = unit.types.unfold_alias(p);
            matches!(
                unit.types.get(unfolded_param).class,
                crate::types::TypeClass::GenericInstance { template, .. } if template == unit.types.builtins.args
            )
        })
        .unwrap_or(false);

    let mut filled: Vec<Option<(TypeId, ace_diagnostics::SourceLocation)>> = vec![None; params.len()];
    let mut extra_variadic: Vec<(TypeId, ace_diagnostics::SourceLocation)> = Vec::new();
    let (named, positional): (Vec<_>, Vec<_>) = args.iter().partition(|(name, _, _)| name.is_some());

    for (name, ty, loc) in &named {
        let name = name.as_ref().expect("partitioned as named");
        match param_names.iter().position(|p| p == name) {
            Some(index) if filled[index].is_none() => filled[index] = Some((*ty, loc.clone())),
            _ => unit.report(ace_diagnostics::Diagnostic::fatal(ArityKind::NamedArgNotFound(name.clone()), loc.clone())),
        }
    }

    let mut next_slot = 0usize;
    for (_, ty, loc) in &positional {
        while next_slot < filled.len() && filled[next_slot].is_some() {
            next_slot += 1;
        }
        if next_slot < filled.len() {
            filled[next_slot] = Some((*ty, loc.clone()));
            next_slot += 1;
        } else if is_variadic {
            extra_variadic.push((*ty, loc.clone()));
        } else {
            unit.report(ace_diagnostics::Diagnostic::fatal(
                ArityKind::TooMany { expected: params.len(), found: args.len() },
                call_location.clone(),
            ));
            return return_type;
        }
    }

    for index in 0..params.len() {
        let param_type = params[index];
        let is_trailing_variadic = is_variadic && index == params.len() - 1;
        match &filled[index] {
            Some((arg_type, arg_loc)) => {
                let expected = if is_trailing_variadic { variadic_element_type(unit, param_type) } else { param_type };
                if !unit.types.type_compatible(expected, *arg_type, true) {
                    unit.report(ace_diagnostics::Diagnostic::fatal(
                        TypeKind::Mismatched { expected: unit.types.get(expected).name, found: unit.types.get(*arg_type).name },
                        arg_loc.clone(),
                    ));
                }
            }
            None if is_trailing_variadic => {}
            None => {
                unit.report(ace_diagnostics::Diagnostic::fatal(
                    ArityKind::TooFew { expected: params.len(), found: args.len() },
                    call_location.clone(),
                ));
                return return_type;
            }
        }
    }

    if let Some(&last_param) = params.last() {
        let element_type = variadic_element_type(unit, last_param);
        for (arg_type, arg_loc) in &extra_variadic {
            if !unit.types.type_compatible(element_type, *arg_type, true) {
                unit.report(ace_diagnostics::Diagnostic::fatal(
                    TypeKind::Mismatched { expected: unit.types.get(element_type).name, found: unit.types.get(*arg_type).name },
                    arg_loc.clone(),
                ));
            }
        }
    }

    return_type
}

/// Unwraps a trailing `Args(T)`-shaped parameter type to `T`, or returns it
/// unchanged if it is not such a generic instance.
fn variadic_element_type(unit: &CompilationUnit, param_type: TypeId) -> TypeId {
    let unfolded = unit.types.unfold_alias(param_type);
    match unit.types.get(unfolded).class {
        crate::types::TypeClass::GenericInstance { args, .. } => args.first().copied().unwrap_or(param_type),
        _ => param_type,
    }
}
