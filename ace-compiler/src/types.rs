//! The structural type system: symbol types, builtins, equality,
//! compatibility, promotion and generic instantiation.
//!
//! Per the design notes, a type's base/alias target is a cyclic reference
//! (a type's default-value AST can itself reference the type), so types are
//! interned by a monotonic id in a `DashMap` rather than owned directly by
//! each other. The compilation unit holds the one `TypeTable` strongly;
//! every other reference to a type is just a `TypeId` copy.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use ace_ast::Expr;
use dashmap::DashMap;
use thiserror::Error;

/// An interned reference to a `SymbolType` inside a `TypeTable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One member of a type: a name, its declared type, and an optional
/// default-value expression (spec §3.3).
#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub type_id: TypeId,
    pub default_value: Option<Expr>,
}

/// The class-specific payload of a `SymbolType` (spec §3.3).
#[derive(Debug, Clone)]
pub enum TypeClass {
    Builtin,
    UserDefined,
    /// A weak reference to the aliased type.
    Alias { aliasee: TypeId },
    Function { params: Vec<TypeId>, return_type: TypeId },
    /// `arity == -1` marks a variadic template (e.g. `Tuple`).
    GenericTemplate { arity: i32, params: Vec<TypeId> },
    /// `args[0]` conventionally holds the return type for `Function` instances.
    GenericInstance { template: TypeId, args: Vec<TypeId> },
    GenericParameter,
}

/// A type in the Ace type system (spec §3.3).
#[derive(Debug, Clone)]
pub struct SymbolType {
    pub id: TypeId,
    pub name: String,
    pub class: TypeClass,
    /// Weak back-reference; relation only, never ownership.
    pub base: Option<TypeId>,
    pub members: Vec<Member>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("generic template `{template}` expects {expected} parameters, found {found}")]
    ArityMismatch { template: String, expected: usize, found: usize },
    #[error("`{0}` is not a generic template")]
    NotGeneric(String),
}

/// Names of the builtin types created once at compiler start-up (spec §3.3).
pub struct Builtins {
    pub undefined: TypeId,
    pub any: TypeId,
    pub object: TypeId,
    pub int: TypeId,
    pub float: TypeId,
    pub number: TypeId,
    pub boolean: TypeId,
    pub string: TypeId,
    pub null: TypeId,
    pub function: TypeId,
    pub array: TypeId,
    pub tuple: TypeId,
    pub args: TypeId,
    pub maybe: TypeId,
    pub const_: TypeId,
    pub block: TypeId,
    pub closure: TypeId,
    pub generator: TypeId,
}

/// Owns every `SymbolType` the compilation unit has created, interned by
/// `TypeId`. Default-value ASTs for class-specific payloads that would
/// otherwise create an ownership cycle live in a side table keyed by the
/// same id.
pub struct TypeTable {
    types: DashMap<TypeId, SymbolType>,
    defaults: DashMap<TypeId, Expr>,
    next_id: AtomicU32,
    pub builtins: Builtins,
}

impl TypeTable {
    pub fn with_builtins() -> Self {
        let types = DashMap::new();
        let defaults = DashMap::new();
        let next_id = AtomicU32::new(0);

        let alloc = || TypeId(next_id.fetch_add(1, Ordering::Relaxed));
        let mut insert = |name: &str, class: TypeClass, base: Option<TypeId>| -> TypeId {
            let id = alloc();
            types.insert(
                id,
                SymbolType { id, name: name.to_string(), class, base, members: Vec::new() },
            );
            id
        };

        let undefined = insert("Undefined", TypeClass::Builtin, None);
        let any = insert("Any", TypeClass::Builtin, None);
        let object = insert("Object", TypeClass::Builtin, None);
        let int = insert("Int", TypeClass::Builtin, None);
        let float = insert("Float", TypeClass::Builtin, None);
        let number = insert("Number", TypeClass::Builtin, None);
        let boolean = insert("Boolean", TypeClass::Builtin, None);
        let string = insert("String", TypeClass::Builtin, None);
        let null = insert("Null", TypeClass::Builtin, None);
        let function = insert(
            "Function",
            TypeClass::GenericTemplate { arity: -1, params: Vec::new() },
            None,
        );
        let array_param = insert("T", TypeClass::GenericParameter, None);
        let array = insert(
            "Array",
            TypeClass::GenericTemplate { arity: 1, params: vec![array_param] },
            None,
        );
        let tuple = insert("Tuple", TypeClass::GenericTemplate { arity: -1, params: Vec::new() }, None);
        let args_param = insert("T", TypeClass::GenericParameter, None);
        let args = insert(
            "Args",
            TypeClass::GenericTemplate { arity: 1, params: vec![args_param] },
            None,
        );
        let maybe_param = insert("T", TypeClass::GenericParameter, None);
        let maybe = insert(
            "Maybe",
            TypeClass::GenericTemplate { arity: 1, params: vec![maybe_param] },
            None,
        );
        let const_param = insert("T", TypeClass::GenericParameter, None);
        let const_ = insert(
            "Const",
            TypeClass::GenericTemplate { arity: 1, params: vec![const_param] },
            None,
        );
        let block = insert("Block", TypeClass::Builtin, None);
        let closure = insert("Closure", TypeClass::Builtin, None);
        let generator = insert("Generator", TypeClass::GenericTemplate { arity: -1, params: Vec::new() }, None);

        Self {
            types,
            defaults,
            next_id,
            builtins: Builtins {
                undefined,
                any,
                object,
                int,
                float,
                number,
                boolean,
                string,
                null,
                function,
                array,
                tuple,
                args,
                maybe,
                const_,
                block,
                closure,
                generator,
            },
        }
    }

    fn alloc_id(&self) -> TypeId {
        TypeId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self, id: TypeId) -> SymbolType {
        self.types
            .get(&id)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| SymbolType {
                id,
                name: "<unknown>".to_string(),
                class: TypeClass::Builtin,
                base: None,
                members: Vec::new(),
            })
    }

    pub fn default_value(&self, id: TypeId) -> Option<Expr> {
        self.defaults.get(&id).map(|entry| entry.value().clone())
    }

    pub fn set_default_value(&self, id: TypeId, expr: Expr) {
        self.defaults.insert(id, expr);
    }

    /// Declares a user-defined (prototype) type with no default materialized
    /// yet; call `set_default_value` once it has been computed.
    pub fn declare_user_type(&self, name: impl Into<String>, base: Option<TypeId>, members: Vec<Member>) -> TypeId {
        let id = self.alloc_id();
        self.types.insert(
            id,
            SymbolType { id, name: name.into(), class: TypeClass::UserDefined, base, members },
        );
        id
    }

    /// Mints a fresh `GenericParameter` placeholder, e.g. for the `T` in
    /// `type Pair(T, U) { ... }` while its members are being resolved.
    pub fn declare_generic_parameter(&self, name: impl Into<String>) -> TypeId {
        let id = self.alloc_id();
        self.types.insert(
            id,
            SymbolType { id, name: name.into(), class: TypeClass::GenericParameter, base: None, members: Vec::new() },
        );
        id
    }

    /// Declares a user-defined generic template (`type Pair(T, U) { ... }`),
    /// parameterized by the freshly minted `GenericParameter` ids its
    /// members reference.
    pub fn declare_generic_template(
        &self,
        name: impl Into<String>,
        params: Vec<TypeId>,
        base: Option<TypeId>,
        members: Vec<Member>,
    ) -> TypeId {
        let id = self.alloc_id();
        let arity = params.len() as i32;
        self.types.insert(
            id,
            SymbolType {
                id,
                name: name.into(),
                class: TypeClass::GenericTemplate { arity, params },
                base,
                members,
            },
        );
        id
    }

    pub fn declare_alias(&self, name: impl Into<String>, aliasee: TypeId) -> TypeId {
        let id = self.alloc_id();
        self.types.insert(
            id,
            SymbolType {
                id,
                name: name.into(),
                class: TypeClass::Alias { aliasee },
                base: None,
                members: Vec::new(),
            },
        );
        id
    }

    /// Declares a concrete function type. `params` carries the parameter
    /// names (for named-argument resolution, spec §4.2) alongside their
    /// types; the `Function` class payload keeps a name-free copy for fast
    /// structural comparisons.
    pub fn declare_function(&self, params: Vec<(String, TypeId)>, return_type: TypeId) -> TypeId {
        let id = self.alloc_id();
        let param_types: Vec<TypeId> = params.iter().map(|(_, t)| *t).collect();
        let members = params
            .into_iter()
            .map(|(name, type_id)| Member { name, type_id, default_value: None })
            .collect();
        let name = format!(
            "Function({})",
            param_types.iter().map(|_| "_").collect::<Vec<_>>().join(", ")
        );
        self.types.insert(
            id,
            SymbolType {
                id,
                name,
                class: TypeClass::Function { params: param_types, return_type },
                base: None,
                members,
            },
        );
        id
    }

    /// Follows an `Alias` chain to the underlying non-alias type. Public
    /// because the semantic analyzer needs it for `SubstituteFunctionArgs`'s
    /// "unfold the callee type" step (spec §4.2).
    pub fn unfold_alias(&self, id: TypeId) -> TypeId {
        let mut current = id;
        loop {
            let ty = self.get(current);
            match ty.class {
                TypeClass::Alias { aliasee } => current = aliasee,
                _ => return current,
            }
        }
    }

    /// `TypeEqual` (spec §4.1): structural equality.
    pub fn type_equal(&self, a: TypeId, b: TypeId) -> bool {
        if a == b {
            return true;
        }
        let a = self.get(self.unfold_alias(a));
        let b = self.get(self.unfold_alias(b));
        if a.name != b.name || a.members.len() != b.members.len() {
            return false;
        }
        for (ma, mb) in a.members.iter().zip(b.members.iter()) {
            if ma.name != mb.name || !self.type_equal(ma.type_id, mb.type_id) {
                return false;
            }
        }
        match (&a.class, &b.class) {
            (TypeClass::Function { params: pa, return_type: ra }, TypeClass::Function { params: pb, return_type: rb }) => {
                self.type_equal(*ra, *rb)
                    && pa.len() == pb.len()
                    && pa.iter().zip(pb.iter()).all(|(x, y)| self.type_equal(*x, *y))
            }
            (TypeClass::GenericInstance { template: ta, args: aa }, TypeClass::GenericInstance { template: tb, args: ab }) => {
                ta == tb && aa.len() == ab.len() && aa.iter().zip(ab.iter()).all(|(x, y)| self.type_equal(*x, *y))
            }
            _ => std::mem::discriminant(&a.class) == std::mem::discriminant(&b.class),
        }
    }

    /// `TypeCompatible` (spec §4.1).
    pub fn type_compatible(&self, self_id: TypeId, other_id: TypeId, strict_numbers: bool) -> bool {
        if self_id == self.builtins.undefined || other_id == self.builtins.undefined {
            return false;
        }
        if self.type_equal(self_id, other_id) {
            return true;
        }
        if self_id == self.builtins.any {
            return true;
        }
        if self_id == self.builtins.number {
            return other_id == self.builtins.int || other_id == self.builtins.float;
        }
        if !strict_numbers && (self_id == self.builtins.int || self_id == self.builtins.float) {
            return other_id == self.builtins.number || other_id == self.builtins.int || other_id == self.builtins.float;
        }

        let self_ty = self.get(self_id);
        if let TypeClass::Alias { aliasee } = self_ty.class {
            return self.type_compatible(aliasee, other_id, strict_numbers);
        }
        if let TypeClass::GenericInstance { template: self_template, args: self_args } = self_ty.class {
            let other_ty = self.get(other_id);
            if let TypeClass::GenericInstance { template: other_template, args: other_args } = other_ty.class {
                if self_template != other_template || self_args.len() != other_args.len() {
                    return false;
                }
                return self_args
                    .iter()
                    .zip(other_args.iter())
                    .all(|(a, b)| self.type_compatible(*a, *b, strict_numbers));
            }
            return false;
        }
        false
    }

    /// `TypePromotion` (spec §4.1). `use_number` governs the `Int`+`Float`
    /// case: `Number` if set, otherwise the non-`Int` side.
    pub fn type_promotion(&self, a: TypeId, b: TypeId, use_number: bool) -> TypeId {
        if self.type_equal(a, b) {
            return a;
        }
        if a == self.builtins.undefined || b == self.builtins.undefined {
            return self.builtins.undefined;
        }
        if a == self.builtins.any || b == self.builtins.any {
            return self.builtins.any;
        }
        let is_int_float = |x: TypeId, y: TypeId| {
            (x == self.builtins.int && y == self.builtins.float) || (x == self.builtins.float && y == self.builtins.int)
        };
        if is_int_float(a, b) {
            return if use_number {
                self.builtins.number
            } else if a == self.builtins.int {
                b
            } else {
                a
            };
        }
        self.builtins.undefined
    }

    /// Generic instantiation (spec §4.1): materializes `T(<args>)` from a
    /// template and position-matched argument types, substituting every
    /// generic-parameter member type by the corresponding supplied type.
    pub fn instantiate_generic(&self, template: TypeId, args: Vec<TypeId>) -> Result<TypeId, TypeError> {
        let template_ty = self.get(template);
        let (arity, params) = match &template_ty.class {
            TypeClass::GenericTemplate { arity, params } => (*arity, params.clone()),
            _ => return Err(TypeError::NotGeneric(template_ty.name.clone())),
        };
        if arity >= 0 && args.len() != arity as usize {
            return Err(TypeError::ArityMismatch {
                template: template_ty.name.clone(),
                expected: arity as usize,
                found: args.len(),
            });
        }

        let substitution: std::collections::HashMap<TypeId, TypeId> =
            params.iter().copied().zip(args.iter().copied()).collect();

        let arg_names: Vec<String> = args.iter().map(|id| self.get(*id).name).collect();
        let name = format!("{}({})", template_ty.name, arg_names.join(", "));

        let members = template_ty
            .members
            .iter()
            .map(|member| Member {
                name: member.name.clone(),
                type_id: self.substitute(member.type_id, &substitution),
                default_value: member.default_value.clone(),
            })
            .collect();

        let id = self.alloc_id();
        self.types.insert(
            id,
            SymbolType {
                id,
                name,
                class: TypeClass::GenericInstance { template, args },
                base: None,
                members,
            },
        );
        Ok(id)
    }

    fn substitute(&self, ty: TypeId, substitution: &std::collections::HashMap<TypeId, TypeId>) -> TypeId {
        substitution.get(&ty).copied().unwrap_or_else(|| {
            if matches!(self.get(ty).class, TypeClass::GenericParameter) {
                self.builtins.undefined
            } else {
                ty
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_distinct() {
        let table = TypeTable::with_builtins();
        assert_ne!(table.builtins.int, table.builtins.float);
        assert_ne!(table.builtins.any, table.builtins.undefined);
    }

    #[test]
    fn number_is_compatible_with_int_and_float() {
        let table = TypeTable::with_builtins();
        assert!(table.type_compatible(table.builtins.number, table.builtins.int, true));
        assert!(table.type_compatible(table.builtins.number, table.builtins.float, true));
        assert!(!table.type_compatible(table.builtins.number, table.builtins.string, true));
    }

    #[test]
    fn undefined_is_never_compatible() {
        let table = TypeTable::with_builtins();
        assert!(!table.type_compatible(table.builtins.undefined, table.builtins.any, true));
        assert!(!table.type_compatible(table.builtins.any, table.builtins.undefined, true));
    }

    #[test]
    fn promotion_prefers_number_when_requested() {
        let table = TypeTable::with_builtins();
        assert_eq!(
            table.type_promotion(table.builtins.int, table.builtins.float, true),
            table.builtins.number
        );
        assert_eq!(
            table.type_promotion(table.builtins.int, table.builtins.float, false),
            table.builtins.float
        );
    }

    #[test]
    fn generic_instantiation_substitutes_member_types() {
        let table = TypeTable::with_builtins();
        let instance = table
            .instantiate_generic(table.builtins.array, vec![table.builtins.int])
            .unwrap();
        let ty = table.get(instance);
        assert_eq!(ty.name, "Array(Int)");
    }

    #[test]
    fn generic_instance_covariant_with_any() {
        let table = TypeTable::with_builtins();
        let array_int = table.instantiate_generic(table.builtins.array, vec![table.builtins.int]).unwrap();
        let array_any = table.instantiate_generic(table.builtins.array, vec![table.builtins.any]).unwrap();
        // Int array assignable where an Any array is expected...
        assert!(table.type_compatible(array_any, array_int, true));
        // ...but not the reverse.
        assert!(!table.type_compatible(array_int, array_any, true));
    }

    #[test]
    fn arity_mismatch_is_an_error() {
        let table = TypeTable::with_builtins();
        let err = table.instantiate_generic(table.builtins.array, vec![table.builtins.int, table.builtins.float]);
        assert!(matches!(err, Err(TypeError::ArityMismatch { .. })));
    }
}
