//! Native function invocation (spec §6's "native call bundle") and the
//! declarative SDK registration API used to expose host functionality to
//! Ace scripts (spec §6's "native type registration API").
//!
//! Grounded on `examples/original_source/include/ace/api.hpp` and
//! `include/ace-c/meta-scripting/API.hpp`, whose `Module(name).Variable(...)
//! .Function(...)` chain this mirrors; `TypeDefine` and `check_arity!` are
//! supplemented from the same header (dropped by the distilled spec, kept
//! here since a native SDK without a way to expose struct-shaped values
//! back to scripts is not a usable one).

use std::sync::Arc;

use crate::heap::Heap;
use crate::thread::ExecutionThread;
use crate::value::Value;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum NativeError {
    #[error("expected {expected} argument(s), found {found}")]
    ArityMismatch { expected: usize, found: usize },
    #[error("invalid argument: {0}")]
    InvalidArgs(String),
}

impl NativeError {
    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::InvalidArgs(message.into())
    }
}

/// What a native function call gets instead of direct VM access: the heap
/// (to allocate return values) and its calling thread (to write register
/// 0 or set a pending exception) — never the whole `Vm`, so a native can't
/// reach into another thread's state.
pub struct NativeContext<'a> {
    pub heap: &'a mut Heap,
    pub thread: &'a mut ExecutionThread,
}

/// A native function. The contract (spec §6): write the return value into
/// register 0, or set `thread.pending_exception` and return `Err`. Must
/// not retain `args` past the call — they may alias stack slots that the
/// next instruction overwrites.
pub type NativeFn = Arc<dyn Fn(&mut NativeContext, &[Value]) -> Result<(), NativeError> + Send + Sync>;

/// Checks an argument count up front; use at the top of a native function
/// body. Supplemented from the original SDK's `ACE_CHECK_ARGS` macro.
#[macro_export]
macro_rules! check_arity {
    ($args:expr, $expected:expr) => {
        if $args.len() != $expected {
            return Err($crate::native::NativeError::ArityMismatch { expected: $expected, found: $args.len() });
        }
    };
}

/// A value-producing initializer invoked once at VM boot to populate a
/// native variable's stack slot (spec §6: "the core ... calls the
/// initializer once at VM boot to populate the corresponding value").
pub type InitializerFn = Arc<dyn Fn(&mut NativeContext) -> Value + Send + Sync>;

pub struct VariableDef {
    pub name: String,
    pub type_name: String,
    pub initializer: InitializerFn,
}

pub struct FunctionDef {
    pub name: String,
    pub return_type: String,
    pub params: Vec<String>,
    pub pointer: NativeFn,
}

/// A native struct type exposed to scripts purely as a member-name list
/// (spec §4.5's type-info shape) — no native backing data, just a shape
/// for `NEW`/member access to target.
pub struct TypeDef {
    pub name: String,
    pub members: Vec<String>,
}

/// `Module(name).Variable(...).Function(...).TypeDefine(...)` — the
/// declarative builder handed to an embedder wiring up a native API.
#[derive(Default)]
pub struct ModuleDef {
    pub name: String,
    pub variables: Vec<VariableDef>,
    pub functions: Vec<FunctionDef>,
    pub types: Vec<TypeDef>,
}

impl ModuleDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn variable(mut self, name: impl Into<String>, type_name: impl Into<String>, initializer: InitializerFn) -> Self {
        self.variables.push(VariableDef { name: name.into(), type_name: type_name.into(), initializer });
        self
    }

    pub fn function(mut self, name: impl Into<String>, return_type: impl Into<String>, params: Vec<String>, pointer: NativeFn) -> Self {
        self.functions.push(FunctionDef { name: name.into(), return_type: return_type.into(), params, pointer });
        self
    }

    pub fn type_define(mut self, name: impl Into<String>, members: Vec<String>) -> Self {
        self.types.push(TypeDef { name: name.into(), members });
        self
    }
}

/// The flattened table the VM actually dispatches `CALL` against; built
/// once from a set of `ModuleDef`s at VM boot.
#[derive(Default)]
pub struct NativeRegistry {
    functions: Vec<NativeFn>,
    names: Vec<String>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_module(&mut self, module: &ModuleDef) {
        for function in &module.functions {
            self.names.push(format!("{}.{}", module.name, function.name));
            self.functions.push(function.pointer.clone());
        }
    }

    pub fn get(&self, id: usize) -> Option<&NativeFn> {
        self.functions.get(id)
    }

    pub fn find_id(&self, qualified_name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == qualified_name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Heap;
    use crate::thread::ExecutionThread;

    fn native_add() -> NativeFn {
        Arc::new(|ctx: &mut NativeContext, args: &[Value]| {
            check_arity!(args, 2);
            let a = crate::value::value_int64(&args[0]).map_err(|_| NativeError::invalid_args("expected int"))?;
            let b = crate::value::value_int64(&args[1]).map_err(|_| NativeError::invalid_args("expected int"))?;
            ctx.thread.registers.set(0, Value::I64(a + b));
            Ok(())
        })
    }

    #[test]
    fn registered_module_functions_are_addressable_by_qualified_name() {
        let module = ModuleDef::new("math").function("add", "Int", vec!["a".into(), "b".into()], native_add());
        let mut registry = NativeRegistry::new();
        registry.register_module(&module);
        let id = registry.find_id("math.add").unwrap();
        assert_eq!(registry.len(), 1);

        let mut heap = Heap::default();
        let mut thread = ExecutionThread::new(0);
        let mut ctx = NativeContext { heap: &mut heap, thread: &mut thread };
        (*registry.get(id).unwrap())(&mut ctx, &[Value::I64(2), Value::I64(3)]).unwrap();
        assert_eq!(ctx.thread.registers.get(0), &Value::I64(5));
    }

    #[test]
    fn wrong_arity_is_rejected_before_the_body_runs() {
        let add = native_add();
        let mut heap = Heap::default();
        let mut thread = ExecutionThread::new(0);
        let mut ctx = NativeContext { heap: &mut heap, thread: &mut thread };
        let err = (*add)(&mut ctx, &[Value::I64(1)]).unwrap_err();
        assert_eq!(err, NativeError::ArityMismatch { expected: 2, found: 1 });
    }
}
