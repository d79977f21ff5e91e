//! The VM's tagged-union value type (spec §3.10).
//!
//! Grounded on `examples/original_source/include/ace-vm/vm.hpp`'s value
//! tag set and its `GetValueInt64`/`GetValueDouble` coercion helpers.

use crate::heap::HeapHandle;

/// A return address plus the caller state `RET` restores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FunctionCallInfo {
    pub return_pc: u32,
    pub return_register_cursor: u8,
    pub stack_base: u32,
}

/// A pushed `BEGIN_TRY` frame: where to jump on throw, and how far to
/// unwind the operand stack first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TryCatchInfo {
    pub catch_address: u32,
    pub stack_depth: u32,
}

/// Identifies a registered native function by its index into
/// `Vm::natives` (spec §6's native call bundle).
pub type NativeFunctionId = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Bool(bool),
    /// An indirection to another value — used for captured closure
    /// variables and `var` parameters that alias a caller's slot.
    ValueRef(Box<Value>),
    HeapPointer(HeapHandle),
    Function { address: u32, nargs: u8, flags: u8 },
    NativeFunction(NativeFunctionId),
    /// Opaque embedder data not tracked by the GC (contrast with a heap
    /// object of kind `HeapObjectKind::UserData`, which is).
    UserData(std::sync::Arc<dyn std::any::Any + Send + Sync>),
    Address(u32),
    FunctionCallInfo(FunctionCallInfo),
    TryCatchInfo(TryCatchInfo),
}

impl Value {
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::I32(v) => *v != 0,
            Value::I64(v) => *v != 0,
            Value::F32(v) => *v != 0.0,
            Value::F64(v) => *v != 0.0,
            _ => true,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValueError {
    #[error("value of this type cannot be converted to an integer")]
    NotConvertibleToInt,
    #[error("value of this type cannot be converted to a float")]
    NotConvertibleToFloat,
}

/// `vm.hpp`'s `GetValueInt64`: widen any numeric tag to `i64`, erroring on
/// non-numeric values rather than silently truncating.
pub fn value_int64(value: &Value) -> Result<i64, ValueError> {
    match value {
        Value::I32(v) => Ok(i64::from(*v)),
        Value::I64(v) => Ok(*v),
        Value::F32(v) => Ok(*v as i64),
        Value::F64(v) => Ok(*v as i64),
        Value::Bool(v) => Ok(i64::from(*v)),
        _ => Err(ValueError::NotConvertibleToInt),
    }
}

/// `vm.hpp`'s `GetValueDouble`: the floating-point counterpart, used by
/// `COMPARE_FLOATING_POINT` to promote both comparison operands.
pub fn value_double(value: &Value) -> Result<f64, ValueError> {
    match value {
        Value::I32(v) => Ok(f64::from(*v)),
        Value::I64(v) => Ok(*v as f64),
        Value::F32(v) => Ok(f64::from(*v)),
        Value::F64(v) => Ok(*v),
        _ => Err(ValueError::NotConvertibleToFloat),
    }
}

/// Numeric-type rank used to decide which side of a comparison or
/// arithmetic op gets promoted (spec §4.4: "ordering I32 < I64 < F32 < F64").
pub fn numeric_rank(value: &Value) -> Option<u8> {
    match value {
        Value::I32(_) => Some(0),
        Value::I64(_) => Some(1),
        Value::F32(_) => Some(2),
        Value::F64(_) => Some(3),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int64_widens_every_numeric_tag() {
        assert_eq!(value_int64(&Value::I32(5)).unwrap(), 5);
        assert_eq!(value_int64(&Value::F64(5.9)).unwrap(), 5);
        assert_eq!(value_int64(&Value::Bool(true)).unwrap(), 1);
    }

    #[test]
    fn non_numeric_values_refuse_conversion() {
        assert_eq!(value_int64(&Value::None), Err(ValueError::NotConvertibleToInt));
    }

    #[test]
    fn falsy_values_match_the_spec_truthiness_rules() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::I32(0).is_truthy());
        assert!(Value::I32(1).is_truthy());
    }
}
