//! The Ace bytecode virtual machine: value representation, garbage-collected
//! heap, per-thread register file and operand stack, the native function
//! bridge, the compiled-file loader, and the dispatch loop itself.

pub mod bytecode_file;
pub mod heap;
pub mod native;
pub mod registers;
pub mod stack;
pub mod thread;
pub mod value;
pub mod vm;

pub use bytecode_file::{load, LoadError, LoadedProgram};
pub use heap::{Heap, HeapHandle, HeapObject, HeapObjectKind, Member, ObjectInstance, TypeInfo};
// `check_arity!` is already exported at the crate root via `#[macro_export]`.
pub use native::{ModuleDef, NativeContext, NativeError, NativeFn, NativeRegistry};
pub use registers::{CompareFlags, RegisterFile, REGISTER_COUNT};
pub use stack::OperandStack;
pub use thread::ExecutionThread;
pub use value::{numeric_rank, value_double, value_int64, Value, ValueError};
pub use vm::{Vm, VmError, VmState};
