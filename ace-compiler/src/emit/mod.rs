//! The `Build` pass: bytecode chunks (spec §3.8), the storage-operation
//! builder (spec §3.9), and the register/stack-allocating emitter itself
//! (spec §4.3).

pub mod chunk;
pub mod emitter;
pub mod storage;

pub use chunk::{BuildParams, Buildable, Chunk, LabelId};
pub use emitter::{Emitter, StaticObject};
pub use storage::{Method, Operation, StorageError, StorageOpBuilder, Strategy};
