//! The bytecode wire format: the instruction set (spec §4.4) and its
//! byte-level encoding (spec §6).

pub mod opcode;
pub mod serializer;

pub use opcode::Opcode;
pub use serializer::{ByteReader, ByteWriter, ReadError};
