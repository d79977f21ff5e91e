//! Loads a compiled bytecode file (spec §6's flat byte-stream layout): a
//! prelude of static-object store instructions, the main instruction
//! stream, and a terminating `EXIT`.

use ace_compiler::bytecode::{ByteReader, Opcode, ReadError};

use crate::heap::{Heap, HeapObjectKind, TypeInfo};
use crate::value::Value;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error("unknown opcode {0:#04x} in static prelude")]
    UnknownPreludeOpcode(u8),
}

/// A loaded program: the static-object table (already heap-allocated
/// where a static is reference-typed) and the full byte stream, with
/// `code_start` marking where the main instruction stream begins.
pub struct LoadedProgram {
    pub statics: Vec<Value>,
    pub code: Vec<u8>,
    pub code_start: u32,
}

/// Reads the prelude's run of `STORE_STATIC_*` instructions, stopping at
/// the first non-static-store opcode — that's where the main instruction
/// stream (and `pc`) begins.
pub fn load(bytes: &[u8], heap: &mut Heap) -> Result<LoadedProgram, LoadError> {
    let mut reader = ByteReader::new(bytes);
    let mut statics = Vec::new();

    loop {
        let instruction_start = reader.position();
        if !reader.has_more() {
            break;
        }
        let opcode_byte = reader.u8()?;
        let opcode = Opcode::from_byte(opcode_byte).ok_or(LoadError::UnknownPreludeOpcode(opcode_byte))?;
        match opcode {
            Opcode::StoreStaticString => {
                let value = reader.string()?;
                let handle = heap.alloc(HeapObjectKind::ImmutableString(value));
                statics.push(Value::HeapPointer(handle));
            }
            Opcode::StoreStaticAddress => {
                statics.push(Value::Address(reader.u32()?));
            }
            Opcode::StoreStaticFunction => {
                let address = reader.u32()?;
                let nargs = reader.u8()?;
                let flags = reader.u8()?;
                statics.push(Value::Function { address, nargs, flags });
            }
            Opcode::StoreStaticType => {
                let member_count = reader.u16()?;
                let name = reader.short_string()?;
                let mut member_names = Vec::with_capacity(member_count as usize);
                for _ in 0..member_count {
                    member_names.push(reader.short_string()?);
                }
                let handle = heap.alloc(HeapObjectKind::TypeInfo(TypeInfo { name, member_names }));
                statics.push(Value::HeapPointer(handle));
            }
            _ => {
                return Ok(LoadedProgram { statics, code: bytes.to_vec(), code_start: instruction_start as u32 });
            }
        }
    }

    Ok(LoadedProgram { statics, code: bytes.to_vec(), code_start: bytes.len() as u32 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ace_compiler::bytecode::ByteWriter;

    fn sample_bytecode() -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.u8(Opcode::StoreStaticString as u8);
        w.string("hello");
        w.u8(Opcode::LoadNull as u8);
        w.u8(0);
        w.u8(Opcode::Exit as u8);
        w.into_bytes()
    }

    #[test]
    fn loads_the_static_prelude_and_finds_the_code_start() {
        let bytes = sample_bytecode();
        let mut heap = Heap::default();
        let program = load(&bytes, &mut heap).unwrap();
        assert_eq!(program.statics.len(), 1);
        assert!(matches!(program.statics[0], Value::HeapPointer(_)));
        assert_eq!(program.code[program.code_start as usize], Opcode::LoadNull as u8);
    }
}
