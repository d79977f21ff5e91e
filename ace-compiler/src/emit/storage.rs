//! The storage-operation builder (spec §3.9, §4.3): a fluent, three-tier
//! API (operation → method → strategy) that rejects addressing modes the
//! instruction set doesn't actually offer at build time rather than at
//! runtime.
//!
//! Grounded on
//! `examples/original_source/include/ace-c/emit/StorageOperation.hpp`'s
//! `OperationBuilder` → `MethodBuilder` → `StrategyBuilder` chain; the
//! invalid (method, strategy) combinations there (array/member storage has
//! no by-offset addressing) are preserved here as `StorageError`.

use crate::bytecode::Opcode;
use crate::emit::chunk::RawOp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Load,
    Store,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Local,
    Static,
    Array,
    Member,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    ByOffset,
    ByIndex,
    ByHash,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{method:?} does not support addressing by {strategy:?}")]
    NotImplemented { method: Method, strategy: Strategy },
    #[error("the static data segment is immutable; cannot store into it")]
    StaticIsImmutable,
}

/// Entry point: `StorageOpBuilder::load(reg).local().by_offset(4)` or
/// `StorageOpBuilder::store(reg).member(obj).by_hash(name_hash)`.
pub struct StorageOpBuilder {
    reg: u8,
    op: Operation,
}

impl StorageOpBuilder {
    pub fn load(reg: u8) -> Self {
        Self { reg, op: Operation::Load }
    }

    pub fn store(reg: u8) -> Self {
        Self { reg, op: Operation::Store }
    }

    pub fn local(self) -> LocalBuilder {
        LocalBuilder { reg: self.reg, op: self.op }
    }

    pub fn static_(self) -> StaticBuilder {
        StaticBuilder { reg: self.reg, op: self.op }
    }

    pub fn array(self, object_reg: u8) -> ArrayBuilder {
        ArrayBuilder { reg: self.reg, op: self.op, object_reg }
    }

    pub fn member(self, object_reg: u8) -> MemberBuilder {
        MemberBuilder { reg: self.reg, op: self.op, object_reg }
    }
}

/// Locals live on the operand stack; both offset and index addressing are
/// real opcodes (`LOAD_OFFSET`/`MOV_OFFSET`, `LOAD_INDEX`/`MOV_INDEX`).
pub struct LocalBuilder {
    reg: u8,
    op: Operation,
}

impl LocalBuilder {
    pub fn by_offset(self, offset: u16) -> RawOp {
        let off = offset.to_le_bytes();
        match self.op {
            Operation::Load => RawOp::new(Opcode::LoadOffset, &[self.reg, off[0], off[1]]),
            Operation::Store => RawOp::new(Opcode::MovOffset, &[off[0], off[1], self.reg]),
        }
    }

    pub fn by_index(self, index: u16) -> RawOp {
        let idx = index.to_le_bytes();
        match self.op {
            Operation::Load => RawOp::new(Opcode::LoadIndex, &[self.reg, idx[0], idx[1]]),
            Operation::Store => RawOp::new(Opcode::MovIndex, &[idx[0], idx[1], self.reg]),
        }
    }

    pub fn by_hash(self, _hash: u32) -> Result<RawOp, StorageError> {
        Err(StorageError::NotImplemented { method: Method::Local, strategy: Strategy::ByHash })
    }
}

/// The static data segment (spec §3.8's static-object table) is written
/// once at compile time and only ever loaded at run time.
pub struct StaticBuilder {
    reg: u8,
    op: Operation,
}

impl StaticBuilder {
    pub fn by_index(self, index: u16) -> Result<RawOp, StorageError> {
        match self.op {
            Operation::Load => {
                let idx = index.to_le_bytes();
                Ok(RawOp::new(Opcode::LoadStatic, &[self.reg, idx[0], idx[1]]))
            }
            Operation::Store => Err(StorageError::StaticIsImmutable),
        }
    }

    pub fn by_offset(self, _offset: u16) -> Result<RawOp, StorageError> {
        Err(StorageError::NotImplemented { method: Method::Static, strategy: Strategy::ByOffset })
    }

    pub fn by_hash(self, _hash: u32) -> Result<RawOp, StorageError> {
        Err(StorageError::NotImplemented { method: Method::Static, strategy: Strategy::ByHash })
    }
}

/// Array elements are addressed by a register holding the index
/// (`LOAD_ARRAYIDX`/`MOV_ARRAYIDX`) — there is no literal-offset or
/// hashed addressing mode for arrays.
pub struct ArrayBuilder {
    reg: u8,
    op: Operation,
    object_reg: u8,
}

impl ArrayBuilder {
    pub fn by_index_register(self, index_reg: u8) -> RawOp {
        match self.op {
            Operation::Load => RawOp::new(Opcode::LoadArrayIdx, &[self.reg, self.object_reg, index_reg]),
            Operation::Store => RawOp::new(Opcode::MovArrayIdx, &[self.object_reg, index_reg, self.reg]),
        }
    }

    pub fn by_offset(self, _offset: u16) -> Result<RawOp, StorageError> {
        Err(StorageError::NotImplemented { method: Method::Array, strategy: Strategy::ByOffset })
    }
}

/// Object members are addressed either by a compile-time-known member
/// index (`LOAD_MEM`/`MOV_MEM`) or by the member name's hash
/// (`LOAD_MEM_HASH`/`MOV_MEM_HASH`) when the index isn't statically known
/// (spec §4.5: dynamic `has`/member access on a structurally-typed value).
pub struct MemberBuilder {
    reg: u8,
    op: Operation,
    object_reg: u8,
}

impl MemberBuilder {
    pub fn by_index(self, member_index: u8) -> RawOp {
        match self.op {
            Operation::Load => RawOp::new(Opcode::LoadMem, &[self.reg, self.object_reg, member_index]),
            Operation::Store => RawOp::new(Opcode::MovMem, &[self.object_reg, member_index, self.reg]),
        }
    }

    pub fn by_hash(self, hash: u32) -> RawOp {
        let h = hash.to_le_bytes();
        match self.op {
            Operation::Load => {
                RawOp::new(Opcode::LoadMemHash, &[self.reg, self.object_reg, h[0], h[1], h[2], h[3]])
            }
            Operation::Store => {
                RawOp::new(Opcode::MovMemHash, &[self.object_reg, h[0], h[1], h[2], h[3], self.reg])
            }
        }
    }

    pub fn by_offset(self, _offset: u16) -> Result<RawOp, StorageError> {
        Err(StorageError::NotImplemented { method: Method::Member, strategy: Strategy::ByOffset })
    }
}

/// FNV-1, matching `ace-vm::heap::fnv1_hash` exactly so a compile-time
/// `by_hash` lookup and a run-time `HAS_MEM_HASH` probe agree.
pub fn hash_member_name(name: &str) -> u32 {
    const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
    const FNV_PRIME: u32 = 0x0100_0193;
    let mut hash = FNV_OFFSET_BASIS;
    for byte in name.as_bytes() {
        hash = hash.wrapping_mul(FNV_PRIME);
        hash ^= u32::from(*byte);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::chunk::Buildable;

    #[test]
    fn local_load_by_offset_encodes_load_offset() {
        let op = StorageOpBuilder::load(3).local().by_offset(12);
        assert_eq!(op.size(), 4);
    }

    #[test]
    fn storing_into_static_is_rejected() {
        let err = StorageOpBuilder::store(0).static_().by_index(0).unwrap_err();
        assert!(matches!(err, StorageError::StaticIsImmutable));
    }

    #[test]
    fn array_has_no_offset_addressing() {
        let err = StorageOpBuilder::load(0).array(1).by_offset(0).unwrap_err();
        assert!(matches!(
            err,
            StorageError::NotImplemented { method: Method::Array, strategy: Strategy::ByOffset }
        ));
    }

    #[test]
    fn member_hash_is_stable() {
        assert_eq!(hash_member_name("x"), hash_member_name("x"));
        assert_ne!(hash_member_name("x"), hash_member_name("y"));
    }
}
