//! Bytecode chunks, labels, and the two-pass build protocol (spec §3.8,
//! design notes §9: "(1) size each chunk bottom-up to resolve label offsets,
//! (2) emit bytes using the resolved label table").
//!
//! Grounded on `examples/original_source/include/ace-c/emit/Instruction.hpp`'s
//! `Buildable`, `BuildParams`, `Label`, and `Jump`.

use crate::bytecode::Opcode;

/// Identifies a label within the chunk that declared it. Stable across a
/// chunk's lifetime; resolved to a byte offset only once sizes are known.
pub type LabelId = usize;

/// Parameters threaded down through a `build()` call.
///
/// `block_offset` is the absolute byte position, in the final stream, of the
/// start of the chunk that owns the item currently being built — held
/// constant across that chunk's direct children. `local_offset` is the
/// running cursor the owning chunk advances as it walks its own children;
/// a nested `Chunk` child uses `block_offset + local_offset` (the position
/// it has reached so far) as the basis for recomputing its *own*
/// `block_offset` when its own `build()` runs. `labels` is the owning
/// chunk's flattened label table, indexed by `LabelId`.
#[derive(Debug, Clone, Default)]
pub struct BuildParams {
    pub block_offset: u32,
    pub local_offset: u32,
    pub labels: Vec<u32>,
}

/// Anything that can compute its own size and serialize itself into the
/// instruction stream given build parameters from its owning chunk.
pub trait Buildable {
    fn size(&self) -> usize;
    fn build(&self, output: &mut Vec<u8>, params: &BuildParams);
}

/// A fixed, pre-encoded instruction — covers every opcode whose operands
/// don't depend on label resolution (arithmetic, loads of immediates,
/// register moves, stack control, and so on).
#[derive(Debug)]
pub struct RawOp {
    bytes: Vec<u8>,
}

impl RawOp {
    pub fn new(opcode: Opcode, operands: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(1 + operands.len());
        bytes.push(opcode as u8);
        bytes.extend_from_slice(operands);
        Self { bytes }
    }
}

impl Buildable for RawOp {
    fn size(&self) -> usize {
        self.bytes.len()
    }

    fn build(&self, output: &mut Vec<u8>, _params: &BuildParams) {
        output.extend_from_slice(&self.bytes);
    }
}

/// `JMP`/`JE`/`JNE`/`JG`/`JGE` — the only raw instructions whose operand is
/// an address resolved from the owning chunk's label table rather than
/// known up front.
pub struct Jump {
    pub opcode: Opcode,
    pub label: LabelId,
}

impl Jump {
    pub fn new(opcode: Opcode, label: LabelId) -> Self {
        Self { opcode, label }
    }
}

impl Buildable for Jump {
    fn size(&self) -> usize {
        1 + 4
    }

    fn build(&self, output: &mut Vec<u8>, params: &BuildParams) {
        output.push(self.opcode as u8);
        let pos = params.block_offset + params.labels[self.label];
        output.extend_from_slice(&pos.to_le_bytes());
    }
}

/// `BEGIN_TRY` — carries the catch handler's resolved address directly in
/// the instruction stream (the C++ original embeds the address inline
/// rather than routing it through a register).
pub struct BeginTry {
    pub catch_label: LabelId,
}

impl Buildable for BeginTry {
    fn size(&self) -> usize {
        1 + 4
    }

    fn build(&self, output: &mut Vec<u8>, params: &BuildParams) {
        output.push(Opcode::BeginTry as u8);
        let pos = params.block_offset + params.labels[self.catch_label];
        output.extend_from_slice(&pos.to_le_bytes());
    }
}

/// `LOAD_FUNC` — register, resolved entry-point address, arg count, flags.
pub struct LoadFunc {
    pub reg: u8,
    pub label: LabelId,
    pub nargs: u8,
    pub flags: u8,
}

impl Buildable for LoadFunc {
    fn size(&self) -> usize {
        1 + 1 + 4 + 1 + 1
    }

    fn build(&self, output: &mut Vec<u8>, params: &BuildParams) {
        output.push(Opcode::LoadFunc as u8);
        output.push(self.reg);
        let pos = params.block_offset + params.labels[self.label];
        output.extend_from_slice(&pos.to_le_bytes());
        output.push(self.nargs);
        output.push(self.flags);
    }
}

/// `LOAD_TYPE` — register, member names (spec §4.5 object model: a type is
/// its member name list, not a layout).
pub struct LoadType {
    pub reg: u8,
    pub name: String,
    pub members: Vec<String>,
}

impl Buildable for LoadType {
    fn size(&self) -> usize {
        1 + 1 + 2 + self.name.len() + 2 + self.members.iter().map(|m| 2 + m.len()).sum::<usize>()
    }

    fn build(&self, output: &mut Vec<u8>, _params: &BuildParams) {
        output.push(Opcode::LoadType as u8);
        output.push(self.reg);
        output.extend_from_slice(&(self.members.len() as u16).to_le_bytes());
        output.extend_from_slice(&(self.name.len() as u16).to_le_bytes());
        output.extend_from_slice(self.name.as_bytes());
        for member in &self.members {
            output.extend_from_slice(&(member.len() as u16).to_le_bytes());
            output.extend_from_slice(member.as_bytes());
        }
    }
}

/// `LOAD_STRING` — register, UTF-8 payload.
pub struct LoadString {
    pub reg: u8,
    pub value: String,
}

impl Buildable for LoadString {
    fn size(&self) -> usize {
        1 + 1 + 4 + self.value.len()
    }

    fn build(&self, output: &mut Vec<u8>, _params: &BuildParams) {
        output.push(Opcode::LoadString as u8);
        output.push(self.reg);
        output.extend_from_slice(&(self.value.len() as u32).to_le_bytes());
        output.extend_from_slice(self.value.as_bytes());
    }
}

enum ChunkItem {
    Child(Box<dyn Buildable>),
    Label(LabelId),
}

/// A sequence of `Buildable`s with internal labels, itself `Buildable`.
/// Chunks nest: a function body is a chunk inside the enclosing module's
/// chunk, each `if`/`while` arm is a chunk inside its enclosing function.
#[derive(Default)]
pub struct Chunk {
    items: Vec<ChunkItem>,
    next_label: LabelId,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a new label, to be fixed to a position later with
    /// `place_label`. May be referenced by jumps before it is placed.
    pub fn new_label(&mut self) -> LabelId {
        let id = self.next_label;
        self.next_label += 1;
        id
    }

    pub fn append<B: Buildable + 'static>(&mut self, item: B) {
        self.items.push(ChunkItem::Child(Box::new(item)));
    }

    pub fn append_chunk(&mut self, chunk: Chunk) {
        self.items.push(ChunkItem::Child(Box::new(chunk)));
    }

    /// Fixes a previously reserved label to the current end of this chunk.
    pub fn place_label(&mut self, label: LabelId) {
        self.items.push(ChunkItem::Label(label));
    }

    /// First pass: sums preceding children's sizes up to each label marker,
    /// producing a table indexed by `LabelId`.
    fn compute_labels(&self) -> Vec<u32> {
        let mut table = vec![0u32; self.next_label];
        let mut offset = 0u32;
        for item in &self.items {
            match item {
                ChunkItem::Child(child) => offset += child.size() as u32,
                ChunkItem::Label(id) => table[*id] = offset,
            }
        }
        table
    }
}

impl Buildable for Chunk {
    fn size(&self) -> usize {
        self.items
            .iter()
            .map(|item| match item {
                ChunkItem::Child(child) => child.size(),
                ChunkItem::Label(_) => 0,
            })
            .sum()
    }

    fn build(&self, output: &mut Vec<u8>, params: &BuildParams) {
        let block_offset = params.block_offset + params.local_offset;
        let labels = self.compute_labels();
        let mut child_params = BuildParams {
            block_offset,
            local_offset: 0,
            labels,
        };
        for item in &self.items {
            if let ChunkItem::Child(child) = item {
                child.build(output, &child_params);
                child_params.local_offset += child.size() as u32;
            }
        }
    }
}

/// Builds a top-level chunk into a flat byte stream, starting at stream
/// position zero.
pub fn build_root(chunk: &Chunk) -> Vec<u8> {
    let mut output = Vec::with_capacity(chunk.size());
    let params = BuildParams {
        block_offset: 0,
        local_offset: 0,
        labels: Vec::new(),
    };
    chunk.build(&mut output, &params);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_ops_concatenate_in_order() {
        let mut chunk = Chunk::new();
        chunk.append(RawOp::new(Opcode::LoadNull, &[0]));
        chunk.append(RawOp::new(Opcode::Push, &[0]));
        chunk.append(RawOp::new(Opcode::Exit, &[]));
        let bytes = build_root(&chunk);
        assert_eq!(bytes, vec![Opcode::LoadNull as u8, 0, Opcode::Push as u8, 0, Opcode::Exit as u8]);
    }

    #[test]
    fn forward_jump_resolves_to_the_placed_label_offset() {
        let mut chunk = Chunk::new();
        let end = chunk.new_label();
        chunk.append(Jump::new(Opcode::Jmp, end));
        chunk.append(RawOp::new(Opcode::LoadTrue, &[0]));
        chunk.place_label(end);
        chunk.append(RawOp::new(Opcode::Exit, &[]));

        let bytes = build_root(&chunk);
        // jmp opcode(1) + addr(4) = 5 bytes, then load_true(2), landing at offset 7.
        assert_eq!(bytes[0], Opcode::Jmp as u8);
        let addr = u32::from_le_bytes(bytes[1..5].try_into().unwrap());
        assert_eq!(addr, 7);
        assert_eq!(bytes[5], Opcode::LoadTrue as u8);
        assert_eq!(bytes[7], Opcode::Exit as u8);
    }

    #[test]
    fn nested_chunk_labels_resolve_against_the_absolute_stream_position() {
        let mut outer = Chunk::new();
        outer.append(RawOp::new(Opcode::Nop, &[]));

        let mut inner = Chunk::new();
        let target = inner.new_label();
        inner.append(Jump::new(Opcode::Jmp, target));
        inner.append(RawOp::new(Opcode::Nop, &[]));
        inner.place_label(target);
        inner.append(RawOp::new(Opcode::Exit, &[]));

        outer.append_chunk(inner);
        let bytes = build_root(&outer);

        // outer: nop(1) then inner starts at offset 1.
        // inner: jmp(5) + nop(1) = 6, label at inner-local offset 6 -> absolute 1+6=7.
        assert_eq!(bytes[1], Opcode::Jmp as u8);
        let addr = u32::from_le_bytes(bytes[2..6].try_into().unwrap());
        assert_eq!(addr, 7);
        assert_eq!(bytes[7], Opcode::Exit as u8);
    }
}
