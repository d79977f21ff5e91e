//! The dispatch loop and multi-threaded driver (spec §4.4, §5).
//!
//! Grounded on `examples/original_source/include/ace-vm/vm.hpp`'s `VM`
//! class (state + bytecode stream + `HandleInstruction`/`Execute`) and its
//! `CompareFlags`/`COMPARE_*` macros. Cooperative scheduling of multiple
//! `ExecutionThread`s behind one shared, mutex-guarded `VmState` is this
//! crate's chosen lock discipline for spec §5's "allocation must be atomic
//! with respect to GC" requirement — every thread quantum (one
//! instruction) holds the lock for its full duration.

use std::sync::Arc;

use ace_compiler::bytecode::{ByteReader, Opcode, ReadError};
use tokio::sync::Mutex;

use crate::bytecode_file::LoadedProgram;
use crate::heap::{fnv1_hash, Heap, HeapObjectKind, Member, ObjectInstance, TypeInfo};
use crate::native::{NativeContext, NativeError, NativeRegistry};
use crate::thread::ExecutionThread;
use crate::value::{numeric_rank, value_double, value_int64, FunctionCallInfo, TryCatchInfo, Value, ValueError};

#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
    #[error("attempted to call a non-callable value")]
    NotCallable,
    #[error("comparison or arithmetic between incompatible types")]
    IncompatibleTypes,
    #[error("return outside of a call frame")]
    ReturnWithoutFrame,
    #[error(transparent)]
    Native(#[from] NativeError),
    #[error(transparent)]
    Value(#[from] ValueError),
}

impl VmError {
    /// Whether a try-frame should catch this error rather than halting the
    /// whole thread. Malformed bytecode (`Read`/`UnknownOpcode`) and
    /// interpreter invariant violations (`ReturnWithoutFrame`) are bugs,
    /// not script-level exceptions, so they always propagate.
    fn is_catchable(&self) -> bool {
        matches!(self, VmError::IncompatibleTypes | VmError::NotCallable | VmError::Native(_) | VmError::Value(_))
    }
}

/// Everything the VM's threads share: the heap, the static-object table,
/// the code stream, the native function table, and the thread pool
/// itself (kept centrally so garbage collection can see every thread's
/// roots at once).
pub struct VmState {
    pub heap: Heap,
    pub statics: Vec<Value>,
    pub code: Vec<u8>,
    pub natives: NativeRegistry,
    pub threads: Vec<ExecutionThread>,
}

impl VmState {
    pub fn from_program(program: LoadedProgram, heap: Heap, natives: NativeRegistry) -> Self {
        Self { heap, statics: program.statics, code: program.code, natives, threads: Vec::new() }
    }

    fn collect_garbage(&mut self) {
        let mut roots: Vec<Value> = self.statics.clone();
        for thread in &self.threads {
            roots.extend(thread.roots().cloned());
        }
        let stats = self.heap.collect(roots.iter());
        log::debug!("gc: marked {}, swept {}", stats.marked, stats.swept);
    }

    /// Runs exactly one instruction for `threads[index]`. Moves the thread
    /// out of the vector for the duration of the call so the dispatch code
    /// below can hold `&mut self` (for heap/native access) and `&mut
    /// ExecutionThread` simultaneously without fighting the borrow checker.
    pub fn step_thread(&mut self, index: usize) -> Result<(), VmError> {
        let mut thread = std::mem::take(&mut self.threads[index]);
        let result = self.step(&mut thread);
        let outcome = match result {
            Err(err) if err.is_catchable() => match thread.unwind_to_nearest_catch() {
                Some(catch_address) => {
                    let message = self.heap.alloc(HeapObjectKind::ImmutableString(err.to_string()));
                    thread.pending_exception = Some(Value::HeapPointer(message));
                    thread.pc = catch_address;
                    Ok(())
                }
                None => Err(err),
            },
            other => other,
        };
        self.threads[index] = thread;
        outcome
    }

    fn step(&mut self, thread: &mut ExecutionThread) -> Result<(), VmError> {
        let mut reader = ByteReader::new(&self.code);
        reader.seek(thread.pc as usize);

        let opcode_byte = reader.u8()?;
        let opcode = Opcode::from_byte(opcode_byte).ok_or(VmError::UnknownOpcode(opcode_byte))?;

        match opcode {
            Opcode::Nop => {}
            Opcode::LoadI32 => {
                let reg = reader.u8()?;
                let v = reader.i32()?;
                thread.registers.set(reg, Value::I32(v));
            }
            Opcode::LoadI64 => {
                let reg = reader.u8()?;
                let v = reader.i64()?;
                thread.registers.set(reg, Value::I64(v));
            }
            Opcode::LoadF32 => {
                let reg = reader.u8()?;
                let v = reader.f32()?;
                thread.registers.set(reg, Value::F32(v));
            }
            Opcode::LoadF64 => {
                let reg = reader.u8()?;
                let v = reader.f64()?;
                thread.registers.set(reg, Value::F64(v));
            }
            Opcode::LoadOffset => {
                let reg = reader.u8()?;
                let offset = reader.u16()?;
                let value = thread.stack.get_offset(thread.stack_base, offset).cloned().unwrap_or(Value::None);
                thread.registers.set(reg, value);
            }
            Opcode::LoadIndex => {
                let reg = reader.u8()?;
                let index = reader.u16()?;
                let value = thread.stack.get_index(index).cloned().unwrap_or(Value::None);
                thread.registers.set(reg, value);
            }
            Opcode::LoadStatic => {
                let reg = reader.u8()?;
                let index = reader.u16()?;
                let value = self.statics.get(index as usize).cloned().unwrap_or(Value::None);
                thread.registers.set(reg, value);
            }
            Opcode::LoadString => {
                let reg = reader.u8()?;
                let value = reader.string()?;
                let handle = self.heap.alloc(HeapObjectKind::ImmutableString(value));
                thread.registers.set(reg, Value::HeapPointer(handle));
            }
            Opcode::LoadAddr => {
                let reg = reader.u8()?;
                let addr = reader.u32()?;
                thread.registers.set(reg, Value::Address(addr));
            }
            Opcode::LoadFunc => {
                let reg = reader.u8()?;
                let address = reader.u32()?;
                let nargs = reader.u8()?;
                let flags = reader.u8()?;
                thread.registers.set(reg, Value::Function { address, nargs, flags });
            }
            Opcode::LoadType => {
                let reg = reader.u8()?;
                let member_count = reader.u16()?;
                let name = reader.short_string()?;
                let mut member_names = Vec::with_capacity(member_count as usize);
                for _ in 0..member_count {
                    member_names.push(reader.short_string()?);
                }
                let handle = self.heap.alloc(HeapObjectKind::TypeInfo(TypeInfo { name, member_names }));
                thread.registers.set(reg, Value::HeapPointer(handle));
            }
            Opcode::LoadMem => {
                let reg = reader.u8()?;
                let src = reader.u8()?;
                let member_index = reader.u8()?;
                let value = Self::object_at(&self.heap, thread, src).and_then(|obj| obj.get_by_index(member_index as usize).cloned());
                thread.registers.set(reg, value.unwrap_or(Value::None));
            }
            Opcode::LoadMemHash => {
                let reg = reader.u8()?;
                let src = reader.u8()?;
                let hash = reader.u32()?;
                let value = Self::object_at(&self.heap, thread, src).and_then(|obj| obj.get_by_hash(hash).cloned());
                thread.registers.set(reg, value.unwrap_or(Value::None));
            }
            Opcode::LoadArrayIdx => {
                let reg = reader.u8()?;
                let src = reader.u8()?;
                let index_reg = reader.u8()?;
                let index = value_int64(thread.registers.get(index_reg))? as usize;
                let value = Self::array_at(&self.heap, thread, src).and_then(|items| items.get(index).cloned());
                thread.registers.set(reg, value.unwrap_or(Value::None));
            }
            Opcode::LoadNull => {
                let reg = reader.u8()?;
                thread.registers.set(reg, Value::None);
            }
            Opcode::LoadTrue => {
                let reg = reader.u8()?;
                thread.registers.set(reg, Value::Bool(true));
            }
            Opcode::LoadFalse => {
                let reg = reader.u8()?;
                thread.registers.set(reg, Value::Bool(false));
            }
            Opcode::MovOffset => {
                let offset = reader.u16()?;
                let src = reader.u8()?;
                let value = thread.registers.get(src).clone();
                thread.stack.set_offset(thread.stack_base, offset, value);
            }
            Opcode::MovIndex => {
                let index = reader.u16()?;
                let src = reader.u8()?;
                let value = thread.registers.get(src).clone();
                thread.stack.set_index(index, value);
            }
            Opcode::MovMem => {
                let dst_obj = reader.u8()?;
                let dst_index = reader.u8()?;
                let src = reader.u8()?;
                let value = thread.registers.get(src).clone();
                if let Some(obj) = Self::object_at_mut(&mut self.heap, thread, dst_obj) {
                    obj.set_by_index(dst_index as usize, value);
                }
            }
            Opcode::MovMemHash => {
                let dst_obj = reader.u8()?;
                let hash = reader.u32()?;
                let src = reader.u8()?;
                let value = thread.registers.get(src).clone();
                if let Some(obj) = Self::object_at_mut(&mut self.heap, thread, dst_obj) {
                    obj.set_by_hash(hash, value);
                }
            }
            Opcode::MovArrayIdx => {
                let dst_array = reader.u8()?;
                let index_reg = reader.u8()?;
                let src = reader.u8()?;
                let index = value_int64(thread.registers.get(index_reg))? as usize;
                let value = thread.registers.get(src).clone();
                if let Some(items) = Self::array_at_mut(&mut self.heap, thread, dst_array) {
                    if index >= items.len() {
                        items.resize(index + 1, Value::None);
                    }
                    items[index] = value;
                }
            }
            Opcode::MovReg => {
                let dst = reader.u8()?;
                let src = reader.u8()?;
                let value = thread.registers.get(src).clone();
                thread.registers.set(dst, value);
            }
            Opcode::HasMemHash => {
                let reg = reader.u8()?;
                let src = reader.u8()?;
                let hash = reader.u32()?;
                let value = Self::object_at(&self.heap, thread, src).and_then(|obj| obj.get_by_hash(hash).cloned());
                thread.registers.set(reg, value.unwrap_or(Value::None));
            }
            Opcode::Push => {
                let src = reader.u8()?;
                let value = thread.registers.get(src).clone();
                thread.stack.push(value);
            }
            Opcode::Pop => {
                thread.stack.pop();
            }
            Opcode::PopN => {
                let n = reader.u8()?;
                thread.stack.pop_n(n);
            }
            Opcode::PushArray => {
                let dst_array = reader.u8()?;
                let src = reader.u8()?;
                let value = thread.registers.get(src).clone();
                if let Some(items) = Self::array_at_mut(&mut self.heap, thread, dst_array) {
                    items.push(value);
                }
            }
            Opcode::Jmp => {
                let addr = reader.u32()?;
                thread.pc = addr;
                return Ok(());
            }
            Opcode::Je => {
                let addr = reader.u32()?;
                if thread.registers.compare_flags.equal {
                    thread.pc = addr;
                    return Ok(());
                }
            }
            Opcode::Jne => {
                let addr = reader.u32()?;
                if !thread.registers.compare_flags.equal {
                    thread.pc = addr;
                    return Ok(());
                }
            }
            Opcode::Jg => {
                let addr = reader.u32()?;
                if thread.registers.compare_flags.greater {
                    thread.pc = addr;
                    return Ok(());
                }
            }
            Opcode::Jge => {
                let addr = reader.u32()?;
                if thread.registers.compare_flags.greater || thread.registers.compare_flags.equal {
                    thread.pc = addr;
                    return Ok(());
                }
            }
            Opcode::Call => {
                let func_reg = reader.u8()?;
                let argc = reader.u8()?;
                let next_pc = reader.position() as u32;
                let callee = thread.registers.get(func_reg).clone();
                match callee {
                    Value::Function { address, .. } => {
                        let stack_len = thread.stack.len();
                        let new_base = stack_len.saturating_sub(u32::from(argc));
                        thread.push_call_frame(FunctionCallInfo {
                            return_pc: next_pc,
                            return_register_cursor: 0,
                            stack_base: thread.stack_base,
                        });
                        thread.stack_base = new_base;
                        thread.pc = address;
                        return Ok(());
                    }
                    Value::NativeFunction(id) => {
                        let start = thread.stack.len().saturating_sub(u32::from(argc)) as usize;
                        let args: Vec<Value> = thread.stack.iter().skip(start).cloned().collect();
                        let native = self.natives.get(id).cloned().ok_or(VmError::NotCallable)?;
                        {
                            let mut ctx = NativeContext { heap: &mut self.heap, thread: &mut *thread };
                            (*native)(&mut ctx, &args)?;
                        }
                        thread.pc = next_pc;
                        return Ok(());
                    }
                    _ => return Err(VmError::NotCallable),
                }
            }
            Opcode::Ret => {
                let frame = thread.pop_call_frame().ok_or(VmError::ReturnWithoutFrame)?;
                thread.stack_base = frame.stack_base;
                thread.pc = frame.return_pc;
                return Ok(());
            }
            Opcode::BeginTry => {
                let catch_address = reader.u32()?;
                thread.push_try_frame(TryCatchInfo { catch_address, stack_depth: thread.stack.len() });
            }
            Opcode::EndTry => {
                thread.pop_try_frame();
            }
            Opcode::New => {
                let dst = reader.u8()?;
                let type_reg = reader.u8()?;
                let type_handle = match thread.registers.get(type_reg) {
                    Value::HeapPointer(h) => *h,
                    _ => return Err(VmError::IncompatibleTypes),
                };
                let member_names = match self.heap.get(type_handle).map(|o| &o.kind) {
                    Some(HeapObjectKind::TypeInfo(info)) => info.member_names.clone(),
                    _ => return Err(VmError::IncompatibleTypes),
                };
                let members = member_names
                    .iter()
                    .map(|name| Member { hash: fnv1_hash(name), value: Value::None })
                    .collect();
                let instance = ObjectInstance::new(type_handle, None, members);
                let handle = self.heap.alloc(HeapObjectKind::Object(instance));
                thread.registers.set(dst, Value::HeapPointer(handle));
            }
            Opcode::NewArray => {
                let dst = reader.u8()?;
                let size = reader.u32()?;
                let handle = self.heap.alloc(HeapObjectKind::Array(vec![Value::None; size as usize]));
                thread.registers.set(dst, Value::HeapPointer(handle));
            }
            Opcode::Cmp => {
                let lhs = reader.u8()?;
                let rhs = reader.u8()?;
                let flags = self.compare(thread.registers.get(lhs), thread.registers.get(rhs))?;
                thread.registers.compare_flags = flags;
            }
            Opcode::Cmpz => {
                let reg = reader.u8()?;
                let truthy = thread.registers.get(reg).is_truthy();
                thread.registers.compare_flags = crate::registers::CompareFlags { equal: !truthy, greater: false };
            }
            Opcode::Add => self.binary_arithmetic(&mut reader, thread, |a, b| a.wrapping_add(b), |a, b| a + b)?,
            Opcode::Sub => self.binary_arithmetic(&mut reader, thread, |a, b| a.wrapping_sub(b), |a, b| a - b)?,
            Opcode::Mul => self.binary_arithmetic(&mut reader, thread, |a, b| a.wrapping_mul(b), |a, b| a * b)?,
            Opcode::Div => self.binary_arithmetic(&mut reader, thread, |a, b| if b == 0 { 0 } else { a / b }, |a, b| a / b)?,
            Opcode::Mod => self.binary_arithmetic(&mut reader, thread, |a, b| if b == 0 { 0 } else { a % b }, |a, b| a % b)?,
            Opcode::Neg => {
                let reg = reader.u8()?;
                let negated = match thread.registers.get(reg) {
                    Value::I32(v) => Value::I32(v.wrapping_neg()),
                    Value::I64(v) => Value::I64(v.wrapping_neg()),
                    Value::F32(v) => Value::F32(-v),
                    Value::F64(v) => Value::F64(-v),
                    _ => return Err(VmError::IncompatibleTypes),
                };
                thread.registers.set(reg, negated);
            }
            Opcode::Not => {
                let reg = reader.u8()?;
                let inverted = match thread.registers.get(reg) {
                    Value::Bool(v) => Value::Bool(!v),
                    Value::I32(v) => Value::I32(!v),
                    Value::I64(v) => Value::I64(!v),
                    _ => return Err(VmError::IncompatibleTypes),
                };
                thread.registers.set(reg, inverted);
            }
            Opcode::Exit => {
                thread.halted = true;
            }
            Opcode::StoreStaticString
            | Opcode::StoreStaticAddress
            | Opcode::StoreStaticFunction
            | Opcode::StoreStaticType => {
                // Static-store instructions belong to the file's prelude
                // only (spec §6); encountering one in the main stream
                // means the bytecode was hand-corrupted rather than
                // produced by `ace-compiler::emit`.
                return Err(VmError::UnknownOpcode(opcode_byte));
            }
        }

        thread.pc = reader.position() as u32;
        Ok(())
    }

    fn compare(&self, lhs: &Value, rhs: &Value) -> Result<crate::registers::CompareFlags, VmError> {
        use crate::registers::CompareFlags;
        match (lhs, rhs) {
            (Value::HeapPointer(a), Value::HeapPointer(b)) => Ok(CompareFlags { equal: a == b, greater: false }),
            (Value::None, Value::None) => Ok(CompareFlags { equal: true, greater: false }),
            (Value::None, _) | (_, Value::None) => Ok(CompareFlags { equal: false, greater: false }),
            (Value::Function { address: a, .. }, Value::Function { address: b, .. }) => {
                Ok(CompareFlags { equal: a == b, greater: a > b })
            }
            _ => match (numeric_rank(lhs), numeric_rank(rhs)) {
                (Some(_), Some(_)) => {
                    let a = value_double(lhs)?;
                    let b = value_double(rhs)?;
                    Ok(CompareFlags { equal: a == b, greater: a > b })
                }
                _ => Err(VmError::IncompatibleTypes),
            },
        }
    }

    fn binary_arithmetic(
        &self,
        reader: &mut ByteReader<'_>,
        thread: &mut ExecutionThread,
        int_op: impl Fn(i64, i64) -> i64,
        float_op: impl Fn(f64, f64) -> f64,
    ) -> Result<(), VmError> {
        let lhs_reg = reader.u8()?;
        let rhs_reg = reader.u8()?;
        let dst_reg = reader.u8()?;
        let lhs = thread.registers.get(lhs_reg);
        let rhs = thread.registers.get(rhs_reg);
        let (lr, rr) = (numeric_rank(lhs), numeric_rank(rhs));
        let result = match (lr, rr) {
            (Some(lr), Some(rr)) if lr.max(rr) <= 1 => Value::I64(int_op(value_int64(lhs)?, value_int64(rhs)?)),
            (Some(_), Some(_)) => Value::F64(float_op(value_double(lhs)?, value_double(rhs)?)),
            _ => return Err(VmError::IncompatibleTypes),
        };
        thread.registers.set(dst_reg, result);
        Ok(())
    }

    /// These resolve a register to a heap object and borrow only `heap`
    /// (never the whole `VmState`), so they coexist with the `ByteReader`
    /// that's still reading out of `self.code` for the rest of the
    /// instruction's operands.
    fn object_at<'h>(heap: &'h Heap, thread: &ExecutionThread, reg: u8) -> Option<&'h ObjectInstance> {
        let Value::HeapPointer(handle) = thread.registers.get(reg) else { return None };
        match &heap.get(*handle)?.kind {
            HeapObjectKind::Object(obj) => Some(obj),
            _ => None,
        }
    }

    fn object_at_mut<'h>(heap: &'h mut Heap, thread: &ExecutionThread, reg: u8) -> Option<&'h mut ObjectInstance> {
        let Value::HeapPointer(handle) = thread.registers.get(reg) else { return None };
        let handle = *handle;
        match &mut heap.get_mut(handle)?.kind {
            HeapObjectKind::Object(obj) => Some(obj),
            _ => None,
        }
    }

    fn array_at<'h>(heap: &'h Heap, thread: &ExecutionThread, reg: u8) -> Option<&'h [Value]> {
        let Value::HeapPointer(handle) = thread.registers.get(reg) else { return None };
        match &heap.get(*handle)?.kind {
            HeapObjectKind::Array(items) => Some(items),
            _ => None,
        }
    }

    fn array_at_mut<'h>(heap: &'h mut Heap, thread: &ExecutionThread, reg: u8) -> Option<&'h mut Vec<Value>> {
        let Value::HeapPointer(handle) = thread.registers.get(reg) else { return None };
        let handle = *handle;
        match &mut heap.get_mut(handle)?.kind {
            HeapObjectKind::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// A handle to a shared `VmState`. Cloning shares the same underlying
/// state (and its lock) across every spawned thread task.
#[derive(Clone)]
pub struct Vm {
    state: Arc<Mutex<VmState>>,
}

impl Vm {
    pub fn new(program: LoadedProgram, heap: Heap, natives: NativeRegistry) -> Self {
        Self { state: Arc::new(Mutex::new(VmState::from_program(program, heap, natives))) }
    }

    /// Registers a new thread at `entry_pc` and returns its index.
    pub fn spawn_thread(&self, entry_pc: u32) -> usize {
        let mut state = self.state.blocking_lock();
        state.threads.push(ExecutionThread::new(entry_pc));
        state.threads.len() - 1
    }

    /// Runs one thread to completion, yielding to the scheduler between
    /// every instruction so sibling threads on the same executor get a
    /// turn (spec §5: "cooperative... advance one bytecode instruction at
    /// a time").
    pub async fn run_thread(&self, index: usize) -> Result<(), VmError> {
        loop {
            let halted = {
                let mut state = self.state.lock().await;
                if state.threads[index].halted {
                    true
                } else {
                    state.step_thread(index)?;
                    if state.heap.should_collect() {
                        state.collect_garbage();
                    }
                    false
                }
            };
            if halted {
                log::debug!("thread {index} halted");
                return Ok(());
            }
            tokio::task::yield_now().await;
        }
    }

    /// Runs the whole program to completion, starting one thread per
    /// entry point and scheduling them concurrently on the current tokio
    /// runtime.
    pub async fn run(&self, entry_points: &[u32]) -> Result<(), VmError> {
        let mut set = tokio::task::JoinSet::new();
        for &entry in entry_points {
            let index = self.spawn_thread(entry);
            let vm = self.clone();
            set.spawn(async move { vm.run_thread(index).await });
        }
        while let Some(result) = set.join_next().await {
            result.expect("a VM thread task panicked")?;
        }
        Ok(())
    }

    pub async fn with_state<R>(&self, f: impl FnOnce(&mut VmState) -> R) -> R {
        let mut state = self.state.lock().await;
        f(&mut state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ace_compiler::bytecode::ByteWriter;

    fn run_to_halt(state: &mut VmState) {
        while !state.threads[0].halted {
            state.step_thread(0).unwrap();
        }
    }

    #[test]
    fn adds_two_integers_and_exits() {
        let mut w = ByteWriter::new();
        w.u8(Opcode::LoadI64 as u8);
        w.u8(0);
        w.i64(2);
        w.u8(Opcode::LoadI64 as u8);
        w.u8(1);
        w.i64(3);
        w.u8(Opcode::Add as u8);
        w.u8(0);
        w.u8(1);
        w.u8(2);
        w.u8(Opcode::Exit as u8);

        let mut heap = Heap::default();
        let program = crate::bytecode_file::load(&w.into_bytes(), &mut heap).unwrap();
        let mut state = VmState::from_program(program, heap, NativeRegistry::new());
        state.threads.push(ExecutionThread::new(0));
        run_to_halt(&mut state);

        assert_eq!(state.threads[0].registers.get(2), &Value::I64(5));
    }

    #[test]
    fn a_runtime_error_inside_a_try_block_is_caught_and_resumes_at_the_handler() {
        // load_null r0; begin_try @10; neg r0 (errors: None isn't negatable);
        // end_try; [catch, offset 10] load_i64 r1, 99; exit
        let mut w = ByteWriter::new();
        w.u8(Opcode::LoadNull as u8);
        w.u8(0);
        w.u8(Opcode::BeginTry as u8);
        w.u32(10);
        w.u8(Opcode::Neg as u8);
        w.u8(0);
        w.u8(Opcode::EndTry as u8);
        w.u8(Opcode::LoadI64 as u8);
        w.u8(1);
        w.i64(99);
        w.u8(Opcode::Exit as u8);

        let mut heap = Heap::default();
        let program = crate::bytecode_file::load(&w.into_bytes(), &mut heap).unwrap();
        let mut state = VmState::from_program(program, heap, NativeRegistry::new());
        state.threads.push(ExecutionThread::new(0));
        run_to_halt(&mut state);

        assert_eq!(state.threads[0].registers.get(1), &Value::I64(99));
        assert!(state.threads[0].pending_exception.is_some());
    }

    #[test]
    fn an_uncaught_error_propagates_out_of_step_thread() {
        let mut w = ByteWriter::new();
        w.u8(Opcode::LoadNull as u8);
        w.u8(0);
        w.u8(Opcode::Neg as u8);
        w.u8(0);
        w.u8(Opcode::Exit as u8);

        let mut heap = Heap::default();
        let program = crate::bytecode_file::load(&w.into_bytes(), &mut heap).unwrap();
        let mut state = VmState::from_program(program, heap, NativeRegistry::new());
        state.threads.push(ExecutionThread::new(0));

        assert!(matches!(state.step_thread(0), Err(VmError::IncompatibleTypes)));
    }
}
