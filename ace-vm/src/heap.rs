//! The garbage-collected heap (spec §3.11): arena + generational index
//! rather than the original's intrusive doubly-linked list, per design
//! notes §9 ("arena + generational index; each `HeapHandle` is a
//! (generation, index) pair; sweep resets the free list without freeing
//! the backing arena").

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::value::Value;

/// A stable reference to a heap-allocated value. Indexing the arena with a
/// stale generation is a use-after-free in the source language; here it is
/// simply detected and rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapHandle {
    index: u32,
    generation: u32,
}

/// A member's hashed name plus its current value (spec §3.11: "each member
/// stores its name's FNV-1 hash and its current value").
#[derive(Debug, Clone)]
pub struct Member {
    pub hash: u32,
    pub value: Value,
}

#[derive(Debug, Clone)]
pub struct ObjectInstance {
    pub type_info: HeapHandle,
    pub prototype: Option<HeapHandle>,
    pub members: Vec<Member>,
    /// Hash → index into `members`, built once at construction for O(1)
    /// lookup (spec §3.11).
    by_hash: HashMap<u32, usize>,
}

impl ObjectInstance {
    pub fn new(type_info: HeapHandle, prototype: Option<HeapHandle>, members: Vec<Member>) -> Self {
        let by_hash = members.iter().enumerate().map(|(i, m)| (m.hash, i)).collect();
        Self { type_info, prototype, members, by_hash }
    }

    pub fn get_by_hash(&self, hash: u32) -> Option<&Value> {
        self.by_hash.get(&hash).map(|&i| &self.members[i].value)
    }

    pub fn set_by_hash(&mut self, hash: u32, value: Value) -> bool {
        if let Some(&i) = self.by_hash.get(&hash) {
            self.members[i].value = value;
            true
        } else {
            false
        }
    }

    pub fn get_by_index(&self, index: usize) -> Option<&Value> {
        self.members.get(index).map(|m| &m.value)
    }

    pub fn set_by_index(&mut self, index: usize, value: Value) -> bool {
        if let Some(member) = self.members.get_mut(index) {
            member.value = value;
            true
        } else {
            false
        }
    }
}

/// A type's runtime description: member name list in declaration order
/// (spec §4.5: "an object's type-info lists member names in a fixed
/// order").
#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub name: String,
    pub member_names: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum HeapObjectKind {
    ImmutableString(String),
    Array(Vec<Value>),
    Object(ObjectInstance),
    TypeInfo(TypeInfo),
    UserData(Arc<dyn Any + Send + Sync>),
}

#[derive(Debug, Clone)]
pub struct HeapObject {
    pub kind: HeapObjectKind,
    marked: bool,
}

struct Slot {
    generation: u32,
    object: Option<HeapObject>,
}

/// FNV-1 (not FNV-1a, to match `examples/original_source`'s member hashing
/// exactly): used to hash member names into `Member::hash` at object
/// construction and by `HAS_MEM_HASH`'s runtime probe.
pub fn fnv1_hash(name: &str) -> u32 {
    const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
    const FNV_PRIME: u32 = 0x0100_0193;
    let mut hash = FNV_OFFSET_BASIS;
    for byte in name.as_bytes() {
        hash = hash.wrapping_mul(FNV_PRIME);
        hash ^= u32::from(*byte);
    }
    hash
}

pub struct GcStats {
    pub marked: usize,
    pub swept: usize,
}

/// The mark-and-sweep heap shared by every `ExecutionThread`.
pub struct Heap {
    arena: Vec<Slot>,
    free_list: Vec<u32>,
    allocations_since_gc: usize,
    pub gc_threshold: usize,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl Heap {
    pub fn new(gc_threshold: usize) -> Self {
        Self { arena: Vec::new(), free_list: Vec::new(), allocations_since_gc: 0, gc_threshold }
    }

    pub fn alloc(&mut self, kind: HeapObjectKind) -> HeapHandle {
        self.allocations_since_gc += 1;
        let object = HeapObject { kind, marked: false };
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.arena[index as usize];
            slot.object = Some(object);
            HeapHandle { index, generation: slot.generation }
        } else {
            let index = self.arena.len() as u32;
            self.arena.push(Slot { generation: 0, object: Some(object) });
            HeapHandle { index, generation: 0 }
        }
    }

    pub fn get(&self, handle: HeapHandle) -> Option<&HeapObject> {
        let slot = self.arena.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.object.as_ref()
    }

    pub fn get_mut(&mut self, handle: HeapHandle) -> Option<&mut HeapObject> {
        let slot = self.arena.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.object.as_mut()
    }

    /// Whether the allocation count since the last collection has crossed
    /// `gc_threshold` (spec §4.4's GC policy: "may run a collection cycle
    /// at allocation sites when a per-heap threshold is crossed").
    pub fn should_collect(&self) -> bool {
        self.allocations_since_gc >= self.gc_threshold
    }

    /// Mark-and-sweep from an explicit root set (every thread's register
    /// file, operand stack, the static table, and live try-frame state —
    /// assembled by the caller, since the heap itself doesn't know about
    /// threads).
    pub fn collect<'a>(&mut self, roots: impl IntoIterator<Item = &'a Value>) -> GcStats {
        let mut worklist: Vec<HeapHandle> = Vec::new();
        for root in roots {
            Self::push_value_handle(root, &mut worklist);
        }

        let mut marked = 0;
        while let Some(handle) = worklist.pop() {
            let Some(slot) = self.arena.get_mut(handle.index as usize) else { continue };
            if slot.generation != handle.generation {
                continue;
            }
            let Some(object) = slot.object.as_mut() else { continue };
            if object.marked {
                continue;
            }
            object.marked = true;
            marked += 1;

            match &object.kind {
                HeapObjectKind::Array(items) => {
                    for item in items {
                        Self::push_value_handle(item, &mut worklist);
                    }
                }
                HeapObjectKind::Object(instance) => {
                    if let Some(prototype) = instance.prototype {
                        worklist.push(prototype);
                    }
                    worklist.push(instance.type_info);
                    for member in &instance.members {
                        Self::push_value_handle(&member.value, &mut worklist);
                    }
                }
                HeapObjectKind::ImmutableString(_) | HeapObjectKind::TypeInfo(_) | HeapObjectKind::UserData(_) => {}
            }
        }

        let mut swept = 0;
        for (index, slot) in self.arena.iter_mut().enumerate() {
            match &mut slot.object {
                Some(object) if object.marked => {
                    object.marked = false;
                }
                Some(_) => {
                    slot.object = None;
                    slot.generation = slot.generation.wrapping_add(1);
                    self.free_list.push(index as u32);
                    swept += 1;
                }
                None => {}
            }
        }

        self.allocations_since_gc = 0;
        GcStats { marked, swept }
    }

    fn push_value_handle(value: &Value, worklist: &mut Vec<HeapHandle>) {
        if let Value::HeapPointer(handle) = value {
            worklist.push(*handle);
        }
        if let Value::ValueRef(inner) = value {
            Self::push_value_handle(inner, worklist);
        }
    }

    pub fn live_count(&self) -> usize {
        self.arena.iter().filter(|slot| slot.object.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_allocations_are_collected_and_reachable_ones_survive() {
        let mut heap = Heap::new(1024);
        let kept = heap.alloc(HeapObjectKind::ImmutableString("kept".into()));
        for i in 0..1000 {
            heap.alloc(HeapObjectKind::ImmutableString(format!("garbage-{i}")));
        }
        let roots = vec![Value::HeapPointer(kept)];
        let stats = heap.collect(roots.iter());
        assert_eq!(stats.marked, 1);
        assert_eq!(stats.swept, 1000);
        assert_eq!(heap.live_count(), 1);
        assert!(heap.get(kept).is_some());
    }

    #[test]
    fn a_freed_slot_generation_invalidates_the_old_handle() {
        let mut heap = Heap::new(1);
        let first = heap.alloc(HeapObjectKind::ImmutableString("a".into()));
        heap.collect(std::iter::empty());
        let second = heap.alloc(HeapObjectKind::ImmutableString("b".into()));
        assert_eq!(first.index, second.index);
        assert_ne!(first.generation, second.generation);
        assert!(heap.get(first).is_none());
        assert!(heap.get(second).is_some());
    }

    #[test]
    fn object_member_lookup_by_hash_is_o1() {
        let type_info = HeapHandle { index: 0, generation: 0 };
        let members = vec![
            Member { hash: fnv1_hash("x"), value: Value::I32(1) },
            Member { hash: fnv1_hash("y"), value: Value::I32(2) },
        ];
        let instance = ObjectInstance::new(type_info, None, members);
        assert_eq!(instance.get_by_hash(fnv1_hash("y")), Some(&Value::I32(2)));
        assert_eq!(instance.get_by_hash(fnv1_hash("z")), None);
    }
}
