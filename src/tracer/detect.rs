//! Leak and cycle detector
//!
//! Runs at two points:
//! - During frame pops, [`live_reference_exists`] decides whether a raw
//!   block just lost its last owner ("new without delete")
//! - At program exit, [`sweep`] computes reachability from the live
//!   stack roots and classifies every unreachable allocated block as
//!   leaked, flagging reference cycles for diagnostics
//!
//! Reachability follows owning (non-weak) edges only: weak references
//! never keep a block alive, which is exactly what lets a weak back-edge
//! break an ownership cycle.

use crate::memory::heap::Heap;
use crate::memory::stack::Stack;
use crate::memory::value::BlockId;
use crate::memory::RefKind;
use crate::trace::{Event, Trace};
use crate::tracer::errors::TraceError;
use rustc_hash::FxHashSet;

/// Whether any live non-weak reference (stack binding or field of an
/// allocated block) still points at `id`
pub(crate) fn live_reference_exists(heap: &Heap, stack: &Stack, id: BlockId) -> bool {
    for frame in stack.frames() {
        for binding in frame.bindings() {
            if binding.target == Some(id) && binding.kind.is_owning() {
                return true;
            }
        }
    }
    for block in heap.blocks().values() {
        if !block.is_allocated() {
            continue;
        }
        if block.fields.iter().any(|f| f.target == id && f.kind.is_owning()) {
            return true;
        }
    }
    false
}

/// Block ids reachable from the live stack roots through owning edges
fn reachable(heap: &Heap, stack: &Stack) -> FxHashSet<BlockId> {
    let mut seen = FxHashSet::default();
    let mut work: Vec<BlockId> = Vec::new();

    for frame in stack.frames() {
        for binding in frame.bindings() {
            if let Some(id) = binding.target {
                if binding.kind.is_owning() {
                    work.push(id);
                }
            }
        }
    }

    while let Some(id) = work.pop() {
        if !seen.insert(id) {
            continue;
        }
        if let Ok(block) = heap.block(id) {
            if block.is_allocated() {
                for field in &block.fields {
                    if field.kind.is_owning() {
                        work.push(field.target);
                    }
                }
            }
        }
    }
    seen
}

/// Whether `id` can reach itself through shared edges between allocated
/// blocks, the signature of a refcount cycle
fn in_cycle(heap: &Heap, id: BlockId) -> bool {
    let mut seen = FxHashSet::default();
    let mut work: Vec<BlockId> = shared_targets(heap, id);

    while let Some(next) = work.pop() {
        if next == id {
            return true;
        }
        if seen.insert(next) {
            work.extend(shared_targets(heap, next));
        }
    }
    false
}

fn shared_targets(heap: &Heap, id: BlockId) -> Vec<BlockId> {
    match heap.block(id) {
        Ok(block) if block.is_allocated() => block
            .fields
            .iter()
            .filter(|f| f.kind == RefKind::Shared)
            .map(|f| f.target)
            .collect(),
        _ => Vec::new(),
    }
}

/// Full reachability sweep: classify every allocated block not reachable
/// from a live stack root as leaked, in ascending id order. Cycle flags
/// are computed before any block is marked so that mutually referencing
/// blocks all see each other still allocated.
pub(crate) fn sweep(heap: &mut Heap, stack: &Stack, trace: &mut Trace) -> Result<(), TraceError> {
    let reached = reachable(heap, stack);

    let mut leaked: Vec<(BlockId, bool)> = Vec::new();
    for id in heap.ids() {
        let block = heap.block(id)?;
        if block.is_allocated() && !reached.contains(&id) {
            leaked.push((id, in_cycle(heap, id)));
        }
    }

    for (id, cycle) in leaked {
        heap.mark_leaked(id)?;
        trace.record(Event::Leak { id, cycle });
    }
    Ok(())
}
