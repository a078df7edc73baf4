#![allow(dead_code)] // Complete API module, not all methods currently used
//! Heap model for the lifecycle tracer
//!
//! This module provides the heap block table:
//! - Explicit allocation with monotonically assigned ids
//! - Lifecycle states (`Allocated` → `Freed` or `Leaked`, both terminal)
//! - Reference counts for shared-ownership blocks
//! - Per-block field tables for cross-block references
//! - Use-after-free and double-free detection
//!
//! # Block Table
//!
//! Blocks live in a table indexed by [`BlockId`] and are never removed:
//! a freed or leaked block stays behind as a tombstone so that later
//! directives referencing its id are diagnosed precisely instead of
//! reported as unknown.
//!
//! # Reference Counting
//!
//! [`Heap::increment`] and [`Heap::decrement`] only move the count; the
//! zero-check and the resulting [`Heap::free`] are driven by the tracer
//! engine, which owns event ordering for the cascade.

use super::value::BlockId;
use super::RefKind;
use crate::tracer::errors::TraceError;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a heap block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Allocated,
    Freed,
    Leaked,
}

/// Ownership discipline of a heap block, fixed at allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Raw,
    Shared,
}

/// A cross-block reference held in a block's field table
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBinding {
    pub name: String,
    pub target: BlockId,
    pub kind: RefKind,
}

/// A tracked heap block
#[derive(Debug, Clone)]
pub struct HeapBlock {
    pub id: BlockId,
    pub size: usize,
    pub label: String,
    pub state: BlockState,
    pub ownership: Ownership,
    pub refcount: Option<u32>, // Some(_) only for shared-ownership blocks
    pub fields: Vec<FieldBinding>,
}

impl HeapBlock {
    fn new(id: BlockId, size: usize, label: String, ownership: Ownership) -> Self {
        HeapBlock {
            id,
            size,
            label,
            state: BlockState::Allocated,
            ownership,
            refcount: match ownership {
                Ownership::Shared => Some(1),
                Ownership::Raw => None,
            },
            fields: Vec::new(),
        }
    }

    pub fn is_allocated(&self) -> bool {
        self.state == BlockState::Allocated
    }

    /// Install or replace a field binding, returning the displaced one
    pub fn put_field(&mut self, name: String, target: BlockId, kind: RefKind) -> Option<FieldBinding> {
        let binding = FieldBinding {
            name: name.clone(),
            target,
            kind,
        };
        if let Some(slot) = self.fields.iter_mut().find(|f| f.name == name) {
            Some(std::mem::replace(slot, binding))
        } else {
            self.fields.push(binding);
            None
        }
    }
}

/// One entry of a read-only heap dump (see [`Heap::snapshot`])
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub id: BlockId,
    pub size: usize,
    pub label: String,
}

/// The heap block table
#[derive(Debug, Clone)]
pub struct Heap {
    blocks: FxHashMap<BlockId, HeapBlock>,
    next_id: BlockId,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            blocks: FxHashMap::default(),
            next_id: 1,
        }
    }

    /// Allocate a block; shared-ownership blocks start with refcount 1
    pub fn allocate(&mut self, size: usize, label: String, ownership: Ownership) -> BlockId {
        let id = self.next_id;
        self.next_id += 1;
        self.blocks.insert(id, HeapBlock::new(id, size, label, ownership));
        id
    }

    /// The id the next allocation will receive
    pub fn next_id(&self) -> BlockId {
        self.next_id
    }

    /// Look up a block by id
    pub fn block(&self, id: BlockId) -> Result<&HeapBlock, TraceError> {
        self.blocks.get(&id).ok_or(TraceError::UnknownBlock { id })
    }

    /// Look up a block by id, mutably
    pub fn block_mut(&mut self, id: BlockId) -> Result<&mut HeapBlock, TraceError> {
        self.blocks.get_mut(&id).ok_or(TraceError::UnknownBlock { id })
    }

    /// Mark a block `Freed`, returning its field bindings for the caller
    /// to cascade. Fails with `DoubleFree` if the block already reached a
    /// terminal state.
    pub fn free(&mut self, id: BlockId) -> Result<Vec<FieldBinding>, TraceError> {
        let block = self.block_mut(id)?;
        if block.state != BlockState::Allocated {
            return Err(TraceError::DoubleFree { id });
        }
        block.state = BlockState::Freed;
        block.refcount = block.refcount.map(|_| 0);
        Ok(std::mem::take(&mut block.fields))
    }

    /// Mark a block `Leaked`. Only the detector calls this; a block that
    /// was already freed cannot leak.
    pub fn mark_leaked(&mut self, id: BlockId) -> Result<(), TraceError> {
        let block = self.block_mut(id)?;
        if block.state == BlockState::Freed {
            return Err(TraceError::UseAfterFree { id });
        }
        block.state = BlockState::Leaked;
        Ok(())
    }

    /// Increment a shared block's refcount, returning the new count
    pub fn increment(&mut self, id: BlockId) -> Result<u32, TraceError> {
        let block = self.block_mut(id)?;
        if block.state != BlockState::Allocated {
            return Err(TraceError::UseAfterFree { id });
        }
        match block.refcount.as_mut() {
            Some(count) => {
                *count += 1;
                Ok(*count)
            }
            None => Err(TraceError::RefcountOnRaw { id }),
        }
    }

    /// Decrement a shared block's refcount, returning the new count.
    /// The caller frees the block when this reaches zero; decrementing a
    /// count that is already zero is a malformed input sequence.
    pub fn decrement(&mut self, id: BlockId) -> Result<u32, TraceError> {
        let block = self.block_mut(id)?;
        match block.refcount.as_mut() {
            Some(0) => Err(TraceError::RefcountUnderflow { id }),
            Some(count) => {
                *count -= 1;
                Ok(*count)
            }
            None => Err(TraceError::RefcountOnRaw { id }),
        }
    }

    /// All block ids in ascending order
    pub fn ids(&self) -> Vec<BlockId> {
        let mut ids: Vec<BlockId> = self.blocks.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// All blocks, keyed by id (includes freed and leaked tombstones)
    pub fn blocks(&self) -> &FxHashMap<BlockId, HeapBlock> {
        &self.blocks
    }

    /// Read-only dump of the currently allocated blocks, ascending by id.
    /// Serves external heap-dump consumers without mutating state.
    pub fn snapshot(&self) -> Vec<BlockRecord> {
        let mut records: Vec<BlockRecord> = self
            .blocks
            .values()
            .filter(|b| b.is_allocated())
            .map(|b| BlockRecord {
                id: b.id,
                size: b.size,
                label: b.label.clone(),
            })
            .collect();
        records.sort_unstable_by_key(|r| r.id);
        records
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}
