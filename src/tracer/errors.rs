//! Error types for the tracer
//!
//! This module defines [`TraceError`], which represents every way a
//! directive can be rejected. All variants are local invariant violations
//! raised at the point of detection; the offending directive leaves the
//! tracer state unchanged.
//!
//! Leak and cycle classification are *not* errors: they are terminal,
//! expected states of the model, reported through the event stream.

use crate::memory::value::{block_tag, BlockId};
use std::fmt;

/// Directive rejection reasons
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceError {
    /// A block was freed twice (or freed after being classified leaked)
    DoubleFree { id: BlockId },

    /// An operation referenced a freed or leaked block
    UseAfterFree { id: BlockId },

    /// A refcount was decremented below zero. Fatal: the input event
    /// sequence is malformed, this is not a modeled program bug.
    RefcountUnderflow { id: BlockId },

    /// A refcount operation targeted a raw-ownership block
    RefcountOnRaw { id: BlockId },

    /// A name collision within a single frame
    DuplicateBinding { frame: String, name: String },

    /// A binding references a block that no longer exists
    DanglingBinding { name: String, id: BlockId },

    /// A directive named a binding no live frame holds
    UnknownBinding { name: String },

    /// A directive referenced a block id that was never allocated
    UnknownBlock { id: BlockId },

    /// An alias or field source is bound to a scalar, not a block
    NotAPointer { name: String },

    /// Explicit `free` on a shared-ownership block; shared blocks are
    /// only deallocated by the refcount reaching zero
    InvalidFree { id: BlockId },

    /// A binding directive arrived with no live frame
    NoActiveFrame,
}

impl fmt::Display for TraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceError::DoubleFree { id } => {
                write!(f, "Double free detected on block {}", block_tag(*id))
            }
            TraceError::UseAfterFree { id } => {
                write!(f, "Use-after-free: block {} has been freed", block_tag(*id))
            }
            TraceError::RefcountUnderflow { id } => {
                write!(
                    f,
                    "Refcount underflow on block {}: decrement below zero (malformed input sequence)",
                    block_tag(*id)
                )
            }
            TraceError::RefcountOnRaw { id } => {
                write!(
                    f,
                    "Refcount operation on raw block {} (not shared-ownership)",
                    block_tag(*id)
                )
            }
            TraceError::DuplicateBinding { frame, name } => {
                write!(f, "Binding '{}' already exists in frame '{}'", name, frame)
            }
            TraceError::DanglingBinding { name, id } => {
                write!(
                    f,
                    "Binding '{}' references block {} which no longer exists",
                    name,
                    block_tag(*id)
                )
            }
            TraceError::UnknownBinding { name } => {
                write!(f, "Unknown binding '{}'", name)
            }
            TraceError::UnknownBlock { id } => {
                write!(f, "Block {} was never allocated", block_tag(*id))
            }
            TraceError::NotAPointer { name } => {
                write!(f, "Binding '{}' does not reference a heap block", name)
            }
            TraceError::InvalidFree { id } => {
                write!(
                    f,
                    "Explicit free of shared block {}; shared blocks are freed by their refcount",
                    block_tag(*id)
                )
            }
            TraceError::NoActiveFrame => {
                write!(f, "No active stack frame")
            }
        }
    }
}

impl std::error::Error for TraceError {}
