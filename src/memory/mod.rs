//! Memory model for the lifecycle tracer
//!
//! This module provides the core memory abstractions:
//! - [`value`]: symbolic runtime values (scalars, heap references, aliases)
//! - [`stack`]: call stack with frames and ordered local bindings
//! - [`heap`]: heap block table with lifecycle states and reference counts
//!
//! # Ownership Model
//!
//! Every reference to a heap block carries a [`RefKind`]:
//! - `Raw`: owning-exclusive unless aliased; destroyed without a `free`
//!   it leaves the block behind as a leak candidate
//! - `Shared`: contributes +1 to the target's refcount while alive;
//!   the last decrement frees the block
//! - `Weak`: never contributes to the refcount and never keeps a block
//!   alive; once the target is freed the reference is simply dangling
//!
//! Cross-block references (one block's field pointing at another block)
//! use the same kinds, held in a field table scoped to the owning block
//! rather than to a stack frame.

pub mod heap;
pub mod stack;
pub mod value;

/// Reference kind of a binding (stack local or heap block field)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Raw,
    Shared,
    Weak,
}

impl RefKind {
    /// Whether references of this kind keep their target reachable
    pub fn is_owning(&self) -> bool {
        !matches!(self, RefKind::Weak)
    }
}
