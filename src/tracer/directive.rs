//! Driver directive contract
//!
//! A [`Directive`] is the atomic unit of tracer input: one program-level
//! memory event supplied by an external instrumentation pass. The tracer
//! applies each directive fully (including cascades) before accepting the
//! next one; a rejected directive mutates nothing.

use crate::memory::heap::Ownership;
use crate::memory::value::{BlockId, Value};
use crate::memory::RefKind;

/// One program-level memory event
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Enter a named scope: pushes a frame and emits `Label`
    Label { name: String },

    /// Call a function: emits `Call`, then pushes the callee frame
    Call { target: String, arg: String },

    /// Return from the current frame: emits `Ret`, then pops with the
    /// full destruction cascade
    Ret { func: Option<String> },

    /// Leave the current scope: pops the top frame (cascade only)
    ExitScope,

    /// Abnormal termination: emits `Unwind`, pops every live frame in
    /// LIFO order, and runs the final leak sweep
    Unwind,

    /// Bind a scalar in the current frame
    Push { name: String, val: Value },

    /// Bind `name` as an alias of the binding `source` (`c = b`).
    /// `kind` overrides the inherited reference kind; a `Shared` alias
    /// increments the target block.
    PushAlias {
        name: String,
        source: String,
        kind: Option<RefKind>,
    },

    /// Allocate a heap block and bind `name` to it
    Alloc {
        name: String,
        label: String,
        size: usize,
        kind: Ownership,
    },

    /// Explicitly deallocate a raw block
    Free { id: BlockId },

    /// Increment a shared block's refcount
    IncRef { id: BlockId },

    /// Decrement a shared block's refcount; at zero the block is freed
    /// and its own references cascade
    DecRef { id: BlockId },

    /// Install a cross-block reference (`a->next = b`): a field binding
    /// on `owner`'s block pointing at `target`'s block
    BindField {
        owner: String,
        field: String,
        target: String,
        kind: RefKind,
    },

    /// Mutate an existing binding's scalar value; ownership unaffected
    Update { name: String, val: Value },
}
