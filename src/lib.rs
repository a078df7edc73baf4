//! # Introduction
//!
//! memtrace replays a stream of program-level memory directives
//! (variable bindings, allocations, frees, refcount changes, scope entry
//! and exit) against an exact model of stack and heap state, and emits
//! the canonical event trace, including leak and reference-cycle
//! detection at scope-exit and program-exit boundaries.
//!
//! ## Trace pipeline
//!
//! ```text
//! Script → Directives → Tracer → Events → @trace text / JSON / heap dumps
//! ```
//!
//! 1. [`script`] — driver front end: parses a line-oriented trace script
//!    and feeds the tracer one directive at a time.
//! 2. [`tracer`] — the deterministic state machine: applies each
//!    [`tracer::directive::Directive`], cascades refcount changes and
//!    automatic frees, and classifies leaks and cycles.
//! 3. [`memory`] — the in-process memory model: a
//!    [`memory::heap::Heap`] block table with lifecycle states and a
//!    virtual [`memory::stack::Stack`] of ordered bindings.
//! 4. [`trace`] — append-only event log with a read-once drain; events
//!    render as `@directive` text or JSON.
//! 5. [`snapshot`] — sequence-numbered heap-dump export for external
//!    allocator cross-checks.
//!
//! ## Modeled memory events
//!
//! Ownership kinds: raw (`new`/`delete`), shared (refcounted), weak
//! (non-owning). Scope exit destroys bindings in reverse declaration
//! order; the last shared decrement frees its block; raw blocks that
//! lose their last owner without a free are classified leaked, and the
//! final sweep flags refcount cycles that no stack root can reach.

pub mod memory;
pub mod script;
pub mod snapshot;
pub mod trace;
pub mod tracer;
