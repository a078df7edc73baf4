//! Tracer execution engine
//!
//! [`Tracer`] is the deterministic state machine at the core of the
//! crate: it owns the heap, the stack, and the trace log, applies one
//! [`Directive`] at a time, and fully cascades each directive's effects
//! (refcount changes, automatic frees, leak classification) before
//! returning.
//!
//! # Atomicity
//!
//! Every directive is validated before any state is mutated, so a
//! rejected directive leaves the tracer exactly as it was. The single
//! exception is a refcount underflow surfacing mid-cascade, which the
//! error taxonomy already treats as fatal input corruption.
//!
//! # Event Ordering
//!
//! The engine is the only writer of the trace log, and it emits events
//! in the exact order mutations are applied:
//! - an allocation binds in three events: `Alloc`/`SpAlloc`, `BindPtr`,
//!   `Push`
//! - a shared decrement emits `SpDec`, then `Free` when the count hits
//!   zero, then the freed block's own references cascade in field order
//! - a frame pop emits one `Pop` per binding in reverse declaration
//!   order, interleaved with whatever each destruction triggers

use crate::memory::heap::{FieldBinding, Heap, Ownership};
use crate::memory::stack::{LocalBinding, Stack};
use crate::memory::value::{BlockId, Value};
use crate::memory::RefKind;
use crate::trace::{Event, Trace};
use crate::tracer::detect;
use crate::tracer::directive::Directive;
use crate::tracer::errors::TraceError;

/// The memory-lifecycle tracer
#[derive(Debug, Default)]
pub struct Tracer {
    heap: Heap,
    stack: Stack,
    trace: Trace,
}

impl Tracer {
    pub fn new() -> Self {
        Tracer {
            heap: Heap::new(),
            stack: Stack::new(),
            trace: Trace::new(),
        }
    }

    /// The heap model (read-only; serves snapshot dumps)
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// The stack model (read-only)
    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    /// Consume the events emitted so far (read-once, see [`Trace::drain`])
    pub fn drain(&mut self) -> Vec<Event> {
        self.trace.drain()
    }

    /// Apply one directive, cascading all of its effects
    pub fn apply(&mut self, directive: Directive) -> Result<(), TraceError> {
        match directive {
            Directive::Label { name } => {
                self.stack.push_frame(name.clone());
                self.trace.record(Event::Label { name });
                Ok(())
            }
            Directive::Call { target, arg } => {
                self.trace.record(Event::Call {
                    target: target.clone(),
                    arg,
                });
                self.stack.push_frame(target);
                Ok(())
            }
            Directive::Ret { func } => {
                if self.stack.is_empty() {
                    return Err(TraceError::NoActiveFrame);
                }
                self.trace.record(Event::Ret { func });
                self.pop_current_frame()
            }
            Directive::ExitScope => self.pop_current_frame(),
            Directive::Unwind => {
                self.trace.record(Event::Unwind);
                self.finish()
            }
            Directive::Push { name, val } => self.push_scalar(name, val),
            Directive::PushAlias { name, source, kind } => self.push_alias(name, source, kind),
            Directive::Alloc {
                name,
                label,
                size,
                kind,
            } => self.alloc_binding(name, label, size, kind),
            Directive::Free { id } => self.explicit_free(id),
            Directive::IncRef { id } => {
                self.heap.increment(id)?;
                self.trace.record(Event::SpInc { id });
                Ok(())
            }
            Directive::DecRef { id } => self.dec_ref(id),
            Directive::BindField {
                owner,
                field,
                target,
                kind,
            } => self.bind_field(owner, field, target, kind),
            Directive::Update { name, val } => self.update(name, val),
        }
    }

    /// Drive the model to completion: pop every remaining frame in LIFO
    /// order, then run the final leak sweep. Abnormal termination takes
    /// the same path, so an early `Unwind` is handled identically to a
    /// normal exit. All block states are terminal afterwards, which
    /// makes a second call emit nothing.
    pub fn finish(&mut self) -> Result<(), TraceError> {
        while !self.stack.is_empty() {
            self.pop_current_frame()?;
        }
        detect::sweep(&mut self.heap, &self.stack, &mut self.trace)
    }

    fn push_scalar(&mut self, name: String, val: Value) -> Result<(), TraceError> {
        let rendered = val.render();
        let frame = self
            .stack
            .current_frame_mut()
            .ok_or(TraceError::NoActiveFrame)?;
        frame.bind(LocalBinding::scalar(name.clone(), val))?;
        self.trace.record(Event::Push {
            name,
            val: rendered,
        });
        Ok(())
    }

    fn push_alias(
        &mut self,
        name: String,
        source: String,
        kind: Option<RefKind>,
    ) -> Result<(), TraceError> {
        let frame = self.stack.current_frame().ok_or(TraceError::NoActiveFrame)?;
        if frame.get(&name).is_some() {
            return Err(TraceError::DuplicateBinding {
                frame: frame.name.clone(),
                name,
            });
        }

        let (target, inherited) = {
            let src = self
                .stack
                .lookup(&source)
                .ok_or_else(|| TraceError::UnknownBinding {
                    name: source.clone(),
                })?;
            (src.target, src.kind)
        };
        let kind = kind.unwrap_or(inherited);
        if kind != RefKind::Raw && target.is_none() {
            return Err(TraceError::NotAPointer { name: source });
        }

        // Copying a shared handle takes its count before the binding
        // appears on the stack: SpInc precedes the Push
        if kind == RefKind::Shared {
            if let Some(id) = target {
                self.heap.increment(id)?;
                self.trace.record(Event::SpInc { id });
            }
        }

        let value = Value::Alias(source);
        let rendered = value.render();
        let binding = match target {
            Some(id) => LocalBinding::pointer(name.clone(), value, id, kind),
            None => LocalBinding::scalar(name.clone(), value),
        };
        let frame = self
            .stack
            .current_frame_mut()
            .ok_or(TraceError::NoActiveFrame)?;
        frame.bind(binding)?;
        self.trace.record(Event::Push {
            name,
            val: rendered,
        });
        Ok(())
    }

    fn alloc_binding(
        &mut self,
        name: String,
        label: String,
        size: usize,
        kind: Ownership,
    ) -> Result<(), TraceError> {
        let frame = self.stack.current_frame().ok_or(TraceError::NoActiveFrame)?;
        if frame.get(&name).is_some() {
            return Err(TraceError::DuplicateBinding {
                frame: frame.name.clone(),
                name,
            });
        }

        let id = self.heap.allocate(size, label.clone(), kind);
        match kind {
            Ownership::Raw => self.trace.record(Event::Alloc { id, label, size }),
            Ownership::Shared => self.trace.record(Event::SpAlloc { id, label, size }),
        }
        self.trace.record(Event::BindPtr {
            name: name.clone(),
            id,
        });

        let refkind = match kind {
            Ownership::Raw => RefKind::Raw,
            Ownership::Shared => RefKind::Shared,
        };
        let value = Value::HeapRef(id);
        let rendered = value.render();
        let frame = self
            .stack
            .current_frame_mut()
            .ok_or(TraceError::NoActiveFrame)?;
        frame.bind(LocalBinding::pointer(name.clone(), value, id, refkind))?;
        self.trace.record(Event::Push {
            name,
            val: rendered,
        });
        Ok(())
    }

    fn explicit_free(&mut self, id: BlockId) -> Result<(), TraceError> {
        let block = self.heap.block(id)?;
        if block.ownership == Ownership::Shared {
            return Err(TraceError::InvalidFree { id });
        }
        if !block.is_allocated() {
            return Err(TraceError::DoubleFree { id });
        }

        let fields = self.heap.free(id)?;
        self.trace.record(Event::Free { id });
        self.release_fields(fields)
    }

    /// Decrement a shared block; at zero, free it and cascade through
    /// its field bindings
    fn dec_ref(&mut self, id: BlockId) -> Result<(), TraceError> {
        let remaining = self.heap.decrement(id)?;
        self.trace.record(Event::SpDec { id });
        if remaining == 0 {
            let fields = self.heap.free(id)?;
            self.trace.record(Event::Free { id });
            self.release_fields(fields)?;
        }
        Ok(())
    }

    /// Release the references a destroyed owner held, in field order
    fn release_fields(&mut self, fields: Vec<FieldBinding>) -> Result<(), TraceError> {
        for field in fields {
            match field.kind {
                RefKind::Shared => self.dec_ref(field.target)?,
                RefKind::Raw => self.reap_if_orphaned(field.target)?,
                RefKind::Weak => {}
            }
        }
        Ok(())
    }

    /// Classify a raw block leaked the moment its last owner disappears
    /// without a `free` (the "new without delete" pattern)
    fn reap_if_orphaned(&mut self, id: BlockId) -> Result<(), TraceError> {
        let block = self.heap.block(id)?;
        if block.is_allocated() && !detect::live_reference_exists(&self.heap, &self.stack, id) {
            self.heap.mark_leaked(id)?;
            self.trace.record(Event::Leak { id, cycle: false });
        }
        Ok(())
    }

    fn bind_field(
        &mut self,
        owner: String,
        field: String,
        target: String,
        kind: RefKind,
    ) -> Result<(), TraceError> {
        let owner_id = self.resolve_block(&owner)?;
        let target_id = self.resolve_block(&target)?;

        let owner_block = self
            .heap
            .block(owner_id)
            .map_err(|_| TraceError::DanglingBinding {
                name: owner.clone(),
                id: owner_id,
            })?;
        if !owner_block.is_allocated() {
            return Err(TraceError::UseAfterFree { id: owner_id });
        }
        self.heap
            .block(target_id)
            .map_err(|_| TraceError::DanglingBinding {
                name: target.clone(),
                id: target_id,
            })?;

        // New reference is taken before the displaced one is released
        if kind == RefKind::Shared {
            self.heap.increment(target_id)?;
            self.trace.record(Event::SpInc { id: target_id });
        }

        let displaced = self
            .heap
            .block_mut(owner_id)?
            .put_field(field, target_id, kind);
        if let Some(old) = displaced {
            if old.kind == RefKind::Shared {
                self.dec_ref(old.target)?;
            }
        }
        Ok(())
    }

    fn update(&mut self, name: String, val: Value) -> Result<(), TraceError> {
        let rendered = val.render();
        let binding = self
            .stack
            .lookup_mut(&name)
            .ok_or_else(|| TraceError::UnknownBinding { name: name.clone() })?;
        binding.value = val;
        self.trace.record(Event::UpdateStack {
            name,
            val: rendered,
        });
        Ok(())
    }

    /// Pop the top frame, destroying bindings in reverse declaration
    /// order. Bindings are removed one at a time while the frame is
    /// still on the stack, so bindings not yet destroyed still count as
    /// live references for the orphan check.
    fn pop_current_frame(&mut self) -> Result<(), TraceError> {
        if self.stack.is_empty() {
            return Err(TraceError::NoActiveFrame);
        }
        loop {
            let binding = match self.stack.current_frame_mut() {
                Some(frame) => frame.pop_binding(),
                None => return Err(TraceError::NoActiveFrame),
            };
            match binding {
                Some(binding) => {
                    self.trace.record(Event::PopStack);
                    self.release_binding(binding)?;
                }
                None => break,
            }
        }
        self.stack.pop_frame();
        Ok(())
    }

    fn release_binding(&mut self, binding: LocalBinding) -> Result<(), TraceError> {
        if let Some(id) = binding.target {
            match binding.kind {
                RefKind::Shared => self.dec_ref(id)?,
                RefKind::Raw => self.reap_if_orphaned(id)?,
                RefKind::Weak => {}
            }
        }
        Ok(())
    }

    fn resolve_block(&self, name: &str) -> Result<BlockId, TraceError> {
        let binding = self
            .stack
            .lookup(name)
            .ok_or_else(|| TraceError::UnknownBinding {
                name: name.to_string(),
            })?;
        binding.target.ok_or_else(|| TraceError::NotAPointer {
            name: name.to_string(),
        })
    }
}
