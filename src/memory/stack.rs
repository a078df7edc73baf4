#![allow(dead_code)] // Complete API module, not all methods currently used
//! Call stack model
//!
//! This module provides the stack side of the tracer:
//! - [`Stack`]: the LIFO frame stack
//! - [`StackFrame`]: a single scope's activation record
//! - [`LocalBinding`]: a named value with an optional heap target
//!
//! # Destruction Ordering
//!
//! Bindings are stored in declaration order and only ever destroyed by
//! popping their owning frame, in reverse declaration order. The engine
//! removes bindings one at a time with [`StackFrame::pop_binding`] so
//! that bindings not yet destroyed still count as live references while
//! earlier ones are released.

use super::value::{BlockId, Value};
use super::RefKind;
use crate::tracer::errors::TraceError;

/// A named local binding in a frame
#[derive(Debug, Clone)]
pub struct LocalBinding {
    pub name: String,
    pub value: Value,
    pub target: Option<BlockId>,
    pub kind: RefKind, // Meaningful only when target is set
}

impl LocalBinding {
    /// A plain scalar binding with no heap target
    pub fn scalar(name: String, value: Value) -> Self {
        LocalBinding {
            name,
            value,
            target: None,
            kind: RefKind::Raw,
        }
    }

    /// A binding referencing a heap block
    pub fn pointer(name: String, value: Value, target: BlockId, kind: RefKind) -> Self {
        LocalBinding {
            name,
            value,
            target: Some(target),
            kind,
        }
    }
}

/// Stack frame for one scope or function call
#[derive(Debug, Clone)]
pub struct StackFrame {
    pub name: String,
    bindings: Vec<LocalBinding>, // Declaration order
}

impl StackFrame {
    pub fn new(name: String) -> Self {
        StackFrame {
            name,
            bindings: Vec::new(),
        }
    }

    /// Append a binding; names are unique within a frame
    pub fn bind(&mut self, binding: LocalBinding) -> Result<(), TraceError> {
        if self.get(&binding.name).is_some() {
            return Err(TraceError::DuplicateBinding {
                frame: self.name.clone(),
                name: binding.name,
            });
        }
        self.bindings.push(binding);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&LocalBinding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut LocalBinding> {
        self.bindings.iter_mut().find(|b| b.name == name)
    }

    /// Bindings in declaration order
    pub fn bindings(&self) -> &[LocalBinding] {
        &self.bindings
    }

    /// Remove and return the most recently declared binding
    pub fn pop_binding(&mut self) -> Option<LocalBinding> {
        self.bindings.pop()
    }
}

/// The call stack
#[derive(Debug, Clone)]
pub struct Stack {
    frames: Vec<StackFrame>,
}

impl Stack {
    pub fn new() -> Self {
        Stack { frames: Vec::new() }
    }

    /// Push a new frame for a scope or call
    pub fn push_frame(&mut self, name: String) {
        self.frames.push(StackFrame::new(name));
    }

    /// Pop the top frame
    pub fn pop_frame(&mut self) -> Option<StackFrame> {
        self.frames.pop()
    }

    /// The currently executing (top) frame
    pub fn current_frame(&self) -> Option<&StackFrame> {
        self.frames.last()
    }

    pub fn current_frame_mut(&mut self) -> Option<&mut StackFrame> {
        self.frames.last_mut()
    }

    /// All live frames, outermost first
    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Find a binding by name, searching innermost frame outward
    pub fn lookup(&self, name: &str) -> Option<&LocalBinding> {
        self.frames.iter().rev().find_map(|f| f.get(name))
    }

    /// Find a binding by name, mutably, innermost frame outward
    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut LocalBinding> {
        self.frames.iter_mut().rev().find_map(|f| f.get_mut(name))
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}
