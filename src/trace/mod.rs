#![allow(dead_code)] // Complete API module, not all methods currently used
//! Trace emitter
//!
//! This module defines the tracer's sole externally observable output:
//! - [`Event`]: one state mutation, with kind-specific fields fixed per
//!   kind (the wire format)
//! - [`Trace`]: an append-only ordered log with a read-once [`Trace::drain`]
//!
//! # Orderings
//!
//! Events are appended in the exact order operations are applied; there
//! is no reordering or batching across operations. Trace-equality tests
//! compare drained event sequences directly.
//!
//! # Renderings
//!
//! Each event renders two ways: the `@directive` text form via `Display`
//! (`@alloc id=H1 label="a→char[100]" size=100`) and JSON via serde, with
//! the kind as a `kind` tag.

use crate::memory::value::{block_tag, BlockId};
use serde::Serialize;
use std::fmt;

/// One emitted trace event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Alloc {
        id: BlockId,
        label: String,
        size: usize,
    },
    SpAlloc {
        id: BlockId,
        label: String,
        size: usize,
    },
    Free {
        id: BlockId,
    },
    Leak {
        id: BlockId,
        cycle: bool,
    },
    SpInc {
        id: BlockId,
    },
    SpDec {
        id: BlockId,
    },
    Push {
        name: String,
        val: String,
    },
    PopStack,
    BindPtr {
        name: String,
        id: BlockId,
    },
    UpdateStack {
        name: String,
        val: String,
    },
    Call {
        target: String,
        arg: String,
    },
    Ret {
        #[serde(skip_serializing_if = "Option::is_none")]
        func: Option<String>,
    },
    Unwind,
    Label {
        name: String,
    },
}

/// Quote a `val=` token unless it reads as a number or a bare word
fn quote_val(s: &str) -> String {
    let numeric = s.parse::<i64>().is_ok() || s.parse::<f64>().is_ok();
    let bare = !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if numeric || bare {
        s.to_string()
    } else {
        format!("\"{}\"", s)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Alloc { id, label, size } => {
                write!(f, "@alloc id={} label=\"{}\" size={}", block_tag(*id), label, size)
            }
            Event::SpAlloc { id, label, size } => {
                write!(f, "@sp_alloc id={} label=\"{}\" size={}", block_tag(*id), label, size)
            }
            Event::Free { id } => write!(f, "@free id={}", block_tag(*id)),
            Event::Leak { id, cycle } => {
                if *cycle {
                    write!(f, "@leak id={} cycle=true", block_tag(*id))
                } else {
                    write!(f, "@leak id={}", block_tag(*id))
                }
            }
            Event::SpInc { id } => write!(f, "@sp_inc id={}", block_tag(*id)),
            Event::SpDec { id } => write!(f, "@sp_dec id={}", block_tag(*id)),
            Event::Push { name, val } => {
                write!(f, "@push name={} val={}", name, quote_val(val))
            }
            Event::PopStack => write!(f, "@pop_stack"),
            Event::BindPtr { name, id } => {
                write!(f, "@bind_ptr name={} id={}", name, block_tag(*id))
            }
            Event::UpdateStack { name, val } => {
                write!(f, "@update_stack name={} val={}", name, quote_val(val))
            }
            Event::Call { target, arg } => {
                write!(f, "@call target={} arg=\"{}\"", target, arg)
            }
            Event::Ret { func } => match func {
                Some(func) => write!(f, "@ret func={}", func),
                None => write!(f, "@ret"),
            },
            Event::Unwind => write!(f, "@unwind"),
            Event::Label { name } => write!(f, "@label name={}", name),
        }
    }
}

/// Append-only ordered event log
#[derive(Debug, Default)]
pub struct Trace {
    events: Vec<Event>,
}

impl Trace {
    pub fn new() -> Self {
        Trace { events: Vec::new() }
    }

    /// Append one event (tracer-internal)
    pub(crate) fn record(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Consume every event recorded so far. Re-draining yields an empty
    /// sequence; callers needing replay must capture the result.
    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Number of events currently buffered
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Render a drained event sequence as trace text, one `@` line per event
pub fn to_text(events: &[Event]) -> String {
    let mut out = String::new();
    for event in events {
        out.push_str(&event.to_string());
        out.push('\n');
    }
    out
}
