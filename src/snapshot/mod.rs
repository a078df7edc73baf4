#![allow(dead_code)] // Complete API module, not all methods currently used
// Heap-dump export for external allocator cross-checks

use crate::memory::heap::{BlockRecord, Heap};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// One serialized heap dump: the allocated blocks at a point in time,
/// keyed by an incrementing sequence number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeapDump {
    pub seq: u64,
    pub blocks: Vec<BlockRecord>,
}

/// Writes sequence-numbered heap dumps (`heapdump.<seq>.json`) into a
/// target directory, the shape a bulk allocator requests periodically
#[derive(Debug)]
pub struct HeapDumper {
    dir: PathBuf,
    seq: u64,
}

impl HeapDumper {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        HeapDumper {
            dir: dir.into(),
            seq: 0,
        }
    }

    /// Dump the currently allocated blocks to the next numbered file,
    /// returning its path
    pub fn dump(&mut self, heap: &Heap) -> io::Result<PathBuf> {
        let path = self.dir.join(format!("heapdump.{}.json", self.seq));
        self.dump_to(&path, heap)?;
        Ok(path)
    }

    /// Dump to an explicit path, still consuming a sequence number
    pub fn dump_to(&mut self, path: impl AsRef<Path>, heap: &Heap) -> io::Result<()> {
        let dump = HeapDump {
            seq: self.seq,
            blocks: heap.snapshot(),
        };
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, &dump)?;
        self.seq += 1;
        Ok(())
    }

    /// Sequence number the next dump will use
    pub fn next_seq(&self) -> u64 {
        self.seq
    }
}
