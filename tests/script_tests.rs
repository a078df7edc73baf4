// End-to-end tests: trace scripts in, canonical traces and heap dumps out

use memtrace::script;
use memtrace::snapshot::{HeapDump, HeapDumper};
use memtrace::trace::{self, Event};
use memtrace::tracer::engine::Tracer;
use std::fs;
use std::path::{Path, PathBuf};

fn replay_file(path: &str) -> Vec<Event> {
    let source = fs::read_to_string(Path::new(path)).expect("failed to read demo script");
    let steps = script::parse_script(&source).expect("script parse failed");

    let mut tracer = Tracer::new();
    script::run_script(&mut tracer, &steps, None).expect("replay failed");
    tracer.finish().expect("finish failed");
    tracer.drain()
}

#[test]
fn test_heap_demo_trace_text() {
    let events = replay_file("demos/heap.trace");
    assert_eq!(
        trace::to_text(&events),
        "\
@label name=heap
@alloc id=H1 label=\"a→char[100]\" size=100
@bind_ptr name=a id=H1
@push name=a val=\"<heap H1>\"
@alloc id=H2 label=\"b→int[100]\" size=400
@bind_ptr name=b id=H2
@push name=b val=\"<heap H2>\"
@push name=c val=\"[b]\"
@free id=H1
@pop_stack
@pop_stack
@leak id=H2
@pop_stack
"
    );
}

#[test]
fn test_cycle_demo_trace_text() {
    let events = replay_file("demos/cycle.trace");
    assert_eq!(
        trace::to_text(&events),
        "\
@label name=shared_ptr_cycle
@sp_alloc id=H1 label=\"[a]→Node\" size=32
@bind_ptr name=a id=H1
@push name=a val=\"<heap H1>\"
@sp_alloc id=H2 label=\"[b]→Node\" size=32
@bind_ptr name=b id=H2
@push name=b val=\"<heap H2>\"
@sp_inc id=H2
@sp_inc id=H1
@pop_stack
@sp_dec id=H2
@pop_stack
@sp_dec id=H1
@leak id=H1 cycle=true
@leak id=H2 cycle=true
"
    );
}

#[test]
fn test_cycle_fix_demo_trace_text() {
    let events = replay_file("demos/shared_cycle_fix.trace");
    assert_eq!(
        trace::to_text(&events),
        "\
@label name=shared_ptr_cycle
@sp_alloc id=H1 label=\"[a]→Node\" size=32
@bind_ptr name=a id=H1
@push name=a val=\"<heap H1>\"
@sp_alloc id=H2 label=\"[b]→Node\" size=32
@bind_ptr name=b id=H2
@push name=b val=\"<heap H2>\"
@sp_inc id=H2
@pop_stack
@sp_dec id=H2
@pop_stack
@sp_dec id=H1
@free id=H1
@sp_dec id=H2
@free id=H2
"
    );
}

#[test]
fn test_smart_ptr_demo_ends_clean_except_raw_leak() {
    let events = replay_file("demos/smart_ptr.trace");
    let leaks: Vec<&Event> = events
        .iter()
        .filter(|e| matches!(e, Event::Leak { .. }))
        .collect();
    assert_eq!(
        leaks,
        vec![&Event::Leak {
            id: 2,
            cycle: false
        }]
    );
    // Both shared handles freed by their last decrement
    assert!(events.contains(&Event::Free { id: 3 }));
    assert!(events.contains(&Event::Free { id: 4 }));
}

#[test]
fn test_recurse_demo_pops_both_frames() {
    let events = replay_file("demos/recurse.trace");
    assert!(events.contains(&Event::Call {
        target: "recurse".to_string(),
        arg: "n-1".to_string()
    }));
    assert!(events.contains(&Event::Unwind));
    // Each frame held five bindings
    assert_eq!(
        events.iter().filter(|e| matches!(e, Event::PopStack)).count(),
        10
    );
    // Unfreed raw blocks from both frames leaked
    assert_eq!(
        events.iter().filter(|e| matches!(e, Event::Leak { .. })).count(),
        3
    );
}

#[test]
fn test_bulk_alloc_demo_writes_heap_dumps() {
    let dir = temp_dir("bulk-dumps");
    let source = fs::read_to_string("demos/bulk_alloc.trace").unwrap();
    let steps = script::parse_script(&source).unwrap();

    let mut tracer = Tracer::new();
    let mut dumper = HeapDumper::new(&dir);
    script::run_script(&mut tracer, &steps, Some(&mut dumper)).expect("replay failed");
    tracer.finish().unwrap();

    let first: HeapDump =
        serde_json::from_str(&fs::read_to_string(dir.join("heapdump.0.json")).unwrap()).unwrap();
    assert_eq!(first.seq, 0);
    assert_eq!(first.blocks.len(), 1);
    assert_eq!(first.blocks[0].label, "page[4096]");

    let second: HeapDump =
        serde_json::from_str(&fs::read_to_string(dir.join("heapdump.1.json")).unwrap()).unwrap();
    assert_eq!(second.blocks.len(), 2);

    // After the free, only the second page is live
    let third: HeapDump =
        serde_json::from_str(&fs::read_to_string(dir.join("heapdump.2.json")).unwrap()).unwrap();
    assert_eq!(third.blocks.len(), 1);
    assert_eq!(third.blocks[0].id, 2);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_dump_without_dumper_is_an_error() {
    let steps = script::parse_script("label name=f\ndump\n").unwrap();
    let mut tracer = Tracer::new();
    let err = script::run_script(&mut tracer, &steps, None).unwrap_err();
    assert_eq!(err.line, 2);
    assert!(err.message.contains("no dump directory"));
}

#[test]
fn test_declared_alloc_id_mismatch_is_rejected() {
    let steps = script::parse_script("label name=f\nalloc id=H5 name=a size=8\n").unwrap();
    let mut tracer = Tracer::new();
    let err = script::run_script(&mut tracer, &steps, None).unwrap_err();
    assert_eq!(err.line, 2);
    assert!(err.message.contains("allocation id mismatch"));
}

#[test]
fn test_directive_error_reports_script_line() {
    let steps =
        script::parse_script("label name=f\nalloc id=H1 name=a size=8\nfree id=H1\nfree id=H1\n")
            .unwrap();
    let mut tracer = Tracer::new();
    let err = script::run_script(&mut tracer, &steps, None).unwrap_err();
    assert_eq!(err.line, 4);
    assert!(err.message.contains("Double free"));
}

#[test]
fn test_event_json_rendering() {
    let event = Event::Alloc {
        id: 1,
        label: "a→char[100]".to_string(),
        size: 100,
    };
    assert_eq!(
        serde_json::to_value(&event).unwrap(),
        serde_json::json!({"kind": "alloc", "id": 1, "label": "a→char[100]", "size": 100})
    );

    let event = Event::Leak { id: 2, cycle: true };
    assert_eq!(
        serde_json::to_value(&event).unwrap(),
        serde_json::json!({"kind": "leak", "id": 2, "cycle": true})
    );

    // A bare return omits the func field entirely
    let event = Event::Ret { func: None };
    assert_eq!(
        serde_json::to_value(&event).unwrap(),
        serde_json::json!({"kind": "ret"})
    );
}

fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("memtrace-{}-{}", tag, std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}
