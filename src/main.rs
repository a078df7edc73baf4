// memtrace: deterministic stack/heap memory-lifecycle tracer

mod memory;
mod script;
mod snapshot;
mod trace;
mod tracer;

use std::fs;
use std::path::Path;
use std::process;

use snapshot::HeapDumper;
use tracer::engine::Tracer;

fn usage(program_name: &str) {
    eprintln!("Usage: {} <script.trace> [--json] [--dump-dir <dir>]", program_name);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --json            Print the trace as a JSON array instead of @ lines");
    eprintln!("  --dump-dir <dir>  Directory for heap dumps requested by 'dump' lines");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} demos/smart_ptr.trace", program_name);
    eprintln!("  {} demos/cycle.trace --json", program_name);
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let program_name = args.first().map(|s| s.as_str()).unwrap_or("memtrace");

    let mut script_path: Option<String> = None;
    let mut json = false;
    let mut dump_dir: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--json" => json = true,
            "--dump-dir" => {
                i += 1;
                match args.get(i) {
                    Some(dir) => dump_dir = Some(dir.clone()),
                    None => {
                        eprintln!("Error: --dump-dir requires a directory");
                        process::exit(1);
                    }
                }
            }
            arg if arg.starts_with("--") => {
                eprintln!("Error: unknown option '{}'", arg);
                usage(program_name);
                process::exit(1);
            }
            arg => {
                if script_path.replace(arg.to_string()).is_some() {
                    eprintln!("Error: more than one script file given");
                    process::exit(1);
                }
            }
        }
        i += 1;
    }

    let script_path = match script_path {
        Some(path) => path,
        None => {
            eprintln!("Error: no trace script provided");
            eprintln!();
            usage(program_name);
            process::exit(1);
        }
    };

    if !Path::new(&script_path).exists() {
        eprintln!("Error: file '{}' not found", script_path);
        process::exit(1);
    }

    let source = fs::read_to_string(&script_path)?;
    let steps = match script::parse_script(&source) {
        Ok(steps) => steps,
        Err(e) => {
            eprintln!("Script error in {}: {}", script_path, e);
            process::exit(1);
        }
    };

    let mut tracer = Tracer::new();
    let mut dumper = dump_dir.map(HeapDumper::new);

    if let Err(e) = script::run_script(&mut tracer, &steps, dumper.as_mut()) {
        eprintln!("Trace error in {}: {}", script_path, e);
        process::exit(1);
    }
    if let Err(e) = tracer.finish() {
        eprintln!("Trace error in {}: {}", script_path, e);
        process::exit(1);
    }

    let events = tracer.drain();
    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
    } else {
        print!("{}", trace::to_text(&events));
    }

    Ok(())
}
