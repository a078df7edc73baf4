//! Trace-script front end
//!
//! This module is the *driver*, not the tracer: it parses a line-oriented
//! textual form of the directive stream and feeds it into a
//! [`Tracer`](crate::tracer::engine::Tracer) one directive at a time.
//!
//! # Grammar
//!
//! One directive per line: a keyword followed by `key=value` tokens.
//! Values with spaces are double-quoted. Blank lines and `#` comments are
//! skipped, and a leading `@` on the keyword is accepted so annotation
//! lines can be pasted verbatim.
//!
//! ```text
//! label name=main
//! push name=p val=10
//! alloc id=H1 name=a label="a→char[100]" size=100
//! sp_alloc id=H3 name=c label="[c]→int[100]" size=400
//! alias name=d source=c
//! bind_field owner=a field=next target=b kind=shared
//! free id=H1
//! update name=s val=50
//! exit_scope
//! ```
//!
//! Block ids are written `H<n>`. An `alloc`/`sp_alloc` line may carry an
//! `id=` token for readability; the replay loop verifies it against the
//! id the tracer actually assigns.
//!
//! The extra keyword `dump [path=...]` is a driver action: it calls the
//! read-only heap snapshot query and writes a sequence-numbered JSON
//! heap dump.

use crate::memory::heap::Ownership;
use crate::memory::value::{BlockId, Value};
use crate::memory::RefKind;
use crate::snapshot::HeapDumper;
use crate::tracer::directive::Directive;
use crate::tracer::engine::Tracer;
use std::fmt;

/// A script parse or replay failure, tagged with its source line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ScriptError {}

/// One parsed script line
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub line: usize,
    pub command: Command,
    /// The `id=` token on an `alloc` line, checked against the id the
    /// tracer assigns
    pub declared_id: Option<BlockId>,
}

/// What a script line asks for
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Apply(Directive),
    Dump { path: Option<String> },
}

#[derive(Debug)]
struct RawToken {
    text: String,
    quoted: bool,
}

fn tokenize(line: &str) -> Result<Vec<RawToken>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(RawToken {
                        text: std::mem::take(&mut current),
                        quoted,
                    });
                    quoted = false;
                }
            }
            c => current.push(c),
        }
    }
    if in_quotes {
        return Err("unterminated quote".to_string());
    }
    if !current.is_empty() {
        tokens.push(RawToken {
            text: current,
            quoted,
        });
    }
    Ok(tokens)
}

/// `key=value` pairs pulled off a tokenized line
struct Pairs(Vec<(String, String, bool)>);

impl Pairs {
    fn from_tokens(tokens: Vec<RawToken>) -> Result<Self, String> {
        let mut pairs = Vec::new();
        for token in tokens {
            match token.text.split_once('=') {
                Some((key, value)) => {
                    pairs.push((key.to_string(), value.to_string(), token.quoted))
                }
                None => return Err(format!("expected key=value, got '{}'", token.text)),
            }
        }
        Ok(Pairs(pairs))
    }

    fn take(&mut self, key: &str) -> Option<(String, bool)> {
        let pos = self.0.iter().position(|(k, _, _)| k == key)?;
        let (_, value, quoted) = self.0.remove(pos);
        Some((value, quoted))
    }

    fn require(&mut self, key: &str) -> Result<String, String> {
        self.take(key)
            .map(|(value, _)| value)
            .ok_or_else(|| format!("missing required key '{}'", key))
    }

    fn finish(self) -> Result<(), String> {
        match self.0.first() {
            Some((key, _, _)) => Err(format!("unexpected key '{}'", key)),
            None => Ok(()),
        }
    }
}

fn parse_block_id(s: &str) -> Result<BlockId, String> {
    let digits = s.strip_prefix('H').unwrap_or(s);
    digits
        .parse::<BlockId>()
        .map_err(|_| format!("invalid block id '{}'", s))
}

fn parse_refkind(s: &str) -> Result<RefKind, String> {
    match s {
        "raw" => Ok(RefKind::Raw),
        "shared" => Ok(RefKind::Shared),
        "weak" => Ok(RefKind::Weak),
        _ => Err(format!("invalid reference kind '{}'", s)),
    }
}

fn parse_size(s: &str) -> Result<usize, String> {
    s.parse::<usize>()
        .map_err(|_| format!("invalid size '{}'", s))
}

fn parse_value(text: String, was_quoted: bool) -> Value {
    if !was_quoted {
        if let Ok(n) = text.parse::<i64>() {
            return Value::Int(n);
        }
        if let Ok(x) = text.parse::<f64>() {
            return Value::Float(x);
        }
    }
    Value::Sym(text)
}

fn parse_line(line: &str) -> Result<Option<(Command, Option<BlockId>)>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let mut tokens = tokenize(trimmed)?;
    if tokens.is_empty() {
        return Ok(None);
    }
    let keyword = tokens.remove(0).text;
    let keyword = keyword.trim_start_matches('@');
    let mut pairs = Pairs::from_tokens(tokens)?;

    let mut declared_id = None;
    let command = match keyword {
        "label" => Command::Apply(Directive::Label {
            name: pairs.require("name")?,
        }),
        "call" => Command::Apply(Directive::Call {
            target: pairs.require("target")?,
            arg: pairs.take("arg").map(|(v, _)| v).unwrap_or_default(),
        }),
        "ret" => Command::Apply(Directive::Ret {
            func: pairs.take("func").map(|(v, _)| v),
        }),
        "unwind" => Command::Apply(Directive::Unwind),
        "exit_scope" => Command::Apply(Directive::ExitScope),
        "push" => {
            let name = pairs.require("name")?;
            let (val, quoted) = pairs
                .take("val")
                .ok_or_else(|| "missing required key 'val'".to_string())?;
            Command::Apply(Directive::Push {
                name,
                val: parse_value(val, quoted),
            })
        }
        "alias" => Command::Apply(Directive::PushAlias {
            name: pairs.require("name")?,
            source: pairs.require("source")?,
            kind: pairs
                .take("kind")
                .map(|(v, _)| parse_refkind(&v))
                .transpose()?,
        }),
        "alloc" | "sp_alloc" => {
            declared_id = pairs
                .take("id")
                .map(|(v, _)| parse_block_id(&v))
                .transpose()?;
            let kind = match keyword {
                "sp_alloc" => Ownership::Shared,
                _ => match pairs.take("kind") {
                    Some((v, _)) if v == "shared" => Ownership::Shared,
                    Some((v, _)) if v == "raw" => Ownership::Raw,
                    Some((v, _)) => return Err(format!("invalid ownership kind '{}'", v)),
                    None => Ownership::Raw,
                },
            };
            Command::Apply(Directive::Alloc {
                name: pairs.require("name")?,
                label: pairs.take("label").map(|(v, _)| v).unwrap_or_default(),
                size: pairs.take("size").map(|(v, _)| parse_size(&v)).transpose()?.unwrap_or(0),
                kind,
            })
        }
        "free" => Command::Apply(Directive::Free {
            id: parse_block_id(&pairs.require("id")?)?,
        }),
        "sp_inc" => Command::Apply(Directive::IncRef {
            id: parse_block_id(&pairs.require("id")?)?,
        }),
        "sp_dec" => Command::Apply(Directive::DecRef {
            id: parse_block_id(&pairs.require("id")?)?,
        }),
        "bind_field" => Command::Apply(Directive::BindField {
            owner: pairs.require("owner")?,
            field: pairs.require("field")?,
            target: pairs.require("target")?,
            kind: match pairs.take("kind") {
                Some((v, _)) => parse_refkind(&v)?,
                None => RefKind::Shared,
            },
        }),
        "update" => {
            let name = pairs.require("name")?;
            let (val, quoted) = pairs
                .take("val")
                .ok_or_else(|| "missing required key 'val'".to_string())?;
            Command::Apply(Directive::Update {
                name,
                val: parse_value(val, quoted),
            })
        }
        "dump" => Command::Dump {
            path: pairs.take("path").map(|(v, _)| v),
        },
        _ => return Err(format!("unknown directive '{}'", keyword)),
    };

    pairs.finish()?;
    Ok(Some((command, declared_id)))
}

/// Parse a whole script into replayable steps
pub fn parse_script(src: &str) -> Result<Vec<Step>, ScriptError> {
    let mut steps = Vec::new();
    for (index, line) in src.lines().enumerate() {
        let line_no = index + 1;
        match parse_line(line) {
            Ok(Some((command, declared_id))) => steps.push(Step {
                line: line_no,
                command,
                declared_id,
            }),
            Ok(None) => {}
            Err(message) => {
                return Err(ScriptError {
                    line: line_no,
                    message,
                })
            }
        }
    }
    Ok(steps)
}

/// Replay parsed steps against a tracer. Directive errors abort with the
/// offending line; the rejected directive leaves the tracer unchanged.
pub fn run_script(
    tracer: &mut Tracer,
    steps: &[Step],
    mut dumper: Option<&mut HeapDumper>,
) -> Result<(), ScriptError> {
    for step in steps {
        match &step.command {
            Command::Apply(directive) => {
                if let (Some(declared), Directive::Alloc { .. }) = (step.declared_id, directive) {
                    let next = tracer.heap().next_id();
                    if declared != next {
                        return Err(ScriptError {
                            line: step.line,
                            message: format!(
                                "allocation id mismatch: script says H{}, tracer assigns H{}",
                                declared, next
                            ),
                        });
                    }
                }
                tracer.apply(directive.clone()).map_err(|e| ScriptError {
                    line: step.line,
                    message: e.to_string(),
                })?;
            }
            Command::Dump { path } => {
                let dumper = dumper.as_deref_mut().ok_or_else(|| ScriptError {
                    line: step.line,
                    message: "dump requested but no dump directory configured".to_string(),
                })?;
                let result = match path {
                    Some(path) => dumper.dump_to(path, tracer.heap()),
                    None => dumper.dump(tracer.heap()).map(|_| ()),
                };
                result.map_err(|e| ScriptError {
                    line: step.line,
                    message: format!("heap dump failed: {}", e),
                })?;
            }
        }
    }
    Ok(())
}
