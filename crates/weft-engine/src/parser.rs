//! Block parser.
//!
//! Pure function from raw source text to an ordered list of typed
//! blocks. No store access, no I/O; the reconciler decides what the
//! parse means for existing state.
//!
//! # Source Syntax
//!
//! | Form | Meaning |
//! |------|---------|
//! | blank line(s) | block separator |
//! | `# …` | comment line, stripped before parsing |
//! | `!key=value` | global configuration, not a block |
//! | `/name` | opening label (block start) |
//! | `\name` | closing label |
//! | `?command text` | directive header |
//! | `key=value` | directive parameter line |
//! | `.` | inert directive terminator line |
//! | anything else | prose |

use std::collections::BTreeSet;
use tracing::warn;

use crate::components::ParamList;

/// What a parsed block is.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Prose {
        text: String,
    },
    Directive {
        command: String,
        instruction: String,
        parameters: ParamList,
    },
}

/// One block as returned by [`parse_source`], in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBlock {
    /// Block text with comment lines stripped, lines joined by `\n`.
    pub raw_text: String,
    pub kind: BlockKind,
    pub opening_labels: BTreeSet<String>,
    pub closing_labels: BTreeSet<String>,
}

/// A full parse: entity-bearing blocks plus `!key=value` declarations
/// in source order (later occurrences of a key override earlier ones
/// at merge time).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseOutcome {
    pub blocks: Vec<ParsedBlock>,
    pub config: Vec<(String, String)>,
}

/// Line-scanner states for one block.
enum State {
    /// Before any content line: accepts opening labels, a directive
    /// header, or the first prose line.
    Start,
    /// Inside a directive header: instruction continuation lines until
    /// the first `key=value` line.
    Command,
    /// Directive parameter section.
    Parameters,
    /// Prose body.
    Text,
}

/// Parses a whole source document.
///
/// Malformed lines inside a directive's parameter section demote the
/// block to prose (reported, never fatal), so one bad block cannot
/// take down the rest of the document.
#[must_use]
pub fn parse_source(source: &str) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();

    for chunk in split_blocks(source) {
        if chunk.trim_start().starts_with('!') {
            collect_config(&chunk, &mut outcome.config);
            continue;
        }
        outcome.blocks.push(parse_block(&chunk));
    }
    outcome
}

/// Splits on runs of blank lines, dropping comment lines first. Each
/// returned chunk is non-empty with lines joined by `\n`.
fn split_blocks(source: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in source.lines() {
        if line.starts_with('#') {
            continue;
        }
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(current.join("\n"));
                current.clear();
            }
            continue;
        }
        current.push(line);
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }
    blocks
}

fn collect_config(chunk: &str, config: &mut Vec<(String, String)>) {
    for line in chunk.lines() {
        let Some(rest) = line.trim_start().strip_prefix('!') else {
            warn!(line, "non-config line inside configuration block, skipped");
            continue;
        };
        match split_key_value(rest) {
            Some((key, value)) => config.push((key, value)),
            None => warn!(line, "configuration line without '=', skipped"),
        }
    }
}

fn split_key_value(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.trim().to_string()))
}

fn parse_block(raw_text: &str) -> ParsedBlock {
    let mut opening_labels = BTreeSet::new();
    let mut closing_labels = BTreeSet::new();
    let mut prose_lines: Vec<&str> = Vec::new();
    let mut command = String::new();
    let mut instruction_lines: Vec<&str> = Vec::new();
    let mut parameters: ParamList = Vec::new();
    let mut state = State::Start;

    for line in raw_text.lines() {
        match state {
            State::Start => {
                if let Some(name) = line.strip_prefix('/') {
                    opening_labels.insert(name.trim().to_string());
                } else if let Some(header) = line.strip_prefix('?') {
                    let header = header.trim_start();
                    match header.split_once(char::is_whitespace) {
                        Some((name, rest)) => {
                            command = name.to_string();
                            let rest = rest.trim_start();
                            if !rest.is_empty() {
                                instruction_lines.push(rest);
                            }
                        }
                        None => command = header.to_string(),
                    }
                    state = State::Command;
                } else {
                    prose_lines.push(line);
                    state = State::Text;
                }
            }
            State::Command => {
                if line.trim() == "." {
                    // Directive terminator, carries no content.
                } else if line.contains('=') {
                    push_parameter(&mut parameters, line);
                    state = State::Parameters;
                } else {
                    instruction_lines.push(line);
                }
            }
            State::Parameters => {
                if line.trim() == "." {
                    // Terminator, as above.
                } else if let Some(name) = line.strip_prefix('\\') {
                    closing_labels.insert(name.trim().to_string());
                } else if line.contains('=') {
                    push_parameter(&mut parameters, line);
                } else {
                    warn!(line, "unparseable parameter line, block kept as prose");
                    return ParsedBlock {
                        raw_text: raw_text.to_string(),
                        kind: BlockKind::Prose {
                            text: raw_text.to_string(),
                        },
                        opening_labels,
                        closing_labels,
                    };
                }
            }
            State::Text => {
                if let Some(name) = line.strip_prefix('\\') {
                    closing_labels.insert(name.trim().to_string());
                } else {
                    prose_lines.push(line);
                }
            }
        }
    }

    let kind = match state {
        State::Start | State::Text => BlockKind::Prose {
            text: prose_lines.join("\n"),
        },
        State::Command | State::Parameters => BlockKind::Directive {
            command,
            instruction: instruction_lines.join("\n"),
            parameters,
        },
    };

    ParsedBlock {
        raw_text: raw_text.to_string(),
        kind,
        opening_labels,
        closing_labels,
    }
}

/// Adds a `key=value` line to the multimap. A repeated key appends to
/// that key's value list in place, preserving first-seen key order.
fn push_parameter(parameters: &mut ParamList, line: &str) {
    let Some((key, value)) = split_key_value(line) else {
        warn!(line, "parameter line without key, skipped");
        return;
    };
    if let Some((_, values)) = parameters.iter_mut().find(|(k, _)| *k == key) {
        values.push(value);
    } else {
        parameters.push((key, vec![value]));
    }
}
