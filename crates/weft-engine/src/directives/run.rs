//! `?run` — execute a child process and capture its stdout.
//!
//! Commands run in argv form only. The instruction is tokenized here
//! with shell-like quoting rules, but no shell is ever involved, so
//! metacharacters have no meaning beyond quoting.

use std::process::Command;
use tracing::{debug, warn};
use weft_store::Entity;

use super::{DirectiveCaches, DirectiveContext};
use crate::components::latest_param;
use crate::fingerprint::sha256_hex_parts;

/// Executes the resolved instruction as a child process.
///
/// Success caches trimmed stdout keyed by instruction, parameters and
/// block identity, so an unchanged directive runs at most once.
/// Failures are rendered inline and never cached, so the next tick
/// retries. A `run_continuous=true` parameter demotes the cache to
/// advisory: the command re-runs every tick and the cache only
/// remembers the latest output.
#[must_use]
pub fn execute_run(
    ctx: &DirectiveContext<'_>,
    entity: Entity,
    instruction: &str,
    params: &[(String, Vec<String>)],
    caches: &mut DirectiveCaches,
) -> String {
    let key = run_cache_key(entity, instruction, params);
    let continuous = latest_param(params, "run_continuous")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));

    if !continuous {
        if let Some(cached) = caches.run.get(&key) {
            return cached.clone();
        }
    }

    let mut argv = tokenize_argv(instruction);
    if argv.is_empty() {
        return "The run directive needs a command.".to_string();
    }
    if argv[0] == "python" {
        argv[0] = ctx.config.run.python_exec.clone();
    }

    debug!(command = %argv[0], "running directive command");
    let output = match Command::new(&argv[0])
        .args(&argv[1..])
        .current_dir(ctx.base_dir)
        .output()
    {
        Ok(output) => output,
        Err(e) => {
            warn!(command = %argv[0], error = %e, "command could not be started");
            return format!("Could not start '{}': {e}", argv[0]);
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return format!(
            "Command '{}' failed with {}:\n{}",
            argv.join(" "),
            output.status,
            stderr.trim_end()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout)
        .trim_end()
        .to_string();
    caches.run.insert(key, stdout.clone());
    stdout
}

fn run_cache_key(entity: Entity, instruction: &str, params: &[(String, Vec<String>)]) -> String {
    let entity_tag = entity.to_string();
    let mut parts: Vec<&str> = vec!["run", &entity_tag, instruction];
    for (key, values) in params {
        parts.push(key);
        for value in values {
            parts.push(value);
        }
    }
    sha256_hex_parts(&parts)
}

/// Splits a command line into an argument vector.
///
/// Rules: whitespace separates arguments; single and double quotes
/// group; a backslash escapes the next character outside single
/// quotes. An unterminated quote closes at end of input rather than
/// failing.
#[must_use]
pub fn tokenize_argv(line: &str) -> Vec<String> {
    let mut argv = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_token {
                    argv.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            '\'' => {
                in_token = true;
                for q in chars.by_ref() {
                    if q == '\'' {
                        break;
                    }
                    current.push(q);
                }
            }
            '"' => {
                in_token = true;
                while let Some(q) = chars.next() {
                    match q {
                        '"' => break,
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                current.push(escaped);
                            }
                        }
                        other => current.push(other),
                    }
                }
            }
            '\\' => {
                in_token = true;
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            other => {
                in_token = true;
                current.push(other);
            }
        }
    }
    if in_token {
        argv.push(current);
    }
    argv
}
