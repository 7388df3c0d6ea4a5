//! `?gen` — generate text through the language-model backend.
//!
//! The cache stores one entry per (instruction, parameters, model)
//! fingerprint with a stability flag. Rate-limited and failed attempts
//! are recorded as unstable so the next tick retries them instead of
//! serving the placeholder as a final answer.

use tracing::{debug, warn};

use super::{DirectiveCaches, DirectiveContext};
use crate::components::{latest_param, param_or_global};
use crate::fingerprint::sha256_hex_parts;
use crate::query::{ModelSpec, QueryError, RATE_LIMIT_PLACEHOLDER};

/// One cached generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenCacheEntry {
    pub text: String,
    /// False for rate-limited or failed attempts: the entry renders
    /// this tick but does not count as a hit next tick.
    pub stable: bool,
}

/// Runs a generation directive.
///
/// The prompt is the resolved instruction followed by the contents of
/// every `file` parameter, in order. Model, credential and length cap
/// resolve through the chain: directive parameter, then document
/// `!key=value` declaration, then process configuration.
#[must_use]
pub fn execute_gen(
    ctx: &DirectiveContext<'_>,
    instruction: &str,
    params: &[(String, Vec<String>)],
    caches: &mut DirectiveCaches,
) -> String {
    let model = resolve_model(ctx, params);

    let key = gen_cache_key(instruction, params, &model.name);
    if let Some(entry) = caches.gen.get(&key) {
        if entry.stable {
            return entry.text.clone();
        }
        debug!("unstable gen cache entry, retrying");
    }

    let prompt = match build_prompt(ctx, instruction, params) {
        Ok(prompt) => prompt,
        Err(inline) => return inline,
    };

    match ctx.query.query(&prompt, &model) {
        Ok(text) => {
            let text = match latest_param(params, "extract") {
                Some("code") => extract_code(&text),
                _ => text,
            };
            let text = persist_side_files(ctx, params, text);
            caches.gen.insert(
                key,
                GenCacheEntry {
                    text: text.clone(),
                    stable: true,
                },
            );
            text
        }
        Err(QueryError::RateLimited) => {
            warn!("generation rate limited, will retry");
            caches.gen.insert(
                key,
                GenCacheEntry {
                    text: RATE_LIMIT_PLACEHOLDER.to_string(),
                    stable: false,
                },
            );
            RATE_LIMIT_PLACEHOLDER.to_string()
        }
        Err(e) => {
            warn!(error = %e, "generation failed");
            let text = format!("Generation failed: {e}");
            caches.gen.insert(
                key,
                GenCacheEntry {
                    text: text.clone(),
                    stable: false,
                },
            );
            text
        }
    }
}

/// Shared with the `web` directive's `parse=readable` post-processing.
pub(super) fn resolve_model(
    ctx: &DirectiveContext<'_>,
    params: &[(String, Vec<String>)],
) -> ModelSpec {
    let name = param_or_global(ctx.world, params, "llm")
        .unwrap_or_else(|| ctx.config.model.default.clone());
    let api_key =
        param_or_global(ctx.world, params, "llm-api-key").or_else(|| ctx.config.model.api_key.clone());
    let max_tokens = latest_param(params, "max-tokens")
        .and_then(|v| v.parse::<u32>().ok())
        .or(ctx.config.model.max_tokens);
    ModelSpec {
        name,
        api_key,
        max_tokens,
    }
}

fn gen_cache_key(instruction: &str, params: &[(String, Vec<String>)], model: &str) -> String {
    let mut parts: Vec<&str> = vec!["gen", instruction, model];
    for (key, values) in params {
        parts.push(key);
        for value in values {
            parts.push(value);
        }
    }
    sha256_hex_parts(&parts)
}

/// Instruction text plus every `file` parameter's contents. A missing
/// file aborts the generation with an inline error so the model never
/// sees a truncated prompt.
fn build_prompt(
    ctx: &DirectiveContext<'_>,
    instruction: &str,
    params: &[(String, Vec<String>)],
) -> Result<String, String> {
    let mut prompt = instruction.to_string();
    for (key, values) in params {
        if key != "file" {
            continue;
        }
        for value in values {
            let path = ctx.base_dir.join(value);
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    prompt.push_str("\n\n[");
                    prompt.push_str(value);
                    prompt.push_str("]\n");
                    prompt.push_str(&content);
                }
                Err(_) => return Err(format!("The file {value} does not exist.")),
            }
        }
    }
    Ok(prompt)
}

/// Pulls every fenced code block out of a completion, dropping the
/// fence lines and any language tag and joining the blocks in order.
/// An unterminated trailing fence still counts; a completion without
/// any fence renders an explanatory message.
fn extract_code(text: &str) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut fence: Option<Vec<&str>> = None;
    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            match fence.take() {
                Some(lines) => blocks.push(lines.join("\n").trim().to_string()),
                None => fence = Some(Vec::new()),
            }
            continue;
        }
        if let Some(lines) = fence.as_mut() {
            lines.push(line);
        }
    }
    if let Some(lines) = fence.take() {
        blocks.push(lines.join("\n").trim().to_string());
    }

    let code = blocks.join("\n").trim().to_string();
    if code.is_empty() {
        "No code block found in the response.".to_string()
    } else {
        code
    }
}

/// Honors `write=` / `write_append=` parameters. Persistence failures
/// are noted inline after the generated text.
fn persist_side_files(
    ctx: &DirectiveContext<'_>,
    params: &[(String, Vec<String>)],
    text: String,
) -> String {
    use std::io::Write;

    let mut text = text;
    if let Some(target) = latest_param(params, "write") {
        let path = ctx.base_dir.join(target);
        if let Err(e) = std::fs::write(&path, &text) {
            warn!(path = %path.display(), error = %e, "write parameter failed");
            text.push_str(&format!("\n(Could not write {target}: {e})"));
        }
    }
    if let Some(target) = latest_param(params, "write_append") {
        let path = ctx.base_dir.join(target);
        let appended = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| writeln!(f, "{text}"));
        if let Err(e) = appended {
            warn!(path = %path.display(), error = %e, "write_append parameter failed");
            text.push_str(&format!("\n(Could not append to {target}: {e})"));
        }
    }
    text
}
