//! Components attached to block entities.
//!
//! Presence is the type tag: a block *is* a directive because it
//! carries [`Directive`], and it *is* pending deletion because it
//! carries [`Tombstone`]. Components hold data only; behavior lives in
//! the systems.
//!
//! # Invariants
//!
//! - At most one entity carries [`GlobalConfig`] and one carries
//!   [`ReadinessFlags`] at any time.
//! - A live block entity has exactly one [`SectionKind`]: `Prose`
//!   (with [`ProseContent`]) or `Directive` (with [`Directive`] and
//!   optionally [`Instruction`]).
//! - [`Tombstone`] entities are destroyed before the next render.
//! - [`Position`] indices among live, non-tombstoned entities are
//!   unique and contiguous with the current parse order.

use std::collections::{BTreeSet, HashMap};
use weft_store::{Entity, World};

/// Ordered parameter multimap: repeated keys accumulate values in
/// insertion order.
pub type ParamList = Vec<(String, Vec<String>)>;

/// The exact source slice for a block, plus the hash of the whole
/// source version it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RawText {
    /// Verbatim block text as parsed (comment lines already stripped).
    pub content: String,
    /// Ordinal of the block at parse time.
    pub source_index: usize,
    /// Hash of the full source document this slice came from.
    pub version_hash: String,
    /// Set when the block changed (created or moved) this pass.
    pub dirty: bool,
}

/// Ordinal position of the block in the current parse.
///
/// Drives render ordering; a changed index with unchanged content is
/// still a change, because adjacency to labeled neighbors may matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub index: usize,
}

/// Whether the block is prose or a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Prose,
    Directive,
}

/// Text content of a prose block.
#[derive(Debug, Clone, PartialEq)]
pub struct ProseContent {
    pub text: String,
}

/// A directive block: command name plus its parameter multimap, in
/// both original and label-resolved form.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    /// Command name (`insert`, `run`, `gen`, `web`, …).
    pub name: String,
    /// Parameters exactly as parsed.
    pub parameters: ParamList,
    /// Parameters after `:name:` substitution; recomputed from
    /// `parameters` on every resolve pass.
    pub resolved_parameters: ParamList,
}

/// A directive's free-text argument, before and after label
/// substitution.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub original: String,
    pub resolved: String,
}

/// Names a block publishes at its start for other blocks to reference.
#[derive(Debug, Clone, PartialEq)]
pub struct OpeningLabels {
    pub names: BTreeSet<String>,
}

/// Names a block closes at its end.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosingLabels {
    pub names: BTreeSet<String>,
}

/// The final text to emit for this block.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedOutput {
    pub text: String,
    /// Set when `text` changed since the renderer last consumed it.
    pub dirty: bool,
}

/// Per-entity record of the value substituted for each referenced
/// label the last time resolution ran.
///
/// Comparing an entry against the label's *current* value is the
/// staleness test: a mismatch means the reference must be
/// re-substituted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedLabelSnapshot {
    pub values: HashMap<String, String>,
}

/// Marks a block absent from the latest parse, pending destruction by
/// the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tombstone;

/// Process-wide `!key=value` declarations merged from all parses.
/// Singleton: exactly one entity carries this.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalConfig {
    pub values: HashMap<String, String>,
}

/// Records whether the last full pass produced no further changes.
/// Singleton; used to short-circuit redundant work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadinessFlags {
    pub output_stable: bool,
    pub labels_stable: bool,
}

/// Opening label that restricts rendering to the labeled blocks.
pub const FOCUS_LABEL: &str = "focus";

/// Opening label that hides a block from the rendered output.
pub const HIDDEN_LABEL: &str = "hidden";

/// Upserts [`RenderedOutput`] on an entity.
///
/// The dirty flag is raised only when the text actually changed, so
/// repeated identical writes stay invisible to the renderer.
pub fn set_rendered_output(world: &World, entity: Entity, text: &str) -> bool {
    if world.has::<RenderedOutput>(entity) {
        let mut changed = false;
        world.modify::<RenderedOutput, _>(entity, |out| {
            if out.text != text {
                out.text = text.to_string();
                out.dirty = true;
                changed = true;
            }
        });
        changed
    } else {
        // First output for this block is always a change.
        let _ = world.add(
            entity,
            RenderedOutput {
                text: text.to_string(),
                dirty: true,
            },
        );
        true
    }
}

/// Returns the current replacement value for `label`.
///
/// Among all live entities whose [`OpeningLabels`] contain the name,
/// the one with the lowest [`Position`] wins — a deterministic rule
/// for the (discouraged) case of duplicate publishers. The value is
/// the publisher's [`RenderedOutput`] if present, else its
/// [`ProseContent`].
#[must_use]
pub fn label_value(world: &World, label: &str) -> Option<String> {
    let mut publishers: Vec<(usize, Entity)> = world
        .entities_with::<OpeningLabels>()
        .into_iter()
        .filter(|&e| {
            world
                .get::<OpeningLabels>(e)
                .is_some_and(|labels| labels.names.contains(label))
        })
        .map(|e| {
            let index = world.get::<Position>(e).map_or(usize::MAX, |p| p.index);
            (index, e)
        })
        .collect();
    publishers.sort();

    let (_, publisher) = publishers.first()?;
    if let Some(rendered) = world.get::<RenderedOutput>(*publisher) {
        return Some(rendered.text);
    }
    world.get::<ProseContent>(*publisher).map(|p| p.text)
}

/// Returns the singleton [`GlobalConfig`] entity, creating it on first
/// use.
pub fn global_config_entity(world: &World) -> Result<Entity, weft_store::StoreError> {
    if let Some(e) = world.entities_with::<GlobalConfig>().into_iter().next() {
        return Ok(e);
    }
    let e = world.create()?;
    world.add(e, GlobalConfig::default())?;
    Ok(e)
}

/// Looks up a `!key=value` declaration from the document.
#[must_use]
pub fn global_config_value(world: &World, key: &str) -> Option<String> {
    let e = world.entities_with::<GlobalConfig>().into_iter().next()?;
    world
        .get::<GlobalConfig>(e)
        .and_then(|cfg| cfg.values.get(key).cloned())
}

/// Returns the singleton [`ReadinessFlags`] entity, creating it on
/// first use with both flags cleared.
pub fn readiness_entity(world: &World) -> Result<Entity, weft_store::StoreError> {
    if let Some(e) = world.entities_with::<ReadinessFlags>().into_iter().next() {
        return Ok(e);
    }
    let e = world.create()?;
    world.add(e, ReadinessFlags::default())?;
    Ok(e)
}

/// Reads the current readiness flags (both false when absent).
#[must_use]
pub fn readiness(world: &World) -> ReadinessFlags {
    world
        .entities_with::<ReadinessFlags>()
        .into_iter()
        .next()
        .and_then(|e| world.get::<ReadinessFlags>(e))
        .unwrap_or_default()
}

/// Overwrites the readiness flags.
pub fn set_readiness(world: &World, flags: ReadinessFlags) {
    if let Some(e) = world.entities_with::<ReadinessFlags>().into_iter().next() {
        world.modify::<ReadinessFlags, _>(e, |f| *f = flags);
    }
}

/// Latest value for `key` in a parameter multimap: the last value of
/// the last occurrence of the key.
#[must_use]
pub fn latest_param<'a>(params: &'a [(String, Vec<String>)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .and_then(|(_, values)| values.last())
        .map(String::as_str)
}

/// Resolution chain for directive settings: parameter value first,
/// then the document's `!key=value` declarations.
#[must_use]
pub fn param_or_global(
    world: &World,
    params: &[(String, Vec<String>)],
    key: &str,
) -> Option<String> {
    if let Some(v) = latest_param(params, key) {
        return Some(v.to_string());
    }
    global_config_value(world, key)
}
