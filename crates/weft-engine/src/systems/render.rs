//! Renderer: destroy tombstones, assemble output, write on change.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};
use weft_store::{Entity, World};

use crate::components::{
    OpeningLabels, Position, ProseContent, RawText, RenderedOutput, Tombstone, FOCUS_LABEL,
    HIDDEN_LABEL,
};
use crate::error::EngineError;

/// What one render pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOutcome {
    /// Tombstoned entities destroyed before assembly.
    pub destroyed: usize,
    /// Whether the output file was rewritten.
    pub wrote: bool,
}

/// Renders the document to `output_path`.
///
/// `last_rendered` is the engine's memory of the previous write; the
/// file is rewritten (fully, never patched) only when the assembled
/// text differs from it.
///
/// # Errors
///
/// [`EngineError::Store`] on a broken store contract,
/// [`EngineError::Io`] when the output file cannot be written.
pub fn render(
    world: &World,
    output_path: &Path,
    last_rendered: &mut Option<String>,
) -> Result<RenderOutcome, EngineError> {
    let mut outcome = RenderOutcome::default();

    for entity in world.entities_with::<Tombstone>() {
        world.destroy(entity)?;
        outcome.destroyed += 1;
    }

    let focused = world.entities_with::<OpeningLabels>().into_iter().any(|e| {
        world
            .get::<OpeningLabels>(e)
            .is_some_and(|l| l.names.contains(FOCUS_LABEL))
    });

    let mut sections = BTreeMap::new();
    for entity in world.entities_with::<Position>() {
        if !is_visible(world, entity, focused) {
            continue;
        }
        let Some(position) = world.get::<Position>(entity) else {
            continue;
        };
        let text = world
            .get::<RenderedOutput>(entity)
            .map(|o| o.text)
            .or_else(|| world.get::<ProseContent>(entity).map(|p| p.text))
            .unwrap_or_default();
        sections.insert(position.index, text);

        // Render consumes the dirty flags.
        world.modify::<RenderedOutput, _>(entity, |o| o.dirty = false);
        world.modify::<RawText, _>(entity, |r| r.dirty = false);
    }

    let assembled = assemble(&sections);
    if last_rendered.as_deref() == Some(assembled.as_str()) {
        debug!("output unchanged, skipping write");
        return Ok(outcome);
    }

    let contents = format!("{assembled}\n");
    std::fs::write(output_path, contents).map_err(|e| EngineError::Io {
        path: output_path.to_path_buf(),
        source: e,
    })?;
    info!(path = %output_path.display(), bytes = assembled.len(), "output written");
    *last_rendered = Some(assembled);
    outcome.wrote = true;
    Ok(outcome)
}

fn is_visible(world: &World, entity: Entity, focused: bool) -> bool {
    let labels = world.get::<OpeningLabels>(entity);
    if let Some(ref labels) = labels {
        if labels.names.contains(HIDDEN_LABEL) {
            return false;
        }
    }
    if focused {
        return labels.is_some_and(|l| l.names.contains(FOCUS_LABEL));
    }
    true
}

/// Joins section texts in ascending position order with blank lines,
/// skipping empty sections.
#[must_use]
pub fn assemble(sections: &BTreeMap<usize, String>) -> String {
    sections
        .values()
        .filter(|text| !text.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n\n")
}
