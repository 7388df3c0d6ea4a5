//! Reconciler: turn a fresh parse into store mutations while
//! preserving entity identity for unchanged content.

use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};
use weft_store::{Entity, StoreError, World};

use crate::components::{
    global_config_entity, ClosingLabels, Directive, GlobalConfig, Instruction, OpeningLabels,
    Position, ProseContent, RawText, ResolvedLabelSnapshot, SectionKind, Tombstone,
};
use crate::fingerprint::text_fingerprint;
use crate::parser::{parse_source, BlockKind};

/// What one reconciliation pass did, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub created: usize,
    /// Matched with unchanged position; fully untouched.
    pub unchanged: usize,
    /// Matched by content but repositioned; marked dirty.
    pub moved: usize,
    pub tombstoned: usize,
}

impl ReconcileOutcome {
    /// True when the pass changed nothing downstream systems care
    /// about.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.moved == 0 && self.tombstoned == 0
    }
}

/// Reconciles the store against a new version of the source text.
///
/// Matching is by exact raw-text fingerprint, consumed FIFO per
/// fingerprint so duplicate blocks pair up in encounter order. Matched
/// blocks keep their entity (and with it every cache-relevant
/// component); unmatched parsed blocks get fresh entities; unmatched
/// existing entities are tombstoned for the renderer to destroy.
///
/// # Errors
///
/// [`StoreError`] only on a broken store contract, which is fatal.
pub fn reconcile(world: &World, source: &str) -> Result<ReconcileOutcome, StoreError> {
    let outcome_parse = parse_source(source);
    let version_hash = text_fingerprint(source);
    let mut outcome = ReconcileOutcome::default();

    merge_global_config(world, &outcome_parse.config)?;

    // Existing blocks in encounter order, grouped by content.
    let mut by_fingerprint: HashMap<String, VecDeque<Entity>> = HashMap::new();
    let mut existing: Vec<(usize, Entity)> = world
        .entities_with::<RawText>()
        .into_iter()
        .map(|e| {
            let index = world.get::<Position>(e).map_or(usize::MAX, |p| p.index);
            (index, e)
        })
        .collect();
    existing.sort();
    for (_, e) in existing {
        if let Some(raw) = world.get::<RawText>(e) {
            by_fingerprint
                .entry(text_fingerprint(&raw.content))
                .or_default()
                .push_back(e);
        }
    }

    for (index, block) in outcome_parse.blocks.iter().enumerate() {
        let fp = text_fingerprint(&block.raw_text);
        match by_fingerprint.get_mut(&fp).and_then(VecDeque::pop_front) {
            Some(entity) => {
                // A block can vanish and reappear between renders; the
                // claim revives it before the renderer sweeps.
                if world.remove::<Tombstone>(entity).is_some() {
                    debug!(%entity, "tombstoned entity reclaimed by matching content");
                }
                let old_index = world.get::<Position>(entity).map(|p| p.index);
                if old_index == Some(index) {
                    outcome.unchanged += 1;
                } else {
                    // Content identical but the block moved. Downstream
                    // must still see a change: adjacency to labeled
                    // neighbors can matter.
                    world.modify::<Position, _>(entity, |p| p.index = index);
                    world.modify::<RawText, _>(entity, |raw| {
                        raw.source_index = index;
                        raw.version_hash = version_hash.clone();
                        raw.dirty = true;
                    });
                    outcome.moved += 1;
                }
            }
            None => {
                create_block_entity(world, block, index, &version_hash)?;
                outcome.created += 1;
            }
        }
    }

    for queue in by_fingerprint.values_mut() {
        while let Some(entity) = queue.pop_front() {
            if world.has::<Tombstone>(entity) {
                // Duplicate-content collision across passes; harmless
                // but worth knowing about.
                warn!(%entity, "entity already tombstoned during reconcile");
                continue;
            }
            world.add(entity, Tombstone)?;
            outcome.tombstoned += 1;
        }
    }

    debug!(
        created = outcome.created,
        unchanged = outcome.unchanged,
        moved = outcome.moved,
        tombstoned = outcome.tombstoned,
        "reconcile pass complete"
    );
    Ok(outcome)
}

fn create_block_entity(
    world: &World,
    block: &crate::parser::ParsedBlock,
    index: usize,
    version_hash: &str,
) -> Result<Entity, StoreError> {
    let entity = world.create()?;
    world.add(
        entity,
        RawText {
            content: block.raw_text.clone(),
            source_index: index,
            version_hash: version_hash.to_string(),
            dirty: true,
        },
    )?;
    world.add(entity, Position { index })?;
    world.add(entity, ResolvedLabelSnapshot::default())?;

    if !block.opening_labels.is_empty() {
        world.add(
            entity,
            OpeningLabels {
                names: block.opening_labels.clone(),
            },
        )?;
    }
    if !block.closing_labels.is_empty() {
        world.add(
            entity,
            ClosingLabels {
                names: block.closing_labels.clone(),
            },
        )?;
    }

    match &block.kind {
        BlockKind::Prose { text } => {
            world.add(entity, SectionKind::Prose)?;
            world.add(entity, ProseContent { text: text.clone() })?;
        }
        BlockKind::Directive {
            command,
            instruction,
            parameters,
        } => {
            world.add(entity, SectionKind::Directive)?;
            world.add(
                entity,
                Directive {
                    name: command.clone(),
                    parameters: parameters.clone(),
                    resolved_parameters: parameters.clone(),
                },
            )?;
            world.add(
                entity,
                Instruction {
                    original: instruction.clone(),
                    resolved: instruction.clone(),
                },
            )?;
        }
    }
    Ok(entity)
}

/// Folds `!key=value` pairs into the singleton, later values winning.
fn merge_global_config(world: &World, pairs: &[(String, String)]) -> Result<(), StoreError> {
    if pairs.is_empty() {
        return Ok(());
    }
    let entity = global_config_entity(world)?;
    world.modify::<GlobalConfig, _>(entity, |cfg| {
        for (key, value) in pairs {
            cfg.values.insert(key.clone(), value.clone());
        }
    });
    Ok(())
}
