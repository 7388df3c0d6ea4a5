//! Label resolver: substitute `:name:` references with the current
//! value of the publishing block.
//!
//! Resolution is recomputed from original text on every pass, so the
//! result is a function of current label values, never of history.
//! The per-entity [`ResolvedLabelSnapshot`] records which value was
//! substituted last time; a mismatch is the staleness signal that
//! counts toward the tick's change total.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::debug;
use weft_store::{Entity, World};

use crate::components::{
    label_value, set_rendered_output, Directive, Instruction, Position, ProseContent, RawText,
    ResolvedLabelSnapshot, SectionKind, Tombstone,
};

/// What one resolution pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOutcome {
    /// Label names whose substituted value differs from the entity's
    /// snapshot, counted once per name per entity. Zero means label
    /// resolution has stabilized.
    pub changed: usize,
}

fn label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r":([\w.-]+):").expect("static pattern compiles"))
}

/// Returns whether `text` still carries an unresolved `:name:` marker.
#[must_use]
pub fn has_unresolved_marker(text: &str) -> bool {
    label_pattern().is_match(text)
}

/// Runs label substitution over every live block.
pub fn resolve_labels(world: &World) -> ResolveOutcome {
    let mut outcome = ResolveOutcome::default();

    let mut blocks: Vec<(usize, Entity)> = world
        .entities_with::<RawText>()
        .into_iter()
        .filter(|&e| !world.has::<Tombstone>(e))
        .map(|e| (world.get::<Position>(e).map_or(usize::MAX, |p| p.index), e))
        .collect();
    blocks.sort();

    for (_, entity) in blocks {
        let mut snapshot = world
            .get::<ResolvedLabelSnapshot>(entity)
            .unwrap_or_default()
            .values;
        let mut changed = 0usize;

        match world.get::<SectionKind>(entity) {
            Some(SectionKind::Prose) => {
                let Some(prose) = world.get::<ProseContent>(entity) else {
                    continue;
                };
                if !has_unresolved_marker(&prose.text) {
                    continue;
                }
                let resolved = substitute(world, &prose.text, &mut snapshot, &mut changed);
                set_rendered_output(world, entity, &resolved);
            }
            Some(SectionKind::Directive) => {
                if let Some(instruction) = world.get::<Instruction>(entity) {
                    let resolved =
                        substitute(world, &instruction.original, &mut snapshot, &mut changed);
                    world.modify::<Instruction, _>(entity, |i| i.resolved = resolved);
                }
                if let Some(directive) = world.get::<Directive>(entity) {
                    let resolved_parameters = directive
                        .parameters
                        .iter()
                        .map(|(key, values)| {
                            let values = values
                                .iter()
                                .map(|v| substitute(world, v, &mut snapshot, &mut changed))
                                .collect();
                            (key.clone(), values)
                        })
                        .collect();
                    world.modify::<Directive, _>(entity, |d| {
                        d.resolved_parameters = resolved_parameters;
                    });
                }
            }
            None => continue,
        }

        if changed > 0 {
            debug!(%entity, changed, "label references re-substituted");
        }
        world.modify::<ResolvedLabelSnapshot, _>(entity, |s| s.values = snapshot);
        outcome.changed += changed;
    }
    outcome
}

/// Replaces every resolvable marker in `text`, tracking staleness
/// against `snapshot`. Unresolvable markers stay verbatim: that is the
/// downstream gating signal, not an error.
fn substitute(
    world: &World,
    text: &str,
    snapshot: &mut HashMap<String, String>,
    changed: &mut usize,
) -> String {
    let pattern = label_pattern();
    let mut result = String::with_capacity(text.len());
    let mut last_end = 0;

    for captures in pattern.captures_iter(text) {
        let whole = captures.get(0).expect("match group zero always present");
        let name = &captures[1];
        result.push_str(&text[last_end..whole.start()]);

        match label_value(world, name) {
            Some(value) => {
                if snapshot.get(name).map(String::as_str) != Some(value.as_str()) {
                    snapshot.insert(name.to_string(), value.clone());
                    *changed += 1;
                }
                result.push_str(&value);
            }
            None => {
                // Publisher vanished (or never existed): back to the
                // raw marker, and that is itself a change.
                if snapshot.remove(name).is_some() {
                    *changed += 1;
                }
                result.push_str(whole.as_str());
            }
        }
        last_end = whole.end();
    }
    result.push_str(&text[last_end..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::RenderedOutput;
    use crate::systems::reconcile;

    fn consumer(world: &World) -> Entity {
        // The only live block without opening labels.
        world
            .entities_with::<RawText>()
            .into_iter()
            .find(|&e| !world.has::<crate::components::OpeningLabels>(e))
            .expect("consumer block present")
    }

    #[test]
    fn marker_detection() {
        assert!(has_unresolved_marker("see :notes: for detail"));
        assert!(has_unresolved_marker(":a.b-c:"));
        assert!(!has_unresolved_marker("a plain sentence"));
        assert!(!has_unresolved_marker("ratio 3:4 is no label"));
    }

    #[test]
    fn prose_reference_resolves_to_publisher_text() {
        let world = World::new();
        reconcile(&world, "/greet\nHello\n\\greet\n\nSay: :greet:").expect("reconcile");

        let outcome = resolve_labels(&world);
        assert_eq!(outcome.changed, 1);

        let rendered = world
            .get::<RenderedOutput>(consumer(&world))
            .expect("consumer rendered");
        assert_eq!(rendered.text, "Say: Hello");
    }

    #[test]
    fn second_pass_is_stable() {
        let world = World::new();
        reconcile(&world, "/greet\nHello\n\\greet\n\nSay: :greet:").expect("reconcile");
        resolve_labels(&world);

        let outcome = resolve_labels(&world);
        assert_eq!(outcome.changed, 0, "unchanged values must not re-count");
    }

    #[test]
    fn unresolvable_marker_stays_verbatim() {
        let world = World::new();
        reconcile(&world, "Say: :undefined:").expect("reconcile");

        let outcome = resolve_labels(&world);
        assert_eq!(outcome.changed, 0);
        let rendered = world
            .get::<RenderedOutput>(consumer(&world))
            .expect("rendered with marker");
        assert_eq!(rendered.text, "Say: :undefined:");
    }

    #[test]
    fn stale_value_triggers_resubstitution() {
        let world = World::new();
        reconcile(&world, "/greet\nHello\n\\greet\n\nSay: :greet:").expect("reconcile");
        resolve_labels(&world);

        // The publisher's rendered value changes (as if a directive
        // upstream produced new output).
        let publisher = world
            .entities_with::<crate::components::OpeningLabels>()
            .into_iter()
            .next()
            .expect("publisher present");
        set_rendered_output(&world, publisher, "Goodbye");

        let outcome = resolve_labels(&world);
        assert_eq!(outcome.changed, 1);
        let rendered = world
            .get::<RenderedOutput>(consumer(&world))
            .expect("consumer rendered");
        assert_eq!(rendered.text, "Say: Goodbye");
    }

    #[test]
    fn directive_instruction_and_parameters_resolve() {
        let world = World::new();
        reconcile(
            &world,
            "/name\nworld\n\\name\n\n?run echo :name:\ntag=:name:",
        )
        .expect("reconcile");

        // One name, referenced twice on the same entity: the snapshot
        // is keyed by name, so it counts once.
        let outcome = resolve_labels(&world);
        assert_eq!(outcome.changed, 1);

        let directive_entity = world
            .entities_with::<Directive>()
            .into_iter()
            .next()
            .expect("directive present");
        let instruction = world
            .get::<Instruction>(directive_entity)
            .expect("instruction");
        assert_eq!(instruction.original, "echo :name:");
        assert_eq!(instruction.resolved, "echo world");

        let directive = world.get::<Directive>(directive_entity).expect("directive");
        assert_eq!(
            directive.resolved_parameters,
            vec![("tag".to_string(), vec!["world".to_string()])]
        );
        // Originals untouched for the next recompute.
        assert_eq!(
            directive.parameters,
            vec![("tag".to_string(), vec![":name:".to_string()])]
        );
    }

    #[test]
    fn distinct_names_count_separately() {
        let world = World::new();
        reconcile(
            &world,
            "/a\nfirst\n\\a\n\n/b\nsecond\n\\b\n\nSay :a: and :b:",
        )
        .expect("reconcile");

        let outcome = resolve_labels(&world);
        assert_eq!(outcome.changed, 2);
        let rendered = world
            .get::<RenderedOutput>(consumer(&world))
            .expect("consumer rendered");
        assert_eq!(rendered.text, "Say first and second");
    }

    #[test]
    fn publisher_removal_reverts_to_marker() {
        let world = World::new();
        reconcile(&world, "/greet\nHello\n\\greet\n\nSay: :greet:").expect("reconcile");
        resolve_labels(&world);

        // Publisher disappears from the next parse.
        reconcile(&world, "Say: :greet:").expect("second reconcile");
        // Renderer has not run yet, so the tombstoned publisher still
        // exists but must no longer publish.
        let tombstoned = world.entities_with::<Tombstone>();
        for e in tombstoned {
            world.destroy(e).expect("destroy tombstoned");
        }

        let outcome = resolve_labels(&world);
        assert_eq!(outcome.changed, 1);
        let rendered = world
            .get::<RenderedOutput>(consumer(&world))
            .expect("consumer rendered");
        assert_eq!(rendered.text, "Say: :greet:");
    }
}
