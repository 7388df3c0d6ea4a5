//! Directive executor: dispatch ready directives to their handlers.
//!
//! Readiness gating happens here, not in the handlers: a directive
//! whose resolved instruction or parameters still carry a `:name:`
//! marker renders as `?<command>` and is never dispatched. Unknown
//! commands are inert for forward compatibility.

use tracing::debug;
use weft_store::{Entity, StoreError};

use crate::components::{set_rendered_output, Directive, Instruction, Position, Tombstone};
use crate::directives::{
    execute_gen, execute_insert, execute_run, execute_web, DirectiveCaches, DirectiveContext,
    DirectiveKind,
};
use crate::systems::resolve::has_unresolved_marker;

/// What one executor pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteOutcome {
    /// Directives dispatched to a handler.
    pub executed: usize,
    /// Directives held back by an unresolved reference.
    pub gated: usize,
    /// Blocks whose rendered output actually changed.
    pub changed: usize,
}

/// Runs every live directive block once, in position order.
///
/// # Errors
///
/// [`StoreError`] only on a broken store contract.
pub fn execute_directives(
    ctx: &DirectiveContext<'_>,
    caches: &mut DirectiveCaches,
) -> Result<ExecuteOutcome, StoreError> {
    let mut outcome = ExecuteOutcome::default();

    let mut directives: Vec<(usize, Entity)> = ctx
        .world
        .entities_with::<Directive>()
        .into_iter()
        .filter(|&e| !ctx.world.has::<Tombstone>(e))
        .map(|e| {
            let index = ctx.world.get::<Position>(e).map_or(usize::MAX, |p| p.index);
            (index, e)
        })
        .collect();
    directives.sort();

    for (_, entity) in directives {
        let Some(directive) = ctx.world.get::<Directive>(entity) else {
            continue;
        };
        let instruction = ctx
            .world
            .get::<Instruction>(entity)
            .map(|i| i.resolved)
            .unwrap_or_default();

        if is_gated(&instruction, &directive) {
            debug!(%entity, command = %directive.name, "directive gated on unresolved reference");
            if set_rendered_output(ctx.world, entity, &format!("?{}", directive.name)) {
                outcome.changed += 1;
            }
            outcome.gated += 1;
            continue;
        }

        let Some(kind) = DirectiveKind::from_name(&directive.name) else {
            // Unknown command: inert, renders nothing.
            continue;
        };

        // A generation with no prompt is a half-written directive, not
        // a request for an empty completion.
        if kind == DirectiveKind::Gen && instruction.trim().is_empty() {
            if set_rendered_output(ctx.world, entity, "?gen") {
                outcome.changed += 1;
            }
            outcome.gated += 1;
            continue;
        }

        let text = match kind {
            DirectiveKind::Insert => execute_insert(ctx, &instruction),
            DirectiveKind::Run => execute_run(
                ctx,
                entity,
                &instruction,
                &directive.resolved_parameters,
                caches,
            ),
            DirectiveKind::Gen => {
                execute_gen(ctx, &instruction, &directive.resolved_parameters, caches)
            }
            DirectiveKind::Web => {
                execute_web(ctx, &instruction, &directive.resolved_parameters, caches)
            }
        };
        outcome.executed += 1;
        if set_rendered_output(ctx.world, entity, &text) {
            outcome.changed += 1;
        }
    }
    Ok(outcome)
}

fn is_gated(instruction: &str, directive: &Directive) -> bool {
    has_unresolved_marker(instruction)
        || directive
            .resolved_parameters
            .iter()
            .any(|(_, values)| values.iter().any(|v| has_unresolved_marker(v)))
}
