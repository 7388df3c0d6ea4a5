//! The per-tick systems, in execution order.
//!
//! Each system is a free function over the shared
//! [`World`](weft_store::World); state flows between them only through
//! components. The engine calls them in the fixed order reconcile,
//! resolve, execute, render.

mod execute;
mod reconcile;
mod render;
mod resolve;

pub use execute::{execute_directives, ExecuteOutcome};
pub use reconcile::{reconcile, ReconcileOutcome};
pub use render::{assemble, render, RenderOutcome};
pub use resolve::{resolve_labels, ResolveOutcome};
