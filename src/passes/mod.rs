//! SSA middle-end pipeline (spec §4.2): a fixed sequence of whole-function
//! transforms run in order, each preserving I1-I3 and strengthening
//! toward I4 (all blocks sealed, all branches write successor
//! parameters, no phi).

mod critical_edge;
mod dce;
mod layout;
mod trivial_phi;

use crate::error::CodegenResult;
use crate::ir::Function;
use log::debug;

/// Runs P1-P4 in order and returns the chosen block [`crate::ir::Layout`]
/// order, stashed onto `func.layout.order`.
pub fn run_passes(func: &mut Function) -> CodegenResult<()> {
    debug!("passes: running on function `{}`", func.name);

    let removed = dce::remove_unreachable_blocks(func)?;
    debug!("passes(P1): removed {} unreachable block(s)", removed);

    let collapsed = trivial_phi::eliminate_trivial_phis(func)?;
    debug!("passes(P2): collapsed {} trivial block param(s)", collapsed);

    let split = critical_edge::split_constant_arg_edges(func)?;
    debug!(
        "passes(P3): materialized {} constant branch argument(s)",
        split
    );

    layout::compute_layout(func)?;
    debug!(
        "passes(P4): laid out {} block(s)",
        func.layout.order.len()
    );

    Ok(())
}

pub use critical_edge::split_constant_arg_edges;
pub use dce::remove_unreachable_blocks;
pub use layout::compute_layout;
pub use trivial_phi::eliminate_trivial_phis;
