//! P4: block layout (spec §4.2). Produces the linear order the encoder
//! will emit blocks in, chosen so that the branch with the highest
//! static likelihood becomes a fall-through: `Jump` always falls
//! through to its target, and a `Brif`'s `then` edge is treated as the
//! likely one (loop headers reached by a back-edge are, by construction,
//! already placed earlier and so never "fall through" into themselves).
//! The algorithm is a deterministic greedy trace extension, so the order
//! is stable for a given input (spec §8 testable property).

use crate::entity::EntitySet;
use crate::error::CodegenResult;
use crate::ir::{Function, InstructionData};

pub fn compute_layout(func: &mut Function) -> CodegenResult<()> {
    let reachable = func.layout.order.clone();
    let mut visited: EntitySet<crate::ir::Block> = EntitySet::new();
    let mut order = Vec::with_capacity(reachable.len());
    let mut worklist: std::collections::VecDeque<_> = reachable.iter().copied().collect();

    while let Some(start) = worklist.pop_front() {
        if visited.contains(start) {
            continue;
        }
        let mut current = start;
        loop {
            if !visited.insert(current) {
                break;
            }
            order.push(current);
            let terminator = match func.block_terminator(current) {
                Some(t) => t,
                None => break,
            };
            match func.dfg.inst_data(terminator) {
                InstructionData::Jump { destination, .. } => {
                    if visited.contains(*destination) {
                        break;
                    }
                    current = *destination;
                }
                InstructionData::Brif {
                    then_dest,
                    else_dest,
                    ..
                } => {
                    let (then_dest, else_dest) = (*then_dest, *else_dest);
                    if !visited.contains(then_dest) {
                        if !visited.contains(else_dest) {
                            worklist.push_back(else_dest);
                        }
                        current = then_dest;
                    } else if !visited.contains(else_dest) {
                        current = else_dest;
                    } else {
                        break;
                    }
                }
                InstructionData::MultiReturn { .. } | InstructionData::Trap { .. } => break,
                _ => break,
            }
        }
    }

    // Safety net: any reachable block the trace loop never reached
    // (shouldn't happen given the worklist seeding, but keep layout
    // total over the reachable set).
    for block in &reachable {
        if !visited.contains(*block) {
            visited.insert(*block);
            order.push(*block);
        }
    }

    debug_assert_eq!(order.len(), reachable.len());
    func.layout.order = order;
    Ok(())
}
