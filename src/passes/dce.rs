//! P1: reachable-block identification (spec §4.2). A depth-first walk
//! from the entry block finds every block still reachable by a branch;
//! anything else is dead and dropped from the function's layout order
//! (it is never visited by any later pass, encoder, or printer).

use crate::entity::EntitySet;
use crate::error::{CodegenError, CodegenResult, Stage};
use crate::ir::Function;

pub fn remove_unreachable_blocks(func: &mut Function) -> CodegenResult<usize> {
    let entry = func.entry.ok_or_else(|| {
        CodegenError::structural(Stage::DeadBlockElimination, None, "function has no entry block")
    })?;

    let mut visited = EntitySet::new();
    let mut stack = vec![entry];
    let mut order = Vec::new();

    while let Some(block) = stack.pop() {
        if !visited.insert(block) {
            continue;
        }
        order.push(block);
        let terminator = func.block_terminator(block).ok_or_else(|| {
            CodegenError::structural(
                Stage::DeadBlockElimination,
                None,
                format!("block {} has no terminator", block),
            )
        })?;
        for (succ, _) in func.dfg.inst_data(terminator).branch_targets() {
            if !visited.contains(succ) {
                stack.push(succ);
            }
        }
    }

    let total = func.blocks.len();
    let removed = total - order.len();
    func.layout.order = order;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BlockData, CallConv, Signature, Type};
    use crate::ssa::FunctionBuilder;

    #[test]
    fn unreachable_block_is_dropped_from_layout() {
        let mut sig = Signature::new(CallConv::AppleAarch64);
        sig.results.push(Type::I32);
        let mut func = Function::new("f", sig);
        let mut b = FunctionBuilder::new(&mut func);
        let entry = b.allocate_block();
        let dead = b.allocate_block();
        let _ = dead;
        b.set_current(entry);
        let zero = b.iconst(Type::I32, 0).unwrap();
        b.return_(&[zero]).unwrap();
        b.seal_block(entry).unwrap();
        let _ = BlockData::default();
        func.entry = Some(entry);

        let removed = remove_unreachable_blocks(&mut func).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(func.layout.order, vec![entry]);
    }
}
