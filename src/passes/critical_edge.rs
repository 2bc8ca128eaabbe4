//! P3: critical-edge handling (spec §4.2).
//!
//! Two distinct problems share this pass:
//!
//! - A constant branch argument is re-materialized as a fresh
//!   instruction immediately before the terminator in the branching
//!   block, rather than letting every successor share one far-away
//!   definition. This keeps a later bottom-up instruction selector free
//!   to materialize the constant into a register right at the branch
//!   without reasoning about whether the original definition still
//!   dominates that program point.
//! - A genuinely critical edge — a `brif` arm whose target has more than
//!   one predecessor and carries a non-empty argument list — cannot
//!   safely have its argument copies placed in either endpoint: the
//!   branching block has another arm that must not run them, and the
//!   target has another predecessor that must not either. Those edges
//!   get a fresh block of their own, holding just the copy-carrying jump,
//!   so instruction selection can always place per-destination parallel
//!   copies at the start of a target block with no other predecessor.

use crate::error::CodegenResult;
use crate::ir::function::{BlockData, PredEdge};
use crate::ir::{Block, Function, InstructionData, Opcode, Value, ValueDef};

fn is_materializable_const(func: &Function, value: Value) -> Option<InstructionData> {
    match func.dfg.value_def(value) {
        ValueDef::Result(inst, 0) => {
            let data = func.dfg.inst_data(inst);
            match data.opcode() {
                Opcode::Iconst | Opcode::F32const | Opcode::F64const => Some(data.clone()),
                _ => None,
            }
        }
        _ => None,
    }
}

pub fn split_constant_arg_edges(func: &mut Function) -> CodegenResult<usize> {
    let mut rematerialized = 0;
    let blocks = func.layout.order.clone();
    for block in blocks {
        let terminator = match func.block_terminator(block) {
            Some(t) => t,
            None => continue,
        };
        let ty_of = |f: &Function, v: Value| f.dfg.value_type(v);

        // Collect (old value, replacement) pairs first so we don't
        // mutate the terminator's operand lists while computing them.
        let args = func.dfg.inst_data(terminator).arguments();
        let mut replacements = Vec::new();
        for &arg in args.iter() {
            if let Some(const_data) = is_materializable_const(func, arg) {
                let ty = ty_of(func, arg);
                replacements.push((arg, const_data, ty));
            }
        }

        for (old, const_data, ty) in replacements {
            let new_inst = func.dfg.make_inst(const_data);
            let new_value = func.dfg.append_result(new_inst, ty);
            let pos = func.blocks[block]
                .insts
                .iter()
                .position(|&i| i == terminator)
                .expect("terminator present in its own block");
            func.blocks[block].insts.insert(pos, new_inst);
            func.dfg
                .inst_data_mut(terminator)
                .map_values(|v| if v == old { new_value } else { v });
            rematerialized += 1;
        }
    }
    rematerialized += split_critical_brif_edges(func)?;
    Ok(rematerialized)
}

/// Splits `brif` arms that are critical: the target has more than one
/// predecessor and the arm carries arguments. Each such arm gets a fresh
/// block holding only a `jump` with the original argument list, so every
/// block with more than one incoming edge that still has live block
/// parameters is guaranteed (post-split) to receive its arguments from a
/// single-predecessor thunk rather than directly from a multi-successor
/// branch.
fn split_critical_brif_edges(func: &mut Function) -> CodegenResult<usize> {
    let mut split = 0;
    let blocks = func.layout.order.clone();
    for block in blocks {
        let terminator = match func.block_terminator(block) {
            Some(t) => t,
            None => continue,
        };
        if func.dfg.inst_data(terminator).opcode() != Opcode::Brif {
            continue;
        }
        for (target, args) in func
            .dfg
            .inst_data(terminator)
            .branch_targets()
            .iter()
            .map(|(b, a)| (*b, a.to_vec()))
            .collect::<Vec<_>>()
        {
            if args.is_empty() || func.blocks[target].preds.len() <= 1 {
                continue;
            }
            let thunk = retarget_through_thunk(func, block, terminator, target, &args);
            split += 1;
            let _ = thunk;
        }
    }
    Ok(split)
}

fn retarget_through_thunk(
    func: &mut Function,
    source: Block,
    terminator: crate::ir::Inst,
    target: Block,
    args: &[Value],
) -> Block {
    let thunk = func.blocks.push(BlockData::default());
    func.layout.order.push(thunk);

    let jump_data = InstructionData::Jump {
        opcode: Opcode::Jump,
        destination: target,
        args: args.iter().copied().collect(),
    };
    let jump_inst = func.dfg.make_inst(jump_data);
    func.blocks[thunk].insts.push(jump_inst);
    func.blocks[thunk].sealed = true;

    // Retarget the original arm at the thunk, with no arguments (they
    // now live on the thunk's own jump).
    match func.dfg.inst_data_mut(terminator) {
        InstructionData::Brif {
            then_dest,
            then_args,
            else_dest,
            else_args,
            ..
        } => {
            if *then_dest == target {
                *then_dest = thunk;
                then_args.clear();
            }
            if *else_dest == target {
                *else_dest = thunk;
                else_args.clear();
            }
        }
        _ => unreachable!("caller only invokes this for brif terminators"),
    }

    // Move the predecessor edge for this arm from `source` to `thunk`,
    // and give the thunk its own single-predecessor edge into `target`.
    func.blocks[target]
        .preds
        .retain(|e| !(e.block == source && e.inst == terminator));
    func.blocks[target].preds.push(PredEdge {
        block: thunk,
        inst: jump_inst,
    });

    thunk
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CallConv, Signature, Type};
    use crate::passes::remove_unreachable_blocks;
    use crate::ssa::FunctionBuilder;

    #[test]
    fn constant_branch_argument_is_rematerialized_locally() {
        let mut sig = Signature::new(CallConv::AppleAarch64);
        sig.results.push(Type::I32);
        let mut func = Function::new("f", sig);
        let mut b = FunctionBuilder::new(&mut func);

        let entry = b.allocate_block();
        let join = b.allocate_block();
        let p = b.append_block_param(join, Type::I32);

        b.set_current(entry);
        let c = b.iconst(Type::I32, 42).unwrap();
        b.jump(join, &[c]).unwrap();
        b.seal_block(join).unwrap();
        b.seal_block(entry).unwrap();
        func.entry = Some(entry);

        b.set_current(join);
        b.return_(&[p]).unwrap();

        remove_unreachable_blocks(&mut func).unwrap();
        let n = split_constant_arg_edges(&mut func).unwrap();
        assert_eq!(n, 1);
        // The jump in `entry` now references a second, locally-defined
        // constant instead of reusing `c`.
        let term = func.block_terminator(entry).unwrap();
        let args = func.dfg.inst_data(term).arguments();
        assert_ne!(args[0], c);
    }

    #[test]
    fn critical_brif_edges_each_get_their_own_thunk_block() {
        let mut sig = Signature::new(CallConv::AppleAarch64);
        sig.params.push(Type::I32);
        sig.results.push(Type::I32);
        let mut func = Function::new("f", sig);
        let mut b = FunctionBuilder::new(&mut func);

        let entry = b.allocate_block();
        let join = b.allocate_block();
        let p = b.append_block_param(join, Type::I32);

        b.set_current(entry);
        let cond = b.append_block_param(entry, Type::I32);
        let a = b.iadd(cond, cond).unwrap();
        let s = b.isub(cond, cond).unwrap();
        b.brif(cond, join, &[a], join, &[s]).unwrap();
        b.seal_block(entry).unwrap();
        b.seal_block(join).unwrap();
        func.entry = Some(entry);

        b.set_current(join);
        b.return_(&[p]).unwrap();

        remove_unreachable_blocks(&mut func).unwrap();
        let before = func.blocks.len();
        split_constant_arg_edges(&mut func).unwrap();
        assert_eq!(func.blocks.len(), before + 2);
        let term = func.block_terminator(entry).unwrap();
        match func.dfg.inst_data(term) {
            InstructionData::Brif {
                then_args,
                else_args,
                then_dest,
                else_dest,
                ..
            } => {
                assert!(then_args.is_empty());
                assert!(else_args.is_empty());
                assert_ne!(then_dest, else_dest);
            }
            _ => panic!("expected brif"),
        }
    }
}
