//! P2: trivial-phi elimination (spec §4.2). Any block parameter whose
//! incoming branch arguments are all the same value (or the parameter
//! itself) is replaced by that value; iterated to a fixed point. Runs
//! after the SSA builder has already collapsed the easy on-the-fly cases
//! (spec §4.1); this pass additionally catches parameters that became
//! trivial only once earlier blocks were simplified.

use crate::error::CodegenResult;
use crate::ir::{Function, Value};

pub fn eliminate_trivial_phis(func: &mut Function) -> CodegenResult<usize> {
    let mut total = 0;
    loop {
        let mut changed = false;
        let blocks = func.layout.order.clone();
        for block in blocks {
            let fixed_param_count = if Some(block) == func.entry {
                func.signature.params.len()
            } else {
                0
            };

            let mut idx = fixed_param_count;
            while idx < func.blocks[block].params.len() {
                let param = func.blocks[block].params[idx];
                let preds = func.blocks[block].preds.clone();
                if preds.is_empty() {
                    idx += 1;
                    continue;
                }

                let mut operands: Vec<Value> = Vec::with_capacity(preds.len());
                for pred in &preds {
                    for args in func.dfg.inst_data_mut(pred.inst).branch_args_mut(block) {
                        if idx < args.len() {
                            operands.push(args[idx]);
                        }
                    }
                }

                let mut unique: Option<Value> = None;
                let mut trivial = true;
                for &op in &operands {
                    if op == param {
                        continue;
                    }
                    match unique {
                        None => unique = Some(op),
                        Some(u) if u == op => {}
                        Some(_) => {
                            trivial = false;
                            break;
                        }
                    }
                }

                if trivial {
                    if let Some(canon) = unique {
                        for inst in func.blocks[block].insts.clone() {
                            func.dfg
                                .inst_data_mut(inst)
                                .map_values(|v| if v == param { canon } else { v });
                        }
                        func.blocks[block].params.remove(idx);
                        for pred in &preds {
                            for args in func.dfg.inst_data_mut(pred.inst).branch_args_mut(block) {
                                if idx < args.len() {
                                    args.remove(idx);
                                }
                            }
                        }
                        changed = true;
                        total += 1;
                        continue; // re-check same idx, list shifted left
                    }
                }
                idx += 1;
            }
        }
        if !changed {
            break;
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CallConv, Signature, Type};
    use crate::passes::remove_unreachable_blocks;
    use crate::ssa::FunctionBuilder;

    #[test]
    fn identical_join_arguments_collapse() {
        let mut sig = Signature::new(CallConv::AppleAarch64);
        sig.results.push(Type::I32);
        let mut func = Function::new("f", sig);
        let mut b = FunctionBuilder::new(&mut func);

        let entry = b.allocate_block();
        let t = b.allocate_block();
        let e = b.allocate_block();
        let join = b.allocate_block();
        let p = b.append_block_param(join, Type::I32);

        b.set_current(entry);
        let c = b.iconst(Type::I32, 1).unwrap();
        b.brif(c, t, &[], e, &[]).unwrap();
        b.seal_block(t).unwrap();
        b.seal_block(e).unwrap();

        b.set_current(t);
        let v1 = b.iconst(Type::I32, 9).unwrap();
        b.jump(join, &[v1]).unwrap();

        b.set_current(e);
        // Same constant value materialized independently on the other
        // edge (a distinct SSA value, equal by coincidence only in the
        // sense that both edges carry "the same fact"); the test exists
        // to prove *this* pass needs literal value identity, so we reuse
        // `v1` directly here to simulate a case the SSA builder itself
        // didn't already collapse (e.g. after an unrelated later
        // simplification made the two edges agree).
        b.jump(join, &[v1]).unwrap();

        b.seal_block(join).unwrap();
        b.seal_block(entry).unwrap();
        func.entry = Some(entry);

        b.set_current(join);
        b.return_(&[p]).unwrap();

        remove_unreachable_blocks(&mut func).unwrap();
        let collapsed = eliminate_trivial_phis(&mut func).unwrap();
        assert_eq!(collapsed, 1);
        assert!(func.blocks[join].params.is_empty());
    }
}
