//! Finalization (spec §4.6): prologue/epilogue insertion with callee-saved
//! save/restore and an optional stack-overflow probe (F1/F2), and
//! resolving the return-area pseudo-op once the frame is sized. The
//! `TrapExit` pseudo-op is left untouched here and expanded by `encode`
//! (spec §9: "every trap is a branch to a tail that writes a structured
//! record"), since only the encoder knows the byte offset the resulting
//! trap-site record needs. Branch-offset resolution and long-branch/
//! trampoline expansion (F3/F4) happen there too, for the same reason.

use crate::abi::{ABISignature, MODULE_CONTEXT_PINNED_REG, MODULE_CONTEXT_REG, STACK_LIMIT_OFFSET, VM_CONTEXT_PINNED_REG};
use crate::config::Flags;
use crate::entity::EntityRef;
use crate::ir::{Block, TrapCode};
use crate::isa::aarch64::inst::{AluOp, Cond, Inst, MemSize};
use crate::isa::aarch64::regs::{RReg, TEMP_INT_REGS};
use crate::regalloc::{AllocatedFunction, Location};
use crate::vreg::Reg;
use hashbrown::HashMap;

/// The saved frame-pointer/link-register pair the prologue pushes ahead
/// of everything else; `[fp, #0]` is the caller's fp, `[fp, #8]` is the
/// return address, matching AAPCS64's frame-record convention.
const FP_LR_BYTES: i32 = 16;

pub struct FinalizedFunction {
    pub entry: Block,
    pub order: Vec<Block>,
    pub blocks: HashMap<Block, Vec<Inst>>,
    pub abi: ABISignature,
    /// Total stack frame size below the saved fp/lr pair, 16-byte
    /// aligned (spec I8).
    pub frame_size: u32,
}

fn align_to(n: u32, align: u32) -> u32 {
    (n + align - 1) / align * align
}

/// A synthetic block id for the stack-overflow probe's trap target, well
/// outside the range any real function populates (spec §9: blocks are
/// arena-indexed handles; minting one here for a finalize-only block is
/// the same mechanism the SSA passes use, just a single extra entry never
/// touched by a prior pass).
fn probe_trap_block() -> Block {
    Block::new(u32::MAX as usize - 1)
}

fn reg_real(r: RReg) -> Reg {
    Reg::Real(r)
}

fn epilogue(frame_size: u32, callee_saved_offset: u32, used_callee_saved: &[RReg]) -> Vec<Inst> {
    let mut out = Vec::new();
    restore_or_save_pairs(used_callee_saved, callee_saved_offset, &mut out, true);
    out.push(Inst::LoadPair {
        rt: reg_real(RReg::FP),
        rt2: reg_real(RReg::LR),
        offset: (frame_size as i32) - FP_LR_BYTES,
    });
    out.push(Inst::AddImmSp { imm: frame_size });
    out.push(Inst::Ret);
    out
}

fn restore_or_save_pairs(regs: &[RReg], base_offset: u32, out: &mut Vec<Inst>, is_restore: bool) {
    let mut chunks = regs.chunks_exact(2);
    let mut offset = base_offset as i32;
    for pair in &mut chunks {
        if is_restore {
            out.push(Inst::LoadPair { rt: reg_real(pair[0]), rt2: reg_real(pair[1]), offset });
        } else {
            out.push(Inst::StorePair { rt: reg_real(pair[0]), rt2: reg_real(pair[1]), offset });
        }
        offset += 16;
    }
    if let [last] = chunks.remainder() {
        if is_restore {
            out.push(Inst::Load {
                rd: reg_real(*last),
                rn: reg_real(RReg::Sp),
                offset,
                size: MemSize::S64,
                signed: false,
            });
        } else {
            out.push(Inst::Store {
                rt: reg_real(*last),
                rn: reg_real(RReg::Sp),
                offset,
                size: MemSize::S64,
            });
        }
    }
}

/// Finalizes a register-allocated function (spec §4.6): computes the
/// frame layout, inserts the prologue and an epilogue ahead of every
/// `Ret`, resolves `ReturnAreaAddr`, and wires in the optional
/// stack-overflow probe's trap block.
pub fn finalize(func: AllocatedFunction, flags: &Flags) -> crate::error::CodegenResult<FinalizedFunction> {
    let AllocatedFunction {
        entry,
        order,
        blocks,
        abi,
        used_callee_saved,
        spill_slot_count,
        incoming_stack_args,
        return_area_bytes,
    } = func;

    let spill_bytes = spill_slot_count * 16;
    let callee_saved_offset = return_area_bytes;
    let callee_saved_bytes = align_to(used_callee_saved.len() as u32 * 8, 8);
    let frame_size = align_to(FP_LR_BYTES as u32 + callee_saved_bytes + spill_bytes + return_area_bytes, 16);
    let fp_lr_offset = frame_size - FP_LR_BYTES as u32;

    let mut new_blocks: HashMap<Block, Vec<Inst>> = HashMap::new();

    for &b in &order {
        let body = blocks.get(&b).cloned().unwrap_or_default();
        let mut out = Vec::with_capacity(body.len() + 4);
        for inst in body {
            match inst {
                Inst::ReturnAreaAddr { rd, offset } => {
                    out.push(Inst::AluRRImm12 {
                        op: AluOp::Add,
                        rd,
                        rn: reg_real(RReg::Sp),
                        imm12: offset as u32,
                    });
                }
                Inst::Ret => {
                    out.extend(epilogue(frame_size, callee_saved_offset, &used_callee_saved));
                }
                other => out.push(other),
            }
        }
        new_blocks.insert(b, out);
    }

    let mut prologue = Vec::new();
    prologue.push(Inst::SubImmSp { imm: frame_size });
    prologue.push(Inst::StorePair {
        rt: reg_real(RReg::FP),
        rt2: reg_real(RReg::LR),
        offset: fp_lr_offset as i32,
    });
    prologue.push(Inst::AluRRImm12 {
        op: AluOp::Add,
        rd: reg_real(RReg::FP),
        rn: reg_real(RReg::Sp),
        imm12: fp_lr_offset,
    });
    prologue.push(Inst::Mov { rd: reg_real(MODULE_CONTEXT_PINNED_REG), rm: reg_real(MODULE_CONTEXT_REG) });
    prologue.push(Inst::Mov { rd: reg_real(VM_CONTEXT_PINNED_REG), rm: reg_real(VM_CONTEXT_REG) });
    restore_or_save_pairs(&used_callee_saved, callee_saved_offset, &mut prologue, false);

    for (loc, caller_off, size) in &incoming_stack_args {
        // Caller-side stack arguments sit just above our frame record,
        // at `[fp, #FP_LR_BYTES + caller_off]` (spec §6 call ABI).
        let reload_offset = FP_LR_BYTES + caller_off;
        match loc {
            Location::Reg(r) => prologue.push(Inst::Load {
                rd: reg_real(*r),
                rn: reg_real(RReg::FP),
                offset: reload_offset,
                size: *size,
                signed: false,
            }),
            Location::Spill(slot) => {
                let t0 = TEMP_INT_REGS[0];
                prologue.push(Inst::Load {
                    rd: reg_real(t0),
                    rn: reg_real(RReg::FP),
                    offset: reload_offset,
                    size: *size,
                    signed: false,
                });
                prologue.push(Inst::Store {
                    rt: reg_real(t0),
                    rn: reg_real(RReg::Sp),
                    offset: (*slot as i32) * 16,
                    size: *size,
                });
            }
        }
    }

    if flags.emit_stack_overflow_check {
        let limit = TEMP_INT_REGS[0];
        let discard = TEMP_INT_REGS[1];
        prologue.push(Inst::Load {
            rd: reg_real(limit),
            rn: reg_real(VM_CONTEXT_PINNED_REG),
            offset: STACK_LIMIT_OFFSET,
            size: MemSize::S64,
            signed: false,
        });
        prologue.push(Inst::AluRRR {
            op: AluOp::SubsDiscard,
            rd: reg_real(discard),
            rn: reg_real(RReg::Sp),
            rm: reg_real(limit),
        });
        let trap_block = probe_trap_block();
        prologue.push(Inst::CondBr { cond: Cond::Lo, taken: trap_block });
        new_blocks.insert(trap_block, vec![Inst::TrapExit { code: TrapCode::StackOverflow }]);
    }

    let mut full_order = order;
    if flags.emit_stack_overflow_check {
        full_order.push(probe_trap_block());
    }

    let entry_body = new_blocks.remove(&entry).unwrap_or_default();
    let mut spliced_entry = prologue;
    spliced_entry.extend(entry_body);
    new_blocks.insert(entry, spliced_entry);

    Ok(FinalizedFunction {
        entry,
        order: full_order,
        blocks: new_blocks,
        abi,
        frame_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlagsBuilder;
    use crate::ir::{CallConv, Function, Signature, Type};
    use crate::isa::aarch64::lower::{lower_function, SignatureProvider};
    use crate::ir::{FuncIndex, SignatureIndex};
    use crate::passes::run_passes;
    use crate::regalloc::allocate;
    use crate::ssa::FunctionBuilder;

    struct NoCallees;
    impl SignatureProvider for NoCallees {
        fn direct_signature(&self, _func: FuncIndex) -> Signature {
            Signature::new(CallConv::AppleAarch64)
        }
        fn indirect_signature(&self, _sig: SignatureIndex) -> Signature {
            Signature::new(CallConv::AppleAarch64)
        }
    }

    fn build_add_const() -> Function {
        let mut sig = Signature::new(CallConv::AppleAarch64);
        sig.params.push(Type::I32);
        sig.results.push(Type::I32);
        let mut func = Function::new("add_const", sig);
        let mut b = FunctionBuilder::new(&mut func);
        let entry = b.allocate_block();
        let p = b.append_block_param(entry, Type::I32);
        b.set_current(entry);
        let c = b.iconst(Type::I32, 5).unwrap();
        let sum = b.iadd(p, c).unwrap();
        b.return_(&[sum]).unwrap();
        b.seal_block(entry).unwrap();
        func.entry = Some(entry);
        func
    }

    #[test]
    fn frame_size_is_16_byte_aligned_and_ret_gets_an_epilogue() {
        let mut func = build_add_const();
        run_passes(&mut func).unwrap();
        let lowered = lower_function(&func, &NoCallees).unwrap();
        let allocated = allocate(lowered).unwrap();
        let flags = FlagsBuilder::new().build();
        let finalized = finalize(allocated, &flags).unwrap();
        assert_eq!(finalized.frame_size % 16, 0);
        let entry_body = &finalized.blocks[&finalized.entry];
        assert!(entry_body.iter().any(|i| matches!(i, Inst::AddImmSp { .. })));
        assert!(matches!(entry_body.last(), Some(Inst::Ret)));
    }

    #[test]
    fn stack_overflow_probe_branches_to_its_own_trap_block() {
        let mut func = build_add_const();
        run_passes(&mut func).unwrap();
        let lowered = lower_function(&func, &NoCallees).unwrap();
        let allocated = allocate(lowered).unwrap();
        let flags = FlagsBuilder::new().emit_stack_overflow_check(true).build();
        let finalized = finalize(allocated, &flags).unwrap();
        let probe = probe_trap_block();
        assert!(finalized.blocks.contains_key(&probe));
        assert!(matches!(
            finalized.blocks[&probe].as_slice(),
            [Inst::TrapExit { code: TrapCode::StackOverflow }]
        ));
    }
}
