//! Bottom-up instruction selection (spec §4.4): walks a finished,
//! pass-pipelined [`Function`] in block-layout order and lowers each SSA
//! instruction to one or more [`Inst`]s operating on [`VReg`]s, mirroring
//! the dispatch-table shape of `cranelift_codegen::isa::x64::lower::lower`
//! (one arm per `Opcode`, each arm free to emit a short instruction
//! sequence rather than a single opcode-to-opcode mapping).
//!
//! Resolves spec §9's open question on block-parameter copies: parallel
//! copies into a successor's parameters are lowered here, before register
//! allocation, as plain `Mov`/`FMov` instructions between VRegs — the
//! allocator sees them as ordinary instructions with no special handling
//! required, at the cost of occasionally copying into a VReg the
//! allocator later coalesces away.

use crate::abi::{
    compute_abi, ABIArg, ABISignature, MODULE_CONTEXT_PINNED_REG, MODULE_CONTEXT_REG,
    RETURN_AREA_PTR_REG, VM_CONTEXT_PINNED_REG, VM_CONTEXT_REG,
};
use crate::error::{CodegenError, CodegenResult, Stage};
use crate::ir::{
    Block, Function, FuncIndex, GlobalIndex, Inst as IrInst, InstructionData, Opcode, Signature,
    SignatureIndex, Type, Value,
};
use crate::isa::aarch64::inst::{AluOp, CallTarget, Cond, FpuOp, Inst, MemSize};
use crate::isa::aarch64::regs::RReg;
use crate::regclass::RegClass;
use crate::vreg::{Reg, VReg, VRegTable};
use hashbrown::HashMap;

/// The module-context collaborator instruction selection needs: the
/// signature of a function it's about to call, direct or indirect.
/// A fuller version of this trait, covering the rest of module lookup,
/// lives with the frontend (spec §6); lowering only ever needs this much.
pub trait SignatureProvider {
    fn direct_signature(&self, func: FuncIndex) -> Signature;
    fn indirect_signature(&self, sig: SignatureIndex) -> Signature;
}

/// The state instruction selection hands to register allocation: the
/// per-block machine instruction streams plus the side tables the
/// allocator and finalizer need.
pub struct LoweredFunction {
    pub vregs: VRegTable,
    pub abi: ABISignature,
    pub entry: Block,
    pub order: Vec<Block>,
    pub blocks: HashMap<Block, Vec<Inst>>,
    /// `(vreg, caller stack offset, size)` triples the prologue must
    /// reload from the incoming stack-argument area once the frame
    /// layout is known.
    pub incoming_stack_args: Vec<(VReg, i32, MemSize)>,
    /// Worst-case scratch bytes any call site in this function needs for
    /// an outgoing multi-value return area. A single region is shared by
    /// every call site since calls never overlap in straight-line code.
    pub return_area_bytes: u32,
}

fn class_of(ty: Type) -> RegClass {
    if ty.is_float_class() {
        RegClass::Float
    } else {
        RegClass::Int
    }
}

fn size_of(ty: Type) -> MemSize {
    match ty.bytes() {
        1 => MemSize::S8,
        2 => MemSize::S16,
        4 => MemSize::S32,
        _ => MemSize::S64,
    }
}

fn copy(class: RegClass, rd: Reg, rm: Reg) -> Inst {
    if class == RegClass::Float {
        Inst::FMov { rd, rm }
    } else {
        Inst::Mov { rd, rm }
    }
}

pub fn lower_function(
    func: &Function,
    sigs: &dyn SignatureProvider,
) -> CodegenResult<LoweredFunction> {
    let entry = func.entry.ok_or_else(|| {
        CodegenError::structural(Stage::InstructionSelection, None, "function has no entry block")
    })?;
    let abi = compute_abi(&func.signature);
    let mut vregs = VRegTable::new();
    let mut locs: HashMap<Value, Reg> = HashMap::new();
    let mut block_params: HashMap<Block, Vec<VReg>> = HashMap::new();
    let mut incoming_stack_args = Vec::new();

    // Pass A: pre-allocate every block's parameter VRegs so a branch can
    // always resolve a forward-referenced (or back-edge) target.
    for &block in &func.layout.order {
        let params = &func.blocks[block].params;
        let mut vs = Vec::with_capacity(params.len());
        for (i, &p) in params.iter().enumerate() {
            let ty = func.dfg.value_type(p);
            let class = class_of(ty);
            let vreg = if block == entry {
                match abi.params.get(i) {
                    Some(ABIArg::Register(r)) => vregs.alloc_pinned(class, *r),
                    Some(ABIArg::Stack(off)) => {
                        let v = vregs.alloc(class);
                        incoming_stack_args.push((v, *off, size_of(ty)));
                        v
                    }
                    _ => vregs.alloc(class),
                }
            } else {
                vregs.alloc(class)
            };
            locs.insert(p, Reg::Virtual(vreg));
            vs.push(vreg);
        }
        block_params.insert(block, vs);
    }

    let return_area_vreg = if abi.needs_return_area {
        Some(vregs.alloc_pinned(RegClass::Int, RETURN_AREA_PTR_REG))
    } else {
        None
    };

    let mut blocks_out: HashMap<Block, Vec<Inst>> = HashMap::new();
    let mut return_area_bytes = 0u32;

    for &block in &func.layout.order {
        let mut out = blocks_out.remove(&block).unwrap_or_default();
        for &inst in &func.blocks[block].insts {
            lower_inst(
                func,
                inst,
                sigs,
                &abi,
                return_area_vreg,
                &mut vregs,
                &mut locs,
                &block_params,
                &mut blocks_out,
                &mut out,
                &mut return_area_bytes,
            )?;
        }
        blocks_out.insert(block, out);
    }

    Ok(LoweredFunction {
        vregs,
        abi,
        entry,
        order: func.layout.order.clone(),
        blocks: blocks_out,
        incoming_stack_args,
        return_area_bytes,
    })
}

fn emit_param_copies_front(
    blocks_out: &mut HashMap<Block, Vec<Inst>>,
    block_params: &HashMap<Block, Vec<VReg>>,
    locs: &HashMap<Value, Reg>,
    vregs: &VRegTable,
    target: Block,
    args: &[Value],
) {
    if args.is_empty() {
        return;
    }
    let param_vregs = &block_params[&target];
    let mut copies = Vec::with_capacity(args.len());
    for (&pv, &arg) in param_vregs.iter().zip(args.iter()) {
        copies.push(copy(vregs.class(pv), Reg::Virtual(pv), locs[&arg]));
    }
    blocks_out.entry(target).or_insert_with(Vec::new).splice(0..0, copies);
}

#[allow(clippy::too_many_arguments)]
fn lower_inst(
    func: &Function,
    inst: IrInst,
    sigs: &dyn SignatureProvider,
    abi: &ABISignature,
    return_area_vreg: Option<VReg>,
    vregs: &mut VRegTable,
    locs: &mut HashMap<Value, Reg>,
    block_params: &HashMap<Block, Vec<VReg>>,
    blocks_out: &mut HashMap<Block, Vec<Inst>>,
    out: &mut Vec<Inst>,
    return_area_bytes: &mut u32,
) -> CodegenResult<()> {
    let data = func.dfg.inst_data(inst).clone();
    let results = func.dfg.inst_results(inst).to_vec();
    let reg_of = |locs: &HashMap<Value, Reg>, v: Value| locs[&v];

    match data {
        InstructionData::UnaryImm64 { imm, .. } => {
            let ty = func.dfg.value_type(results[0]);
            let rd = Reg::Virtual(vregs.alloc(RegClass::Int));
            if (0..=0xFFFF).contains(&imm) {
                out.push(Inst::MovZ { rd, imm16: imm as u16, shift: 0 });
            } else {
                out.push(Inst::LoadLiteral { rd, bits: imm as u64, is_float: false });
            }
            let _ = ty;
            locs.insert(results[0], rd);
        }
        InstructionData::UnaryImmF32 { bits, .. } => {
            let rd = Reg::Virtual(vregs.alloc(RegClass::Float));
            out.push(Inst::LoadLiteral { rd, bits: bits as u64, is_float: true });
            locs.insert(results[0], rd);
        }
        InstructionData::UnaryImmF64 { bits, .. } => {
            let rd = Reg::Virtual(vregs.alloc(RegClass::Float));
            out.push(Inst::LoadLiteral { rd, bits, is_float: true });
            locs.insert(results[0], rd);
        }
        InstructionData::Binary { opcode, args } => {
            let ty = func.dfg.value_type(results[0]);
            let rn = reg_of(locs, args[0]);
            let rm = reg_of(locs, args[1]);
            let rd = Reg::Virtual(vregs.alloc(class_of(ty)));
            match opcode {
                Opcode::Iadd => out.push(Inst::AluRRR { op: AluOp::Add, rd, rn, rm }),
                Opcode::Isub => out.push(Inst::AluRRR { op: AluOp::Sub, rd, rn, rm }),
                Opcode::Imul => out.push(Inst::AluRRR { op: AluOp::Mul, rd, rn, rm }),
                Opcode::Fadd => out.push(Inst::FpuRRR { op: FpuOp::Add, rd, rn, rm }),
                Opcode::Fsub => out.push(Inst::FpuRRR { op: FpuOp::Sub, rd, rn, rm }),
                Opcode::Fmul => out.push(Inst::FpuRRR { op: FpuOp::Mul, rd, rn, rm }),
                Opcode::Fdiv => out.push(Inst::FpuRRR { op: FpuOp::Div, rd, rn, rm }),
                _ => {
                    return Err(CodegenError::internal(
                        Stage::InstructionSelection,
                        None,
                        format!("{:?} is not a binary op", opcode),
                    ))
                }
            }
            locs.insert(results[0], rd);
        }
        InstructionData::IntCompare { cond, args, .. } => {
            let rn = reg_of(locs, args[0]);
            let rm = reg_of(locs, args[1]);
            let discard = Reg::Virtual(vregs.alloc(RegClass::Int));
            out.push(Inst::AluRRR { op: AluOp::SubsDiscard, rd: discard, rn, rm });
            let rd = Reg::Virtual(vregs.alloc(RegClass::Int));
            out.push(Inst::CSet { rd, cond: cond.to_aarch64_cond() });
            locs.insert(results[0], rd);
        }
        InstructionData::FloatCompare { cond, args, .. } => {
            let rn = reg_of(locs, args[0]);
            let rm = reg_of(locs, args[1]);
            out.push(Inst::Fcmp { rn, rm });
            let rd = Reg::Virtual(vregs.alloc(RegClass::Int));
            out.push(Inst::CSet { rd, cond: cond.to_aarch64_cond() });
            locs.insert(results[0], rd);
        }
        InstructionData::Unary { opcode: Opcode::Uextend, arg } => {
            // Zero-extending a 32-bit index into a 64-bit pointer-arithmetic
            // value is a plain register copy in this core's model: ALU and
            // move forms are uniformly encoded at 32-bit width (`encode`'s
            // `enc_logical_reg`/`enc_mov_reg`), so writing the low 32 bits
            // already zeroes the rest of the destination register.
            let rn = reg_of(locs, arg);
            let rd = Reg::Virtual(vregs.alloc(RegClass::Int));
            out.push(copy(RegClass::Int, rd, rn));
            locs.insert(results[0], rd);
        }
        InstructionData::Unary { opcode, arg } => {
            // FcvtToSint and FcvtToSintSat share one lowering: AArch64's
            // `fcvtzs` is architecturally saturating and maps NaN to
            // zero already. The frontend is responsible for decomposing
            // a *trapping* wasm conversion into an explicit NaN check
            // plus this non-trapping op (spec §9: traps are explicit IR
            // control flow, never hidden inside an instruction-selection
            // decision); this arm exists so a bare `FcvtToSint` still
            // lowers correctly if it ever reaches the backend undecomposed.
            debug_assert!(matches!(opcode, Opcode::FcvtToSint | Opcode::FcvtToSintSat));
            let ty = func.dfg.value_type(results[0]);
            let rn = reg_of(locs, arg);
            let rd = Reg::Virtual(vregs.alloc(class_of(ty)));
            out.push(Inst::Fcvtzs { rd, rn });
            locs.insert(results[0], rd);
        }
        InstructionData::Load { base, offset, .. } => {
            let ty = func.dfg.value_type(results[0]);
            let rn = reg_of(locs, base);
            let rd = Reg::Virtual(vregs.alloc(class_of(ty)));
            out.push(Inst::Load { rd, rn, offset, size: size_of(ty), signed: false });
            locs.insert(results[0], rd);
        }
        InstructionData::Store { value, base, offset, .. } => {
            let ty = func.dfg.value_type(value);
            out.push(Inst::Store {
                rt: reg_of(locs, value),
                rn: reg_of(locs, base),
                offset,
                size: size_of(ty),
            });
        }
        InstructionData::GlobalAccess { global, value, .. } => {
            let offset = global_offset(global);
            match value {
                None => {
                    let ty = func.dfg.value_type(results[0]);
                    let rd = Reg::Virtual(vregs.alloc(class_of(ty)));
                    out.push(Inst::Load {
                        rd,
                        rn: Reg::Real(VM_CONTEXT_PINNED_REG),
                        offset,
                        size: size_of(ty),
                        signed: false,
                    });
                    locs.insert(results[0], rd);
                }
                Some(v) => {
                    let ty = func.dfg.value_type(v);
                    out.push(Inst::Store {
                        rt: reg_of(locs, v),
                        rn: Reg::Real(VM_CONTEXT_PINNED_REG),
                        offset,
                        size: size_of(ty),
                    });
                }
            }
        }
        InstructionData::VmAccess { offset, value, .. } => {
            match value {
                None => {
                    let ty = func.dfg.value_type(results[0]);
                    let rd = Reg::Virtual(vregs.alloc(class_of(ty)));
                    out.push(Inst::Load {
                        rd,
                        rn: Reg::Real(VM_CONTEXT_PINNED_REG),
                        offset,
                        size: size_of(ty),
                        signed: false,
                    });
                    locs.insert(results[0], rd);
                }
                Some(v) => {
                    let ty = func.dfg.value_type(v);
                    out.push(Inst::Store {
                        rt: reg_of(locs, v),
                        rn: Reg::Real(VM_CONTEXT_PINNED_REG),
                        offset,
                        size: size_of(ty),
                    });
                }
            }
        }
        InstructionData::Call { func_ref, args, .. } => {
            let callee_sig = sigs.direct_signature(func_ref.0);
            let callee_abi = compute_abi(&callee_sig);
            lower_call(
                CallTarget::Direct(func_ref.0),
                &args,
                &results,
                &callee_abi,
                func,
                vregs,
                locs,
                out,
                return_area_bytes,
            );
        }
        InstructionData::CallIndirect { sig, callee, args, .. } => {
            let callee_sig = sigs.indirect_signature(sig);
            let callee_abi = compute_abi(&callee_sig);
            let callee_reg = reg_of(locs, callee);
            lower_call(
                CallTarget::Indirect(callee_reg),
                &args,
                &results,
                &callee_abi,
                func,
                vregs,
                locs,
                out,
                return_area_bytes,
            );
        }
        InstructionData::Jump { destination, args, .. } => {
            for (&pv, &arg) in block_params[&destination].iter().zip(args.iter()) {
                out.push(copy(vregs.class(pv), Reg::Virtual(pv), reg_of(locs, arg)));
            }
            out.push(Inst::Jump { target: destination });
        }
        InstructionData::Brif { cond, then_dest, then_args, else_dest, else_args, .. } => {
            let cond_reg = reg_of(locs, cond);
            let discard = Reg::Virtual(vregs.alloc(RegClass::Int));
            out.push(Inst::AluRRImm12 { op: AluOp::SubsDiscard, rd: discard, rn: cond_reg, imm12: 0 });
            emit_param_copies_front(blocks_out, block_params, locs, vregs, then_dest, &then_args);
            emit_param_copies_front(blocks_out, block_params, locs, vregs, else_dest, &else_args);
            out.push(Inst::CondBr { cond: Cond::Ne, taken: then_dest });
            out.push(Inst::Jump { target: else_dest });
        }
        InstructionData::MultiReturn { args, .. } => {
            for (i, &arg) in args.iter().enumerate() {
                let ty = func.dfg.value_type(arg);
                match abi.results[i] {
                    ABIArg::Register(r) => out.push(copy(class_of(ty), Reg::Real(r), reg_of(locs, arg))),
                    ABIArg::ReturnArea(off) => out.push(Inst::Store {
                        rt: reg_of(locs, arg),
                        rn: Reg::Virtual(return_area_vreg.expect("return area vreg pinned")),
                        offset: off,
                        size: size_of(ty),
                    }),
                    ABIArg::Stack(_) => unreachable!("results never use the stack directly"),
                }
            }
            out.push(Inst::Ret);
        }
        InstructionData::Trap { code, .. } => {
            out.push(Inst::TrapExit { code });
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn lower_call(
    target: CallTarget,
    args: &[Value],
    results: &[Value],
    callee_abi: &ABISignature,
    func: &Function,
    vregs: &mut VRegTable,
    locs: &mut HashMap<Value, Reg>,
    out: &mut Vec<Inst>,
    return_area_bytes: &mut u32,
) {
    out.push(copy(RegClass::Int, Reg::Real(MODULE_CONTEXT_REG), Reg::Real(MODULE_CONTEXT_PINNED_REG)));
    out.push(copy(RegClass::Int, Reg::Real(VM_CONTEXT_REG), Reg::Real(VM_CONTEXT_PINNED_REG)));

    for (i, &arg) in args.iter().enumerate() {
        let ty = func.dfg.value_type(arg);
        let arg_reg = locs[&arg];
        match callee_abi.params[i] {
            ABIArg::Register(r) => out.push(copy(class_of(ty), Reg::Real(r), arg_reg)),
            ABIArg::Stack(off) => out.push(Inst::Store {
                rt: arg_reg,
                rn: Reg::Real(RReg::Sp),
                offset: off,
                size: size_of(ty),
            }),
            ABIArg::ReturnArea(_) => unreachable!("params never use the return area"),
        }
    }

    if callee_abi.needs_return_area {
        // A fixed, worst-case-sized scratch region shared by every call
        // site in the function (calls never overlap in straight-line
        // code), rather than computing a precise per-callee size.
        *return_area_bytes = (*return_area_bytes).max(64);
        out.push(Inst::ReturnAreaAddr { rd: Reg::Real(RETURN_AREA_PTR_REG), offset: 0 });
    }

    out.push(Inst::Call { target });

    for (i, &result) in results.iter().enumerate() {
        let ty = func.dfg.value_type(result);
        let rd = Reg::Virtual(vregs.alloc(class_of(ty)));
        match callee_abi.results[i] {
            ABIArg::Register(r) => out.push(copy(class_of(ty), rd, Reg::Real(r))),
            ABIArg::ReturnArea(off) => out.push(Inst::Load {
                rd,
                rn: Reg::Real(RETURN_AREA_PTR_REG),
                offset: off,
                size: size_of(ty),
                signed: false,
            }),
            ABIArg::Stack(_) => unreachable!("results never use the stack directly"),
        }
        locs.insert(result, rd);
    }
}

/// Fixed 8-byte-slot layout for the module's global variables off the
/// pinned vm-context register. A real module environment would supply
/// per-global byte offsets (they may differ in size); this core assumes
/// a uniform slot width, documented in `DESIGN.md` as a scope reduction.
fn global_offset(global: GlobalIndex) -> i32 {
    use crate::entity::EntityRef;
    (global.index() as i32) * 8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CallConv, MemFlags, TrapCode};
    use crate::passes::run_passes;
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

    #[test]
    fn add_const_lowers_to_one_block_of_machine_insts() {
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

        run_passes(&mut func).unwrap();
        let lowered = lower_function(&func, &NoCallees).unwrap();
        let body = &lowered.blocks[&lowered.entry];
        assert!(body.iter().any(|i| matches!(i, Inst::MovZ { .. } | Inst::LoadLiteral { .. })));
        assert!(body.iter().any(|i| matches!(i, Inst::AluRRR { op: AluOp::Add, .. })));
        assert!(matches!(body.last(), Some(Inst::Ret)));
    }

    #[test]
    fn oob_trap_block_lowers_to_trap_exit() {
        let mut sig = Signature::new(CallConv::AppleAarch64);
        sig.params.push(Type::I32);
        let mut func = Function::new("maybe_trap", sig);
        let mut b = FunctionBuilder::new(&mut func);
        let entry = b.allocate_block();
        let ok = b.allocate_block();
        let trap = b.allocate_block();
        let cond = b.append_block_param(entry, Type::I32);
        b.set_current(entry);
        b.brif(cond, ok, &[], trap, &[]).unwrap();
        b.seal_block(ok).unwrap();
        b.seal_block(trap).unwrap();
        b.seal_block(entry).unwrap();
        func.entry = Some(entry);

        b.set_current(ok);
        b.return_(&[]).unwrap();
        b.set_current(trap);
        b.trap(TrapCode::OutOfBoundsMemoryAccess).unwrap();

        run_passes(&mut func).unwrap();
        let lowered = lower_function(&func, &NoCallees).unwrap();
        let trap_body: Vec<&Inst> = lowered
            .blocks
            .values()
            .flat_map(|insts| insts.iter())
            .filter(|i| matches!(i, Inst::TrapExit { .. }))
            .collect();
        assert_eq!(trap_body.len(), 1);
        let _ = MemFlags::default();
    }
}
