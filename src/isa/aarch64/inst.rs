//! AArch64 machine instructions: the pseudo-instruction stream produced
//! by instruction selection (spec §4.4), with [`crate::vreg::VReg`]
//! operands plus embedded real registers where the ABI forces them.
//! Mirrors the shape of `cranelift_codegen::isa::aarch64::inst::Inst`
//! (one big `enum Inst` with a case per instruction family) without
//! chasing that crate's full opcode coverage.

use crate::ir::{Block, TrapCode};
use crate::isa::aarch64::regs::RReg;
use crate::vreg::Reg;

/// A not-yet-resolved branch target: the SSA block it should land on.
/// The finalizer (§4.6 F3) assigns every label a byte offset.
pub type MachLabel = Block;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AluOp {
    Add,
    Sub,
    /// Subtract, discarding the result and keeping only flags (`cmp`).
    SubsDiscard,
    Mul,
    And,
    Orr,
    Eor,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FpuOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MemSize {
    S8,
    S16,
    S32,
    S64,
}

impl MemSize {
    pub fn bytes(self) -> u32 {
        match self {
            MemSize::S8 => 1,
            MemSize::S16 => 2,
            MemSize::S32 => 4,
            MemSize::S64 => 8,
        }
    }
}

/// AArch64 condition codes (the `cond` field of `b.cond`/`csel`/...).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Cond {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
    Lo,
    Hs,
    Hi,
    Ls,
    /// Unordered/overflow flag, used to detect NaN after an `fcmp`
    /// (spec S8: NaN-to-int trapping conversion).
    Vs,
}

impl crate::ir::IntCC {
    pub fn to_aarch64_cond(self) -> Cond {
        use crate::ir::IntCC::*;
        match self {
            Equal => Cond::Eq,
            NotEqual => Cond::Ne,
            SignedLessThan => Cond::Lt,
            SignedGreaterThanOrEqual => Cond::Ge,
            SignedGreaterThan => Cond::Gt,
            SignedLessThanOrEqual => Cond::Le,
            UnsignedLessThan => Cond::Lo,
            UnsignedGreaterThanOrEqual => Cond::Hs,
            UnsignedGreaterThan => Cond::Hi,
            UnsignedLessThanOrEqual => Cond::Ls,
        }
    }
}

impl crate::ir::FloatCC {
    pub fn to_aarch64_cond(self) -> Cond {
        use crate::ir::FloatCC::*;
        match self {
            Equal => Cond::Eq,
            NotEqual => Cond::Ne,
            LessThan => Cond::Lt,
            LessThanOrEqual => Cond::Le,
            GreaterThan => Cond::Gt,
            GreaterThanOrEqual => Cond::Ge,
            Unordered => Cond::Vs,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum CallTarget {
    Direct(crate::ir::FuncIndex),
    Indirect(Reg),
}

#[derive(Clone, Debug)]
pub enum Inst {
    /// `movz rd, #imm16, lsl #shift` — materializes one non-zero 16-bit
    /// chunk of a narrow constant (spec §4.4: "constants of narrow width
    /// use immediate-form instructions").
    MovZ { rd: Reg, imm16: u16, shift: u8 },
    /// `movk rd, #imm16, lsl #shift` — merges in another 16-bit chunk.
    MovK { rd: Reg, imm16: u16, shift: u8 },
    /// A wide constant loaded PC-relative from the function's literal
    /// pool (spec §4.4: "wider constants go via a literal pool").
    LoadLiteral { rd: Reg, bits: u64, is_float: bool },
    AluRRR { op: AluOp, rd: Reg, rn: Reg, rm: Reg },
    AluRRImm12 { op: AluOp, rd: Reg, rn: Reg, imm12: u32 },
    FpuRRR { op: FpuOp, rd: Reg, rn: Reg, rm: Reg },
    /// `fcmp rn, rm` — general float comparison, the machine form of
    /// `Fcmp`'s IR-level condition (spec S8). A comparison against NaN
    /// sets the V flag, which `Cond::Vs` reads to detect an unordered
    /// result (used by a trapping float-to-int conversion's NaN check).
    Fcmp { rn: Reg, rm: Reg },
    /// `fcvtzs`: ARM's convert-to-signed-integer is architecturally
    /// saturating and maps NaN to zero already, so this one instruction
    /// serves both the trapping and non-trapping IR ops; the trapping
    /// form is preceded by an explicit `Fcmp` (operand compared against
    /// itself) + `CondBr(Vs)` pair built at the IR level rather than
    /// fused into this instruction.
    Fcvtzs { rd: Reg, rn: Reg },
    Load { rd: Reg, rn: Reg, offset: i32, size: MemSize, signed: bool },
    Store { rt: Reg, rn: Reg, offset: i32, size: MemSize },
    Mov { rd: Reg, rm: Reg },
    FMov { rd: Reg, rm: Reg },
    /// `stp rt, rt2, [sp, #off]` — used by the prologue to save register
    /// pairs and by the allocator for spill stores.
    StorePair { rt: Reg, rt2: Reg, offset: i32 },
    LoadPair { rt: Reg, rt2: Reg, offset: i32 },
    /// A single-register spill store/reload (spec I5), when a pair isn't
    /// available.
    SpillStore { rt: Reg, offset: i32 },
    SpillReload { rt: Reg, offset: i32 },
    SubImmSp { imm: u32 },
    AddImmSp { imm: u32 },
    /// `cset rd, cond` — materializes a condition as a 0/1 integer value,
    /// the machine form of `icmp`'s i32 result.
    CSet { rd: Reg, cond: Cond },
    Jump { target: MachLabel },
    CondBr { cond: Cond, taken: MachLabel },
    Call { target: CallTarget },
    /// `br rn` — an unconditional, non-linking indirect branch. Used only
    /// by the expanded exit sequence, to tail-transfer into the runtime's
    /// trap handler address loaded from the module context.
    BrIndirect { target: Reg },
    Ret,
    /// Materializes the address of the function's shared multi-result
    /// return-area scratch slot, `offset` bytes into it. Resolved to a
    /// concrete `add rd, sp, #imm` once the finalizer knows the frame's
    /// total size (spec §4.6 F1/F2).
    ReturnAreaAddr { rd: Reg, offset: i32 },
    /// The canonical exit sequence (spec §4.4, §6): writes the trap code,
    /// stack pointer and return address into the module context and
    /// tail-branches to the runtime's fixed trap handler. Expanded to its
    /// constituent stores + branch by the encoder (spec §9: "every trap
    /// is a branch to a tail that writes a structured record").
    TrapExit { code: TrapCode },
}

impl Inst {
    /// Operand slots read by this instruction (not including `rd`/`rt`
    /// destinations), used by instruction selection and the allocator to
    /// build use-def chains.
    pub fn uses(&self) -> Vec<Reg> {
        match self {
            Inst::AluRRR { rn, rm, .. } => vec![*rn, *rm],
            Inst::AluRRImm12 { rn, .. } => vec![*rn],
            Inst::FpuRRR { rn, rm, .. } => vec![*rn, *rm],
            Inst::Fcmp { rn, rm } => vec![*rn, *rm],
            Inst::Fcvtzs { rn, .. } => vec![*rn],
            Inst::Load { rn, .. } => vec![*rn],
            Inst::Store { rt, rn, .. } => vec![*rt, *rn],
            Inst::Mov { rm, .. } => vec![*rm],
            Inst::FMov { rm, .. } => vec![*rm],
            Inst::StorePair { rt, rt2, .. } => vec![*rt, *rt2],
            Inst::SpillStore { rt, .. } => vec![*rt],
            Inst::Call { target: CallTarget::Indirect(r) } => vec![*r],
            Inst::BrIndirect { target } => vec![*target],
            _ => vec![],
        }
    }

    pub fn defs(&self) -> Vec<Reg> {
        match self {
            Inst::MovZ { rd, .. }
            | Inst::MovK { rd, .. }
            | Inst::LoadLiteral { rd, .. }
            | Inst::AluRRR { rd, .. }
            | Inst::AluRRImm12 { rd, .. }
            | Inst::FpuRRR { rd, .. }
            | Inst::Fcvtzs { rd, .. }
            | Inst::Load { rd, .. }
            | Inst::Mov { rd, .. }
            | Inst::FMov { rd, .. } => vec![*rd],
            Inst::LoadPair { rt, rt2, .. } => vec![*rt, *rt2],
            Inst::SpillReload { rt, .. } => vec![*rt],
            _ => vec![],
        }
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Inst::Call { .. })
    }

    pub fn branch_target(&self) -> Option<MachLabel> {
        match self {
            Inst::Jump { target } => Some(*target),
            Inst::CondBr { taken, .. } => Some(*taken),
            _ => None,
        }
    }

    /// Rewrites every register operand through `f(reg, is_def)`, used by
    /// the register allocator both for the final VReg→RReg substitution
    /// and for threading spill reloads/stores through one instruction at
    /// a time (spec §4.5).
    pub fn rewrite_regs(&mut self, mut f: impl FnMut(Reg, bool) -> Reg) {
        match self {
            Inst::MovZ { rd, .. } | Inst::MovK { rd, .. } | Inst::LoadLiteral { rd, .. } => {
                *rd = f(*rd, true);
            }
            Inst::AluRRR { rd, rn, rm, .. } => {
                *rn = f(*rn, false);
                *rm = f(*rm, false);
                *rd = f(*rd, true);
            }
            Inst::AluRRImm12 { rd, rn, .. } => {
                *rn = f(*rn, false);
                *rd = f(*rd, true);
            }
            Inst::FpuRRR { rd, rn, rm, .. } => {
                *rn = f(*rn, false);
                *rm = f(*rm, false);
                *rd = f(*rd, true);
            }
            Inst::Fcmp { rn, rm } => {
                *rn = f(*rn, false);
                *rm = f(*rm, false);
            }
            Inst::Fcvtzs { rd, rn } => {
                *rn = f(*rn, false);
                *rd = f(*rd, true);
            }
            Inst::Load { rd, rn, .. } => {
                *rn = f(*rn, false);
                *rd = f(*rd, true);
            }
            Inst::Store { rt, rn, .. } => {
                *rt = f(*rt, false);
                *rn = f(*rn, false);
            }
            Inst::Mov { rd, rm } | Inst::FMov { rd, rm } => {
                *rm = f(*rm, false);
                *rd = f(*rd, true);
            }
            Inst::StorePair { rt, rt2, .. } => {
                *rt = f(*rt, false);
                *rt2 = f(*rt2, false);
            }
            Inst::LoadPair { rt, rt2, .. } => {
                *rt = f(*rt, true);
                *rt2 = f(*rt2, true);
            }
            Inst::SpillStore { rt, .. } => {
                *rt = f(*rt, false);
            }
            Inst::SpillReload { rt, .. } => {
                *rt = f(*rt, true);
            }
            Inst::Call { target: CallTarget::Indirect(r) } => {
                *r = f(*r, false);
            }
            Inst::BrIndirect { target } => {
                *target = f(*target, false);
            }
            Inst::ReturnAreaAddr { rd, .. } => {
                *rd = f(*rd, true);
            }
            Inst::CSet { rd, .. } => {
                *rd = f(*rd, true);
            }
            Inst::SubImmSp { .. }
            | Inst::AddImmSp { .. }
            | Inst::Jump { .. }
            | Inst::CondBr { .. }
            | Inst::Call { target: CallTarget::Direct(_) }
            | Inst::Ret
            | Inst::TrapExit { .. } => {}
        }
    }
}

impl Cond {
    /// The condition that holds exactly when `self` does not (used to
    /// invert a fused compare-and-branch when the fallthrough edge, not
    /// the explicit one, is the taken one).
    pub fn invert(self) -> Cond {
        match self {
            Cond::Eq => Cond::Ne,
            Cond::Ne => Cond::Eq,
            Cond::Lt => Cond::Ge,
            Cond::Ge => Cond::Lt,
            Cond::Gt => Cond::Le,
            Cond::Le => Cond::Gt,
            Cond::Lo => Cond::Hs,
            Cond::Hs => Cond::Lo,
            Cond::Hi => Cond::Ls,
            Cond::Ls => Cond::Hi,
            Cond::Vs => Cond::Vs,
        }
    }
}

impl RReg {
    pub fn scratch(class: crate::regclass::RegClass) -> RReg {
        match class {
            crate::regclass::RegClass::Int => crate::isa::aarch64::regs::TEMP_INT_REGS[0],
            crate::regclass::RegClass::Float => crate::isa::aarch64::regs::TEMP_FLOAT_REGS[0],
        }
    }
}
