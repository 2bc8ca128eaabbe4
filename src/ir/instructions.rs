//! Instruction opcodes and their operand shapes.
//!
//! Mirrors the `cranelift_codegen::ir::{Opcode, InstructionData}` split:
//! `Opcode` names the operation, `InstructionData` is a tagged union
//! carrying the operation's typed inputs and optional immediate payload
//! (spec §3: "an operation code plus typed inputs ... optional immediate
//! payload").

use crate::ir::entities::{FuncRef, GlobalIndex, MemoryIndex, SignatureIndex, TableIndex, Value};
use crate::ir::types::{FloatCC, IntCC, MemFlags, TrapCode, Type};
use smallvec::SmallVec;

pub type ValueList = SmallVec<[Value; 4]>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Opcode {
    Iconst,
    F32const,
    F64const,
    Iadd,
    Isub,
    Imul,
    Icmp,
    Fadd,
    Fsub,
    Fmul,
    Fdiv,
    /// Float comparison, the `fcmp` counterpart of `Icmp` (spec S8:
    /// trapping float-to-int conversions need an explicit NaN/range
    /// check ahead of the non-trapping conversion op).
    Fcmp,
    /// Trapping float-to-signed-integer conversion (trap code
    /// `invalid-conversion-to-integer` on NaN/out-of-range, spec S8).
    FcvtToSint,
    /// Non-trapping, saturating float-to-signed-integer conversion
    /// (spec S8: "the non-trapping variant must produce 0" for NaN).
    FcvtToSintSat,
    /// Zero-extends an `i32` to `i64`, used by the frontend ahead of
    /// address arithmetic on a Wasm32 linear-memory index (spec §4.3).
    Uextend,
    Load,
    Store,
    GlobalGet,
    GlobalSet,
    /// Raw read from a fixed byte offset in the module/VM context, used
    /// by the frontend to fetch a memory or table's base pointer and
    /// bound ahead of a bounds check (spec §4.3) rather than through the
    /// `GlobalIndex`-keyed Wasm-global path.
    VmLoad,
    VmStore,
    /// Direct call to a statically known callee.
    Call,
    /// Call through a table slot; the frontend has already emitted the
    /// null-entry and signature-mismatch checks ahead of this instruction
    /// (spec §4.3).
    CallIndirect,
    /// Unconditional branch to a successor, supplying one argument per
    /// block parameter (spec §3: block parameters are this design's phi).
    Jump,
    /// Conditional branch: exactly one of two successors is taken, each
    /// with its own argument list.
    Brif,
    Return,
    /// Terminates the block by transferring control to the trap exit
    /// sequence (spec §9: "trap sites are data, not exceptions").
    Trap,
}

impl Opcode {
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            Opcode::Jump | Opcode::Brif | Opcode::Return | Opcode::Trap
        )
    }
}

#[derive(Clone, Debug)]
pub enum InstructionData {
    UnaryImm64 {
        opcode: Opcode,
        imm: i64,
    },
    UnaryImmF32 {
        opcode: Opcode,
        bits: u32,
    },
    UnaryImmF64 {
        opcode: Opcode,
        bits: u64,
    },
    Unary {
        opcode: Opcode,
        arg: Value,
    },
    Binary {
        opcode: Opcode,
        args: [Value; 2],
    },
    IntCompare {
        opcode: Opcode,
        cond: IntCC,
        args: [Value; 2],
    },
    FloatCompare {
        opcode: Opcode,
        cond: FloatCC,
        args: [Value; 2],
    },
    Load {
        opcode: Opcode,
        flags: MemFlags,
        memory: MemoryIndex,
        offset: i32,
        base: Value,
    },
    Store {
        opcode: Opcode,
        flags: MemFlags,
        memory: MemoryIndex,
        offset: i32,
        value: Value,
        base: Value,
    },
    GlobalAccess {
        opcode: Opcode,
        global: GlobalIndex,
        /// Present for `GlobalSet`, absent (ignored) for `GlobalGet`.
        value: Option<Value>,
    },
    VmAccess {
        opcode: Opcode,
        offset: i32,
        /// Present for `VmStore`, absent (ignored) for `VmLoad`.
        value: Option<Value>,
    },
    Call {
        opcode: Opcode,
        func_ref: FuncRef,
        args: ValueList,
    },
    CallIndirect {
        opcode: Opcode,
        sig: SignatureIndex,
        table: TableIndex,
        callee: Value,
        args: ValueList,
    },
    Jump {
        opcode: Opcode,
        destination: crate::ir::entities::Block,
        args: ValueList,
    },
    Brif {
        opcode: Opcode,
        cond: Value,
        then_dest: crate::ir::entities::Block,
        then_args: ValueList,
        else_dest: crate::ir::entities::Block,
        else_args: ValueList,
    },
    MultiReturn {
        opcode: Opcode,
        args: ValueList,
    },
    Trap {
        opcode: Opcode,
        code: TrapCode,
    },
}

impl InstructionData {
    pub fn opcode(&self) -> Opcode {
        match self {
            InstructionData::UnaryImm64 { opcode, .. }
            | InstructionData::UnaryImmF32 { opcode, .. }
            | InstructionData::UnaryImmF64 { opcode, .. }
            | InstructionData::Unary { opcode, .. }
            | InstructionData::Binary { opcode, .. }
            | InstructionData::IntCompare { opcode, .. }
            | InstructionData::FloatCompare { opcode, .. }
            | InstructionData::Load { opcode, .. }
            | InstructionData::Store { opcode, .. }
            | InstructionData::GlobalAccess { opcode, .. }
            | InstructionData::VmAccess { opcode, .. }
            | InstructionData::Call { opcode, .. }
            | InstructionData::CallIndirect { opcode, .. }
            | InstructionData::Jump { opcode, .. }
            | InstructionData::Brif { opcode, .. }
            | InstructionData::MultiReturn { opcode, .. }
            | InstructionData::Trap { opcode, .. } => *opcode,
        }
    }

    /// The values this instruction reads, in operand order. Branch
    /// arguments to successors are included (they are reads of the
    /// branching block, even though they are "written" into the
    /// successor's parameters).
    pub fn arguments(&self) -> ValueList {
        match self {
            InstructionData::UnaryImm64 { .. }
            | InstructionData::UnaryImmF32 { .. }
            | InstructionData::UnaryImmF64 { .. }
            | InstructionData::Trap { .. } => ValueList::new(),
            InstructionData::Unary { arg, .. } => smallvec::smallvec![*arg],
            InstructionData::Binary { args, .. } => args.iter().copied().collect(),
            InstructionData::IntCompare { args, .. } => args.iter().copied().collect(),
            InstructionData::FloatCompare { args, .. } => args.iter().copied().collect(),
            InstructionData::Load { base, .. } => smallvec::smallvec![*base],
            InstructionData::Store { value, base, .. } => smallvec::smallvec![*value, *base],
            InstructionData::GlobalAccess { value, .. } => value.into_iter().copied().collect(),
            InstructionData::VmAccess { value, .. } => value.into_iter().copied().collect(),
            InstructionData::Call { args, .. } => args.clone(),
            InstructionData::CallIndirect { callee, args, .. } => {
                let mut v = ValueList::new();
                v.push(*callee);
                v.extend(args.iter().copied());
                v
            }
            InstructionData::Jump { args, .. } => args.clone(),
            InstructionData::Brif {
                cond,
                then_args,
                else_args,
                ..
            } => {
                let mut v = ValueList::new();
                v.push(*cond);
                v.extend(then_args.iter().copied());
                v.extend(else_args.iter().copied());
                v
            }
            InstructionData::MultiReturn { args, .. } => args.clone(),
        }
    }

    /// Rewrites every input operand through `f`, in place. Used by
    /// passes that collapse or replace values (e.g. trivial-phi
    /// elimination, spec §4.2 P2).
    pub fn map_values(&mut self, mut f: impl FnMut(Value) -> Value) {
        match self {
            InstructionData::UnaryImm64 { .. }
            | InstructionData::UnaryImmF32 { .. }
            | InstructionData::UnaryImmF64 { .. }
            | InstructionData::Trap { .. } => {}
            InstructionData::Unary { arg, .. } => *arg = f(*arg),
            InstructionData::Binary { args, .. } => {
                for a in args.iter_mut() {
                    *a = f(*a);
                }
            }
            InstructionData::IntCompare { args, .. } => {
                for a in args.iter_mut() {
                    *a = f(*a);
                }
            }
            InstructionData::FloatCompare { args, .. } => {
                for a in args.iter_mut() {
                    *a = f(*a);
                }
            }
            InstructionData::Load { base, .. } => *base = f(*base),
            InstructionData::Store { value, base, .. } => {
                *value = f(*value);
                *base = f(*base);
            }
            InstructionData::GlobalAccess { value, .. } => {
                if let Some(v) = value {
                    *v = f(*v);
                }
            }
            InstructionData::VmAccess { value, .. } => {
                if let Some(v) = value {
                    *v = f(*v);
                }
            }
            InstructionData::Call { args, .. } => {
                for a in args.iter_mut() {
                    *a = f(*a);
                }
            }
            InstructionData::CallIndirect { callee, args, .. } => {
                *callee = f(*callee);
                for a in args.iter_mut() {
                    *a = f(*a);
                }
            }
            InstructionData::Jump { args, .. } => {
                for a in args.iter_mut() {
                    *a = f(*a);
                }
            }
            InstructionData::Brif {
                cond,
                then_args,
                else_args,
                ..
            } => {
                *cond = f(*cond);
                for a in then_args.iter_mut() {
                    *a = f(*a);
                }
                for a in else_args.iter_mut() {
                    *a = f(*a);
                }
            }
            InstructionData::MultiReturn { args, .. } => {
                for a in args.iter_mut() {
                    *a = f(*a);
                }
            }
        }
    }

    /// Mutable access to a branch's argument lists by successor, the
    /// write-side counterpart of [`Self::branch_targets`].
    pub fn branch_args_mut(
        &mut self,
        target: crate::ir::entities::Block,
    ) -> SmallVec<[&mut ValueList; 2]> {
        match self {
            InstructionData::Jump {
                destination, args, ..
            } if *destination == target => smallvec::smallvec![args],
            InstructionData::Brif {
                then_dest,
                then_args,
                else_dest,
                else_args,
                ..
            } => {
                let mut v = SmallVec::new();
                if *then_dest == target {
                    v.push(then_args);
                }
                if *else_dest == target {
                    v.push(else_args);
                }
                v
            }
            _ => SmallVec::new(),
        }
    }

    /// Successor blocks with their branch-argument ranges, used to
    /// validate I2 (argument count/type matches the target's parameters)
    /// and to build predecessor edges.
    pub fn branch_targets(&self) -> SmallVec<[(crate::ir::entities::Block, &[Value]); 2]> {
        match self {
            InstructionData::Jump {
                destination, args, ..
            } => smallvec::smallvec![(*destination, &args[..])],
            InstructionData::Brif {
                then_dest,
                then_args,
                else_dest,
                else_args,
                ..
            } => smallvec::smallvec![(*then_dest, &then_args[..]), (*else_dest, &else_args[..])],
            _ => SmallVec::new(),
        }
    }
}
