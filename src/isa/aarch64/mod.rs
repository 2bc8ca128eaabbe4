//! AArch64 backend: real registers, the machine instruction set, and
//! bottom-up instruction selection (spec §2 "AArch64-first backend").

pub mod inst;
pub mod lower;
pub mod regs;

pub use inst::{AluOp, CallTarget, Cond, FpuOp, Inst, MachLabel, MemSize};
pub use lower::{lower_function, LoweredFunction, SignatureProvider};
pub use regs::{
    allocatable_float_regs, allocatable_int_regs, RReg, FLOAT_ARG_REGS, FLOAT_RET_REGS,
    INT_ARG_REGS, INT_RET_REGS, TEMP_INT_REGS,
};
