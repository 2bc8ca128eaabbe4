//! ABI model (spec §2.5, §4 "ABI Model", §6 "Call ABI for a Wasm
//! function"): partitions argument and result slots into integer
//! register slots, float register slots, and stack slots, and caches the
//! totals a call site or function prologue needs.

use crate::isa::aarch64::regs::{
    FLOAT_ARG_REGS, FLOAT_RET_REGS, INT_ARG_REGS, INT_RET_REGS, RReg,
};
use crate::ir::{Signature, Type};

/// One argument or result slot's location, the caller-visible layout
/// (spec §3: "ABIArg is either Register(rreg) or Stack(offset)").
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ABIArg {
    Register(RReg),
    Stack(i32),
    /// A result slot written through the caller-provided return-area
    /// pointer (spec §6: "excess results are written to a caller-
    /// provided return area pointed to by a reserved register at call
    /// time"), at this byte offset from the area's base.
    ReturnArea(i32),
}

/// The register AAPCS64 dedicates to the indirect-result (return area)
/// pointer when a call's results overflow the two integer and two float
/// return registers.
pub const RETURN_AREA_PTR_REG: RReg = RReg::X(8);

/// Reserved leading integer argument registers (spec §6): the module
/// context pointer, then the callee-VM-context pointer. Every Wasm
/// function and call site carries these ahead of the declared
/// parameters.
pub const MODULE_CONTEXT_REG: RReg = INT_ARG_REGS[0];
pub const VM_CONTEXT_REG: RReg = INT_ARG_REGS[1];

/// The callee-saved registers the prologue copies [`MODULE_CONTEXT_REG`]
/// and [`VM_CONTEXT_REG`] into (spec §4.4/§6): `x0`/`x1` are caller-saved
/// and get clobbered by the first call the function makes, but memory,
/// global, and call-site lowering all need both context pointers live
/// across arbitrarily many calls, so instruction selection addresses
/// module/vm state off these pinned registers and copies them back into
/// `x0`/`x1` immediately before every outgoing call.
pub const MODULE_CONTEXT_PINNED_REG: RReg = RReg::X(20);
pub const VM_CONTEXT_PINNED_REG: RReg = RReg::X(19);

/// Fixed module-context byte offsets the exit sequence writes (spec §6):
/// trap code at offset 0 as required, the rest at offsets this core
/// chooses (the spec only requires them to be fixed, not their values).
pub const TRAP_CODE_OFFSET: i32 = 0;
pub const TRAP_SP_OFFSET: i32 = 8;
pub const TRAP_RETURN_ADDR_OFFSET: i32 = 16;
pub const TRAP_HANDLER_ADDR_OFFSET: i32 = 24;

/// Module-context offset of the stack-limit value the prologue's
/// optional overflow probe compares the incoming stack pointer against
/// (spec §4.6 F1, §6 memory/stack layout offsets).
pub const STACK_LIMIT_OFFSET: i32 = 32;

/// VM-context offsets of the default linear memory's base pointer and
/// current length in bytes (spec §4.3 memory access checks). Only one
/// memory is modeled at fixed offsets; a module with more than one
/// memory would need a per-memory offset table instead.
pub const MEMORY_BASE_OFFSET: i32 = 40;
pub const MEMORY_LENGTH_OFFSET: i32 = 48;

/// VM-context offsets of the default table's base pointer and element
/// count (spec §4.3 table access checks), same one-table simplification
/// as the memory offsets above.
pub const TABLE_BASE_OFFSET: i32 = 56;
pub const TABLE_LENGTH_OFFSET: i32 = 64;

#[derive(Clone, Debug)]
pub struct ABISignature {
    pub params: Vec<ABIArg>,
    pub results: Vec<ABIArg>,
    /// Total caller-side stack argument area size, 16-byte aligned
    /// (spec I8).
    pub stack_bytes: u32,
    pub used_arg_regs: Vec<RReg>,
    pub used_ret_regs: Vec<RReg>,
    pub needs_return_area: bool,
}

struct SlotCursor {
    next_int: usize,
    next_float: usize,
    stack_offset: i32,
}

impl SlotCursor {
    fn new(reserved_int: usize) -> Self {
        SlotCursor {
            next_int: reserved_int,
            next_float: 0,
            stack_offset: 0,
        }
    }

    fn take(&mut self, ty: Type, int_regs: &[RReg], float_regs: &[RReg]) -> ABIArg {
        if ty.is_int() || ty.is_reference() {
            if self.next_int < int_regs.len() {
                let reg = int_regs[self.next_int];
                self.next_int += 1;
                return ABIArg::Register(reg);
            }
        } else if ty.is_float_class() {
            if self.next_float < float_regs.len() {
                let reg = float_regs[self.next_float];
                self.next_float += 1;
                return ABIArg::Register(reg);
            }
        }
        let align = if ty == Type::V128 { 16 } else { 8 };
        let offset = align_to(self.stack_offset, align);
        self.stack_offset = offset + ty.bytes() as i32;
        ABIArg::Stack(offset)
    }
}

fn align_to(offset: i32, align: i32) -> i32 {
    (offset + align - 1) / align * align
}

/// Computes the ABI descriptor for a Wasm function signature (spec §6):
/// two reserved leading integer argument slots, then params filling the
/// integer/float register sequences before spilling to the stack;
/// results follow the same register partition with overflow routed
/// through the return-area pointer.
pub fn compute_abi(sig: &Signature) -> ABISignature {
    let mut used_arg_regs = vec![MODULE_CONTEXT_REG, VM_CONTEXT_REG];
    let mut cursor = SlotCursor::new(2);
    let mut params = Vec::with_capacity(sig.params.len());
    for &ty in &sig.params {
        let arg = cursor.take(ty, &INT_ARG_REGS, &FLOAT_ARG_REGS);
        if let ABIArg::Register(r) = arg {
            used_arg_regs.push(r);
        }
        params.push(arg);
    }
    let stack_bytes = align_to(cursor.stack_offset, 16) as u32;

    let mut used_ret_regs = Vec::new();
    let mut ret_cursor = SlotCursor::new(0);
    let mut results = Vec::with_capacity(sig.results.len());
    let mut needs_return_area = false;
    for &ty in &sig.results {
        let arg = ret_cursor.take(ty, &INT_RET_REGS, &FLOAT_RET_REGS);
        match arg {
            ABIArg::Register(r) => used_ret_regs.push(r),
            ABIArg::Stack(off) => {
                needs_return_area = true;
                results.push(ABIArg::ReturnArea(off));
                continue;
            }
            ABIArg::ReturnArea(_) => unreachable!(),
        }
        results.push(arg);
    }

    ABISignature {
        params,
        results,
        stack_bytes,
        used_arg_regs,
        used_ret_regs,
        needs_return_area,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::CallConv;

    #[test]
    fn two_int_params_fit_in_registers_after_reserved_slots() {
        let mut sig = Signature::new(CallConv::AppleAarch64);
        sig.params.push(Type::I32);
        sig.params.push(Type::I32);
        sig.results.push(Type::I32);
        sig.results.push(Type::I32);
        let abi = compute_abi(&sig);
        assert_eq!(abi.params[0], ABIArg::Register(INT_ARG_REGS[2]));
        assert_eq!(abi.params[1], ABIArg::Register(INT_ARG_REGS[3]));
        assert_eq!(abi.stack_bytes, 0);
        assert!(!abi.needs_return_area);
    }

    #[test]
    fn excess_int_params_spill_to_stack_8_byte_aligned() {
        let mut sig = Signature::new(CallConv::AppleAarch64);
        for _ in 0..8 {
            sig.params.push(Type::I64);
        }
        let abi = compute_abi(&sig);
        // Reserved module/vm-context regs + 6 free int regs = 8 regs,
        // so the first 6 declared params fit and the last 2 spill.
        assert!(matches!(abi.params[5], ABIArg::Register(_)));
        assert_eq!(abi.params[6], ABIArg::Stack(0));
        assert_eq!(abi.params[7], ABIArg::Stack(8));
        assert_eq!(abi.stack_bytes, 16);
    }
}
