//! Trap-check decomposition (spec §4.3, §9): every Wasm operation that
//! can trap is expanded here into ordinary SSA control flow — a
//! condition, a branch to a one-instruction trap block, and a
//! continuation — rather than carried as a property of one instruction.
//! This is the frontend-side half of the "traps are data, not
//! exceptions" design ([`crate::finalize`]/[`crate::encode`] carry the
//! other half, expanding the resulting [`crate::ir::Opcode::Trap`]
//! terminator into a structured exit sequence).

use crate::error::CodegenResult;
use crate::ir::{FloatCC, IntCC, MemoryIndex, TableIndex, TrapCode, Type, Value};
use crate::ssa::FunctionBuilder;

use super::ModuleEnvironment;

/// Emits `if cond { trap(code) }`, leaving the builder positioned in the
/// (sealed, empty) continuation block. `cond` is true on the failure
/// path, matching how every caller in this module phrases its checks.
pub fn trap_if(b: &mut FunctionBuilder, cond: Value, code: TrapCode) -> CodegenResult<()> {
    let trap_block = b.allocate_block();
    let continue_block = b.allocate_block();
    b.brif(cond, trap_block, &[], continue_block, &[])?;
    b.seal_block(trap_block)?;
    b.seal_block(continue_block)?;
    b.set_current(trap_block);
    b.trap(code)?;
    b.set_current(continue_block);
    Ok(())
}

/// Bounds-checks a `memory`-relative access of `access_size` bytes at
/// `index + offset` and returns the 64-bit effective address to load or
/// store through (spec §4.3: "decompose ... into an explicit bounds
/// check against a stored bound, then the unchecked access").
pub fn checked_memory_address(
    b: &mut FunctionBuilder,
    env: &dyn ModuleEnvironment,
    memory: MemoryIndex,
    index: Value,
    offset: u32,
    access_size: u32,
) -> CodegenResult<Value> {
    let index64 = b.uextend_i64(index)?;
    let offset_c = b.iconst(Type::I64, offset as i64)?;
    let access_end = b.iconst(Type::I64, access_size as i64)?;
    let base_plus_offset = b.iadd(index64, offset_c)?;
    let end = b.iadd(base_plus_offset, access_end)?;

    let length = b.vm_load(Type::I64, env.memory_length_offset(memory))?;
    let oob = b.icmp(IntCC::UnsignedGreaterThan, end, length)?;
    trap_if(b, oob, TrapCode::OutOfBoundsMemoryAccess)?;

    let base = b.vm_load(Type::I64, env.memory_base_offset(memory))?;
    b.iadd(base, base_plus_offset)
}

/// Bounds-checks a `table`-relative element access at `index` and
/// returns the table slot's byte address (spec §4.3 table access).
pub fn checked_table_slot_address(
    b: &mut FunctionBuilder,
    env: &dyn ModuleEnvironment,
    table: TableIndex,
    index: Value,
) -> CodegenResult<Value> {
    let index64 = b.uextend_i64(index)?;
    let length = b.vm_load(Type::I64, env.table_length_offset(table))?;
    let oob = b.icmp(IntCC::UnsignedGreaterThanOrEqual, index64, length)?;
    trap_if(b, oob, TrapCode::OutOfBoundsMemoryAccess)?;

    let layout = env.table_entry_layout();
    let stride = b.iconst(Type::I64, layout.stride as i64)?;
    let elem_byte_off = b.imul(index64, stride)?;
    let base = b.vm_load(Type::I64, env.table_base_offset(table))?;
    b.iadd(base, elem_byte_off)
}

/// Loads a `call_indirect` table slot's function pointer, traps on a
/// null entry or a signature-tag mismatch, and returns the verified
/// callee pointer (spec S5: `indirect-call-null`,
/// `indirect-call-type-mismatch`).
pub fn checked_indirect_callee(
    b: &mut FunctionBuilder,
    env: &dyn ModuleEnvironment,
    table: TableIndex,
    sig: crate::ir::SignatureIndex,
    index: Value,
) -> CodegenResult<Value> {
    let slot_addr = checked_table_slot_address(b, env, table, index)?;
    let layout = env.table_entry_layout();

    let func_ptr = b.load(Type::I64, Default::default(), MemoryIndex::new(0), slot_addr, layout.func_offset)?;
    let zero = b.iconst(Type::I64, 0)?;
    let is_null = b.icmp(IntCC::Equal, func_ptr, zero)?;
    trap_if(b, is_null, TrapCode::IndirectCallNull)?;

    let tag = b.load(Type::I64, Default::default(), MemoryIndex::new(0), slot_addr, layout.sig_offset)?;
    let expected_tag = b.iconst(Type::I64, env.signature_id(sig))?;
    let mismatch = b.icmp(IntCC::NotEqual, tag, expected_tag)?;
    trap_if(b, mismatch, TrapCode::IndirectCallTypeMismatch)?;

    Ok(func_ptr)
}

/// Decomposes a trapping float-to-signed-integer conversion (Wasm's
/// plain `i32.trunc_f64_s` family) into an explicit NaN/range check
/// followed by the non-trapping, saturating op (spec S8: "the
/// non-trapping variant must produce 0" on NaN; this one must trap
/// instead). `min`/`max` bracket the representable range of `result_ty`
/// in `arg`'s float type, exclusive on both ends per the Wasm spec's
/// truncation table (e.g. for `i32.trunc_f64_s`, `(-2147483649.0,
/// 2147483648.0)`).
pub fn checked_fcvt_to_sint(
    b: &mut FunctionBuilder,
    result_ty: Type,
    arg: Value,
    min: Value,
    max: Value,
) -> CodegenResult<Value> {
    let is_nan = b.fcmp(FloatCC::Unordered, arg, arg)?;
    trap_if(b, is_nan, TrapCode::InvalidConversionToInteger)?;

    let too_low = b.fcmp(FloatCC::LessThanOrEqual, arg, min)?;
    trap_if(b, too_low, TrapCode::InvalidConversionToInteger)?;
    let too_high = b.fcmp(FloatCC::GreaterThanOrEqual, arg, max)?;
    trap_if(b, too_high, TrapCode::InvalidConversionToInteger)?;

    b.fcvt_to_sint(result_ty, arg)
}

/// Decomposes a trapping float-to-unsigned-integer conversion (Wasm's
/// `i32.trunc_f64_u`/`i64.trunc_f64_u` family) the same way
/// [`checked_fcvt_to_sint`] does, but AArch64's `fcvtzs` (the only
/// float-to-int conversion this backend lowers to, spec §4.4) is
/// signed: it cannot represent the top half of an unsigned range
/// directly. Values below `half` (`2^(result_ty.bits() - 1)`) fit the
/// signed range as-is; values at or above it are biased down by `half`
/// before the signed convert, then the bias is added back as a plain
/// integer add, which wraps in two's complement to the same bit
/// pattern the unsigned value would have had. `min`/`max` bracket the
/// representable unsigned range in `arg`'s float type, exclusive on
/// both ends (e.g. for `i32.trunc_f64_u`, `(-1.0, 4294967296.0)`).
pub fn checked_fcvt_to_uint(
    b: &mut FunctionBuilder,
    result_ty: Type,
    arg: Value,
    min: Value,
    max: Value,
    half: Value,
    half_bits: Value,
) -> CodegenResult<Value> {
    let is_nan = b.fcmp(FloatCC::Unordered, arg, arg)?;
    trap_if(b, is_nan, TrapCode::InvalidConversionToInteger)?;

    let too_low = b.fcmp(FloatCC::LessThanOrEqual, arg, min)?;
    trap_if(b, too_low, TrapCode::InvalidConversionToInteger)?;
    let too_high = b.fcmp(FloatCC::GreaterThanOrEqual, arg, max)?;
    trap_if(b, too_high, TrapCode::InvalidConversionToInteger)?;

    let in_upper_half = b.fcmp(FloatCC::GreaterThanOrEqual, arg, half)?;
    let low_block = b.allocate_block();
    let high_block = b.allocate_block();
    let merge = b.allocate_block();
    let result = b.append_block_param(merge, result_ty);
    b.brif(in_upper_half, high_block, &[], low_block, &[])?;
    b.seal_block(low_block)?;
    b.seal_block(high_block)?;

    b.set_current(low_block);
    let low_val = b.fcvt_to_sint_sat(result_ty, arg)?;
    b.jump(merge, &[low_val])?;

    b.set_current(high_block);
    let biased_arg = b.fsub(arg, half)?;
    let biased_val = b.fcvt_to_sint_sat(result_ty, biased_arg)?;
    let high_val = b.iadd(biased_val, half_bits)?;
    b.jump(merge, &[high_val])?;

    b.seal_block(merge)?;
    b.set_current(merge);
    Ok(result)
}
