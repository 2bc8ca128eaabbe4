//! End-to-end seed scenarios (S1-S8): build a function body, compile it
//! all the way to machine code, and check structurally observable
//! properties of the result — byte layout, trap-site records, and
//! relocation records. There is no in-process AArch64 execution harness
//! here (see DESIGN.md's Testing section), so these assert what can be
//! checked without running the emitted bytes.

use wasm_opt_codegen::abi;
use wasm_opt_codegen::config::FlagsBuilder;
use wasm_opt_codegen::encode::{EncodedFunction, RelocKind, RelocTarget};
use wasm_opt_codegen::entity::EntityRef;
use wasm_opt_codegen::frontend::{ModuleEnvironment, TestEnvironment};
use wasm_opt_codegen::ir::{CallConv, FuncIndex, FuncRef, Function, Signature, SignatureIndex, TrapCode, Type};
use wasm_opt_codegen::isa::aarch64::lower::SignatureProvider;
use wasm_opt_codegen::ssa::FunctionBuilder;
use wasm_opt_codegen::{compile_function, compile_function_body, Flags};

fn default_flags() -> Flags {
    FlagsBuilder::new().build()
}

fn has_trap(encoded: &EncodedFunction, code: TrapCode) -> bool {
    encoded.trap_sites.iter().any(|t| t.code == code)
}

/// Always present under default flags (the stack-overflow probe every
/// prologue gets); a sanity check shared by every scenario below.
fn assert_has_stack_overflow_probe(encoded: &EncodedFunction) {
    assert!(has_trap(encoded, TrapCode::StackOverflow));
}

struct FixedSignature(Signature);

impl SignatureProvider for FixedSignature {
    fn direct_signature(&self, _func: FuncIndex) -> Signature {
        self.0.clone()
    }
    fn indirect_signature(&self, _sig: SignatureIndex) -> Signature {
        self.0.clone()
    }
}

/// S1: function takes (i32, i32), returns them swapped.
#[test]
fn s1_swap_two_params() {
    let mut sig = Signature::new(CallConv::AppleAarch64);
    sig.params.push(Type::I32);
    sig.params.push(Type::I32);
    sig.results.push(Type::I32);
    sig.results.push(Type::I32);
    let mut func = Function::new("swap", sig.clone());
    let mut b = FunctionBuilder::new(&mut func);
    let entry = b.allocate_block();
    let p0 = b.append_block_param(entry, Type::I32);
    let p1 = b.append_block_param(entry, Type::I32);
    b.set_current(entry);
    b.return_(&[p1, p0]).unwrap();
    b.seal_block(entry).unwrap();
    func.entry = Some(entry);

    let sigs = FixedSignature(sig);
    let encoded = compile_function(&mut func, &sigs, &default_flags()).unwrap();
    assert!(!encoded.code.is_empty());
    assert_eq!(encoded.code.len() % 4, 0);
    assert_has_stack_overflow_probe(&encoded);
}

/// S2: (i32) -> i32, body "local 0 + 1", built through the frontend so the
/// local-read/constant path is exercised the way real Wasm would drive it.
#[test]
fn s2_local_plus_one() {
    let mut sig = Signature::new(CallConv::AppleAarch64);
    sig.params.push(Type::I32);
    sig.results.push(Type::I32);
    let locals = [Type::I32];
    let ops = vec![
        wasmparser::Operator::GetLocal { local_index: 0 },
        wasmparser::Operator::I32Const { value: 1 },
        wasmparser::Operator::I32Add,
    ];

    let mut env = TestEnvironment::new();
    let sigs = TestEnvironment::new();
    let encoded = compile_function_body(
        "local_plus_one",
        sig,
        &locals,
        ops,
        &mut env,
        &sigs,
        &default_flags(),
    )
    .unwrap();
    assert!(!encoded.code.is_empty());
    assert_has_stack_overflow_probe(&encoded);
}

/// S3: recursive Fibonacci on i32. Built directly against the SSA builder
/// (the self-call is to the function's own index) rather than through the
/// frontend, so the control-flow/call shape is checked without also
/// depending on the wasmparser operator guess.
#[test]
fn s3_recursive_fibonacci() {
    let mut sig = Signature::new(CallConv::AppleAarch64);
    sig.params.push(Type::I32);
    sig.results.push(Type::I32);
    let mut func = Function::new("fib", sig.clone());
    let mut b = FunctionBuilder::new(&mut func);

    let entry = b.allocate_block();
    let then_block = b.allocate_block();
    let else_block = b.allocate_block();
    let n = b.append_block_param(entry, Type::I32);
    b.set_current(entry);

    let two = b.iconst(Type::I32, 2).unwrap();
    let is_base_case = b.icmp(wasm_opt_codegen::ir::IntCC::SignedLessThan, n, two).unwrap();
    b.brif(is_base_case, then_block, &[], else_block, &[]).unwrap();
    b.seal_block(then_block).unwrap();
    b.seal_block(else_block).unwrap();
    b.seal_block(entry).unwrap();

    b.set_current(then_block);
    b.return_(&[n]).unwrap();

    b.set_current(else_block);
    let one = b.iconst(Type::I32, 1).unwrap();
    let n_minus_1 = b.isub(n, one).unwrap();
    let r1 = b.call(FuncRef(FuncIndex::new(0)), &[n_minus_1], &[Type::I32]).unwrap();
    let n_minus_2 = b.isub(n, two).unwrap();
    let r2 = b.call(FuncRef(FuncIndex::new(0)), &[n_minus_2], &[Type::I32]).unwrap();
    let sum = b.iadd(r1[0], r2[0]).unwrap();
    b.return_(&[sum]).unwrap();

    func.entry = Some(entry);

    let sigs = FixedSignature(sig);
    let encoded = compile_function(&mut func, &sigs, &default_flags()).unwrap();
    let direct_calls: Vec<_> = encoded
        .relocations
        .iter()
        .filter(|r| matches!(r.kind, RelocKind::DirectCall))
        .collect();
    assert_eq!(direct_calls.len(), 2);
    for r in &direct_calls {
        assert!(matches!(r.target, RelocTarget::Function(f) if f == FuncIndex::new(0)));
    }
}

/// S4: `g` sums its two i32 params; `f` calls `g` three times on constant
/// arguments and adds 5. Only `f` is compiled here — `g`'s body isn't
/// needed to check `f`'s own call-site relocations, matching the
/// documented concurrency model where each function compiles on its own
/// (spec §5).
#[test]
fn s4_call_and_add() {
    let mut g_sig = Signature::new(CallConv::AppleAarch64);
    g_sig.params.push(Type::I32);
    g_sig.params.push(Type::I32);
    g_sig.results.push(Type::I32);

    let mut f_sig = Signature::new(CallConv::AppleAarch64);
    f_sig.results.push(Type::I32);
    let mut func = Function::new("f", f_sig.clone());
    let mut b = FunctionBuilder::new(&mut func);
    let entry = b.allocate_block();
    b.set_current(entry);

    let g = FuncRef(FuncIndex::new(1));
    let c1 = b.iconst(Type::I32, 1).unwrap();
    let c2 = b.iconst(Type::I32, 2).unwrap();
    let r1 = b.call(g, &[c1, c2], &[Type::I32]).unwrap()[0];
    let c3 = b.iconst(Type::I32, 3).unwrap();
    let c4 = b.iconst(Type::I32, 4).unwrap();
    let r2 = b.call(g, &[c3, c4], &[Type::I32]).unwrap()[0];
    let c5 = b.iconst(Type::I32, 5).unwrap();
    let c6 = b.iconst(Type::I32, 6).unwrap();
    let r3 = b.call(g, &[c5, c6], &[Type::I32]).unwrap()[0];

    let sum1 = b.iadd(r1, r2).unwrap();
    let sum2 = b.iadd(sum1, r3).unwrap();
    let five = b.iconst(Type::I32, 5).unwrap();
    let total = b.iadd(sum2, five).unwrap();
    b.return_(&[total]).unwrap();
    b.seal_block(entry).unwrap();
    func.entry = Some(entry);

    let sigs = FixedSignature(g_sig);
    let encoded = compile_function(&mut func, &sigs, &default_flags()).unwrap();
    let direct_calls: Vec<_> = encoded
        .relocations
        .iter()
        .filter(|r| matches!(r.kind, RelocKind::DirectCall))
        .collect();
    assert_eq!(direct_calls.len(), 3);
    for r in &direct_calls {
        assert!(matches!(r.target, RelocTarget::Function(f) if f == FuncIndex::new(1)));
    }
}

/// S5: store `0x0000_0000_0000_000C` as i64 to linear memory offset 5,
/// then read it back as i64, through the frontend's memory-access path.
#[test]
fn s5_memory_store_load_round_trip() {
    let mut sig = Signature::new(CallConv::AppleAarch64);
    sig.results.push(Type::I64);
    let ops = vec![
        wasmparser::Operator::I32Const { value: 0 },
        wasmparser::Operator::I64Const { value: 12 },
        wasmparser::Operator::I64Store {
            memarg: wasmparser::MemoryImmediate { flags: 0, offset: 5 },
        },
        wasmparser::Operator::I32Const { value: 0 },
        wasmparser::Operator::I64Load {
            memarg: wasmparser::MemoryImmediate { flags: 0, offset: 5 },
        },
    ];

    let mut env = TestEnvironment::new();
    let sigs = TestEnvironment::new();
    let encoded =
        compile_function_body("mem_roundtrip", sig, &[], ops, &mut env, &sigs, &default_flags()).unwrap();
    assert!(!encoded.code.is_empty());
    // Every memory access goes through the same bounds check, so the
    // store and the load each contribute an out-of-bounds trap site even
    // though neither is statically provable in- or out-of-bounds here.
    assert!(has_trap(&encoded, TrapCode::OutOfBoundsMemoryAccess));
}

/// S6: store past the end of a single-page memory must still only ever
/// produce the generic bounds-check trap site this core always emits for
/// a dynamic memory access — there is no constant-folding of the offset
/// against a known memory size in this frontend (spec §4.3: "no general
/// alias analysis is assumed"), so every access, in-bounds or not, is
/// guarded by the same check.
#[test]
fn s6_out_of_bounds_store_traps() {
    let mut sig = Signature::new(CallConv::AppleAarch64);
    let ops = vec![
        wasmparser::Operator::I32Const { value: 65537 },
        wasmparser::Operator::I64Const { value: 0 },
        wasmparser::Operator::I64Store {
            memarg: wasmparser::MemoryImmediate { flags: 0, offset: 0 },
        },
    ];

    let mut env = TestEnvironment::new();
    let sigs = TestEnvironment::new();
    let encoded = compile_function_body("oob_store", sig, &[], ops, &mut env, &sigs, &default_flags()).unwrap();
    assert!(has_trap(&encoded, TrapCode::OutOfBoundsMemoryAccess));
}

/// S7: a zero-argument function whose body is "call self" must compile
/// with the stack-overflow probe intact rather than silently dropping it;
/// that probe is what turns unbounded recursion into a clean trap instead
/// of a host crash.
#[test]
fn s7_self_recursive_call_keeps_stack_overflow_probe() {
    let sig = Signature::new(CallConv::AppleAarch64);
    let mut func = Function::new("loops_forever", sig.clone());
    let mut b = FunctionBuilder::new(&mut func);
    let entry = b.allocate_block();
    b.set_current(entry);
    b.call(FuncRef(FuncIndex::new(0)), &[], &[]).unwrap();
    b.return_(&[]).unwrap();
    b.seal_block(entry).unwrap();
    func.entry = Some(entry);

    let sigs = FixedSignature(sig);
    let encoded = compile_function(&mut func, &sigs, &default_flags()).unwrap();
    assert_has_stack_overflow_probe(&encoded);
    assert!(encoded
        .relocations
        .iter()
        .any(|r| matches!(r.kind, RelocKind::DirectCall)));
}

/// S8: converting NaN f64 to i32 via the trapping conversion must produce
/// an invalid-conversion-to-integer trap site; the saturating variant
/// must not.
#[test]
fn s8_float_conversion_trap() {
    let mut sig = Signature::new(CallConv::AppleAarch64);
    sig.params.push(Type::F64);
    sig.results.push(Type::I32);
    let locals = [Type::F64];

    let trapping_ops = vec![
        wasmparser::Operator::GetLocal { local_index: 0 },
        wasmparser::Operator::I32TruncF64S,
    ];
    let mut env = TestEnvironment::new();
    let sigs = TestEnvironment::new();
    let trapping = compile_function_body(
        "trunc_trapping",
        sig.clone(),
        &locals,
        trapping_ops,
        &mut env,
        &sigs,
        &default_flags(),
    )
    .unwrap();
    assert!(has_trap(&trapping, TrapCode::InvalidConversionToInteger));

    let saturating_ops = vec![
        wasmparser::Operator::GetLocal { local_index: 0 },
        wasmparser::Operator::I32TruncSatF64S,
    ];
    let mut env2 = TestEnvironment::new();
    let sigs2 = TestEnvironment::new();
    let saturating = compile_function_body(
        "trunc_saturating",
        sig,
        &locals,
        saturating_ops,
        &mut env2,
        &sigs2,
        &default_flags(),
    )
    .unwrap();
    assert!(!has_trap(&saturating, TrapCode::InvalidConversionToInteger));
}

/// Sanity check on the VM-context offset constants `TestEnvironment`
/// hands out, cross-checked against the fixed `abi` offsets the frontend's
/// checks are built on (spec §4.3/§6).
#[test]
fn test_environment_uses_the_documented_vmctx_offsets() {
    let env = TestEnvironment::new();
    let memory = wasm_opt_codegen::ir::MemoryIndex::new(0);
    let table = wasm_opt_codegen::ir::TableIndex::new(0);
    assert_eq!(env.memory_base_offset(memory), abi::MEMORY_BASE_OFFSET);
    assert_eq!(env.memory_length_offset(memory), abi::MEMORY_LENGTH_OFFSET);
    assert_eq!(env.table_base_offset(table), abi::TABLE_BASE_OFFSET);
    assert_eq!(env.table_length_offset(table), abi::TABLE_LENGTH_OFFSET);
}
