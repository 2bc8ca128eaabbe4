//! Top-level pipeline orchestration (spec §2, §9 lifecycle): frontend,
//! SSA passes, instruction selection, register allocation, finalization,
//! and encoding, run in that fixed order for one function at a time.

use log::debug;

use crate::config::Flags;
use crate::encode::{self, EncodedFunction};
use crate::error::CodegenResult;
use crate::finalize::{self, FinalizedFunction};
use crate::frontend::{translate_function_body, ModuleEnvironment};
use crate::ir::{Function, Signature, Type};
use crate::isa::aarch64::lower::{self, SignatureProvider};
use crate::passes;
use crate::regalloc;

/// Compiles one already-built [`Function`] (SSA form already complete)
/// through the middle-end and backend. Split out from
/// [`compile_function_body`] so a test can drive a hand-built
/// [`Function`] straight into the backend without going through the
/// frontend at all.
pub fn compile_function(
    func: &mut Function,
    sigs: &dyn SignatureProvider,
    flags: &Flags,
) -> CodegenResult<EncodedFunction> {
    debug!("compile: running SSA passes for `{}`", func.name);
    passes::run_passes(func)?;

    debug!("compile: selecting instructions for `{}`", func.name);
    let lowered = lower::lower_function(func, sigs)?;

    debug!("compile: allocating registers for `{}`", func.name);
    let allocated = regalloc::allocate(lowered)?;

    debug!("compile: finalizing `{}`", func.name);
    let finalized: FinalizedFunction = finalize::finalize(allocated, flags)?;

    debug!("compile: encoding `{}`", func.name);
    encode::encode(&finalized)
}

/// Translates one Wasm function body to SSA and compiles it straight
/// through to machine code (spec §4.3 → §4.7 end to end).
pub fn compile_function_body<'a>(
    name: impl Into<String>,
    sig: Signature,
    locals: &[Type],
    operators: impl IntoIterator<Item = wasmparser::Operator<'a>>,
    env: &mut dyn ModuleEnvironment,
    sigs: &dyn SignatureProvider,
    flags: &Flags,
) -> CodegenResult<EncodedFunction> {
    let mut func = translate_function_body(name, sig, locals, operators, env)?;
    compile_function(&mut func, sigs, flags)
}
