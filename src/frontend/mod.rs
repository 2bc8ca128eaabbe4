//! Wasm-to-SSA translation (spec §4.3): walks a validated operator stream
//! and drives [`crate::ssa::FunctionBuilder`] to build one [`Function`]
//! per Wasm function body. Wasm decoding and validation are out of scope
//! (spec §1 Non-goals) — this module only ever sees an already-lexed
//! `wasmparser` operator stream and already-expanded local declarations.
//!
//! Grounded on `cranelift-wasm`'s own translator: the control/value stack
//! shape mirrors `cranelift_wasm::state::func_state::FuncTranslationState`
//! (see [`state`]), and the per-module lookup surface mirrors
//! `cranelift_wasm::environ::FuncEnvironment`, generalized here beyond
//! the narrow [`crate::isa::aarch64::lower::SignatureProvider`] the
//! backend needs.

mod checks;
mod state;
mod test_env;
mod translate;

pub use state::{ControlStackFrame, FuncTranslationState};
pub use test_env::{MemoryPlan, TablePlan, TestEnvironment};
pub use translate::translate_function_body;

use crate::ir::{FuncIndex, GlobalIndex, MemoryIndex, SignatureIndex, TableIndex, Type};

/// Byte layout of one table slot: a function pointer at `func_offset`
/// and a signature tag at `sig_offset`, each slot `stride` bytes apart
/// (spec §4.3 call-indirect checks).
#[derive(Clone, Copy, Debug)]
pub struct TableEntryLayout {
    pub func_offset: i32,
    pub sig_offset: i32,
    pub stride: i32,
}

/// Per-module lookup surface the translator calls into for anything that
/// isn't carried directly on a Wasm operator (spec §6: "the module
/// context's shape ... lives with the frontend").
///
/// All memory- and table-relative offsets are byte offsets into the VM
/// context (the same context [`crate::ssa::FunctionBuilder::vm_load`]
/// and [`crate::ssa::FunctionBuilder::vm_store`] address), not opaque
/// handles: the translator builds address arithmetic directly from them,
/// the same way it builds address arithmetic from [`crate::abi`]'s
/// `STACK_LIMIT_OFFSET` and trap-context offsets.
pub trait ModuleEnvironment {
    /// Signature of a function directly callable by index (spec §4.3
    /// "Calls"), used both to build the call's argument/result type list
    /// and, for the lowering side, as `direct_signature` in
    /// [`crate::isa::aarch64::lower::SignatureProvider`].
    fn direct_signature(&self, func: FuncIndex) -> crate::ir::Signature;

    /// Signature recorded against a `call_indirect`'s type immediate,
    /// used to validate the table-slot's tag and to type the call.
    fn indirect_signature(&self, sig: SignatureIndex) -> crate::ir::Signature;

    /// The runtime tag value stored in a table slot for functions of
    /// this signature (spec S5: indirect-call type mismatch). Compared
    /// against the tag loaded from the callee's table entry.
    fn signature_id(&self, sig: SignatureIndex) -> i64;

    /// Element type and mutability of a Wasm global.
    fn global_type(&self, global: GlobalIndex) -> (Type, bool);

    /// Byte offset, in the VM context, of this memory's base pointer
    /// (spec §4.3: "reads a stored base pointer and bound ahead of the
    /// access").
    fn memory_base_offset(&self, memory: MemoryIndex) -> i32;

    /// Byte offset, in the VM context, of this memory's current length
    /// in bytes.
    fn memory_length_offset(&self, memory: MemoryIndex) -> i32;

    /// Byte offset, in the VM context, of this table's base pointer.
    fn table_base_offset(&self, table: TableIndex) -> i32;

    /// Byte offset, in the VM context, of this table's element count.
    fn table_length_offset(&self, table: TableIndex) -> i32;

    /// Byte layout of one table element (spec §4.3: "table entries carry
    /// both a function pointer and a signature tag so the call site can
    /// check it").
    fn table_entry_layout(&self) -> TableEntryLayout;
}
