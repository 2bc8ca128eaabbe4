//! An in-memory [`ModuleEnvironment`] for tests and seed scenarios: a
//! fixed, hand-built module context instead of one parsed from a real
//! Wasm binary (spec §1 Non-goals: decoding/validation are out of
//! scope). Also implements
//! [`crate::isa::aarch64::lower::SignatureProvider`] so the same
//! context can drive a test all the way through instruction selection.

use crate::entity::EntityRef;
use crate::ir::{FuncIndex, GlobalIndex, MemoryIndex, Signature, TableIndex, Type};
use crate::isa::aarch64::lower::SignatureProvider;

use super::{ModuleEnvironment, TableEntryLayout};

/// One linear memory's starting size and VM-context offsets.
#[derive(Clone, Copy, Debug)]
pub struct MemoryPlan {
    pub base_offset: i32,
    pub length_offset: i32,
}

/// One table's starting size and VM-context offsets.
#[derive(Clone, Copy, Debug)]
pub struct TablePlan {
    pub base_offset: i32,
    pub length_offset: i32,
}

/// A hand-assembled module context: function signatures by index,
/// globals by index, and a fixed set of memories/tables, each with its
/// own VM-context offsets. Built directly by a test rather than parsed
/// from a Wasm module section.
pub struct TestEnvironment {
    pub signatures: Vec<Signature>,
    pub functions: Vec<usize>,
    pub globals: Vec<(Type, bool)>,
    pub memories: Vec<MemoryPlan>,
    pub tables: Vec<TablePlan>,
    pub table_entry_layout: TableEntryLayout,
}

impl TestEnvironment {
    /// A minimal context with one memory and one table at the
    /// conventional offsets this core's ABI descriptor reserves for
    /// them (spec §4.3; see `crate::abi`'s VM-context layout).
    pub fn new() -> Self {
        TestEnvironment {
            signatures: Vec::new(),
            functions: Vec::new(),
            globals: Vec::new(),
            memories: vec![MemoryPlan {
                base_offset: crate::abi::MEMORY_BASE_OFFSET,
                length_offset: crate::abi::MEMORY_LENGTH_OFFSET,
            }],
            tables: vec![TablePlan {
                base_offset: crate::abi::TABLE_BASE_OFFSET,
                length_offset: crate::abi::TABLE_LENGTH_OFFSET,
            }],
            table_entry_layout: TableEntryLayout {
                func_offset: 0,
                sig_offset: 8,
                stride: 16,
            },
        }
    }

    /// Registers a signature and returns its index, for a test to use as
    /// `CallIndirect`'s type immediate or `declare_function`'s signature.
    pub fn declare_signature(&mut self, sig: Signature) -> u32 {
        self.signatures.push(sig);
        (self.signatures.len() - 1) as u32
    }

    /// Declares a function with the given signature index, returning its
    /// function index.
    pub fn declare_function(&mut self, sig_index: u32) -> u32 {
        self.functions.push(sig_index as usize);
        (self.functions.len() - 1) as u32
    }

    pub fn declare_global(&mut self, ty: Type, mutable: bool) -> u32 {
        self.globals.push((ty, mutable));
        (self.globals.len() - 1) as u32
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleEnvironment for TestEnvironment {
    fn direct_signature(&self, func: FuncIndex) -> Signature {
        let sig_index = self.functions[func.index()];
        self.signatures[sig_index].clone()
    }

    fn indirect_signature(&self, sig: crate::ir::SignatureIndex) -> Signature {
        self.signatures[sig.index()].clone()
    }

    fn signature_id(&self, sig: crate::ir::SignatureIndex) -> i64 {
        sig.index() as i64
    }

    fn global_type(&self, global: GlobalIndex) -> (Type, bool) {
        self.globals[global.index()]
    }

    fn memory_base_offset(&self, memory: MemoryIndex) -> i32 {
        self.memories[memory.index()].base_offset
    }

    fn memory_length_offset(&self, memory: MemoryIndex) -> i32 {
        self.memories[memory.index()].length_offset
    }

    fn table_base_offset(&self, table: TableIndex) -> i32 {
        self.tables[table.index()].base_offset
    }

    fn table_length_offset(&self, table: TableIndex) -> i32 {
        self.tables[table.index()].length_offset
    }

    fn table_entry_layout(&self) -> TableEntryLayout {
        self.table_entry_layout
    }
}

impl SignatureProvider for TestEnvironment {
    fn direct_signature(&self, func: FuncIndex) -> Signature {
        ModuleEnvironment::direct_signature(self, func)
    }

    fn indirect_signature(&self, sig: crate::ir::SignatureIndex) -> Signature {
        ModuleEnvironment::indirect_signature(self, sig)
    }
}
