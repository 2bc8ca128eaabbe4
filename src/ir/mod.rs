//! The SSA intermediate representation (spec §3, component 2 of §2).

pub mod entities;
pub mod function;
pub mod instructions;
pub mod types;

pub use entities::{Block, FuncIndex, FuncRef, GlobalIndex, Inst, MemoryIndex, SignatureIndex, TableIndex, Value};
pub use function::{BlockData, DataFlowGraph, Function, Layout, PredEdge, ValueDef};
pub use instructions::{InstructionData, Opcode, ValueList};
pub use types::{CallConv, FloatCC, IntCC, MemFlags, Signature, TrapCode, Type};
