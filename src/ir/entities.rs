//! Stable numeric handles for IR entities (spec §3: "an instruction is
//! referenced by a stable numeric handle so passes can walk use-def edges
//! without chasing pointers"). All entities live in per-function arenas
//! (spec §9: "arena + indices").

use crate::entity_ref;

entity_ref!(Block, "block");
entity_ref!(Inst, "inst");
entity_ref!(Value, "v");

/// Index of a function within the module's function index space.
entity_ref!(FuncIndex, "func");
/// Index into the module's type/signature section.
entity_ref!(SignatureIndex, "sig");
/// Index into the module's table section.
entity_ref!(TableIndex, "table");
/// Index into the module's memory section.
entity_ref!(MemoryIndex, "mem");
/// Index into the module's global section.
entity_ref!(GlobalIndex, "global");

/// A reference to a callee usable as a direct-call target, resolved by the
/// module context (an imported function or another function in the same
/// module). Not a `Value`: it never flows through the dataflow graph.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FuncRef(pub FuncIndex);
