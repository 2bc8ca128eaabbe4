//! `Function`: the per-function SSA container. Owns every block,
//! instruction and value arena for one function (spec §3 lifecycle:
//! "SSA structures are built per function ... then reset ... at the end
//! of each function").

use crate::entity::{PrimaryMap, SecondaryMap};
use crate::ir::entities::{Block, Inst, Value};
use crate::ir::instructions::InstructionData;
use crate::ir::types::{Signature, Type};
use smallvec::SmallVec;

/// How a value came to exist: the producing instruction's Nth result, or
/// a block parameter. No phi-node variant exists (spec §3): block
/// parameters plus branch arguments carry that information instead.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ValueDef {
    Result(Inst, u16),
    Param(Block, u16),
}

#[derive(Clone, Debug)]
struct ValueData {
    ty: Type,
    def: ValueDef,
}

/// Tracks one incoming control-flow edge into a block, as the tuple the
/// spec calls for: `(predBlock, branchInstrInPred, branchArgIndexRange)`.
/// The index range is recovered on demand from the branch instruction's
/// own `InstructionData` rather than duplicated here.
#[derive(Clone, Copy, Debug)]
pub struct PredEdge {
    pub block: Block,
    pub inst: Inst,
}

#[derive(Clone, Debug, Default)]
pub struct BlockData {
    pub params: SmallVec<[Value; 4]>,
    pub insts: Vec<Inst>,
    pub preds: Vec<PredEdge>,
    pub sealed: bool,
}

/// Owns the instruction/value arenas and the use-def relationships
/// between them (spec §3 Instruction/Value/Block parameter definitions).
#[derive(Default)]
pub struct DataFlowGraph {
    insts: PrimaryMap<Inst, InstructionData>,
    inst_results: SecondaryMap<Inst, SmallVec<[Value; 2]>>,
    values: PrimaryMap<Value, ValueData>,
}

impl DataFlowGraph {
    pub fn new() -> Self {
        DataFlowGraph {
            insts: PrimaryMap::new(),
            inst_results: SecondaryMap::with_default(SmallVec::new()),
            values: PrimaryMap::new(),
        }
    }

    pub fn make_inst(&mut self, data: InstructionData) -> Inst {
        self.insts.push(data)
    }

    pub fn inst_data(&self, inst: Inst) -> &InstructionData {
        &self.insts[inst]
    }

    pub fn inst_data_mut(&mut self, inst: Inst) -> &mut InstructionData {
        &mut self.insts[inst]
    }

    /// Appends one result value of `ty` to `inst`, returning the new
    /// value. Result index is assigned in call order.
    pub fn append_result(&mut self, inst: Inst, ty: Type) -> Value {
        let index = self.inst_results[inst].len() as u16;
        let value = self.values.push(ValueData {
            ty,
            def: ValueDef::Result(inst, index),
        });
        self.inst_results[inst].push(value);
        value
    }

    pub fn inst_results(&self, inst: Inst) -> &[Value] {
        &self.inst_results[inst]
    }

    pub fn append_block_param(&mut self, block: Block, ty: Type, index: u16) -> Value {
        self.values.push(ValueData {
            ty,
            def: ValueDef::Param(block, index),
        })
    }

    pub fn value_type(&self, value: Value) -> Type {
        self.values[value].ty
    }

    pub fn value_def(&self, value: Value) -> ValueDef {
        self.values[value].def
    }
}

/// Linear block order, assigned by the block-layout pass (spec §4.2 P4).
/// Before layout runs this simply mirrors allocation order.
#[derive(Default)]
pub struct Layout {
    pub order: Vec<Block>,
}

pub struct Function {
    pub name: String,
    pub signature: Signature,
    pub dfg: DataFlowGraph,
    pub blocks: PrimaryMap<Block, BlockData>,
    pub layout: Layout,
    pub entry: Option<Block>,
}

impl Function {
    pub fn new(name: impl Into<String>, signature: Signature) -> Self {
        Function {
            name: name.into(),
            signature,
            dfg: DataFlowGraph::new(),
            blocks: PrimaryMap::new(),
            layout: Layout::default(),
            entry: None,
        }
    }

    pub fn block_terminator(&self, block: Block) -> Option<Inst> {
        self.blocks[block].insts.last().copied()
    }

    /// Every block's instruction list has exactly one terminator, at the
    /// end (I3). Used by passes and tests to re-check the invariant
    /// holds after a transform.
    pub fn terminator_holds(&self, block: Block) -> bool {
        let insts = &self.blocks[block].insts;
        match insts.split_last() {
            None => false,
            Some((last, rest)) => {
                self.dfg.inst_data(*last).opcode().is_terminator()
                    && rest
                        .iter()
                        .all(|i| !self.dfg.inst_data(*i).opcode().is_terminator())
            }
        }
    }
}
