//! SSA Builder (spec §4.1): turns a linear sequence of "append
//! instruction" / "switch to block" events into well-formed SSA with
//! block parameters, handling reads from blocks that are branched to
//! before they are sealed.
//!
//! Grounded on the classic Braun/Buchwald on-the-fly SSA construction
//! algorithm as `cranelift-frontend`'s own `SSABuilder` implements it,
//! adapted to this crate's IR types. One deliberate simplification from
//! the teacher (recorded in DESIGN.md): trivial-phi placeholders are
//! resolved through a union-find-style substitution map at read time
//! rather than physically deleted and their predecessors' branch argument
//! lists rewritten in place; the general, fully physical elimination
//! (rewriting argument lists) is left to the middle-end's P2 pass, which
//! runs once on a finished function where a global fixed point is cheap
//! to compute in one pass instead of incrementally during construction.

use crate::entity::{EntityRef, SecondaryMap};
use crate::entity_ref;
use crate::error::{CodegenError, Stage};
use crate::ir::{
    Block, BlockData, Function, Inst, InstructionData, IntCC, MemFlags, Opcode, Signature, Type,
    Value, ValueList,
};
use hashbrown::HashMap;
use log::trace;
use smallvec::smallvec;

entity_ref!(Variable, "var");

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum BlockStatus {
    /// Not yet sealed; `pending` holds placeholder params created for
    /// variable reads that couldn't yet see every predecessor.
    Unsealed,
    Sealed,
}

struct BlockSsaState {
    status: BlockStatus,
    /// `(variable, placeholder value, its index in the block's param list)`
    /// awaiting resolution once the block is sealed.
    pending: Vec<(Variable, Value, u16)>,
}

impl Default for BlockSsaState {
    fn default() -> Self {
        BlockSsaState {
            status: BlockStatus::Unsealed,
            pending: Vec::new(),
        }
    }
}

/// Ephemeral construction-time state; discarded once a function's SSA is
/// finished being built (spec lifecycle: reset per function).
pub struct SsaBuilder {
    current: Option<Block>,
    /// Per-block current definition of each variable.
    defs: SecondaryMap<Block, HashMap<Variable, Value>>,
    blocks: SecondaryMap<Block, BlockSsaState>,
    /// Union-find-style substitution: a trivial-phi placeholder maps to
    /// the single value it collapsed to. Resolved with path compression.
    replaced: HashMap<Value, Value>,
}

impl SsaBuilder {
    pub fn new() -> Self {
        SsaBuilder {
            current: None,
            defs: SecondaryMap::with_default(HashMap::new()),
            blocks: SecondaryMap::with_default(BlockSsaState::default()),
            replaced: HashMap::new(),
        }
    }

    fn resolve(&mut self, value: Value) -> Value {
        let mut v = value;
        while let Some(&next) = self.replaced.get(&v) {
            v = next;
        }
        if v != value {
            self.replaced.insert(value, v);
        }
        v
    }
}

/// Builds one [`Function`]'s SSA form by driving an [`SsaBuilder`] over
/// it. Combines the arena-owning `Function` with the ephemeral `SsaBuilder`
/// state the way `cranelift_frontend::FunctionBuilder` wraps a `Function`
/// and an `SSABuilder`.
pub struct FunctionBuilder<'f> {
    pub func: &'f mut Function,
    ssa: SsaBuilder,
}

impl<'f> FunctionBuilder<'f> {
    pub fn new(func: &'f mut Function) -> Self {
        FunctionBuilder {
            func,
            ssa: SsaBuilder::new(),
        }
    }

    pub fn allocate_block(&mut self) -> Block {
        self.func.blocks.push(BlockData::default())
    }

    pub fn append_block_param(&mut self, block: Block, ty: Type) -> Value {
        let index = self.func.blocks[block].params.len() as u16;
        let value = self.func.dfg.append_block_param(block, ty, index);
        self.func.blocks[block].params.push(value);
        value
    }

    pub fn set_current(&mut self, block: Block) {
        self.ssa.current = Some(block);
    }

    pub fn current_block(&self) -> Block {
        self.current()
    }

    fn current(&self) -> Block {
        self.ssa.current.expect("no current block set")
    }

    fn has_terminator(&self, block: Block) -> bool {
        self.func.blocks[block]
            .insts
            .last()
            .map(|i| self.func.dfg.inst_data(*i).opcode().is_terminator())
            .unwrap_or(false)
    }

    fn push_inst(&mut self, data: InstructionData) -> Result<Inst, CodegenError> {
        let block = self.current();
        if self.has_terminator(block) {
            return Err(CodegenError::structural(
                Stage::SsaBuilder,
                None,
                format!("appended instruction after block {} was terminated", block),
            ));
        }
        let inst = self.func.dfg.make_inst(data);
        self.func.blocks[block].insts.push(inst);
        Ok(inst)
    }

    // ---- typed instruction constructors (spec: "append(opcode, inputs,
    // imm) -> instruction handle ...; fails if inputs' types do not match
    // the opcode's signature") ----

    pub fn iconst(&mut self, ty: Type, imm: i64) -> Result<Value, CodegenError> {
        if !matches!(ty, Type::I32 | Type::I64) {
            return Err(type_error(Opcode::Iconst, "integer result type", ty));
        }
        let inst = self.push_inst(InstructionData::UnaryImm64 {
            opcode: Opcode::Iconst,
            imm,
        })?;
        Ok(self.func.dfg.append_result(inst, ty))
    }

    pub fn f32const(&mut self, bits: u32) -> Result<Value, CodegenError> {
        let inst = self.push_inst(InstructionData::UnaryImmF32 {
            opcode: Opcode::F32const,
            bits,
        })?;
        Ok(self.func.dfg.append_result(inst, Type::F32))
    }

    pub fn f64const(&mut self, bits: u64) -> Result<Value, CodegenError> {
        let inst = self.push_inst(InstructionData::UnaryImmF64 {
            opcode: Opcode::F64const,
            bits,
        })?;
        Ok(self.func.dfg.append_result(inst, Type::F64))
    }

    fn binary_int(&mut self, opcode: Opcode, a: Value, b: Value) -> Result<Value, CodegenError> {
        let a = self.ssa.resolve(a);
        let b = self.ssa.resolve(b);
        let ty = self.func.dfg.value_type(a);
        if ty != self.func.dfg.value_type(b) || !ty.is_int() {
            return Err(type_error(opcode, "matching integer operands", ty));
        }
        let inst = self.push_inst(InstructionData::Binary {
            opcode,
            args: [a, b],
        })?;
        Ok(self.func.dfg.append_result(inst, ty))
    }

    pub fn iadd(&mut self, a: Value, b: Value) -> Result<Value, CodegenError> {
        self.binary_int(Opcode::Iadd, a, b)
    }
    pub fn isub(&mut self, a: Value, b: Value) -> Result<Value, CodegenError> {
        self.binary_int(Opcode::Isub, a, b)
    }
    pub fn imul(&mut self, a: Value, b: Value) -> Result<Value, CodegenError> {
        self.binary_int(Opcode::Imul, a, b)
    }

    fn binary_float(&mut self, opcode: Opcode, a: Value, b: Value) -> Result<Value, CodegenError> {
        let a = self.ssa.resolve(a);
        let b = self.ssa.resolve(b);
        let ty = self.func.dfg.value_type(a);
        if ty != self.func.dfg.value_type(b) || !ty.is_float_class() {
            return Err(type_error(opcode, "matching float operands", ty));
        }
        let inst = self.push_inst(InstructionData::Binary {
            opcode,
            args: [a, b],
        })?;
        Ok(self.func.dfg.append_result(inst, ty))
    }

    pub fn fadd(&mut self, a: Value, b: Value) -> Result<Value, CodegenError> {
        self.binary_float(Opcode::Fadd, a, b)
    }
    pub fn fsub(&mut self, a: Value, b: Value) -> Result<Value, CodegenError> {
        self.binary_float(Opcode::Fsub, a, b)
    }
    pub fn fmul(&mut self, a: Value, b: Value) -> Result<Value, CodegenError> {
        self.binary_float(Opcode::Fmul, a, b)
    }
    pub fn fdiv(&mut self, a: Value, b: Value) -> Result<Value, CodegenError> {
        self.binary_float(Opcode::Fdiv, a, b)
    }

    pub fn icmp(&mut self, cond: IntCC, a: Value, b: Value) -> Result<Value, CodegenError> {
        let a = self.ssa.resolve(a);
        let b = self.ssa.resolve(b);
        let ty = self.func.dfg.value_type(a);
        if ty != self.func.dfg.value_type(b) || !ty.is_int() {
            return Err(type_error(Opcode::Icmp, "matching integer operands", ty));
        }
        let inst = self.push_inst(InstructionData::IntCompare {
            opcode: Opcode::Icmp,
            cond,
            args: [a, b],
        })?;
        Ok(self.func.dfg.append_result(inst, Type::I32))
    }

    /// Float comparison (spec S8: the comparisons a trapping conversion
    /// decomposes into). Result is an `i32` boolean, matching `icmp`.
    pub fn fcmp(&mut self, cond: crate::ir::FloatCC, a: Value, b: Value) -> Result<Value, CodegenError> {
        let a = self.ssa.resolve(a);
        let b = self.ssa.resolve(b);
        let ty = self.func.dfg.value_type(a);
        if ty != self.func.dfg.value_type(b) || !ty.is_float_class() {
            return Err(type_error(Opcode::Fcmp, "matching float operands", ty));
        }
        let inst = self.push_inst(InstructionData::FloatCompare {
            opcode: Opcode::Fcmp,
            cond,
            args: [a, b],
        })?;
        Ok(self.func.dfg.append_result(inst, Type::I32))
    }

    /// Trapping float-to-signed-int conversion (spec S8).
    pub fn fcvt_to_sint(&mut self, result_ty: Type, arg: Value) -> Result<Value, CodegenError> {
        let arg = self.ssa.resolve(arg);
        let inst = self.push_inst(InstructionData::Unary {
            opcode: Opcode::FcvtToSint,
            arg,
        })?;
        Ok(self.func.dfg.append_result(inst, result_ty))
    }

    /// Saturating, non-trapping float-to-signed-int conversion (spec S8:
    /// NaN yields 0).
    pub fn fcvt_to_sint_sat(&mut self, result_ty: Type, arg: Value) -> Result<Value, CodegenError> {
        let arg = self.ssa.resolve(arg);
        let inst = self.push_inst(InstructionData::Unary {
            opcode: Opcode::FcvtToSintSat,
            arg,
        })?;
        Ok(self.func.dfg.append_result(inst, result_ty))
    }

    /// Zero-extends a 32-bit index to a 64-bit pointer-arithmetic value
    /// (spec §4.3: Wasm32 memory/table indices widened ahead of address
    /// computation).
    pub fn uextend_i64(&mut self, arg: Value) -> Result<Value, CodegenError> {
        let arg = self.ssa.resolve(arg);
        let inst = self.push_inst(InstructionData::Unary {
            opcode: Opcode::Uextend,
            arg,
        })?;
        Ok(self.func.dfg.append_result(inst, Type::I64))
    }

    pub fn load(
        &mut self,
        ty: Type,
        flags: MemFlags,
        memory: crate::ir::MemoryIndex,
        base: Value,
        offset: i32,
    ) -> Result<Value, CodegenError> {
        let base = self.ssa.resolve(base);
        let inst = self.push_inst(InstructionData::Load {
            opcode: Opcode::Load,
            flags,
            memory,
            offset,
            base,
        })?;
        Ok(self.func.dfg.append_result(inst, ty))
    }

    pub fn store(
        &mut self,
        flags: MemFlags,
        memory: crate::ir::MemoryIndex,
        value: Value,
        base: Value,
        offset: i32,
    ) -> Result<Inst, CodegenError> {
        let value = self.ssa.resolve(value);
        let base = self.ssa.resolve(base);
        self.push_inst(InstructionData::Store {
            opcode: Opcode::Store,
            flags,
            memory,
            offset,
            value,
            base,
        })
    }

    pub fn global_get(&mut self, ty: Type, global: crate::ir::GlobalIndex) -> Result<Value, CodegenError> {
        let inst = self.push_inst(InstructionData::GlobalAccess {
            opcode: Opcode::GlobalGet,
            global,
            value: None,
        })?;
        Ok(self.func.dfg.append_result(inst, ty))
    }

    pub fn global_set(
        &mut self,
        global: crate::ir::GlobalIndex,
        value: Value,
    ) -> Result<Inst, CodegenError> {
        let value = self.ssa.resolve(value);
        self.push_inst(InstructionData::GlobalAccess {
            opcode: Opcode::GlobalSet,
            global,
            value: Some(value),
        })
    }

    /// Reads a raw value out of the module/VM context at a fixed byte
    /// offset (spec §4.3: memory/table base pointer and bound lookups
    /// ahead of a bounds check), independent of the `GlobalIndex`-keyed
    /// Wasm-global path.
    pub fn vm_load(&mut self, ty: Type, offset: i32) -> Result<Value, CodegenError> {
        let inst = self.push_inst(InstructionData::VmAccess {
            opcode: Opcode::VmLoad,
            offset,
            value: None,
        })?;
        Ok(self.func.dfg.append_result(inst, ty))
    }

    pub fn vm_store(&mut self, offset: i32, value: Value) -> Result<Inst, CodegenError> {
        let value = self.ssa.resolve(value);
        self.push_inst(InstructionData::VmAccess {
            opcode: Opcode::VmStore,
            offset,
            value: Some(value),
        })
    }

    pub fn call(
        &mut self,
        func_ref: crate::ir::FuncRef,
        args: &[Value],
        results: &[Type],
    ) -> Result<ValueList, CodegenError> {
        let args: ValueList = args.iter().map(|v| self.ssa.resolve(*v)).collect();
        let inst = self.push_inst(InstructionData::Call {
            opcode: Opcode::Call,
            func_ref,
            args,
        })?;
        Ok(results
            .iter()
            .map(|ty| self.func.dfg.append_result(inst, *ty))
            .collect())
    }

    pub fn call_indirect(
        &mut self,
        sig: crate::ir::SignatureIndex,
        table: crate::ir::TableIndex,
        callee: Value,
        args: &[Value],
        results: &[Type],
    ) -> Result<ValueList, CodegenError> {
        let callee = self.ssa.resolve(callee);
        let args: ValueList = args.iter().map(|v| self.ssa.resolve(*v)).collect();
        let inst = self.push_inst(InstructionData::CallIndirect {
            opcode: Opcode::CallIndirect,
            sig,
            table,
            callee,
            args,
        })?;
        Ok(results
            .iter()
            .map(|ty| self.func.dfg.append_result(inst, *ty))
            .collect())
    }

    // ---- terminators ----

    fn record_pred(&mut self, target: Block, branch_inst: Inst) {
        let from = self.current();
        self.func.blocks[target].preds.push(crate::ir::PredEdge {
            block: from,
            inst: branch_inst,
        });
    }

    pub fn jump(&mut self, target: Block, args: &[Value]) -> Result<Inst, CodegenError> {
        let args: ValueList = args.iter().map(|v| self.ssa.resolve(*v)).collect();
        self.check_branch_args(target, &args)?;
        let inst = self.push_inst(InstructionData::Jump {
            opcode: Opcode::Jump,
            destination: target,
            args,
        })?;
        self.record_pred(target, inst);
        Ok(inst)
    }

    pub fn brif(
        &mut self,
        cond: Value,
        then_dest: Block,
        then_args: &[Value],
        else_dest: Block,
        else_args: &[Value],
    ) -> Result<Inst, CodegenError> {
        let cond = self.ssa.resolve(cond);
        let then_args: ValueList = then_args.iter().map(|v| self.ssa.resolve(*v)).collect();
        let else_args: ValueList = else_args.iter().map(|v| self.ssa.resolve(*v)).collect();
        self.check_branch_args(then_dest, &then_args)?;
        self.check_branch_args(else_dest, &else_args)?;
        let inst = self.push_inst(InstructionData::Brif {
            opcode: Opcode::Brif,
            cond,
            then_dest,
            then_args,
            else_dest,
            else_args,
        })?;
        self.record_pred(then_dest, inst);
        self.record_pred(else_dest, inst);
        Ok(inst)
    }

    pub fn return_(&mut self, args: &[Value]) -> Result<Inst, CodegenError> {
        let args: ValueList = args.iter().map(|v| self.ssa.resolve(*v)).collect();
        self.push_inst(InstructionData::MultiReturn {
            opcode: Opcode::Return,
            args,
        })
    }

    pub fn trap(&mut self, code: crate::ir::TrapCode) -> Result<Inst, CodegenError> {
        self.push_inst(InstructionData::Trap {
            opcode: Opcode::Trap,
            code,
        })
    }

    /// I2: every branch supplies exactly one argument per parameter of
    /// its successor, matching types.
    fn check_branch_args(&self, target: Block, args: &[Value]) -> Result<(), CodegenError> {
        let params = &self.func.blocks[target].params;
        if params.len() != args.len() {
            return Err(CodegenError::structural(
                Stage::SsaBuilder,
                None,
                format!(
                    "branch to {} supplies {} argument(s), expected {}",
                    target,
                    args.len(),
                    params.len()
                ),
            ));
        }
        for (&param, &arg) in params.iter().zip(args.iter()) {
            let expected = self.func.dfg.value_type(param);
            let got = self.func.dfg.value_type(arg);
            if expected != got {
                return Err(CodegenError::structural(
                    Stage::SsaBuilder,
                    None,
                    format!(
                        "branch to {} argument type mismatch: expected {}, got {}",
                        target, expected, got
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Marks `block` as having no further predecessors and resolves any
    /// placeholder parameters created while it was unsealed (spec §4.1).
    pub fn seal_block(&mut self, block: Block) -> Result<(), CodegenError> {
        if self.func.blocks[block].sealed {
            return Err(CodegenError::structural(
                Stage::SsaBuilder,
                None,
                format!("block {} sealed twice", block),
            ));
        }
        let pending = std::mem::take(&mut self.ssa.blocks[block].pending);
        for (var, placeholder, param_index) in pending {
            self.add_phi_operands(block, param_index, var, placeholder);
        }
        self.ssa.blocks[block].status = BlockStatus::Sealed;
        self.func.blocks[block].sealed = true;
        Ok(())
    }

    pub fn write_variable(&mut self, var: Variable, block: Block, value: Value) {
        let value = self.ssa.resolve(value);
        self.ssa.defs[block].insert(var, value);
    }

    pub fn read_variable(&mut self, var: Variable, ty: Type, block: Block) -> Value {
        if let Some(&v) = self.ssa.defs[block].get(&var) {
            return self.ssa.resolve(v);
        }
        self.read_variable_recursive(var, ty, block)
    }

    fn read_variable_recursive(&mut self, var: Variable, ty: Type, block: Block) -> Value {
        let value = if self.ssa.blocks[block].status == BlockStatus::Unsealed {
            let index = self.func.blocks[block].params.len() as u16;
            let placeholder = self.func.dfg.append_block_param(block, ty, index);
            self.func.blocks[block].params.push(placeholder);
            trace!(
                "ssa: block {} unsealed, inserting placeholder param {} for {:?}",
                block, placeholder, var
            );
            self.ssa.blocks[block].pending.push((var, placeholder, index));
            placeholder
        } else {
            let preds: Vec<Block> = self.func.blocks[block].preds.iter().map(|p| p.block).collect();
            match preds.as_slice() {
                [] => {
                    // Unreachable entry read with no predecessor and no
                    // write: this can only happen for a genuinely
                    // uninitialized local, which Wasm disallows by
                    // zero-initializing every local. Treat as a zero
                    // constant of the right type rather than fail here;
                    // the frontend is responsible for pre-seeding defs
                    // for real locals.
                    self.zero_of(ty)
                }
                [only] => self.read_variable(var, ty, *only),
                _ => {
                    let index = self.func.blocks[block].params.len() as u16;
                    let placeholder = self.func.dfg.append_block_param(block, ty, index);
                    self.func.blocks[block].params.push(placeholder);
                    // Break cycles (loop headers reading a variable
                    // defined in the loop body) before recursing into
                    // predecessors.
                    self.write_variable(var, block, placeholder);
                    self.add_phi_operands(block, index, var, placeholder);
                    self.ssa.resolve(placeholder)
                }
            }
        };
        self.write_variable(var, block, value);
        value
    }

    fn zero_of(&mut self, ty: Type) -> Value {
        match ty {
            Type::I32 | Type::I64 => self.iconst(ty, 0).expect("zero const"),
            Type::F32 => self.f32const(0).expect("zero const"),
            Type::F64 => self.f64const(0).expect("zero const"),
            _ => panic!("no zero constant for {}", ty),
        }
    }

    /// For each predecessor of `block`, supplies `var`'s value along that
    /// edge as the branch argument for `param_index`; then, if every
    /// supplied operand (ignoring self-references) turns out identical,
    /// collapses the placeholder to that one value (spec: "trivial-phi
    /// elimination").
    fn add_phi_operands(&mut self, block: Block, param_index: u16, var: Variable, phi: Value) {
        let preds: Vec<PredSnapshot> = self.func.blocks[block]
            .preds
            .iter()
            .map(|p| PredSnapshot {
                block: p.block,
                inst: p.inst,
            })
            .collect();

        let mut operands = Vec::with_capacity(preds.len());
        for pred in &preds {
            let operand = self.read_variable(var, self.func.dfg.value_type(phi), pred.block);
            self.append_branch_arg(pred.inst, block, operand);
            operands.push(operand);
        }

        let mut same: Option<Value> = None;
        let mut trivial = true;
        for &op in &operands {
            if op == phi {
                continue;
            }
            match same {
                None => same = Some(op),
                Some(s) if s == op => {}
                Some(_) => {
                    trivial = false;
                    break;
                }
            }
        }

        if trivial {
            if let Some(unique) = same {
                trace!("ssa: collapsing trivial phi {} to {}", phi, unique);
                self.ssa.replaced.insert(phi, unique);
            }
            // If `same` is None, every predecessor read back the phi
            // itself (an unreachable/degenerate loop); leave it as-is.
        }
        let _ = param_index;
    }

    fn append_branch_arg(&mut self, branch_inst: Inst, target: Block, value: Value) {
        let value = self.ssa.resolve(value);
        match self.func.dfg.inst_data_mut(branch_inst) {
            InstructionData::Jump {
                destination, args, ..
            } if *destination == target => args.push(value),
            InstructionData::Brif {
                then_dest,
                then_args,
                else_dest,
                else_args,
                ..
            } => {
                if *then_dest == target {
                    then_args.push(value);
                } else if *else_dest == target {
                    else_args.push(value);
                }
            }
            _ => {}
        }
    }
}

struct PredSnapshot {
    block: Block,
    inst: Inst,
}

fn type_error(opcode: Opcode, expected: &str, got: Type) -> CodegenError {
    CodegenError::structural(
        Stage::SsaBuilder,
        None,
        format!("{:?}: expected {}, got {}", opcode, expected, got),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityRef;
    use crate::ir::{CallConv, Signature};

    fn new_func() -> Function {
        let mut sig = Signature::new(CallConv::AppleAarch64);
        sig.params.push(Type::I32);
        sig.results.push(Type::I32);
        Function::new("test", sig)
    }

    #[test]
    fn diamond_join_produces_block_param() {
        let mut func = new_func();
        let mut b = FunctionBuilder::new(&mut func);

        let entry = b.allocate_block();
        let then_blk = b.allocate_block();
        let else_blk = b.allocate_block();
        let join = b.allocate_block();
        let join_param = b.append_block_param(join, Type::I32);

        b.set_current(entry);
        let c = b.iconst(Type::I32, 1).unwrap();
        b.brif(c, then_blk, &[], else_blk, &[]).unwrap();
        b.seal_block(then_blk).unwrap();
        b.seal_block(else_blk).unwrap();

        b.set_current(then_blk);
        let one = b.iconst(Type::I32, 1).unwrap();
        b.jump(join, &[one]).unwrap();

        b.set_current(else_blk);
        let two = b.iconst(Type::I32, 2).unwrap();
        b.jump(join, &[two]).unwrap();

        b.seal_block(join).unwrap();
        b.seal_block(entry).unwrap();

        b.set_current(join);
        b.return_(&[join_param]).unwrap();

        assert_eq!(func.blocks[join].preds.len(), 2);
        assert!(func.terminator_holds(entry));
        assert!(func.terminator_holds(join));
    }

    #[test]
    fn unsealed_loop_header_read_becomes_trivial_phi() {
        let mut func = new_func();
        let mut b = FunctionBuilder::new(&mut func);
        let var = Variable::new(0);

        let entry = b.allocate_block();
        let header = b.allocate_block();

        b.set_current(entry);
        let init = b.iconst(Type::I32, 7).unwrap();
        b.write_variable(var, entry, init);
        b.jump(header, &[]).unwrap();
        b.seal_block(entry).unwrap();

        // Header is unsealed (the loop back-edge hasn't been emitted
        // yet); reading `var` here must not panic and must later
        // resolve, via trivial-phi collapse, to `init` directly since
        // the only other "edge" is the back-edge re-writing the same
        // value.
        b.set_current(header);
        let read = b.read_variable(var, Type::I32, header);
        b.write_variable(var, header, read);
        b.jump(header, &[]).unwrap();
        b.seal_block(header).unwrap();

        let resolved = b.ssa.resolve(read);
        assert_eq!(resolved, init);
    }
}
