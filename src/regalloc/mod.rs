//! Register allocation (spec §4.5, §8): turns the VReg-operand machine
//! code instruction selection produced into one using only real AArch64
//! registers, via global liveness, a conservative interference graph, and
//! greedy graph coloring per register class, with spilling to a frame-local
//! slot area for whatever doesn't fit.
//!
//! Mirrors the shape most non-SSA register allocators take (and the one
//! `cranelift-codegen`'s older `regalloc` crate used before the move to
//! `regalloc2`): liveness dataflow, then a single interference graph shared
//! by both register classes, then per-class coloring. This implementation
//! does not coalesce moves or split live ranges; it trades allocation
//! quality for a much smaller, easier-to-verify pass, which is an
//! acceptable simplification for a from-scratch core.

use crate::error::{CodegenError, CodegenResult, Stage};
use crate::ir::Block;
use crate::isa::aarch64::inst::{Inst, MachLabel, MemSize};
use crate::isa::aarch64::regs::{
    allocatable_float_regs, allocatable_int_regs, RReg, TEMP_FLOAT_REGS, TEMP_INT_REGS,
};
use crate::isa::aarch64::lower::LoweredFunction;
use crate::abi::ABISignature;
use crate::regclass::RegClass;
use crate::vreg::{Reg, VReg, VRegTable};
use hashbrown::{HashMap, HashSet};

/// Where a value ended up after allocation: a real register, or a frame
/// slot the finalizer reserves room for.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Location {
    Reg(RReg),
    Spill(u32),
}

/// The state register allocation hands to the finalizer: every VReg
/// operand resolved to a real register (spilled ones threaded through
/// explicit reload/store instructions around their one use or def).
pub struct AllocatedFunction {
    pub entry: Block,
    pub order: Vec<Block>,
    pub blocks: HashMap<Block, Vec<Inst>>,
    pub abi: ABISignature,
    /// Callee-saved registers actually handed out as colors; the prologue
    /// and epilogue only need to save/restore these.
    pub used_callee_saved: Vec<RReg>,
    /// Number of 16-byte spill slots the frame must reserve.
    pub spill_slot_count: u32,
    pub incoming_stack_args: Vec<(Location, i32, MemSize)>,
    pub return_area_bytes: u32,
}

const SPILL_SLOT_BYTES: i32 = 16;
const MAX_SPILL_ROUNDS: u32 = 8;

fn successors(insts: &[Inst]) -> Vec<MachLabel> {
    insts.iter().filter_map(|i| i.branch_target()).collect()
}

/// Per-block use/def sets over VRegs, computed once and reused by every
/// fixed-point iteration.
struct BlockSets {
    /// Upward-exposed uses: vregs used in this block that are not also
    /// defined in it. Every vreg def in this IR dominates its uses within
    /// the same block (values are assigned once), so this is exact, not
    /// an approximation.
    uses: HashSet<VReg>,
    defs: HashSet<VReg>,
}

fn block_sets(insts: &[Inst]) -> BlockSets {
    let mut uses = HashSet::new();
    let mut defs = HashSet::new();
    for inst in insts {
        for r in inst.uses() {
            if let Some(v) = r.as_vreg() {
                uses.insert(v);
            }
        }
        for r in inst.defs() {
            if let Some(v) = r.as_vreg() {
                defs.insert(v);
            }
        }
    }
    let uses: HashSet<VReg> = uses.difference(&defs).copied().collect();
    BlockSets { uses, defs }
}

/// Global liveness via iterative backward dataflow over the machine CFG.
fn compute_liveness(
    order: &[Block],
    blocks: &HashMap<Block, Vec<Inst>>,
) -> (HashMap<Block, HashSet<VReg>>, HashMap<Block, HashSet<VReg>>) {
    let sets: HashMap<Block, BlockSets> = order
        .iter()
        .map(|&b| (b, block_sets(&blocks[&b])))
        .collect();
    let succs: HashMap<Block, Vec<Block>> =
        order.iter().map(|&b| (b, successors(&blocks[&b]))).collect();

    let mut live_in: HashMap<Block, HashSet<VReg>> =
        order.iter().map(|&b| (b, HashSet::new())).collect();
    let mut live_out: HashMap<Block, HashSet<VReg>> =
        order.iter().map(|&b| (b, HashSet::new())).collect();

    let mut changed = true;
    while changed {
        changed = false;
        // Reverse layout order converges faster for forward-ish control
        // flow; correctness doesn't depend on the order, only on running
        // to a fixed point.
        for &b in order.iter().rev() {
            let mut out = HashSet::new();
            for s in &succs[&b] {
                out.extend(live_in[s].iter().copied());
            }
            let mut inn = sets[&b].uses.clone();
            for v in out.difference(&sets[&b].defs) {
                inn.insert(*v);
            }
            if out != live_out[&b] {
                live_out.insert(b, out);
                changed = true;
            }
            if inn != live_in[&b] {
                live_in.insert(b, inn);
                changed = true;
            }
        }
    }
    (live_in, live_out)
}

struct Graph {
    adjacency: HashMap<VReg, HashSet<VReg>>,
    /// Colors a vreg may never take because a fixed physical register is
    /// live through (not merely used/defed at) the same program point.
    forbidden: HashMap<VReg, HashSet<RReg>>,
    /// Vregs live across at least one `Call` instruction; these must be
    /// colored to a callee-saved register rather than save/restored
    /// individually around every call site.
    call_crossing: HashSet<VReg>,
}

fn add_edge(adj: &mut HashMap<VReg, HashSet<VReg>>, a: VReg, b: VReg) {
    if a == b {
        return;
    }
    adj.entry(a).or_insert_with(HashSet::new).insert(b);
    adj.entry(b).or_insert_with(HashSet::new).insert(a);
}

fn clique(adj: &mut HashMap<VReg, HashSet<VReg>>, live: &HashSet<VReg>) {
    let items: Vec<VReg> = live.iter().copied().collect();
    for i in 0..items.len() {
        adj.entry(items[i]).or_insert_with(HashSet::new);
        for j in (i + 1)..items.len() {
            add_edge(adj, items[i], items[j]);
        }
    }
}

/// Builds the interference graph by a second backward scan per block,
/// this time at per-instruction granularity, seeded from each block's
/// global `live_out`.
fn build_graph(
    order: &[Block],
    blocks: &HashMap<Block, Vec<Inst>>,
    live_out: &HashMap<Block, HashSet<VReg>>,
) -> Graph {
    let mut adjacency: HashMap<VReg, HashSet<VReg>> = HashMap::new();
    let mut forbidden: HashMap<VReg, HashSet<RReg>> = HashMap::new();
    let mut call_crossing: HashSet<VReg> = HashSet::new();

    for &b in order {
        let insts = &blocks[&b];
        let mut cur = live_out[&b].clone();
        for inst in insts.iter().rev() {
            // `cur` here is live-after this instruction.
            clique(&mut adjacency, &cur);

            let defs: HashSet<VReg> = inst.defs().into_iter().filter_map(|r| r.as_vreg()).collect();
            let uses: HashSet<VReg> = inst.uses().into_iter().filter_map(|r| r.as_vreg()).collect();

            let live_through: HashSet<VReg> =
                cur.iter().filter(|v| !defs.contains(v)).copied().collect();

            let real_touched: Vec<RReg> = inst
                .uses()
                .into_iter()
                .chain(inst.defs())
                .filter_map(|r| match r {
                    Reg::Real(rr) => Some(rr),
                    Reg::Virtual(_) => None,
                })
                .collect();
            if !real_touched.is_empty() {
                for v in &live_through {
                    forbidden
                        .entry(*v)
                        .or_insert_with(HashSet::new)
                        .extend(real_touched.iter().copied());
                }
            }
            if inst.is_call() {
                call_crossing.extend(live_through.iter().copied());
            }

            let mut before = cur.clone();
            for v in &defs {
                before.remove(v);
            }
            before.extend(uses.iter().copied());
            clique(&mut adjacency, &before);

            cur = before;
        }
        // `cur` is now live_in[b], already cliqued as the `before` set of
        // the first instruction in program order (or empty, if the block
        // has none), so there is nothing further to do with it here.
    }

    Graph { adjacency, forbidden, call_crossing }
}

fn candidate_pool(class: RegClass) -> Vec<RReg> {
    match class {
        RegClass::Int => allocatable_int_regs(),
        RegClass::Float => allocatable_float_regs(),
    }
}

/// Greedily colors every vreg in `pending`, returning the vregs that
/// could not be given a color. Pinned vregs are pre-colored to their
/// forced register and never appear in `pending`.
fn color_round(
    vregs: &VRegTable,
    graph: &Graph,
    pending: &[VReg],
    colors: &mut HashMap<VReg, RReg>,
) -> Vec<VReg> {
    let mut order: Vec<VReg> = pending.to_vec();
    order.sort_by_key(|v| {
        let degree = graph.adjacency.get(v).map(|n| n.len()).unwrap_or(0);
        (std::cmp::Reverse(degree), *v)
    });

    let mut uncolored = Vec::new();
    for v in order {
        let class = vregs.class(v);
        let mut pool = candidate_pool(class);
        if graph.call_crossing.contains(&v) {
            pool.retain(|r| r.is_callee_saved());
        }
        if let Some(forb) = graph.forbidden.get(&v) {
            pool.retain(|r| !forb.contains(r));
        }
        if let Some(neighbors) = graph.adjacency.get(&v) {
            let used: HashSet<RReg> = neighbors.iter().filter_map(|n| colors.get(n).copied()).collect();
            pool.retain(|r| !used.contains(r));
        }
        match pool.first() {
            Some(&r) => {
                colors.insert(v, r);
            }
            None => uncolored.push(v),
        }
    }
    uncolored
}

fn resolve_operand(
    reg: Reg,
    is_def: bool,
    vregs: &VRegTable,
    colors: &HashMap<VReg, RReg>,
    spills: &HashMap<VReg, u32>,
    scratch_int: &mut usize,
    scratch_float: &mut usize,
    extra: &mut Vec<Inst>,
) -> Reg {
    let v = match reg {
        Reg::Real(r) => return Reg::Real(r),
        Reg::Virtual(v) => v,
    };
    if let Some(&r) = colors.get(&v) {
        return Reg::Real(r);
    }
    let slot = *spills.get(&v).expect("every vreg is either colored or spilled");
    let class = vregs.class(v);
    let scratch = match class {
        RegClass::Int => {
            let r = TEMP_INT_REGS[*scratch_int % TEMP_INT_REGS.len()];
            *scratch_int += 1;
            r
        }
        RegClass::Float => {
            let r = TEMP_FLOAT_REGS[*scratch_float % TEMP_FLOAT_REGS.len()];
            *scratch_float += 1;
            r
        }
    };
    let offset = slot as i32 * SPILL_SLOT_BYTES;
    if is_def {
        extra.push(Inst::SpillStore { rt: Reg::Real(scratch), offset });
    } else {
        extra.push(Inst::SpillReload { rt: Reg::Real(scratch), offset });
    }
    Reg::Real(scratch)
}

fn rewrite_with_spills(
    insts: Vec<Inst>,
    vregs: &VRegTable,
    colors: &HashMap<VReg, RReg>,
    spills: &HashMap<VReg, u32>,
) -> Vec<Inst> {
    let mut out = Vec::with_capacity(insts.len());
    for mut inst in insts {
        let mut reloads = Vec::new();
        let mut stores = Vec::new();
        let mut scratch_int = 0usize;
        let mut scratch_float = 0usize;
        inst.rewrite_regs(|reg, is_def| {
            if is_def {
                resolve_operand(reg, true, vregs, colors, spills, &mut scratch_int, &mut scratch_float, &mut stores)
            } else {
                resolve_operand(reg, false, vregs, colors, spills, &mut scratch_int, &mut scratch_float, &mut reloads)
            }
        });
        out.extend(reloads);
        out.push(inst);
        out.extend(stores);
    }
    out
}

/// Allocates real registers for a lowered function (spec §4.5): global
/// liveness, a conservative interference graph, greedy per-class
/// coloring with pinned vregs pre-colored and call-crossing vregs
/// restricted to callee-saved registers, then a bounded spill-and-retry
/// loop for whatever is left uncolored.
pub fn allocate(func: LoweredFunction) -> CodegenResult<AllocatedFunction> {
    let LoweredFunction {
        vregs,
        abi,
        entry,
        order,
        blocks,
        incoming_stack_args,
        return_area_bytes,
    } = func;

    let (_live_in, live_out) = compute_liveness(&order, &blocks);
    let graph = build_graph(&order, &blocks, &live_out);

    let mut colors: HashMap<VReg, RReg> = HashMap::new();
    let mut pending: Vec<VReg> = Vec::new();
    for (v, data) in vregs.iter() {
        if let Some(r) = data.pinned {
            colors.insert(v, r);
        } else {
            pending.push(v);
        }
    }

    let mut spills: HashMap<VReg, u32> = HashMap::new();
    let mut next_slot = 0u32;
    for round in 0.. {
        let uncolored = color_round(&vregs, &graph, &pending, &mut colors);
        if uncolored.is_empty() {
            break;
        }
        if round >= MAX_SPILL_ROUNDS {
            return Err(CodegenError::resource(
                Stage::RegisterAllocation,
                format!("failed to allocate {} vreg(s) after {} spill rounds", uncolored.len(), round),
            ));
        }
        for v in &uncolored {
            spills.insert(*v, next_slot);
            next_slot += 1;
        }
        // Spilled vregs no longer hold a color for their whole live
        // range (just a scratch register around each use/def), so they
        // can be dropped from the graph entirely before the next round:
        // any edge they held could only have blocked a neighbor's color
        // choice, never the other way around.
        pending = pending_minus_spilled(&graph, &colors, &spills);
    }

    let mut new_blocks = HashMap::new();
    for &b in &order {
        let insts = blocks.get(&b).cloned().unwrap_or_default();
        new_blocks.insert(b, rewrite_with_spills(insts, &vregs, &colors, &spills));
    }

    let resolved_stack_args = incoming_stack_args
        .into_iter()
        .map(|(v, off, size)| {
            let loc = match colors.get(&v) {
                Some(&r) => Location::Reg(r),
                None => Location::Spill(spills[&v]),
            };
            (loc, off, size)
        })
        .collect();

    let mut used_callee_saved: Vec<RReg> = colors.values().copied().filter(|r| r.is_callee_saved()).collect();
    used_callee_saved.sort_by_key(|r| format!("{}", r));
    used_callee_saved.dedup();

    Ok(AllocatedFunction {
        entry,
        order,
        blocks: new_blocks,
        abi,
        used_callee_saved,
        spill_slot_count: next_slot,
        incoming_stack_args: resolved_stack_args,
        return_area_bytes,
    })
}

/// Recomputes the still-uncolored vreg set after a spill round: every
/// vreg that has neither a color nor a spill slot yet.
fn pending_minus_spilled(
    graph: &Graph,
    colors: &HashMap<VReg, RReg>,
    spills: &HashMap<VReg, u32>,
) -> Vec<VReg> {
    graph
        .adjacency
        .keys()
        .copied()
        .filter(|v| !colors.contains_key(v) && !spills.contains_key(v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CallConv, Function, Signature, Type};
    use crate::isa::aarch64::lower::{lower_function, SignatureProvider};
    use crate::ir::{FuncIndex, SignatureIndex};
    use crate::passes::run_passes;
    use crate::ssa::FunctionBuilder;

    struct NoCallees;
    impl SignatureProvider for NoCallees {
        fn direct_signature(&self, _func: FuncIndex) -> Signature {
            Signature::new(CallConv::AppleAarch64)
        }
        fn indirect_signature(&self, _sig: SignatureIndex) -> Signature {
            Signature::new(CallConv::AppleAarch64)
        }
    }

    #[test]
    fn add_const_allocates_with_no_spills() {
        let mut sig = Signature::new(CallConv::AppleAarch64);
        sig.params.push(Type::I32);
        sig.results.push(Type::I32);
        let mut func = Function::new("add_const", sig);
        let mut b = FunctionBuilder::new(&mut func);
        let entry = b.allocate_block();
        let p = b.append_block_param(entry, Type::I32);
        b.set_current(entry);
        let c = b.iconst(Type::I32, 5).unwrap();
        let sum = b.iadd(p, c).unwrap();
        b.return_(&[sum]).unwrap();
        b.seal_block(entry).unwrap();
        func.entry = Some(entry);

        run_passes(&mut func).unwrap();
        let lowered = lower_function(&func, &NoCallees).unwrap();
        let allocated = allocate(lowered).unwrap();
        assert_eq!(allocated.spill_slot_count, 0);
        let body = &allocated.blocks[&allocated.entry];
        assert!(body.iter().all(|i| no_virtual_operands(i)));
    }

    fn no_virtual_operands(inst: &Inst) -> bool {
        let mut ok = true;
        let mut probe = inst.clone();
        probe.rewrite_regs(|reg, _| {
            if matches!(reg, Reg::Virtual(_)) {
                ok = false;
            }
            reg
        });
        ok
    }

    #[test]
    fn forces_many_live_int_values_to_spill_deterministically() {
        // More simultaneously live i32 values than there are allocatable
        // integer registers, forcing at least one spill slot.
        let mut sig = Signature::new(CallConv::AppleAarch64);
        for _ in 0..40 {
            sig.params.push(Type::I32);
        }
        sig.results.push(Type::I32);
        let mut func = Function::new("wide_add", sig);
        let mut b = FunctionBuilder::new(&mut func);
        let entry = b.allocate_block();
        let mut params = Vec::new();
        for _ in 0..40 {
            params.push(b.append_block_param(entry, Type::I32));
        }
        b.set_current(entry);
        let mut acc = params[0];
        for &p in &params[1..] {
            acc = b.iadd(acc, p).unwrap();
        }
        b.return_(&[acc]).unwrap();
        b.seal_block(entry).unwrap();
        func.entry = Some(entry);

        run_passes(&mut func).unwrap();
        let lowered = lower_function(&func, &NoCallees).unwrap();
        let allocated = allocate(lowered).unwrap();
        assert!(allocated.spill_slot_count > 0);
        let body = &allocated.blocks[&allocated.entry];
        assert!(body.iter().any(|i| matches!(i, Inst::SpillReload { .. })));
    }
}
