//! Value and control stacks the translator drives while walking a
//! function body, adapted from `cranelift_wasm::state::func_state`'s
//! `FuncTranslationState`/`ControlStackFrame`. One deliberate departure
//! from that teacher: `if` always allocates both its then- and
//! else-successor blocks up front (see [`ControlStackFrame::If`]) rather
//! than patching a placeholder branch target in when an explicit `else`
//! is found, since this crate's `brif` requires both destinations at the
//! point it's built (DESIGN.md).

use crate::ir::{Block, Type, Value};

/// One entry of the control stack: `block`/`loop`/`if` all push one of
/// these, matching `cranelift_wasm`'s three-variant split.
pub enum ControlStackFrame {
    If {
        /// Where control resumes after the `if` (spec: the `end`'s
        /// target); carries the construct's result values.
        destination: Block,
        /// The `if`'s own second successor, always allocated up front.
        else_block: Block,
        /// Whether an explicit `else` body was seen for this frame.
        has_else: bool,
        /// The `if`'s param values, kept around so a missing `else` can
        /// forward them straight through to `destination` unchanged.
        params: Vec<Value>,
        num_param_values: usize,
        num_return_values: usize,
        /// Value-stack depth right before the `if`'s own params.
        original_stack_size: usize,
        /// Whether the entry condition was statically reachable, so
        /// `else`/`end` can tell a genuinely dead frame from one that
        /// merely branched out early.
        reachable_at_entry: bool,
    },
    Block {
        destination: Block,
        num_param_values: usize,
        num_return_values: usize,
        original_stack_size: usize,
    },
    Loop {
        /// The loop header, a `br`/`br_if` at relative depth matching
        /// this frame targets here, re-entering with updated arguments.
        header: Block,
        destination: Block,
        num_param_values: usize,
        num_return_values: usize,
        original_stack_size: usize,
    },
}

impl ControlStackFrame {
    pub fn num_param_values(&self) -> usize {
        match self {
            ControlStackFrame::If { num_param_values, .. }
            | ControlStackFrame::Block { num_param_values, .. }
            | ControlStackFrame::Loop { num_param_values, .. } => *num_param_values,
        }
    }

    pub fn num_return_values(&self) -> usize {
        match self {
            ControlStackFrame::If { num_return_values, .. }
            | ControlStackFrame::Block { num_return_values, .. }
            | ControlStackFrame::Loop { num_return_values, .. } => *num_return_values,
        }
    }

    pub fn original_stack_size(&self) -> usize {
        match self {
            ControlStackFrame::If { original_stack_size, .. }
            | ControlStackFrame::Block { original_stack_size, .. }
            | ControlStackFrame::Loop { original_stack_size, .. } => *original_stack_size,
        }
    }

    pub fn is_loop(&self) -> bool {
        matches!(self, ControlStackFrame::Loop { .. })
    }

    /// The block a `br`/`br_if` at this depth jumps to, and how many
    /// stack values it carries across: a loop re-enters its header with
    /// its param values, everything else exits to `destination` with its
    /// result values (`cranelift_wasm`'s `br_destination`).
    pub fn br_destination(&self) -> (Block, usize) {
        match self {
            ControlStackFrame::Loop { header, num_param_values, .. } => (*header, *num_param_values),
            ControlStackFrame::If { destination, num_return_values, .. }
            | ControlStackFrame::Block { destination, num_return_values, .. } => {
                (*destination, *num_return_values)
            }
        }
    }

    /// The block control falls through to when this construct's `end`
    /// is reached without an intervening branch out.
    pub fn following_code(&self) -> Block {
        match self {
            ControlStackFrame::If { destination, .. }
            | ControlStackFrame::Block { destination, .. }
            | ControlStackFrame::Loop { destination, .. } => *destination,
        }
    }
}

/// The translator's per-function working state: the Wasm operand stack,
/// the nested-construct control stack, and whether the current position
/// is statically reachable (spec: dead code after `unreachable`/`br`
/// still needs its stack-shape bookkeeping, just no instructions).
pub struct FuncTranslationState {
    pub stack: Vec<Value>,
    pub control_stack: Vec<ControlStackFrame>,
    pub reachable: bool,
}

impl FuncTranslationState {
    pub fn new() -> Self {
        FuncTranslationState {
            stack: Vec::new(),
            control_stack: Vec::new(),
            reachable: true,
        }
    }

    pub fn push1(&mut self, v: Value) {
        self.stack.push(v);
    }

    pub fn pop1(&mut self) -> Value {
        self.stack.pop().expect("value stack underflow")
    }

    pub fn peek1(&self) -> Value {
        *self.stack.last().expect("value stack underflow")
    }

    pub fn popn(&mut self, n: usize) -> Vec<Value> {
        let at = self.stack.len() - n;
        self.stack.split_off(at)
    }

    pub fn push_block(
        &mut self,
        destination: Block,
        num_param_values: usize,
        num_return_values: usize,
    ) {
        self.control_stack.push(ControlStackFrame::Block {
            destination,
            num_param_values,
            num_return_values,
            original_stack_size: self.stack.len() - num_param_values,
        });
    }

    /// Called after the loop's param values have already been popped off
    /// the stack (they were consumed by the jump into `header`); the
    /// caller pushes `header`'s own block params back on afterward.
    pub fn push_loop(
        &mut self,
        header: Block,
        destination: Block,
        num_param_values: usize,
        num_return_values: usize,
    ) {
        self.control_stack.push(ControlStackFrame::Loop {
            header,
            destination,
            num_param_values,
            num_return_values,
            original_stack_size: self.stack.len(),
        });
    }

    pub fn push_if(
        &mut self,
        destination: Block,
        else_block: Block,
        params: Vec<Value>,
        num_return_values: usize,
        reachable_at_entry: bool,
    ) {
        let num_param_values = params.len();
        self.control_stack.push(ControlStackFrame::If {
            destination,
            else_block,
            has_else: false,
            original_stack_size: self.stack.len() - num_param_values,
            params,
            num_param_values,
            num_return_values,
            reachable_at_entry,
        });
    }
}
