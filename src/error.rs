//! Error taxonomy for the compiler core (spec §7).
//!
//! Every fallible component returns [`CodegenResult`]. Traps are not
//! errors: they are data the finalizer records and the runtime classifies
//! at run time (§6), never a `Result::Err` here.

use crate::ir::{Block, FuncIndex};
use thiserror::Error;

pub type CodegenResult<T> = Result<T, CodegenError>;

/// The name of the pass or component that detected a failure, used purely
/// for diagnostics so a failure can be reproduced (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SsaBuilder,
    DeadBlockElimination,
    TrivialPhiElimination,
    CriticalEdgeSplitting,
    BlockLayout,
    Frontend,
    InstructionSelection,
    RegisterAllocation,
    Finalization,
    Encoding,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Stage::SsaBuilder => "ssa-builder",
            Stage::DeadBlockElimination => "dead-block-elimination",
            Stage::TrivialPhiElimination => "trivial-phi-elimination",
            Stage::CriticalEdgeSplitting => "critical-edge-splitting",
            Stage::BlockLayout => "block-layout",
            Stage::Frontend => "frontend",
            Stage::InstructionSelection => "instruction-selection",
            Stage::RegisterAllocation => "register-allocation",
            Stage::Finalization => "finalization",
            Stage::Encoding => "encoding",
        };
        f.write_str(s)
    }
}

/// Enough context to reproduce an `InternalError` (§7): which function,
/// which pass, and which block (if any) the invariant check failed in.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub func_index: Option<FuncIndex>,
    pub stage: Stage,
    pub block: Option<Block>,
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "in {}", self.stage)?;
        if let Some(func) = self.func_index {
            write!(f, ", function {}", func)?;
        }
        if let Some(block) = self.block {
            write!(f, ", block {}", block)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum CodegenError {
    /// The frontend detected an SSA-construction failure not caught by
    /// prior validation (e.g. unreachable stack read, control-stack
    /// mismatch).
    #[error("structural error {context}: {message}")]
    Structural {
        message: String,
        context: ErrorContext,
    },

    /// The module uses a feature the current backend does not support.
    #[error("unsupported feature `{feature}` {context}")]
    Unsupported {
        feature: String,
        context: ErrorContext,
    },

    /// Compilation exceeded a configured budget (time, memory, or retry
    /// count in the allocator).
    #[error("resource budget exceeded {context}: {message}")]
    Resource {
        message: String,
        context: ErrorContext,
    },

    /// An invariant check failed; compilation of the function is
    /// abandoned.
    #[error("internal compiler error {context}: {message}")]
    Internal {
        message: String,
        context: ErrorContext,
    },
}

impl CodegenError {
    pub fn structural(stage: Stage, func_index: Option<FuncIndex>, message: impl Into<String>) -> Self {
        CodegenError::Structural {
            message: message.into(),
            context: ErrorContext {
                func_index,
                stage,
                block: None,
            },
        }
    }

    pub fn unsupported(stage: Stage, feature: impl Into<String>) -> Self {
        CodegenError::Unsupported {
            feature: feature.into(),
            context: ErrorContext {
                func_index: None,
                stage,
                block: None,
            },
        }
    }

    pub fn resource(stage: Stage, message: impl Into<String>) -> Self {
        CodegenError::Resource {
            message: message.into(),
            context: ErrorContext {
                func_index: None,
                stage,
                block: None,
            },
        }
    }

    pub fn internal(stage: Stage, block: Option<Block>, message: impl Into<String>) -> Self {
        CodegenError::Internal {
            message: message.into(),
            context: ErrorContext {
                func_index: None,
                stage,
                block,
            },
        }
    }

    pub fn with_func_index(mut self, index: FuncIndex) -> Self {
        match &mut self {
            CodegenError::Structural { context, .. }
            | CodegenError::Unsupported { context, .. }
            | CodegenError::Resource { context, .. }
            | CodegenError::Internal { context, .. } => context.func_index = Some(index),
        }
        self
    }
}
