//! An optimizing ahead-of-time WebAssembly-to-native-code compiler core
//! (spec §1-§2): Wasm operators in, AArch64 machine code out, via an SSA
//! middle-end and a bottom-up instruction-selecting backend.
//!
//! Component boundaries mirror `cranelift-codegen`'s own module split —
//! `ir`/`ssa` (construction), `passes` (the middle-end), `isa`/`regalloc`/
//! `finalize`/`encode` (the AArch64 backend) — with `frontend` playing
//! the role `cranelift-wasm` plays ahead of the shared IR.

pub mod abi;
pub mod compile;
pub mod config;
pub mod encode;
pub mod entity;
pub mod error;
pub mod finalize;
pub mod frontend;
pub mod ir;
pub mod isa;
pub mod passes;
pub mod regalloc;
pub mod regclass;
pub mod ssa;
pub mod vreg;

pub use compile::{compile_function, compile_function_body};
pub use config::Flags;
pub use error::{CodegenError, CodegenResult};
