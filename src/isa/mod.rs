//! Target ISA backends (spec §2: "AArch64-first backend"). A single
//! backend is wired up today; the module boundary is where a second ISA
//! would plug in, mirroring how `cranelift-codegen` keeps each ISA under
//! its own `isa/<name>/` directory behind a common shape.

pub mod aarch64;
