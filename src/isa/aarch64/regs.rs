//! AArch64 real register enumeration (spec §3: "RReg: an enumeration of
//! the target ISA's real registers; each has a class and a
//! caller-saved/callee-saved property from the ABI").

use std::fmt;

pub use crate::regclass::RegClass;

/// A real AArch64 register: `x0..=x30` (`x29`=fp, `x30`=lr) in the
/// integer class, `v0..=v31` in the float/vector class. `sp` is modeled
/// separately since it is never allocated to a VReg.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum RReg {
    X(u8),
    V(u8),
    Sp,
}

impl RReg {
    pub const FP: RReg = RReg::X(29);
    pub const LR: RReg = RReg::X(30);

    pub fn class(self) -> RegClass {
        match self {
            RReg::X(_) | RReg::Sp => RegClass::Int,
            RReg::V(_) => RegClass::Float,
        }
    }

    /// AAPCS64: x19-x28 and v8-v15 are callee-saved; everything else
    /// usable is caller-saved. x29 (fp)/x30 (lr) are handled specially
    /// by the prologue/epilogue rather than the general allocator.
    pub fn is_callee_saved(self) -> bool {
        match self {
            RReg::X(n) => (19..=28).contains(&n),
            RReg::V(n) => (8..=15).contains(&n),
            RReg::Sp => false,
        }
    }

    pub fn is_caller_saved(self) -> bool {
        !self.is_callee_saved() && !matches!(self, RReg::Sp | RReg::X(29) | RReg::X(30))
    }
}

impl fmt::Display for RReg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RReg::X(n) => write!(f, "x{}", n),
            RReg::V(n) => write!(f, "v{}", n),
            RReg::Sp => write!(f, "sp"),
        }
    }
}

/// Integer argument registers in AAPCS64 order (`x0..=x7`), after the two
/// reserved context registers the frontend ABI dedicates (spec §6).
pub const INT_ARG_REGS: [RReg; 8] = [
    RReg::X(0),
    RReg::X(1),
    RReg::X(2),
    RReg::X(3),
    RReg::X(4),
    RReg::X(5),
    RReg::X(6),
    RReg::X(7),
];

/// Float/vector argument registers (`v0..=v7`).
pub const FLOAT_ARG_REGS: [RReg; 8] = [
    RReg::V(0),
    RReg::V(1),
    RReg::V(2),
    RReg::V(3),
    RReg::V(4),
    RReg::V(5),
    RReg::V(6),
    RReg::V(7),
];

/// Integer result registers (`x0`, `x1` for a second wide result before
/// the caller-provided return area takes over).
pub const INT_RET_REGS: [RReg; 2] = [RReg::X(0), RReg::X(1)];
pub const FLOAT_RET_REGS: [RReg; 2] = [RReg::V(0), RReg::V(1)];

/// General-purpose scratch registers available to instruction selection
/// and the allocator for temporaries that never escape one lowering
/// decision (e.g. literal-pool loads, parallel-copy cycle breaking).
/// `x16`/`x17` are the AAPCS64 "intra-procedure-call" scratch registers,
/// conventionally free for exactly this purpose.
pub const TEMP_INT_REGS: [RReg; 2] = [RReg::X(16), RReg::X(17)];

/// Float/vector scratch registers, mirroring [`TEMP_INT_REGS`]: reserved
/// for the allocator's own spill reload/store sequences and excluded from
/// [`allocatable_float_regs`].
pub const TEMP_FLOAT_REGS: [RReg; 2] = [RReg::V(30), RReg::V(31)];

/// All allocatable integer registers, in a fixed, deterministic order
/// (spec I5/§8: register-allocator output must be reproducible for a
/// given input). Excludes `sp`, `fp` (x29), `lr` (x30), and the two
/// temp/scratch registers reserved above.
pub fn allocatable_int_regs() -> Vec<RReg> {
    (0..=28)
        .filter(|&n| n != 16 && n != 17)
        .map(RReg::X)
        .collect()
}

/// All allocatable float/vector registers, excluding the two reserved
/// scratch registers.
pub fn allocatable_float_regs() -> Vec<RReg> {
    (0..=29).map(RReg::V).collect()
}
