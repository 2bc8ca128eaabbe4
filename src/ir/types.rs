//! The type lattice (spec §3): `{i32, i64, f32, f64, v128, funcref,
//! externref}`. Integer vs float partition drives ABI register class
//! selection; v128 is float-class for ABI purposes.

use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    I32,
    I64,
    F32,
    F64,
    V128,
    FuncRef,
    ExternRef,
}

impl Type {
    pub fn bytes(self) -> u32 {
        match self {
            Type::I32 | Type::F32 => 4,
            Type::I64 | Type::F64 | Type::FuncRef | Type::ExternRef => 8,
            Type::V128 => 16,
        }
    }

    pub fn is_int(self) -> bool {
        matches!(self, Type::I32 | Type::I64)
    }

    /// Whether the ABI places this type in the float/vector register
    /// class. `v128` is float-class for ABI purposes (spec §3).
    pub fn is_float_class(self) -> bool {
        matches!(self, Type::F32 | Type::F64 | Type::V128)
    }

    /// Reference types use the integer register class (a pointer-sized
    /// handle); they are neither `is_int` nor `is_float_class`.
    pub fn is_reference(self) -> bool {
        matches!(self, Type::FuncRef | Type::ExternRef)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Type::I32 => "i32",
            Type::I64 => "i64",
            Type::F32 => "f32",
            Type::F64 => "f64",
            Type::V128 => "v128",
            Type::FuncRef => "funcref",
            Type::ExternRef => "externref",
        };
        f.write_str(s)
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Calling convention tag. The core only ever targets one native ABI per
/// host platform, but carrying the tag (rather than hard-coding it) keeps
/// the ABI descriptor self-contained the way `cranelift_codegen::isa::
/// CallConv` does.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CallConv {
    SystemV,
    AppleAarch64,
}

/// Ordered parameter and result types of a function or call site.
/// Immutable after construction (spec §3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<Type>,
    pub results: Vec<Type>,
    pub call_conv: CallConv,
}

impl Signature {
    pub fn new(call_conv: CallConv) -> Self {
        Signature {
            params: Vec::new(),
            results: Vec::new(),
            call_conv,
        }
    }
}

/// Integer comparison condition codes, mirroring
/// `cranelift_codegen::ir::condcodes::IntCC`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IntCC {
    Equal,
    NotEqual,
    SignedLessThan,
    SignedGreaterThanOrEqual,
    SignedGreaterThan,
    SignedLessThanOrEqual,
    UnsignedLessThan,
    UnsignedGreaterThanOrEqual,
    UnsignedGreaterThan,
    UnsignedLessThanOrEqual,
}

impl IntCC {
    pub fn inverse(self) -> IntCC {
        use IntCC::*;
        match self {
            Equal => NotEqual,
            NotEqual => Equal,
            SignedLessThan => SignedGreaterThanOrEqual,
            SignedGreaterThanOrEqual => SignedLessThan,
            SignedGreaterThan => SignedLessThanOrEqual,
            SignedLessThanOrEqual => SignedGreaterThan,
            UnsignedLessThan => UnsignedGreaterThanOrEqual,
            UnsignedGreaterThanOrEqual => UnsignedLessThan,
            UnsignedGreaterThan => UnsignedLessThanOrEqual,
            UnsignedLessThanOrEqual => UnsignedGreaterThan,
        }
    }
}

/// Floating-point comparison condition codes, mirroring
/// `cranelift_codegen::ir::condcodes::FloatCC` (restricted to the
/// handful this core's frontend actually needs: ordered range checks
/// plus NaN detection for trapping float-to-int conversions, spec S8).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FloatCC {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    /// True when either operand is NaN; AArch64's `fcmp` sets this as
    /// the overflow flag (spec S8: the trapping conversion's NaN check).
    Unordered,
}

/// Trap kinds that can be recorded at a trap site (spec §6).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TrapCode {
    Unreachable,
    IntegerDivideByZero,
    IntegerOverflow,
    InvalidConversionToInteger,
    OutOfBoundsMemoryAccess,
    IndirectCallTypeMismatch,
    IndirectCallNull,
    StackOverflow,
    UnalignedAtomicAccess,
}

impl TrapCode {
    /// Stable numeric encoding written into the module context's trap-code
    /// slot by the exit sequence (spec §6) and carried in trap-site
    /// records (§6, §4.7) so the runtime can classify a trap without
    /// string matching.
    pub fn code(self) -> u16 {
        match self {
            TrapCode::Unreachable => 0,
            TrapCode::IntegerDivideByZero => 1,
            TrapCode::IntegerOverflow => 2,
            TrapCode::InvalidConversionToInteger => 3,
            TrapCode::OutOfBoundsMemoryAccess => 4,
            TrapCode::IndirectCallTypeMismatch => 5,
            TrapCode::IndirectCallNull => 6,
            TrapCode::StackOverflow => 7,
            TrapCode::UnalignedAtomicAccess => 8,
        }
    }
}

impl fmt::Display for TrapCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            TrapCode::Unreachable => "unreachable",
            TrapCode::IntegerDivideByZero => "integer-divide-by-zero",
            TrapCode::IntegerOverflow => "integer-overflow",
            TrapCode::InvalidConversionToInteger => "invalid-conversion-to-integer",
            TrapCode::OutOfBoundsMemoryAccess => "out-of-bounds-memory-access",
            TrapCode::IndirectCallTypeMismatch => "indirect-call-type-mismatch",
            TrapCode::IndirectCallNull => "indirect-call-null",
            TrapCode::StackOverflow => "stack-overflow",
            TrapCode::UnalignedAtomicAccess => "unaligned-atomic-access",
        };
        f.write_str(s)
    }
}

/// Flags attached to a memory access; kept minimal (alignment + trapping)
/// in the style of `cranelift_codegen::ir::MemFlags`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct MemFlags {
    pub aligned: bool,
    /// Statically known in-bounds: the frontend elides the explicit
    /// bounds check (spec §4.3) when this is set.
    pub checked: bool,
}
