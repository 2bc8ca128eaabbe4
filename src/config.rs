//! Compilation flags (spec §2 ambient additions): a small `Flags`/
//! `Settings`-style descriptor, in the shape of
//! `cranelift_codegen::settings::Flags`, threaded explicitly into every
//! component that needs a toggle rather than read from a process-wide
//! singleton (spec §9: "no component looks up a process-wide singleton").

/// How aggressively debug-only invariant checks run. `Off` skips the
/// extra bookkeeping passes do purely for `debug_assert!` support;
/// `Full` is what test builds want.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DebugAssertLevel {
    Off,
    Full,
}

#[derive(Clone, Copy, Debug)]
pub struct Flags {
    /// P3 constant-argument rematerialization and critical-edge splitting
    /// (spec §4.2 P3). Disabling it is only useful for isolating a pass
    /// bug; instruction selection still assumes the invariant it
    /// establishes, so turning it off is not a supported configuration
    /// for anything past the SSA passes.
    pub split_critical_edges: bool,
    /// Whether the prologue emits the stack-overflow probe (spec §4.6 F1).
    pub emit_stack_overflow_check: bool,
    pub debug_assertions: DebugAssertLevel,
}

impl Default for Flags {
    fn default() -> Self {
        Flags {
            split_critical_edges: true,
            emit_stack_overflow_check: true,
            debug_assertions: DebugAssertLevel::Full,
        }
    }
}

pub struct FlagsBuilder {
    flags: Flags,
}

impl FlagsBuilder {
    pub fn new() -> Self {
        FlagsBuilder { flags: Flags::default() }
    }

    pub fn split_critical_edges(mut self, on: bool) -> Self {
        self.flags.split_critical_edges = on;
        self
    }

    pub fn emit_stack_overflow_check(mut self, on: bool) -> Self {
        self.flags.emit_stack_overflow_check = on;
        self
    }

    pub fn debug_assertions(mut self, level: DebugAssertLevel) -> Self {
        self.flags.debug_assertions = level;
        self
    }

    pub fn build(self) -> Flags {
        self.flags
    }
}

impl Default for FlagsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
