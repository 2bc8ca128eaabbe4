//! Register class: the integer/float partition shared by the ABI model,
//! the ISA's real registers, and the virtual-register model (spec §3:
//! "Integer vs float partition drives ABI register class selection;
//! 128-bit types are float-class for ABI purposes").

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum RegClass {
    Int,
    Float,
}
