// This module collects the AArch64 (A64) host side of the translator. encoder turns typed
// instruction descriptors into 32-bit machine words, one file per instruction family, and
// reports every out-of-range field as an EncodingError instead of masking it. register_binding
// holds the fixed guest-role to host-register table that compiled code and the driver agree
// on, together with the marshalling between GuestState and a host register file. interp is a
// small A64 interpreter for the subset of instructions the reference translator emits, used
// by InterpretingAllocator so the whole pipeline can run on hosts without an executable code
// cache. The x()/v() helpers name registers the way the A64 assembly syntax does.

//! AArch64 host architecture support.
//!
//! - Instruction encoding, one family per submodule
//! - Guest register binding
//! - Interpreter for emitted code

pub mod encoder;
pub mod interp;
pub mod register_binding;

use crate::core::register_file::{AsmReg, FP_BANK, GP_BANK};

/// General purpose register `x<n>` (also used for `w<n>`; width comes from the operand size).
pub const fn x(n: u8) -> AsmReg {
    AsmReg::new(GP_BANK, n)
}

/// SIMD/FP register `v<n>`.
pub const fn v(n: u8) -> AsmReg {
    AsmReg::new(FP_BANK, n)
}

/// Zero register. Shares encoding 31 with SP; the instruction decides which.
pub const ZR: AsmReg = x(31);

/// Stack pointer.
pub const SP: AsmReg = x(31);

/// Link register.
pub const LR: AsmReg = x(30);

pub use encoder::{EncodingError, InstructionDescriptor, MachineWord};
pub use interp::{HostRegisters, InterpretingAllocator};
pub use register_binding::{BindingError, GuestRole, RegisterBinding};
