// This module defines the register binding between the guest CPU and the AArch64 host: the
// fixed table that tells both the translator and the driver which host register holds each
// guest register while compiled code runs. It plays the part a calling convention plays for a
// conventional compiler. RegisterBinding::EMU68 is the table used by the reference translator
// (PC in x18, D0-D7 in x19-x26, A0-A4 in x13-x17, A5-A7 in x27-x29, FP0-FP7 in v8-v15, the
// GuestState base in x11 and x0-x7 as scratch). validate() checks the table once at startup
// with RegBitSet: duplicate host registers, integer roles placed in the FP bank (or the other
// way round), x30/x31, and overlaps between roles, the state base and the scratch set are all
// rejected. load() and store() marshal the bound roles between a GuestState and a host register
// file; 32-bit guest registers live in the low half of the X register.

//! Guest-to-host register binding.
//!
//! The binding is the ABI shared by compiled code and the execution driver.

use crate::arm64::interp::HostRegisters;
use crate::arm64::{v, x};
use crate::core::register_file::{AsmReg, RegBitSet, FP_BANK, GP_BANK};
use crate::jit::guest::GuestState;
use std::fmt;
use thiserror::Error;

/// A guest register that has a host home.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuestRole {
    Pc,
    Data(u8),
    Address(u8),
    Float(u8),
}

impl fmt::Display for GuestRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuestRole::Pc => write!(f, "PC"),
            GuestRole::Data(n) => write!(f, "D{n}"),
            GuestRole::Address(n) => write!(f, "A{n}"),
            GuestRole::Float(n) => write!(f, "FP{n}"),
        }
    }
}

/// Any entry of the binding table, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingSlot {
    Role(GuestRole),
    StateBase,
    Scratch(u8),
}

impl fmt::Display for BindingSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingSlot::Role(role) => write!(f, "{role}"),
            BindingSlot::StateBase => write!(f, "state base"),
            BindingSlot::Scratch(n) => write!(f, "scratch #{n}"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("{slot} is bound to nonexistent register {reg:?}")]
    InvalidRegister { slot: BindingSlot, reg: AsmReg },

    #[error("{slot} is bound to {reg}, which is in the wrong register bank")]
    WrongBank { slot: BindingSlot, reg: AsmReg },

    #[error("{slot} is bound to reserved register {reg}")]
    Reserved { slot: BindingSlot, reg: AsmReg },

    #[error("{reg} is bound to both {first} and {second}")]
    Duplicate {
        reg: AsmReg,
        first: BindingSlot,
        second: BindingSlot,
    },
}

/// Fixed mapping of guest roles to host registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterBinding {
    pub pc: AsmReg,
    pub data: [AsmReg; 8],
    pub address: [AsmReg; 8],
    pub fp: [AsmReg; 8],
    /// Holds the GuestState base while compiled code runs. Never a guest role.
    pub state_base: AsmReg,
    /// Free for compiled code; clobbered across units.
    pub scratch: [AsmReg; 8],
}

impl RegisterBinding {
    pub const EMU68: RegisterBinding = RegisterBinding {
        pc: x(18),
        data: [x(19), x(20), x(21), x(22), x(23), x(24), x(25), x(26)],
        address: [x(13), x(14), x(15), x(16), x(17), x(27), x(28), x(29)],
        fp: [v(8), v(9), v(10), v(11), v(12), v(13), v(14), v(15)],
        state_base: x(11),
        scratch: [x(0), x(1), x(2), x(3), x(4), x(5), x(6), x(7)],
    };

    /// Host register holding a guest role.
    pub fn host(&self, role: GuestRole) -> AsmReg {
        match role {
            GuestRole::Pc => self.pc,
            GuestRole::Data(n) => self.data[n as usize & 7],
            GuestRole::Address(n) => self.address[n as usize & 7],
            GuestRole::Float(n) => self.fp[n as usize & 7],
        }
    }

    pub fn data_reg(&self, n: u8) -> AsmReg {
        self.host(GuestRole::Data(n))
    }

    pub fn address_reg(&self, n: u8) -> AsmReg {
        self.host(GuestRole::Address(n))
    }

    /// All bound roles in a fixed order: PC, D0-D7, A0-A7, FP0-FP7.
    pub fn roles(&self) -> impl Iterator<Item = (GuestRole, AsmReg)> + '_ {
        std::iter::once((GuestRole::Pc, self.pc))
            .chain((0..8u8).map(move |n| (GuestRole::Data(n), self.data[n as usize])))
            .chain((0..8u8).map(move |n| (GuestRole::Address(n), self.address[n as usize])))
            .chain((0..8u8).map(move |n| (GuestRole::Float(n), self.fp[n as usize])))
    }

    /// Reverse lookup of a host register.
    pub fn role_of(&self, reg: AsmReg) -> Option<GuestRole> {
        self.roles().find(|&(_, r)| r == reg).map(|(role, _)| role)
    }

    /// Set of host registers holding guest roles.
    pub fn role_set(&self) -> RegBitSet {
        let regs: Vec<AsmReg> = self.roles().map(|(_, reg)| reg).collect();
        RegBitSet::from_regs(&regs)
    }

    pub fn validate(&self) -> Result<(), BindingError> {
        let mut seen = RegBitSet::new();
        let mut owners: Vec<(AsmReg, BindingSlot)> = Vec::with_capacity(34);

        let mut claim = |slot: BindingSlot, reg: AsmReg, bank| -> Result<(), BindingError> {
            if !reg.is_valid() {
                return Err(BindingError::InvalidRegister { slot, reg });
            }
            if reg.bank != bank {
                return Err(BindingError::WrongBank { slot, reg });
            }
            if reg.bank == GP_BANK && reg.id >= 30 {
                return Err(BindingError::Reserved { slot, reg });
            }
            if !seen.set(reg) {
                let first = owners
                    .iter()
                    .find(|(r, _)| *r == reg)
                    .map(|&(_, s)| s)
                    .unwrap_or(slot);
                return Err(BindingError::Duplicate {
                    reg,
                    first,
                    second: slot,
                });
            }
            owners.push((reg, slot));
            Ok(())
        };

        for (role, reg) in self.roles() {
            let bank = match role {
                GuestRole::Float(_) => FP_BANK,
                _ => GP_BANK,
            };
            claim(BindingSlot::Role(role), reg, bank)?;
        }
        claim(BindingSlot::StateBase, self.state_base, GP_BANK)?;
        for (n, &reg) in self.scratch.iter().enumerate() {
            claim(BindingSlot::Scratch(n as u8), reg, GP_BANK)?;
        }
        Ok(())
    }

    /// Copy the guest registers into their host homes.
    pub fn load(&self, state: &GuestState, regs: &mut HostRegisters) {
        regs.set_x(self.pc, state.pc as u64);
        for n in 0..8 {
            regs.set_x(self.data[n], state.d[n] as u64);
            regs.set_x(self.address[n], state.a[n] as u64);
            regs.set_v(self.fp[n], state.fp[n]);
        }
    }

    /// Copy the host homes back into the guest registers. Upper halves are dropped.
    pub fn store(&self, regs: &HostRegisters, state: &mut GuestState) {
        state.pc = regs.x(self.pc) as u32;
        for n in 0..8 {
            state.d[n] = regs.x(self.data[n]) as u32;
            state.a[n] = regs.x(self.address[n]) as u32;
            state.fp[n] = regs.v(self.fp[n]);
        }
    }
}

impl Default for RegisterBinding {
    fn default() -> Self {
        Self::EMU68
    }
}
