//! System instructions: MRS/MSR, BRK/HLT/UDF and NOP.

use super::{gp, ranged, unsigned, EncodeResult, MachineWord};
use crate::core::register_file::AsmReg;
use std::fmt;

/// A system register named by its (op0, op1, CRn, CRm, op2) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemRegister {
    pub op0: u8,
    pub op1: u8,
    pub crn: u8,
    pub crm: u8,
    pub op2: u8,
}

impl SystemRegister {
    pub const fn new(op0: u8, op1: u8, crn: u8, crm: u8, op2: u8) -> Self {
        Self {
            op0,
            op1,
            crn,
            crm,
            op2,
        }
    }

    pub const TPIDRRO_EL0: Self = Self::new(3, 3, 13, 0, 3);
    pub const TPIDR_EL0: Self = Self::new(3, 3, 13, 0, 2);
    pub const NZCV: Self = Self::new(3, 3, 4, 2, 0);
    pub const FPCR: Self = Self::new(3, 3, 4, 4, 0);
    pub const FPSR: Self = Self::new(3, 3, 4, 4, 1);
    pub const CNTVCT_EL0: Self = Self::new(3, 3, 14, 0, 2);
    pub const CNTFRQ_EL0: Self = Self::new(3, 3, 14, 0, 0);

    /// Bits 20..5 of an MRS/MSR word.
    fn fields(self) -> EncodeResult<u32> {
        let o0 = ranged("op0", self.op0 as i64, 2, 3)? - 2;
        let op1 = unsigned("op1", self.op1 as i64, 3)?;
        let crn = unsigned("CRn", self.crn as i64, 4)?;
        let crm = unsigned("CRm", self.crm as i64, 4)?;
        let op2 = unsigned("op2", self.op2 as i64, 3)?;
        Ok(o0 << 19 | op1 << 16 | crn << 12 | crm << 8 | op2 << 5)
    }

    /// Recover the coordinates from an MRS/MSR word.
    pub fn from_word(word: u32) -> Self {
        Self::new(
            (2 + ((word >> 19) & 1)) as u8,
            ((word >> 16) & 7) as u8,
            ((word >> 12) & 0xF) as u8,
            ((word >> 8) & 0xF) as u8,
            ((word >> 5) & 7) as u8,
        )
    }
}

impl fmt::Display for SystemRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "S{}_{}_C{}_C{}_{}",
            self.op0, self.op1, self.crn, self.crm, self.op2
        )
    }
}

/// MRS rt, sysreg.
pub fn mrs(rt: AsmReg, reg: SystemRegister) -> EncodeResult<MachineWord> {
    let rt = gp("rt", rt)?;
    Ok(MachineWord(0xD530_0000 | reg.fields()? | rt))
}

/// MSR sysreg, rt.
pub fn msr(reg: SystemRegister, rt: AsmReg) -> EncodeResult<MachineWord> {
    let rt = gp("rt", rt)?;
    Ok(MachineWord(0xD510_0000 | reg.fields()? | rt))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    Brk,
    Hlt,
}

pub fn exception(kind: ExceptionKind, imm16: u32) -> EncodeResult<MachineWord> {
    let imm16 = unsigned("imm16", imm16 as i64, 16)?;
    let base = match kind {
        ExceptionKind::Brk => 0xD420_0000,
        ExceptionKind::Hlt => 0xD440_0000,
    };
    Ok(MachineWord(base | imm16 << 5))
}

pub fn brk(imm16: u32) -> EncodeResult<MachineWord> {
    exception(ExceptionKind::Brk, imm16)
}

pub fn hlt(imm16: u32) -> EncodeResult<MachineWord> {
    exception(ExceptionKind::Hlt, imm16)
}

/// Undefined-instruction marker. Emitted as HLT so debuggers stop on it.
pub fn udf(imm16: u32) -> EncodeResult<MachineWord> {
    hlt(imm16)
}

pub const fn nop() -> MachineWord {
    MachineWord(0xD503_201F)
}
