//! Branch family: immediate, conditional, compare/test-and-branch and register branches.
//!
//! Displacements count instructions (4-byte units) relative to the branch itself.

use super::{gp, signed, unsigned, Condition, EncodeResult, MachineWord, OperandSize};
use crate::arm64::LR;
use crate::core::register_file::AsmReg;

/// B / BL with a signed 26-bit displacement.
pub fn branch_imm(link: bool, offset: i32) -> EncodeResult<MachineWord> {
    let imm26 = signed("imm26", offset as i64, 26)?;
    let base = if link { 0x9400_0000 } else { 0x1400_0000 };
    Ok(MachineWord(base | imm26))
}

pub fn b(offset: i32) -> EncodeResult<MachineWord> {
    branch_imm(false, offset)
}

pub fn bl(offset: i32) -> EncodeResult<MachineWord> {
    branch_imm(true, offset)
}

/// B.cond with a signed 19-bit displacement.
pub fn b_cond(cond: Condition, offset: i32) -> EncodeResult<MachineWord> {
    let imm19 = signed("imm19", offset as i64, 19)?;
    Ok(MachineWord(0x5400_0000 | imm19 << 5 | cond.bits()))
}

/// CBZ / CBNZ.
pub fn compare_branch(
    nonzero: bool,
    size: OperandSize,
    rt: AsmReg,
    offset: i32,
) -> EncodeResult<MachineWord> {
    let rt = gp("rt", rt)?;
    let imm19 = signed("imm19", offset as i64, 19)?;
    let op = if nonzero { 1 << 24 } else { 0 };
    Ok(MachineWord(
        size.sf() | 0x3400_0000 | op | imm19 << 5 | rt,
    ))
}

pub fn cbz(size: OperandSize, rt: AsmReg, offset: i32) -> EncodeResult<MachineWord> {
    compare_branch(false, size, rt, offset)
}

pub fn cbnz(size: OperandSize, rt: AsmReg, offset: i32) -> EncodeResult<MachineWord> {
    compare_branch(true, size, rt, offset)
}

/// TBZ / TBNZ. The register width follows from the bit number.
pub fn test_branch(nonzero: bool, rt: AsmReg, bit: u8, offset: i32) -> EncodeResult<MachineWord> {
    let rt = gp("rt", rt)?;
    let bit = unsigned("bit", bit as i64, 6)?;
    let imm14 = signed("imm14", offset as i64, 14)?;
    let op = if nonzero { 1 << 24 } else { 0 };
    let b5 = (bit >> 5) << 31;
    let b40 = (bit & 0x1F) << 19;
    Ok(MachineWord(0x3600_0000 | b5 | op | b40 | imm14 << 5 | rt))
}

pub fn tbz(rt: AsmReg, bit: u8, offset: i32) -> EncodeResult<MachineWord> {
    test_branch(false, rt, bit, offset)
}

pub fn tbnz(rt: AsmReg, bit: u8, offset: i32) -> EncodeResult<MachineWord> {
    test_branch(true, rt, bit, offset)
}

/// Register branch flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchRegKind {
    Br,
    Blr,
    Ret,
}

pub fn branch_reg(kind: BranchRegKind, rn: AsmReg) -> EncodeResult<MachineWord> {
    let rn = gp("rn", rn)?;
    let base = match kind {
        BranchRegKind::Br => 0xD61F_0000,
        BranchRegKind::Blr => 0xD63F_0000,
        BranchRegKind::Ret => 0xD65F_0000,
    };
    Ok(MachineWord(base | rn << 5))
}

pub fn br(rn: AsmReg) -> EncodeResult<MachineWord> {
    branch_reg(BranchRegKind::Br, rn)
}

pub fn blr(rn: AsmReg) -> EncodeResult<MachineWord> {
    branch_reg(BranchRegKind::Blr, rn)
}

/// RET through `rn`; `ret(LR)` is the plain `ret`.
pub fn ret(rn: AsmReg) -> EncodeResult<MachineWord> {
    branch_reg(BranchRegKind::Ret, rn)
}

/// RET through the link register. Cannot fail.
pub fn ret_lr() -> MachineWord {
    MachineWord(0xD65F_0000 | (LR.id as u32) << 5)
}
