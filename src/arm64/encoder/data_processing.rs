// This module encodes the integer data-processing families that do not multiply: add/sub with
// an immediate, a shifted register or an extended register; logical operations on a shifted
// register or a bitmask immediate; move-wide (MOVZ/MOVN/MOVK); and add/sub with carry. The
// common aliases (cmp, cmn, neg, negs, mov, mvn, tst, ngc, ngcs) are wrappers that only rewrite
// operands, usually substituting the zero register. Logical immediates are taken as the raw
// (N, immr, imms) fields and are checked with the same DecodeBitMasks procedure the interpreter
// uses, so a reserved pattern is rejected here rather than at execution. mov_imm produces the
// shortest MOVZ/MOVN + MOVK sequence for an arbitrary constant.

//! Data-processing (immediate and register) encodings.

use super::{
    gp, ranged, unsigned, EncodeResult, EncodingError, ExtendKind, MachineWord, OperandSize,
    ShiftKind,
};
use crate::arm64::ZR;
use crate::core::register_file::AsmReg;

/// Add/subtract flavour: the `op` and `S` bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddSubOp {
    Add,
    Adds,
    Sub,
    Subs,
}

impl AddSubOp {
    const fn bits(self) -> u32 {
        match self {
            AddSubOp::Add => 0,
            AddSubOp::Adds => 1 << 29,
            AddSubOp::Sub => 1 << 30,
            AddSubOp::Subs => 1 << 30 | 1 << 29,
        }
    }

    pub const fn sets_flags(self) -> bool {
        matches!(self, AddSubOp::Adds | AddSubOp::Subs)
    }

    pub const fn is_sub(self) -> bool {
        matches!(self, AddSubOp::Sub | AddSubOp::Subs)
    }
}

/// ADD/SUB (immediate): 12-bit unsigned immediate, optionally shifted left by 12.
pub fn add_sub_imm(
    op: AddSubOp,
    size: OperandSize,
    rd: AsmReg,
    rn: AsmReg,
    imm12: u32,
    shift12: bool,
) -> EncodeResult<MachineWord> {
    let rd = gp("rd", rd)?;
    let rn = gp("rn", rn)?;
    let imm12 = unsigned("imm12", imm12 as i64, 12)?;
    let sh = (shift12 as u32) << 22;
    Ok(MachineWord(
        size.sf() | 0x1100_0000 | op.bits() | sh | imm12 << 10 | rn << 5 | rd,
    ))
}

/// ADD/SUB (shifted register). ROR is not defined for this family.
#[allow(clippy::too_many_arguments)]
pub fn add_sub_shifted(
    op: AddSubOp,
    size: OperandSize,
    rd: AsmReg,
    rn: AsmReg,
    rm: AsmReg,
    shift: ShiftKind,
    amount: u8,
) -> EncodeResult<MachineWord> {
    if shift == ShiftKind::Ror {
        return Err(EncodingError::InvalidOperand {
            reason: "add/sub shifted register does not accept ROR",
        });
    }
    let rd = gp("rd", rd)?;
    let rn = gp("rn", rn)?;
    let rm = gp("rm", rm)?;
    let imm6 = ranged("amount", amount as i64, 0, size.bits() as i64 - 1)?;
    Ok(MachineWord(
        size.sf()
            | 0x0B00_0000
            | op.bits()
            | (shift as u32) << 22
            | rm << 16
            | imm6 << 10
            | rn << 5
            | rd,
    ))
}

/// ADD/SUB (extended register): `rm` extended, then shifted left by 0..=4.
#[allow(clippy::too_many_arguments)]
pub fn add_sub_extended(
    op: AddSubOp,
    size: OperandSize,
    rd: AsmReg,
    rn: AsmReg,
    rm: AsmReg,
    extend: ExtendKind,
    amount: u8,
) -> EncodeResult<MachineWord> {
    let rd = gp("rd", rd)?;
    let rn = gp("rn", rn)?;
    let rm = gp("rm", rm)?;
    let imm3 = ranged("amount", amount as i64, 0, 4)?;
    Ok(MachineWord(
        size.sf()
            | 0x0B20_0000
            | op.bits()
            | rm << 16
            | extend.bits() << 13
            | imm3 << 10
            | rn << 5
            | rd,
    ))
}

pub fn add_imm(size: OperandSize, rd: AsmReg, rn: AsmReg, imm: u32) -> EncodeResult<MachineWord> {
    add_sub_imm(AddSubOp::Add, size, rd, rn, imm, false)
}

pub fn adds_imm(size: OperandSize, rd: AsmReg, rn: AsmReg, imm: u32) -> EncodeResult<MachineWord> {
    add_sub_imm(AddSubOp::Adds, size, rd, rn, imm, false)
}

pub fn sub_imm(size: OperandSize, rd: AsmReg, rn: AsmReg, imm: u32) -> EncodeResult<MachineWord> {
    add_sub_imm(AddSubOp::Sub, size, rd, rn, imm, false)
}

pub fn subs_imm(size: OperandSize, rd: AsmReg, rn: AsmReg, imm: u32) -> EncodeResult<MachineWord> {
    add_sub_imm(AddSubOp::Subs, size, rd, rn, imm, false)
}

pub fn cmp_imm(size: OperandSize, rn: AsmReg, imm: u32) -> EncodeResult<MachineWord> {
    add_sub_imm(AddSubOp::Subs, size, ZR, rn, imm, false)
}

pub fn cmn_imm(size: OperandSize, rn: AsmReg, imm: u32) -> EncodeResult<MachineWord> {
    add_sub_imm(AddSubOp::Adds, size, ZR, rn, imm, false)
}

pub fn add(size: OperandSize, rd: AsmReg, rn: AsmReg, rm: AsmReg) -> EncodeResult<MachineWord> {
    add_sub_shifted(AddSubOp::Add, size, rd, rn, rm, ShiftKind::Lsl, 0)
}

pub fn adds(size: OperandSize, rd: AsmReg, rn: AsmReg, rm: AsmReg) -> EncodeResult<MachineWord> {
    add_sub_shifted(AddSubOp::Adds, size, rd, rn, rm, ShiftKind::Lsl, 0)
}

pub fn sub(size: OperandSize, rd: AsmReg, rn: AsmReg, rm: AsmReg) -> EncodeResult<MachineWord> {
    add_sub_shifted(AddSubOp::Sub, size, rd, rn, rm, ShiftKind::Lsl, 0)
}

pub fn subs(size: OperandSize, rd: AsmReg, rn: AsmReg, rm: AsmReg) -> EncodeResult<MachineWord> {
    add_sub_shifted(AddSubOp::Subs, size, rd, rn, rm, ShiftKind::Lsl, 0)
}

pub fn cmp(size: OperandSize, rn: AsmReg, rm: AsmReg) -> EncodeResult<MachineWord> {
    add_sub_shifted(AddSubOp::Subs, size, ZR, rn, rm, ShiftKind::Lsl, 0)
}

pub fn cmn(size: OperandSize, rn: AsmReg, rm: AsmReg) -> EncodeResult<MachineWord> {
    add_sub_shifted(AddSubOp::Adds, size, ZR, rn, rm, ShiftKind::Lsl, 0)
}

pub fn neg(
    size: OperandSize,
    rd: AsmReg,
    rm: AsmReg,
    shift: ShiftKind,
    amount: u8,
) -> EncodeResult<MachineWord> {
    add_sub_shifted(AddSubOp::Sub, size, rd, ZR, rm, shift, amount)
}

pub fn negs(
    size: OperandSize,
    rd: AsmReg,
    rm: AsmReg,
    shift: ShiftKind,
    amount: u8,
) -> EncodeResult<MachineWord> {
    add_sub_shifted(AddSubOp::Subs, size, rd, ZR, rm, shift, amount)
}

/// Logical operation: `opc` plus the `N` (invert second operand) bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Bic,
    Orr,
    Orn,
    Eor,
    Eon,
    Ands,
    Bics,
}

impl LogicalOp {
    pub const fn opc(self) -> u32 {
        match self {
            LogicalOp::And | LogicalOp::Bic => 0,
            LogicalOp::Orr | LogicalOp::Orn => 1,
            LogicalOp::Eor | LogicalOp::Eon => 2,
            LogicalOp::Ands | LogicalOp::Bics => 3,
        }
    }

    pub const fn inverts(self) -> bool {
        matches!(
            self,
            LogicalOp::Bic | LogicalOp::Orn | LogicalOp::Eon | LogicalOp::Bics
        )
    }
}

/// Logical (shifted register), including ROR.
#[allow(clippy::too_many_arguments)]
pub fn logical_shifted(
    op: LogicalOp,
    size: OperandSize,
    rd: AsmReg,
    rn: AsmReg,
    rm: AsmReg,
    shift: ShiftKind,
    amount: u8,
) -> EncodeResult<MachineWord> {
    let rd = gp("rd", rd)?;
    let rn = gp("rn", rn)?;
    let rm = gp("rm", rm)?;
    let imm6 = ranged("amount", amount as i64, 0, size.bits() as i64 - 1)?;
    let n = (op.inverts() as u32) << 21;
    Ok(MachineWord(
        size.sf()
            | 0x0A00_0000
            | op.opc() << 29
            | (shift as u32) << 22
            | n
            | rm << 16
            | imm6 << 10
            | rn << 5
            | rd,
    ))
}

macro_rules! logical_reg_wrappers {
    ($($name:ident => $op:ident),* $(,)?) => {
        $(
            pub fn $name(
                size: OperandSize,
                rd: AsmReg,
                rn: AsmReg,
                rm: AsmReg,
            ) -> EncodeResult<MachineWord> {
                logical_shifted(LogicalOp::$op, size, rd, rn, rm, ShiftKind::Lsl, 0)
            }
        )*
    };
}

logical_reg_wrappers! {
    and => And,
    bic => Bic,
    orr => Orr,
    orn => Orn,
    eor => Eor,
    eon => Eon,
    ands => Ands,
    bics => Bics,
}

/// Register move: `orr rd, zr, rm`.
pub fn mov(size: OperandSize, rd: AsmReg, rm: AsmReg) -> EncodeResult<MachineWord> {
    orr(size, rd, ZR, rm)
}

pub fn mvn(size: OperandSize, rd: AsmReg, rm: AsmReg) -> EncodeResult<MachineWord> {
    orn(size, rd, ZR, rm)
}

pub fn tst(size: OperandSize, rn: AsmReg, rm: AsmReg) -> EncodeResult<MachineWord> {
    ands(size, ZR, rn, rm)
}

/// DecodeBitMasks for a logical immediate. Returns `None` for reserved patterns.
pub fn decode_bit_masks(size: OperandSize, n: u8, immr: u8, imms: u8) -> Option<u64> {
    let combined = ((n as u32 & 1) << 6) | (!(imms as u32) & 0x3F);
    if combined == 0 {
        return None;
    }
    let len = 31 - combined.leading_zeros();
    if len < 1 {
        return None;
    }
    let esize = 1u32 << len;
    if esize > size.bits() {
        return None;
    }
    let levels = esize - 1;
    let s = imms as u32 & levels;
    let r = immr as u32 & levels;
    if s == levels {
        return None;
    }

    let welem: u64 = (1u64 << (s + 1)) - 1;
    let emask: u64 = if esize == 64 {
        u64::MAX
    } else {
        (1u64 << esize) - 1
    };
    let elem = if r == 0 {
        welem
    } else {
        ((welem >> r) | (welem << (esize - r))) & emask
    };

    let mut pattern = 0u64;
    let mut pos = 0;
    while pos < size.bits() {
        pattern |= elem << pos;
        pos += esize;
    }
    if size == OperandSize::W32 {
        pattern &= 0xFFFF_FFFF;
    }
    Some(pattern)
}

/// Logical (immediate) with raw bitmask fields. Only AND/ORR/EOR/ANDS exist.
#[allow(clippy::too_many_arguments)]
pub fn logical_imm(
    op: LogicalOp,
    size: OperandSize,
    rd: AsmReg,
    rn: AsmReg,
    n: u8,
    immr: u8,
    imms: u8,
) -> EncodeResult<MachineWord> {
    if op.inverts() {
        return Err(EncodingError::InvalidOperand {
            reason: "logical immediate has no inverted form",
        });
    }
    let rd = gp("rd", rd)?;
    let rn = gp("rn", rn)?;
    let n_bit = ranged("N", n as i64, 0, (size == OperandSize::X64) as i64)?;
    let immr_f = unsigned("immr", immr as i64, 6)?;
    let imms_f = unsigned("imms", imms as i64, 6)?;
    if decode_bit_masks(size, n, immr, imms).is_none() {
        return Err(EncodingError::InvalidOperand {
            reason: "reserved bitmask immediate",
        });
    }
    Ok(MachineWord(
        size.sf()
            | 0x1200_0000
            | op.opc() << 29
            | n_bit << 22
            | immr_f << 16
            | imms_f << 10
            | rn << 5
            | rd,
    ))
}

/// Full-width bitmask: `ones` consecutive set bits rotated right by `ror`.
fn full_width_mask(
    op: LogicalOp,
    size: OperandSize,
    rd: AsmReg,
    rn: AsmReg,
    ones: u8,
    ror: u8,
) -> EncodeResult<MachineWord> {
    let width = size.bits() as i64;
    let ones = ranged("ones", ones as i64, 1, width - 1)?;
    let ror = ranged("ror", ror as i64, 0, width - 1)?;
    let n = (size == OperandSize::X64) as u8;
    logical_imm(op, size, rd, rn, n, ror as u8, (ones - 1) as u8)
}

pub fn and_imm(size: OperandSize, rd: AsmReg, rn: AsmReg, ones: u8, ror: u8) -> EncodeResult<MachineWord> {
    full_width_mask(LogicalOp::And, size, rd, rn, ones, ror)
}

pub fn orr_imm(size: OperandSize, rd: AsmReg, rn: AsmReg, ones: u8, ror: u8) -> EncodeResult<MachineWord> {
    full_width_mask(LogicalOp::Orr, size, rd, rn, ones, ror)
}

pub fn eor_imm(size: OperandSize, rd: AsmReg, rn: AsmReg, ones: u8, ror: u8) -> EncodeResult<MachineWord> {
    full_width_mask(LogicalOp::Eor, size, rd, rn, ones, ror)
}

pub fn ands_imm(size: OperandSize, rd: AsmReg, rn: AsmReg, ones: u8, ror: u8) -> EncodeResult<MachineWord> {
    full_width_mask(LogicalOp::Ands, size, rd, rn, ones, ror)
}

pub fn tst_imm(size: OperandSize, rn: AsmReg, ones: u8, ror: u8) -> EncodeResult<MachineWord> {
    full_width_mask(LogicalOp::Ands, size, ZR, rn, ones, ror)
}

/// Move-wide opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveWideOp {
    Movn,
    Movz,
    Movk,
}

impl MoveWideOp {
    const fn opc(self) -> u32 {
        match self {
            MoveWideOp::Movn => 0,
            MoveWideOp::Movz => 2,
            MoveWideOp::Movk => 3,
        }
    }
}

/// MOVN/MOVZ/MOVK with a 16-bit immediate placed at halfword `hw`.
pub fn move_wide(
    op: MoveWideOp,
    size: OperandSize,
    rd: AsmReg,
    imm16: u32,
    hw: u8,
) -> EncodeResult<MachineWord> {
    let rd = gp("rd", rd)?;
    let imm16 = unsigned("imm16", imm16 as i64, 16)?;
    let hw = ranged("hw", hw as i64, 0, size.bits() as i64 / 16 - 1)?;
    Ok(MachineWord(
        size.sf() | 0x1280_0000 | op.opc() << 29 | hw << 21 | imm16 << 5 | rd,
    ))
}

pub fn movz(size: OperandSize, rd: AsmReg, imm16: u32, hw: u8) -> EncodeResult<MachineWord> {
    move_wide(MoveWideOp::Movz, size, rd, imm16, hw)
}

pub fn movn(size: OperandSize, rd: AsmReg, imm16: u32, hw: u8) -> EncodeResult<MachineWord> {
    move_wide(MoveWideOp::Movn, size, rd, imm16, hw)
}

pub fn movk(size: OperandSize, rd: AsmReg, imm16: u32, hw: u8) -> EncodeResult<MachineWord> {
    move_wide(MoveWideOp::Movk, size, rd, imm16, hw)
}

/// Materialize an arbitrary constant with MOVZ or MOVN followed by MOVKs.
pub fn mov_imm(size: OperandSize, rd: AsmReg, value: u64) -> EncodeResult<Vec<MachineWord>> {
    let halves = size.bits() / 16;
    if size == OperandSize::W32 && value > u32::MAX as u64 {
        return Err(EncodingError::ImmediateOutOfRange {
            field: "value",
            value: value as i64,
            min: 0,
            max: u32::MAX as i64,
        });
    }
    let half = |i: u32| ((value >> (i * 16)) & 0xFFFF) as u32;

    let zeros = (0..halves).filter(|&i| half(i) == 0).count();
    let ones = (0..halves).filter(|&i| half(i) == 0xFFFF).count();
    let inverted = ones > zeros;
    let filler = if inverted { 0xFFFF } else { 0 };

    let mut words = Vec::with_capacity(halves as usize);
    for i in 0..halves {
        let h = half(i);
        if h == filler {
            continue;
        }
        let word = if words.is_empty() {
            if inverted {
                movn(size, rd, !h & 0xFFFF, i as u8)?
            } else {
                movz(size, rd, h, i as u8)?
            }
        } else {
            movk(size, rd, h, i as u8)?
        };
        words.push(word);
    }

    if words.is_empty() {
        // All halfwords equal the filler: 0 or all-ones.
        let word = if inverted {
            movn(size, rd, 0, 0)?
        } else {
            movz(size, rd, 0, 0)?
        };
        words.push(word);
    }
    Ok(words)
}

/// ADC/ADCS/SBC/SBCS.
pub fn add_sub_carry(
    op: AddSubOp,
    size: OperandSize,
    rd: AsmReg,
    rn: AsmReg,
    rm: AsmReg,
) -> EncodeResult<MachineWord> {
    let rd = gp("rd", rd)?;
    let rn = gp("rn", rn)?;
    let rm = gp("rm", rm)?;
    Ok(MachineWord(
        size.sf() | 0x1A00_0000 | op.bits() | rm << 16 | rn << 5 | rd,
    ))
}

pub fn adc(size: OperandSize, rd: AsmReg, rn: AsmReg, rm: AsmReg) -> EncodeResult<MachineWord> {
    add_sub_carry(AddSubOp::Add, size, rd, rn, rm)
}

pub fn adcs(size: OperandSize, rd: AsmReg, rn: AsmReg, rm: AsmReg) -> EncodeResult<MachineWord> {
    add_sub_carry(AddSubOp::Adds, size, rd, rn, rm)
}

pub fn sbc(size: OperandSize, rd: AsmReg, rn: AsmReg, rm: AsmReg) -> EncodeResult<MachineWord> {
    add_sub_carry(AddSubOp::Sub, size, rd, rn, rm)
}

pub fn sbcs(size: OperandSize, rd: AsmReg, rn: AsmReg, rm: AsmReg) -> EncodeResult<MachineWord> {
    add_sub_carry(AddSubOp::Subs, size, rd, rn, rm)
}

pub fn ngc(size: OperandSize, rd: AsmReg, rm: AsmReg) -> EncodeResult<MachineWord> {
    sbc(size, rd, ZR, rm)
}

pub fn ngcs(size: OperandSize, rd: AsmReg, rm: AsmReg) -> EncodeResult<MachineWord> {
    sbcs(size, rd, ZR, rm)
}
