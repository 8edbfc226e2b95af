//! Bitfield moves (SBFM/BFM/UBFM) and EXTR, with the shift, insert, extract and
//! extend aliases derived from them.
//!
//! For register width `W`:
//!
//! | alias | primitive | immr | imms |
//! |---|---|---|---|
//! | `lsl #n` | UBFM | (W - n) % W | W - 1 - n |
//! | `lsr #n` / `asr #n` | UBFM / SBFM | n | W - 1 |
//! | `bfi`, `sbfiz`, `ubfiz` | BFM / SBFM / UBFM | (W - lsb) % W | width - 1 |
//! | `bfxil`, `sbfx`, `ubfx` | BFM / SBFM / UBFM | lsb | lsb + width - 1 |
//! | `sxtb`/`sxth`/`sxtw` | SBFM | 0 | 7 / 15 / 31 |
//! | `uxtb`/`uxth` | UBFM | 0 | 7 / 15 |
//! | `ror #n` | EXTR rd, rn, rn, #n | | |

use super::{gp, ranged, EncodeResult, MachineWord, OperandSize};
use crate::core::register_file::AsmReg;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitfieldOp {
    Sbfm,
    Bfm,
    Ubfm,
}

impl BitfieldOp {
    const fn opc(self) -> u32 {
        match self {
            BitfieldOp::Sbfm => 0,
            BitfieldOp::Bfm => 1,
            BitfieldOp::Ubfm => 2,
        }
    }
}

/// Canonical bitfield move. `N` always equals `sf`.
pub fn bitfield_move(
    op: BitfieldOp,
    size: OperandSize,
    rd: AsmReg,
    rn: AsmReg,
    immr: u8,
    imms: u8,
) -> EncodeResult<MachineWord> {
    let rd = gp("rd", rd)?;
    let rn = gp("rn", rn)?;
    let max = size.bits() as i64 - 1;
    let immr = ranged("immr", immr as i64, 0, max)?;
    let imms = ranged("imms", imms as i64, 0, max)?;
    let n = (size == OperandSize::X64) as u32;
    Ok(MachineWord(
        size.sf() | 0x1300_0000 | op.opc() << 29 | n << 22 | immr << 16 | imms << 10 | rn << 5 | rd,
    ))
}

pub fn sbfm(size: OperandSize, rd: AsmReg, rn: AsmReg, immr: u8, imms: u8) -> EncodeResult<MachineWord> {
    bitfield_move(BitfieldOp::Sbfm, size, rd, rn, immr, imms)
}

pub fn bfm(size: OperandSize, rd: AsmReg, rn: AsmReg, immr: u8, imms: u8) -> EncodeResult<MachineWord> {
    bitfield_move(BitfieldOp::Bfm, size, rd, rn, immr, imms)
}

pub fn ubfm(size: OperandSize, rd: AsmReg, rn: AsmReg, immr: u8, imms: u8) -> EncodeResult<MachineWord> {
    bitfield_move(BitfieldOp::Ubfm, size, rd, rn, immr, imms)
}

/// Shift amount check shared by the immediate shifts.
fn shift_amount(size: OperandSize, n: u8) -> EncodeResult<u32> {
    ranged("shift", n as i64, 0, size.bits() as i64 - 1)
}

/// Field position check shared by insert/extract: `lsb < W`, `1 <= width <= W - lsb`.
fn field(size: OperandSize, lsb: u8, width: u8) -> EncodeResult<(u32, u32)> {
    let w = size.bits() as i64;
    let lsb = ranged("lsb", lsb as i64, 0, w - 1)?;
    let width = ranged("width", width as i64, 1, w - lsb as i64)?;
    Ok((lsb, width))
}

pub fn lsl(size: OperandSize, rd: AsmReg, rn: AsmReg, n: u8) -> EncodeResult<MachineWord> {
    let w = size.bits();
    let n = shift_amount(size, n)?;
    ubfm(size, rd, rn, ((w - n) % w) as u8, (w - 1 - n) as u8)
}

pub fn lsr(size: OperandSize, rd: AsmReg, rn: AsmReg, n: u8) -> EncodeResult<MachineWord> {
    let n = shift_amount(size, n)?;
    ubfm(size, rd, rn, n as u8, (size.bits() - 1) as u8)
}

pub fn asr(size: OperandSize, rd: AsmReg, rn: AsmReg, n: u8) -> EncodeResult<MachineWord> {
    let n = shift_amount(size, n)?;
    sbfm(size, rd, rn, n as u8, (size.bits() - 1) as u8)
}

/// Insert-style aliases: the low `width` bits of rn land at `lsb`.
fn insert(
    op: BitfieldOp,
    size: OperandSize,
    rd: AsmReg,
    rn: AsmReg,
    lsb: u8,
    width: u8,
) -> EncodeResult<MachineWord> {
    let w = size.bits();
    let (lsb, width) = field(size, lsb, width)?;
    bitfield_move(op, size, rd, rn, ((w - lsb) % w) as u8, (width - 1) as u8)
}

/// Extract-style aliases: `width` bits of rn starting at `lsb` land at bit 0.
fn extract(
    op: BitfieldOp,
    size: OperandSize,
    rd: AsmReg,
    rn: AsmReg,
    lsb: u8,
    width: u8,
) -> EncodeResult<MachineWord> {
    let (lsb, width) = field(size, lsb, width)?;
    bitfield_move(op, size, rd, rn, lsb as u8, (lsb + width - 1) as u8)
}

pub fn bfi(size: OperandSize, rd: AsmReg, rn: AsmReg, lsb: u8, width: u8) -> EncodeResult<MachineWord> {
    insert(BitfieldOp::Bfm, size, rd, rn, lsb, width)
}

pub fn sbfiz(size: OperandSize, rd: AsmReg, rn: AsmReg, lsb: u8, width: u8) -> EncodeResult<MachineWord> {
    insert(BitfieldOp::Sbfm, size, rd, rn, lsb, width)
}

pub fn ubfiz(size: OperandSize, rd: AsmReg, rn: AsmReg, lsb: u8, width: u8) -> EncodeResult<MachineWord> {
    insert(BitfieldOp::Ubfm, size, rd, rn, lsb, width)
}

pub fn bfxil(size: OperandSize, rd: AsmReg, rn: AsmReg, lsb: u8, width: u8) -> EncodeResult<MachineWord> {
    extract(BitfieldOp::Bfm, size, rd, rn, lsb, width)
}

pub fn sbfx(size: OperandSize, rd: AsmReg, rn: AsmReg, lsb: u8, width: u8) -> EncodeResult<MachineWord> {
    extract(BitfieldOp::Sbfm, size, rd, rn, lsb, width)
}

pub fn ubfx(size: OperandSize, rd: AsmReg, rn: AsmReg, lsb: u8, width: u8) -> EncodeResult<MachineWord> {
    extract(BitfieldOp::Ubfm, size, rd, rn, lsb, width)
}

pub fn sxtb(size: OperandSize, rd: AsmReg, rn: AsmReg) -> EncodeResult<MachineWord> {
    sbfm(size, rd, rn, 0, 7)
}

pub fn sxth(size: OperandSize, rd: AsmReg, rn: AsmReg) -> EncodeResult<MachineWord> {
    sbfm(size, rd, rn, 0, 15)
}

/// Sign-extend a word into an X register.
pub fn sxtw(rd: AsmReg, rn: AsmReg) -> EncodeResult<MachineWord> {
    sbfm(OperandSize::X64, rd, rn, 0, 31)
}

/// Zero-extend a byte; only the W form exists.
pub fn uxtb(rd: AsmReg, rn: AsmReg) -> EncodeResult<MachineWord> {
    ubfm(OperandSize::W32, rd, rn, 0, 7)
}

pub fn uxth(rd: AsmReg, rn: AsmReg) -> EncodeResult<MachineWord> {
    ubfm(OperandSize::W32, rd, rn, 0, 15)
}

/// EXTR: bits `lsb..lsb+W` of the concatenation rn:rm.
pub fn extr(
    size: OperandSize,
    rd: AsmReg,
    rn: AsmReg,
    rm: AsmReg,
    lsb: u8,
) -> EncodeResult<MachineWord> {
    let rd = gp("rd", rd)?;
    let rn = gp("rn", rn)?;
    let rm = gp("rm", rm)?;
    let imms = ranged("lsb", lsb as i64, 0, size.bits() as i64 - 1)?;
    let n = (size == OperandSize::X64) as u32;
    Ok(MachineWord(
        size.sf() | 0x1380_0000 | n << 22 | rm << 16 | imms << 10 | rn << 5 | rd,
    ))
}

pub fn ror(size: OperandSize, rd: AsmReg, rn: AsmReg, n: u8) -> EncodeResult<MachineWord> {
    extr(size, rd, rn, rn, n)
}
