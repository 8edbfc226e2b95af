//! Multiply, divide, variable shift and bit-scan encodings.

use super::{gp, EncodeResult, EncodingError, MachineWord, OperandSize};
use crate::arm64::ZR;
use crate::core::register_file::AsmReg;

/// MADD/MSUB: `rd = ra ± rn * rm`.
pub fn multiply_add(
    size: OperandSize,
    rd: AsmReg,
    rn: AsmReg,
    rm: AsmReg,
    ra: AsmReg,
    subtract: bool,
) -> EncodeResult<MachineWord> {
    let rd = gp("rd", rd)?;
    let rn = gp("rn", rn)?;
    let rm = gp("rm", rm)?;
    let ra = gp("ra", ra)?;
    let o0 = (subtract as u32) << 15;
    Ok(MachineWord(
        size.sf() | 0x1B00_0000 | rm << 16 | o0 | ra << 10 | rn << 5 | rd,
    ))
}

pub fn madd(size: OperandSize, rd: AsmReg, rn: AsmReg, rm: AsmReg, ra: AsmReg) -> EncodeResult<MachineWord> {
    multiply_add(size, rd, rn, rm, ra, false)
}

pub fn msub(size: OperandSize, rd: AsmReg, rn: AsmReg, rm: AsmReg, ra: AsmReg) -> EncodeResult<MachineWord> {
    multiply_add(size, rd, rn, rm, ra, true)
}

pub fn mul(size: OperandSize, rd: AsmReg, rn: AsmReg, rm: AsmReg) -> EncodeResult<MachineWord> {
    madd(size, rd, rn, rm, ZR)
}

pub fn mneg(size: OperandSize, rd: AsmReg, rn: AsmReg, rm: AsmReg) -> EncodeResult<MachineWord> {
    msub(size, rd, rn, rm, ZR)
}

/// SMADDL/SMSUBL/UMADDL/UMSUBL: 32x32 to 64-bit multiply with 64-bit accumulator.
pub fn multiply_long(
    signed: bool,
    rd: AsmReg,
    rn: AsmReg,
    rm: AsmReg,
    ra: AsmReg,
    subtract: bool,
) -> EncodeResult<MachineWord> {
    let rd = gp("rd", rd)?;
    let rn = gp("rn", rn)?;
    let rm = gp("rm", rm)?;
    let ra = gp("ra", ra)?;
    let base = if signed { 0x9B20_0000 } else { 0x9BA0_0000 };
    let o0 = (subtract as u32) << 15;
    Ok(MachineWord(base | rm << 16 | o0 | ra << 10 | rn << 5 | rd))
}

pub fn smaddl(rd: AsmReg, rn: AsmReg, rm: AsmReg, ra: AsmReg) -> EncodeResult<MachineWord> {
    multiply_long(true, rd, rn, rm, ra, false)
}

pub fn smsubl(rd: AsmReg, rn: AsmReg, rm: AsmReg, ra: AsmReg) -> EncodeResult<MachineWord> {
    multiply_long(true, rd, rn, rm, ra, true)
}

pub fn umaddl(rd: AsmReg, rn: AsmReg, rm: AsmReg, ra: AsmReg) -> EncodeResult<MachineWord> {
    multiply_long(false, rd, rn, rm, ra, false)
}

pub fn umsubl(rd: AsmReg, rn: AsmReg, rm: AsmReg, ra: AsmReg) -> EncodeResult<MachineWord> {
    multiply_long(false, rd, rn, rm, ra, true)
}

pub fn smull(rd: AsmReg, rn: AsmReg, rm: AsmReg) -> EncodeResult<MachineWord> {
    smaddl(rd, rn, rm, ZR)
}

pub fn umull(rd: AsmReg, rn: AsmReg, rm: AsmReg) -> EncodeResult<MachineWord> {
    umaddl(rd, rn, rm, ZR)
}

pub fn smnegl(rd: AsmReg, rn: AsmReg, rm: AsmReg) -> EncodeResult<MachineWord> {
    smsubl(rd, rn, rm, ZR)
}

pub fn umnegl(rd: AsmReg, rn: AsmReg, rm: AsmReg) -> EncodeResult<MachineWord> {
    umsubl(rd, rn, rm, ZR)
}

/// Two-source data processing opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataProc2Op {
    Udiv,
    Sdiv,
    Lslv,
    Lsrv,
    Asrv,
    Rorv,
}

impl DataProc2Op {
    pub const fn opcode(self) -> u32 {
        match self {
            DataProc2Op::Udiv => 0b000010,
            DataProc2Op::Sdiv => 0b000011,
            DataProc2Op::Lslv => 0b001000,
            DataProc2Op::Lsrv => 0b001001,
            DataProc2Op::Asrv => 0b001010,
            DataProc2Op::Rorv => 0b001011,
        }
    }

    pub fn from_opcode(opcode: u32) -> Option<Self> {
        [
            DataProc2Op::Udiv,
            DataProc2Op::Sdiv,
            DataProc2Op::Lslv,
            DataProc2Op::Lsrv,
            DataProc2Op::Asrv,
            DataProc2Op::Rorv,
        ]
        .into_iter()
        .find(|op| op.opcode() == opcode)
    }
}

pub fn data_proc_2src(
    op: DataProc2Op,
    size: OperandSize,
    rd: AsmReg,
    rn: AsmReg,
    rm: AsmReg,
) -> EncodeResult<MachineWord> {
    let rd = gp("rd", rd)?;
    let rn = gp("rn", rn)?;
    let rm = gp("rm", rm)?;
    Ok(MachineWord(
        size.sf() | 0x1AC0_0000 | rm << 16 | op.opcode() << 10 | rn << 5 | rd,
    ))
}

macro_rules! two_source_wrappers {
    ($($name:ident => $op:ident),* $(,)?) => {
        $(
            pub fn $name(
                size: OperandSize,
                rd: AsmReg,
                rn: AsmReg,
                rm: AsmReg,
            ) -> EncodeResult<MachineWord> {
                data_proc_2src(DataProc2Op::$op, size, rd, rn, rm)
            }
        )*
    };
}

two_source_wrappers! {
    udiv => Udiv,
    sdiv => Sdiv,
    lslv => Lslv,
    lsrv => Lsrv,
    asrv => Asrv,
    rorv => Rorv,
}

/// One-source bit operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitOp {
    Rbit,
    Rev16,
    /// Byte reverse within each word; X form only.
    Rev32,
    /// Byte reverse of the whole register.
    Rev,
    Clz,
    Cls,
}

impl BitOp {
    fn opcode(self, size: OperandSize) -> EncodeResult<u32> {
        Ok(match (self, size) {
            (BitOp::Rbit, _) => 0b000000,
            (BitOp::Rev16, _) => 0b000001,
            (BitOp::Rev32, OperandSize::X64) => 0b000010,
            (BitOp::Rev32, OperandSize::W32) => {
                return Err(EncodingError::InvalidOperand {
                    reason: "REV32 requires a 64-bit register",
                })
            }
            (BitOp::Rev, OperandSize::W32) => 0b000010,
            (BitOp::Rev, OperandSize::X64) => 0b000011,
            (BitOp::Clz, _) => 0b000100,
            (BitOp::Cls, _) => 0b000101,
        })
    }
}

pub fn data_proc_1src(
    op: BitOp,
    size: OperandSize,
    rd: AsmReg,
    rn: AsmReg,
) -> EncodeResult<MachineWord> {
    let opcode = op.opcode(size)?;
    let rd = gp("rd", rd)?;
    let rn = gp("rn", rn)?;
    Ok(MachineWord(size.sf() | 0x5AC0_0000 | opcode << 10 | rn << 5 | rd))
}

pub fn rbit(size: OperandSize, rd: AsmReg, rn: AsmReg) -> EncodeResult<MachineWord> {
    data_proc_1src(BitOp::Rbit, size, rd, rn)
}

pub fn rev16(size: OperandSize, rd: AsmReg, rn: AsmReg) -> EncodeResult<MachineWord> {
    data_proc_1src(BitOp::Rev16, size, rd, rn)
}

pub fn rev32(rd: AsmReg, rn: AsmReg) -> EncodeResult<MachineWord> {
    data_proc_1src(BitOp::Rev32, OperandSize::X64, rd, rn)
}

pub fn rev(size: OperandSize, rd: AsmReg, rn: AsmReg) -> EncodeResult<MachineWord> {
    data_proc_1src(BitOp::Rev, size, rd, rn)
}

pub fn clz(size: OperandSize, rd: AsmReg, rn: AsmReg) -> EncodeResult<MachineWord> {
    data_proc_1src(BitOp::Clz, size, rd, rn)
}

pub fn cls(size: OperandSize, rd: AsmReg, rn: AsmReg) -> EncodeResult<MachineWord> {
    data_proc_1src(BitOp::Cls, size, rd, rn)
}
