// This module decodes the guest (M68k) instructions the reference translator understands. Guest
// code is a stream of big-endian 16-bit words fetched through MemoryReader; an instruction is an
// opcode word followed by zero, one or two extension words. decode() reads one instruction at a
// PC and returns the Instruction together with its length in bytes, so the translator can walk a
// block without knowing any encoding details. Only long-sized register and immediate forms are
// recognised; everything else (memory operands, word/byte sizes, BSR, ASL, ROXL/ROXR, register
// shift counts) is reported as CompileError::UnsupportedOpcode carrying the opcode word.

//! Guest instruction decoder.

use crate::core::error::{CompileError, CompileResult};
use crate::jit::guest::MemoryReader;
use std::fmt;

/// Source operand of a long-sized data movement or arithmetic instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Data(u8),
    Address(u8),
    Immediate(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftOp {
    Asr,
    Lsl,
    Lsr,
    Rol,
    Ror,
}

/// Guest condition codes, in encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuestCondition {
    True,
    False,
    Hi,
    Ls,
    Cc,
    Cs,
    Ne,
    Eq,
    Vc,
    Vs,
    Pl,
    Mi,
    Ge,
    Lt,
    Gt,
    Le,
}

impl GuestCondition {
    const ALL: [GuestCondition; 16] = [
        GuestCondition::True,
        GuestCondition::False,
        GuestCondition::Hi,
        GuestCondition::Ls,
        GuestCondition::Cc,
        GuestCondition::Cs,
        GuestCondition::Ne,
        GuestCondition::Eq,
        GuestCondition::Vc,
        GuestCondition::Vs,
        GuestCondition::Pl,
        GuestCondition::Mi,
        GuestCondition::Ge,
        GuestCondition::Lt,
        GuestCondition::Gt,
        GuestCondition::Le,
    ];

    pub fn from_bits(bits: u16) -> Self {
        Self::ALL[(bits & 0xF) as usize]
    }
}

impl fmt::Display for GuestCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GuestCondition::True => "t",
            GuestCondition::False => "f",
            GuestCondition::Hi => "hi",
            GuestCondition::Ls => "ls",
            GuestCondition::Cc => "cc",
            GuestCondition::Cs => "cs",
            GuestCondition::Ne => "ne",
            GuestCondition::Eq => "eq",
            GuestCondition::Vc => "vc",
            GuestCondition::Vs => "vs",
            GuestCondition::Pl => "pl",
            GuestCondition::Mi => "mi",
            GuestCondition::Ge => "ge",
            GuestCondition::Lt => "lt",
            GuestCondition::Gt => "gt",
            GuestCondition::Le => "le",
        };
        write!(f, "{name}")
    }
}

/// A decoded guest instruction. Register fields are register numbers 0-7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Moveq { dst: u8, imm: i8 },
    MoveL { src: Operand, dst: u8 },
    MoveaL { src: Operand, dst: u8 },
    AddL { src: Operand, dst: u8 },
    SubL { src: Operand, dst: u8 },
    CmpL { src: Operand, dst: u8 },
    /// `dst` is a data or address register; 1-8.
    Addq { imm: u8, dst: Operand },
    Subq { imm: u8, dst: Operand },
    TstL { reg: u8 },
    /// Count 1-8.
    Shift { op: ShiftOp, count: u8, reg: u8 },
    Swap { reg: u8 },
    ExtW { reg: u8 },
    ExtL { reg: u8 },
    Muluw { src: u8, dst: u8 },
    Nop,
    Bra { target: u32 },
    Bcc { cond: GuestCondition, target: u32 },
    JmpAbs { target: u32 },
    JmpInd { reg: u8 },
}

impl Instruction {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Moveq { .. } => "moveq",
            Instruction::MoveL { .. } => "move.l",
            Instruction::MoveaL { .. } => "movea.l",
            Instruction::AddL { .. } => "add.l",
            Instruction::SubL { .. } => "sub.l",
            Instruction::CmpL { .. } => "cmp.l",
            Instruction::Addq { .. } => "addq.l",
            Instruction::Subq { .. } => "subq.l",
            Instruction::TstL { .. } => "tst.l",
            Instruction::Shift { op, .. } => match op {
                ShiftOp::Asr => "asr.l",
                ShiftOp::Lsl => "lsl.l",
                ShiftOp::Lsr => "lsr.l",
                ShiftOp::Rol => "rol.l",
                ShiftOp::Ror => "ror.l",
            },
            Instruction::Swap { .. } => "swap",
            Instruction::ExtW { .. } => "ext.w",
            Instruction::ExtL { .. } => "ext.l",
            Instruction::Muluw { .. } => "mulu.w",
            Instruction::Nop => "nop",
            Instruction::Bra { .. } => "bra",
            Instruction::Bcc { .. } => "bcc",
            Instruction::JmpAbs { .. } | Instruction::JmpInd { .. } => "jmp",
        }
    }

    /// Control transfers end a translation unit.
    pub fn ends_block(&self) -> bool {
        matches!(
            self,
            Instruction::Bra { .. }
                | Instruction::Bcc { .. }
                | Instruction::JmpAbs { .. }
                | Instruction::JmpInd { .. }
        )
    }
}

/// One decoded instruction and its size in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub insn: Instruction,
    pub length: u32,
}

/// Decode the instruction at `pc`.
pub fn decode(pc: u32, memory: &dyn MemoryReader) -> CompileResult<Decoded> {
    let op = memory.read_u16(pc)?;
    let unsupported = || CompileError::UnsupportedOpcode { pc, opcode: op };
    let reg_hi = ((op >> 9) & 7) as u8;
    let reg_lo = (op & 7) as u8;
    let mode_lo = (op >> 3) & 7;
    let ext = pc.wrapping_add(2);

    let decoded = match op >> 12 {
        0x2 => {
            let (src, len) =
                source_operand(mode_lo, reg_lo, ext, memory)?.ok_or_else(unsupported)?;
            let insn = match (op >> 6) & 7 {
                0 => Instruction::MoveL { src, dst: reg_hi },
                1 => Instruction::MoveaL { src, dst: reg_hi },
                _ => return Err(unsupported()),
            };
            Decoded {
                insn,
                length: 2 + len,
            }
        }
        0x4 => match op {
            0x4E71 => short(Instruction::Nop),
            0x4EF9 => Decoded {
                insn: Instruction::JmpAbs {
                    target: memory.read_u32(ext)?,
                },
                length: 6,
            },
            _ => match op & 0xFFF8 {
                0x4ED0 => short(Instruction::JmpInd { reg: reg_lo }),
                0x4840 => short(Instruction::Swap { reg: reg_lo }),
                0x4880 => short(Instruction::ExtW { reg: reg_lo }),
                0x48C0 => short(Instruction::ExtL { reg: reg_lo }),
                0x4A80 => short(Instruction::TstL { reg: reg_lo }),
                _ => return Err(unsupported()),
            },
        },
        0x5 => {
            if op & 0x00C0 != 0x0080 {
                return Err(unsupported());
            }
            let dst = match mode_lo {
                0 => Operand::Data(reg_lo),
                1 => Operand::Address(reg_lo),
                _ => return Err(unsupported()),
            };
            let imm = if reg_hi == 0 { 8 } else { reg_hi };
            if op & 0x0100 == 0 {
                short(Instruction::Addq { imm, dst })
            } else {
                short(Instruction::Subq { imm, dst })
            }
        }
        0x6 => {
            let cond = GuestCondition::from_bits(op >> 8);
            if cond == GuestCondition::False {
                // BSR
                return Err(unsupported());
            }
            let (disp, length) = match op as u8 {
                0x00 => (memory.read_u16(ext)? as i16 as i32, 4),
                0xFF => (memory.read_u32(ext)? as i32, 6),
                d => (d as i8 as i32, 2),
            };
            let target = ext.wrapping_add(disp as u32);
            let insn = if cond == GuestCondition::True {
                Instruction::Bra { target }
            } else {
                Instruction::Bcc { cond, target }
            };
            Decoded { insn, length }
        }
        0x7 => {
            if op & 0x0100 != 0 {
                return Err(unsupported());
            }
            short(Instruction::Moveq {
                dst: reg_hi,
                imm: op as u8 as i8,
            })
        }
        0x9 | 0xB | 0xD => {
            if (op >> 6) & 7 != 2 {
                return Err(unsupported());
            }
            let (src, len) =
                source_operand(mode_lo, reg_lo, ext, memory)?.ok_or_else(unsupported)?;
            let insn = match op >> 12 {
                0x9 => Instruction::SubL { src, dst: reg_hi },
                0xB => Instruction::CmpL { src, dst: reg_hi },
                _ => Instruction::AddL { src, dst: reg_hi },
            };
            Decoded {
                insn,
                length: 2 + len,
            }
        }
        0xC => {
            if op & 0x01C0 != 0x00C0 || mode_lo != 0 {
                return Err(unsupported());
            }
            short(Instruction::Muluw {
                src: reg_lo,
                dst: reg_hi,
            })
        }
        0xE => {
            // Long size, immediate count only.
            if op & 0x00C0 != 0x0080 || op & 0x0020 != 0 {
                return Err(unsupported());
            }
            let left = op & 0x0100 != 0;
            let shift = match ((op >> 3) & 3, left) {
                (0, false) => ShiftOp::Asr,
                (1, false) => ShiftOp::Lsr,
                (1, true) => ShiftOp::Lsl,
                (3, false) => ShiftOp::Ror,
                (3, true) => ShiftOp::Rol,
                _ => return Err(unsupported()),
            };
            short(Instruction::Shift {
                op: shift,
                count: if reg_hi == 0 { 8 } else { reg_hi },
                reg: reg_lo,
            })
        }
        _ => return Err(unsupported()),
    };
    Ok(decoded)
}

fn short(insn: Instruction) -> Decoded {
    Decoded { insn, length: 2 }
}

/// Register direct or `#imm` source; returns the operand and its extension bytes.
fn source_operand(
    mode: u16,
    reg: u8,
    ext: u32,
    memory: &dyn MemoryReader,
) -> CompileResult<Option<(Operand, u32)>> {
    Ok(match (mode, reg) {
        (0, n) => Some((Operand::Data(n), 0)),
        (1, n) => Some((Operand::Address(n), 0)),
        (7, 4) => Some((Operand::Immediate(memory.read_u32(ext)?), 4)),
        _ => None,
    })
}
