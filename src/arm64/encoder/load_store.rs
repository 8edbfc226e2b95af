//! Load/store family.
//!
//! Addressing forms: PC-relative literal, register offset, unsigned scaled
//! offset, unscaled signed offset, and pre/post-indexed writeback. The access
//! kind ([`MemOp`]) selects the `size` and `opc` fields shared by every form.

use super::{
    gp, ranged, signed, EncodeResult, EncodingError, ExtendKind, MachineWord, OperandSize,
};
use crate::core::register_file::AsmReg;

/// Access kind of a load or store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemOp {
    Strb,
    Ldrb,
    /// Signed byte load into a W or X register.
    Ldrsb(OperandSize),
    Strh,
    Ldrh,
    Ldrsh(OperandSize),
    Str(OperandSize),
    Ldr(OperandSize),
    Ldrsw,
}

impl MemOp {
    /// log2 of the access size in bytes.
    pub const fn size_log2(self) -> u32 {
        match self {
            MemOp::Strb | MemOp::Ldrb | MemOp::Ldrsb(_) => 0,
            MemOp::Strh | MemOp::Ldrh | MemOp::Ldrsh(_) => 1,
            MemOp::Ldrsw => 2,
            MemOp::Str(size) | MemOp::Ldr(size) => match size {
                OperandSize::W32 => 2,
                OperandSize::X64 => 3,
            },
        }
    }

    pub const fn access_bytes(self) -> u32 {
        1 << self.size_log2()
    }

    /// `opc`: 0 store, 1 zero-extending load, 2 sign-extend to X, 3 sign-extend to W.
    pub const fn opc(self) -> u32 {
        match self {
            MemOp::Strb | MemOp::Strh | MemOp::Str(_) => 0,
            MemOp::Ldrb | MemOp::Ldrh | MemOp::Ldr(_) => 1,
            MemOp::Ldrsw => 2,
            MemOp::Ldrsb(size) | MemOp::Ldrsh(size) => match size {
                OperandSize::X64 => 2,
                OperandSize::W32 => 3,
            },
        }
    }

    pub const fn is_load(self) -> bool {
        self.opc() != 0
    }

    const fn fields(self) -> u32 {
        self.size_log2() << 30 | self.opc() << 22
    }
}

/// Writeback addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexMode {
    /// Update the base before the access: `[rn, #off]!`.
    Pre,
    /// Access at the base, then update: `[rn], #off`.
    Post,
}

/// LDR (literal). Only word, doubleword and LDRSW loads have a literal form.
/// `offset` counts instructions from the load.
pub fn load_literal(op: MemOp, rt: AsmReg, offset: i32) -> EncodeResult<MachineWord> {
    let base = match op {
        MemOp::Ldr(OperandSize::W32) => 0x1800_0000,
        MemOp::Ldr(OperandSize::X64) => 0x5800_0000,
        MemOp::Ldrsw => 0x9800_0000,
        _ => {
            return Err(EncodingError::InvalidOperand {
                reason: "literal loads exist only for LDR W/X and LDRSW",
            })
        }
    };
    let rt = gp("rt", rt)?;
    let imm19 = signed("imm19", offset as i64, 19)?;
    Ok(MachineWord(base | imm19 << 5 | rt))
}

pub fn ldr_literal(size: OperandSize, rt: AsmReg, offset: i32) -> EncodeResult<MachineWord> {
    load_literal(MemOp::Ldr(size), rt, offset)
}

pub fn ldrsw_literal(rt: AsmReg, offset: i32) -> EncodeResult<MachineWord> {
    load_literal(MemOp::Ldrsw, rt, offset)
}

/// Register offset: `[rn, rm{, extend {#amount}}]`. With `scaled` the index is
/// shifted left by log2 of the access size.
pub fn load_store_register(
    op: MemOp,
    rt: AsmReg,
    rn: AsmReg,
    rm: AsmReg,
    extend: ExtendKind,
    scaled: bool,
) -> EncodeResult<MachineWord> {
    match extend {
        ExtendKind::Uxtw | ExtendKind::Uxtx | ExtendKind::Sxtw | ExtendKind::Sxtx => {}
        _ => {
            return Err(EncodingError::InvalidOperand {
                reason: "register offset extend must be UXTW, LSL, SXTW or SXTX",
            })
        }
    }
    let rt = gp("rt", rt)?;
    let rn = gp("rn", rn)?;
    let rm = gp("rm", rm)?;
    let s = scaled as u32;
    Ok(MachineWord(
        0x3820_0800 | op.fields() | rm << 16 | extend.bits() << 13 | s << 12 | rn << 5 | rt,
    ))
}

/// Unsigned scaled offset: `[rn, #offset]` with `offset` in bytes.
pub fn load_store_unsigned(
    op: MemOp,
    rt: AsmReg,
    rn: AsmReg,
    offset: u32,
) -> EncodeResult<MachineWord> {
    let rt = gp("rt", rt)?;
    let rn = gp("rn", rn)?;
    let align = op.access_bytes();
    if offset % align != 0 {
        return Err(EncodingError::MisalignedOffset {
            field: "offset",
            value: offset as i64,
            align,
        });
    }
    let imm12 = ranged("offset", offset as i64, 0, 4095 * align as i64)? >> op.size_log2();
    Ok(MachineWord(0x3900_0000 | op.fields() | imm12 << 10 | rn << 5 | rt))
}

/// Unscaled signed offset (LDUR/STUR family): `[rn, #offset]`, offset in -256..=255.
pub fn load_store_unscaled(
    op: MemOp,
    rt: AsmReg,
    rn: AsmReg,
    offset: i32,
) -> EncodeResult<MachineWord> {
    let rt = gp("rt", rt)?;
    let rn = gp("rn", rn)?;
    let imm9 = signed("imm9", offset as i64, 9)?;
    Ok(MachineWord(0x3800_0000 | op.fields() | imm9 << 12 | rn << 5 | rt))
}

/// Pre- or post-indexed access with writeback of the base.
pub fn load_store_indexed(
    op: MemOp,
    mode: IndexMode,
    rt: AsmReg,
    rn: AsmReg,
    offset: i32,
) -> EncodeResult<MachineWord> {
    let word = load_store_unscaled(op, rt, rn, offset)?;
    let mode_bits = match mode {
        IndexMode::Post => 0x400,
        IndexMode::Pre => 0xC00,
    };
    Ok(MachineWord(word.0 | mode_bits))
}

pub fn ldr(size: OperandSize, rt: AsmReg, rn: AsmReg, offset: u32) -> EncodeResult<MachineWord> {
    load_store_unsigned(MemOp::Ldr(size), rt, rn, offset)
}

pub fn str(size: OperandSize, rt: AsmReg, rn: AsmReg, offset: u32) -> EncodeResult<MachineWord> {
    load_store_unsigned(MemOp::Str(size), rt, rn, offset)
}

pub fn ldrb(rt: AsmReg, rn: AsmReg, offset: u32) -> EncodeResult<MachineWord> {
    load_store_unsigned(MemOp::Ldrb, rt, rn, offset)
}

pub fn strb(rt: AsmReg, rn: AsmReg, offset: u32) -> EncodeResult<MachineWord> {
    load_store_unsigned(MemOp::Strb, rt, rn, offset)
}

pub fn ldrh(rt: AsmReg, rn: AsmReg, offset: u32) -> EncodeResult<MachineWord> {
    load_store_unsigned(MemOp::Ldrh, rt, rn, offset)
}

pub fn strh(rt: AsmReg, rn: AsmReg, offset: u32) -> EncodeResult<MachineWord> {
    load_store_unsigned(MemOp::Strh, rt, rn, offset)
}

pub fn ldrsw(rt: AsmReg, rn: AsmReg, offset: u32) -> EncodeResult<MachineWord> {
    load_store_unsigned(MemOp::Ldrsw, rt, rn, offset)
}

pub fn ldur(size: OperandSize, rt: AsmReg, rn: AsmReg, offset: i32) -> EncodeResult<MachineWord> {
    load_store_unscaled(MemOp::Ldr(size), rt, rn, offset)
}

pub fn stur(size: OperandSize, rt: AsmReg, rn: AsmReg, offset: i32) -> EncodeResult<MachineWord> {
    load_store_unscaled(MemOp::Str(size), rt, rn, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm64::{x, SP};

    #[test]
    fn test_scaled_offset_alignment() {
        assert_eq!(
            ldr(OperandSize::X64, x(0), x(1), 12),
            Err(EncodingError::MisalignedOffset {
                field: "offset",
                value: 12,
                align: 8
            })
        );
        assert!(ldrh(x(0), x(1), 3).is_err());
        assert!(ldrb(x(0), x(1), 3).is_ok());
    }

    #[test]
    fn test_scaled_offset_limit() {
        assert!(str(OperandSize::X64, x(8), SP, 4095 * 8).is_ok());
        assert!(matches!(
            str(OperandSize::X64, x(8), SP, 4096 * 8),
            Err(EncodingError::ImmediateOutOfRange {
                field: "offset",
                max: 32760,
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_literal_and_extend() {
        assert!(load_literal(MemOp::Ldrb, x(0), 4).is_err());
        assert!(
            load_store_register(MemOp::Ldrb, x(0), x(1), x(2), ExtendKind::Uxtb, false).is_err()
        );
    }

    #[test]
    fn test_writeback_offset_range() {
        assert!(load_store_indexed(MemOp::Strh, IndexMode::Post, x(4), x(5), 255).is_ok());
        assert!(load_store_indexed(MemOp::Strh, IndexMode::Post, x(4), x(5), 256).is_err());
        assert!(load_store_indexed(MemOp::Strh, IndexMode::Pre, x(4), x(5), -256).is_ok());
    }

    #[test]
    fn test_memop_fields() {
        assert_eq!(MemOp::Ldrsb(OperandSize::W32).opc(), 3);
        assert_eq!(MemOp::Ldrsh(OperandSize::X64).opc(), 2);
        assert_eq!(MemOp::Ldrsw.access_bytes(), 4);
        assert!(!MemOp::Str(OperandSize::W32).is_load());
    }
}
