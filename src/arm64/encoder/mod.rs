// This module provides the AArch64 (A64) instruction encoder: a library of pure functions that
// map typed operands to exact 32-bit machine words. The encoder is split by instruction family
// (branch, load_store, data_processing, bitfield, multiply, system). Each family has a canonical
// emitter that takes every architectural field, plus named wrappers such as cmp, mov, lsl or
// smull that only transform parameters before calling the canonical emitter. descriptor wraps
// all families in one InstructionDescriptor enum so callers can build instruction lists as data
// and encode them later. Every field is range checked: an immediate that does not fit, a
// misaligned scaled offset, a register from the wrong bank or an operand combination the
// architecture does not define returns an EncodingError and no word is produced. Shared operand
// types (OperandSize, Condition, ShiftKind, ExtendKind) and the field helpers live here.

//! AArch64 instruction encoding.
//!
//! All emitters are referentially transparent: the same arguments always give
//! the same [`MachineWord`] or the same [`EncodingError`].

mod bitfield;
mod branch;
mod data_processing;
mod descriptor;
mod load_store;
mod multiply;
mod system;

pub use bitfield::*;
pub use branch::*;
pub use data_processing::*;
pub use descriptor::InstructionDescriptor;
pub use load_store::*;
pub use multiply::*;
pub use system::*;

use crate::core::register_file::AsmReg;
use std::fmt;
use thiserror::Error;

/// One encoded A64 instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MachineWord(pub u32);

impl MachineWord {
    /// Serialize least-significant byte first, independent of host byte order.
    pub const fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    pub const fn from_le_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for MachineWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl From<MachineWord> for u32 {
    fn from(word: MachineWord) -> u32 {
        word.0
    }
}

/// Flatten a code sequence into its byte image.
pub fn words_to_bytes(words: &[MachineWord]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

/// Error types for instruction encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Immediate {field} = {value} outside [{min}, {max}]")]
    ImmediateOutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Offset {field} = {value} is not a multiple of {align}")]
    MisalignedOffset {
        field: &'static str,
        value: i64,
        align: u32,
    },

    #[error("Register {reg} is not valid as {operand}")]
    InvalidRegister { operand: &'static str, reg: AsmReg },

    #[error("Invalid operand combination: {reason}")]
    InvalidOperand { reason: &'static str },
}

pub type EncodeResult<T> = Result<T, EncodingError>;

/// Operand width, the `sf` bit of most data-processing encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandSize {
    W32,
    X64,
}

impl OperandSize {
    pub const fn bits(self) -> u32 {
        match self {
            OperandSize::W32 => 32,
            OperandSize::X64 => 64,
        }
    }

    /// `sf` placed at bit 31.
    pub(crate) const fn sf(self) -> u32 {
        match self {
            OperandSize::W32 => 0,
            OperandSize::X64 => 1 << 31,
        }
    }
}

/// A64 condition codes, in encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Condition {
    Eq = 0x0,
    Ne = 0x1,
    Hs = 0x2,
    Lo = 0x3,
    Mi = 0x4,
    Pl = 0x5,
    Vs = 0x6,
    Vc = 0x7,
    Hi = 0x8,
    Ls = 0x9,
    Ge = 0xA,
    Lt = 0xB,
    Gt = 0xC,
    Le = 0xD,
    Al = 0xE,
    Nv = 0xF,
}

impl Condition {
    const ALL: [Condition; 16] = [
        Condition::Eq,
        Condition::Ne,
        Condition::Hs,
        Condition::Lo,
        Condition::Mi,
        Condition::Pl,
        Condition::Vs,
        Condition::Vc,
        Condition::Hi,
        Condition::Ls,
        Condition::Ge,
        Condition::Lt,
        Condition::Gt,
        Condition::Le,
        Condition::Al,
        Condition::Nv,
    ];

    pub const fn bits(self) -> u32 {
        self as u32
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        Self::ALL.get(bits as usize).copied()
    }

    /// The opposite condition. AL and NV both mean "always" and map to each other.
    pub fn invert(self) -> Self {
        Self::ALL[(self as usize) ^ 1]
    }

    /// Evaluate against an NZCV value laid out as in the NZCV system register (bits 31..28).
    pub fn holds(self, nzcv: u32) -> bool {
        let n = nzcv & (1 << 31) != 0;
        let z = nzcv & (1 << 30) != 0;
        let c = nzcv & (1 << 29) != 0;
        let v = nzcv & (1 << 28) != 0;
        match self {
            Condition::Eq => z,
            Condition::Ne => !z,
            Condition::Hs => c,
            Condition::Lo => !c,
            Condition::Mi => n,
            Condition::Pl => !n,
            Condition::Vs => v,
            Condition::Vc => !v,
            Condition::Hi => c && !z,
            Condition::Ls => !(c && !z),
            Condition::Ge => n == v,
            Condition::Lt => n != v,
            Condition::Gt => !z && n == v,
            Condition::Le => !(!z && n == v),
            Condition::Al | Condition::Nv => true,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Condition::Eq => "eq",
            Condition::Ne => "ne",
            Condition::Hs => "hs",
            Condition::Lo => "lo",
            Condition::Mi => "mi",
            Condition::Pl => "pl",
            Condition::Vs => "vs",
            Condition::Vc => "vc",
            Condition::Hi => "hi",
            Condition::Ls => "ls",
            Condition::Ge => "ge",
            Condition::Lt => "lt",
            Condition::Gt => "gt",
            Condition::Le => "le",
            Condition::Al => "al",
            Condition::Nv => "nv",
        };
        f.write_str(name)
    }
}

/// Shift applied to the second register operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShiftKind {
    Lsl = 0,
    Lsr = 1,
    Asr = 2,
    Ror = 3,
}

/// Extension applied to an index or second register operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtendKind {
    Uxtb = 0,
    Uxth = 1,
    Uxtw = 2,
    Uxtx = 3,
    Sxtb = 4,
    Sxth = 5,
    Sxtw = 6,
    Sxtx = 7,
}

impl ExtendKind {
    /// `option` field value.
    pub const fn bits(self) -> u32 {
        self as u32
    }

    pub fn from_bits(bits: u32) -> Self {
        match bits & 7 {
            0 => ExtendKind::Uxtb,
            1 => ExtendKind::Uxth,
            2 => ExtendKind::Uxtw,
            3 => ExtendKind::Uxtx,
            4 => ExtendKind::Sxtb,
            5 => ExtendKind::Sxth,
            6 => ExtendKind::Sxtw,
            _ => ExtendKind::Sxtx,
        }
    }
}

/// Encoding of a general purpose register operand.
pub(crate) fn gp(operand: &'static str, reg: AsmReg) -> EncodeResult<u32> {
    if reg.is_valid() && reg.is_gp() {
        Ok(reg.id as u32)
    } else {
        Err(EncodingError::InvalidRegister { operand, reg })
    }
}

/// Check `min <= value <= max` and return the value as a field.
pub(crate) fn ranged(field: &'static str, value: i64, min: i64, max: i64) -> EncodeResult<u32> {
    if value < min || value > max {
        return Err(EncodingError::ImmediateOutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(value as u32)
}

/// Unsigned immediate of `bits` width.
pub(crate) fn unsigned(field: &'static str, value: i64, bits: u32) -> EncodeResult<u32> {
    ranged(field, value, 0, (1i64 << bits) - 1)
}

/// Two's complement immediate of `bits` width, returned masked to the field.
pub(crate) fn signed(field: &'static str, value: i64, bits: u32) -> EncodeResult<u32> {
    let half = 1i64 << (bits - 1);
    let raw = ranged(field, value, -half, half - 1)?;
    Ok(raw & ((1u32 << bits) - 1))
}
