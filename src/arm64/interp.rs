// This module implements a small AArch64 interpreter for the instruction subset that the
// reference guest translator emits: move-wide, add/sub in immediate, shifted and extended
// forms, add/sub with carry, logical operations (shifted register and bitmask immediate),
// bitfield moves, EXTR, the multiply/accumulate and long multiply forms, divides, variable
// shifts, the one-source bit operations, immediate/conditional/compare/test branches inside
// the buffer, MRS/MSR of NZCV, NOP, BRK/HLT (reported as traps) and RET (which ends the unit).
// HostRegisters is the register file it runs against: X0-X30, SP, the low 64 bits of V0-V31
// and NZCV. InterpretedCode is the ExecutableCode handle produced by InterpretingAllocator: on
// every entry it marshals GuestState into the host registers through the RegisterBinding, runs
// the words, and marshals the bound registers back. A step budget bounds runaway loops. Loads
// and stores are not interpreted because compiled units never touch memory.

//! AArch64 interpreter for emitted code.

use crate::arm64::encoder::{
    decode_bit_masks, BitOp, Condition, DataProc2Op, ExtendKind, MachineWord, OperandSize,
    ShiftKind, SystemRegister,
};
use crate::arm64::register_binding::RegisterBinding;
use crate::core::error::{CompileError, CompileResult, ExecutionError};
use crate::core::register_file::AsmReg;
use crate::jit::guest::GuestState;
use crate::jit::unit::{CodeAllocator, ExecutableCode};
use log::trace;
use std::sync::Arc;

/// Default bound on executed instructions per entry.
pub const DEFAULT_STEP_LIMIT: usize = 1 << 20;

const N_FLAG: u32 = 1 << 31;
const Z_FLAG: u32 = 1 << 30;
const C_FLAG: u32 = 1 << 29;
const V_FLAG: u32 = 1 << 28;

/// Host register file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostRegisters {
    x: [u64; 31],
    pub sp: u64,
    v: [u64; 32],
    /// NZCV in bits 31..28.
    pub nzcv: u32,
}

impl HostRegisters {
    /// Read a general purpose register; id 31 reads as zero.
    pub fn x(&self, reg: AsmReg) -> u64 {
        self.xr(reg.id as u32)
    }

    /// Write a general purpose register; writes to id 31 are discarded.
    pub fn set_x(&mut self, reg: AsmReg, value: u64) {
        self.set_xr(reg.id as u32, value);
    }

    pub fn v(&self, reg: AsmReg) -> u64 {
        self.v[reg.id as usize & 31]
    }

    pub fn set_v(&mut self, reg: AsmReg, value: u64) {
        self.v[reg.id as usize & 31] = value;
    }

    fn xr(&self, id: u32) -> u64 {
        if id >= 31 {
            0
        } else {
            self.x[id as usize]
        }
    }

    fn set_xr(&mut self, id: u32, value: u64) {
        if id < 31 {
            self.x[id as usize] = value;
        }
    }

    fn xr_or_sp(&self, id: u32) -> u64 {
        if id == 31 {
            self.sp
        } else {
            self.xr(id)
        }
    }

    fn set_xr_or_sp(&mut self, id: u32, value: u64) {
        if id == 31 {
            self.sp = value;
        } else {
            self.set_xr(id, value);
        }
    }
}

fn size_of(word: u32) -> OperandSize {
    if word >> 31 != 0 {
        OperandSize::X64
    } else {
        OperandSize::W32
    }
}

fn mask(size: OperandSize) -> u64 {
    match size {
        OperandSize::W32 => 0xFFFF_FFFF,
        OperandSize::X64 => u64::MAX,
    }
}

fn ones(n: u32) -> u64 {
    if n >= 64 {
        u64::MAX
    } else {
        (1u64 << n) - 1
    }
}

fn sign_extend(value: u64, bits: u32) -> u64 {
    let shift = 64 - bits;
    (((value << shift) as i64) >> shift) as u64
}

fn sign_bit(size: OperandSize) -> u64 {
    1u64 << (size.bits() - 1)
}

fn nz_flags(size: OperandSize, result: u64) -> u32 {
    let mut flags = 0;
    if result & sign_bit(size) != 0 {
        flags |= N_FLAG;
    }
    if result & mask(size) == 0 {
        flags |= Z_FLAG;
    }
    flags
}

/// AddWithCarry from the architecture reference, returning the result and NZCV.
fn add_with_carry(size: OperandSize, a: u64, b: u64, carry_in: bool) -> (u64, u32) {
    let m = mask(size);
    let (a, b) = (a & m, b & m);
    let wide = a as u128 + b as u128 + carry_in as u128;
    let result = (wide as u64) & m;
    let mut flags = nz_flags(size, result);
    if wide > m as u128 {
        flags |= C_FLAG;
    }
    if (a ^ result) & (b ^ result) & sign_bit(size) != 0 {
        flags |= V_FLAG;
    }
    (result, flags)
}

fn shift_value(size: OperandSize, value: u64, kind: ShiftKind, amount: u32) -> u64 {
    let m = mask(size);
    let bits = size.bits();
    let value = value & m;
    let amount = amount % bits;
    if amount == 0 {
        return value;
    }
    match kind {
        ShiftKind::Lsl => (value << amount) & m,
        ShiftKind::Lsr => value >> amount,
        ShiftKind::Asr => ((sign_extend(value, bits) as i64) >> amount) as u64 & m,
        ShiftKind::Ror => ((value >> amount) | (value << (bits - amount))) & m,
    }
}

fn extend_value(size: OperandSize, value: u64, kind: ExtendKind, shift: u32) -> u64 {
    let extended = match kind {
        ExtendKind::Uxtb => value & 0xFF,
        ExtendKind::Uxth => value & 0xFFFF,
        ExtendKind::Uxtw => value & 0xFFFF_FFFF,
        ExtendKind::Uxtx => value,
        ExtendKind::Sxtb => sign_extend(value, 8),
        ExtendKind::Sxth => sign_extend(value, 16),
        ExtendKind::Sxtw => sign_extend(value, 32),
        ExtendKind::Sxtx => value,
    };
    (extended << shift) & mask(size)
}

fn shift_kind(bits: u32) -> ShiftKind {
    match bits & 3 {
        0 => ShiftKind::Lsl,
        1 => ShiftKind::Lsr,
        2 => ShiftKind::Asr,
        _ => ShiftKind::Ror,
    }
}

enum Step {
    Next,
    Jump(i64),
    Exit,
}

/// Interpreter over one code buffer.
pub struct Interpreter<'a> {
    words: &'a [MachineWord],
    step_limit: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(words: &'a [MachineWord]) -> Self {
        Self {
            words,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    pub fn with_step_limit(mut self, step_limit: usize) -> Self {
        self.step_limit = step_limit;
        self
    }

    /// Run from the first word until RET. Returns the number of executed instructions.
    pub fn run(&self, regs: &mut HostRegisters) -> Result<usize, ExecutionError> {
        let mut pc: i64 = 0;
        let mut steps = 0;
        loop {
            if steps >= self.step_limit {
                return Err(ExecutionError::StepLimit {
                    limit: self.step_limit,
                });
            }
            if pc < 0 || pc as usize >= self.words.len() {
                return Err(ExecutionError::RanOffEnd { offset: pc });
            }
            let offset = pc as usize;
            let word = self.words[offset];
            steps += 1;

            match self.step(word, offset, regs)? {
                Step::Next => pc += 1,
                Step::Jump(delta) => pc += delta,
                Step::Exit => {
                    trace!("interp: exit after {} steps", steps);
                    return Ok(steps);
                }
            }
        }
    }

    fn step(
        &self,
        word: MachineWord,
        offset: usize,
        regs: &mut HostRegisters,
    ) -> Result<Step, ExecutionError> {
        let w = word.0;
        let unsupported = || ExecutionError::UnsupportedInstruction { word, offset };
        let rd = w & 0x1F;
        let rn = (w >> 5) & 0x1F;
        let rm = (w >> 16) & 0x1F;
        let size = size_of(w);
        let m = mask(size);

        // Control flow and system.
        if w & 0xFC00_0000 == 0x1400_0000 {
            return Ok(Step::Jump(sign_extend((w & 0x03FF_FFFF) as u64, 26) as i64));
        }
        if w & 0xFF00_0010 == 0x5400_0000 {
            let cond = Condition::from_bits(w & 0xF).ok_or_else(unsupported)?;
            let delta = sign_extend(((w >> 5) & 0x7FFFF) as u64, 19) as i64;
            return Ok(if cond.holds(regs.nzcv) {
                Step::Jump(delta)
            } else {
                Step::Next
            });
        }
        if w & 0x7E00_0000 == 0x3400_0000 {
            let value = regs.xr(rd) & m;
            let nonzero = w & (1 << 24) != 0;
            let delta = sign_extend(((w >> 5) & 0x7FFFF) as u64, 19) as i64;
            return Ok(if (value != 0) == nonzero {
                Step::Jump(delta)
            } else {
                Step::Next
            });
        }
        if w & 0x7E00_0000 == 0x3600_0000 {
            let bit = ((w >> 31) << 5) | ((w >> 19) & 0x1F);
            let set = regs.xr(rd) >> bit & 1 != 0;
            let nonzero = w & (1 << 24) != 0;
            let delta = sign_extend(((w >> 5) & 0x3FFF) as u64, 14) as i64;
            return Ok(if set == nonzero {
                Step::Jump(delta)
            } else {
                Step::Next
            });
        }
        if w & 0xFFFF_FC1F == 0xD65F_0000 {
            return Ok(Step::Exit);
        }
        if w == 0xD503_201F {
            return Ok(Step::Next);
        }
        if w & 0xFFE0_001F == 0xD420_0000 || w & 0xFFE0_001F == 0xD440_0000 {
            return Err(ExecutionError::Trap {
                imm: ((w >> 5) & 0xFFFF) as u16,
                offset,
            });
        }
        if w & 0xFFD0_0000 == 0xD510_0000 {
            let read = w & (1 << 21) != 0;
            if SystemRegister::from_word(w) != SystemRegister::NZCV {
                return Err(unsupported());
            }
            if read {
                regs.set_xr(rd, regs.nzcv as u64);
            } else {
                regs.nzcv = regs.xr(rd) as u32 & 0xF000_0000;
            }
            return Ok(Step::Next);
        }

        // Data processing, immediate.
        match w & 0x1F80_0000 {
            0x1100_0000 => {
                let mut imm = ((w >> 10) & 0xFFF) as u64;
                if w & (1 << 22) != 0 {
                    imm <<= 12;
                }
                let sub = w & (1 << 30) != 0;
                let set_flags = w & (1 << 29) != 0;
                let a = regs.xr_or_sp(rn);
                let (result, flags) = if sub {
                    add_with_carry(size, a, !imm, true)
                } else {
                    add_with_carry(size, a, imm, false)
                };
                if set_flags {
                    regs.nzcv = flags;
                    regs.set_xr(rd, result);
                } else {
                    regs.set_xr_or_sp(rd, result);
                }
                return Ok(Step::Next);
            }
            0x1200_0000 => {
                let n = ((w >> 22) & 1) as u8;
                let immr = ((w >> 16) & 0x3F) as u8;
                let imms = ((w >> 10) & 0x3F) as u8;
                let imm = decode_bit_masks(size, n, immr, imms).ok_or_else(unsupported)?;
                let a = regs.xr(rn) & m;
                let opc = (w >> 29) & 3;
                let result = match opc {
                    0 | 3 => a & imm,
                    1 => a | imm,
                    _ => a ^ imm,
                };
                if opc == 3 {
                    regs.nzcv = nz_flags(size, result);
                    regs.set_xr(rd, result);
                } else {
                    regs.set_xr_or_sp(rd, result);
                }
                return Ok(Step::Next);
            }
            0x1280_0000 => {
                let hw = (w >> 21) & 3;
                if size == OperandSize::W32 && hw > 1 {
                    return Err(unsupported());
                }
                let shift = hw * 16;
                let imm = (((w >> 5) & 0xFFFF) as u64) << shift;
                let result = match (w >> 29) & 3 {
                    0 => !imm & m,
                    2 => imm,
                    3 => (regs.xr(rd) & !(0xFFFFu64 << shift) | imm) & m,
                    _ => return Err(unsupported()),
                };
                regs.set_xr(rd, result);
                return Ok(Step::Next);
            }
            0x1300_0000 => {
                let opc = (w >> 29) & 3;
                let r = (w >> 16) & 0x3F;
                let s = (w >> 10) & 0x3F;
                if opc == 3 || r >= size.bits() || s >= size.bits() {
                    return Err(unsupported());
                }
                let result = bitfield(size, opc, regs.xr(rd), regs.xr(rn), r, s);
                regs.set_xr(rd, result);
                return Ok(Step::Next);
            }
            0x1380_0000 => {
                let lsb = (w >> 10) & 0x3F;
                let hi = regs.xr(rn) & m;
                let lo = regs.xr(rm) & m;
                let result = if lsb == 0 {
                    lo
                } else {
                    ((lo >> lsb) | (hi << (size.bits() - lsb))) & m
                };
                regs.set_xr(rd, result);
                return Ok(Step::Next);
            }
            _ => {}
        }

        // Data processing, register.
        if w & 0x1F00_0000 == 0x0A00_0000 {
            let amount = (w >> 10) & 0x3F;
            let mut b = shift_value(size, regs.xr(rm), shift_kind(w >> 22), amount);
            if w & (1 << 21) != 0 {
                b = !b & m;
            }
            let a = regs.xr(rn) & m;
            let opc = (w >> 29) & 3;
            let result = match opc {
                0 | 3 => a & b,
                1 => a | b,
                _ => a ^ b,
            };
            if opc == 3 {
                regs.nzcv = nz_flags(size, result);
            }
            regs.set_xr(rd, result);
            return Ok(Step::Next);
        }
        if w & 0x1F20_0000 == 0x0B00_0000 || w & 0x1F20_0000 == 0x0B20_0000 {
            let extended = w & (1 << 21) != 0;
            let sub = w & (1 << 30) != 0;
            let set_flags = w & (1 << 29) != 0;
            let (a, b) = if extended {
                let kind = ExtendKind::from_bits((w >> 13) & 7);
                let amount = (w >> 10) & 7;
                (
                    regs.xr_or_sp(rn),
                    extend_value(size, regs.xr(rm), kind, amount),
                )
            } else {
                let amount = (w >> 10) & 0x3F;
                (
                    regs.xr(rn),
                    shift_value(size, regs.xr(rm), shift_kind(w >> 22), amount),
                )
            };
            let (result, flags) = if sub {
                add_with_carry(size, a, !b, true)
            } else {
                add_with_carry(size, a, b, false)
            };
            if set_flags {
                regs.nzcv = flags;
                regs.set_xr(rd, result);
            } else if extended {
                regs.set_xr_or_sp(rd, result);
            } else {
                regs.set_xr(rd, result);
            }
            return Ok(Step::Next);
        }
        if w & 0x1FE0_FC00 == 0x1A00_0000 {
            let sub = w & (1 << 30) != 0;
            let carry = regs.nzcv & C_FLAG != 0;
            let a = regs.xr(rn);
            let b = regs.xr(rm);
            let (result, flags) = if sub {
                add_with_carry(size, a, !b, carry)
            } else {
                add_with_carry(size, a, b, carry)
            };
            if w & (1 << 29) != 0 {
                regs.nzcv = flags;
            }
            regs.set_xr(rd, result);
            return Ok(Step::Next);
        }
        if w & 0x7FE0_0000 == 0x1AC0_0000 {
            let op = DataProc2Op::from_opcode((w >> 10) & 0x3F).ok_or_else(unsupported)?;
            let a = regs.xr(rn) & m;
            let b = regs.xr(rm) & m;
            let bits = size.bits();
            let result = match op {
                DataProc2Op::Udiv => a.checked_div(b).unwrap_or(0),
                DataProc2Op::Sdiv => {
                    let sa = sign_extend(a, bits) as i64;
                    let sb = sign_extend(b, bits) as i64;
                    if sb == 0 {
                        0
                    } else {
                        sa.wrapping_div(sb) as u64 & m
                    }
                }
                DataProc2Op::Lslv => shift_value(size, a, ShiftKind::Lsl, (b % bits as u64) as u32),
                DataProc2Op::Lsrv => shift_value(size, a, ShiftKind::Lsr, (b % bits as u64) as u32),
                DataProc2Op::Asrv => shift_value(size, a, ShiftKind::Asr, (b % bits as u64) as u32),
                DataProc2Op::Rorv => shift_value(size, a, ShiftKind::Ror, (b % bits as u64) as u32),
            };
            regs.set_xr(rd, result);
            return Ok(Step::Next);
        }
        if w & 0x7FFF_0000 == 0x5AC0_0000 {
            let op = match ((w >> 10) & 0x3F, size) {
                (0, _) => BitOp::Rbit,
                (1, _) => BitOp::Rev16,
                (2, OperandSize::X64) => BitOp::Rev32,
                (2, OperandSize::W32) | (3, OperandSize::X64) => BitOp::Rev,
                (4, _) => BitOp::Clz,
                (5, _) => BitOp::Cls,
                _ => return Err(unsupported()),
            };
            let value = regs.xr(rn) & m;
            regs.set_xr(rd, bit_op(size, op, value));
            return Ok(Step::Next);
        }
        if w & 0x7FE0_0000 == 0x1B00_0000 {
            let ra = (w >> 10) & 0x1F;
            let product = regs.xr(rn).wrapping_mul(regs.xr(rm));
            let acc = regs.xr(ra);
            let result = if w & (1 << 15) != 0 {
                acc.wrapping_sub(product)
            } else {
                acc.wrapping_add(product)
            };
            regs.set_xr(rd, result & m);
            return Ok(Step::Next);
        }
        if w & 0xFF60_0000 == 0x9B20_0000 {
            let ra = (w >> 10) & 0x1F;
            let unsigned = w & (1 << 23) != 0;
            let (a, b) = if unsigned {
                (regs.xr(rn) & 0xFFFF_FFFF, regs.xr(rm) & 0xFFFF_FFFF)
            } else {
                (sign_extend(regs.xr(rn), 32), sign_extend(regs.xr(rm), 32))
            };
            let product = a.wrapping_mul(b);
            let acc = regs.xr(ra);
            let result = if w & (1 << 15) != 0 {
                acc.wrapping_sub(product)
            } else {
                acc.wrapping_add(product)
            };
            regs.set_xr(rd, result);
            return Ok(Step::Next);
        }

        Err(unsupported())
    }
}

/// SBFM (opc 0), BFM (opc 1), UBFM (opc 2).
fn bitfield(size: OperandSize, opc: u32, dst: u64, src: u64, r: u32, s: u32) -> u64 {
    let bits = size.bits();
    let m = mask(size);
    let src = src & m;
    let (field, width, pos) = if s >= r {
        ((src >> r) & ones(s - r + 1), s - r + 1, 0)
    } else {
        (src & ones(s + 1), s + 1, bits - r)
    };
    let placed_mask = (ones(width) << pos) & m;
    match opc {
        0 => {
            let signed = sign_extend(field, width) << pos;
            if s >= r {
                signed & m
            } else {
                // bits below the field are zero, bits above copy the sign
                signed & m & !ones(pos)
            }
        }
        1 => (dst & m & !placed_mask) | ((field << pos) & m),
        _ => (field << pos) & m,
    }
}

fn bit_op(size: OperandSize, op: BitOp, value: u64) -> u64 {
    match (op, size) {
        (BitOp::Rbit, OperandSize::W32) => (value as u32).reverse_bits() as u64,
        (BitOp::Rbit, OperandSize::X64) => value.reverse_bits(),
        (BitOp::Rev16, _) => {
            ((value & 0x00FF_00FF_00FF_00FF) << 8 | (value >> 8) & 0x00FF_00FF_00FF_00FF)
                & mask(size)
        }
        (BitOp::Rev32, _) => {
            let lo = (value as u32).swap_bytes() as u64;
            let hi = ((value >> 32) as u32).swap_bytes() as u64;
            hi << 32 | lo
        }
        (BitOp::Rev, OperandSize::W32) => (value as u32).swap_bytes() as u64,
        (BitOp::Rev, OperandSize::X64) => value.swap_bytes(),
        (BitOp::Clz, OperandSize::W32) => (value as u32).leading_zeros() as u64,
        (BitOp::Clz, OperandSize::X64) => value.leading_zeros() as u64,
        (BitOp::Cls, OperandSize::W32) => {
            let v = value as u32;
            (((v ^ (v >> 1)) & 0x7FFF_FFFF).leading_zeros() - 1) as u64
        }
        (BitOp::Cls, OperandSize::X64) => {
            (((value ^ (value >> 1)) & 0x7FFF_FFFF_FFFF_FFFF).leading_zeros() - 1) as u64
        }
    }
}

/// Installed code that runs through the interpreter.
#[derive(Debug)]
pub struct InterpretedCode {
    words: Vec<MachineWord>,
    binding: RegisterBinding,
    step_limit: usize,
}

impl InterpretedCode {
    pub fn new(words: Vec<MachineWord>, binding: RegisterBinding) -> Self {
        Self {
            words,
            binding,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }
}

impl ExecutableCode for InterpretedCode {
    fn enter(&self, state: &mut GuestState) -> Result<(), ExecutionError> {
        let mut regs = HostRegisters::default();
        self.binding.load(state, &mut regs);
        Interpreter::new(&self.words)
            .with_step_limit(self.step_limit)
            .run(&mut regs)?;
        self.binding.store(&regs, state);
        Ok(())
    }

    fn code_size(&self) -> usize {
        self.words.len() * 4
    }

    fn words(&self) -> &[MachineWord] {
        &self.words
    }
}

/// CodeAllocator that hands out interpreted handles instead of executable memory.
#[derive(Debug, Clone)]
pub struct InterpretingAllocator {
    binding: RegisterBinding,
    step_limit: usize,
}

impl InterpretingAllocator {
    pub fn new(binding: RegisterBinding) -> Self {
        Self {
            binding,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    pub fn with_step_limit(mut self, step_limit: usize) -> Self {
        self.step_limit = step_limit;
        self
    }
}

impl Default for InterpretingAllocator {
    fn default() -> Self {
        Self::new(RegisterBinding::EMU68)
    }
}

impl CodeAllocator for InterpretingAllocator {
    fn install(&self, words: &[MachineWord]) -> CompileResult<Arc<dyn ExecutableCode>> {
        if words.is_empty() {
            return Err(CompileError::Install {
                reason: "empty code buffer".to_string(),
            });
        }
        let mut code = InterpretedCode::new(words.to_vec(), self.binding);
        code.step_limit = self.step_limit;
        Ok(Arc::new(code))
    }

    fn register_binding(&self) -> &RegisterBinding {
        &self.binding
    }
}
