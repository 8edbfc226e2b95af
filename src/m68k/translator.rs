// This module implements the reference guest compiler: BlockTranslator turns a run of guest
// instructions starting at a PC into A64 code through the encoder and hands the words to a
// CodeAllocator. Each compile gets its own bumpalo arena and TranslationSession; the session
// collects the emitted words and per-mnemonic counts, the decoded instructions are kept in the
// same arena for the trace listing, and the arena is dropped when the unit has been installed. Guest registers are used in place through the RegisterBinding, with the W view
// of each host register holding the 32-bit guest value. A block ends at a control transfer or
// after the configured number of instructions; every exit writes the next guest PC into the PC
// register and returns. The translator tracks which kind of instruction last set the host flags
// in the block (logical, add, subtract or shift/rotate), because the host carry means "no borrow"
// after a subtract while the guest carry means "borrow". A conditional branch is mapped to the
// host condition that tests the same guest predicate for that flag source; when no flag-setting
// instruction precedes it in the block, or the predicate depends on a carry the host does not
// have, compilation fails with ConditionCodesUnavailable. The status register is never written.

//! Reference guest translator.

use crate::arm64::encoder::*;
use crate::arm64::register_binding::RegisterBinding;
use crate::core::error::{CompileError, CompileResult};
use crate::core::register_file::AsmReg;
use crate::core::session::TranslationSession;
use crate::jit::config::{JitConfig, DEFAULT_MAX_BLOCK_INSTRUCTIONS};
use crate::jit::guest::MemoryReader;
use crate::jit::unit::{CodeAllocator, CompileStats, CompiledBlock, GuestCompiler};
use crate::m68k::decode::{decode, GuestCondition, Instruction, Operand, ShiftOp};
use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;
use log::{debug, log_enabled, trace, Level};

use crate::arm64::encoder::OperandSize::W32;

/// What produced the current host flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagSource {
    /// TST-style: C and V clear on both sides.
    Logic,
    /// ADDS: carry has the same sense as the guest's.
    Add,
    /// SUBS: host carry is the inverted guest borrow.
    Sub,
    /// Shift or rotate followed by TST: N and Z valid, carry not tracked.
    Shift,
}

/// Host condition testing `cond` on flags produced by `source`.
pub fn host_condition(cond: GuestCondition, source: FlagSource) -> Option<Condition> {
    use FlagSource::*;
    use GuestCondition as G;
    Some(match cond {
        G::True => Condition::Al,
        G::False => return None,
        G::Ne => Condition::Ne,
        G::Eq => Condition::Eq,
        G::Vc => Condition::Vc,
        G::Vs => Condition::Vs,
        G::Pl => Condition::Pl,
        G::Mi => Condition::Mi,
        G::Ge => Condition::Ge,
        G::Lt => Condition::Lt,
        G::Gt => Condition::Gt,
        G::Le => Condition::Le,
        G::Cc => match source {
            Sub => Condition::Hs,
            Add | Logic => Condition::Lo,
            Shift => return None,
        },
        G::Cs => match source {
            Sub => Condition::Lo,
            Add | Logic => Condition::Hs,
            Shift => return None,
        },
        G::Hi => match source {
            Sub => Condition::Hi,
            Logic => Condition::Ne,
            Add | Shift => return None,
        },
        G::Ls => match source {
            Sub => Condition::Ls,
            Logic => Condition::Eq,
            Add | Shift => return None,
        },
    })
}

/// Guest compiler emitting A64 code for the supported instruction subset.
///
/// Code is emitted for the allocator's register binding, so the registers the
/// translator writes are the ones the installed handle marshals.
#[derive(Debug, Clone)]
pub struct BlockTranslator<A> {
    allocator: A,
    max_block_instructions: usize,
}

impl<A: CodeAllocator> BlockTranslator<A> {
    pub fn new(allocator: A) -> Self {
        Self {
            allocator,
            max_block_instructions: DEFAULT_MAX_BLOCK_INSTRUCTIONS,
        }
    }

    pub fn from_config(allocator: A, config: &JitConfig) -> Self {
        Self::new(allocator).with_max_block_instructions(config.max_block_instructions)
    }

    pub fn with_max_block_instructions(mut self, n: usize) -> Self {
        self.max_block_instructions = n.max(1);
        self
    }

    pub fn max_block_instructions(&self) -> usize {
        self.max_block_instructions
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }
}

impl<A: CodeAllocator> GuestCompiler for BlockTranslator<A> {
    fn compile(&self, pc: u32, memory: &dyn MemoryReader) -> CompileResult<CompiledBlock> {
        if pc & 1 != 0 {
            return Err(CompileError::MisalignedPc { pc });
        }

        let arena = Bump::new();
        let session = TranslationSession::new(&arena, pc);
        let mut lowering = Lowering {
            session: &session,
            binding: self.allocator.register_binding(),
            flags: None,
        };

        // Decoded guest instructions, kept for the block listing.
        let mut listing = BumpVec::new_in(session.arena());
        let mut cursor = pc;
        loop {
            let decoded = decode(cursor, memory)?;
            let next = cursor.wrapping_add(decoded.length);
            session.record_instruction(decoded.insn.mnemonic());
            listing.push((cursor, decoded.insn));

            lowering.translate(cursor, &decoded.insn, next)?;
            cursor = next;
            if decoded.insn.ends_block() {
                break;
            }
            if listing.len() >= self.max_block_instructions {
                lowering
                    .exit_to(cursor)
                    .map_err(|source| CompileError::Encoding { pc: cursor, source })?;
                break;
            }
        }

        if log_enabled!(Level::Trace) {
            for (at, insn) in &listing {
                trace!("  {:#010x}: {:?}", at, insn);
            }
        }

        let words = session.finish();
        let session_stats = session.stats();
        debug!(
            "translated {:#010x}..{:#010x}: {} guest instructions, {} host words",
            pc, cursor, session_stats.guest_instructions, session_stats.native_words
        );
        trace!("{}", session_stats);

        let entry = self.allocator.install(&words)?;
        Ok(CompiledBlock {
            guest_extent: cursor.wrapping_sub(pc),
            entry,
            stats: CompileStats {
                guest_instructions: session_stats.guest_instructions,
                native_words: session_stats.native_words,
            },
        })
    }

    fn register_binding(&self) -> &RegisterBinding {
        self.allocator.register_binding()
    }
}

/// Per-block lowering state.
struct Lowering<'s, 'arena> {
    session: &'s TranslationSession<'arena>,
    binding: &'s RegisterBinding,
    flags: Option<FlagSource>,
}

impl Lowering<'_, '_> {
    fn translate(&mut self, pc: u32, insn: &Instruction, next: u32) -> CompileResult<()> {
        let encoding = |source| CompileError::Encoding { pc, source };
        if let Instruction::Bcc { cond, target } = *insn {
            let host = self
                .flags
                .and_then(|source| host_condition(cond, source))
                .ok_or(CompileError::ConditionCodesUnavailable { pc })?;
            return self.branch_cond(host, target, next).map_err(encoding);
        }
        self.lower(insn).map_err(encoding)?;
        match *insn {
            Instruction::Bra { target } | Instruction::JmpAbs { target } => {
                self.exit_to(target).map_err(encoding)
            }
            Instruction::JmpInd { reg } => {
                let a = self.binding.address_reg(reg);
                self.session.emit(mov(W32, self.binding.pc, a).map_err(encoding)?);
                self.session.emit(ret_lr());
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Straight-line instructions.
    fn lower(&mut self, insn: &Instruction) -> EncodeResult<()> {
        let b = self.binding;
        let session = self.session;
        let emit = |word| session.emit(word);
        match *insn {
            Instruction::Moveq { dst, imm } => {
                let d = b.data_reg(dst);
                session.emit_all(&mov_imm(W32, d, imm as i32 as u32 as u64)?);
                emit(tst(W32, d, d)?);
                self.flags = Some(FlagSource::Logic);
            }
            Instruction::MoveL { src, dst } => {
                let d = b.data_reg(dst);
                self.move_into(d, src)?;
                emit(tst(W32, d, d)?);
                self.flags = Some(FlagSource::Logic);
            }
            Instruction::MoveaL { src, dst } => {
                self.move_into(b.address_reg(dst), src)?;
            }
            Instruction::AddL { src, dst } => {
                let d = b.data_reg(dst);
                match src {
                    Operand::Immediate(imm) if imm <= 0xFFF => emit(adds_imm(W32, d, d, imm)?),
                    _ => {
                        let rm = self.operand_reg(src)?;
                        emit(adds(W32, d, d, rm)?);
                    }
                }
                self.flags = Some(FlagSource::Add);
            }
            Instruction::SubL { src, dst } => {
                let d = b.data_reg(dst);
                match src {
                    Operand::Immediate(imm) if imm <= 0xFFF => emit(subs_imm(W32, d, d, imm)?),
                    _ => {
                        let rm = self.operand_reg(src)?;
                        emit(subs(W32, d, d, rm)?);
                    }
                }
                self.flags = Some(FlagSource::Sub);
            }
            Instruction::CmpL { src, dst } => {
                let d = b.data_reg(dst);
                match src {
                    Operand::Immediate(imm) if imm <= 0xFFF => emit(cmp_imm(W32, d, imm)?),
                    _ => {
                        let rm = self.operand_reg(src)?;
                        emit(cmp(W32, d, rm)?);
                    }
                }
                self.flags = Some(FlagSource::Sub);
            }
            Instruction::Addq { imm, dst } => match dst {
                Operand::Data(n) => {
                    let d = b.data_reg(n);
                    emit(adds_imm(W32, d, d, imm as u32)?);
                    self.flags = Some(FlagSource::Add);
                }
                // Address register arithmetic leaves the flags alone.
                _ => {
                    let a = self.operand_reg(dst)?;
                    emit(add_imm(W32, a, a, imm as u32)?);
                }
            },
            Instruction::Subq { imm, dst } => match dst {
                Operand::Data(n) => {
                    let d = b.data_reg(n);
                    emit(subs_imm(W32, d, d, imm as u32)?);
                    self.flags = Some(FlagSource::Sub);
                }
                _ => {
                    let a = self.operand_reg(dst)?;
                    emit(sub_imm(W32, a, a, imm as u32)?);
                }
            },
            Instruction::TstL { reg } => {
                let d = b.data_reg(reg);
                emit(tst(W32, d, d)?);
                self.flags = Some(FlagSource::Logic);
            }
            Instruction::Shift { op, count, reg } => {
                let d = b.data_reg(reg);
                let word = match op {
                    ShiftOp::Asr => asr(W32, d, d, count)?,
                    ShiftOp::Lsl => lsl(W32, d, d, count)?,
                    ShiftOp::Lsr => lsr(W32, d, d, count)?,
                    ShiftOp::Ror => ror(W32, d, d, count)?,
                    ShiftOp::Rol => ror(W32, d, d, 32 - count)?,
                };
                emit(word);
                emit(tst(W32, d, d)?);
                self.flags = Some(FlagSource::Shift);
            }
            Instruction::Swap { reg } => {
                let d = b.data_reg(reg);
                emit(ror(W32, d, d, 16)?);
                emit(tst(W32, d, d)?);
                self.flags = Some(FlagSource::Logic);
            }
            Instruction::ExtW { reg } => {
                let d = b.data_reg(reg);
                let t = b.scratch[0];
                emit(sxtb(W32, t, d)?);
                emit(bfi(W32, d, t, 0, 16)?);
                emit(tst(W32, t, t)?);
                self.flags = Some(FlagSource::Logic);
            }
            Instruction::ExtL { reg } => {
                let d = b.data_reg(reg);
                emit(sxth(W32, d, d)?);
                emit(tst(W32, d, d)?);
                self.flags = Some(FlagSource::Logic);
            }
            Instruction::Muluw { src, dst } => {
                let d = b.data_reg(dst);
                let (t0, t1) = (b.scratch[0], b.scratch[1]);
                emit(uxth(t0, b.data_reg(src))?);
                emit(uxth(t1, d)?);
                emit(mul(W32, d, t0, t1)?);
                emit(tst(W32, d, d)?);
                self.flags = Some(FlagSource::Logic);
            }
            Instruction::Nop
            | Instruction::Bra { .. }
            | Instruction::Bcc { .. }
            | Instruction::JmpAbs { .. }
            | Instruction::JmpInd { .. } => {}
        }
        Ok(())
    }

    fn move_into(&self, rd: AsmReg, src: Operand) -> EncodeResult<()> {
        match src {
            Operand::Immediate(imm) => self.session.emit_all(&mov_imm(W32, rd, imm as u64)?),
            _ => {
                let rm = self.operand_reg(src)?;
                self.session.emit(mov(W32, rd, rm)?);
            }
        }
        Ok(())
    }

    /// Host register holding `operand`; immediates go through scratch 0.
    fn operand_reg(&self, operand: Operand) -> EncodeResult<AsmReg> {
        Ok(match operand {
            Operand::Data(n) => self.binding.data_reg(n),
            Operand::Address(n) => self.binding.address_reg(n),
            Operand::Immediate(imm) => {
                let t = self.binding.scratch[0];
                self.session.emit_all(&mov_imm(W32, t, imm as u64)?);
                t
            }
        })
    }

    /// Leave the unit with the guest PC set to `target`.
    fn exit_to(&self, target: u32) -> EncodeResult<()> {
        self.session
            .emit_all(&mov_imm(W32, self.binding.pc, target as u64)?);
        self.session.emit(ret_lr());
        Ok(())
    }

    /// `b.cond taken; <pc = next>; ret; taken: <pc = target>; ret`
    fn branch_cond(&self, cond: Condition, target: u32, next: u32) -> EncodeResult<()> {
        let fall_through = mov_imm(W32, self.binding.pc, next as u64)?;
        let taken = mov_imm(W32, self.binding.pc, target as u64)?;
        self.session
            .emit(b_cond(cond, fall_through.len() as i32 + 2)?);
        self.session.emit_all(&fall_through);
        self.session.emit(ret_lr());
        self.session.emit_all(&taken);
        self.session.emit(ret_lr());
        Ok(())
    }
}
