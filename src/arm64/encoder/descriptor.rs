//! Instruction descriptors: every encodable A64 instruction as data.
//!
//! `encode()` dispatches to the canonical emitter of the family, so a
//! descriptor and the direct call always agree.

use super::*;
use crate::core::register_file::AsmReg;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionDescriptor {
    Branch {
        link: bool,
        offset: i32,
    },
    BranchCond {
        cond: Condition,
        offset: i32,
    },
    CompareBranch {
        nonzero: bool,
        size: OperandSize,
        rt: AsmReg,
        offset: i32,
    },
    TestBranch {
        nonzero: bool,
        rt: AsmReg,
        bit: u8,
        offset: i32,
    },
    BranchReg {
        kind: BranchRegKind,
        rn: AsmReg,
    },
    LoadLiteral {
        op: MemOp,
        rt: AsmReg,
        offset: i32,
    },
    LoadStoreRegister {
        op: MemOp,
        rt: AsmReg,
        rn: AsmReg,
        rm: AsmReg,
        extend: ExtendKind,
        scaled: bool,
    },
    LoadStoreUnsigned {
        op: MemOp,
        rt: AsmReg,
        rn: AsmReg,
        offset: u32,
    },
    LoadStoreUnscaled {
        op: MemOp,
        rt: AsmReg,
        rn: AsmReg,
        offset: i32,
    },
    LoadStoreIndexed {
        op: MemOp,
        mode: IndexMode,
        rt: AsmReg,
        rn: AsmReg,
        offset: i32,
    },
    AddSubImm {
        op: AddSubOp,
        size: OperandSize,
        rd: AsmReg,
        rn: AsmReg,
        imm12: u32,
        shift12: bool,
    },
    AddSubShifted {
        op: AddSubOp,
        size: OperandSize,
        rd: AsmReg,
        rn: AsmReg,
        rm: AsmReg,
        shift: ShiftKind,
        amount: u8,
    },
    AddSubExtended {
        op: AddSubOp,
        size: OperandSize,
        rd: AsmReg,
        rn: AsmReg,
        rm: AsmReg,
        extend: ExtendKind,
        amount: u8,
    },
    AddSubCarry {
        op: AddSubOp,
        size: OperandSize,
        rd: AsmReg,
        rn: AsmReg,
        rm: AsmReg,
    },
    LogicalShifted {
        op: LogicalOp,
        size: OperandSize,
        rd: AsmReg,
        rn: AsmReg,
        rm: AsmReg,
        shift: ShiftKind,
        amount: u8,
    },
    LogicalImm {
        op: LogicalOp,
        size: OperandSize,
        rd: AsmReg,
        rn: AsmReg,
        n: u8,
        immr: u8,
        imms: u8,
    },
    MoveWide {
        op: MoveWideOp,
        size: OperandSize,
        rd: AsmReg,
        imm16: u32,
        hw: u8,
    },
    Bitfield {
        op: BitfieldOp,
        size: OperandSize,
        rd: AsmReg,
        rn: AsmReg,
        immr: u8,
        imms: u8,
    },
    Extract {
        size: OperandSize,
        rd: AsmReg,
        rn: AsmReg,
        rm: AsmReg,
        lsb: u8,
    },
    MultiplyAdd {
        size: OperandSize,
        rd: AsmReg,
        rn: AsmReg,
        rm: AsmReg,
        ra: AsmReg,
        subtract: bool,
    },
    MultiplyLong {
        signed: bool,
        rd: AsmReg,
        rn: AsmReg,
        rm: AsmReg,
        ra: AsmReg,
        subtract: bool,
    },
    DataProc2 {
        op: DataProc2Op,
        size: OperandSize,
        rd: AsmReg,
        rn: AsmReg,
        rm: AsmReg,
    },
    DataProc1 {
        op: BitOp,
        size: OperandSize,
        rd: AsmReg,
        rn: AsmReg,
    },
    Mrs {
        rt: AsmReg,
        reg: SystemRegister,
    },
    Msr {
        reg: SystemRegister,
        rt: AsmReg,
    },
    Exception {
        kind: ExceptionKind,
        imm16: u32,
    },
    Nop,
}

impl InstructionDescriptor {
    pub fn encode(&self) -> EncodeResult<MachineWord> {
        use InstructionDescriptor::*;
        match *self {
            Branch { link, offset } => branch_imm(link, offset),
            BranchCond { cond, offset } => b_cond(cond, offset),
            CompareBranch {
                nonzero,
                size,
                rt,
                offset,
            } => compare_branch(nonzero, size, rt, offset),
            TestBranch {
                nonzero,
                rt,
                bit,
                offset,
            } => test_branch(nonzero, rt, bit, offset),
            BranchReg { kind, rn } => branch_reg(kind, rn),
            LoadLiteral { op, rt, offset } => load_literal(op, rt, offset),
            LoadStoreRegister {
                op,
                rt,
                rn,
                rm,
                extend,
                scaled,
            } => load_store_register(op, rt, rn, rm, extend, scaled),
            LoadStoreUnsigned { op, rt, rn, offset } => load_store_unsigned(op, rt, rn, offset),
            LoadStoreUnscaled { op, rt, rn, offset } => load_store_unscaled(op, rt, rn, offset),
            LoadStoreIndexed {
                op,
                mode,
                rt,
                rn,
                offset,
            } => load_store_indexed(op, mode, rt, rn, offset),
            AddSubImm {
                op,
                size,
                rd,
                rn,
                imm12,
                shift12,
            } => add_sub_imm(op, size, rd, rn, imm12, shift12),
            AddSubShifted {
                op,
                size,
                rd,
                rn,
                rm,
                shift,
                amount,
            } => add_sub_shifted(op, size, rd, rn, rm, shift, amount),
            AddSubExtended {
                op,
                size,
                rd,
                rn,
                rm,
                extend,
                amount,
            } => add_sub_extended(op, size, rd, rn, rm, extend, amount),
            AddSubCarry {
                op,
                size,
                rd,
                rn,
                rm,
            } => add_sub_carry(op, size, rd, rn, rm),
            LogicalShifted {
                op,
                size,
                rd,
                rn,
                rm,
                shift,
                amount,
            } => logical_shifted(op, size, rd, rn, rm, shift, amount),
            LogicalImm {
                op,
                size,
                rd,
                rn,
                n,
                immr,
                imms,
            } => logical_imm(op, size, rd, rn, n, immr, imms),
            MoveWide {
                op,
                size,
                rd,
                imm16,
                hw,
            } => move_wide(op, size, rd, imm16, hw),
            Bitfield {
                op,
                size,
                rd,
                rn,
                immr,
                imms,
            } => bitfield_move(op, size, rd, rn, immr, imms),
            Extract {
                size,
                rd,
                rn,
                rm,
                lsb,
            } => extr(size, rd, rn, rm, lsb),
            MultiplyAdd {
                size,
                rd,
                rn,
                rm,
                ra,
                subtract,
            } => multiply_add(size, rd, rn, rm, ra, subtract),
            MultiplyLong {
                signed,
                rd,
                rn,
                rm,
                ra,
                subtract,
            } => multiply_long(signed, rd, rn, rm, ra, subtract),
            DataProc2 {
                op,
                size,
                rd,
                rn,
                rm,
            } => data_proc_2src(op, size, rd, rn, rm),
            DataProc1 { op, size, rd, rn } => data_proc_1src(op, size, rd, rn),
            Mrs { rt, reg } => mrs(rt, reg),
            Msr { reg, rt } => msr(reg, rt),
            Exception { kind, imm16 } => exception(kind, imm16),
            Nop => Ok(nop()),
        }
    }

    /// Encode a sequence, stopping at the first failure.
    pub fn encode_all(descriptors: &[InstructionDescriptor]) -> EncodeResult<Vec<MachineWord>> {
        descriptors.iter().map(|d| d.encode()).collect()
    }
}
