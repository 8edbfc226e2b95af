//! Encoder words checked against llvm-mc output (`llvm-mc -triple=aarch64 -show-encoding`).

use emujit::arm64::encoder::*;
use emujit::arm64::{v, x, SP, ZR};
use OperandSize::{W32, X64};

fn check(asm: &str, word: EncodeResult<MachineWord>, expected: u32) {
    assert_eq!(word, Ok(MachineWord(expected)), "{asm}");
}

#[test]
fn branches() {
    check("b #-4", b(-1), 0x17FF_FFFF);
    check("bl #0x100", bl(64), 0x9400_0040);
    check("b.ne #16", b_cond(Condition::Ne, 4), 0x5400_0081);
    check("b.le #-8", b_cond(Condition::Le, -2), 0x54FF_FFCD);
    check("cbz w3, #8", cbz(W32, x(3), 2), 0x3400_0043);
    check("cbnz x5, #-12", cbnz(X64, x(5), -3), 0xB5FF_FFA5);
    check("tbz w0, #3, #8", tbz(x(0), 3, 2), 0x3618_0040);
    check("tbnz x1, #40, #-4", tbnz(x(1), 40, -1), 0xB747_FFE1);
    check("br x16", br(x(16)), 0xD61F_0200);
    check("blr x9", blr(x(9)), 0xD63F_0120);
    check("ret x3", ret(x(3)), 0xD65F_0060);
    assert_eq!(ret_lr(), MachineWord(0xD65F_03C0));
}

#[test]
fn literal_loads() {
    check("ldr w2, #16", ldr_literal(W32, x(2), 4), 0x1800_0082);
    check("ldr x7, #-8", ldr_literal(X64, x(7), -2), 0x58FF_FFC7);
    check("ldrsw x1, #4", ldrsw_literal(x(1), 1), 0x9800_0021);
}

#[test]
fn register_offset_loads_and_stores() {
    check(
        "ldr x0, [x1, x2, lsl #3]",
        load_store_register(MemOp::Ldr(X64), x(0), x(1), x(2), ExtendKind::Uxtx, true),
        0xF862_7820,
    );
    check(
        "ldr w0, [x1, w2, uxtw]",
        load_store_register(MemOp::Ldr(W32), x(0), x(1), x(2), ExtendKind::Uxtw, false),
        0xB862_4820,
    );
    check(
        "strb w3, [x4, x5]",
        load_store_register(MemOp::Strb, x(3), x(4), x(5), ExtendKind::Uxtx, false),
        0x3825_6883,
    );
    check(
        "ldrsh x6, [x7, w8, sxtw #1]",
        load_store_register(MemOp::Ldrsh(X64), x(6), x(7), x(8), ExtendKind::Sxtw, true),
        0x78A8_D8E6,
    );
}

#[test]
fn unsigned_offset_loads_and_stores() {
    check("str w0, [x1]", str(W32, x(0), x(1), 0), 0xB900_0020);
    check("ldr x0, [x1, #8]", ldr(X64, x(0), x(1), 8), 0xF940_0420);
    check("ldrb w0, [x1, #4095]", ldrb(x(0), x(1), 4095), 0x397F_FC20);
    check("ldrh w2, [x3, #8190]", ldrh(x(2), x(3), 8190), 0x797F_FC62);
    check(
        "ldrsb w4, [x5, #1]",
        load_store_unsigned(MemOp::Ldrsb(W32), x(4), x(5), 1),
        0x39C0_04A4,
    );
    check("ldrsw x6, [x7, #16380]", ldrsw(x(6), x(7), 16380), 0xB9BF_FCE6);
    check("str x8, [sp, #32760]", str(X64, x(8), SP, 32760), 0xF93F_FFE8);
}

#[test]
fn unscaled_and_indexed() {
    check("ldur w0, [x1, #-4]", ldur(W32, x(0), x(1), -4), 0xB85F_C020);
    check("stur x2, [x3, #255]", stur(X64, x(2), x(3), 255), 0xF80F_F062);
    check(
        "ldursb x4, [x5, #-256]",
        load_store_unscaled(MemOp::Ldrsb(X64), x(4), x(5), -256),
        0x3890_00A4,
    );
    check(
        "ldr x0, [x1], #8",
        load_store_indexed(MemOp::Ldr(X64), IndexMode::Post, x(0), x(1), 8),
        0xF840_8420,
    );
    check(
        "ldr x0, [x1, #8]!",
        load_store_indexed(MemOp::Ldr(X64), IndexMode::Pre, x(0), x(1), 8),
        0xF840_8C20,
    );
    check(
        "str w2, [x3, #-16]!",
        load_store_indexed(MemOp::Str(W32), IndexMode::Pre, x(2), x(3), -16),
        0xB81F_0C62,
    );
    check(
        "strh w4, [x5], #2",
        load_store_indexed(MemOp::Strh, IndexMode::Post, x(4), x(5), 2),
        0x7800_24A4,
    );
}

#[test]
fn add_sub_immediate() {
    check("add x0, x1, #1", add_imm(X64, x(0), x(1), 1), 0x9100_0420);
    check(
        "add w0, w1, #4095, lsl #12",
        add_sub_imm(AddSubOp::Add, W32, x(0), x(1), 4095, true),
        0x117F_FC20,
    );
    check("adds w2, w3, #7", adds_imm(W32, x(2), x(3), 7), 0x3100_1C62);
    check("sub sp, sp, #16", sub_imm(X64, SP, SP, 16), 0xD100_43FF);
    check("subs x4, x5, #0", subs_imm(X64, x(4), x(5), 0), 0xF100_00A4);
    check("cmp w0, #1", cmp_imm(W32, x(0), 1), 0x7100_041F);
    check("cmn x2, #3", cmn_imm(X64, x(2), 3), 0xB100_0C5F);
}

#[test]
fn add_sub_register() {
    check("add w0, w1, w2", add(W32, x(0), x(1), x(2)), 0x0B02_0020);
    check(
        "add x0, x1, x2, lsl #3",
        add_sub_shifted(AddSubOp::Add, X64, x(0), x(1), x(2), ShiftKind::Lsl, 3),
        0x8B02_0C20,
    );
    check(
        "sub w3, w4, w5, asr #31",
        add_sub_shifted(AddSubOp::Sub, W32, x(3), x(4), x(5), ShiftKind::Asr, 31),
        0x4B85_7C83,
    );
    check(
        "subs x6, x7, x8, lsr #63",
        add_sub_shifted(AddSubOp::Subs, X64, x(6), x(7), x(8), ShiftKind::Lsr, 63),
        0xEB48_FCE6,
    );
    check("cmp w0, w1", cmp(W32, x(0), x(1)), 0x6B01_001F);
    check("neg x2, x3", neg(X64, x(2), x(3), ShiftKind::Lsl, 0), 0xCB03_03E2);
    check(
        "negs w4, w5, lsl #2",
        negs(W32, x(4), x(5), ShiftKind::Lsl, 2),
        0x6B05_0BE4,
    );
}

#[test]
fn add_sub_extended_register() {
    check(
        "add x0, x1, w2, uxtw #2",
        add_sub_extended(AddSubOp::Add, X64, x(0), x(1), x(2), ExtendKind::Uxtw, 2),
        0x8B22_4820,
    );
    check(
        "sub x0, sp, x1, sxtx",
        add_sub_extended(AddSubOp::Sub, X64, x(0), SP, x(1), ExtendKind::Sxtx, 0),
        0xCB21_E3E0,
    );
    check(
        "adds w3, w4, w5, uxtb",
        add_sub_extended(AddSubOp::Adds, W32, x(3), x(4), x(5), ExtendKind::Uxtb, 0),
        0x2B25_0083,
    );
    check(
        "cmp x6, w7, sxtw #4",
        add_sub_extended(AddSubOp::Subs, X64, ZR, x(6), x(7), ExtendKind::Sxtw, 4),
        0xEB27_D0DF,
    );
}

#[test]
fn logical_register() {
    check("and w0, w1, w2", and(W32, x(0), x(1), x(2)), 0x0A02_0020);
    check(
        "orr x3, x4, x5, ror #8",
        logical_shifted(LogicalOp::Orr, X64, x(3), x(4), x(5), ShiftKind::Ror, 8),
        0xAAC5_2083,
    );
    check(
        "eor w6, w7, w8, lsl #1",
        logical_shifted(LogicalOp::Eor, W32, x(6), x(7), x(8), ShiftKind::Lsl, 1),
        0x4A08_04E6,
    );
    check("ands x9, x10, x11", ands(X64, x(9), x(10), x(11)), 0xEA0B_0149);
    check("bic w0, w1, w2", bic(W32, x(0), x(1), x(2)), 0x0A22_0020);
    check("orn x3, x4, x5", orn(X64, x(3), x(4), x(5)), 0xAA25_0083);
    check("eon w6, w7, w8", eon(W32, x(6), x(7), x(8)), 0x4A28_00E6);
    check(
        "bics x9, x10, x11, lsr #4",
        logical_shifted(LogicalOp::Bics, X64, x(9), x(10), x(11), ShiftKind::Lsr, 4),
        0xEA6B_1149,
    );
    check("mov x0, x1", mov(X64, x(0), x(1)), 0xAA01_03E0);
    check("mov w2, w3", mov(W32, x(2), x(3)), 0x2A03_03E2);
    check("mvn w4, w5", mvn(W32, x(4), x(5)), 0x2A25_03E4);
    check("tst x6, x7", tst(X64, x(6), x(7)), 0xEA07_00DF);
}

#[test]
fn logical_immediate() {
    check("and w0, w1, #0xff", and_imm(W32, x(0), x(1), 8, 0), 0x1200_1C20);
    check(
        "orr x2, x3, #0xffff0000",
        orr_imm(X64, x(2), x(3), 16, 48),
        0xB270_3C62,
    );
    check(
        "eor w4, w5, #0x80000001",
        eor_imm(W32, x(4), x(5), 2, 1),
        0x5201_04A4,
    );
    check("ands x6, x7, #0xf", ands_imm(X64, x(6), x(7), 4, 0), 0xF240_0CE6);
    check("tst w8, #0x3", tst_imm(W32, x(8), 2, 0), 0x7200_051F);
}

#[test]
fn move_wide() {
    check("movz w0, #1", movz(W32, x(0), 1, 0), 0x5280_0020);
    check(
        "movz x0, #0x1234, lsl #16",
        movz(X64, x(0), 0x1234, 1),
        0xD2A2_4680,
    );
    check(
        "movk x0, #0xbeef, lsl #48",
        movk(X64, x(0), 0xBEEF, 3),
        0xF2F7_DDE0,
    );
    check("movn w1, #0", movn(W32, x(1), 0, 0), 0x1280_0001);
    check(
        "movk w2, #0xffff, lsl #16",
        movk(W32, x(2), 0xFFFF, 1),
        0x72BF_FFE2,
    );
}

#[test]
fn add_sub_with_carry() {
    check("adc w0, w1, w2", adc(W32, x(0), x(1), x(2)), 0x1A02_0020);
    check("adcs x3, x4, x5", adcs(X64, x(3), x(4), x(5)), 0xBA05_0083);
    check("sbc w6, w7, w8", sbc(W32, x(6), x(7), x(8)), 0x5A08_00E6);
    check("sbcs x9, x10, x11", sbcs(X64, x(9), x(10), x(11)), 0xFA0B_0149);
    check("ngc w0, w1", ngc(W32, x(0), x(1)), 0x5A01_03E0);
    check("ngcs x2, x3", ngcs(X64, x(2), x(3)), 0xFA03_03E2);
}

#[test]
fn bitfield_family() {
    check("sbfm w0, w1, #3, #31", sbfm(W32, x(0), x(1), 3, 31), 0x1303_7C20);
    check("bfm w0, w1, #24, #3", bfm(W32, x(0), x(1), 24, 3), 0x3318_0C20);
    check("ubfm x0, x1, #4, #63", ubfm(X64, x(0), x(1), 4, 63), 0xD344_FC20);

    check("lsl w0, w1, #4", lsl(W32, x(0), x(1), 4), 0x531C_6C20);
    check("lsl x2, x3, #63", lsl(X64, x(2), x(3), 63), 0xD341_0062);
    check("lsr w4, w5, #31", lsr(W32, x(4), x(5), 31), 0x531F_7CA4);
    check("asr x6, x7, #1", asr(X64, x(6), x(7), 1), 0x9341_FCE6);

    check("bfxil w0, w1, #4, #8", bfxil(W32, x(0), x(1), 4, 8), 0x3304_2C20);
    check("sbfx x2, x3, #60, #4", sbfx(X64, x(2), x(3), 60, 4), 0x937C_FC62);
    check("sbfiz w4, w5, #2, #30", sbfiz(W32, x(4), x(5), 2, 30), 0x131E_74A4);
    check("ubfx w6, w7, #8, #8", ubfx(W32, x(6), x(7), 8, 8), 0x5308_3CE6);
    check("ubfiz x8, x9, #32, #16", ubfiz(X64, x(8), x(9), 32, 16), 0xD360_3D28);

    check("sxtb w0, w1", sxtb(W32, x(0), x(1)), 0x1300_1C20);
    check("sxth x2, w3", sxth(X64, x(2), x(3)), 0x9340_3C62);
    check("sxtw x4, w5", sxtw(x(4), x(5)), 0x9340_7CA4);
    check("uxtb w6, w7", uxtb(x(6), x(7)), 0x5300_1CE6);
    check("uxth w8, w9", uxth(x(8), x(9)), 0x5300_3D28);
}

#[test]
fn extract_and_rotate() {
    check("extr w0, w1, w2, #16", extr(W32, x(0), x(1), x(2), 16), 0x1382_4020);
    check("extr x3, x4, x5, #63", extr(X64, x(3), x(4), x(5), 63), 0x93C5_FC83);
    check("ror w0, w1, #16", ror(W32, x(0), x(1), 16), 0x1381_4020);
    check("ror x2, x3, #1", ror(X64, x(2), x(3), 1), 0x93C3_0462);
}

#[test]
fn variable_shifts() {
    check("lslv w0, w1, w2", lslv(W32, x(0), x(1), x(2)), 0x1AC2_2020);
    check("lsrv x3, x4, x5", lsrv(X64, x(3), x(4), x(5)), 0x9AC5_2483);
    check("asrv w6, w7, w8", asrv(W32, x(6), x(7), x(8)), 0x1AC8_28E6);
    check("rorv x9, x10, x11", rorv(X64, x(9), x(10), x(11)), 0x9ACB_2D49);
}

#[test]
fn multiply_and_divide() {
    check(
        "madd w0, w1, w2, w3",
        madd(W32, x(0), x(1), x(2), x(3)),
        0x1B02_0C20,
    );
    check(
        "msub x4, x5, x6, x7",
        msub(X64, x(4), x(5), x(6), x(7)),
        0x9B06_9CA4,
    );
    check("mul w0, w1, w2", mul(W32, x(0), x(1), x(2)), 0x1B02_7C20);
    check("mneg x3, x4, x5", mneg(X64, x(3), x(4), x(5)), 0x9B05_FC83);

    check("smaddl x0, w1, w2, x3", smaddl(x(0), x(1), x(2), x(3)), 0x9B22_0C20);
    check("smsubl x4, w5, w6, x7", smsubl(x(4), x(5), x(6), x(7)), 0x9B26_9CA4);
    check(
        "umaddl x8, w9, w10, x11",
        umaddl(x(8), x(9), x(10), x(11)),
        0x9BAA_2D28,
    );
    check(
        "umsubl x12, w13, w14, x15",
        umsubl(x(12), x(13), x(14), x(15)),
        0x9BAE_BDAC,
    );
    check("smull x0, w1, w2", smull(x(0), x(1), x(2)), 0x9B22_7C20);
    check("umull x3, w4, w5", umull(x(3), x(4), x(5)), 0x9BA5_7C83);
    check("smnegl x6, w7, w8", smnegl(x(6), x(7), x(8)), 0x9B28_FCE6);
    check("umnegl x9, w10, w11", umnegl(x(9), x(10), x(11)), 0x9BAB_FD49);

    check("sdiv w0, w1, w2", sdiv(W32, x(0), x(1), x(2)), 0x1AC2_0C20);
    check("udiv x3, x4, x5", udiv(X64, x(3), x(4), x(5)), 0x9AC5_0883);
}

#[test]
fn one_source_bit_operations() {
    check("cls w0, w1", cls(W32, x(0), x(1)), 0x5AC0_1420);
    check("clz x2, x3", clz(X64, x(2), x(3)), 0xDAC0_1062);
    check("rbit w4, w5", rbit(W32, x(4), x(5)), 0x5AC0_00A4);
    check("rev w6, w7", rev(W32, x(6), x(7)), 0x5AC0_08E6);
    check("rev x8, x9", rev(X64, x(8), x(9)), 0xDAC0_0D28);
    check("rev16 w10, w11", rev16(W32, x(10), x(11)), 0x5AC0_056A);
    check("rev16 x12, x13", rev16(X64, x(12), x(13)), 0xDAC0_05AC);
    check("rev32 x14, x15", rev32(x(14), x(15)), 0xDAC0_09EE);
}

#[test]
fn system_registers_and_exceptions() {
    check(
        "mrs x0, TPIDRRO_EL0",
        mrs(x(0), SystemRegister::TPIDRRO_EL0),
        0xD53B_D060,
    );
    check("mrs x1, NZCV", mrs(x(1), SystemRegister::NZCV), 0xD53B_4201);
    check("msr NZCV, x2", msr(SystemRegister::NZCV, x(2)), 0xD51B_4202);
    check(
        "msr TPIDR_EL0, x3",
        msr(SystemRegister::TPIDR_EL0, x(3)),
        0xD51B_D043,
    );
    check(
        "mrs x4, CNTVCT_EL0",
        mrs(x(4), SystemRegister::CNTVCT_EL0),
        0xD53B_E044,
    );
    check(
        "mrs x5, CNTFRQ_EL0",
        mrs(x(5), SystemRegister::CNTFRQ_EL0),
        0xD53B_E005,
    );
    check("mrs x6, FPCR", mrs(x(6), SystemRegister::FPCR), 0xD53B_4406);
    check("msr FPSR, x7", msr(SystemRegister::FPSR, x(7)), 0xD51B_4427);

    check("brk #0", brk(0), 0xD420_0000);
    check("brk #0xffff", brk(0xFFFF), 0xD43F_FFE0);
    check("hlt #1", hlt(1), 0xD440_0020);
    assert_eq!(nop(), MachineWord(0xD503_201F));
}

#[test]
fn descriptors_match_direct_emitters() {
    let descriptors = [
        InstructionDescriptor::Branch {
            link: true,
            offset: 64,
        },
        InstructionDescriptor::Nop,
    ];
    let words = InstructionDescriptor::encode_all(&descriptors).unwrap();
    assert_eq!(words, vec![bl(64).unwrap(), nop()]);
    assert_eq!(
        words_to_bytes(&words),
        vec![0x40, 0x00, 0x00, 0x94, 0x1F, 0x20, 0x03, 0xD5]
    );
}

#[test]
fn field_maximum_encodes_and_maximum_plus_one_fails() {
    fn out_of_range(word: EncodeResult<MachineWord>) -> bool {
        matches!(word, Err(EncodingError::ImmediateOutOfRange { .. }))
    }

    assert!(b(0x01FF_FFFF).is_ok());
    assert!(out_of_range(b(0x0200_0000)));
    assert!(b(-0x0200_0000).is_ok());
    assert!(out_of_range(b(-0x0200_0001)));

    assert!(b_cond(Condition::Eq, 0x3FFFF).is_ok());
    assert!(out_of_range(b_cond(Condition::Eq, 0x40000)));
    assert!(tbz(x(0), 63, 0x1FFF).is_ok());
    assert!(out_of_range(tbz(x(0), 63, 0x2000)));
    assert!(out_of_range(tbz(x(0), 64, 0)));

    assert!(add_imm(X64, x(0), x(1), 4095).is_ok());
    assert!(out_of_range(add_imm(X64, x(0), x(1), 4096)));
    assert!(movk(X64, x(0), 0xFFFF, 3).is_ok());
    assert!(out_of_range(movk(X64, x(0), 0x1_0000, 0)));
    assert!(out_of_range(movz(W32, x(0), 1, 2)));

    assert!(ldrb(x(0), x(1), 4095).is_ok());
    assert!(out_of_range(ldrb(x(0), x(1), 4096)));
    assert!(ldr(X64, x(0), x(1), 4095 * 8).is_ok());
    assert!(out_of_range(ldr(X64, x(0), x(1), 4096 * 8)));
    assert!(matches!(
        ldr(X64, x(0), x(1), 12),
        Err(EncodingError::MisalignedOffset { align: 8, .. })
    ));
    assert!(ldur(W32, x(0), x(1), 255).is_ok());
    assert!(out_of_range(ldur(W32, x(0), x(1), 256)));
    assert!(out_of_range(ldur(W32, x(0), x(1), -257)));

    assert!(lsl(W32, x(0), x(1), 31).is_ok());
    assert!(out_of_range(lsl(W32, x(0), x(1), 32)));
    assert!(brk(0xFFFF).is_ok());
    assert!(out_of_range(brk(0x1_0000)));
}

#[test]
fn invalid_operands_rejected() {
    assert!(matches!(
        add(X64, x(0), v(1), x(2)),
        Err(EncodingError::InvalidRegister { operand: "rn", .. })
    ));
    assert!(matches!(
        add_sub_shifted(AddSubOp::Add, X64, x(0), x(1), x(2), ShiftKind::Ror, 1),
        Err(EncodingError::InvalidOperand { .. })
    ));
    assert!(matches!(
        rev32(x(0), v(0)),
        Err(EncodingError::InvalidRegister { .. })
    ));
    assert!(matches!(
        load_literal(MemOp::Strb, x(0), 1),
        Err(EncodingError::InvalidOperand { .. })
    ));
}
