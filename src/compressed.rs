//! RVC: 16 bit compressed instructions (Chapter 16 of the unprivileged spec).
//!
//! A parcel is first classified into a [`CompressedOp`], then expanded into the
//! equivalent 32 bit encoding, which goes through the regular decoder.

use crate::bits::{field, sign_extend};
use crate::decode::opcode;
use crate::Uxlen;

/// The instruction is a 16 bit one iff its two lowest bits are not `0b11`.
pub fn is_compressed(parcel: u32) -> bool {
    parcel & 0b11 != 0b11
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressedOp {
    // Quadrant 0
    Addi4spn,
    Fld,
    Lw,
    Ld,
    Fsd,
    Sw,
    Sd,
    // Quadrant 1
    Nop,
    Addi,
    Addiw,
    Li,
    Addi16sp,
    Lui,
    Srli,
    Srai,
    Andi,
    Sub,
    Xor,
    Or,
    And,
    Subw,
    Addw,
    J,
    Beqz,
    Bnez,
    // Quadrant 2
    Slli,
    Fldsp,
    Lwsp,
    Ldsp,
    Jr,
    Mv,
    Ebreak,
    Jalr,
    Add,
    Fsdsp,
    Swsp,
    Sdsp,
    Invalid,
}

#[inline]
fn bits(inst: u16, hi: u32, lo: u32) -> u32 {
    field(inst as u32, hi, lo)
}

/// `rd'`/`rs1'`/`rs2'`: three bit register specifiers for x8..x15.
#[inline]
fn creg(inst: u16, lo: u32) -> u32 {
    8 + bits(inst, lo + 2, lo)
}

/// The six bit signed immediate of C.ADDI, C.ADDIW, C.LI and C.ANDI.
fn imm6(inst: u16) -> Uxlen {
    sign_extend((bits(inst, 12, 12) << 5 | bits(inst, 6, 2)) as Uxlen, 6)
}

fn addi16sp_imm(inst: u16) -> Uxlen {
    let imm = bits(inst, 12, 12) << 9
        | bits(inst, 4, 3) << 7
        | bits(inst, 5, 5) << 6
        | bits(inst, 2, 2) << 5
        | bits(inst, 6, 6) << 4;
    sign_extend(imm as Uxlen, 10)
}

fn lui_imm(inst: u16) -> Uxlen {
    sign_extend((bits(inst, 12, 12) << 17 | bits(inst, 6, 2) << 12) as Uxlen, 18)
}

/// Classifies a 16 bit parcel. Parcels with `0b11` in the low bits are not
/// compressed and classify as `Invalid`; test with [`is_compressed`] first.
pub fn classify(inst: u16) -> CompressedOp {
    use CompressedOp::*;

    let funct3 = bits(inst, 15, 13);
    let rd = bits(inst, 11, 7);
    let rs2 = bits(inst, 6, 2);

    match inst & 0b11 {
        0b00 => match funct3 {
            0b000 if bits(inst, 12, 5) == 0 => Invalid,
            0b000 => Addi4spn,
            0b001 => Fld,
            0b010 => Lw,
            0b011 => Ld,
            0b101 => Fsd,
            0b110 => Sw,
            0b111 => Sd,
            _ => Invalid,
        },
        0b01 => match funct3 {
            0b000 if rd == 0 && imm6(inst) == 0 => Nop,
            0b000 => Addi,
            0b001 if rd == 0 => Invalid,
            0b001 => Addiw,
            0b010 => Li,
            0b011 if rd == 2 && addi16sp_imm(inst) == 0 => Invalid,
            0b011 if rd == 2 => Addi16sp,
            0b011 if lui_imm(inst) == 0 => Invalid,
            0b011 => Lui,
            0b100 => match (bits(inst, 11, 10), bits(inst, 12, 12), bits(inst, 6, 5)) {
                (0b00, _, _) => Srli,
                (0b01, _, _) => Srai,
                (0b10, _, _) => Andi,
                (0b11, 0, 0b00) => Sub,
                (0b11, 0, 0b01) => Xor,
                (0b11, 0, 0b10) => Or,
                (0b11, 0, 0b11) => And,
                (0b11, 1, 0b00) => Subw,
                (0b11, 1, 0b01) => Addw,
                _ => Invalid,
            },
            0b101 => J,
            0b110 => Beqz,
            0b111 => Bnez,
            _ => unreachable!("funct3 should only be 3 bits"),
        },
        0b10 => match funct3 {
            0b000 => Slli,
            0b001 => Fldsp,
            0b010 if rd == 0 => Invalid,
            0b010 => Lwsp,
            0b011 if rd == 0 => Invalid,
            0b011 => Ldsp,
            0b100 => match (bits(inst, 12, 12), rd, rs2) {
                (0, 0, 0) => Invalid,
                (0, _, 0) => Jr,
                (0, _, _) => Mv,
                (1, 0, 0) => Ebreak,
                (1, _, 0) => Jalr,
                _ => Add,
            },
            0b101 => Fsdsp,
            0b110 => Swsp,
            0b111 => Sdsp,
            _ => unreachable!("funct3 should only be 3 bits"),
        },
        _ => Invalid,
    }
}

fn r_type(funct7: u32, rs2: u32, rs1: u32, funct3: u32, rd: u32, opcode: u8) -> u32 {
    funct7 << 25 | rs2 << 20 | rs1 << 15 | funct3 << 12 | rd << 7 | opcode as u32
}

fn i_type(imm: Uxlen, rs1: u32, funct3: u32, rd: u32, opcode: u8) -> u32 {
    ((imm as u32) & 0xfff) << 20 | rs1 << 15 | funct3 << 12 | rd << 7 | opcode as u32
}

fn s_type(imm: Uxlen, rs2: u32, rs1: u32, funct3: u32) -> u32 {
    let imm = imm as u32;
    (imm >> 5 & 0x7f) << 25
        | rs2 << 20
        | rs1 << 15
        | funct3 << 12
        | (imm & 0x1f) << 7
        | opcode::STORE as u32
}

fn b_type(imm: Uxlen, rs1: u32, funct3: u32) -> u32 {
    let imm = imm as u32;
    (imm >> 12 & 1) << 31
        | (imm >> 5 & 0x3f) << 25
        | rs1 << 15
        | funct3 << 12
        | (imm >> 1 & 0xf) << 8
        | (imm >> 11 & 1) << 7
        | opcode::BRANCH as u32
}

fn j_type(imm: Uxlen, rd: u32) -> u32 {
    let imm = imm as u32;
    (imm >> 20 & 1) << 31
        | (imm >> 1 & 0x3ff) << 21
        | (imm >> 11 & 1) << 20
        | (imm >> 12 & 0xff) << 12
        | rd << 7
        | opcode::JAL as u32
}

/// Expands a compressed parcel into its canonical 32 bit encoding.
///
/// `None` for invalid and reserved encodings and for the floating point
/// loads and stores, which are not supported.
pub fn expand(inst: u16) -> Option<u32> {
    use CompressedOp as C;

    let rd = bits(inst, 11, 7);
    let rs2 = bits(inst, 6, 2);
    let shamt = bits(inst, 12, 12) << 5 | bits(inst, 6, 2);

    let word = match classify(inst) {
        C::Addi4spn => {
            let uimm = bits(inst, 12, 11) << 4
                | bits(inst, 10, 7) << 6
                | bits(inst, 6, 6) << 2
                | bits(inst, 5, 5) << 3;
            i_type(uimm as Uxlen, 2, 0b000, creg(inst, 2), opcode::OP_IMM)
        }
        C::Lw => {
            let uimm = bits(inst, 12, 10) << 3 | bits(inst, 6, 6) << 2 | bits(inst, 5, 5) << 6;
            i_type(uimm as Uxlen, creg(inst, 7), 0b010, creg(inst, 2), opcode::LOAD)
        }
        C::Ld => {
            let uimm = bits(inst, 12, 10) << 3 | bits(inst, 6, 5) << 6;
            i_type(uimm as Uxlen, creg(inst, 7), 0b011, creg(inst, 2), opcode::LOAD)
        }
        C::Sw => {
            let uimm = bits(inst, 12, 10) << 3 | bits(inst, 6, 6) << 2 | bits(inst, 5, 5) << 6;
            s_type(uimm as Uxlen, creg(inst, 2), creg(inst, 7), 0b010)
        }
        C::Sd => {
            let uimm = bits(inst, 12, 10) << 3 | bits(inst, 6, 5) << 6;
            s_type(uimm as Uxlen, creg(inst, 2), creg(inst, 7), 0b011)
        }
        C::Nop | C::Addi => i_type(imm6(inst), rd, 0b000, rd, opcode::OP_IMM),
        C::Addiw => i_type(imm6(inst), rd, 0b000, rd, opcode::OP_IMM_32),
        C::Li => i_type(imm6(inst), 0, 0b000, rd, opcode::OP_IMM),
        C::Addi16sp => i_type(addi16sp_imm(inst), 2, 0b000, 2, opcode::OP_IMM),
        C::Lui => ((lui_imm(inst) as u32) & 0xffff_f000) | rd << 7 | opcode::LUI as u32,
        C::Srli => i_type(shamt as Uxlen, creg(inst, 7), 0b101, creg(inst, 7), opcode::OP_IMM),
        C::Srai => i_type(
            (0b01_0000 << 6 | shamt) as Uxlen,
            creg(inst, 7),
            0b101,
            creg(inst, 7),
            opcode::OP_IMM,
        ),
        C::Andi => i_type(imm6(inst), creg(inst, 7), 0b111, creg(inst, 7), opcode::OP_IMM),
        C::Sub => r_type(0x20, creg(inst, 2), creg(inst, 7), 0b000, creg(inst, 7), opcode::OP),
        C::Xor => r_type(0x00, creg(inst, 2), creg(inst, 7), 0b100, creg(inst, 7), opcode::OP),
        C::Or => r_type(0x00, creg(inst, 2), creg(inst, 7), 0b110, creg(inst, 7), opcode::OP),
        C::And => r_type(0x00, creg(inst, 2), creg(inst, 7), 0b111, creg(inst, 7), opcode::OP),
        C::Subw => r_type(0x20, creg(inst, 2), creg(inst, 7), 0b000, creg(inst, 7), opcode::OP_32),
        C::Addw => r_type(0x00, creg(inst, 2), creg(inst, 7), 0b000, creg(inst, 7), opcode::OP_32),
        C::J => {
            let offset = bits(inst, 12, 12) << 11
                | bits(inst, 11, 11) << 4
                | bits(inst, 10, 9) << 8
                | bits(inst, 8, 8) << 10
                | bits(inst, 7, 7) << 6
                | bits(inst, 6, 6) << 7
                | bits(inst, 5, 3) << 1
                | bits(inst, 2, 2) << 5;
            j_type(sign_extend(offset as Uxlen, 12), 0)
        }
        C::Beqz | C::Bnez => {
            let offset = bits(inst, 12, 12) << 8
                | bits(inst, 11, 10) << 3
                | bits(inst, 6, 5) << 6
                | bits(inst, 4, 3) << 1
                | bits(inst, 2, 2) << 5;
            let funct3 = if classify(inst) == C::Beqz { 0b000 } else { 0b001 };
            b_type(sign_extend(offset as Uxlen, 9), creg(inst, 7), funct3)
        }
        C::Slli => i_type(shamt as Uxlen, rd, 0b001, rd, opcode::OP_IMM),
        C::Lwsp => {
            let uimm = bits(inst, 12, 12) << 5 | bits(inst, 6, 4) << 2 | bits(inst, 3, 2) << 6;
            i_type(uimm as Uxlen, 2, 0b010, rd, opcode::LOAD)
        }
        C::Ldsp => {
            let uimm = bits(inst, 12, 12) << 5 | bits(inst, 6, 5) << 3 | bits(inst, 4, 2) << 6;
            i_type(uimm as Uxlen, 2, 0b011, rd, opcode::LOAD)
        }
        C::Jr => i_type(0, rd, 0b000, 0, opcode::JALR),
        C::Mv => r_type(0x00, rs2, 0, 0b000, rd, opcode::OP),
        C::Ebreak => 0x0010_0073,
        C::Jalr => i_type(0, rd, 0b000, 1, opcode::JALR),
        C::Add => r_type(0x00, rs2, rd, 0b000, rd, opcode::OP),
        C::Swsp => {
            let uimm = bits(inst, 12, 9) << 2 | bits(inst, 8, 7) << 6;
            s_type(uimm as Uxlen, rs2, 2, 0b010)
        }
        C::Sdsp => {
            let uimm = bits(inst, 12, 10) << 3 | bits(inst, 9, 7) << 6;
            s_type(uimm as Uxlen, rs2, 2, 0b011)
        }
        C::Fld | C::Fsd | C::Fldsp | C::Fsdsp | C::Invalid => return None,
    };
    Some(word)
}
