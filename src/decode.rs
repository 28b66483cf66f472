//! Instruction decoding: format parsers and the opcode → funct3 → funct7 lookup.
//!
//! Chapter 2 (RV32I base), 5 (RV64I), 7 (M), 8 (A) and 9 (Zicsr) of the
//! unprivileged spec, plus the trap-return and fence instructions of the
//! privileged spec.

use crate::bits::{field, sign_extend};
use crate::Uxlen;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RType {
    pub opcode: u8,
    pub funct3: u8,
    pub funct7: u8,
    pub rs1: u8,
    pub rs2: u8,
    pub rd: u8,
}

impl From<u32> for RType {
    fn from(instr: u32) -> RType {
        RType {
            opcode: (instr & 0b111_1111) as u8,
            funct3: ((instr >> 12) & 0b111) as u8,
            funct7: ((instr >> 25) & 0b111_1111) as u8,
            rs1: ((instr >> 15) & 0b1_1111) as u8,
            rs2: ((instr >> 20) & 0b1_1111) as u8,
            rd: ((instr >> 7) & 0b1_1111) as u8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IType {
    pub opcode: u8,
    pub funct3: u8,
    pub rs1: u8,
    pub rd: u8,
    /// Sign extended `inst[31:20]`.
    pub imm: Uxlen,
}

impl IType {
    /// The raw 12 bit immediate, e.g. a CSR address or a shift amount field.
    pub fn imm12(&self) -> u16 {
        (self.imm & 0xfff) as u16
    }
}

impl From<u32> for IType {
    fn from(instr: u32) -> IType {
        IType {
            opcode: (instr & 0b111_1111) as u8,
            funct3: ((instr >> 12) & 0b111) as u8,
            rs1: ((instr >> 15) & 0b1_1111) as u8,
            rd: ((instr >> 7) & 0b1_1111) as u8,
            imm: sign_extend(field(instr, 31, 20) as Uxlen, 12),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SType {
    pub opcode: u8,
    pub funct3: u8,
    pub rs1: u8,
    pub rs2: u8,
    pub imm: Uxlen,
}

impl From<u32> for SType {
    fn from(instr: u32) -> SType {
        let imm = field(instr, 31, 25) << 5 | field(instr, 11, 7);
        SType {
            opcode: (instr & 0b111_1111) as u8,
            funct3: ((instr >> 12) & 0b111) as u8,
            rs1: ((instr >> 15) & 0b1_1111) as u8,
            rs2: ((instr >> 20) & 0b1_1111) as u8,
            imm: sign_extend(imm as Uxlen, 12),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BType {
    pub opcode: u8,
    pub funct3: u8,
    pub rs1: u8,
    pub rs2: u8,
    pub imm: Uxlen,
}

impl From<u32> for BType {
    fn from(instr: u32) -> BType {
        // Demangle bits. Bit 31 is the sign, bit 0 is always 0.
        let offset = field(instr, 31, 31) << 12
            | field(instr, 7, 7) << 11
            | field(instr, 30, 25) << 5
            | field(instr, 11, 8) << 1;
        BType {
            opcode: (instr & 0b111_1111) as u8,
            funct3: ((instr >> 12) & 0b111) as u8,
            rs1: ((instr >> 15) & 0b1_1111) as u8,
            rs2: ((instr >> 20) & 0b1_1111) as u8,
            imm: sign_extend(offset as Uxlen, 13),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UType {
    pub opcode: u8,
    pub rd: u8,
    /// Upper 20 bits in place, sign extended from bit 31.
    pub imm: Uxlen,
}

impl From<u32> for UType {
    fn from(instr: u32) -> UType {
        UType {
            opcode: (instr & 0b111_1111) as u8,
            rd: ((instr >> 7) & 0b1_1111) as u8,
            imm: sign_extend((instr & 0xff_ff_f0_00) as Uxlen, 32),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JType {
    pub opcode: u8,
    pub rd: u8,
    pub imm: Uxlen,
}

impl From<u32> for JType {
    fn from(instr: u32) -> JType {
        // Unlike `UType` the bits are somewhat mangled. They are bit 20 to bit 1,
        // with bit 0 being 0.
        let offset = field(instr, 31, 31) << 20
            | field(instr, 19, 12) << 12
            | field(instr, 20, 20) << 11
            | field(instr, 30, 21) << 1;
        JType {
            opcode: (instr & 0b111_1111) as u8,
            rd: ((instr >> 7) & 0b1_1111) as u8,
            imm: sign_extend(offset as Uxlen, 21),
        }
    }
}

/// Instruction format, selecting the parser for the raw word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    R,
    I,
    S,
    B,
    U,
    J,
}

/// Format typed fields of a decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fields {
    R(RType),
    I(IType),
    S(SType),
    B(BType),
    U(UType),
    J(JType),
}

impl Format {
    pub fn parse(self, instr: u32) -> Fields {
        match self {
            Format::R => Fields::R(instr.into()),
            Format::I => Fields::I(instr.into()),
            Format::S => Fields::S(instr.into()),
            Format::B => Fields::B(instr.into()),
            Format::U => Fields::U(instr.into()),
            Format::J => Fields::J(instr.into()),
        }
    }
}

/// Symbolic operation code. `Invalid` is the result of any encoding the
/// decoder does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    // RV64I
    Lui,
    Auipc,
    Jal,
    Jalr,
    Beq,
    Bne,
    Blt,
    Bge,
    Bltu,
    Bgeu,
    Lb,
    Lh,
    Lw,
    Ld,
    Lbu,
    Lhu,
    Lwu,
    Sb,
    Sh,
    Sw,
    Sd,
    Addi,
    Slti,
    Sltiu,
    Xori,
    Ori,
    Andi,
    Slli,
    Srli,
    Srai,
    Add,
    Sub,
    Sll,
    Slt,
    Sltu,
    Xor,
    Srl,
    Sra,
    Or,
    And,
    Addiw,
    Slliw,
    Srliw,
    Sraiw,
    Addw,
    Subw,
    Sllw,
    Srlw,
    Sraw,
    Fence,
    FenceI,
    Ecall,
    Ebreak,
    // Privileged
    Mret,
    Sret,
    Wfi,
    SfenceVma,
    // Zicsr
    Csrrw,
    Csrrs,
    Csrrc,
    Csrrwi,
    Csrrsi,
    Csrrci,
    // RV64M
    Mul,
    Mulh,
    Mulhsu,
    Mulhu,
    Div,
    Divu,
    Rem,
    Remu,
    Mulw,
    Divw,
    Divuw,
    Remw,
    Remuw,
    // RV64A
    LrW,
    ScW,
    AmoswapW,
    AmoaddW,
    AmoxorW,
    AmoandW,
    AmoorW,
    AmominW,
    AmomaxW,
    AmominuW,
    AmomaxuW,
    LrD,
    ScD,
    AmoswapD,
    AmoaddD,
    AmoxorD,
    AmoandD,
    AmoorD,
    AmominD,
    AmomaxD,
    AmominuD,
    AmomaxuD,
    Invalid,
}

/// A decoded instruction. `raw` is the 32-bit word that was decoded, i.e. the
/// canonical expansion for compressed instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub raw: u32,
    pub op: Operation,
    pub fields: Fields,
}

impl Instruction {
    pub fn decode(raw: u32) -> Instruction {
        let (op, format) = decode(raw);
        Instruction {
            raw,
            op,
            fields: format.parse(raw),
        }
    }
}

// From Chapter 24
pub mod opcode {
    pub const LOAD: u8 = 0b00_000_11;
    pub const LOAD_FP: u8 = 0b00_001_11;
    pub const CUSTOM_0: u8 = 0b00_010_11;
    pub const MISC_MEM: u8 = 0b00_011_11;
    pub const OP_IMM: u8 = 0b00_100_11;
    pub const AUIPC: u8 = 0b00_101_11;
    pub const OP_IMM_32: u8 = 0b00_110_11;

    pub const STORE: u8 = 0b01_000_11;
    pub const STORE_FP: u8 = 0b01_001_11;
    pub const CUSTOM_1: u8 = 0b01_010_11;
    pub const AMO: u8 = 0b01_011_11;
    pub const OP: u8 = 0b01_100_11;
    pub const LUI: u8 = 0b01_101_11;
    pub const OP_32: u8 = 0b01_110_11;

    pub const MADD: u8 = 0b10_000_11;
    pub const MSUB: u8 = 0b10_001_11;
    pub const NMSUB: u8 = 0b10_010_11;
    pub const NMADD: u8 = 0b10_011_11;
    pub const OP_FP: u8 = 0b10_100_11;
    pub const RESERVED_0: u8 = 0b10_101_11;
    pub const CUSTOM_2: u8 = 0b10_110_11;

    pub const BRANCH: u8 = 0b11_000_11;
    pub const JALR: u8 = 0b11_001_11;
    pub const RESERVED_1: u8 = 0b11_010_11;
    pub const JAL: u8 = 0b11_011_11;
    pub const SYSTEM: u8 = 0b11_100_11;
    pub const RESERVED_2: u8 = 0b11_101_11;
    pub const CUSTOM_3: u8 = 0b11_110_11;
}

pub fn get_opcode(instr: u32) -> u8 {
    (instr & 0b111_1111) as u8
}

/// Sub-field used by the last decode tier.
#[derive(Debug, Clone, Copy)]
enum Key {
    /// `inst[31:25]`
    Funct7,
    /// `inst[31:26]`, RV64 shift immediates have a 6 bit shamt.
    Funct6,
    /// `inst[31:27]`, AMO function, `aq`/`rl` are ignored.
    Funct5,
    /// `inst[31:27]` and `rs2`, for LR which has no source operand.
    Funct5Rs2,
    /// `inst[31:25]` and `rd`, for SFENCE.VMA.
    Funct7Rd,
    /// `inst[31:7]`, everything above the opcode.
    Word,
}

impl Key {
    fn of(self, instr: u32) -> u32 {
        match self {
            Key::Funct7 => field(instr, 31, 25),
            Key::Funct6 => field(instr, 31, 26),
            Key::Funct5 => field(instr, 31, 27),
            Key::Funct5Rs2 => field(instr, 31, 27) << 5 | field(instr, 24, 20),
            Key::Funct7Rd => field(instr, 31, 25) << 5 | field(instr, 11, 7),
            Key::Word => field(instr, 31, 7),
        }
    }
}

/// Funct3 tier entry.
#[derive(Debug, Clone, Copy)]
enum Tier {
    Invalid,
    Op(Operation),
    /// First matching `(key, value)` wins, no match is invalid.
    Match(&'static [(Key, u32, Operation)]),
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    format: Format,
    funct3: [Tier; 8],
}

impl Entry {
    const INVALID: Entry = Entry {
        format: Format::I,
        funct3: [Tier::Invalid; 8],
    };

    /// For formats without a funct3 field (U and J).
    const fn uniform(format: Format, op: Operation) -> Entry {
        Entry {
            format,
            funct3: [Tier::Op(op); 8],
        }
    }
}

use Key::*;
use Operation::*;
use Tier::{Invalid as Inv, Match, Op};

const OP_TABLE: [Tier; 8] = [
    Match(&[(Funct7, 0x00, Add), (Funct7, 0x20, Sub), (Funct7, 0x01, Mul)]),
    Match(&[(Funct7, 0x00, Sll), (Funct7, 0x01, Mulh)]),
    Match(&[(Funct7, 0x00, Slt), (Funct7, 0x01, Mulhsu)]),
    Match(&[(Funct7, 0x00, Sltu), (Funct7, 0x01, Mulhu)]),
    Match(&[(Funct7, 0x00, Xor), (Funct7, 0x01, Div)]),
    Match(&[(Funct7, 0x00, Srl), (Funct7, 0x20, Sra), (Funct7, 0x01, Divu)]),
    Match(&[(Funct7, 0x00, Or), (Funct7, 0x01, Rem)]),
    Match(&[(Funct7, 0x00, And), (Funct7, 0x01, Remu)]),
];

const OP_32_TABLE: [Tier; 8] = [
    Match(&[(Funct7, 0x00, Addw), (Funct7, 0x20, Subw), (Funct7, 0x01, Mulw)]),
    Match(&[(Funct7, 0x00, Sllw)]),
    Inv,
    Inv,
    Match(&[(Funct7, 0x01, Divw)]),
    Match(&[(Funct7, 0x00, Srlw), (Funct7, 0x20, Sraw), (Funct7, 0x01, Divuw)]),
    Match(&[(Funct7, 0x01, Remw)]),
    Match(&[(Funct7, 0x01, Remuw)]),
];

const OP_IMM_TABLE: [Tier; 8] = [
    Op(Addi),
    Match(&[(Funct6, 0x00, Slli)]),
    Op(Slti),
    Op(Sltiu),
    Op(Xori),
    Match(&[(Funct6, 0x00, Srli), (Funct6, 0x10, Srai)]),
    Op(Ori),
    Op(Andi),
];

const OP_IMM_32_TABLE: [Tier; 8] = [
    Op(Addiw),
    Match(&[(Funct7, 0x00, Slliw)]),
    Inv,
    Inv,
    Inv,
    Match(&[(Funct7, 0x00, Srliw), (Funct7, 0x20, Sraiw)]),
    Inv,
    Inv,
];

const LOAD_TABLE: [Tier; 8] = [
    Op(Lb),
    Op(Lh),
    Op(Lw),
    Op(Ld),
    Op(Lbu),
    Op(Lhu),
    Op(Lwu),
    Inv,
];

const STORE_TABLE: [Tier; 8] = [Op(Sb), Op(Sh), Op(Sw), Op(Sd), Inv, Inv, Inv, Inv];

const BRANCH_TABLE: [Tier; 8] = [
    Op(Beq),
    Op(Bne),
    Inv,
    Inv,
    Op(Blt),
    Op(Bge),
    Op(Bltu),
    Op(Bgeu),
];

const JALR_TABLE: [Tier; 8] = [Op(Jalr), Inv, Inv, Inv, Inv, Inv, Inv, Inv];

const MISC_MEM_TABLE: [Tier; 8] = [Op(Fence), Op(FenceI), Inv, Inv, Inv, Inv, Inv, Inv];

const SYSTEM_TABLE: [Tier; 8] = [
    Match(&[
        (Word, 0x000 << 13, Ecall),
        (Word, 0x001 << 13, Ebreak),
        (Word, 0x102 << 13, Sret),
        (Word, 0x302 << 13, Mret),
        (Word, 0x105 << 13, Wfi),
        (Funct7Rd, 0x09 << 5, SfenceVma),
    ]),
    Op(Csrrw),
    Op(Csrrs),
    Op(Csrrc),
    Inv,
    Op(Csrrwi),
    Op(Csrrsi),
    Op(Csrrci),
];

const AMO_TABLE: [Tier; 8] = [
    Inv,
    Inv,
    Match(&[
        (Funct5Rs2, 0b00010 << 5, LrW),
        (Funct5, 0b00011, ScW),
        (Funct5, 0b00001, AmoswapW),
        (Funct5, 0b00000, AmoaddW),
        (Funct5, 0b00100, AmoxorW),
        (Funct5, 0b01100, AmoandW),
        (Funct5, 0b01000, AmoorW),
        (Funct5, 0b10000, AmominW),
        (Funct5, 0b10100, AmomaxW),
        (Funct5, 0b11000, AmominuW),
        (Funct5, 0b11100, AmomaxuW),
    ]),
    Match(&[
        (Funct5Rs2, 0b00010 << 5, LrD),
        (Funct5, 0b00011, ScD),
        (Funct5, 0b00001, AmoswapD),
        (Funct5, 0b00000, AmoaddD),
        (Funct5, 0b00100, AmoxorD),
        (Funct5, 0b01100, AmoandD),
        (Funct5, 0b01000, AmoorD),
        (Funct5, 0b10000, AmominD),
        (Funct5, 0b10100, AmomaxD),
        (Funct5, 0b11000, AmominuD),
        (Funct5, 0b11100, AmomaxuD),
    ]),
    Inv,
    Inv,
    Inv,
    Inv,
];

/// Indexed by `opcode[6:2]`; opcodes with `opcode[1:0] != 0b11` are not 32 bit.
static OPCODE_TABLE: [Entry; 32] = {
    const fn slot(opcode: u8) -> usize {
        (opcode >> 2) as usize
    }
    let mut t = [Entry::INVALID; 32];
    t[slot(opcode::LOAD)] = Entry {
        format: Format::I,
        funct3: LOAD_TABLE,
    };
    t[slot(opcode::MISC_MEM)] = Entry {
        format: Format::I,
        funct3: MISC_MEM_TABLE,
    };
    t[slot(opcode::OP_IMM)] = Entry {
        format: Format::I,
        funct3: OP_IMM_TABLE,
    };
    t[slot(opcode::AUIPC)] = Entry::uniform(Format::U, Auipc);
    t[slot(opcode::OP_IMM_32)] = Entry {
        format: Format::I,
        funct3: OP_IMM_32_TABLE,
    };
    t[slot(opcode::STORE)] = Entry {
        format: Format::S,
        funct3: STORE_TABLE,
    };
    t[slot(opcode::AMO)] = Entry {
        format: Format::R,
        funct3: AMO_TABLE,
    };
    t[slot(opcode::OP)] = Entry {
        format: Format::R,
        funct3: OP_TABLE,
    };
    t[slot(opcode::LUI)] = Entry::uniform(Format::U, Lui);
    t[slot(opcode::OP_32)] = Entry {
        format: Format::R,
        funct3: OP_32_TABLE,
    };
    t[slot(opcode::BRANCH)] = Entry {
        format: Format::B,
        funct3: BRANCH_TABLE,
    };
    t[slot(opcode::JALR)] = Entry {
        format: Format::I,
        funct3: JALR_TABLE,
    };
    t[slot(opcode::JAL)] = Entry::uniform(Format::J, Jal);
    t[slot(opcode::SYSTEM)] = Entry {
        format: Format::I,
        funct3: SYSTEM_TABLE,
    };
    t
};

/// Decodes a 32 bit instruction word into its operation and format.
///
/// Total over all inputs: unknown encodings give `Operation::Invalid`.
pub fn decode(instr: u32) -> (Operation, Format) {
    if instr & 0b11 != 0b11 {
        return (Invalid, Format::I);
    }
    let entry = &OPCODE_TABLE[(get_opcode(instr) >> 2) as usize];
    let op = match entry.funct3[field(instr, 14, 12) as usize] {
        Inv => Invalid,
        Op(op) => op,
        Match(candidates) => candidates
            .iter()
            .find(|(key, value, _)| key.of(instr) == *value)
            .map_or(Invalid, |&(_, _, op)| op),
    };
    (op, entry.format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn itype_parse() {
        let raw = 0b101101100101_01101_010_01101_1100100;
        let instr = IType::from(raw);
        assert_eq!(instr.imm, 0xFFFF_FFFF_FFFF_FB65);
        assert_eq!(instr.rs1, 0b01101);
        assert_eq!(instr.rd, 0b01101);
        assert_eq!(instr.funct3, 0b010);
        assert_eq!(instr.opcode, 0b1100100);
        assert_eq!(instr.imm12(), 0b101101100101);
    }

    #[test]
    fn stype_parse() {
        // sd x5, -8(x2)
        let instr = SType::from(0xfe513c23);
        assert_eq!(instr.imm as i64, -8);
        assert_eq!(instr.rs1, 2);
        assert_eq!(instr.rs2, 5);
        assert_eq!(instr.funct3, 0b011);
    }

    #[test]
    fn btype_parse() {
        // beq x0, x0, -4
        let instr = BType::from(0xfe000ee3);
        assert_eq!(instr.imm as i64, -4);
        // bne x1, x2, 2048
        let instr = BType::from(0x00209063 | 1 << 7);
        assert_eq!(instr.imm, 2048);
    }

    #[test]
    fn utype_parse_sign_extends() {
        // lui x1, 0x80000
        let instr = UType::from(0x800000b7);
        assert_eq!(instr.imm, 0xFFFF_FFFF_8000_0000);
        assert_eq!(instr.rd, 1);
    }

    #[test]
    fn jtype_parse() {
        // jal x0, -8
        assert_eq!(JType::from(0xff9ff06f).imm as i64, -8);
        // jal x1, 0x800
        assert_eq!(JType::from(0x001000ef).imm, 0x800);
    }

    #[test]
    fn decodes_base_instructions() {
        assert_eq!(decode(0x00300813), (Addi, Format::I)); // addi x16, x0, 3
        assert_eq!(decode(0x40b50533).0, Sub); // sub a0, a0, a1
        assert_eq!(decode(0x02b50533).0, Mul); // mul a0, a0, a1
        assert_eq!(decode(0x4035d593).0, Srai); // srai a1, a1, 3
        assert_eq!(decode(0x03f5d593).0, Srli); // srli a1, a1, 63
        assert_eq!(decode(0x4035d59b).0, Sraiw);
        assert_eq!(decode(0x00000073).0, Ecall);
        assert_eq!(decode(0x00100073).0, Ebreak);
        assert_eq!(decode(0x30200073).0, Mret);
        assert_eq!(decode(0x10200073).0, Sret);
        assert_eq!(decode(0x10500073).0, Wfi);
        assert_eq!(decode(0x12000073).0, SfenceVma);
        assert_eq!(decode(0x12b50073).0, SfenceVma); // sfence.vma a0, a1
        assert_eq!(decode(0x30047073).0, Csrrci);
        assert_eq!(decode(0x100525af).0, LrW);
        assert_eq!(decode(0x18b535af).0, ScD);
        assert_eq!(decode(0x0000100f).0, FenceI);
    }

    #[test]
    fn rejects_bad_encodings() {
        assert_eq!(decode(0).0, Invalid);
        assert_eq!(decode(0xffff_ffff).0, Invalid);
        // srai with a funct6 other than 0b010000
        assert_eq!(decode(0x6035d593).0, Invalid);
        // slliw with shamt[5] set is reserved
        assert_eq!(decode(0x0205959b).0, Invalid);
        // load funct3 = 0b111
        assert_eq!(decode(0x00007003).0, Invalid);
        // sub funct7 on xor
        assert_eq!(decode(0x40b54533).0, Invalid);
        // floating point is not decoded
        assert_eq!(decode(0x00007007).0, Invalid);
        // system instructions with nonzero rd or rs1
        assert_eq!(decode(0x0000_0873).0, Invalid);
        assert_eq!(decode(0x0010_8073).0, Invalid);
        assert_eq!(decode(0x3020_0073 | 1 << 7).0, Invalid);
        // sfence.vma x0, x0 with rd = x1
        assert_eq!(decode(0x1200_00f3).0, Invalid);
        // lr.w with rs2 = x5
        assert_eq!(decode(0x1055_25af).0, Invalid);
    }

    proptest! {
        #[test]
        fn decode_is_total(word: u32) {
            let instr = Instruction::decode(word);
            if word & 0b11 != 0b11 {
                prop_assert_eq!(instr.op, Invalid);
            }
        }

        #[test]
        fn itype_imm_round_trip(imm in -2048i64..2048, rs1 in 0u32..32, rd in 0u32..32) {
            let word = ((imm as u32) & 0xfff) << 20 | rs1 << 15 | rd << 7 | opcode::OP_IMM as u32;
            let instr = IType::from(word);
            prop_assert_eq!(instr.imm as i64, imm);
            prop_assert_eq!(instr.rs1 as u32, rs1);
            prop_assert_eq!(instr.rd as u32, rd);
        }

        #[test]
        fn btype_imm_round_trip(half in -2048i64..2048) {
            let imm = (half * 2) as u32;
            let word = (imm >> 12 & 1) << 31
                | (imm >> 5 & 0x3f) << 25
                | (imm >> 1 & 0xf) << 8
                | (imm >> 11 & 1) << 7
                | opcode::BRANCH as u32;
            prop_assert_eq!(BType::from(word).imm as i64, half * 2);
        }

        #[test]
        fn jtype_imm_round_trip(half in -(1i64 << 19)..(1i64 << 19)) {
            let imm = (half * 2) as u32;
            let word = (imm >> 20 & 1) << 31
                | (imm >> 1 & 0x3ff) << 21
                | (imm >> 11 & 1) << 20
                | (imm >> 12 & 0xff) << 12
                | opcode::JAL as u32;
            prop_assert_eq!(JType::from(word).imm as i64, half * 2);
        }
    }
}
