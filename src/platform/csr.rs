//! Control and status registers (Zicsr, privileged spec chapter 2-4).
//!
//! The lower 12 bits of an address encode the CSR specifier. Storage is a flat
//! 4096 entry bank; the supervisor views `sstatus`, `sie` and `sip` have no
//! storage of their own and are masked windows onto `mstatus`, `mie` and `mip`.

use crate::bits;
use crate::platform::PrivilegeMode;
use crate::Uxlen;

pub const CSR_COUNT: usize = 4096;

// Unprivileged counters
pub const CYCLE: u16 = 0xC00;
pub const TIME: u16 = 0xC01;
pub const INSTRET: u16 = 0xC02;

// Supervisor
pub const SSTATUS: u16 = 0x100;
pub const SIE: u16 = 0x104;
pub const STVEC: u16 = 0x105;
pub const SCOUNTEREN: u16 = 0x106;
pub const SSCRATCH: u16 = 0x140;
pub const SEPC: u16 = 0x141;
pub const SCAUSE: u16 = 0x142;
pub const STVAL: u16 = 0x143;
pub const SIP: u16 = 0x144;
pub const SATP: u16 = 0x180;

// Machine
pub const MVENDORID: u16 = 0xF11;
pub const MARCHID: u16 = 0xF12;
pub const MIMPID: u16 = 0xF13;
pub const MHARTID: u16 = 0xF14;
pub const MSTATUS: u16 = 0x300;
pub const MISA: u16 = 0x301;
pub const MEDELEG: u16 = 0x302;
pub const MIDELEG: u16 = 0x303;
pub const MIE: u16 = 0x304;
pub const MTVEC: u16 = 0x305;
pub const MCOUNTEREN: u16 = 0x306;
pub const MSCRATCH: u16 = 0x340;
pub const MEPC: u16 = 0x341;
pub const MCAUSE: u16 = 0x342;
pub const MTVAL: u16 = 0x343;
pub const MIP: u16 = 0x344;
pub const MCYCLE: u16 = 0xB00;
pub const MINSTRET: u16 = 0xB02;

// mstatus fields
pub const MSTATUS_SIE: Uxlen = 1 << 1;
pub const MSTATUS_MIE: Uxlen = 1 << 3;
pub const MSTATUS_SPIE: Uxlen = 1 << 5;
pub const MSTATUS_UBE: Uxlen = 1 << 6;
pub const MSTATUS_MPIE: Uxlen = 1 << 7;
pub const MSTATUS_SPP: Uxlen = 1 << 8;
pub const MSTATUS_MPP_SHIFT: u32 = 11;
pub const MSTATUS_MPP: Uxlen = 0b11 << MSTATUS_MPP_SHIFT;
pub const MSTATUS_FS: Uxlen = 0b11 << 13;
pub const MSTATUS_XS: Uxlen = 0b11 << 15;
pub const MSTATUS_MPRV: Uxlen = 1 << 17;
pub const MSTATUS_SUM: Uxlen = 1 << 18;
pub const MSTATUS_MXR: Uxlen = 1 << 19;
pub const MSTATUS_TVM: Uxlen = 1 << 20;
pub const MSTATUS_TW: Uxlen = 1 << 21;
pub const MSTATUS_TSR: Uxlen = 1 << 22;
pub const MSTATUS_UXL: Uxlen = 0b11 << 32;
pub const MSTATUS_SXL: Uxlen = 0b11 << 34;
pub const MSTATUS_SD: Uxlen = 1 << 63;

/// Bits of `mstatus` visible through `sstatus`.
pub const SSTATUS_MASK: Uxlen = MSTATUS_SIE
    | MSTATUS_SPIE
    | MSTATUS_UBE
    | MSTATUS_SPP
    | MSTATUS_FS
    | MSTATUS_XS
    | MSTATUS_SUM
    | MSTATUS_MXR
    | MSTATUS_UXL
    | MSTATUS_SD;

/// Bits of `mstatus` software may change. FS/XS stay off without an FPU.
const MSTATUS_WRITABLE: Uxlen = MSTATUS_SIE
    | MSTATUS_MIE
    | MSTATUS_SPIE
    | MSTATUS_MPIE
    | MSTATUS_SPP
    | MSTATUS_MPP
    | MSTATUS_MPRV
    | MSTATUS_SUM
    | MSTATUS_MXR
    | MSTATUS_TVM
    | MSTATUS_TW
    | MSTATUS_TSR;

// mip / mie bits
pub const MIP_SSIP: Uxlen = 1 << 1;
pub const MIP_MSIP: Uxlen = 1 << 3;
pub const MIP_STIP: Uxlen = 1 << 5;
pub const MIP_MTIP: Uxlen = 1 << 7;
pub const MIP_SEIP: Uxlen = 1 << 9;
pub const MIP_MEIP: Uxlen = 1 << 11;

/// Interrupts that can be delegated to supervisor mode.
const DELEGABLE_INTERRUPTS: Uxlen = MIP_SSIP | MIP_STIP | MIP_SEIP;
/// `mip` bits software may write, the rest are driven by devices.
const MIP_WRITABLE: Uxlen = MIP_SSIP | MIP_STIP | MIP_SEIP;
const MIE_WRITABLE: Uxlen = MIP_SSIP | MIP_MSIP | MIP_STIP | MIP_MTIP | MIP_SEIP | MIP_MEIP;
/// Environment call from M-mode can not be delegated.
const MEDELEG_WRITABLE: Uxlen = 0xb3ff;

pub const SATP_MODE_SHIFT: u32 = 60;
pub const SATP_MODE_BARE: Uxlen = 0;
pub const SATP_MODE_SV39: Uxlen = 8;
pub const SATP_PPN_MASK: Uxlen = (1 << 44) - 1;

/// RV64 with extensions A, C, I, M, S and U.
const MISA_VALUE: Uxlen = 2 << 62
    | 1 << (b'A' - b'A')
    | 1 << (b'C' - b'A')
    | 1 << (b'I' - b'A')
    | 1 << (b'M' - b'A')
    | 1 << (b'S' - b'A')
    | 1 << (b'U' - b'A');

/// `XLEN` encoding 2 = 64 bit, for `mstatus.UXL`/`SXL`.
const XLEN_64: Uxlen = 2;

pub struct Csr {
    regs: Box<[Uxlen]>,
    /// In this simulation, the cycle, time and instret counter are all the same value.
    tick_count: u64,
}

impl Default for Csr {
    fn default() -> Self {
        Self::new()
    }
}

impl Csr {
    pub fn new() -> Csr {
        let mut regs = vec![0; CSR_COUNT].into_boxed_slice();
        regs[MISA as usize] = MISA_VALUE;
        regs[MSTATUS as usize] = XLEN_64 << 32 | XLEN_64 << 34;
        Csr {
            regs,
            tick_count: 0,
        }
    }

    /// Reads a CSR, resolving aliased views. No access checks.
    pub fn read(&self, addr: u16) -> Uxlen {
        match addr & 0xfff {
            SSTATUS => self.regs[MSTATUS as usize] & SSTATUS_MASK,
            SIE => self.regs[MIE as usize] & self.regs[MIDELEG as usize],
            SIP => self.regs[MIP as usize] & self.regs[MIDELEG as usize],
            CYCLE | TIME | INSTRET | MCYCLE | MINSTRET => self.tick_count,
            addr => self.regs[addr as usize],
        }
    }

    /// Writes a CSR, applying the WARL rules of the individual registers.
    /// Writes to an alias land in its backing register under the alias mask.
    pub fn write(&mut self, addr: u16, value: Uxlen) {
        match addr & 0xfff {
            SSTATUS => {
                let merged = self.masked(MSTATUS, SSTATUS_MASK, value);
                self.write(MSTATUS, merged);
            }
            SIE => {
                let mask = self.regs[MIDELEG as usize];
                self.regs[MIE as usize] = self.masked(MIE, mask & MIE_WRITABLE, value);
            }
            SIP => {
                let mask = self.regs[MIDELEG as usize] & MIP_SSIP;
                self.regs[MIP as usize] = self.masked(MIP, mask, value);
            }
            MSTATUS => {
                let mut value = value;
                // MPP = 0b10 is reserved, keep the previous mode.
                if (value & MSTATUS_MPP) >> MSTATUS_MPP_SHIFT == 0b10 {
                    value = (value & !MSTATUS_MPP) | (self.regs[MSTATUS as usize] & MSTATUS_MPP);
                }
                self.regs[MSTATUS as usize] = self.masked(MSTATUS, MSTATUS_WRITABLE, value);
            }
            MIE => self.regs[MIE as usize] = self.masked(MIE, MIE_WRITABLE, value),
            MIP => self.regs[MIP as usize] = self.masked(MIP, MIP_WRITABLE, value),
            MIDELEG => self.regs[MIDELEG as usize] = value & DELEGABLE_INTERRUPTS,
            MEDELEG => self.regs[MEDELEG as usize] = value & MEDELEG_WRITABLE,
            // Vectored or direct, modes >= 2 are reserved.
            MTVEC | STVEC => self.regs[(addr & 0xfff) as usize] = value & !0b10,
            // IALIGN = 16
            MEPC | SEPC => self.regs[(addr & 0xfff) as usize] = value & !1,
            SATP => {
                let mode = value >> SATP_MODE_SHIFT;
                if mode == SATP_MODE_BARE || mode == SATP_MODE_SV39 {
                    self.regs[SATP as usize] = value;
                } else {
                    log::warn!("Ignored write of unsupported satp mode {mode}");
                }
            }
            MCYCLE | MINSTRET => self.tick_count = value,
            MISA | MVENDORID | MARCHID | MIMPID | MHARTID => {}
            addr => self.regs[addr as usize] = value,
        }
    }

    fn masked(&self, backing: u16, mask: Uxlen, value: Uxlen) -> Uxlen {
        (self.regs[backing as usize] & !mask) | (value & mask)
    }

    /// Whether a CSR instruction in `mode` may access `addr`.
    ///
    /// `addr[9:8]` is the lowest privilege level allowed, `addr[11:10] == 0b11`
    /// marks read-only registers. Counters are additionally gated by
    /// `mcounteren`/`scounteren` and `satp` by `mstatus.TVM`.
    pub fn accessible(&self, addr: u16, mode: PrivilegeMode, write: bool) -> bool {
        let addr = addr & 0xfff;
        let min_mode = bits::extract(addr as Uxlen, 9, 8) as u8;
        if u8::from(mode) < min_mode {
            return false;
        }
        if write && bits::extract(addr as Uxlen, 11, 10) == 0b11 {
            return false;
        }
        if (CYCLE..=CYCLE + 0x1f).contains(&addr) {
            let bit = 1 << (addr - CYCLE);
            if mode < PrivilegeMode::Machine && self.regs[MCOUNTEREN as usize] & bit == 0 {
                return false;
            }
            if mode == PrivilegeMode::User && self.regs[SCOUNTEREN as usize] & bit == 0 {
                return false;
            }
        }
        if addr == SATP
            && mode == PrivilegeMode::Supervisor
            && self.regs[MSTATUS as usize] & MSTATUS_TVM != 0
        {
            return false;
        }
        true
    }

    /// Drives the device controlled bits of `mip`.
    pub fn set_external_interrupts(&mut self, lines: Uxlen) {
        let mask = MIP_MEIP | MIP_SEIP;
        self.regs[MIP as usize] = (self.regs[MIP as usize] & !mask) | (lines & mask);
    }

    pub fn increment_tick(&mut self) {
        self.tick_count = self.tick_count.wrapping_add(1);
    }
}
