use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::Uxlen;

use self::csr::Csr;

pub mod csr;
pub mod exception;

/// A bus access that no device answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no device at {addr:#x}")]
pub struct BusFault {
    pub addr: Uxlen,
}

/// 64 bit byte addressable physical address space.
///
/// Portions might be either vacant, main memory or i/o devices.
/// Inaccessable accesses return a [`BusFault`], which the hart turns into the
/// access fault matching the kind of access.
///
/// Defines byte (1B), halfword(2B), word(4B) or doubleword(8B)
///
/// Little endian by design, such that instruction fetches (always LE)
/// and word fetches work the same.
///
/// Reads take `&mut self` since device registers may have side effects on read.
pub trait AddressSpace {
    fn read_byte(&mut self, addr: Uxlen) -> Result<u8, BusFault>;
    fn read_halfword(&mut self, addr: Uxlen) -> Result<u16, BusFault>;
    fn read_word(&mut self, addr: Uxlen) -> Result<u32, BusFault>;
    fn read_doubleword(&mut self, addr: Uxlen) -> Result<u64, BusFault>;

    fn write_byte(&mut self, addr: Uxlen, val: u8) -> Result<(), BusFault>;
    fn write_halfword(&mut self, addr: Uxlen, val: u16) -> Result<(), BusFault>;
    fn write_word(&mut self, addr: Uxlen, val: u32) -> Result<(), BusFault>;
    fn write_doubleword(&mut self, addr: Uxlen, val: u64) -> Result<(), BusFault>;

    /// Reads `size` bits, zero extended.
    ///
    /// # Panics
    /// If `size` is not one of 8, 16, 32 or 64.
    fn read(&mut self, addr: Uxlen, size: u32) -> Result<Uxlen, BusFault> {
        Ok(match size {
            8 => self.read_byte(addr)? as Uxlen,
            16 => self.read_halfword(addr)? as Uxlen,
            32 => self.read_word(addr)? as Uxlen,
            64 => self.read_doubleword(addr)?,
            _ => panic!("unsupported bus access width {size}"),
        })
    }

    /// Writes the low `size` bits of `value`.
    ///
    /// # Panics
    /// If `size` is not one of 8, 16, 32 or 64.
    fn write(&mut self, addr: Uxlen, value: Uxlen, size: u32) -> Result<(), BusFault> {
        match size {
            8 => self.write_byte(addr, value as u8),
            16 => self.write_halfword(addr, value as u16),
            32 => self.write_word(addr, value as u32),
            64 => self.write_doubleword(addr, value),
            _ => panic!("unsupported bus access width {size}"),
        }
    }

    /// Level of the external interrupt lines as `mip` bits (MEIP, SEIP).
    fn external_interrupts(&mut self) -> Uxlen {
        0
    }

    /// Exit code once the guest asked the host to stop.
    fn host_exit(&self) -> Option<u64> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum PrivilegeMode {
    User = 0,
    Supervisor = 1,
    Machine = 3,
}

/// Architectural state besides the integer registers: CSRs, the current
/// privilege mode and whether SV39 translation is switched on.
pub struct PlatformState {
    pub csr: Csr,
    pub mode: PrivilegeMode,
    paging: bool,
}

impl Default for PlatformState {
    fn default() -> Self {
        PlatformState {
            csr: Csr::new(),
            mode: PrivilegeMode::Machine,
            paging: false,
        }
    }
}

impl PlatformState {
    pub fn read_csr(&self, addr: u16) -> Uxlen {
        self.csr.read(addr)
    }

    pub fn write_csr(&mut self, addr: u16, value: Uxlen) {
        self.csr.write(addr, value);
        if addr & 0xfff == csr::SATP {
            self.paging = self.csr.read(csr::SATP) >> csr::SATP_MODE_SHIFT == csr::SATP_MODE_SV39;
        }
    }

    pub fn paging_enabled(&self) -> bool {
        self.paging
    }

    /// Whether an access in `mode` goes through the page tables.
    pub fn translation_active(&self, mode: PrivilegeMode) -> bool {
        self.paging && mode != PrivilegeMode::Machine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flat(Vec<u8>);

    impl Flat {
        fn at(&self, addr: Uxlen, width: usize) -> Result<usize, BusFault> {
            let start = addr as usize;
            if start + width <= self.0.len() {
                Ok(start)
            } else {
                Err(BusFault { addr })
            }
        }
    }

    impl AddressSpace for Flat {
        fn read_byte(&mut self, addr: Uxlen) -> Result<u8, BusFault> {
            Ok(self.0[self.at(addr, 1)?])
        }
        fn read_halfword(&mut self, addr: Uxlen) -> Result<u16, BusFault> {
            let i = self.at(addr, 2)?;
            Ok(u16::from_le_bytes([self.0[i], self.0[i + 1]]))
        }
        fn read_word(&mut self, addr: Uxlen) -> Result<u32, BusFault> {
            let i = self.at(addr, 4)?;
            let mut b = [0; 4];
            b.copy_from_slice(&self.0[i..i + 4]);
            Ok(u32::from_le_bytes(b))
        }
        fn read_doubleword(&mut self, addr: Uxlen) -> Result<u64, BusFault> {
            let i = self.at(addr, 8)?;
            let mut b = [0; 8];
            b.copy_from_slice(&self.0[i..i + 8]);
            Ok(u64::from_le_bytes(b))
        }
        fn write_byte(&mut self, addr: Uxlen, val: u8) -> Result<(), BusFault> {
            let i = self.at(addr, 1)?;
            self.0[i] = val;
            Ok(())
        }
        fn write_halfword(&mut self, addr: Uxlen, val: u16) -> Result<(), BusFault> {
            let i = self.at(addr, 2)?;
            self.0[i..i + 2].copy_from_slice(&val.to_le_bytes());
            Ok(())
        }
        fn write_word(&mut self, addr: Uxlen, val: u32) -> Result<(), BusFault> {
            let i = self.at(addr, 4)?;
            self.0[i..i + 4].copy_from_slice(&val.to_le_bytes());
            Ok(())
        }
        fn write_doubleword(&mut self, addr: Uxlen, val: u64) -> Result<(), BusFault> {
            let i = self.at(addr, 8)?;
            self.0[i..i + 8].copy_from_slice(&val.to_le_bytes());
            Ok(())
        }
    }

    #[test]
    fn sized_dispatch_is_little_endian() {
        let mut mem = Flat(vec![0; 16]);
        mem.write(0, 0x1122_3344_5566_7788, 64).unwrap();
        assert_eq!(mem.0[0], 0x88);
        assert_eq!(mem.read(0, 8).unwrap(), 0x88);
        assert_eq!(mem.read(0, 16).unwrap(), 0x7788);
        assert_eq!(mem.read(4, 32).unwrap(), 0x1122_3344);
        assert_eq!(mem.read(14, 32), Err(BusFault { addr: 14 }));
    }

    #[test]
    #[should_panic]
    fn odd_width_panics() {
        let mut mem = Flat(vec![0; 16]);
        let _ = mem.read(0, 24);
    }

    #[test]
    fn satp_write_switches_paging() {
        let mut state = PlatformState::default();
        assert!(!state.translation_active(PrivilegeMode::Supervisor));
        state.write_csr(csr::SATP, csr::SATP_MODE_SV39 << csr::SATP_MODE_SHIFT);
        assert!(state.paging_enabled());
        assert!(state.translation_active(PrivilegeMode::User));
        assert!(!state.translation_active(PrivilegeMode::Machine));
        state.write_csr(csr::SATP, 0);
        assert!(!state.paging_enabled());
    }
}
