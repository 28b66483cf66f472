//! The physical address space of the simulated machine.
//!
//! ```text
//! 0x0c00_0000  PLIC      (4 MiB)
//! 0x1000_0000  UART      (256 B)
//! 0x8000_0000  DRAM      (configurable, 128 MiB by default)
//! ```

use std::io;

use crate::devices::plic::{self, Plic};
use crate::devices::uart::{self, Uart};
use crate::platform::{AddressSpace, BusFault};
use crate::Uxlen;

const UART_SIZE: Uxlen = 0x100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemConfig {
    pub dram_base: Uxlen,
    pub dram_size: usize,
    pub uart_base: Uxlen,
    pub plic_base: Uxlen,
    /// Instruction budget of a run.
    pub max_instructions: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        SystemConfig {
            dram_base: 0x8000_0000,
            dram_size: 128 << 20,
            uart_base: 0x1000_0000,
            plic_base: 0x0c00_0000,
            max_instructions: 100_000_000,
        }
    }
}

enum Target {
    Dram(usize),
    Uart(Uxlen),
    Plic(Uxlen),
}

pub struct SystemBus {
    dram: Box<[u8]>,
    dram_base: Uxlen,
    uart_base: Uxlen,
    plic_base: Uxlen,
    pub uart: Uart,
    pub plic: Plic,
    /// Writes here end the simulation, see [`SystemBus::set_tohost`].
    tohost: Option<Uxlen>,
    exit_code: Option<u64>,
}

impl SystemBus {
    /// A bus with zeroed memory and the UART writing to stdout.
    pub fn new(config: SystemConfig) -> Self {
        Self::with_uart(config, Uart::new(Box::new(io::stdout())))
    }

    pub fn with_uart(config: SystemConfig, uart: Uart) -> Self {
        SystemBus {
            // Cannot use `Box::new([0u8; N])` as this creates the data on the stack first.
            dram: vec![0u8; config.dram_size].into_boxed_slice(),
            dram_base: config.dram_base,
            uart_base: config.uart_base,
            plic_base: config.plic_base,
            uart,
            plic: Plic::new(),
            tohost: None,
            exit_code: None,
        }
    }

    /// Watches `addr` for the riscv-tests host interface: a non zero value
    /// written there stops the run with exit code `value >> 1`.
    pub fn set_tohost(&mut self, addr: Option<Uxlen>) {
        self.tohost = addr;
    }

    /// Mutable view of `len` bytes of DRAM at physical address `addr`.
    pub fn dram_mut(&mut self, addr: Uxlen, len: usize) -> Result<&mut [u8], BusFault> {
        let start = self.dram_offset(addr, len).ok_or(BusFault { addr })?;
        Ok(&mut self.dram[start..start + len])
    }

    fn dram_offset(&self, addr: Uxlen, len: usize) -> Option<usize> {
        let offset = usize::try_from(addr.checked_sub(self.dram_base)?).ok()?;
        (offset.checked_add(len)? <= self.dram.len()).then_some(offset)
    }

    fn target(&self, addr: Uxlen, width: usize) -> Result<Target, BusFault> {
        if let Some(offset) = self.dram_offset(addr, width) {
            return Ok(Target::Dram(offset));
        }
        let within = |base: Uxlen, size: Uxlen| {
            addr.checked_sub(base).filter(|offset| {
                offset
                    .checked_add(width as Uxlen)
                    .map_or(false, |end| end <= size)
            })
        };
        if let Some(offset) = within(self.uart_base, UART_SIZE) {
            return Ok(Target::Uart(offset));
        }
        if let Some(offset) = within(self.plic_base, plic::SIZE) {
            return Ok(Target::Plic(offset));
        }
        Err(BusFault { addr })
    }

    fn read_le<const N: usize>(&mut self, addr: Uxlen) -> Result<[u8; N], BusFault> {
        match self.target(addr, N)? {
            Target::Dram(offset) => {
                let mut bytes = [0; N];
                bytes.copy_from_slice(&self.dram[offset..offset + N]);
                Ok(bytes)
            }
            Target::Uart(offset) => {
                let mut bytes = [0; N];
                bytes[0] = self.uart.read(offset);
                Ok(bytes)
            }
            // The PLIC only has 32 bit registers.
            Target::Plic(offset) if N == 4 => {
                let mut bytes = [0; N];
                bytes.copy_from_slice(&self.plic.read(offset).to_le_bytes()[..N]);
                Ok(bytes)
            }
            Target::Plic(_) => Err(BusFault { addr }),
        }
    }

    fn write_le<const N: usize>(&mut self, addr: Uxlen, bytes: [u8; N]) -> Result<(), BusFault> {
        let target = self.target(addr, N)?;
        if self.tohost == Some(addr) {
            let mut value = [0; 8];
            value[..N].copy_from_slice(&bytes);
            let value = u64::from_le_bytes(value);
            if value != 0 {
                log::debug!("tohost = {value:#x}");
                self.exit_code = Some(value >> 1);
            }
        }
        match target {
            Target::Dram(offset) => self.dram[offset..offset + N].copy_from_slice(&bytes),
            Target::Uart(offset) => self.uart.write(offset, bytes[0]),
            Target::Plic(offset) if N == 4 => {
                let mut word = [0; 4];
                word.copy_from_slice(&bytes[..4]);
                self.plic.write(offset, u32::from_le_bytes(word))
            }
            Target::Plic(_) => return Err(BusFault { addr }),
        }
        Ok(())
    }
}

impl AddressSpace for SystemBus {
    fn read_byte(&mut self, addr: Uxlen) -> Result<u8, BusFault> {
        Ok(u8::from_le_bytes(self.read_le(addr)?))
    }

    fn read_halfword(&mut self, addr: Uxlen) -> Result<u16, BusFault> {
        Ok(u16::from_le_bytes(self.read_le(addr)?))
    }

    fn read_word(&mut self, addr: Uxlen) -> Result<u32, BusFault> {
        Ok(u32::from_le_bytes(self.read_le(addr)?))
    }

    fn read_doubleword(&mut self, addr: Uxlen) -> Result<u64, BusFault> {
        Ok(u64::from_le_bytes(self.read_le(addr)?))
    }

    fn write_byte(&mut self, addr: Uxlen, val: u8) -> Result<(), BusFault> {
        self.write_le(addr, val.to_le_bytes())
    }

    fn write_halfword(&mut self, addr: Uxlen, val: u16) -> Result<(), BusFault> {
        self.write_le(addr, val.to_le_bytes())
    }

    fn write_word(&mut self, addr: Uxlen, val: u32) -> Result<(), BusFault> {
        self.write_le(addr, val.to_le_bytes())
    }

    fn write_doubleword(&mut self, addr: Uxlen, val: u64) -> Result<(), BusFault> {
        self.write_le(addr, val.to_le_bytes())
    }

    fn external_interrupts(&mut self) -> Uxlen {
        let level = self.uart.interrupt_pending();
        self.plic.set_level(uart::IRQ, level);
        self.plic.lines()
    }

    fn host_exit(&self) -> Option<u64> {
        self.exit_code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::csr::MIP_SEIP;

    fn small() -> SystemBus {
        SystemBus::with_uart(
            SystemConfig {
                dram_size: 0x1000,
                ..SystemConfig::default()
            },
            Uart::new(Box::new(io::sink())),
        )
    }

    #[test]
    fn mem_test() {
        let mut bus = small();
        bus.write_word(0x8000_0000, 0x12_34_56_78)
            .expect("Write bound check failed");
        assert_eq!(bus.dram[0..4], [0x78, 0x56, 0x34, 0x12]);
        assert_eq!(
            bus.read_word(0x8000_0000).expect("Read bounds check failed"),
            0x12_34_56_78
        );
        assert_eq!(bus.read_halfword(0x8000_0001).unwrap(), 0x3456);
    }

    #[test]
    fn bounds() {
        let mut bus = small();
        assert!(bus.read_doubleword(0x8000_0ff8).is_ok());
        assert_eq!(
            bus.read_doubleword(0x8000_0ffc),
            Err(BusFault { addr: 0x8000_0ffc })
        );
        assert!(bus.write_byte(0x7fff_ffff, 0).is_err());
        assert!(bus.read_byte(u64::MAX).is_err());
        assert!(bus.dram_mut(0x8000_0f00, 0x200).is_err());
    }

    #[test]
    fn tohost_exit_code() {
        let mut bus = small();
        bus.set_tohost(Some(0x8000_0800));
        bus.write_doubleword(0x8000_0800, 0).unwrap();
        assert_eq!(bus.host_exit(), None);
        bus.write_doubleword(0x8000_0800, 1).unwrap();
        assert_eq!(bus.host_exit(), Some(0));
        bus.write_word(0x8000_0800, (3 << 1) | 1).unwrap();
        assert_eq!(bus.host_exit(), Some(3));
    }

    #[test]
    fn uart_interrupt_reaches_the_hart_lines() {
        let mut bus = small();
        // priority 1 for the UART, enabled for the supervisor context
        bus.write_word(0x0c00_0000 + 4 * uart::IRQ as Uxlen, 1).unwrap();
        bus.write_word(0x0c00_2080, 1 << uart::IRQ).unwrap();
        bus.write_byte(0x1000_0001, 1).unwrap();
        assert_eq!(bus.external_interrupts(), 0);

        bus.uart.input().lock().unwrap().push_back(b'x');
        assert_eq!(bus.external_interrupts(), MIP_SEIP);
        assert_eq!(bus.read_word(0x0c20_1004).unwrap(), uart::IRQ);
        assert_eq!(bus.read_byte(0x1000_0000).unwrap(), b'x');
        bus.write_word(0x0c20_1004, uart::IRQ).unwrap();
        assert_eq!(bus.external_interrupts(), 0);
    }

    #[test]
    fn plic_rejects_narrow_access() {
        let mut bus = small();
        assert!(bus.read_byte(0x0c00_0004).is_err());
    }
}
