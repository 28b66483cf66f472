//! 16550 compatible UART, the subset a console driver needs.
//!
//! Received bytes are queued in a buffer shared with whoever produces them,
//! usually a thread reading the host's stdin. Transmitted bytes go straight to
//! an output sink.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use crate::Uxlen;

/// PLIC source the UART is wired to.
pub const IRQ: u32 = 10;

// Register offsets
const RBR_THR: Uxlen = 0;
const IER: Uxlen = 1;
const IIR_FCR: Uxlen = 2;
const LCR: Uxlen = 3;
const MCR: Uxlen = 4;
const LSR: Uxlen = 5;
const MSR: Uxlen = 6;
const SCR: Uxlen = 7;

const IER_RX_AVAILABLE: u8 = 0x01;
const IER_MASK: u8 = 0x0f;

const IIR_NONE: u8 = 0x01;
const IIR_RX_AVAILABLE: u8 = 0x04;
const IIR_FIFO_ENABLED: u8 = 0xc0;

const LCR_DLAB: u8 = 0x80;

const LSR_DATA_READY: u8 = 0x01;
/// THR and transmitter empty, output never blocks.
const LSR_TX_IDLE: u8 = 0x60;

pub type InputBuffer = Arc<Mutex<VecDeque<u8>>>;

pub struct Uart {
    input: InputBuffer,
    output: Box<dyn Write + Send>,
    ier: u8,
    lcr: u8,
    mcr: u8,
    scr: u8,
    divisor: u16,
}

impl Uart {
    pub fn new(output: Box<dyn Write + Send>) -> Self {
        Uart {
            input: Arc::default(),
            output,
            ier: 0,
            lcr: 0,
            mcr: 0,
            scr: 0,
            divisor: 0,
        }
    }

    /// Handle to the receive buffer, bytes pushed to it arrive at RBR.
    pub fn input(&self) -> InputBuffer {
        Arc::clone(&self.input)
    }

    /// Forwards the host's stdin to the receive buffer until it closes.
    pub fn spawn_stdin_reader(&self) -> thread::JoinHandle<()> {
        let input = self.input();
        thread::spawn(move || {
            let mut byte = [0u8; 1];
            let mut stdin = io::stdin().lock();
            while stdin.read_exact(&mut byte).is_ok() {
                lock(&input).push_back(byte[0]);
            }
            log::debug!("stdin closed");
        })
    }

    fn dlab(&self) -> bool {
        self.lcr & LCR_DLAB != 0
    }

    fn data_ready(&self) -> bool {
        !lock(&self.input).is_empty()
    }

    /// Level of the interrupt line: receive interrupts enabled and data queued.
    pub fn interrupt_pending(&self) -> bool {
        self.ier & IER_RX_AVAILABLE != 0 && self.data_ready()
    }

    /// Output is line buffered.
    fn transmit(&mut self, value: u8) -> io::Result<()> {
        self.output.write_all(&[value])?;
        if value == b'\n' {
            self.output.flush()?;
        }
        Ok(())
    }

    pub fn read(&mut self, offset: Uxlen) -> u8 {
        match offset {
            RBR_THR if self.dlab() => self.divisor as u8,
            RBR_THR => lock(&self.input).pop_front().unwrap_or(0),
            IER if self.dlab() => (self.divisor >> 8) as u8,
            IER => self.ier,
            IIR_FCR => {
                let id = if self.interrupt_pending() {
                    IIR_RX_AVAILABLE
                } else {
                    IIR_NONE
                };
                IIR_FIFO_ENABLED | id
            }
            LCR => self.lcr,
            MCR => self.mcr,
            LSR => {
                if self.data_ready() {
                    LSR_TX_IDLE | LSR_DATA_READY
                } else {
                    LSR_TX_IDLE
                }
            }
            MSR => 0,
            SCR => self.scr,
            _ => 0,
        }
    }

    pub fn write(&mut self, offset: Uxlen, value: u8) {
        match offset {
            RBR_THR if self.dlab() => self.divisor = (self.divisor & 0xff00) | value as u16,
            RBR_THR => {
                if let Err(e) = self.transmit(value) {
                    log::warn!("UART output failed: {e}");
                }
            }
            IER if self.dlab() => {
                self.divisor = (self.divisor & 0x00ff) | (value as u16) << 8
            }
            IER => self.ier = value & IER_MASK,
            // FIFOs are always on
            IIR_FCR => {}
            LCR => self.lcr = value,
            MCR => self.mcr = value,
            SCR => self.scr = value,
            _ => {}
        }
    }
}

impl Drop for Uart {
    fn drop(&mut self) {
        let _ = self.output.flush();
    }
}

/// The buffer holds plain bytes, a panicking producer cannot leave it torn.
fn lock(buffer: &InputBuffer) -> MutexGuard<'_, VecDeque<u8>> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}
