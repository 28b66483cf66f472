//! Platform-Level Interrupt Controller.
//!
//! One hart with two contexts, machine (0) and supervisor (1). Sources are
//! level triggered: an asserted line becomes pending unless it is currently
//! claimed, and stays claimed until the handler writes the completion.
//!
//! # Memory Map
//!
//! * `0x000000 + 4 * id`: source priority
//! * `0x001000`: pending bits
//! * `0x002000 + 0x80 * ctx`: enable bits
//! * `0x200000 + 0x1000 * ctx`: threshold, claim/complete at `+4`

use crate::platform::csr::{MIP_MEIP, MIP_SEIP};
use crate::Uxlen;

/// Source 0 means "no interrupt", so ids go from 1 to `SOURCES - 1`.
pub const SOURCES: usize = 32;
pub const CONTEXTS: usize = 2;
/// Memory window size.
pub const SIZE: Uxlen = 0x40_0000;

/// Source id of the block device.
pub const BLOCK_DEVICE_IRQ: u32 = 1;

const PRIORITY_BASE: Uxlen = 0x00_0000;
const PENDING_BASE: Uxlen = 0x00_1000;
const ENABLE_BASE: Uxlen = 0x00_2000;
const ENABLE_STRIDE: Uxlen = 0x80;
const CONTEXT_BASE: Uxlen = 0x20_0000;
const CONTEXT_STRIDE: Uxlen = 0x1000;

#[derive(Debug, Default)]
pub struct Plic {
    priority: [u32; SOURCES],
    pending: u32,
    enable: [u32; CONTEXTS],
    threshold: [u32; CONTEXTS],
    /// Claimed and not yet completed.
    in_service: u32,
}

impl Plic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drives the interrupt line of `source`.
    pub fn set_level(&mut self, source: u32, asserted: bool) {
        let bit = 1 << source;
        if !asserted {
            self.pending &= !bit;
        } else if self.in_service & bit == 0 {
            self.pending |= bit;
        }
    }

    /// Highest priority pending and enabled source above the threshold of
    /// `context`. Ties go to the lower id, 0 if there is none.
    pub fn best(&self, context: usize) -> u32 {
        let eligible = self.pending & self.enable[context];
        let mut best = (0, 0);
        for id in 1..SOURCES as u32 {
            let priority = self.priority[id as usize];
            if eligible & (1 << id) != 0 && priority > self.threshold[context] && priority > best.1
            {
                best = (id, priority);
            }
        }
        best.0
    }

    pub fn claim(&mut self, context: usize) -> u32 {
        let id = self.best(context);
        if id != 0 {
            self.pending &= !(1 << id);
            self.in_service |= 1 << id;
        }
        id
    }

    pub fn complete(&mut self, id: u32) {
        if (id as usize) < SOURCES {
            self.in_service &= !(1 << id);
        }
    }

    /// External interrupt lines of the hart as `mip` bits.
    pub fn lines(&self) -> Uxlen {
        let mut mip = 0;
        if self.best(0) != 0 {
            mip |= MIP_MEIP;
        }
        if self.best(1) != 0 {
            mip |= MIP_SEIP;
        }
        mip
    }

    /// Splits a context register offset into context and register.
    fn context(offset: Uxlen) -> Option<(usize, Uxlen)> {
        let context = ((offset - CONTEXT_BASE) / CONTEXT_STRIDE) as usize;
        (context < CONTEXTS).then_some((context, offset % CONTEXT_STRIDE))
    }

    fn enable_context(offset: Uxlen) -> Option<usize> {
        let rel = offset - ENABLE_BASE;
        let context = (rel / ENABLE_STRIDE) as usize;
        (context < CONTEXTS && rel % ENABLE_STRIDE == 0).then_some(context)
    }

    pub fn read(&mut self, offset: Uxlen) -> u32 {
        match offset {
            PRIORITY_BASE..=0xffc if offset % 4 == 0 && ((offset / 4) as usize) < SOURCES => {
                self.priority[(offset / 4) as usize]
            }
            PENDING_BASE => self.pending,
            ENABLE_BASE.. if offset < CONTEXT_BASE => {
                Self::enable_context(offset).map_or(0, |ctx| self.enable[ctx])
            }
            CONTEXT_BASE.. => match Self::context(offset) {
                Some((ctx, 0)) => self.threshold[ctx],
                Some((ctx, 4)) => self.claim(ctx),
                _ => 0,
            },
            _ => 0,
        }
    }

    pub fn write(&mut self, offset: Uxlen, value: u32) {
        match offset {
            // Source 0 does not exist.
            PRIORITY_BASE..=0xffc
                if offset != 0 && offset % 4 == 0 && ((offset / 4) as usize) < SOURCES =>
            {
                self.priority[(offset / 4) as usize] = value
            }
            ENABLE_BASE.. if offset < CONTEXT_BASE => {
                if let Some(ctx) = Self::enable_context(offset) {
                    self.enable[ctx] = value & !1;
                }
            }
            CONTEXT_BASE.. => match Self::context(offset) {
                Some((ctx, 0)) => self.threshold[ctx] = value,
                Some((_, 4)) => self.complete(value),
                _ => {}
            },
            _ => {}
        }
    }
}
