//! Exceptions and interrupts.
//!
//! An exception causes a trap which is either run in a more privileged mode
//! (vertical trap) or at the same privilege mode (horizontal trap).
//! Faults are plain data: every fallible step returns `Result<_, Exception>`
//! and the hart dispatches the `Err` side.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::Uxlen;

/// Exception codes as written to `mcause`/`scause` (interrupt bit clear).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u64)]
pub enum SynchronousCause {
    InstructionAddressMisaligned = 0,
    InstructionAccessFault = 1,
    IllegalInstruction = 2,
    Breakpoint = 3,
    LoadAddressMisaligned = 4,
    LoadAccessFault = 5,
    StoreAMOAddressMisaligned = 6,
    StoreAMOAccessFault = 7,
    EnvironmentCallFromUMode = 8,
    EnvironmentCallFromSMode = 9,
    EnvironmentCallFromMMode = 11,
    InstructionPageFault = 12,
    LoadPageFault = 13,
    StoreAMOPageFault = 15,
}

/// Interrupt codes, also the bit positions in `mip`/`mie`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u64)]
pub enum InterruptCause {
    SupervisorSoftware = 1,
    MachineSoftware = 3,
    SupervisorTimer = 5,
    MachineTimer = 7,
    SupervisorExternal = 9,
    MachineExternal = 11,
}

impl InterruptCause {
    /// Order in which simultaneously pending interrupts are taken.
    pub const PRIORITY: [InterruptCause; 6] = [
        InterruptCause::MachineExternal,
        InterruptCause::MachineSoftware,
        InterruptCause::MachineTimer,
        InterruptCause::SupervisorExternal,
        InterruptCause::SupervisorSoftware,
        InterruptCause::SupervisorTimer,
    ];

    pub fn mask(self) -> Uxlen {
        1 << u64::from(self)
    }
}

/// A synchronous exception together with its trap value (`xtval`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{cause:?} (tval = {tval:#x})")]
pub struct Exception {
    pub cause: SynchronousCause,
    pub tval: Uxlen,
}

impl Exception {
    pub fn new(cause: SynchronousCause, tval: Uxlen) -> Exception {
        Exception { cause, tval }
    }

    /// Illegal instruction, carrying the offending instruction bits.
    pub fn illegal(instruction: u32) -> Exception {
        Exception::new(SynchronousCause::IllegalInstruction, instruction as Uxlen)
    }
}

/// How the environment treats a trap, deciding whether simulation continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapDisposition {
    /// Visible to and handled by software running inside the environment.
    Contained,
    /// An explicit call into the execution environment.
    Requested,
    /// Handled transparently, e.g. demand paging.
    Invisible,
    /// Execution cannot meaningfully continue. No cause is fatal by itself,
    /// the hart marks a trap fatal when its handler cannot be fetched.
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    Exception(Exception),
    Interrupt(InterruptCause),
}

impl Trap {
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Trap::Interrupt(_))
    }

    /// Exception or interrupt code without the interrupt bit.
    pub fn code(&self) -> u64 {
        match self {
            Trap::Exception(e) => e.cause.into(),
            Trap::Interrupt(i) => (*i).into(),
        }
    }

    pub fn tval(&self) -> Uxlen {
        match self {
            Trap::Exception(e) => e.tval,
            Trap::Interrupt(_) => 0,
        }
    }

    pub fn disposition(&self) -> TrapDisposition {
        use SynchronousCause::*;
        match self {
            Trap::Interrupt(_) => TrapDisposition::Contained,
            Trap::Exception(e) => match e.cause {
                InstructionAddressMisaligned
                | InstructionAccessFault
                | IllegalInstruction
                | LoadAddressMisaligned
                | LoadAccessFault
                | StoreAMOAddressMisaligned
                | StoreAMOAccessFault => TrapDisposition::Contained,
                Breakpoint
                | EnvironmentCallFromUMode
                | EnvironmentCallFromSMode
                | EnvironmentCallFromMMode => TrapDisposition::Requested,
                InstructionPageFault | LoadPageFault | StoreAMOPageFault => {
                    TrapDisposition::Invisible
                }
            },
        }
    }
}

impl From<Exception> for Trap {
    fn from(e: Exception) -> Trap {
        Trap::Exception(e)
    }
}
