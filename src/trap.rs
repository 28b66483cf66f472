//! Trap entry and return.
//!
//! Taking a trap selects the handling mode (delegation through `medeleg` /
//! `mideleg`), saves the cause, PC and trap value, pushes the interrupt enable
//! stack in `mstatus` and jumps to the handler. `MRET`/`SRET` pop the stack.

use crate::bits;
use crate::execute::Hart;
use crate::platform::csr::{self, MSTATUS_MPP_SHIFT};
use crate::platform::exception::{Exception, InterruptCause, Trap, TrapDisposition};
use crate::platform::{AddressSpace, PrivilegeMode};
use crate::Uxlen;

const INTERRUPT_BIT: Uxlen = 1 << 63;

/// Record of a trap the hart has taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrapOutcome {
    pub trap: Trap,
    pub epc: Uxlen,
    /// Mode the handler runs in.
    pub handler_mode: PrivilegeMode,
    pub disposition: TrapDisposition,
}

/// CSRs written when entering a handler in a given mode.
struct TrapCsrs {
    cause: u16,
    epc: u16,
    tval: u16,
    tvec: u16,
}

const MACHINE_CSRS: TrapCsrs = TrapCsrs {
    cause: csr::MCAUSE,
    epc: csr::MEPC,
    tval: csr::MTVAL,
    tvec: csr::MTVEC,
};

const SUPERVISOR_CSRS: TrapCsrs = TrapCsrs {
    cause: csr::SCAUSE,
    epc: csr::SEPC,
    tval: csr::STVAL,
    tvec: csr::STVEC,
};

impl<A: AddressSpace> Hart<A> {
    /// Redirects the hart to the handler for `trap`. The PC must still point
    /// at the interrupted or faulting instruction.
    pub fn take_trap(&mut self, trap: Trap) -> TrapOutcome {
        self.reservation = None;
        self.entering_handler = true;

        let env = &mut self.execution_env;
        let from = env.mode;
        let code = trap.code();
        let delegation = env.read_csr(if trap.is_interrupt() {
            csr::MIDELEG
        } else {
            csr::MEDELEG
        });
        let delegated = from <= PrivilegeMode::Supervisor && (delegation >> code) & 1 != 0;

        let (regs, target) = if delegated {
            (SUPERVISOR_CSRS, PrivilegeMode::Supervisor)
        } else {
            (MACHINE_CSRS, PrivilegeMode::Machine)
        };

        let cause = if trap.is_interrupt() {
            INTERRUPT_BIT | code
        } else {
            code
        };
        let epc = self.reg_pc;
        env.write_csr(regs.cause, cause);
        env.write_csr(regs.epc, epc);
        env.write_csr(regs.tval, trap.tval());

        let status = env.read_csr(csr::MSTATUS);
        let status = if delegated {
            let status = bits::set(status, 5, 5, bits::extract(status, 1, 1));
            let status = bits::clear(status, 1, 1);
            bits::set(status, 8, 8, u8::from(from) as Uxlen)
        } else {
            let status = bits::set(status, 7, 7, bits::extract(status, 3, 3));
            let status = bits::clear(status, 3, 3);
            bits::set(
                status,
                MSTATUS_MPP_SHIFT + 1,
                MSTATUS_MPP_SHIFT,
                u8::from(from) as Uxlen,
            )
        };
        env.write_csr(csr::MSTATUS, status);

        let tvec = env.read_csr(regs.tvec);
        let base = tvec & !0b11;
        let handler = if tvec & 0b11 == 1 && trap.is_interrupt() {
            base.wrapping_add(4 * code)
        } else {
            base
        };

        log::debug!(
            "Trap {trap:?} at {epc:#x}: {from:?} -> {target:?}, handler {handler:#x}"
        );
        env.mode = target;
        self.reg_pc = handler;

        TrapOutcome {
            trap,
            epc,
            handler_mode: target,
            disposition: trap.disposition(),
        }
    }

    /// Highest priority interrupt that is pending, enabled and not masked by
    /// the current mode.
    ///
    /// Non delegated interrupts are taken in machine mode, globally enabled by
    /// `mstatus.MIE` only while running in machine mode. Delegated ones are
    /// never taken in machine mode.
    pub fn pending_interrupt(&self) -> Option<InterruptCause> {
        let env = &self.execution_env;
        let pending = env.read_csr(csr::MIP) & env.read_csr(csr::MIE);
        if pending == 0 {
            return None;
        }
        let status = env.read_csr(csr::MSTATUS);
        let mideleg = env.read_csr(csr::MIDELEG);
        let machine_enabled =
            env.mode < PrivilegeMode::Machine || status & csr::MSTATUS_MIE != 0;
        let supervisor_enabled = env.mode < PrivilegeMode::Supervisor
            || (env.mode == PrivilegeMode::Supervisor && status & csr::MSTATUS_SIE != 0);

        InterruptCause::PRIORITY.into_iter().find(|cause| {
            let bit = cause.mask();
            pending & bit != 0
                && if mideleg & bit != 0 {
                    supervisor_enabled
                } else {
                    machine_enabled
                }
        })
    }

    pub(crate) fn execute_mret(&mut self, raw: u32) -> Result<(), Exception> {
        let env = &mut self.execution_env;
        if env.mode != PrivilegeMode::Machine {
            return Err(Exception::illegal(raw));
        }
        let status = env.read_csr(csr::MSTATUS);
        let previous = PrivilegeMode::try_from(
            bits::extract(status, MSTATUS_MPP_SHIFT + 1, MSTATUS_MPP_SHIFT) as u8,
        )
        .unwrap_or(PrivilegeMode::User);

        let mut status = bits::set(status, 3, 3, bits::extract(status, 7, 7));
        status |= csr::MSTATUS_MPIE;
        status &= !csr::MSTATUS_MPP;
        if previous != PrivilegeMode::Machine {
            status &= !csr::MSTATUS_MPRV;
        }
        env.write_csr(csr::MSTATUS, status);

        log::debug!("mret to {previous:?}");
        env.mode = previous;
        self.next_pc = env.read_csr(csr::MEPC);
        Ok(())
    }

    pub(crate) fn execute_sret(&mut self, raw: u32) -> Result<(), Exception> {
        let env = &mut self.execution_env;
        let status = env.read_csr(csr::MSTATUS);
        let tsr = status & csr::MSTATUS_TSR != 0;
        match env.mode {
            PrivilegeMode::User => return Err(Exception::illegal(raw)),
            PrivilegeMode::Supervisor if tsr => return Err(Exception::illegal(raw)),
            _ => {}
        }
        let previous = if status & csr::MSTATUS_SPP != 0 {
            PrivilegeMode::Supervisor
        } else {
            PrivilegeMode::User
        };

        let mut status = bits::set(status, 1, 1, bits::extract(status, 5, 5));
        status |= csr::MSTATUS_SPIE;
        status &= !(csr::MSTATUS_SPP | csr::MSTATUS_MPRV);
        env.write_csr(csr::MSTATUS, status);

        log::debug!("sret to {previous:?}");
        env.mode = previous;
        self.next_pc = env.read_csr(csr::SEPC);
        Ok(())
    }
}
