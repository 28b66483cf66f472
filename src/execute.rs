use crate::bits::sign_extend;
use crate::compressed;
use crate::decode::{BType, Fields, IType, Instruction, JType, Operation, RType, SType, UType};
use crate::mmu::{self, AccessKind};
use crate::platform::csr;
use crate::platform::exception::{Exception, SynchronousCause, Trap, TrapDisposition};
use crate::platform::{AddressSpace, PlatformState, PrivilegeMode};
use crate::trap::TrapOutcome;
use crate::{Ixlen, Uxlen};

/// Hardware Thread
///
pub struct Hart<A: AddressSpace> {
    pub address_space: A,
    pub execution_env: PlatformState,

    pub reg_pc: Uxlen,
    /// x0 is always zero
    /// x1 is usually the return address
    /// x2 is usually the stack pointer
    /// # INVARIANT
    /// regs[0] is always zero!
    pub regs: [Uxlen; 32],

    /// Address of the instruction after the one being executed. Control
    /// transfers overwrite it, it becomes the PC once the instruction retires.
    pub(crate) next_pc: Uxlen,
    /// Address reserved by the last LR.
    pub(crate) reservation: Option<Uxlen>,
    /// A trap was taken and no instruction of its handler has retired yet.
    pub(crate) entering_handler: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxInstrReached,
    /// The guest wrote a non zero value to `tohost`.
    HostExit(u64),
    Fatal(Trap),
}

fn sext32(value: Uxlen) -> Uxlen {
    sign_extend(value & 0xffff_ffff, 32)
}

impl<A: AddressSpace> Hart<A> {
    /// A hart in machine mode, starting at `entry`.
    pub fn new(address_space: A, entry: Uxlen) -> Self {
        Hart {
            address_space,
            execution_env: PlatformState::default(),
            reg_pc: entry,
            regs: [0; 32],
            next_pc: entry,
            reservation: None,
            entering_handler: false,
        }
    }

    /// All register writes go through here to keep x0 hardwired to zero.
    fn write_reg(&mut self, reg: u8, value: Uxlen) {
        if reg != 0 {
            self.regs[reg as usize] = value;
        }
    }

    fn reg(&self, reg: u8) -> Uxlen {
        self.regs[reg as usize]
    }

    /// Runs until `max_instr` cycles passed, the guest exits or a fatal trap
    /// occurs.
    pub fn run(&mut self, max_instr: u64) -> StopReason {
        for _ in 0..max_instr {
            let outcome = self.step();
            if let Some(code) = self.address_space.host_exit() {
                log::debug!("Host exit with code {code}");
                return StopReason::HostExit(code);
            }
            if let Some(outcome) = outcome {
                if outcome.disposition == TrapDisposition::Fatal {
                    log::error!("Fatal {:?} at {:#x}", outcome.trap, outcome.epc);
                    return StopReason::Fatal(outcome.trap);
                }
            }
        }
        StopReason::MaxInstrReached
    }

    /// One cycle: take a pending interrupt or fetch, decode and execute one
    /// instruction.
    ///
    /// The PC is only advanced if the instruction completes. On an exception it
    /// still points at the faulting instruction, which is recorded as `xepc`.
    /// A fault while fetching the first instruction of a handler is fatal.
    pub fn step(&mut self) -> Option<TrapOutcome> {
        let lines = self.address_space.external_interrupts();
        self.execution_env.csr.set_external_interrupts(lines);
        self.execution_env.csr.increment_tick();

        if let Some(interrupt) = self.pending_interrupt() {
            return Some(self.take_trap(Trap::Interrupt(interrupt)));
        }

        let (result, fetch_failed) = match self.fetch() {
            Ok((instr, width)) => {
                log::trace!("{:#010x}: {:08x} {:?}", self.reg_pc, instr.raw, instr.op);
                (self.execute(&instr, width), false)
            }
            Err(exception) => (Err(exception), true),
        };
        match result {
            Ok(()) => {
                self.reg_pc = self.next_pc;
                self.entering_handler = false;
                None
            }
            Err(exception) => {
                // The handler cannot even be fetched, taking the trap again would
                // spin on the same address.
                let handler_unreachable = fetch_failed && self.entering_handler;
                let mut outcome = self.take_trap(exception.into());
                if handler_unreachable {
                    outcome.disposition = TrapDisposition::Fatal;
                }
                Some(outcome)
            }
        }
    }

    fn fetch_parcel(&mut self, va: Uxlen) -> Result<u16, Exception> {
        let pa = mmu::translate(
            &self.execution_env,
            &mut self.address_space,
            va,
            AccessKind::Fetch,
        )?;
        self.address_space
            .read_halfword(pa)
            .map_err(|_| Exception::new(SynchronousCause::InstructionAccessFault, va))
    }

    /// Fetches the instruction at the PC in 16 bit parcels, each translated
    /// on its own, so a 32 bit instruction may straddle a page boundary.
    ///
    /// Returns the decoded instruction and its length in bytes. Compressed
    /// instructions are expanded; an unknown one is illegal with the parcel as
    /// trap value.
    pub fn fetch(&mut self) -> Result<(Instruction, Uxlen), Exception> {
        let pc = self.reg_pc;
        if pc & 1 != 0 {
            return Err(Exception::new(
                SynchronousCause::InstructionAddressMisaligned,
                pc,
            ));
        }
        let low = self.fetch_parcel(pc)?;
        if compressed::is_compressed(low as u32) {
            let raw = compressed::expand(low).ok_or(Exception::illegal(low as u32))?;
            return Ok((Instruction::decode(raw), 2));
        }
        let high = self.fetch_parcel(pc.wrapping_add(2))?;
        Ok((Instruction::decode(low as u32 | (high as u32) << 16), 4))
    }

    /// Applies a decoded instruction of `width` bytes to the architectural state.
    ///
    /// Backed by `execute_x` functions per instruction format.
    pub fn execute(&mut self, instr: &Instruction, width: Uxlen) -> Result<(), Exception> {
        self.next_pc = self.reg_pc.wrapping_add(width);
        if instr.op == Operation::Invalid {
            return Err(Exception::illegal(instr.raw));
        }
        match instr.fields {
            Fields::R(r) => self.execute_r(instr.op, r, instr.raw),
            Fields::I(i) => self.execute_i(instr.op, i, instr.raw),
            Fields::S(s) => self.execute_s(instr.op, s, instr.raw),
            Fields::B(b) => self.execute_b(instr.op, b, instr.raw),
            Fields::U(u) => self.execute_u(instr.op, u, instr.raw),
            Fields::J(j) => self.execute_j(instr.op, j, instr.raw),
        }
    }

    fn execute_r(&mut self, op: Operation, instr: RType, raw: u32) -> Result<(), Exception> {
        use Operation::*;
        let a = self.reg(instr.rs1);
        let b = self.reg(instr.rs2);
        let value = match op {
            Add => a.wrapping_add(b),
            Sub => a.wrapping_sub(b),
            Sll => a << (b & 0x3f),
            Slt => ((a as Ixlen) < (b as Ixlen)) as Uxlen,
            Sltu => (a < b) as Uxlen,
            Xor => a ^ b,
            Srl => a >> (b & 0x3f),
            Sra => ((a as Ixlen) >> (b & 0x3f)) as Uxlen,
            Or => a | b,
            And => a & b,

            Addw => sext32(a.wrapping_add(b)),
            Subw => sext32(a.wrapping_sub(b)),
            Sllw => sext32(((a as u32) << (b & 0x1f)) as Uxlen),
            Srlw => sext32(((a as u32) >> (b & 0x1f)) as Uxlen),
            Sraw => ((a as i32) >> (b & 0x1f)) as Ixlen as Uxlen,

            Mul => a.wrapping_mul(b),
            Mulh => ((a as Ixlen as i128 * b as Ixlen as i128) >> 64) as Uxlen,
            Mulhsu => ((a as Ixlen as i128 * b as i128) >> 64) as Uxlen,
            Mulhu => ((a as u128 * b as u128) >> 64) as Uxlen,
            Div => execute_div(a as Ixlen, b as Ixlen) as Uxlen,
            Divu => a.checked_div(b).unwrap_or(Uxlen::MAX),
            Rem => execute_rem(a as Ixlen, b as Ixlen) as Uxlen,
            Remu => a.checked_rem(b).unwrap_or(a),
            Mulw => sext32((a as u32).wrapping_mul(b as u32) as Uxlen),
            Divw => execute_div(a as i32 as Ixlen, b as i32 as Ixlen) as i32 as Ixlen as Uxlen,
            Divuw => sext32((a as u32).checked_div(b as u32).unwrap_or(u32::MAX) as Uxlen),
            Remw => execute_rem(a as i32 as Ixlen, b as i32 as Ixlen) as i32 as Ixlen as Uxlen,
            Remuw => sext32((a as u32).checked_rem(b as u32).unwrap_or(a as u32) as Uxlen),

            LrW | ScW | AmoswapW | AmoaddW | AmoxorW | AmoandW | AmoorW | AmominW | AmomaxW
            | AmominuW | AmomaxuW => return self.execute_amo(op, instr, 32),
            LrD | ScD | AmoswapD | AmoaddD | AmoxorD | AmoandD | AmoorD | AmominD | AmomaxD
            | AmominuD | AmomaxuD => return self.execute_amo(op, instr, 64),
            _ => return Err(Exception::illegal(raw)),
        };
        self.write_reg(instr.rd, value);
        Ok(())
    }

    fn execute_i(&mut self, op: Operation, instr: IType, raw: u32) -> Result<(), Exception> {
        use Operation::*;
        let a = self.reg(instr.rs1);
        let imm = instr.imm;
        let value = match op {
            Addi => a.wrapping_add(imm),
            Slti => ((a as Ixlen) < (imm as Ixlen)) as Uxlen,
            Sltiu => (a < imm) as Uxlen,
            Xori => a ^ imm,
            Ori => a | imm,
            Andi => a & imm,
            Slli => a << (imm & 0x3f),
            Srli => a >> (imm & 0x3f),
            Srai => ((a as Ixlen) >> (imm & 0x3f)) as Uxlen,
            Addiw => sext32(a.wrapping_add(imm)),
            Slliw => sext32(((a as u32) << (imm & 0x1f)) as Uxlen),
            Srliw => sext32(((a as u32) >> (imm & 0x1f)) as Uxlen),
            Sraiw => ((a as i32) >> (imm & 0x1f)) as Ixlen as Uxlen,

            Lb => sign_extend(self.load(a.wrapping_add(imm), 8)?, 8),
            Lh => sign_extend(self.load(a.wrapping_add(imm), 16)?, 16),
            Lw => sign_extend(self.load(a.wrapping_add(imm), 32)?, 32),
            Ld => self.load(a.wrapping_add(imm), 64)?,
            Lbu => self.load(a.wrapping_add(imm), 8)?,
            Lhu => self.load(a.wrapping_add(imm), 16)?,
            Lwu => self.load(a.wrapping_add(imm), 32)?,

            Jalr => {
                let link = self.next_pc;
                self.next_pc = a.wrapping_add(imm) & !1;
                link
            }

            Csrrw | Csrrs | Csrrc | Csrrwi | Csrrsi | Csrrci => {
                return self.execute_csr(op, instr, raw)
            }

            // Memory is coherent and there is no instruction cache.
            Fence | FenceI => return Ok(()),
            Wfi => return Ok(()),
            Ecall => {
                let cause = match self.execution_env.mode {
                    PrivilegeMode::User => SynchronousCause::EnvironmentCallFromUMode,
                    PrivilegeMode::Supervisor => SynchronousCause::EnvironmentCallFromSMode,
                    PrivilegeMode::Machine => SynchronousCause::EnvironmentCallFromMMode,
                };
                return Err(Exception::new(cause, 0));
            }
            Ebreak => {
                return Err(Exception::new(SynchronousCause::Breakpoint, self.reg_pc))
            }
            Mret => return self.execute_mret(raw),
            Sret => return self.execute_sret(raw),
            SfenceVma => {
                let mode = self.execution_env.mode;
                let tvm = self.execution_env.read_csr(csr::MSTATUS) & csr::MSTATUS_TVM != 0;
                if mode == PrivilegeMode::User || (mode == PrivilegeMode::Supervisor && tvm) {
                    return Err(Exception::illegal(raw));
                }
                // Nothing is cached, every access walks the tables.
                return Ok(());
            }
            _ => return Err(Exception::illegal(raw)),
        };
        self.write_reg(instr.rd, value);
        Ok(())
    }

    fn execute_s(&mut self, op: Operation, instr: SType, raw: u32) -> Result<(), Exception> {
        let addr = self.reg(instr.rs1).wrapping_add(instr.imm);
        let value = self.reg(instr.rs2);
        let size = match op {
            Operation::Sb => 8,
            Operation::Sh => 16,
            Operation::Sw => 32,
            Operation::Sd => 64,
            _ => return Err(Exception::illegal(raw)),
        };
        self.store(addr, value, size)
    }

    fn execute_b(&mut self, op: Operation, instr: BType, raw: u32) -> Result<(), Exception> {
        let a = self.reg(instr.rs1);
        let b = self.reg(instr.rs2);
        let taken = match op {
            Operation::Beq => a == b,
            Operation::Bne => a != b,
            Operation::Blt => (a as Ixlen) < (b as Ixlen),
            Operation::Bge => (a as Ixlen) >= (b as Ixlen),
            Operation::Bltu => a < b,
            Operation::Bgeu => a >= b,
            _ => return Err(Exception::illegal(raw)),
        };
        if taken {
            self.next_pc = self.reg_pc.wrapping_add(instr.imm);
        }
        Ok(())
    }

    fn execute_u(&mut self, op: Operation, instr: UType, raw: u32) -> Result<(), Exception> {
        let value = match op {
            Operation::Lui => instr.imm,
            Operation::Auipc => self.reg_pc.wrapping_add(instr.imm),
            _ => return Err(Exception::illegal(raw)),
        };
        self.write_reg(instr.rd, value);
        Ok(())
    }

    fn execute_j(&mut self, op: Operation, instr: JType, raw: u32) -> Result<(), Exception> {
        if op != Operation::Jal {
            return Err(Exception::illegal(raw));
        }
        let link = self.next_pc;
        self.next_pc = self.reg_pc.wrapping_add(instr.imm);
        self.write_reg(instr.rd, link);
        Ok(())
    }

    /// Checks natural alignment and translates a data access.
    fn translate_data(&mut self, va: Uxlen, size: u32, kind: AccessKind) -> Result<Uxlen, Exception> {
        if va & (size as Uxlen / 8 - 1) != 0 {
            return Err(Exception::new(kind.misaligned(), va));
        }
        mmu::translate(&self.execution_env, &mut self.address_space, va, kind)
    }

    /// Reads `size` bits at virtual address `va`, zero extended.
    fn load(&mut self, va: Uxlen, size: u32) -> Result<Uxlen, Exception> {
        let pa = self.translate_data(va, size, AccessKind::Load)?;
        self.address_space
            .read(pa, size)
            .map_err(|_| Exception::new(SynchronousCause::LoadAccessFault, va))
    }

    fn store(&mut self, va: Uxlen, value: Uxlen, size: u32) -> Result<(), Exception> {
        let pa = self.translate_data(va, size, AccessKind::Store)?;
        self.address_space
            .write(pa, value, size)
            .map_err(|_| Exception::new(SynchronousCause::StoreAMOAccessFault, va))
    }

    fn execute_amo(&mut self, op: Operation, instr: RType, size: u32) -> Result<(), Exception> {
        use Operation::*;
        let addr = self.reg(instr.rs1);
        let extend = |v: Uxlen| if size == 32 { sext32(v) } else { v };
        let src = extend(self.reg(instr.rs2));

        match op {
            LrW | LrD => {
                let value = extend(self.load(addr, size)?);
                self.reservation = Some(addr);
                self.write_reg(instr.rd, value);
                return Ok(());
            }
            ScW | ScD => {
                let pa = self.translate_data(addr, size, AccessKind::Store)?;
                let status = if self.reservation.take() == Some(addr) {
                    self.address_space
                        .write(pa, src, size)
                        .map_err(|_| Exception::new(SynchronousCause::StoreAMOAccessFault, addr))?;
                    0
                } else {
                    1
                };
                self.write_reg(instr.rd, status);
                return Ok(());
            }
            _ => {}
        }

        let pa = self.translate_data(addr, size, AccessKind::Store)?;
        let old = extend(
            self.address_space
                .read(pa, size)
                .map_err(|_| Exception::new(SynchronousCause::StoreAMOAccessFault, addr))?,
        );
        let new = match op {
            AmoswapW | AmoswapD => src,
            AmoaddW | AmoaddD => old.wrapping_add(src),
            AmoxorW | AmoxorD => old ^ src,
            AmoandW | AmoandD => old & src,
            AmoorW | AmoorD => old | src,
            AmominW | AmominD => (old as Ixlen).min(src as Ixlen) as Uxlen,
            AmomaxW | AmomaxD => (old as Ixlen).max(src as Ixlen) as Uxlen,
            // Sign extended operands keep the unsigned 32 bit order.
            AmominuW | AmominuD => old.min(src),
            AmomaxuW | AmomaxuD => old.max(src),
            _ => unreachable!("{op:?} is not an AMO"),
        };
        self.address_space
            .write(pa, new, size)
            .map_err(|_| Exception::new(SynchronousCause::StoreAMOAccessFault, addr))?;
        self.write_reg(instr.rd, old);
        Ok(())
    }

    /// CSRRW/CSRRS/CSRRC and their immediate forms.
    ///
    /// CSRRS/CSRRC with `rs1 = x0` (or a zero immediate) do not write, so they
    /// work on read-only registers. Reads have no side effects in this bank,
    /// so CSRRW with `rd = x0` reading anyway is not observable.
    fn execute_csr(&mut self, op: Operation, instr: IType, raw: u32) -> Result<(), Exception> {
        use Operation::*;
        let addr = instr.imm12();
        let operand = match op {
            Csrrw | Csrrs | Csrrc => self.reg(instr.rs1),
            _ => instr.rs1 as Uxlen,
        };
        let writes = matches!(op, Csrrw | Csrrwi) || instr.rs1 != 0;

        let mode = self.execution_env.mode;
        if !self.execution_env.csr.accessible(addr, mode, writes) {
            return Err(Exception::illegal(raw));
        }

        let old = self.execution_env.read_csr(addr);
        if writes {
            let new = match op {
                Csrrw | Csrrwi => operand,
                Csrrs | Csrrsi => old | operand,
                _ => old & !operand,
            };
            self.execution_env.write_csr(addr, new);
        }
        self.write_reg(instr.rd, old);
        Ok(())
    }
}

/// Signed division, rounding towards zero. x / 0 = -1, MIN / -1 = MIN.
fn execute_div(a: Ixlen, b: Ixlen) -> Ixlen {
    if b == 0 {
        -1
    } else {
        a.wrapping_div(b)
    }
}

/// Remainder with the sign of the dividend. x % 0 = x, MIN % -1 = 0.
fn execute_rem(a: Ixlen, b: Ixlen) -> Ixlen {
    if b == 0 {
        a
    } else {
        a.wrapping_rem(b)
    }
}
