//! SV39 address translation.
//!
//! Every access walks the tables from `satp` again, there is no TLB. Accessed
//! and dirty bits are maintained by the walker and written back to memory.

use crate::bits;
use crate::platform::csr::{self, SATP_PPN_MASK};
use crate::platform::exception::{Exception, SynchronousCause};
use crate::platform::{AddressSpace, PlatformState, PrivilegeMode};
use crate::Uxlen;

pub const PAGE_SHIFT: u32 = 12;
const LEVELS: u32 = 3;
const VPN_BITS: u32 = 9;
const PTE_SIZE: Uxlen = 8;

const PTE_V: Uxlen = 1 << 0;
const PTE_R: Uxlen = 1 << 1;
const PTE_W: Uxlen = 1 << 2;
const PTE_X: Uxlen = 1 << 3;
const PTE_U: Uxlen = 1 << 4;
const PTE_A: Uxlen = 1 << 6;
const PTE_D: Uxlen = 1 << 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Fetch,
    Load,
    Store,
}

impl AccessKind {
    pub fn page_fault(self) -> SynchronousCause {
        match self {
            AccessKind::Fetch => SynchronousCause::InstructionPageFault,
            AccessKind::Load => SynchronousCause::LoadPageFault,
            AccessKind::Store => SynchronousCause::StoreAMOPageFault,
        }
    }

    pub fn access_fault(self) -> SynchronousCause {
        match self {
            AccessKind::Fetch => SynchronousCause::InstructionAccessFault,
            AccessKind::Load => SynchronousCause::LoadAccessFault,
            AccessKind::Store => SynchronousCause::StoreAMOAccessFault,
        }
    }

    pub fn misaligned(self) -> SynchronousCause {
        match self {
            AccessKind::Fetch => SynchronousCause::InstructionAddressMisaligned,
            AccessKind::Load => SynchronousCause::LoadAddressMisaligned,
            AccessKind::Store => SynchronousCause::StoreAMOAddressMisaligned,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PageTableEntry(Uxlen);

impl PageTableEntry {
    fn is(&self, flag: Uxlen) -> bool {
        self.0 & flag != 0
    }

    /// V=1, bits 63:54 clear and not the reserved W-without-R combination.
    fn is_valid(&self) -> bool {
        self.is(PTE_V) && self.0 >> 54 == 0 && !(self.is(PTE_W) && !self.is(PTE_R))
    }

    fn is_leaf(&self) -> bool {
        self.is(PTE_R) || self.is(PTE_X)
    }

    fn ppn(&self) -> Uxlen {
        bits::extract(self.0, 53, 10)
    }
}

fn vpn(va: Uxlen, level: u32) -> Uxlen {
    bits::extract(va, PAGE_SHIFT + VPN_BITS * level + VPN_BITS - 1, PAGE_SHIFT + VPN_BITS * level)
}

/// Bits 63:39 must all equal bit 38.
fn is_canonical(va: Uxlen) -> bool {
    let upper = (va as i64) >> 38;
    upper == 0 || upper == -1
}

fn permitted(pte: PageTableEntry, kind: AccessKind, mode: PrivilegeMode, status: Uxlen) -> bool {
    let kind_ok = match kind {
        AccessKind::Fetch => pte.is(PTE_X),
        AccessKind::Load => pte.is(PTE_R) || (pte.is(PTE_X) && status & csr::MSTATUS_MXR != 0),
        AccessKind::Store => pte.is(PTE_W),
    };
    let mode_ok = match mode {
        PrivilegeMode::User => pte.is(PTE_U),
        PrivilegeMode::Supervisor => {
            !pte.is(PTE_U) || (kind != AccessKind::Fetch && status & csr::MSTATUS_SUM != 0)
        }
        PrivilegeMode::Machine => true,
    };
    kind_ok && mode_ok
}

/// Translates `va` for an access of `kind` in the current privilege mode.
///
/// Identity when running in machine mode or with `satp.MODE = Bare`.
pub fn translate<A: AddressSpace + ?Sized>(
    state: &PlatformState,
    bus: &mut A,
    va: Uxlen,
    kind: AccessKind,
) -> Result<Uxlen, Exception> {
    if !state.translation_active(state.mode) {
        return Ok(va);
    }
    let page_fault = || Exception::new(kind.page_fault(), va);
    if !is_canonical(va) {
        return Err(page_fault());
    }

    let mut table = (state.read_csr(csr::SATP) & SATP_PPN_MASK) << PAGE_SHIFT;
    let mut level = LEVELS;
    let (pte, pte_addr) = loop {
        if level == 0 {
            return Err(page_fault());
        }
        level -= 1;
        let pte_addr = table + vpn(va, level) * PTE_SIZE;
        let pte = PageTableEntry(
            bus.read_doubleword(pte_addr)
                .map_err(|_| Exception::new(kind.access_fault(), va))?,
        );
        if !pte.is_valid() {
            log::trace!("Invalid pte {:#x} at level {level} for {va:#x}", pte.0);
            return Err(page_fault());
        }
        if pte.is_leaf() {
            break (pte, pte_addr);
        }
        table = pte.ppn() << PAGE_SHIFT;
    };

    if !permitted(pte, kind, state.mode, state.read_csr(csr::MSTATUS)) {
        return Err(page_fault());
    }
    // A superpage must be aligned to its own size.
    if pte.ppn() & bits::mask(VPN_BITS * level) != 0 {
        return Err(page_fault());
    }

    let mut updated = pte.0 | PTE_A;
    if kind == AccessKind::Store {
        updated |= PTE_D;
    }
    if updated != pte.0 {
        bus.write_doubleword(pte_addr, updated)
            .map_err(|_| Exception::new(kind.access_fault(), va))?;
    }

    let offset_bits = PAGE_SHIFT + VPN_BITS * level;
    let pa = (pte.ppn() << PAGE_SHIFT) & !bits::mask(offset_bits) | bits::extract(va, offset_bits - 1, 0);
    Ok(pa)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{SystemBus, SystemConfig};

    const ROOT: Uxlen = 0x8000_1000;
    const MID: Uxlen = 0x8000_2000;
    const LEAF: Uxlen = 0x8000_3000;

    fn pointer(table: Uxlen) -> Uxlen {
        (table >> PAGE_SHIFT) << 10 | PTE_V
    }

    fn leaf(pa: Uxlen, flags: Uxlen) -> Uxlen {
        (pa >> PAGE_SHIFT) << 10 | PTE_V | flags
    }

    fn setup(mode: PrivilegeMode) -> (PlatformState, SystemBus) {
        let bus = SystemBus::new(SystemConfig {
            dram_size: 0x10_0000,
            ..SystemConfig::default()
        });
        let mut state = PlatformState::default();
        state.write_csr(
            csr::SATP,
            csr::SATP_MODE_SV39 << csr::SATP_MODE_SHIFT | ROOT >> PAGE_SHIFT,
        );
        state.mode = mode;
        (state, bus)
    }

    /// Maps va 0x4000_1000 (VPN 1, 0, 1) through three levels.
    fn map_4k(bus: &mut SystemBus, flags: Uxlen) {
        bus.write_doubleword(ROOT + 8, pointer(MID)).unwrap();
        bus.write_doubleword(MID, pointer(LEAF)).unwrap();
        bus.write_doubleword(LEAF + 8, leaf(0x8000_5000, flags)).unwrap();
    }

    #[test]
    fn identity_in_machine_mode() {
        let (state, mut bus) = setup(PrivilegeMode::Machine);
        for va in [0, 0x4000_1234, u64::MAX] {
            assert_eq!(translate(&state, &mut bus, va, AccessKind::Load), Ok(va));
        }
    }

    #[test]
    fn identity_without_paging() {
        let mut bus = SystemBus::new(SystemConfig::default());
        let mut state = PlatformState::default();
        state.mode = PrivilegeMode::User;
        assert_eq!(
            translate(&state, &mut bus, 0xdead_beef, AccessKind::Fetch),
            Ok(0xdead_beef)
        );
    }

    #[test]
    fn walks_three_levels() {
        let (state, mut bus) = setup(PrivilegeMode::Supervisor);
        map_4k(&mut bus, PTE_R | PTE_W);
        assert_eq!(
            translate(&state, &mut bus, 0x4000_1abc, AccessKind::Load),
            Ok(0x8000_5abc)
        );
        let pte = bus.read_doubleword(LEAF + 8).unwrap();
        assert!(pte & PTE_A != 0);
        assert!(pte & PTE_D == 0);

        translate(&state, &mut bus, 0x4000_1000, AccessKind::Store).unwrap();
        let pte = bus.read_doubleword(LEAF + 8).unwrap();
        assert!(pte & PTE_D != 0);
    }

    #[test]
    fn gigapage_composes_low_vpns() {
        let (state, mut bus) = setup(PrivilegeMode::Supervisor);
        bus.write_doubleword(ROOT + 2 * 8, leaf(0x4000_0000, PTE_R | PTE_X))
            .unwrap();
        assert_eq!(
            translate(&state, &mut bus, 0x8012_3456, AccessKind::Fetch),
            Ok(0x4012_3456)
        );
    }

    #[test]
    fn megapage_composes_the_lowest_vpn() {
        let (state, mut bus) = setup(PrivilegeMode::Supervisor);
        // va 0x4060_1234 is VPN (1, 3, 1)
        bus.write_doubleword(ROOT + 8, pointer(MID)).unwrap();
        bus.write_doubleword(MID + 3 * 8, leaf(0x8020_0000, PTE_R))
            .unwrap();
        assert_eq!(
            translate(&state, &mut bus, 0x4060_1234, AccessKind::Load),
            Ok(0x8020_1234)
        );
        assert!(bus.read_doubleword(MID + 3 * 8).unwrap() & PTE_A != 0);

        bus.write_doubleword(MID + 3 * 8, leaf(0x8020_1000, PTE_R))
            .unwrap();
        assert_eq!(
            translate(&state, &mut bus, 0x4060_1234, AccessKind::Load),
            Err(Exception::new(SynchronousCause::LoadPageFault, 0x4060_1234))
        );
    }

    #[test]
    fn reserved_high_bits_fault() {
        let (state, mut bus) = setup(PrivilegeMode::Supervisor);
        for bit in [54, 61, 63] {
            bus.write_doubleword(ROOT + 2 * 8, leaf(0x8000_0000, PTE_R) | 1 << bit)
                .unwrap();
            assert_eq!(
                translate(&state, &mut bus, 0x8000_0010, AccessKind::Load),
                Err(Exception::new(SynchronousCause::LoadPageFault, 0x8000_0010))
            );
        }
        bus.write_doubleword(ROOT + 2 * 8, leaf(0x8000_0000, PTE_R))
            .unwrap();
        assert_eq!(
            translate(&state, &mut bus, 0x8000_0010, AccessKind::Load),
            Ok(0x8000_0010)
        );
    }

    #[test]
    fn misaligned_superpage_faults() {
        let (state, mut bus) = setup(PrivilegeMode::Supervisor);
        bus.write_doubleword(ROOT + 2 * 8, leaf(0x4000_1000, PTE_R))
            .unwrap();
        assert_eq!(
            translate(&state, &mut bus, 0x8000_0000, AccessKind::Load),
            Err(Exception::new(SynchronousCause::LoadPageFault, 0x8000_0000))
        );
    }

    #[test]
    fn invalid_entry_at_every_level() {
        for level in 0..3 {
            let (state, mut bus) = setup(PrivilegeMode::Supervisor);
            map_4k(&mut bus, PTE_R);
            let slot = [LEAF + 8, MID, ROOT + 8][level];
            let pte = bus.read_doubleword(slot).unwrap();
            bus.write_doubleword(slot, pte & !PTE_V).unwrap();
            for kind in [AccessKind::Fetch, AccessKind::Load, AccessKind::Store] {
                assert_eq!(
                    translate(&state, &mut bus, 0x4000_1000, kind),
                    Err(Exception::new(kind.page_fault(), 0x4000_1000))
                );
            }
        }
    }

    #[test]
    fn permissions() {
        let (mut state, mut bus) = setup(PrivilegeMode::User);
        map_4k(&mut bus, PTE_R);
        assert!(translate(&state, &mut bus, 0x4000_1000, AccessKind::Load).is_err());

        map_4k(&mut bus, PTE_R | PTE_U);
        assert!(translate(&state, &mut bus, 0x4000_1000, AccessKind::Load).is_ok());
        assert!(translate(&state, &mut bus, 0x4000_1000, AccessKind::Store).is_err());
        assert!(translate(&state, &mut bus, 0x4000_1000, AccessKind::Fetch).is_err());

        state.mode = PrivilegeMode::Supervisor;
        assert!(translate(&state, &mut bus, 0x4000_1000, AccessKind::Load).is_err());
        state.write_csr(csr::MSTATUS, csr::MSTATUS_SUM);
        assert!(translate(&state, &mut bus, 0x4000_1000, AccessKind::Load).is_ok());

        map_4k(&mut bus, PTE_X | PTE_U);
        assert!(translate(&state, &mut bus, 0x4000_1000, AccessKind::Fetch).is_err());
        assert!(translate(&state, &mut bus, 0x4000_1000, AccessKind::Load).is_err());
        state.write_csr(csr::MSTATUS, csr::MSTATUS_SUM | csr::MSTATUS_MXR);
        assert!(translate(&state, &mut bus, 0x4000_1000, AccessKind::Load).is_ok());
    }

    #[test]
    fn reserved_write_only_entry() {
        let (state, mut bus) = setup(PrivilegeMode::Supervisor);
        map_4k(&mut bus, PTE_W);
        assert!(translate(&state, &mut bus, 0x4000_1000, AccessKind::Store).is_err());
    }

    #[test]
    fn non_canonical_address() {
        let (state, mut bus) = setup(PrivilegeMode::Supervisor);
        assert_eq!(
            translate(&state, &mut bus, 0x0000_0040_0000_0000, AccessKind::Load),
            Err(Exception::new(
                SynchronousCause::LoadPageFault,
                0x0000_0040_0000_0000
            ))
        );
    }

    #[test]
    fn pte_read_outside_memory_is_an_access_fault() {
        let (mut state, mut bus) = setup(PrivilegeMode::Supervisor);
        state.write_csr(csr::SATP, csr::SATP_MODE_SV39 << csr::SATP_MODE_SHIFT);
        assert_eq!(
            translate(&state, &mut bus, 0x1000, AccessKind::Store).map_err(|e| e.cause),
            Err(SynchronousCause::StoreAMOAccessFault)
        );
    }
}
