//! A RISC-V RV64IMAC instruction set simulator with machine, supervisor and
//! user mode and SV39 paging.
//!
//! https://riscv.org/technical/specifications/
//!

pub type Uxlen = u64;
pub type Ixlen = i64;

pub mod bits;
pub mod bus;
pub mod compressed;
pub mod decode;
pub mod devices;
pub mod execute;
pub mod loader;
pub mod mmu;
pub mod platform;
pub mod trap;
