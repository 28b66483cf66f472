//! Memory mapped peripherals reachable through [`crate::bus::SystemBus`].

pub mod plic;
pub mod uart;
