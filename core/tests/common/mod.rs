//! Shared harness: a Simple6809System booted at a known origin.
#![allow(dead_code)] // not every test binary uses every helper

use cadmium_core::cpu::registers::{CcFlag, Registers};
use cadmium_machines::Simple6809System;

pub const ORIGIN: u16 = 0x0100;

/// Build a system with `program` at `ORIGIN` and the reset sequence
/// already completed.
pub fn boot(program: &[u8]) -> Simple6809System {
    boot_at(ORIGIN, program)
}

pub fn boot_at(origin: u16, program: &[u8]) -> Simple6809System {
    let mut system = Simple6809System::new();
    system.set_reset_vector(origin);
    system.load(origin, program);
    let cycles = system.run_reset();
    assert_eq!(cycles, 7, "reset sequence is seven cycles");
    system
}

pub fn regs(system: &Simple6809System) -> Registers {
    system.registers()
}

pub fn flag(system: &Simple6809System, f: CcFlag) -> bool {
    system.registers().flag(f)
}

/// Assert N, Z, V, C in one go.
pub fn assert_nzvc(system: &Simple6809System, n: bool, z: bool, v: bool, c: bool) {
    assert_eq!(flag(system, CcFlag::N), n, "N flag");
    assert_eq!(flag(system, CcFlag::Z), z, "Z flag");
    assert_eq!(flag(system, CcFlag::V), v, "V flag");
    assert_eq!(flag(system, CcFlag::C), c, "C flag");
}
