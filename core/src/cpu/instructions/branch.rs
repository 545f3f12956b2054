//! Branch and jump instructions. The branch condition is evaluated once on
//! entry to execute; short branches always spend one execute cycle, long
//! branches spend one when not taken and two when taken.

use crate::cpu::Cpu;
use crate::cpu::opcodes::Instruction;
use crate::cpu::registers::{CcFlag, Register};

impl Cpu {
    #[inline]
    fn branch_start(&mut self, instr: &'static Instruction, taken: bool) -> bool {
        self.exec.taken = taken;
        self.exec.remaining = (instr.is_long_branch && taken) as u8;
        false
    }

    pub(crate) fn branch_end(&mut self, _instr: &'static Instruction) -> bool {
        if self.exec.remaining > 0 {
            self.exec.remaining -= 1;
            return false;
        }
        if self.exec.taken
            && let Some(target) = self.addressing_target()
        {
            self.regs.set(Register::Pc, target);
        }
        true
    }

    // Condition starts. Naming follows the short form; the long forms share
    // the handlers and differ only in the descriptor flag.

    /// BRA: always.
    pub(crate) fn bra_start(&mut self, instr: &'static Instruction) -> bool {
        self.branch_start(instr, true)
    }

    /// BRN: never (a two-byte NOP with branch timing).
    pub(crate) fn brn_start(&mut self, instr: &'static Instruction) -> bool {
        self.branch_start(instr, false)
    }

    /// BHI: unsigned higher (C clear and Z clear).
    pub(crate) fn bhi_start(&mut self, instr: &'static Instruction) -> bool {
        let cc = self.regs.cc();
        self.branch_start(instr, cc & (CcFlag::C as u8 | CcFlag::Z as u8) == 0)
    }

    /// BLS: unsigned lower or same (C or Z set).
    pub(crate) fn bls_start(&mut self, instr: &'static Instruction) -> bool {
        let cc = self.regs.cc();
        self.branch_start(instr, cc & (CcFlag::C as u8 | CcFlag::Z as u8) != 0)
    }

    /// BCC/BHS: carry clear.
    pub(crate) fn bcc_start(&mut self, instr: &'static Instruction) -> bool {
        let taken = !self.regs.flag(CcFlag::C);
        self.branch_start(instr, taken)
    }

    /// BCS/BLO: carry set.
    pub(crate) fn bcs_start(&mut self, instr: &'static Instruction) -> bool {
        let taken = self.regs.flag(CcFlag::C);
        self.branch_start(instr, taken)
    }

    /// BNE: zero clear.
    pub(crate) fn bne_start(&mut self, instr: &'static Instruction) -> bool {
        let taken = !self.regs.flag(CcFlag::Z);
        self.branch_start(instr, taken)
    }

    /// BEQ: zero set.
    pub(crate) fn beq_start(&mut self, instr: &'static Instruction) -> bool {
        let taken = self.regs.flag(CcFlag::Z);
        self.branch_start(instr, taken)
    }

    /// BVC: overflow clear.
    pub(crate) fn bvc_start(&mut self, instr: &'static Instruction) -> bool {
        let taken = !self.regs.flag(CcFlag::V);
        self.branch_start(instr, taken)
    }

    /// BVS: overflow set.
    pub(crate) fn bvs_start(&mut self, instr: &'static Instruction) -> bool {
        let taken = self.regs.flag(CcFlag::V);
        self.branch_start(instr, taken)
    }

    /// BPL: negative clear.
    pub(crate) fn bpl_start(&mut self, instr: &'static Instruction) -> bool {
        let taken = !self.regs.flag(CcFlag::N);
        self.branch_start(instr, taken)
    }

    /// BMI: negative set.
    pub(crate) fn bmi_start(&mut self, instr: &'static Instruction) -> bool {
        let taken = self.regs.flag(CcFlag::N);
        self.branch_start(instr, taken)
    }

    /// BGE: signed greater or equal (N equals V).
    pub(crate) fn bge_start(&mut self, instr: &'static Instruction) -> bool {
        let taken = self.regs.flag(CcFlag::N) == self.regs.flag(CcFlag::V);
        self.branch_start(instr, taken)
    }

    /// BLT: signed less (N differs from V).
    pub(crate) fn blt_start(&mut self, instr: &'static Instruction) -> bool {
        let taken = self.regs.flag(CcFlag::N) != self.regs.flag(CcFlag::V);
        self.branch_start(instr, taken)
    }

    /// BGT: signed greater (Z clear and N equals V).
    pub(crate) fn bgt_start(&mut self, instr: &'static Instruction) -> bool {
        let taken = !self.regs.flag(CcFlag::Z)
            && self.regs.flag(CcFlag::N) == self.regs.flag(CcFlag::V);
        self.branch_start(instr, taken)
    }

    /// BLE: signed less or equal (Z set or N differs from V).
    pub(crate) fn ble_start(&mut self, instr: &'static Instruction) -> bool {
        let taken = self.regs.flag(CcFlag::Z)
            || self.regs.flag(CcFlag::N) != self.regs.flag(CcFlag::V);
        self.branch_start(instr, taken)
    }

    /// JMP: transfer control to the effective address.
    pub(crate) fn jmp_end(&mut self, _instr: &'static Instruction) -> bool {
        if let Some(target) = self.addressing_target() {
            self.regs.set(Register::Pc, target);
        }
        true
    }

    /// JSR/BSR/LBSR: push the return address onto S, then jump.
    pub(crate) fn jsr_start(&mut self, _instr: &'static Instruction) -> bool {
        let pc = self.regs.pc();
        self.query_push(Register::S, pc, 2);
        false
    }

    pub(crate) fn jsr_end(&mut self, _instr: &'static Instruction) -> bool {
        if !self.memory_done() {
            return false;
        }
        if let Some(target) = self.addressing_target() {
            self.regs.set(Register::Pc, target);
        }
        true
    }

    /// RTS: pull the return address from S.
    pub(crate) fn rts_start(&mut self, _instr: &'static Instruction) -> bool {
        self.query_pull(Register::S, 2);
        false
    }

    pub(crate) fn rts_end(&mut self, _instr: &'static Instruction) -> bool {
        if !self.memory_done() {
            return false;
        }
        let target = self.memory_value();
        self.regs.set(Register::Pc, target);
        true
    }

    /// ABX: X plus B, unsigned, no flags. Three cycles in total.
    pub(crate) fn abx_start(&mut self, _instr: &'static Instruction) -> bool {
        self.exec.remaining = 1;
        false
    }

    pub(crate) fn abx_end(&mut self, _instr: &'static Instruction) -> bool {
        if self.exec.remaining > 0 {
            self.exec.remaining -= 1;
            return false;
        }
        let x = self.regs.get(Register::X);
        let b = self.regs.b() as u16;
        self.regs.set(Register::X, x.wrapping_add(b));
        true
    }
}
