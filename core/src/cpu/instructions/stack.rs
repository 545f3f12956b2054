//! PSH/PUL, software interrupts, RTI and the register-move pair EXG/TFR.
//!
//! PSH pushes registers in postbyte bit order (cc first when present), each
//! 16-bit register as a 2-byte backwards write, so the frame reads pc ... cc
//! from low to high addresses. PUL reverses that order. Interrupt frames
//! (SWI and the hardware interrupt states) push in the opposite order so
//! that RTI finds cc at the stack pointer.

use crate::core::bits;
use crate::cpu::opcodes::Instruction;
use crate::cpu::postbyte;
use crate::cpu::registers::{CcFlag, Register};
use crate::cpu::transaction::Track;
use crate::cpu::Cpu;

fn other_stack(stack: Register) -> Register {
    if stack == Register::S {
        Register::U
    } else {
        Register::S
    }
}

impl Cpu {
    /// PSH{register}/PUL{register} start: read the postbyte.
    pub(crate) fn psh_pul_start(&mut self, _instr: &'static Instruction) -> bool {
        self.query_operand_read(1);
        false
    }

    /// PSH: three don't-care cycles after the postbyte, then one push per
    /// byte, stack pointer decrementing as each byte lands.
    pub(crate) fn psh_end(&mut self, instr: &'static Instruction) -> bool {
        let Some(stack) = instr.register else {
            return true;
        };
        let other = other_stack(stack);
        if self.exec.phase == 0 {
            if !self.memory_done() {
                return false;
            }
            self.exec.mask = bits::low_byte(self.memory_value());
            self.exec.remaining = 3;
            self.exec.phase = 1;
            return false;
        }
        if self.exec.remaining > 0 {
            self.exec.remaining -= 1;
            if self.exec.remaining > 0 {
                return false;
            }
            // Last don't-care cycle: issue the first push below.
        } else if self.memory_pending() {
            return false;
        }
        let mut mask = self.exec.mask;
        match postbyte::take_lowest(&mut mask, other) {
            Some(register) => {
                self.exec.mask = mask;
                let value = self.regs.get(register);
                self.query_push(stack, value, register.bytes());
                false
            }
            None => true,
        }
    }

    /// PUL: two don't-care cycles, then pulls in reverse push order, stack
    /// pointer incrementing per byte.
    pub(crate) fn pul_end(&mut self, instr: &'static Instruction) -> bool {
        let Some(stack) = instr.register else {
            return true;
        };
        let other = other_stack(stack);
        if self.exec.phase == 0 {
            if !self.memory_done() {
                return false;
            }
            self.exec.mask = bits::low_byte(self.memory_value());
            self.exec.remaining = 2;
            self.exec.phase = 1;
            return false;
        }
        if self.exec.remaining > 0 {
            self.exec.remaining -= 1;
            if self.exec.remaining > 0 {
                return false;
            }
        } else {
            if self.memory_pending() {
                return false;
            }
            if let Some(register) = self.exec.pull_reg.take() {
                let value = self.memory_value();
                self.regs.set(register, value);
            }
        }
        let mut mask = self.exec.mask;
        match postbyte::take_highest(&mut mask, other) {
            Some(register) => {
                self.exec.mask = mask;
                self.exec.pull_reg = Some(register);
                self.query_pull(stack, register.bytes());
                false
            }
            None => true,
        }
    }

    /// SWI/SWI2/SWI3: stack the full register set with E set, apply the
    /// interrupt masks (SWI only), load PC from the corresponding vector.
    pub(crate) fn swi_start(&mut self, _instr: &'static Instruction) -> bool {
        self.regs.set_flag(CcFlag::E, true);
        self.exec.mask = 0xFF;
        // Interrupt frames push pc first, cc last.
        let mut mask = self.exec.mask;
        if let Some(register) = postbyte::take_highest(&mut mask, Register::U) {
            self.exec.mask = mask;
            let value = self.regs.get(register);
            self.query_push(Register::S, value, register.bytes());
        }
        false
    }

    pub(crate) fn swi_end(&mut self, instr: &'static Instruction) -> bool {
        if self.memory_pending() {
            return false;
        }
        match self.exec.phase {
            0 => {
                let mut mask = self.exec.mask;
                if let Some(register) = postbyte::take_highest(&mut mask, Register::U) {
                    self.exec.mask = mask;
                    let value = self.regs.get(register);
                    self.query_push(Register::S, value, register.bytes());
                    return false;
                }
                if instr.swi == Some(1) {
                    self.regs.set_flag(CcFlag::I, true);
                    self.regs.set_flag(CcFlag::F, true);
                }
                let vector = match instr.swi {
                    Some(2) => self.config.swi2_vector,
                    Some(3) => self.config.swi3_vector,
                    _ => self.config.swi_vector,
                };
                self.query_memory_read(vector, 2, Track::None);
                self.exec.phase = 1;
                false
            }
            _ => {
                if !self.memory_done() {
                    return false;
                }
                let target = self.memory_value();
                self.regs.set(Register::Pc, target);
                true
            }
        }
    }

    /// RTI: pull cc; when the pulled Entire flag is set, pull the full
    /// register frame, otherwise only pc.
    pub(crate) fn rti_start(&mut self, _instr: &'static Instruction) -> bool {
        self.query_pull(Register::S, 1);
        false
    }

    pub(crate) fn rti_end(&mut self, _instr: &'static Instruction) -> bool {
        if self.memory_pending() {
            return false;
        }
        if self.exec.phase == 0 {
            if !self.memory_done() {
                return false;
            }
            let cc = bits::low_byte(self.memory_value());
            self.regs.set(Register::Cc, cc as u16);
            // Interrupt frames read cc, A, B, dp, X, Y, U, pc from low to
            // high: continue pulling in bit order.
            self.exec.mask = if cc & CcFlag::E as u8 != 0 { 0xFE } else { 0x80 };
            self.exec.phase = 1;
        } else if let Some(register) = self.exec.pull_reg.take() {
            let value = self.memory_value();
            self.regs.set(register, value);
        }
        let mut mask = self.exec.mask;
        match postbyte::take_lowest(&mut mask, Register::U) {
            Some(register) => {
                self.exec.mask = mask;
                self.exec.pull_reg = Some(register);
                self.query_pull(Register::S, register.bytes());
                false
            }
            None => {
                self.end_nmi_service();
                true
            }
        }
    }
}
