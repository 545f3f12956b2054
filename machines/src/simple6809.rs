//! A minimal 6809 system: CPU plus flat RAM, wired through the event
//! transceiver. Bus requests are answered from RAM into a reply queue that
//! is drained back into the CPU between the two cycle phases, matching the
//! driver protocol.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use cadmium_core::core::event::{Event, EventKind};
use cadmium_core::cpu::config::ConfigError;
use cadmium_core::cpu::registers::Registers;
use cadmium_core::cpu::{Cpu, CpuConfig, InputEvent};

use crate::memory::Ram;
use crate::registry::SystemEntry;

inventory::submit! {
    SystemEntry::new(
        "simple6809",
        "MC6809 with flat 64 KiB RAM",
        Simple6809System::new,
    )
}

pub struct Simple6809System {
    cpu: Cpu,
    ram: Rc<RefCell<Ram>>,
    replies: Rc<RefCell<VecDeque<InputEvent>>>,
    instructions: Rc<Cell<u64>>,
    resets: Rc<Cell<u64>>,
}

impl Default for Simple6809System {
    fn default() -> Self {
        Self::new()
    }
}

impl Simple6809System {
    pub fn new() -> Self {
        Self::with_config(CpuConfig::default()).expect("default configuration is valid")
    }

    pub fn with_config(config: CpuConfig) -> Result<Self, ConfigError> {
        let mut cpu = Cpu::new(config)?;
        let ram = Rc::new(RefCell::new(Ram::new()));
        let replies = Rc::new(RefCell::new(VecDeque::new()));
        let instructions = Rc::new(Cell::new(0u64));
        let resets = Rc::new(Cell::new(0u64));

        {
            let ram = ram.clone();
            let replies = replies.clone();
            cpu.events().on(EventKind::MemoryRead, 0, move |event, _| {
                if let Event::MemoryRead { addr } = *event {
                    let data = ram.borrow().read(addr);
                    replies
                        .borrow_mut()
                        .push_back(InputEvent::MemoryReadResult { addr, data });
                }
            });
        }
        {
            let ram = ram.clone();
            let replies = replies.clone();
            cpu.events().on(EventKind::MemoryWrite, 0, move |event, _| {
                if let Event::MemoryWrite { addr, data } = *event {
                    ram.borrow_mut().write(addr, data);
                    replies
                        .borrow_mut()
                        .push_back(InputEvent::MemoryWriteResult { addr, data });
                }
            });
        }
        {
            let instructions = instructions.clone();
            cpu.events().on(EventKind::InstructionFinish, 0, move |_, _| {
                instructions.set(instructions.get() + 1);
            });
        }
        {
            let resets = resets.clone();
            cpu.events().on(EventKind::ResetFinish, 0, move |_, _| {
                resets.set(resets.get() + 1);
            });
        }

        Ok(Self {
            cpu,
            ram,
            replies,
            instructions,
            resets,
        })
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn registers(&self) -> Registers {
        self.cpu.snapshot()
    }

    /// Instructions retired since construction.
    pub fn instructions_retired(&self) -> u64 {
        self.instructions.get()
    }

    /// Completed reset sequences since construction.
    pub fn resets_finished(&self) -> u64 {
        self.resets.get()
    }

    pub fn load(&mut self, addr: u16, data: &[u8]) {
        self.ram.borrow_mut().load(addr, data);
    }

    pub fn read_ram(&self, addr: u16) -> u8 {
        self.ram.borrow().read(addr)
    }

    pub fn write_ram(&mut self, addr: u16, data: u8) {
        self.ram.borrow_mut().write(addr, data);
    }

    /// Point the reset vector at `target`.
    pub fn set_reset_vector(&mut self, target: u16) {
        let vector = self.cpu.config().reset_vector;
        let mut ram = self.ram.borrow_mut();
        ram.write(vector, (target >> 8) as u8);
        ram.write(vector.wrapping_add(1), target as u8);
    }

    /// One bus cycle: start phase, bus reply delivery, end phase.
    pub fn tick(&mut self) {
        self.cpu.cycle_start();
        loop {
            let reply = self.replies.borrow_mut().pop_front();
            let Some(reply) = reply else { break };
            let _ = self.cpu.dispatch(reply);
        }
        self.cpu.cycle_end();
    }

    pub fn run_cycles(&mut self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }

    /// Run until the power-on (or signalled) reset sequence completes.
    /// Returns the number of cycles consumed.
    pub fn run_reset(&mut self) -> u64 {
        let before = self.resets.get();
        let start = self.cpu.cycles();
        while self.resets.get() == before && self.cpu.cycles() - start < 100 {
            self.tick();
        }
        self.cpu.cycles() - start
    }

    /// Run until the next instruction retires (or the CPU fails). Returns
    /// the number of cycles consumed.
    pub fn step_instruction(&mut self) -> u64 {
        let before = self.instructions.get();
        let start = self.cpu.cycles();
        while self.instructions.get() == before
            && !self.cpu.is_failed()
            && self.cpu.cycles() - start < 200
        {
            self.tick();
        }
        self.cpu.cycles() - start
    }

    pub fn step_instructions(&mut self, n: usize) -> u64 {
        let mut cycles = 0;
        for _ in 0..n {
            cycles += self.step_instruction();
        }
        cycles
    }
}
