//! Single-step validation harness: a tracing system that records per-cycle
//! bus activity, plus the serde types and gzip I/O for vector files.
//!
//! Vector files live under `test_data/m6809/` as gzipped JSON, one file per
//! opcode, produced by the `gen_m6809_vectors` binary and replayed by the
//! single-step test.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::rc::Rc;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};

use cadmium_core::core::event::{Event, EventKind};
use cadmium_core::cpu::registers::Registers;
use cadmium_core::cpu::{Cpu, CpuConfig, InputEvent};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusOp {
    Read,
    Write,
}

/// One bus byte transferred, in order of occurrence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusCycle {
    pub addr: u16,
    pub data: u8,
    pub op: BusOp,
}

/// CPU plus flat RAM that records every bus byte.
pub struct TracingSystem {
    cpu: Cpu,
    ram: Rc<RefCell<Box<[u8; 0x10000]>>>,
    replies: Rc<RefCell<VecDeque<InputEvent>>>,
    trace: Rc<RefCell<Vec<BusCycle>>>,
    instructions: Rc<Cell<u64>>,
}

impl Default for TracingSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl TracingSystem {
    pub fn new() -> Self {
        let mut cpu = Cpu::new(CpuConfig::default()).expect("default configuration is valid");
        let ram: Rc<RefCell<Box<[u8; 0x10000]>>> = Rc::new(RefCell::new(Box::new([0; 0x10000])));
        let replies = Rc::new(RefCell::new(VecDeque::new()));
        let trace: Rc<RefCell<Vec<BusCycle>>> = Rc::new(RefCell::new(Vec::new()));
        let instructions = Rc::new(Cell::new(0u64));

        {
            let ram = ram.clone();
            let replies = replies.clone();
            let trace = trace.clone();
            cpu.events().on(EventKind::MemoryRead, 0, move |event, _| {
                if let Event::MemoryRead { addr } = *event {
                    let data = ram.borrow()[addr as usize];
                    trace.borrow_mut().push(BusCycle {
                        addr,
                        data,
                        op: BusOp::Read,
                    });
                    replies
                        .borrow_mut()
                        .push_back(InputEvent::MemoryReadResult { addr, data });
                }
            });
        }
        {
            let ram = ram.clone();
            let replies = replies.clone();
            let trace = trace.clone();
            cpu.events().on(EventKind::MemoryWrite, 0, move |event, _| {
                if let Event::MemoryWrite { addr, data } = *event {
                    ram.borrow_mut()[addr as usize] = data;
                    trace.borrow_mut().push(BusCycle {
                        addr,
                        data,
                        op: BusOp::Write,
                    });
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

        Self {
            cpu,
            ram,
            replies,
            trace,
            instructions,
        }
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn fill_memory(&mut self, image: &[u8; 0x10000]) {
        self.ram.borrow_mut().copy_from_slice(image);
    }

    pub fn write_memory(&mut self, addr: u16, data: u8) {
        self.ram.borrow_mut()[addr as usize] = data;
    }

    pub fn read_memory(&self, addr: u16) -> u8 {
        self.ram.borrow()[addr as usize]
    }

    /// Place the CPU at an instruction boundary with the given registers.
    pub fn boot_with(&mut self, registers: Registers) {
        self.cpu.force_boot(registers);
        self.trace.borrow_mut().clear();
    }

    pub fn trace(&self) -> Vec<BusCycle> {
        self.trace.borrow().clone()
    }

    pub fn clear_trace(&mut self) {
        self.trace.borrow_mut().clear();
    }

    fn tick(&mut self) {
        self.cpu.cycle_start();
        loop {
            let reply = self.replies.borrow_mut().pop_front();
            let Some(reply) = reply else { break };
            let _ = self.cpu.dispatch(reply);
        }
        self.cpu.cycle_end();
    }

    /// Run one instruction to completion. Returns false if the CPU failed
    /// or the cycle bound ran out.
    pub fn step_instruction(&mut self) -> bool {
        let before = self.instructions.get();
        let start = self.cpu.cycles();
        while self.instructions.get() == before {
            if self.cpu.is_failed() || self.cpu.cycles() - start > 200 {
                return false;
            }
            self.tick();
        }
        true
    }
}

// --- Vector file format ---

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VectorState {
    pub pc: u16,
    pub s: u16,
    pub u: u16,
    pub a: u8,
    pub b: u8,
    pub dp: u8,
    pub x: u16,
    pub y: u16,
    pub cc: u8,
    /// Sparse memory contents as (address, value) pairs.
    pub ram: Vec<(u16, u8)>,
}

impl VectorState {
    pub fn registers(&self) -> Registers {
        let mut regs = Registers {
            dp: self.dp,
            cc: self.cc,
            d: 0,
            x: self.x,
            y: self.y,
            u: self.u,
            s: self.s,
            pc: self.pc,
        };
        regs.set_a(self.a);
        regs.set_b(self.b);
        regs
    }

    pub fn from_registers(regs: &Registers, ram: Vec<(u16, u8)>) -> Self {
        Self {
            pc: regs.pc,
            s: regs.s,
            u: regs.u,
            a: regs.a(),
            b: regs.b(),
            dp: regs.dp,
            x: regs.x,
            y: regs.y,
            cc: regs.cc,
            ram,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestVector {
    pub name: String,
    pub initial: VectorState,
    #[serde(rename = "final")]
    pub final_state: VectorState,
    /// Bus activity as (address, data, "read"/"write") triples.
    pub cycles: Vec<(u16, u8, String)>,
}

/// Write a gzipped JSON vector file.
pub fn write_vectors(path: &Path, vectors: &[TestVector]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    let json = serde_json::to_string(vectors)?;
    encoder.write_all(json.as_bytes())?;
    encoder.finish()?;
    Ok(())
}

/// Read a gzipped JSON vector file.
pub fn read_vectors(path: &Path) -> std::io::Result<Vec<TestVector>> {
    let file = File::open(path)?;
    let mut decoder = GzDecoder::new(file);
    let mut json = String::new();
    decoder.read_to_string(&mut json)?;
    Ok(serde_json::from_str(&json)?)
}
