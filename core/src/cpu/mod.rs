//! The MC6809 CPU driver: a hierarchical state machine stepped twice per
//! bus cycle.
//!
//! The host drives the core one bus cycle at a time:
//!
//! 1. [`Cpu::cycle_start`] issues any pending memory-transaction byte and
//!    runs the current state's start handler (which may pass through to a
//!    following state within the same cycle).
//! 2. The host answers any `memory:read`/`memory:write` request by direct
//!    dispatch ([`Cpu::dispatch`] or the convenience methods).
//! 3. [`Cpu::cycle_end`] runs the state's end handler, which either stays
//!    (the tick counter advances) or names the next state.
//!
//! Outbound traffic is published through the owned [`Transceiver`]; inbound
//! traffic arrives as [`InputEvent`]s.

pub mod addressing;
pub mod config;
pub(crate) mod instructions;
pub mod opcodes;
pub mod postbyte;
pub mod registers;
pub mod transaction;

use std::fmt;

use log::{debug, error, trace};

use crate::core::bits;
use crate::core::event::{Event, Transceiver};
use addressing::{Addressing, AddressingMode};
pub use config::{ConfigError, CpuConfig};
use opcodes::Instruction;
use postbyte::{IndexedAction, IndexedPostbyte};
use registers::{CcFlag, Register, RegisterFile, Registers};
use transaction::{BusDirection, MemoryTransaction, Track};

/// Pipeline states. `fail` is terminal until an external reset.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CpuState {
    Fail,
    Resetting,
    Fetch,
    Immediate,
    IndexedPostbyte,
    IndexedMain,
    IndexedIndirect,
    Relative,
    Extended,
    Direct,
    Execute,
    IrqNmi,
    Firq,
    CustomFn,
}

/// Per-state scratch, discarded on every transition.
#[derive(Copy, Clone, Debug)]
enum Scratch {
    None,
    Fetch {
        prefix: Option<u8>,
    },
    IndexedMain {
        post: IndexedPostbyte,
        remaining: u8,
        base: u16,
    },
    Interrupt {
        nmi: bool,
    },
    CustomFn {
        pc: u16,
        result: Option<Registers>,
    },
}

/// Instruction-local context for the execute state.
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct ExecScratch {
    pub started: bool,
    pub done: bool,
    pub phase: u8,
    pub remaining: u8,
    pub taken: bool,
    pub mask: u8,
    pub temp: u16,
    pub pull_reg: Option<Register>,
}

/// The consumed event surface, delivered by direct dispatch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputEvent {
    MemoryReadResult { addr: u16, data: u8 },
    MemoryWriteResult { addr: u16, data: u8 },
    Reset,
    Nmi,
    Firq,
    Irq,
    FunctionResult { pc: u16, registers: Registers },
    DebugRegisterUpdate { register: Register, value: u16 },
}

/// Host protocol misuse, distinct from the CPU's own fail state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CpuError {
    /// A debug register update arrived while an instruction was in flight.
    MidInstructionRegisterUpdate { register: Register },
}

impl fmt::Display for CpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpuError::MidInstructionRegisterUpdate { register } => write!(
                f,
                "debug update of {} while an instruction is in flight",
                register.name()
            ),
        }
    }
}

impl std::error::Error for CpuError {}

pub struct Cpu {
    pub(crate) regs: RegisterFile,
    pub(crate) exec: ExecScratch,
    pub(crate) config: CpuConfig,
    events: Transceiver,
    state: CpuState,
    ticks: u32,
    scratch: Scratch,
    txn: Option<MemoryTransaction>,
    opcode: u16,
    instruction: Option<&'static Instruction>,
    addressing: Option<Addressing>,
    staged_post: Option<IndexedPostbyte>,
    pending_nmi: bool,
    pending_firq: bool,
    pending_irq: bool,
    nmi_in_service: bool,
    take_nmi: bool,
    fault_pending: bool,
    cycles: u64,
}

impl Cpu {
    /// Build a CPU in the power-on reset state. The reset sequence runs
    /// over the first seven cycles.
    pub fn new(config: CpuConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let watch = config.watch_set();
        Ok(Self {
            regs: RegisterFile::new(watch),
            exec: ExecScratch::default(),
            config,
            events: Transceiver::new(),
            state: CpuState::Resetting,
            ticks: 0,
            scratch: Scratch::None,
            txn: None,
            opcode: 0,
            instruction: None,
            addressing: None,
            staged_post: None,
            pending_nmi: false,
            pending_firq: false,
            pending_irq: false,
            nmi_in_service: false,
            take_nmi: false,
            fault_pending: false,
            cycles: 0,
        })
    }

    // --- Public surface ---

    pub fn events(&mut self) -> &mut Transceiver {
        &mut self.events
    }

    pub fn snapshot(&self) -> Registers {
        self.regs.snapshot()
    }

    pub fn state(&self) -> CpuState {
        self.state
    }

    pub fn is_failed(&self) -> bool {
        self.state == CpuState::Fail
    }

    /// Total bus cycles executed.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// The opcode key of the instruction currently decoded (16-bit for
    /// prefixed opcodes).
    pub fn opcode(&self) -> u16 {
        self.opcode
    }

    pub fn config(&self) -> &CpuConfig {
        &self.config
    }

    /// Deliver one consumed event.
    pub fn dispatch(&mut self, event: InputEvent) -> Result<(), CpuError> {
        match event {
            InputEvent::MemoryReadResult { addr, data } => {
                self.put_bus_result(BusDirection::Read, addr, data);
                Ok(())
            }
            InputEvent::MemoryWriteResult { addr, data } => {
                self.put_bus_result(BusDirection::Write, addr, data);
                Ok(())
            }
            InputEvent::Reset => {
                self.reset();
                Ok(())
            }
            InputEvent::Nmi => {
                self.signal_nmi();
                Ok(())
            }
            InputEvent::Firq => {
                self.signal_firq();
                Ok(())
            }
            InputEvent::Irq => {
                self.signal_irq();
                Ok(())
            }
            InputEvent::FunctionResult { pc, registers } => {
                if let Scratch::CustomFn { pc: expected, result } = self.scratch
                    && pc == expected
                    && result.is_none()
                {
                    self.scratch = Scratch::CustomFn {
                        pc: expected,
                        result: Some(registers),
                    };
                }
                Ok(())
            }
            InputEvent::DebugRegisterUpdate { register, value } => {
                self.debug_register_update(register, value)
            }
        }
    }

    pub fn memory_read_result(&mut self, addr: u16, data: u8) {
        self.put_bus_result(BusDirection::Read, addr, data);
    }

    pub fn memory_write_result(&mut self, addr: u16, data: u8) {
        self.put_bus_result(BusDirection::Write, addr, data);
    }

    /// External reset: discard any pending transaction and force the
    /// resetting state without running the current state's end handler.
    pub fn reset(&mut self) {
        self.txn = None;
        self.instruction = None;
        self.addressing = None;
        self.staged_post = None;
        self.pending_nmi = false;
        self.pending_firq = false;
        self.pending_irq = false;
        self.nmi_in_service = false;
        self.fault_pending = false;
        self.enter_state(CpuState::Resetting);
    }

    pub fn signal_nmi(&mut self) {
        // Further NMIs are shut out until the next RTI.
        if !self.nmi_in_service {
            self.pending_nmi = true;
        }
    }

    pub fn signal_firq(&mut self) {
        self.pending_firq = true;
    }

    pub fn signal_irq(&mut self) {
        self.pending_irq = true;
    }

    pub fn function_result(&mut self, pc: u16, registers: Registers) {
        let _ = self.dispatch(InputEvent::FunctionResult { pc, registers });
    }

    /// External debug override of one register. Only legal between
    /// instructions; anything else is host misuse.
    pub fn debug_register_update(
        &mut self,
        register: Register,
        value: u16,
    ) -> Result<(), CpuError> {
        let at_boundary =
            self.state == CpuState::Fetch && self.txn.is_none() && self.instruction.is_none();
        if !at_boundary {
            return Err(CpuError::MidInstructionRegisterUpdate { register });
        }
        self.regs.set(register, value);
        self.flush_register_updates();
        Ok(())
    }

    /// Phase one of a bus cycle: issue any pending transaction byte, then
    /// run the current state's start handler (following zero-tick
    /// passthrough transitions).
    pub fn cycle_start(&mut self) {
        if let Some(txn) = self.txn.as_mut() {
            txn.perform(&mut self.events);
        }
        self.run_starts();
        self.flush_register_updates();
    }

    /// Phase two of a bus cycle: run the current state's end handler and
    /// apply its transition.
    pub fn cycle_end(&mut self) {
        let next = match self.state {
            CpuState::Fail => None,
            CpuState::Resetting => self.resetting_end(),
            CpuState::Fetch => self.fetch_end(),
            CpuState::Immediate => None,
            CpuState::IndexedPostbyte => self.indexed_postbyte_end(),
            CpuState::IndexedMain => self.indexed_main_end(),
            CpuState::IndexedIndirect => self.indexed_indirect_end(),
            CpuState::Relative => self.relative_end(),
            CpuState::Extended => self.extended_end(),
            CpuState::Direct => self.direct_end(),
            CpuState::Execute => self.execute_end(),
            CpuState::IrqNmi | CpuState::Firq => self.interrupt_end(),
            CpuState::CustomFn => self.customfn_end(),
        };
        if self.fault_pending {
            self.fault_pending = false;
            self.enter_state(CpuState::Fail);
        } else {
            match next {
                None => self.ticks += 1,
                Some(state) => self.enter_state(state),
            }
        }
        self.flush_register_updates();
        self.cycles += 1;
    }

    // --- Handler-facing primitives ---

    pub(crate) fn query_memory_read(&mut self, addr: u16, bytes: u8, track: Track) {
        let mut txn = MemoryTransaction::read(addr, bytes, track);
        txn.perform(&mut self.events);
        self.txn = Some(txn);
    }

    pub(crate) fn query_memory_write(
        &mut self,
        addr: u16,
        value: u16,
        bytes: u8,
        backwards: bool,
        track: Track,
    ) {
        let mut txn = MemoryTransaction::write(addr, value, bytes, backwards, track);
        txn.perform(&mut self.events);
        self.txn = Some(txn);
    }

    /// Push onto a stack: backwards write starting one below the pointer,
    /// the pointer decrementing per byte.
    pub(crate) fn query_push(&mut self, stack: Register, value: u16, bytes: u8) {
        let sp = self.regs.get(stack);
        self.query_memory_write(
            sp.wrapping_sub(1),
            value,
            bytes,
            true,
            Track::Stack {
                register: stack,
                dec: true,
            },
        );
    }

    /// Pull from a stack: forward read at the pointer, the pointer
    /// incrementing per byte.
    pub(crate) fn query_pull(&mut self, stack: Register, bytes: u8) {
        let sp = self.regs.get(stack);
        self.query_memory_read(
            sp,
            bytes,
            Track::Stack {
                register: stack,
                dec: false,
            },
        );
    }

    /// Read the operand: from PC for immediate addressing, from the
    /// effective address otherwise.
    pub(crate) fn query_operand_read(&mut self, bytes: u8) {
        match self.addressing {
            Some(Addressing::Immediate) => {
                let pc = self.regs.pc();
                self.query_memory_read(pc, bytes, Track::Pc);
            }
            Some(ref a) => match a.target() {
                Some(addr) => self.query_memory_read(addr, bytes, Track::None),
                None => self.raise_decode_fault("operand address missing"),
            },
            None => self.raise_decode_fault("addressing missing during execute"),
        }
    }

    /// The resolved operand address; faults when the addressing has none.
    pub(crate) fn addressing_target(&mut self) -> Option<u16> {
        let target = self.addressing.as_ref().and_then(Addressing::target);
        if target.is_none() {
            self.raise_decode_fault("operand address missing");
        }
        target
    }

    pub(crate) fn memory_done(&self) -> bool {
        self.txn.as_ref().is_some_and(MemoryTransaction::is_done)
    }

    pub(crate) fn memory_pending(&self) -> bool {
        self.txn.as_ref().is_some_and(|t| !t.is_done())
    }

    pub(crate) fn memory_value(&self) -> u16 {
        self.txn.as_ref().map_or(0, MemoryTransaction::value)
    }

    pub(crate) fn raise_decode_fault(&mut self, why: &str) {
        error!("cpu fault: {why}");
        self.fault_pending = true;
    }

    pub(crate) fn end_nmi_service(&mut self) {
        self.nmi_in_service = false;
    }

    // --- Driver internals ---

    fn put_bus_result(&mut self, direction: BusDirection, addr: u16, data: u8) {
        if let Some(txn) = self.txn.as_mut() {
            if txn.direction() == direction {
                txn.put_result(addr, data, &mut self.regs);
            }
        }
    }

    fn flush_register_updates(&mut self) {
        for (register, value) in self.regs.take_updates() {
            self.events.emit(Event::RegisterUpdate { register, value });
        }
    }

    fn run_starts(&mut self) {
        loop {
            let next = match self.state {
                CpuState::Fail => None,
                CpuState::Resetting => {
                    self.resetting_start();
                    None
                }
                CpuState::Fetch => self.fetch_start(),
                CpuState::Immediate => self.immediate_start(),
                CpuState::Relative
                | CpuState::Extended
                | CpuState::Direct
                | CpuState::IndexedPostbyte => {
                    self.plain_read_start();
                    None
                }
                CpuState::IndexedMain => {
                    self.indexed_main_start();
                    None
                }
                CpuState::IndexedIndirect => self.indexed_indirect_start(),
                CpuState::Execute => {
                    self.execute_start();
                    None
                }
                CpuState::IrqNmi | CpuState::Firq => {
                    self.interrupt_start();
                    None
                }
                CpuState::CustomFn => {
                    self.customfn_start();
                    None
                }
            };
            if self.fault_pending {
                self.fault_pending = false;
                self.enter_state(CpuState::Fail);
                return;
            }
            let Some(next) = next else { return };
            self.enter_state(next);
        }
    }

    fn enter_state(&mut self, state: CpuState) {
        if state == CpuState::Execute && self.instruction.is_none() {
            self.enter_state(CpuState::Fail);
            return;
        }
        trace!("state {:?} -> {:?} (cycle {})", self.state, state, self.cycles);
        self.ticks = 0;
        self.exec = ExecScratch::default();
        self.scratch = match state {
            CpuState::Fetch => Scratch::Fetch { prefix: None },
            CpuState::IndexedMain => match self.staged_post.take() {
                Some(post) => Scratch::IndexedMain {
                    post,
                    remaining: 0,
                    base: 0,
                },
                None => Scratch::None,
            },
            CpuState::IrqNmi | CpuState::Firq => Scratch::Interrupt { nmi: self.take_nmi },
            CpuState::CustomFn => Scratch::CustomFn {
                pc: self.regs.pc(),
                result: None,
            },
            _ => Scratch::None,
        };
        match state {
            CpuState::Execute => {
                if self.addressing.is_none() {
                    self.addressing = Some(Addressing::Inherent);
                }
                if let Some(instruction) = self.instruction {
                    self.events.emit(Event::InstructionDecoded {
                        instruction,
                        addressing: self.addressing.unwrap_or(Addressing::Inherent),
                    });
                }
            }
            CpuState::IrqNmi | CpuState::Firq => {
                self.instruction = None;
                self.addressing = None;
                self.txn = None;
            }
            CpuState::Fail => {
                error!("entering fail state at pc {:#06x}", self.regs.pc());
                self.events.emit(Event::Fail);
            }
            _ => {}
        }
        self.state = state;
    }

    // --- resetting ---

    fn resetting_start(&mut self) {
        if self.txn.is_none() {
            let vector = self.config.reset_vector;
            self.query_memory_read(vector, 2, Track::None);
        }
    }

    fn resetting_end(&mut self) -> Option<CpuState> {
        if self.ticks < 6 || !self.memory_done() {
            return None;
        }
        let entry = self.memory_value();
        for register in [
            Register::Dp,
            Register::Cc,
            Register::D,
            Register::X,
            Register::Y,
            Register::U,
            Register::S,
        ] {
            self.regs.set(register, 0);
        }
        self.regs.set(Register::Pc, entry);
        self.txn = None;
        self.flush_register_updates();
        self.events.emit(Event::RegistersUpdate {
            registers: self.regs.snapshot(),
        });
        self.events.emit(Event::ResetFinish);
        debug!("reset complete, pc {entry:#06x}");
        Some(CpuState::Fetch)
    }

    // --- fetch ---

    fn fetch_start(&mut self) -> Option<CpuState> {
        if self.ticks != 0 {
            return None;
        }
        let pc = self.regs.pc();
        if self.config.functions.contains(&pc) {
            return Some(CpuState::CustomFn);
        }
        self.events.emit(Event::InstructionBegin { pc });
        self.query_memory_read(pc, 1, Track::Pc);
        None
    }

    fn fetch_end(&mut self) -> Option<CpuState> {
        if !self.memory_done() {
            return None;
        }
        let byte = bits::low_byte(self.memory_value());
        let Scratch::Fetch { prefix } = self.scratch else {
            return None;
        };
        if byte == 0x10 || byte == 0x11 {
            // Repeated prefixes collapse: only the most recent survives.
            self.scratch = Scratch::Fetch {
                prefix: Some(byte),
            };
            let pc = self.regs.pc();
            self.query_memory_read(pc, 1, Track::Pc);
            return None;
        }
        let key = match prefix {
            Some(p) => bits::compose(p, byte),
            None => byte as u16,
        };
        self.opcode = key;
        let Some(instruction) = opcodes::table().get(key) else {
            self.raise_decode_fault("unknown opcode");
            return None;
        };
        self.instruction = Some(instruction);
        self.events.emit(Event::InstructionFetched { instruction });
        if let Some(state) = self.take_pending_interrupt() {
            // Re-fetch the discarded opcode after the service routine.
            let pc = self.regs.pc().wrapping_sub(1);
            self.regs.set(Register::Pc, pc);
            self.instruction = None;
            return Some(state);
        }
        Some(match instruction.mode {
            AddressingMode::Inherent => {
                self.addressing = Some(Addressing::Inherent);
                CpuState::Execute
            }
            AddressingMode::Immediate => CpuState::Immediate,
            AddressingMode::Direct => CpuState::Direct,
            AddressingMode::Extended => CpuState::Extended,
            AddressingMode::Indexed => CpuState::IndexedPostbyte,
            AddressingMode::Relative => CpuState::Relative,
        })
    }

    fn take_pending_interrupt(&mut self) -> Option<CpuState> {
        if self.pending_nmi {
            self.pending_nmi = false;
            self.take_nmi = true;
            return Some(CpuState::IrqNmi);
        }
        if self.pending_firq && !self.regs.flag(CcFlag::F) {
            self.pending_firq = false;
            self.take_nmi = false;
            return Some(CpuState::Firq);
        }
        if self.pending_irq && !self.regs.flag(CcFlag::I) {
            self.pending_irq = false;
            self.take_nmi = false;
            return Some(CpuState::IrqNmi);
        }
        None
    }

    // --- addressing states ---

    fn immediate_start(&mut self) -> Option<CpuState> {
        self.addressing = Some(Addressing::Immediate);
        Some(CpuState::Execute)
    }

    /// Shared start for the operand-fetching addressing states (direct,
    /// extended, relative, indexed postbyte): read from PC, sized by state.
    fn plain_read_start(&mut self) {
        if self.ticks != 0 {
            return;
        }
        let pc = self.regs.pc();
        let bytes = match self.state {
            CpuState::Extended => 2,
            CpuState::Relative => {
                if self.instruction.is_some_and(|i| i.is_long_branch) {
                    2
                } else {
                    1
                }
            }
            _ => 1,
        };
        self.query_memory_read(pc, bytes, Track::Pc);
    }

    fn direct_end(&mut self) -> Option<CpuState> {
        if !self.memory_done() {
            return None;
        }
        let low = bits::low_byte(self.memory_value());
        let dp = bits::low_byte(self.regs.get(Register::Dp));
        self.addressing = Some(Addressing::Direct {
            addr: bits::compose(dp, low),
        });
        Some(CpuState::Execute)
    }

    fn extended_end(&mut self) -> Option<CpuState> {
        if !self.memory_done() {
            return None;
        }
        self.addressing = Some(Addressing::Extended {
            addr: self.memory_value(),
        });
        Some(CpuState::Execute)
    }

    fn relative_end(&mut self) -> Option<CpuState> {
        if !self.memory_done() {
            return None;
        }
        let long = self.instruction.is_some_and(|i| i.is_long_branch);
        let raw = self.memory_value();
        let offset = if long {
            raw as i16
        } else {
            bits::sign_extend(raw, 8) as i16
        };
        // PC is already past the offset bytes.
        let target = self.regs.pc().wrapping_add(offset as u16);
        self.addressing = Some(Addressing::Relative {
            offset,
            long,
            target,
        });
        Some(CpuState::Execute)
    }

    fn indexed_postbyte_end(&mut self) -> Option<CpuState> {
        if !self.memory_done() {
            return None;
        }
        let byte = bits::low_byte(self.memory_value());
        match postbyte::parse_indexed(byte) {
            Some(post) => {
                self.staged_post = Some(post);
                Some(CpuState::IndexedMain)
            }
            None => {
                self.raise_decode_fault("invalid indexed postbyte");
                None
            }
        }
    }

    /// Cycles spent in the indexed-main state, per action.
    fn indexed_cycles(action: IndexedAction) -> u8 {
        match action {
            IndexedAction::Offset0 => 1,
            IndexedAction::Offset5
            | IndexedAction::OffsetA
            | IndexedAction::OffsetB
            | IndexedAction::Offset8
            | IndexedAction::OffsetPc8 => 2,
            IndexedAction::PostInc1
            | IndexedAction::PreDec1
            | IndexedAction::ExtendedIndirect => 3,
            IndexedAction::PostInc2 | IndexedAction::PreDec2 => 4,
            IndexedAction::Offset16 | IndexedAction::OffsetD => 5,
            IndexedAction::OffsetPc16 => 6,
        }
    }

    fn indexed_main_start(&mut self) {
        if self.ticks != 0 {
            return;
        }
        let Scratch::IndexedMain { post, .. } = self.scratch else {
            self.raise_decode_fault("indexed addressing without a postbyte");
            return;
        };
        let remaining = Self::indexed_cycles(post.action);
        let base = match post.action {
            IndexedAction::PostInc1 | IndexedAction::PostInc2 => {
                let step = if post.action == IndexedAction::PostInc1 { 1 } else { 2 };
                let value = self.regs.get(post.base);
                self.regs.set(post.base, value.wrapping_add(step));
                value
            }
            IndexedAction::PreDec1 | IndexedAction::PreDec2 => {
                let step = if post.action == IndexedAction::PreDec1 { 1 } else { 2 };
                let value = self.regs.get(post.base).wrapping_sub(step);
                self.regs.set(post.base, value);
                value
            }
            IndexedAction::OffsetPc8
            | IndexedAction::OffsetPc16
            | IndexedAction::ExtendedIndirect => 0,
            _ => self.regs.get(post.base),
        };
        let operand_bytes = post.action.operand_bytes();
        if operand_bytes > 0 {
            let pc = self.regs.pc();
            self.query_memory_read(pc, operand_bytes, Track::Pc);
        }
        self.scratch = Scratch::IndexedMain {
            post,
            remaining,
            base,
        };
    }

    fn indexed_main_end(&mut self) -> Option<CpuState> {
        let Scratch::IndexedMain {
            post,
            remaining,
            base,
        } = self.scratch
        else {
            return None;
        };
        if remaining > 1 {
            self.scratch = Scratch::IndexedMain {
                post,
                remaining: remaining - 1,
                base,
            };
            return None;
        }
        if post.action.operand_bytes() > 0 && !self.memory_done() {
            return None;
        }
        let operand = self.memory_value();
        let (base, offset) = match post.action {
            IndexedAction::Offset0
            | IndexedAction::PostInc1
            | IndexedAction::PostInc2
            | IndexedAction::PreDec1
            | IndexedAction::PreDec2 => (base, 0),
            IndexedAction::Offset5 => (base, post.embedded_offset() as u16),
            IndexedAction::Offset8 => (base, bits::sign_extend(operand, 8)),
            IndexedAction::Offset16 => (base, operand),
            IndexedAction::OffsetA => (base, bits::sign_extend(self.regs.a() as u16, 8)),
            IndexedAction::OffsetB => (base, bits::sign_extend(self.regs.b() as u16, 8)),
            IndexedAction::OffsetD => (base, self.regs.get(Register::D)),
            // PC-relative: the base is PC after the operand bytes.
            IndexedAction::OffsetPc8 => (self.regs.pc(), bits::sign_extend(operand, 8)),
            IndexedAction::OffsetPc16 => (self.regs.pc(), operand),
            IndexedAction::ExtendedIndirect => (0, operand),
        };
        self.addressing = Some(Addressing::Indexed {
            postbyte: post,
            addr: base.wrapping_add(offset),
        });
        Some(CpuState::IndexedIndirect)
    }

    fn indexed_indirect_start(&mut self) -> Option<CpuState> {
        let Some(Addressing::Indexed { postbyte, addr }) = self.addressing else {
            return Some(CpuState::Execute);
        };
        if !postbyte.indirect {
            return Some(CpuState::Execute);
        }
        if self.ticks == 0 {
            self.query_memory_read(addr, 2, Track::None);
        }
        None
    }

    fn indexed_indirect_end(&mut self) -> Option<CpuState> {
        if !self.memory_done() {
            return None;
        }
        if let Some(Addressing::Indexed { postbyte, .. }) = self.addressing {
            self.addressing = Some(Addressing::Indexed {
                postbyte,
                addr: self.memory_value(),
            });
        }
        Some(CpuState::Execute)
    }

    // --- execute ---

    fn execute_start(&mut self) {
        if self.ticks != 0 || self.exec.started {
            return;
        }
        self.exec.started = true;
        let Some(instruction) = self.instruction else {
            self.raise_decode_fault("execute without an instruction");
            return;
        };
        if let Some(start) = instruction.start {
            self.exec.done = start(self, instruction);
        }
    }

    fn execute_end(&mut self) -> Option<CpuState> {
        let Some(instruction) = self.instruction else {
            self.raise_decode_fault("execute without an instruction");
            return None;
        };
        if !self.exec.done {
            match instruction.end {
                Some(end) => self.exec.done = end(self, instruction),
                None => {
                    if instruction.start.is_none() {
                        self.raise_decode_fault("instruction without handlers");
                        return None;
                    }
                }
            }
        }
        if self.fault_pending {
            return None;
        }
        if self.exec.done {
            self.finish_instruction();
            Some(CpuState::Fetch)
        } else {
            None
        }
    }

    /// Instruction-finish hook: publish the boundary snapshot, clear the
    /// decode state.
    fn finish_instruction(&mut self) {
        self.flush_register_updates();
        self.events.emit(Event::RegistersUpdate {
            registers: self.regs.snapshot(),
        });
        self.events.emit(Event::InstructionFinish);
        self.instruction = None;
        self.addressing = None;
        self.txn = None;
    }

    // --- interrupt entry ---

    fn interrupt_start(&mut self) {
        if self.ticks != 0 {
            return;
        }
        if self.state == CpuState::Firq {
            // Fast frame: pc and cc only, E cleared.
            self.regs.set_flag(CcFlag::E, false);
            self.exec.mask = 0x81;
        } else {
            self.regs.set_flag(CcFlag::E, true);
            self.exec.mask = 0xFF;
        }
        self.issue_next_interrupt_push();
    }

    fn issue_next_interrupt_push(&mut self) -> bool {
        let mut mask = self.exec.mask;
        // Interrupt frames stack pc first and cc last, so RTI pulls cc
        // back at the stack pointer.
        match postbyte::take_highest(&mut mask, Register::U) {
            Some(register) => {
                self.exec.mask = mask;
                let value = self.regs.get(register);
                self.query_push(Register::S, value, register.bytes());
                true
            }
            None => false,
        }
    }

    fn interrupt_end(&mut self) -> Option<CpuState> {
        let Scratch::Interrupt { nmi } = self.scratch else {
            return None;
        };
        if self.memory_pending() {
            return None;
        }
        if self.exec.phase == 0 {
            if self.issue_next_interrupt_push() {
                return None;
            }
            let firq = self.state == CpuState::Firq;
            self.regs.set_flag(CcFlag::I, true);
            if nmi || firq {
                self.regs.set_flag(CcFlag::F, true);
            }
            let vector = if firq {
                self.config.firq_vector
            } else if nmi {
                self.config.nmi_vector
            } else {
                self.config.irq_vector
            };
            self.query_memory_read(vector, 2, Track::None);
            self.exec.phase = 1;
            return None;
        }
        if !self.memory_done() {
            return None;
        }
        let entry = self.memory_value();
        self.regs.set(Register::Pc, entry);
        if nmi {
            self.nmi_in_service = true;
        }
        debug!(
            "interrupt entry at {entry:#06x} ({})",
            if self.state == CpuState::Firq {
                "firq"
            } else if nmi {
                "nmi"
            } else {
                "irq"
            }
        );
        Some(CpuState::Fetch)
    }

    // --- host function escape ---

    fn customfn_start(&mut self) {
        if self.ticks != 0 {
            return;
        }
        let Scratch::CustomFn { pc, .. } = self.scratch else {
            return;
        };
        let registers = self.regs.snapshot();
        self.events.emit(Event::Function { pc, registers });
    }

    fn customfn_end(&mut self) -> Option<CpuState> {
        let Scratch::CustomFn { result, .. } = self.scratch else {
            return None;
        };
        match result {
            Some(registers) => {
                self.regs.load(registers);
                Some(CpuState::Fetch)
            }
            None => None,
        }
    }

    // --- test-harness hooks ---

    /// Place the CPU directly at an instruction boundary with the given
    /// registers, bypassing the reset sequence. Test harnesses only.
    #[cfg(feature = "test-utils")]
    pub fn force_boot(&mut self, registers: Registers) {
        self.regs.load(registers);
        self.regs.take_updates();
        self.txn = None;
        self.instruction = None;
        self.addressing = None;
        self.enter_state(CpuState::Fetch);
    }
}
