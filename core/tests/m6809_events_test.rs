use std::cell::RefCell;
use std::rc::Rc;

use cadmium_core::core::event::{Event, EventKind};
use cadmium_core::cpu::registers::{Register, Registers};
use cadmium_core::cpu::{CpuConfig, CpuError, CpuState};
use cadmium_machines::Simple6809System;

mod common;
use common::boot;

fn count(system: &mut Simple6809System, kind: EventKind) -> Rc<RefCell<u32>> {
    let counter = Rc::new(RefCell::new(0));
    let c = counter.clone();
    system
        .cpu_mut()
        .events()
        .on(kind, 50, move |_, _| *c.borrow_mut() += 1);
    counter
}

#[test]
fn lifecycle_events_in_order() {
    let mut system = boot(&[0x86, 0x2A]); // LDA #$2A
    let log = Rc::new(RefCell::new(Vec::new()));
    for kind in [
        EventKind::InstructionBegin,
        EventKind::InstructionFetched,
        EventKind::InstructionDecoded,
        EventKind::InstructionFinish,
        EventKind::RegistersUpdate,
    ] {
        let l = log.clone();
        system
            .cpu_mut()
            .events()
            .on(kind, 50, move |event, _| l.borrow_mut().push(event.kind()));
    }
    system.step_instruction();
    assert_eq!(
        *log.borrow(),
        vec![
            EventKind::InstructionBegin,
            EventKind::InstructionFetched,
            EventKind::InstructionDecoded,
            EventKind::RegistersUpdate,
            EventKind::InstructionFinish,
        ]
    );
}

#[test]
fn decoded_event_carries_the_descriptor() {
    let mut system = boot(&[0x86, 0x2A]);
    let seen = Rc::new(RefCell::new(None));
    let s = seen.clone();
    system
        .cpu_mut()
        .events()
        .on(EventKind::InstructionFetched, 50, move |event, _| {
            if let Event::InstructionFetched { instruction } = event {
                *s.borrow_mut() = Some(instruction.mnemonic.clone());
            }
        });
    system.step_instruction();
    assert_eq!(seen.borrow().as_deref(), Some("LDA"));
}

#[test]
fn bus_access_counts_per_instruction() {
    // LDA immediate: opcode + operand reads, nothing else.
    let mut system = boot(&[0x86, 0x2A]);
    let reads = count(&mut system, EventKind::MemoryRead);
    let writes = count(&mut system, EventKind::MemoryWrite);
    system.step_instruction();
    assert_eq!(*reads.borrow(), 2);
    assert_eq!(*writes.borrow(), 0);

    // STA direct: opcode + address byte reads, one write.
    let mut system = boot(&[0x97, 0x10]);
    let reads = count(&mut system, EventKind::MemoryRead);
    let writes = count(&mut system, EventKind::MemoryWrite);
    system.step_instruction();
    assert_eq!(*reads.borrow(), 2);
    assert_eq!(*writes.borrow(), 1);

    // LDD extended: opcode + two address bytes + two operand bytes.
    let mut system = boot(&[0xFC, 0x20, 0x00]);
    let reads = count(&mut system, EventKind::MemoryRead);
    system.step_instruction();
    assert_eq!(*reads.borrow(), 5);

    // PSHS A,B: opcode + postbyte reads, two writes.
    let mut system = boot(&[0x34, 0x06]);
    let reads = count(&mut system, EventKind::MemoryRead);
    let writes = count(&mut system, EventKind::MemoryWrite);
    system.step_instruction();
    assert_eq!(*reads.borrow(), 2);
    assert_eq!(*writes.borrow(), 2);
}

#[test]
fn watched_registers_announce_every_write() {
    // Default watch set: pc, S, U. Every PC step during a fetch announces.
    let mut system = boot(&[0x12]); // NOP
    let updates = Rc::new(RefCell::new(Vec::new()));
    let u = updates.clone();
    system
        .cpu_mut()
        .events()
        .on(EventKind::RegisterUpdate, 50, move |event, _| {
            if let Event::RegisterUpdate { register, value } = event {
                u.borrow_mut().push((*register, *value));
            }
        });
    system.step_instruction();
    assert_eq!(
        *updates.borrow(),
        vec![(Register::Pc, 0x0101)],
        "one PC increment for the opcode byte"
    );
}

#[test]
fn configured_watch_set_replaces_the_default() {
    let config = CpuConfig {
        immediate_update_registers: vec![Register::D],
        ..CpuConfig::default()
    };
    let mut system = Simple6809System::with_config(config).expect("valid configuration");
    system.set_reset_vector(0x0100);
    system.load(0x0100, &[0x86, 0x2A]); // LDA #$2A
    system.run_reset();

    let updates = Rc::new(RefCell::new(Vec::new()));
    let u = updates.clone();
    system
        .cpu_mut()
        .events()
        .on(EventKind::RegisterUpdate, 50, move |event, _| {
            if let Event::RegisterUpdate { register, value } = event {
                u.borrow_mut().push((*register, *value));
            }
        });
    system.step_instruction();
    // PC is no longer watched; the virtual A write announces as D.
    assert_eq!(*updates.borrow(), vec![(Register::D, 0x2A00)]);
}

#[test]
fn fail_event_fires_once_on_entry() {
    let mut system = boot(&[0x01]);
    let fails = count(&mut system, EventKind::Fail);
    system.step_instruction();
    system.run_cycles(5);
    assert_eq!(*fails.borrow(), 1);
    assert_eq!(system.cpu().state(), CpuState::Fail);
}

#[test]
fn host_function_escape() {
    let config = CpuConfig {
        functions: vec![0x0103],
        ..CpuConfig::default()
    };
    let mut system = Simple6809System::with_config(config).expect("valid configuration");
    system.set_reset_vector(0x0100);
    system.load(
        0x0100,
        &[
            0x7E, 0x01, 0x03, // JMP $0103 (the function address)
        ],
    );
    system.load(0x0200, &[0x12]); // resume point
    system.run_reset();

    let captured = Rc::new(RefCell::new(None));
    let c = captured.clone();
    system
        .cpu_mut()
        .events()
        .on(EventKind::Function, 50, move |event, _| {
            if let Event::Function { pc, registers } = event {
                *c.borrow_mut() = Some((*pc, *registers));
            }
        });

    system.step_instruction(); // JMP lands on the function address
    system.run_cycles(2); // customfn emits and waits
    let (pc, registers) = captured.borrow().expect("cpu:function emitted");
    assert_eq!(pc, 0x0103);
    assert_eq!(system.cpu().state(), CpuState::CustomFn);

    // Host performs the call and resumes at 0x0200.
    let resumed = Registers {
        pc: 0x0200,
        ..registers
    };
    system.cpu_mut().function_result(pc, resumed);
    system.step_instruction(); // NOP at the resume point
    assert_eq!(system.registers().pc, 0x0201);
}

#[test]
fn function_result_for_the_wrong_pc_is_ignored() {
    let config = CpuConfig {
        functions: vec![0x0100],
        ..CpuConfig::default()
    };
    let mut system = Simple6809System::with_config(config).expect("valid configuration");
    system.set_reset_vector(0x0100);
    system.run_reset();
    system.run_cycles(2);
    assert_eq!(system.cpu().state(), CpuState::CustomFn);

    let regs = system.registers();
    system.cpu_mut().function_result(0xBEEF, regs);
    system.run_cycles(2);
    assert_eq!(
        system.cpu().state(),
        CpuState::CustomFn,
        "mismatched result leaves the CPU waiting"
    );
}

#[test]
fn debug_register_update_between_instructions() {
    let mut system = boot(&[0x12]);
    system
        .cpu_mut()
        .debug_register_update(Register::X, 0x4242)
        .expect("legal at a boundary");
    assert_eq!(system.registers().x, 0x4242);
}

#[test]
fn debug_register_update_mid_instruction_is_misuse() {
    let mut system = boot(&[0x3D]); // MUL
    system.run_cycles(3); // mid-execution
    let err = system
        .cpu_mut()
        .debug_register_update(Register::X, 0x1234)
        .expect_err("mid-instruction update must be rejected");
    assert_eq!(
        err,
        CpuError::MidInstructionRegisterUpdate {
            register: Register::X
        }
    );
    assert!(
        !system.cpu().is_failed(),
        "host misuse is not a CPU fail state"
    );
}

#[test]
fn foreign_bus_results_are_dropped() {
    let mut system = boot(&[0x86, 0x2A]);
    // Inject a result for an address nobody asked about; the next
    // instruction must still read its own operand.
    system.cpu_mut().memory_read_result(0xDEAD, 0xFF);
    system.step_instruction();
    assert_eq!(system.registers().a(), 0x2A);
}

#[test]
fn config_rejects_virtual_watch_registers() {
    let config = CpuConfig {
        immediate_update_registers: vec![Register::A],
        ..CpuConfig::default()
    };
    assert!(Simple6809System::with_config(config).is_err());
}
