//! Replay generated single-step vectors against the core.
//!
//! Vector files are produced by the generator binary:
//!
//! ```text
//! cargo run -p cadmium-cpu-validation --bin gen_m6809_vectors -- 0x86 0x3A
//! ```
//!
//! Tests skip (with a notice) when the data is absent so a fresh checkout
//! stays green.

use std::path::PathBuf;

use cadmium_cpu_validation::{BusOp, TestVector, TracingSystem, read_vectors};

fn run_vector(vector: &TestVector) {
    let mut system = TracingSystem::new();
    for &(addr, value) in &vector.initial.ram {
        system.write_memory(addr, value);
    }
    system.boot_with(vector.initial.registers());

    assert!(
        system.step_instruction(),
        "{}: instruction did not complete",
        vector.name
    );

    let regs = system.cpu().snapshot();
    let expected = vector.final_state.registers();
    assert_eq!(regs, expected, "{}: registers", vector.name);

    for &(addr, value) in &vector.final_state.ram {
        assert_eq!(
            system.read_memory(addr),
            value,
            "{}: ram[{addr:#06X}]",
            vector.name
        );
    }

    let trace = system.trace();
    assert_eq!(
        trace.len(),
        vector.cycles.len(),
        "{}: bus access count",
        vector.name
    );
    for (i, ((exp_addr, exp_data, exp_op), actual)) in
        vector.cycles.iter().zip(trace.iter()).enumerate()
    {
        assert_eq!(actual.addr, *exp_addr, "{}: access {i} addr", vector.name);
        assert_eq!(actual.data, *exp_data, "{}: access {i} data", vector.name);
        let actual_op = match actual.op {
            BusOp::Read => "read",
            BusOp::Write => "write",
        };
        assert_eq!(actual_op, exp_op, "{}: access {i} op", vector.name);
    }
}

fn run_opcode_file(opcode: u8) {
    let path = PathBuf::from(format!("test_data/m6809/{opcode:02X}.json.gz"));
    let Ok(vectors) = read_vectors(&path) else {
        eprintln!(
            "skipping {opcode:02X}: no vector file; generate with \
             `cargo run -p cadmium-cpu-validation --bin gen_m6809_vectors -- {opcode:#04x}`"
        );
        return;
    };
    assert!(!vectors.is_empty(), "{}: empty vector file", path.display());
    for vector in &vectors {
        run_vector(vector);
    }
}

#[test]
fn opcode_86_lda_immediate() {
    run_opcode_file(0x86);
}

#[test]
fn opcode_8b_adda_immediate() {
    run_opcode_file(0x8B);
}

#[test]
fn opcode_a6_lda_indexed() {
    run_opcode_file(0xA6);
}

#[test]
fn opcode_34_pshs() {
    run_opcode_file(0x34);
}

#[test]
fn opcode_3a_abx() {
    run_opcode_file(0x3A);
}

#[test]
fn all_generated_files_replay() {
    let Ok(entries) = std::fs::read_dir("test_data/m6809") else {
        eprintln!("skipping: no test_data/m6809 directory");
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "gz") {
            let vectors = read_vectors(&path).expect("readable vector file");
            for vector in &vectors {
                run_vector(vector);
            }
        }
    }
}
