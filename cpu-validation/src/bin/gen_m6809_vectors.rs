//! Generate randomized single-step vectors for page-1 opcodes.
//!
//! For each selected opcode: randomize registers and the full 64 KiB
//! image, place the opcode at PC, execute one instruction, and record the
//! final state plus the byte-by-byte bus trace. Output goes to
//! `test_data/m6809/<op>.json.gz`.
//!
//! Usage: `gen_m6809_vectors [0x86 0x3A ...]` (no arguments: every page-1
//! opcode in the table).

use std::collections::BTreeSet;
use std::path::PathBuf;

use rand::Rng;

use cadmium_core::cpu::opcodes;
use cadmium_core::cpu::registers::Registers;
use cadmium_cpu_validation::{BusOp, TestVector, TracingSystem, VectorState, write_vectors};

const VECTORS_PER_OPCODE: usize = 200;

fn random_registers(rng: &mut impl Rng) -> Registers {
    let mut regs = Registers {
        dp: rng.r#gen(),
        cc: rng.r#gen(),
        d: 0,
        x: rng.r#gen(),
        y: rng.r#gen(),
        u: rng.r#gen(),
        s: rng.r#gen(),
        // Stay clear of the vector page and of wrap-around reads.
        pc: rng.gen_range(0x0100..0xFF00),
    };
    regs.set_a(rng.r#gen());
    regs.set_b(rng.r#gen());
    regs
}

fn touched_addresses(vector_trace: &[(u16, u8, String)]) -> BTreeSet<u16> {
    vector_trace.iter().map(|&(addr, _, _)| addr).collect()
}

fn generate_opcode(rng: &mut impl Rng, opcode: u8) -> Vec<TestVector> {
    let mut vectors = Vec::with_capacity(VECTORS_PER_OPCODE);
    let mut image = [0u8; 0x10000];

    for index in 0..VECTORS_PER_OPCODE {
        let mut system = TracingSystem::new();
        rng.fill(&mut image[..]);
        let initial_regs = random_registers(rng);
        image[initial_regs.pc as usize] = opcode;
        system.fill_memory(&image);
        system.boot_with(initial_regs);

        if !system.step_instruction() {
            // Skip vectors that hit a decode fault (reserved indexed or
            // transfer postbytes drawn from the random image).
            continue;
        }

        let trace: Vec<(u16, u8, String)> = system
            .trace()
            .iter()
            .map(|c| {
                (
                    c.addr,
                    c.data,
                    match c.op {
                        BusOp::Read => "read".to_string(),
                        BusOp::Write => "write".to_string(),
                    },
                )
            })
            .collect();

        let touched = touched_addresses(&trace);
        let initial_ram: Vec<(u16, u8)> = touched
            .iter()
            .map(|&addr| (addr, image[addr as usize]))
            .collect();
        let final_ram: Vec<(u16, u8)> = touched
            .iter()
            .map(|&addr| (addr, system.read_memory(addr)))
            .collect();

        let final_regs = system.cpu().snapshot();
        vectors.push(TestVector {
            name: format!("{opcode:02X} {index:04}"),
            initial: VectorState::from_registers(&initial_regs, initial_ram),
            final_state: VectorState::from_registers(&final_regs, final_ram),
            cycles: trace,
        });
    }
    vectors
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let targets: Vec<u8> = if args.is_empty() {
        // Every unprefixed opcode the table knows.
        (0..=0xFFu8)
            .filter(|&op| op != 0x10 && op != 0x11)
            .filter(|&op| opcodes::table().get(op as u16).is_some())
            .collect()
    } else {
        args.iter()
            .map(|a| {
                let trimmed = a.trim_start_matches("0x");
                u8::from_str_radix(trimmed, 16).unwrap_or_else(|_| panic!("bad opcode: {a}"))
            })
            .collect()
    };

    let mut rng = rand::thread_rng();
    for opcode in targets {
        let vectors = generate_opcode(&mut rng, opcode);
        let path = PathBuf::from(format!("test_data/m6809/{opcode:02X}.json.gz"));
        write_vectors(&path, &vectors).expect("write vector file");
        println!("{}: {} vectors", path.display(), vectors.len());
    }
}
