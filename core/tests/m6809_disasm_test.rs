use cadmium_core::cpu::addressing::AddressingMode;
use cadmium_core::cpu::opcodes;
use cadmium_core::cpu::registers::{Register, Registers};
use cadmium_core::disasm::{Disassembly, Operand, disassemble};

/// Canonical operand bytes for one table entry, so every opcode gets a
/// well-formed encoding.
fn encode(key: u16, instr: &opcodes::Instruction) -> Vec<u8> {
    let mut bytes = Vec::new();
    if key > 0xFF {
        bytes.push((key >> 8) as u8);
    }
    bytes.push(key as u8);
    match instr.mode {
        AddressingMode::Inherent => {}
        AddressingMode::Immediate => {
            if instr.has_postbyte {
                // A register pair for EXG/TFR, a two-register mask
                // otherwise.
                if instr.mnemonic == "EXG" || instr.mnemonic == "TFR" {
                    bytes.push(0x89); // A,B
                } else {
                    bytes.push(0x06); // A,B
                }
            } else if instr.register.map_or(1, Register::bytes) == 2 {
                bytes.extend([0x12, 0x34]);
            } else {
                bytes.push(0x12);
            }
        }
        AddressingMode::Direct => bytes.push(0x10),
        AddressingMode::Extended => bytes.extend([0x12, 0x34]),
        AddressingMode::Indexed => bytes.push(0x84), // ,X
        AddressingMode::Relative => {
            if instr.is_long_branch {
                bytes.extend([0x00, 0x05]);
            } else {
                bytes.push(0x05);
            }
        }
    }
    bytes
}

fn disasm(bytes: &[u8], regs: Option<&Registers>) -> Disassembly {
    let image = bytes.to_vec();
    let mut read = move |addr: u16| *image.get(addr as usize).unwrap_or(&0);
    disassemble(&mut read, 0, regs).expect("canonical encoding decodes")
}

#[test]
fn every_table_entry_round_trips() {
    for (key, instr) in opcodes::table().iter() {
        let bytes = encode(key, instr);
        let row = disasm(&bytes, None);
        assert_eq!(
            row.mnemonic, instr.mnemonic,
            "mnemonic for opcode {key:#06x}"
        );
        assert_eq!(
            row.bytes, bytes,
            "byte echo for opcode {key:#06x} ({})",
            instr.mnemonic
        );
    }
}

#[test]
fn length_matches_pc_advance() {
    // The disassembled byte count is what decode consumes: spot-check the
    // width extremes.
    for (bytes, len) in [
        (vec![0x12u8], 1u16),                    // NOP
        (vec![0x86, 0x2A], 2),                   // LDA #
        (vec![0x10, 0x8E, 0x12, 0x34], 4),       // LDY #
        (vec![0xA6, 0x89, 0x01, 0x00], 4),       // LDA n16,X
        (vec![0x10, 0x27, 0x00, 0x10], 4),       // LBEQ
        (vec![0x7F, 0x20, 0x00], 3),             // CLR ext
    ] {
        let row = disasm(&bytes, None);
        assert_eq!(row.len(), len, "length of {bytes:02X?}");
    }
}

#[test]
fn prefix_collapse_matches_the_cpu() {
    let row = disasm(&[0x10, 0x10, 0x11, 0x8C, 0x00, 0x10], None);
    assert_eq!(row.mnemonic, "CMPS", "last prefix wins");
    assert_eq!(row.len(), 6);
}

#[test]
fn unresolved_without_registers_resolved_with() {
    let row = disasm(&[0x96, 0x42], None); // LDA <$42
    assert!(matches!(
        row.operand,
        Operand::Direct { low: 0x42, addr: None }
    ));
    assert_eq!(row.effective, None);

    let regs = Registers {
        dp: 0x20,
        ..Registers::default()
    };
    let row = disasm(&[0x96, 0x42], Some(&regs));
    assert_eq!(row.effective, Some(0x2042));
}

#[test]
fn indexed_resolution_uses_the_snapshot() {
    let regs = Registers {
        x: 0x1000,
        ..Registers::default()
    };
    let row = disasm(&[0xA6, 0x05], Some(&regs)); // LDA 5,X
    assert_eq!(row.effective, Some(0x1005));

    // Pre-decrement shows the address execution would use.
    let row = disasm(&[0xA6, 0x82], Some(&regs)); // LDA ,-X
    assert_eq!(row.effective, Some(0x0FFF));

    let row = disasm(&[0xA6, 0x05], None);
    assert_eq!(row.effective, None, "no snapshot, no base register");
}

#[test]
fn indirect_resolution_reads_through_memory() {
    let mut image = vec![0u8; 0x10000];
    image[0] = 0xA6; // LDA [,X]
    image[1] = 0x94;
    image[0x1000] = 0x20;
    image[0x1001] = 0x00;
    let regs = Registers {
        x: 0x1000,
        ..Registers::default()
    };
    let mut read = move |addr: u16| image[addr as usize];
    let row = disassemble(&mut read, 0, Some(&regs)).expect("valid");
    assert_eq!(row.effective, Some(0x2000), "pointer followed");
}

#[test]
fn relative_targets_need_no_snapshot() {
    let row = disasm(&[0x27, 0xFE], None); // BEQ -2 (self)
    assert_eq!(row.effective, Some(0x0000));
    if let Operand::Relative { offset, target } = row.operand {
        assert_eq!(offset, -2);
        assert_eq!(target, 0x0000);
    } else {
        panic!("expected a relative operand");
    }
}

#[test]
fn invalid_encodings_error() {
    assert!(disassemble(&mut |_| 0x01, 0, None).is_err(), "unknown opcode");
    let bytes = [0xA6u8, 0x87]; // reserved indexed postbyte
    let mut read = move |addr: u16| *bytes.get(addr as usize).unwrap_or(&0);
    assert!(disassemble(&mut read, 0, None).is_err());
}
