//! The opcode table: a static map from 8/16-bit opcode keys to instruction
//! descriptors. Single-byte opcodes use the low 8 bits; opcodes behind the
//! 0x10/0x11 prefixes use the full 16-bit key. Built once on first use and
//! shared by the fetch state and the disassembler.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::cpu::Cpu;
use crate::cpu::addressing::AddressingMode;
use crate::cpu::registers::Register;

/// Execute handler: runs against the CPU and its own descriptor, returns
/// true only when the instruction is complete.
pub(crate) type ExecHandler = fn(&mut Cpu, &'static Instruction) -> bool;

/// Static description of one opcode.
#[derive(Debug)]
pub struct Instruction {
    /// Mnemonic with the `{register}` template already substituted.
    pub mnemonic: String,
    /// The register the instruction publishes (target/source), when any.
    pub register: Option<Register>,
    pub mode: AddressingMode,
    /// Nominal cycle count as printed in the datasheet ("4+", "5(6)", ...).
    pub cycles: &'static str,
    pub(crate) start: Option<ExecHandler>,
    pub(crate) end: Option<ExecHandler>,
    /// Relative operand is 16 bits wide.
    pub is_long_branch: bool,
    /// The immediate operand is a postbyte (push/pull mask or register
    /// pair), not a value.
    pub has_postbyte: bool,
    /// Software-interrupt number (1..3) for SWI/SWI2/SWI3.
    pub swi: Option<u8>,
}

pub struct OpcodeTable {
    map: HashMap<u16, Instruction>,
}

impl OpcodeTable {
    pub fn get(&self, opcode: u16) -> Option<&Instruction> {
        self.map.get(&opcode)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &Instruction)> {
        self.map.iter().map(|(&k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// The shared table, built on first use.
pub fn table() -> &'static OpcodeTable {
    static TABLE: OnceLock<OpcodeTable> = OnceLock::new();
    TABLE.get_or_init(build)
}

struct Builder {
    map: HashMap<u16, Instruction>,
}

impl Builder {
    fn add(&mut self, opcode: u16, instruction: Instruction) {
        let previous = self.map.insert(opcode, instruction);
        debug_assert!(previous.is_none(), "duplicate opcode {opcode:#06x}");
    }

    /// Register a family sharing a mnemonic template and handlers.
    /// `{register}` in the template is replaced per entry.
    fn group(
        &mut self,
        template: &str,
        start: Option<ExecHandler>,
        end: Option<ExecHandler>,
        entries: &[(u16, Option<Register>, AddressingMode, &'static str)],
    ) {
        for &(opcode, register, mode, cycles) in entries {
            let mnemonic = match register {
                Some(r) => template.replace("{register}", r.name()),
                None => template.to_string(),
            };
            self.add(
                opcode,
                Instruction {
                    mnemonic,
                    register,
                    mode,
                    cycles,
                    start,
                    end,
                    is_long_branch: false,
                    has_postbyte: false,
                    swi: None,
                },
            );
        }
    }

    /// Register one short and one long conditional branch pair.
    fn branch(
        &mut self,
        short_opcode: u16,
        long_opcode: u16,
        mnemonic: &str,
        long_cycles: &'static str,
        start: ExecHandler,
    ) {
        self.add(
            short_opcode,
            Instruction {
                mnemonic: mnemonic.to_string(),
                register: None,
                mode: AddressingMode::Relative,
                cycles: "3",
                start: Some(start),
                end: Some(Cpu::branch_end),
                is_long_branch: false,
                has_postbyte: false,
                swi: None,
            },
        );
        self.add(
            long_opcode,
            Instruction {
                mnemonic: format!("L{mnemonic}"),
                register: None,
                mode: AddressingMode::Relative,
                cycles: long_cycles,
                start: Some(start),
                end: Some(Cpu::branch_end),
                is_long_branch: true,
                has_postbyte: false,
                swi: None,
            },
        );
    }

    /// Register a push/pull or exchange/transfer opcode, whose immediate
    /// operand is a postbyte.
    fn postbyte_op(
        &mut self,
        opcode: u16,
        mnemonic: &str,
        register: Option<Register>,
        cycles: &'static str,
        start: ExecHandler,
        end: ExecHandler,
    ) {
        self.add(
            opcode,
            Instruction {
                mnemonic: mnemonic.to_string(),
                register,
                mode: AddressingMode::Immediate,
                cycles,
                start: Some(start),
                end: Some(end),
                is_long_branch: false,
                has_postbyte: true,
                swi: None,
            },
        );
    }

    fn software_interrupt(&mut self, opcode: u16, mnemonic: &str, number: u8, cycles: &'static str) {
        self.add(
            opcode,
            Instruction {
                mnemonic: mnemonic.to_string(),
                register: None,
                mode: AddressingMode::Inherent,
                cycles,
                start: Some(Cpu::swi_start),
                end: Some(Cpu::swi_end),
                is_long_branch: false,
                has_postbyte: false,
                swi: Some(number),
            },
        );
    }
}

fn build() -> OpcodeTable {
    use AddressingMode::{Direct, Extended, Immediate, Indexed, Inherent, Relative};
    use Register::{A, B, D, S, U, X, Y};

    let mut b = Builder {
        map: HashMap::new(),
    };

    // --- Loads and stores ---

    b.group(
        "LD{register}",
        Some(Cpu::ld_start),
        Some(Cpu::ld_end),
        &[
            (0x86, Some(A), Immediate, "2"),
            (0x96, Some(A), Direct, "4"),
            (0xA6, Some(A), Indexed, "4+"),
            (0xB6, Some(A), Extended, "5"),
            (0xC6, Some(B), Immediate, "2"),
            (0xD6, Some(B), Direct, "4"),
            (0xE6, Some(B), Indexed, "4+"),
            (0xF6, Some(B), Extended, "5"),
            (0xCC, Some(D), Immediate, "3"),
            (0xDC, Some(D), Direct, "5"),
            (0xEC, Some(D), Indexed, "5+"),
            (0xFC, Some(D), Extended, "6"),
            (0x8E, Some(X), Immediate, "3"),
            (0x9E, Some(X), Direct, "5"),
            (0xAE, Some(X), Indexed, "5+"),
            (0xBE, Some(X), Extended, "6"),
            (0xCE, Some(U), Immediate, "3"),
            (0xDE, Some(U), Direct, "5"),
            (0xEE, Some(U), Indexed, "5+"),
            (0xFE, Some(U), Extended, "6"),
            (0x108E, Some(Y), Immediate, "4"),
            (0x109E, Some(Y), Direct, "6"),
            (0x10AE, Some(Y), Indexed, "6+"),
            (0x10BE, Some(Y), Extended, "7"),
            (0x10CE, Some(S), Immediate, "4"),
            (0x10DE, Some(S), Direct, "6"),
            (0x10EE, Some(S), Indexed, "6+"),
            (0x10FE, Some(S), Extended, "7"),
        ],
    );

    b.group(
        "ST{register}",
        Some(Cpu::st_start),
        Some(Cpu::st_end),
        &[
            (0x97, Some(A), Direct, "4"),
            (0xA7, Some(A), Indexed, "4+"),
            (0xB7, Some(A), Extended, "5"),
            (0xD7, Some(B), Direct, "4"),
            (0xE7, Some(B), Indexed, "4+"),
            (0xF7, Some(B), Extended, "5"),
            (0xDD, Some(D), Direct, "5"),
            (0xED, Some(D), Indexed, "5+"),
            (0xFD, Some(D), Extended, "6"),
            (0x9F, Some(X), Direct, "5"),
            (0xAF, Some(X), Indexed, "5+"),
            (0xBF, Some(X), Extended, "6"),
            (0xDF, Some(U), Direct, "5"),
            (0xEF, Some(U), Indexed, "5+"),
            (0xFF, Some(U), Extended, "6"),
            (0x109F, Some(Y), Direct, "6"),
            (0x10AF, Some(Y), Indexed, "6+"),
            (0x10BF, Some(Y), Extended, "7"),
            (0x10DF, Some(S), Direct, "6"),
            (0x10EF, Some(S), Indexed, "6+"),
            (0x10FF, Some(S), Extended, "7"),
        ],
    );

    b.group(
        "LEA{register}",
        None,
        Some(Cpu::lea_end),
        &[
            (0x30, Some(X), Indexed, "4+"),
            (0x31, Some(Y), Indexed, "4+"),
            (0x32, Some(S), Indexed, "4+"),
            (0x33, Some(U), Indexed, "4+"),
        ],
    );

    // --- 8-bit arithmetic and logic ---

    b.group(
        "SUB{register}",
        Some(Cpu::alu_start),
        Some(Cpu::sub_end),
        &[
            (0x80, Some(A), Immediate, "2"),
            (0x90, Some(A), Direct, "4"),
            (0xA0, Some(A), Indexed, "4+"),
            (0xB0, Some(A), Extended, "5"),
            (0xC0, Some(B), Immediate, "2"),
            (0xD0, Some(B), Direct, "4"),
            (0xE0, Some(B), Indexed, "4+"),
            (0xF0, Some(B), Extended, "5"),
        ],
    );

    b.group(
        "CMP{register}",
        Some(Cpu::alu_start),
        Some(Cpu::cmp_end),
        &[
            (0x81, Some(A), Immediate, "2"),
            (0x91, Some(A), Direct, "4"),
            (0xA1, Some(A), Indexed, "4+"),
            (0xB1, Some(A), Extended, "5"),
            (0xC1, Some(B), Immediate, "2"),
            (0xD1, Some(B), Direct, "4"),
            (0xE1, Some(B), Indexed, "4+"),
            (0xF1, Some(B), Extended, "5"),
        ],
    );

    b.group(
        "SBC{register}",
        Some(Cpu::alu_start),
        Some(Cpu::sbc_end),
        &[
            (0x82, Some(A), Immediate, "2"),
            (0x92, Some(A), Direct, "4"),
            (0xA2, Some(A), Indexed, "4+"),
            (0xB2, Some(A), Extended, "5"),
            (0xC2, Some(B), Immediate, "2"),
            (0xD2, Some(B), Direct, "4"),
            (0xE2, Some(B), Indexed, "4+"),
            (0xF2, Some(B), Extended, "5"),
        ],
    );

    b.group(
        "AND{register}",
        Some(Cpu::alu_start),
        Some(Cpu::and_end),
        &[
            (0x84, Some(A), Immediate, "2"),
            (0x94, Some(A), Direct, "4"),
            (0xA4, Some(A), Indexed, "4+"),
            (0xB4, Some(A), Extended, "5"),
            (0xC4, Some(B), Immediate, "2"),
            (0xD4, Some(B), Direct, "4"),
            (0xE4, Some(B), Indexed, "4+"),
            (0xF4, Some(B), Extended, "5"),
        ],
    );

    b.group(
        "BIT{register}",
        Some(Cpu::alu_start),
        Some(Cpu::bit_end),
        &[
            (0x85, Some(A), Immediate, "2"),
            (0x95, Some(A), Direct, "4"),
            (0xA5, Some(A), Indexed, "4+"),
            (0xB5, Some(A), Extended, "5"),
            (0xC5, Some(B), Immediate, "2"),
            (0xD5, Some(B), Direct, "4"),
            (0xE5, Some(B), Indexed, "4+"),
            (0xF5, Some(B), Extended, "5"),
        ],
    );

    b.group(
        "EOR{register}",
        Some(Cpu::alu_start),
        Some(Cpu::eor_end),
        &[
            (0x88, Some(A), Immediate, "2"),
            (0x98, Some(A), Direct, "4"),
            (0xA8, Some(A), Indexed, "4+"),
            (0xB8, Some(A), Extended, "5"),
            (0xC8, Some(B), Immediate, "2"),
            (0xD8, Some(B), Direct, "4"),
            (0xE8, Some(B), Indexed, "4+"),
            (0xF8, Some(B), Extended, "5"),
        ],
    );

    b.group(
        "ADC{register}",
        Some(Cpu::alu_start),
        Some(Cpu::adc_end),
        &[
            (0x89, Some(A), Immediate, "2"),
            (0x99, Some(A), Direct, "4"),
            (0xA9, Some(A), Indexed, "4+"),
            (0xB9, Some(A), Extended, "5"),
            (0xC9, Some(B), Immediate, "2"),
            (0xD9, Some(B), Direct, "4"),
            (0xE9, Some(B), Indexed, "4+"),
            (0xF9, Some(B), Extended, "5"),
        ],
    );

    b.group(
        "OR{register}",
        Some(Cpu::alu_start),
        Some(Cpu::or_end),
        &[
            (0x8A, Some(A), Immediate, "2"),
            (0x9A, Some(A), Direct, "4"),
            (0xAA, Some(A), Indexed, "4+"),
            (0xBA, Some(A), Extended, "5"),
            (0xCA, Some(B), Immediate, "2"),
            (0xDA, Some(B), Direct, "4"),
            (0xEA, Some(B), Indexed, "4+"),
            (0xFA, Some(B), Extended, "5"),
        ],
    );

    b.group(
        "ADD{register}",
        Some(Cpu::alu_start),
        Some(Cpu::add_end),
        &[
            (0x8B, Some(A), Immediate, "2"),
            (0x9B, Some(A), Direct, "4"),
            (0xAB, Some(A), Indexed, "4+"),
            (0xBB, Some(A), Extended, "5"),
            (0xCB, Some(B), Immediate, "2"),
            (0xDB, Some(B), Direct, "4"),
            (0xEB, Some(B), Indexed, "4+"),
            (0xFB, Some(B), Extended, "5"),
        ],
    );

    // --- 16-bit arithmetic and compares ---

    b.group(
        "SUBD",
        Some(Cpu::alu_start),
        Some(Cpu::sub16_end),
        &[
            (0x83, Some(D), Immediate, "4"),
            (0x93, Some(D), Direct, "6"),
            (0xA3, Some(D), Indexed, "6+"),
            (0xB3, Some(D), Extended, "7"),
        ],
    );

    b.group(
        "ADDD",
        Some(Cpu::alu_start),
        Some(Cpu::add16_end),
        &[
            (0xC3, Some(D), Immediate, "4"),
            (0xD3, Some(D), Direct, "6"),
            (0xE3, Some(D), Indexed, "6+"),
            (0xF3, Some(D), Extended, "7"),
        ],
    );

    b.group(
        "CMP{register}",
        Some(Cpu::alu_start),
        Some(Cpu::cmp16_end),
        &[
            (0x8C, Some(X), Immediate, "4"),
            (0x9C, Some(X), Direct, "6"),
            (0xAC, Some(X), Indexed, "6+"),
            (0xBC, Some(X), Extended, "7"),
            (0x1083, Some(D), Immediate, "5"),
            (0x1093, Some(D), Direct, "7"),
            (0x10A3, Some(D), Indexed, "7+"),
            (0x10B3, Some(D), Extended, "8"),
            (0x108C, Some(Y), Immediate, "5"),
            (0x109C, Some(Y), Direct, "7"),
            (0x10AC, Some(Y), Indexed, "7+"),
            (0x10BC, Some(Y), Extended, "8"),
            (0x1183, Some(U), Immediate, "5"),
            (0x1193, Some(U), Direct, "7"),
            (0x11A3, Some(U), Indexed, "7+"),
            (0x11B3, Some(U), Extended, "8"),
            (0x118C, Some(S), Immediate, "5"),
            (0x119C, Some(S), Direct, "7"),
            (0x11AC, Some(S), Indexed, "7+"),
            (0x11BC, Some(S), Extended, "8"),
        ],
    );

    b.group(
        "ANDCC",
        Some(Cpu::alu_start),
        Some(Cpu::andcc_end),
        &[(0x1C, None, Immediate, "3")],
    );

    b.group(
        "ORCC",
        Some(Cpu::alu_start),
        Some(Cpu::orcc_end),
        &[(0x1A, None, Immediate, "3")],
    );

    // --- Read-modify-write, memory forms ---

    b.group(
        "NEG",
        Some(Cpu::unary_mem_start),
        Some(Cpu::neg_mem_end),
        &[
            (0x00, None, Direct, "6"),
            (0x60, None, Indexed, "6+"),
            (0x70, None, Extended, "7"),
        ],
    );
    b.group(
        "COM",
        Some(Cpu::unary_mem_start),
        Some(Cpu::com_mem_end),
        &[
            (0x03, None, Direct, "6"),
            (0x63, None, Indexed, "6+"),
            (0x73, None, Extended, "7"),
        ],
    );
    b.group(
        "LSR",
        Some(Cpu::unary_mem_start),
        Some(Cpu::lsr_mem_end),
        &[
            (0x04, None, Direct, "6"),
            (0x64, None, Indexed, "6+"),
            (0x74, None, Extended, "7"),
        ],
    );
    b.group(
        "ROR",
        Some(Cpu::unary_mem_start),
        Some(Cpu::ror_mem_end),
        &[
            (0x06, None, Direct, "6"),
            (0x66, None, Indexed, "6+"),
            (0x76, None, Extended, "7"),
        ],
    );
    b.group(
        "ASR",
        Some(Cpu::unary_mem_start),
        Some(Cpu::asr_mem_end),
        &[
            (0x07, None, Direct, "6"),
            (0x67, None, Indexed, "6+"),
            (0x77, None, Extended, "7"),
        ],
    );
    b.group(
        "ASL",
        Some(Cpu::unary_mem_start),
        Some(Cpu::asl_mem_end),
        &[
            (0x08, None, Direct, "6"),
            (0x68, None, Indexed, "6+"),
            (0x78, None, Extended, "7"),
        ],
    );
    b.group(
        "ROL",
        Some(Cpu::unary_mem_start),
        Some(Cpu::rol_mem_end),
        &[
            (0x09, None, Direct, "6"),
            (0x69, None, Indexed, "6+"),
            (0x79, None, Extended, "7"),
        ],
    );
    b.group(
        "DEC",
        Some(Cpu::unary_mem_start),
        Some(Cpu::dec_mem_end),
        &[
            (0x0A, None, Direct, "6"),
            (0x6A, None, Indexed, "6+"),
            (0x7A, None, Extended, "7"),
        ],
    );
    b.group(
        "INC",
        Some(Cpu::unary_mem_start),
        Some(Cpu::inc_mem_end),
        &[
            (0x0C, None, Direct, "6"),
            (0x6C, None, Indexed, "6+"),
            (0x7C, None, Extended, "7"),
        ],
    );
    b.group(
        "TST",
        Some(Cpu::unary_mem_start),
        Some(Cpu::tst_mem_end),
        &[
            (0x0D, None, Direct, "6"),
            (0x6D, None, Indexed, "6+"),
            (0x7D, None, Extended, "7"),
        ],
    );
    b.group(
        "CLR",
        Some(Cpu::unary_mem_start),
        Some(Cpu::clr_mem_end),
        &[
            (0x0F, None, Direct, "6"),
            (0x6F, None, Indexed, "6+"),
            (0x7F, None, Extended, "7"),
        ],
    );

    // --- Read-modify-write, accumulator forms ---

    b.group(
        "NEG{register}",
        None,
        Some(Cpu::neg_acc_end),
        &[(0x40, Some(A), Inherent, "2"), (0x50, Some(B), Inherent, "2")],
    );
    b.group(
        "COM{register}",
        None,
        Some(Cpu::com_acc_end),
        &[(0x43, Some(A), Inherent, "2"), (0x53, Some(B), Inherent, "2")],
    );
    b.group(
        "LSR{register}",
        None,
        Some(Cpu::lsr_acc_end),
        &[(0x44, Some(A), Inherent, "2"), (0x54, Some(B), Inherent, "2")],
    );
    b.group(
        "ROR{register}",
        None,
        Some(Cpu::ror_acc_end),
        &[(0x46, Some(A), Inherent, "2"), (0x56, Some(B), Inherent, "2")],
    );
    b.group(
        "ASR{register}",
        None,
        Some(Cpu::asr_acc_end),
        &[(0x47, Some(A), Inherent, "2"), (0x57, Some(B), Inherent, "2")],
    );
    b.group(
        "ASL{register}",
        None,
        Some(Cpu::asl_acc_end),
        &[(0x48, Some(A), Inherent, "2"), (0x58, Some(B), Inherent, "2")],
    );
    b.group(
        "ROL{register}",
        None,
        Some(Cpu::rol_acc_end),
        &[(0x49, Some(A), Inherent, "2"), (0x59, Some(B), Inherent, "2")],
    );
    b.group(
        "DEC{register}",
        None,
        Some(Cpu::dec_acc_end),
        &[(0x4A, Some(A), Inherent, "2"), (0x5A, Some(B), Inherent, "2")],
    );
    b.group(
        "INC{register}",
        None,
        Some(Cpu::inc_acc_end),
        &[(0x4C, Some(A), Inherent, "2"), (0x5C, Some(B), Inherent, "2")],
    );
    b.group(
        "TST{register}",
        None,
        Some(Cpu::tst_acc_end),
        &[(0x4D, Some(A), Inherent, "2"), (0x5D, Some(B), Inherent, "2")],
    );
    b.group(
        "CLR{register}",
        None,
        Some(Cpu::clr_acc_end),
        &[(0x4F, Some(A), Inherent, "2"), (0x5F, Some(B), Inherent, "2")],
    );

    // --- Branches ---

    b.branch(0x20, 0x16, "BRA", "5", Cpu::bra_start);
    b.branch(0x21, 0x1021, "BRN", "5", Cpu::brn_start);
    b.branch(0x22, 0x1022, "BHI", "5(6)", Cpu::bhi_start);
    b.branch(0x23, 0x1023, "BLS", "5(6)", Cpu::bls_start);
    b.branch(0x24, 0x1024, "BCC", "5(6)", Cpu::bcc_start);
    b.branch(0x25, 0x1025, "BCS", "5(6)", Cpu::bcs_start);
    b.branch(0x26, 0x1026, "BNE", "5(6)", Cpu::bne_start);
    b.branch(0x27, 0x1027, "BEQ", "5(6)", Cpu::beq_start);
    b.branch(0x28, 0x1028, "BVC", "5(6)", Cpu::bvc_start);
    b.branch(0x29, 0x1029, "BVS", "5(6)", Cpu::bvs_start);
    b.branch(0x2A, 0x102A, "BPL", "5(6)", Cpu::bpl_start);
    b.branch(0x2B, 0x102B, "BMI", "5(6)", Cpu::bmi_start);
    b.branch(0x2C, 0x102C, "BGE", "5(6)", Cpu::bge_start);
    b.branch(0x2D, 0x102D, "BLT", "5(6)", Cpu::blt_start);
    b.branch(0x2E, 0x102E, "BGT", "5(6)", Cpu::bgt_start);
    b.branch(0x2F, 0x102F, "BLE", "5(6)", Cpu::ble_start);

    // --- Subroutines and jumps ---

    b.group(
        "BSR",
        Some(Cpu::jsr_start),
        Some(Cpu::jsr_end),
        &[(0x8D, None, Relative, "7")],
    );
    // LBSR: a page-1 long relative call.
    b.add(
        0x17,
        Instruction {
            mnemonic: "LBSR".to_string(),
            register: None,
            mode: Relative,
            cycles: "9",
            start: Some(Cpu::jsr_start),
            end: Some(Cpu::jsr_end),
            is_long_branch: true,
            has_postbyte: false,
            swi: None,
        },
    );

    b.group(
        "JSR",
        Some(Cpu::jsr_start),
        Some(Cpu::jsr_end),
        &[
            (0x9D, None, Direct, "7"),
            (0xAD, None, Indexed, "7+"),
            (0xBD, None, Extended, "8"),
        ],
    );

    b.group(
        "JMP",
        None,
        Some(Cpu::jmp_end),
        &[
            (0x0E, None, Direct, "3"),
            (0x6E, None, Indexed, "3+"),
            (0x7E, None, Extended, "4"),
        ],
    );

    b.group(
        "RTS",
        Some(Cpu::rts_start),
        Some(Cpu::rts_end),
        &[(0x39, None, Inherent, "5")],
    );

    b.group(
        "RTI",
        Some(Cpu::rti_start),
        Some(Cpu::rti_end),
        &[(0x3B, None, Inherent, "6/15")],
    );

    // --- Stack ---

    b.postbyte_op(0x34, "PSHS", Some(S), "5+", Cpu::psh_pul_start, Cpu::psh_end);
    b.postbyte_op(0x35, "PULS", Some(S), "5+", Cpu::psh_pul_start, Cpu::pul_end);
    b.postbyte_op(0x36, "PSHU", Some(U), "5+", Cpu::psh_pul_start, Cpu::psh_end);
    b.postbyte_op(0x37, "PULU", Some(U), "5+", Cpu::psh_pul_start, Cpu::pul_end);

    // --- Register moves ---

    b.postbyte_op(0x1E, "EXG", None, "8", Cpu::transfer_start, Cpu::exg_end);
    b.postbyte_op(0x1F, "TFR", None, "6", Cpu::transfer_start, Cpu::tfr_end);

    // --- Miscellaneous ---

    b.group("NOP", None, Some(Cpu::nop_end), &[(0x12, None, Inherent, "2")]);
    b.group("DAA", None, Some(Cpu::daa_end), &[(0x19, None, Inherent, "2")]);
    b.group("SEX", None, Some(Cpu::sex_end), &[(0x1D, None, Inherent, "2")]);
    b.group(
        "ABX",
        Some(Cpu::abx_start),
        Some(Cpu::abx_end),
        &[(0x3A, None, Inherent, "3")],
    );
    b.group(
        "MUL",
        Some(Cpu::mul_start),
        Some(Cpu::mul_end),
        &[(0x3D, None, Inherent, "11")],
    );

    b.software_interrupt(0x3F, "SWI", 1, "19");
    b.software_interrupt(0x103F, "SWI2", 2, "20");
    b.software_interrupt(0x113F, "SWI3", 3, "20");

    OpcodeTable { map: b.map }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_documented_set() {
        let t = table();
        // 59 mnemonics over all their modes.
        assert!(t.len() > 250, "table has {} entries", t.len());
        assert_eq!(t.get(0x86).unwrap().mnemonic, "LDA");
        assert_eq!(t.get(0x10CE).unwrap().mnemonic, "LDS");
        assert_eq!(t.get(0x113F).unwrap().swi, Some(3));
        assert!(t.get(0x16).unwrap().is_long_branch);
        assert!(t.get(0x34).unwrap().has_postbyte);
        // Undocumented holes stay absent.
        assert!(t.get(0x01).is_none());
        assert!(t.get(0x87).is_none());
        assert!(t.get(0x3E).is_none());
    }

    #[test]
    fn prefixed_opcodes_use_full_key() {
        let t = table();
        assert_eq!(t.get(0x108E).unwrap().mnemonic, "LDY");
        assert_eq!(t.get(0x8E).unwrap().mnemonic, "LDX");
        assert_eq!(t.get(0x1183).unwrap().mnemonic, "CMPU");
        assert_eq!(t.get(0x83).unwrap().mnemonic, "SUBD");
    }

    #[test]
    fn mnemonic_template_substitution() {
        let t = table();
        for (op, expected) in [(0x97u16, "STA"), (0xD7, "STB"), (0x10AF, "STY")] {
            assert_eq!(t.get(op).unwrap().mnemonic, expected);
        }
    }
}
