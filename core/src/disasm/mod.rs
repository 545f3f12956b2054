//! Read-only dual of the CPU's decoder, for debugger-style displays.
//!
//! [`disassemble`] walks memory through a read callback, shares the opcode
//! table and postbyte parsers with the CPU, and never mutates anything.
//! When a register snapshot is supplied, dp- and register-dependent
//! addresses resolve to concrete effective addresses; without one they are
//! carried symbolically.

pub mod format;

use std::fmt;

use crate::core::bits;
use crate::cpu::addressing::AddressingMode;
use crate::cpu::opcodes::{self, Instruction};
use crate::cpu::postbyte::{self, IndexedAction, IndexedPostbyte};
use crate::cpu::registers::{Register, Registers};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisasmError {
    UnknownOpcode(u16),
    InvalidIndexedPostbyte(u8),
    InvalidTransferPostbyte(u8),
}

impl fmt::Display for DisasmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisasmError::UnknownOpcode(op) => write!(f, "unknown opcode {op:#06x}"),
            DisasmError::InvalidIndexedPostbyte(pb) => {
                write!(f, "invalid indexed postbyte {pb:#04x}")
            }
            DisasmError::InvalidTransferPostbyte(pb) => {
                write!(f, "invalid transfer postbyte {pb:#04x}")
            }
        }
    }
}

impl std::error::Error for DisasmError {}

/// Decoded operand, resolved as far as the available registers allow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    None,
    Immediate8(u8),
    Immediate16(u16),
    /// Push/pull register list, in postbyte bit order.
    RegisterList(Vec<Register>),
    /// Exchange/transfer pair.
    RegisterPair(Register, Register),
    /// Direct-page: low byte always known, full address only with dp.
    Direct { low: u8, addr: Option<u16> },
    Extended { addr: u16 },
    Indexed {
        postbyte: IndexedPostbyte,
        /// Operand byte/word following the postbyte, when the action has
        /// one.
        operand: Option<u16>,
    },
    Relative { offset: i16, target: u16 },
}

/// One decoded instruction row.
#[derive(Clone, Debug)]
pub struct Disassembly {
    pub address: u16,
    pub bytes: Vec<u8>,
    pub instruction: &'static Instruction,
    pub mnemonic: String,
    pub operand: Operand,
    /// Fully resolved operand address, when computable.
    pub effective: Option<u16>,
}

impl Disassembly {
    pub fn len(&self) -> u16 {
        self.bytes.len() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Disassemble one instruction at `addr`.
pub fn disassemble(
    read: &mut dyn FnMut(u16) -> u8,
    addr: u16,
    regs: Option<&Registers>,
) -> Result<Disassembly, DisasmError> {
    fn take(read: &mut dyn FnMut(u16) -> u8, bytes: &mut Vec<u8>, cursor: &mut u16) -> u8 {
        let b = read(*cursor);
        bytes.push(b);
        *cursor = cursor.wrapping_add(1);
        b
    }

    let mut bytes = Vec::new();
    let mut cursor = addr;

    // Prefix handling mirrors the fetch state: repeated 0x10/0x11 bytes
    // collapse to the most recent one.
    let mut prefix: Option<u8> = None;
    let mut byte = take(read, &mut bytes, &mut cursor);
    while byte == 0x10 || byte == 0x11 {
        prefix = Some(byte);
        byte = take(read, &mut bytes, &mut cursor);
    }
    let key = match prefix {
        Some(p) => bits::compose(p, byte),
        None => byte as u16,
    };
    let instruction = opcodes::table()
        .get(key)
        .ok_or(DisasmError::UnknownOpcode(key))?;

    let mut effective = None;
    let operand = match instruction.mode {
        AddressingMode::Inherent => Operand::None,
        AddressingMode::Immediate => {
            if instruction.has_postbyte {
                let pb = take(read, &mut bytes, &mut cursor);
                match instruction.mnemonic.as_str() {
                    "EXG" | "TFR" => {
                        let (src, dst) = postbyte::parse_transfer(pb)
                            .ok_or(DisasmError::InvalidTransferPostbyte(pb))?;
                        Operand::RegisterPair(src, dst)
                    }
                    _ => {
                        let other = match instruction.register {
                            Some(Register::U) => Register::S,
                            _ => Register::U,
                        };
                        Operand::RegisterList(postbyte::push_pull_registers(pb, other))
                    }
                }
            } else if instruction.register.map_or(1, Register::bytes) == 2 {
                let high = take(read, &mut bytes, &mut cursor);
                let low = take(read, &mut bytes, &mut cursor);
                Operand::Immediate16(bits::compose(high, low))
            } else {
                Operand::Immediate8(take(read, &mut bytes, &mut cursor))
            }
        }
        AddressingMode::Direct => {
            let low = take(read, &mut bytes, &mut cursor);
            let resolved = regs.map(|r| bits::compose(r.dp, low));
            effective = resolved;
            Operand::Direct {
                low,
                addr: resolved,
            }
        }
        AddressingMode::Extended => {
            let high = take(read, &mut bytes, &mut cursor);
            let low = take(read, &mut bytes, &mut cursor);
            let target = bits::compose(high, low);
            effective = Some(target);
            Operand::Extended { addr: target }
        }
        AddressingMode::Indexed => {
            let pb = take(read, &mut bytes, &mut cursor);
            let postbyte = postbyte::parse_indexed(pb)
                .ok_or(DisasmError::InvalidIndexedPostbyte(pb))?;
            let operand = match postbyte.action.operand_bytes() {
                1 => Some(take(read, &mut bytes, &mut cursor) as u16),
                2 => {
                    let high = take(read, &mut bytes, &mut cursor);
                    let low = take(read, &mut bytes, &mut cursor);
                    Some(bits::compose(high, low))
                }
                _ => None,
            };
            effective = resolve_indexed(&postbyte, operand, cursor, regs);
            if postbyte.indirect
                && let Some(at) = effective
            {
                let high = read(at);
                let low = read(at.wrapping_add(1));
                effective = Some(bits::compose(high, low));
            }
            Operand::Indexed { postbyte, operand }
        }
        AddressingMode::Relative => {
            let offset = if instruction.is_long_branch {
                let high = take(read, &mut bytes, &mut cursor);
                let low = take(read, &mut bytes, &mut cursor);
                bits::compose(high, low) as i16
            } else {
                bits::sign_extend(take(read, &mut bytes, &mut cursor) as u16, 8) as i16
            };
            let target = cursor.wrapping_add(offset as u16);
            effective = Some(target);
            Operand::Relative { offset, target }
        }
    };

    Ok(Disassembly {
        address: addr,
        bytes,
        instruction,
        mnemonic: instruction.mnemonic.clone(),
        operand,
        effective,
    })
}

/// Compute the pre-indirection effective address, when the snapshot allows.
/// Auto-increment is not applied to the snapshot; pre-decrement addresses
/// use the decremented base, matching what execution would produce.
fn resolve_indexed(
    postbyte: &IndexedPostbyte,
    operand: Option<u16>,
    pc_after: u16,
    regs: Option<&Registers>,
) -> Option<u16> {
    let base_of = |r: Register| regs.map(|snapshot| snapshot.get(r));
    match postbyte.action {
        IndexedAction::ExtendedIndirect => operand,
        IndexedAction::OffsetPc8 => {
            Some(pc_after.wrapping_add(bits::sign_extend(operand?, 8)))
        }
        IndexedAction::OffsetPc16 => Some(pc_after.wrapping_add(operand?)),
        IndexedAction::Offset0 | IndexedAction::PostInc1 | IndexedAction::PostInc2 => {
            base_of(postbyte.base)
        }
        IndexedAction::PreDec1 => Some(base_of(postbyte.base)?.wrapping_sub(1)),
        IndexedAction::PreDec2 => Some(base_of(postbyte.base)?.wrapping_sub(2)),
        IndexedAction::Offset5 => {
            Some(base_of(postbyte.base)?.wrapping_add(postbyte.embedded_offset() as u16))
        }
        IndexedAction::Offset8 => {
            Some(base_of(postbyte.base)?.wrapping_add(bits::sign_extend(operand?, 8)))
        }
        IndexedAction::Offset16 => Some(base_of(postbyte.base)?.wrapping_add(operand?)),
        IndexedAction::OffsetA => {
            let snapshot = regs?;
            Some(
                snapshot
                    .get(postbyte.base)
                    .wrapping_add(bits::sign_extend(snapshot.a() as u16, 8)),
            )
        }
        IndexedAction::OffsetB => {
            let snapshot = regs?;
            Some(
                snapshot
                    .get(postbyte.base)
                    .wrapping_add(bits::sign_extend(snapshot.b() as u16, 8)),
            )
        }
        IndexedAction::OffsetD => {
            let snapshot = regs?;
            Some(snapshot.get(postbyte.base).wrapping_add(snapshot.d))
        }
    }
}
