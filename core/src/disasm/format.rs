//! Textual rendering of disassembly rows with pluggable formatters.

use crate::cpu::postbyte::{IndexedAction, IndexedPostbyte};
use crate::cpu::registers::Register;

use super::{Disassembly, Operand};

/// Formatter hooks for addresses, raw bytes, and signed offsets.
pub struct RowFormat {
    pub address: fn(u16) -> String,
    pub byte: fn(u8) -> String,
    pub offset: fn(i16) -> String,
}

fn hex_address(value: u16) -> String {
    format!("{value:04X}")
}

fn hex_byte(value: u8) -> String {
    format!("{value:02X}")
}

fn signed_offset(value: i16) -> String {
    format!("{value}")
}

impl Default for RowFormat {
    fn default() -> Self {
        Self {
            address: hex_address,
            byte: hex_byte,
            offset: signed_offset,
        }
    }
}

fn register_list(registers: &[Register]) -> String {
    registers
        .iter()
        .map(|r| r.name())
        .collect::<Vec<_>>()
        .join(",")
}

fn indexed_text(postbyte: &IndexedPostbyte, operand: Option<u16>, fmt: &RowFormat) -> String {
    let base = postbyte.base.name();
    let inner = match postbyte.action {
        IndexedAction::Offset0 => format!(",{base}"),
        IndexedAction::Offset5 => {
            format!("{},{base}", (fmt.offset)(postbyte.embedded_offset()))
        }
        IndexedAction::Offset8 | IndexedAction::OffsetPc8 => {
            let value = crate::core::bits::sign_extend(operand.unwrap_or(0), 8) as i16;
            format!("{},{base}", (fmt.offset)(value))
        }
        IndexedAction::Offset16 | IndexedAction::OffsetPc16 => {
            let value = operand.unwrap_or(0) as i16;
            format!("{},{base}", (fmt.offset)(value))
        }
        IndexedAction::OffsetA => format!("A,{base}"),
        IndexedAction::OffsetB => format!("B,{base}"),
        IndexedAction::OffsetD => format!("D,{base}"),
        IndexedAction::PostInc1 => format!(",{base}+"),
        IndexedAction::PostInc2 => format!(",{base}++"),
        IndexedAction::PreDec1 => format!(",-{base}"),
        IndexedAction::PreDec2 => format!(",--{base}"),
        IndexedAction::ExtendedIndirect => {
            format!("${}", (fmt.address)(operand.unwrap_or(0)))
        }
    };
    if postbyte.indirect {
        format!("[{inner}]")
    } else {
        inner
    }
}

/// Operand text alone ("#$2A", "<$10", ",X+", "A,B", ...).
pub fn operand_text(row: &Disassembly, fmt: &RowFormat) -> String {
    match &row.operand {
        Operand::None => String::new(),
        Operand::Immediate8(v) => format!("#${}", (fmt.byte)(*v)),
        Operand::Immediate16(v) => format!("#${}", (fmt.address)(*v)),
        Operand::RegisterList(registers) => register_list(registers),
        Operand::RegisterPair(src, dst) => format!("{},{}", src.name(), dst.name()),
        Operand::Direct { low, .. } => format!("<${}", (fmt.byte)(*low)),
        Operand::Extended { addr } => format!("${}", (fmt.address)(*addr)),
        Operand::Indexed { postbyte, operand } => indexed_text(postbyte, *operand, fmt),
        Operand::Relative { target, .. } => format!("${}", (fmt.address)(*target)),
    }
}

/// One display row: address, raw bytes, mnemonic, operands, and an
/// effective-address hint where one was resolved.
pub fn format_row(row: &Disassembly, fmt: &RowFormat) -> String {
    let raw = row
        .bytes
        .iter()
        .map(|&b| (fmt.byte)(b))
        .collect::<Vec<_>>()
        .join(" ");
    let operand = operand_text(row, fmt);
    let mut line = format!(
        "{}  {raw:<11} {}",
        (fmt.address)(row.address),
        row.mnemonic
    );
    if !operand.is_empty() {
        line.push(' ');
        line.push_str(&operand);
    }
    // The hint repeats nothing for extended/relative operands whose text
    // already is the resolved address.
    if let Some(effective) = row.effective
        && matches!(
            row.operand,
            Operand::Direct { .. } | Operand::Indexed { .. }
        )
    {
        line.push_str(&format!("  ; ea=${}", (fmt.address)(effective)));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::registers::Registers;
    use crate::disasm::disassemble;

    fn disasm_bytes(bytes: &[u8], regs: Option<&Registers>) -> Disassembly {
        let image = bytes.to_vec();
        let mut read = move |addr: u16| *image.get(addr as usize).unwrap_or(&0);
        disassemble(&mut read, 0, regs).expect("valid encoding")
    }

    #[test]
    fn immediate_row() {
        let row = disasm_bytes(&[0x86, 0x2A], None);
        assert_eq!(row.mnemonic, "LDA");
        assert_eq!(operand_text(&row, &RowFormat::default()), "#$2A");
    }

    #[test]
    fn direct_row_unresolved_without_registers() {
        let row = disasm_bytes(&[0x97, 0x10], None);
        assert_eq!(row.effective, None);
        assert_eq!(operand_text(&row, &RowFormat::default()), "<$10");
    }

    #[test]
    fn direct_row_resolves_with_dp() {
        let regs = Registers {
            dp: 0x12,
            ..Registers::default()
        };
        let row = disasm_bytes(&[0x97, 0x10], Some(&regs));
        assert_eq!(row.effective, Some(0x1210));
    }

    #[test]
    fn indexed_rows() {
        let row = disasm_bytes(&[0xA6, 0x80], None); // LDA ,X+
        assert_eq!(operand_text(&row, &RowFormat::default()), ",X+");

        let row = disasm_bytes(&[0xA6, 0x83], None); // LDA ,--X... postbyte 0x83 = PreDec2,X
        assert_eq!(operand_text(&row, &RowFormat::default()), ",--X");

        let row = disasm_bytes(&[0xA6, 0x94], None); // LDA [,X]
        assert_eq!(operand_text(&row, &RowFormat::default()), "[,X]");
    }

    #[test]
    fn push_pull_register_lists() {
        let row = disasm_bytes(&[0x34, 0x06], None); // PSHS A,B
        assert_eq!(operand_text(&row, &RowFormat::default()), "A,B");

        let row = disasm_bytes(&[0x36, 0xFF], None); // PSHU everything
        assert_eq!(
            operand_text(&row, &RowFormat::default()),
            "CC,A,B,DP,X,Y,S,PC"
        );
    }

    #[test]
    fn transfer_pair() {
        let row = disasm_bytes(&[0x1F, 0x89], None); // TFR A,B
        assert_eq!(operand_text(&row, &RowFormat::default()), "A,B");
    }

    #[test]
    fn relative_target() {
        let row = disasm_bytes(&[0x27, 0x05], None); // BEQ +5
        assert_eq!(operand_text(&row, &RowFormat::default()), "$0007");
    }

    #[test]
    fn full_row_format() {
        let row = disasm_bytes(&[0x86, 0x2A], None);
        let line = format_row(&row, &RowFormat::default());
        assert!(line.starts_with("0000  86 2A"), "line: {line}");
        assert!(line.ends_with("LDA #$2A"), "line: {line}");
    }

    #[test]
    fn effective_address_hint() {
        let regs = Registers {
            dp: 0x12,
            ..Registers::default()
        };
        let row = disasm_bytes(&[0x97, 0x10], Some(&regs));
        let line = format_row(&row, &RowFormat::default());
        assert!(line.ends_with("STA <$10  ; ea=$1210"), "line: {line}");
    }

    #[test]
    fn custom_formatters_plug_in() {
        let fmt = RowFormat {
            offset: |v| format!("{v:+}"),
            ..RowFormat::default()
        };
        let row = disasm_bytes(&[0xA6, 0x05], None); // LDA 5,X
        assert_eq!(operand_text(&row, &fmt), "+5,X");
    }
}
