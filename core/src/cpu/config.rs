//! CPU construction-time configuration: interrupt vectors, host-function
//! addresses, and the register subset announced on every write.

use std::fmt;

use crate::cpu::registers::{Register, RegisterSet};

/// Configuration rejected at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A and B are views over D and cannot be watched individually.
    VirtualRegisterWatch(Register),
    /// The same host-function address was listed twice.
    DuplicateFunction(u16),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::VirtualRegisterWatch(r) => {
                write!(f, "register {} cannot be watched; watch D instead", r.name())
            }
            ConfigError::DuplicateFunction(pc) => {
                write!(f, "duplicate host-function address {pc:#06x}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CpuConfig {
    pub reset_vector: u16,
    pub nmi_vector: u16,
    pub swi_vector: u16,
    pub irq_vector: u16,
    pub firq_vector: u16,
    pub swi2_vector: u16,
    pub swi3_vector: u16,
    /// PC values that divert execution to the host (`cpu:function`).
    pub functions: Vec<u16>,
    /// Registers announced via `cpu:register_update` on every write.
    pub immediate_update_registers: Vec<Register>,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            reset_vector: 0xFFFE,
            nmi_vector: 0xFFFC,
            swi_vector: 0xFFFA,
            irq_vector: 0xFFF8,
            firq_vector: 0xFFF6,
            swi2_vector: 0xFFF4,
            swi3_vector: 0xFFF2,
            functions: Vec::new(),
            immediate_update_registers: vec![Register::Pc, Register::S, Register::U],
        }
    }
}

impl CpuConfig {
    /// Check the watch set and function list. Called by `Cpu::new`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for &r in &self.immediate_update_registers {
            if r.is_virtual() {
                return Err(ConfigError::VirtualRegisterWatch(r));
            }
        }
        for (i, &pc) in self.functions.iter().enumerate() {
            if self.functions[..i].contains(&pc) {
                return Err(ConfigError::DuplicateFunction(pc));
            }
        }
        Ok(())
    }

    pub(crate) fn watch_set(&self) -> RegisterSet {
        RegisterSet::of(&self.immediate_update_registers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_vectors_match_hardware_map() {
        let config = CpuConfig::default();
        assert_eq!(config.reset_vector, 0xFFFE);
        assert_eq!(config.nmi_vector, 0xFFFC);
        assert_eq!(config.swi_vector, 0xFFFA);
        assert_eq!(config.irq_vector, 0xFFF8);
        assert_eq!(config.firq_vector, 0xFFF6);
        assert_eq!(config.swi2_vector, 0xFFF4);
        assert_eq!(config.swi3_vector, 0xFFF2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn virtual_registers_rejected_in_watch_set() {
        let config = CpuConfig {
            immediate_update_registers: vec![Register::A],
            ..CpuConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::VirtualRegisterWatch(Register::A))
        );
    }

    #[test]
    fn duplicate_functions_rejected() {
        let config = CpuConfig {
            functions: vec![0xE000, 0xE000],
            ..CpuConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateFunction(0xE000))
        );
    }
}
