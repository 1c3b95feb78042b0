//! Register file definitions.
//!
//! Fifteen 64-bit registers identified by fixed index: five memory/data
//! registers, two execution registers, and eight general-purpose slots.
//! Operand words name registers by index; anything outside the file is a
//! fault, never a silent wrap.

use crate::errors::VmError;

/// Number of registers in the file.
pub const REGISTER_COUNT: usize = 15;

/// Register identifiers, in file order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Register {
    /// Memory channel selector for `st`/`ld`.
    Mch = 0,
    /// Memory address register.
    Mar = 1,
    /// Memory data register.
    Mdr = 2,
    /// Accumulator.
    Acc = 3,
    /// Operand for accumulator instructions.
    Dat = 4,
    /// Current execution address (instruction pointer).
    Cea = 5,
    /// Call-stack pointer.
    Csp = 6,
    Gp0 = 7,
    Gp1 = 8,
    Gp2 = 9,
    Gp3 = 10,
    Gp4 = 11,
    Gp5 = 12,
    Gp6 = 13,
    Gp7 = 14,
}

impl Register {
    /// All registers in index order, for traceback iteration.
    pub const ALL: [Register; REGISTER_COUNT] = [
        Register::Mch,
        Register::Mar,
        Register::Mdr,
        Register::Acc,
        Register::Dat,
        Register::Cea,
        Register::Csp,
        Register::Gp0,
        Register::Gp1,
        Register::Gp2,
        Register::Gp3,
        Register::Gp4,
        Register::Gp5,
        Register::Gp6,
        Register::Gp7,
    ];

    /// Full display name used by the traceback dump.
    pub const fn name(&self) -> &'static str {
        match self {
            Register::Mch => "MCH (Memory Channel)",
            Register::Mar => "MAR (Memory Address Register)",
            Register::Mdr => "MDR (Memory Data Register)",
            Register::Acc => "ACC (Accumulator)",
            Register::Dat => "DAT (Data)",
            Register::Cea => "CEA (Current Execution Address)",
            Register::Csp => "CSP (Callstack Pointer)",
            Register::Gp0 => "GP0 (General Purpose 0)",
            Register::Gp1 => "GP1 (General Purpose 1)",
            Register::Gp2 => "GP2 (General Purpose 2)",
            Register::Gp3 => "GP3 (General Purpose 3)",
            Register::Gp4 => "GP4 (General Purpose 4)",
            Register::Gp5 => "GP5 (General Purpose 5)",
            Register::Gp6 => "GP6 (General Purpose 6)",
            Register::Gp7 => "GP7 (General Purpose 7)",
        }
    }
}

impl TryFrom<u64> for Register {
    type Error = VmError;

    /// Decodes a register operand word, faulting on indexes outside the file.
    fn try_from(value: u64) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(|idx| Register::ALL.get(idx).copied())
            .ok_or(VmError::UnknownRegister { index: value })
    }
}

/// The machine's register file.
///
/// All registers start at zero and are mutated only by instruction
/// execution; the file lives for the whole process.
#[derive(Debug, Default)]
pub struct RegisterFile {
    regs: [u64; REGISTER_COUNT],
}

impl RegisterFile {
    /// Creates a zeroed register file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the word held in `reg`.
    pub fn get(&self, reg: Register) -> u64 {
        self.regs[reg as usize]
    }

    /// Stores `value` into `reg`.
    pub fn set(&mut self, reg: Register, value: u64) {
        self.regs[reg as usize] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_start_zeroed() {
        let file = RegisterFile::new();
        for reg in Register::ALL {
            assert_eq!(file.get(reg), 0);
        }
    }

    #[test]
    fn set_and_get() {
        let mut file = RegisterFile::new();
        file.set(Register::Acc, 42);
        file.set(Register::Gp7, u64::MAX);
        assert_eq!(file.get(Register::Acc), 42);
        assert_eq!(file.get(Register::Gp7), u64::MAX);
        assert_eq!(file.get(Register::Dat), 0);
    }

    #[test]
    fn try_from_valid_indexes() {
        assert_eq!(Register::try_from(0).unwrap(), Register::Mch);
        assert_eq!(Register::try_from(5).unwrap(), Register::Cea);
        assert_eq!(Register::try_from(7).unwrap(), Register::Gp0);
        assert_eq!(Register::try_from(14).unwrap(), Register::Gp7);
    }

    #[test]
    fn try_from_out_of_range() {
        assert!(matches!(
            Register::try_from(15),
            Err(VmError::UnknownRegister { index: 15 })
        ));
        assert!(matches!(
            Register::try_from(u64::MAX),
            Err(VmError::UnknownRegister { .. })
        ));
    }

    #[test]
    fn all_is_in_index_order() {
        for (i, reg) in Register::ALL.iter().enumerate() {
            assert_eq!(*reg as usize, i);
        }
    }
}
