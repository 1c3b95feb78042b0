//! Instruction Set Architecture (ISA) definitions.
//!
//! Defines the machine's instruction set. The
//! [`for_each_instruction!`](crate::for_each_instruction) macro holds the
//! canonical instruction definitions and invokes a callback macro for code
//! generation, so the assembler and the execution engine share one table
//! without duplicating it.
//!
//! This module generates:
//! - The [`Instruction`] enum with opcode mappings
//! - `TryFrom<u64>` for decoding fetched opcode words
//! - Mnemonic and operand-count lookups
//!
//! # Encoding
//!
//! Every instruction occupies one 64-bit word; its operands (zero, one or
//! two) occupy the words that follow it in main memory. Mnemonics are one
//! or two ASCII characters, matched literally by the assembler.

use crate::errors::VmError;

/// Invokes a callback macro with the complete instruction definition list.
///
/// Each entry is `Name = opcode, "mnemonic", operand_count`.
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            /// pl value, register ; place a literal word into a register
            Place = 0, "pl", 2,
            /// mv src, dst ; copy one register's word into another
            Move = 1, "mv", 2,
            /// st ; write MDR at address MAR on the channel selected by MCH
            Store = 2, "st", 0,
            /// ld ; read MDR from address MAR on the channel selected by MCH
            Load = 3, "ld", 0,
            /// jm addr ; unconditional jump
            Jump = 4, "jm", 1,
            /// js addr ; jump when ACC is non-zero
            JumpIfSet = 5, "js", 1,
            /// jc addr ; jump when ACC is zero
            JumpIfClear = 6, "jc", 1,
            /// a+ ; ACC += DAT
            Add = 7, "a+", 0,
            /// a- ; ACC -= DAT
            Sub = 8, "a-", 0,
            /// a! ; invert the bits of ACC
            Not = 9, "a!", 0,
            /// ai ; ACC += 1
            Increment = 10, "ai", 0,
            /// ad ; ACC -= 1
            Decrement = 11, "ad", 0,
            /// a* ; ACC *= DAT
            Mul = 12, "a*", 0,
            /// a/ ; ACC /= DAT (DAT of zero is a fault)
            Div = 13, "a/", 0,
            /// a& ; ACC &= DAT
            And = 14, "a&", 0,
            /// a| ; ACC |= DAT
            Or = 15, "a|", 0,
            /// a^ ; ACC ^= DAT
            Xor = 16, "a^", 0,
            /// al ; ACC <<= DAT
            ShiftLeft = 17, "al", 0,
            /// ar ; ACC >>= DAT
            ShiftRight = 18, "ar", 0,
            /// gt ; ACC = (ACC > DAT)
            Greater = 19, "gt", 0,
            /// lt ; ACC = (ACC < DAT)
            Less = 20, "lt", 0,
            /// ge ; ACC = (ACC >= DAT)
            GreaterEqual = 21, "ge", 0,
            /// le ; ACC = (ACC <= DAT)
            LessEqual = 22, "le", 0,
            /// eq ; ACC = (ACC == DAT)
            Equal = 23, "eq", 0,
            /// ne ; ACC = (ACC != DAT)
            NotEqual = 24, "ne", 0,
            /// cl addr ; push CEA onto the call stack and jump
            Call = 25, "cl", 1,
            /// rt ; pop the call stack and resume after the call
            Return = 26, "rt", 0,
            /// fi ; halt successfully
            Halt = 27, "fi", 0,
        }
    };
}

#[macro_export]
macro_rules! define_instructions {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal, $operands:literal
        ),* $(,)?
    ) => {
        /// The closed set of machine instructions, one variant per opcode.
        #[derive(Copy, Clone, Debug, Eq, PartialEq)]
        pub enum Instruction {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<u64> for Instruction {
            type Error = VmError;

            fn try_from(value: u64) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(Instruction::$name), )*
                    _ => Err(VmError::UnknownInstruction { opcode: value }),
                }
            }
        }

        impl Instruction {
            /// Returns the assembly mnemonic for this instruction.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Instruction::$name => $mnemonic, )*
                }
            }

            /// Returns the number of operand words following the opcode.
            pub const fn operand_count(&self) -> usize {
                match self {
                    $( Instruction::$name => $operands, )*
                }
            }

            /// Returns this instruction's opcode word.
            pub const fn opcode(&self) -> u64 {
                *self as u64
            }

            /// Looks up an instruction by its literal mnemonic text.
            pub fn from_mnemonic(text: &str) -> Option<Instruction> {
                match text {
                    $( $mnemonic => Some(Instruction::$name), )*
                    _ => None,
                }
            }
        }
    };
}

for_each_instruction!(define_instructions);

/// Number of instructions in the table; opcodes are `0..INSTRUCTION_COUNT`.
pub const INSTRUCTION_COUNT: u64 = 28;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcodes_are_dense() {
        for opcode in 0..INSTRUCTION_COUNT {
            let instr = Instruction::try_from(opcode).unwrap();
            assert_eq!(instr.opcode(), opcode);
        }
    }

    #[test]
    fn try_from_out_of_range() {
        assert!(matches!(
            Instruction::try_from(INSTRUCTION_COUNT),
            Err(VmError::UnknownInstruction { opcode }) if opcode == INSTRUCTION_COUNT
        ));
        assert!(matches!(
            Instruction::try_from(u64::MAX),
            Err(VmError::UnknownInstruction { .. })
        ));
    }

    #[test]
    fn mnemonic_roundtrip() {
        for opcode in 0..INSTRUCTION_COUNT {
            let instr = Instruction::try_from(opcode).unwrap();
            assert_eq!(Instruction::from_mnemonic(instr.mnemonic()), Some(instr));
        }
        assert_eq!(Instruction::from_mnemonic("zz"), None);
        assert_eq!(Instruction::from_mnemonic("PL"), None);
    }

    #[test]
    fn mnemonics_are_two_ascii_chars() {
        for opcode in 0..INSTRUCTION_COUNT {
            let m = Instruction::try_from(opcode).unwrap().mnemonic();
            assert_eq!(m.len(), 2);
            assert!(m.is_ascii());
        }
    }

    #[test]
    fn operand_counts() {
        assert_eq!(Instruction::Place.operand_count(), 2);
        assert_eq!(Instruction::Move.operand_count(), 2);
        assert_eq!(Instruction::Jump.operand_count(), 1);
        assert_eq!(Instruction::Call.operand_count(), 1);
        assert_eq!(Instruction::Store.operand_count(), 0);
        assert_eq!(Instruction::Halt.operand_count(), 0);
        for opcode in 0..INSTRUCTION_COUNT {
            assert!(Instruction::try_from(opcode).unwrap().operand_count() <= 2);
        }
    }
}
