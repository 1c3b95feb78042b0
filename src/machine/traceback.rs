//! Full machine-state dump for fatal stops.
//!
//! A debugging side effect only: dumps the register file, the call stack,
//! and all of main memory so a failure can be studied after the fact
//! without a separate debugger. Never alters machine state and is not
//! part of the binary contract between assembler and runtime.

use crate::machine::channels::Channel;
use crate::machine::devices::{KeyboardDevice, ScreenDevice};
use crate::machine::registers::Register;
use crate::machine::vm::Machine;
use std::io::{self, Write};

impl<S: ScreenDevice, K: KeyboardDevice> Machine<S, K> {
    /// Writes the traceback: every register with its id, name and value;
    /// the call stack top to bottom with the CSP marker; and main memory
    /// with markers at CEA and, when MCH selects main memory, at MAR.
    pub fn traceback(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "traceback:")?;

        writeln!(out, "\t---Registers---")?;
        writeln!(out, "\tNumber\tName                           \tCurrent Value")?;
        for (i, reg) in Register::ALL.iter().enumerate() {
            writeln!(out, "\t{}\t{:<31}\t{}", i, reg.name(), self.registers().get(*reg))?;
        }

        let csp = self.registers().get(Register::Csp);
        writeln!(out, "\t---Callstack---")?;
        writeln!(out, "\tAddress\tValue")?;
        for (i, value) in self.call_stack().frames().iter().enumerate().rev() {
            let marker = if i as u64 == csp { "\t<- CSP" } else { "" };
            writeln!(out, "\t{}\t{}{}", i, value, marker)?;
        }

        let cea = self.registers().get(Register::Cea);
        let mar = self.registers().get(Register::Mar);
        let mch_is_mem = self.registers().get(Register::Mch) == Channel::Mem as u64;
        writeln!(out, "\t---Main Memory---")?;
        writeln!(out, "\tAddress\tValue")?;
        for (i, word) in self.memory().words().iter().enumerate() {
            let cea_marker = if i as u64 == cea { "\t<- CEA" } else { "" };
            let mar_marker = if mch_is_mem && i as u64 == mar {
                "\t<- MAR"
            } else {
                ""
            };
            writeln!(out, "\t{}\t{}{}{}", i, word, cea_marker, mar_marker)?;
        }

        Ok(())
    }
}
