//! Error types for assembly and execution.
//!
//! Assembly keeps two tiers of failure. Recoverable source problems are
//! collected as [`Diagnostic`](crate::assembler::Diagnostic)s so a whole
//! file can be reported in one run; only the unrecoverable conditions
//! below surface as [`AsmError`]. Every runtime fault is a [`VmError`];
//! the runtime binary maps its variants onto the process exit codes.

use thiserror::Error;

/// Unrecoverable assembler failures.
#[derive(Debug, Error)]
pub enum AsmError {
    /// The source file could not be opened or read.
    #[error("could not open source file '{path}': {reason}")]
    SourceUnreadable { path: String, reason: String },
    /// A growable buffer could not be extended.
    #[error("could not allocate more memory for the {what}")]
    OutOfMemory { what: &'static str },
}

/// Errors that can occur while loading or executing a program image.
#[derive(Debug, Error)]
pub enum VmError {
    /// A growable word store could not be extended.
    #[error("could not allocate more memory for the {what}")]
    OutOfMemory { what: &'static str },
    /// The program image contained no words.
    #[error("program image is empty")]
    EmptyImage,
    /// Fetched opcode outside the instruction table.
    #[error("encountered unknown instruction '{opcode}'")]
    UnknownInstruction { opcode: u64 },
    /// Operand named a register index outside the register file.
    #[error("attempted to use unknown register '{index}'")]
    UnknownRegister { index: u64 },
    /// MCH selected a channel id outside the channel set.
    #[error("attempted access on unknown memory channel '{channel}'")]
    UnknownChannel { channel: u64 },
    /// Accumulator divide with DAT equal to zero.
    #[error("division by zero")]
    DivisionByZero,
    /// `rt` executed with an empty call stack.
    #[error("call-stack underflow")]
    CallStackUnderflow,
    /// A store/load combination the channel hardware cannot perform.
    #[error("unsupported channel operation: {what}")]
    UnsupportedChannelOp { what: &'static str },
    /// Console byte stream failure.
    #[error("console stream error: {reason}")]
    Console { reason: String },
    /// Disk byte stream failure.
    #[error("disk stream error: {reason}")]
    Disk { reason: String },
    /// Screen peripheral reported an error.
    #[error("screen device error: {reason}")]
    Screen { reason: String },
    /// Keyboard peripheral reported an error.
    #[error("keyboard device error: {reason}")]
    Keyboard { reason: String },
}
