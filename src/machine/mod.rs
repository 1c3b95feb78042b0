//! Register-based word virtual machine.
//!
//! Executes flat program images produced by the [`assembler`](crate::assembler)
//! against fifteen 64-bit registers and four addressable memory channels.
//!
//! # Architecture
//!
//! - **Registers**: fifteen fixed slots ([`registers::Register`]), holding
//!   plain 64-bit words used for data, addresses and opcodes alike
//! - **Channels**: main memory, input, output and the call stack
//!   ([`channels::Channel`]), selected through the MCH register
//! - **Instruction format**: one opcode word followed by 0-2 operand words
//! - **Execution model**: a synchronous fetch-decode-execute loop with
//!   per-cycle polling of the screen and keyboard peripherals
//!
//! # Modules
//!
//! - [`channels`]: growable word stores, call stack, console and disk streams
//! - [`devices`]: screen/keyboard boundaries and headless implementations
//! - [`isa`]: instruction set definition and opcode mappings
//! - [`registers`]: register identifiers and the register file
//! - [`traceback`]: full-state dump on fatal stops
//! - [`vm`]: the execution engine itself

pub mod channels;
pub mod devices;
pub mod isa;
pub mod registers;
pub mod traceback;
pub mod vm;
