//! Core execution engine.
//!
//! A single fetch-decode-execute loop over main memory. Each cycle reads
//! the opcode word at CEA, dispatches it through an exhaustive match over
//! the [`Instruction`] enum, polls the screen and keyboard devices once,
//! and advances CEA by exactly one word. Handlers that consume operand
//! words pre-advance CEA past them, and control transfers land one short
//! of their target so the loop's own increment finishes the jump.
//!
//! All word arithmetic wraps; the only arithmetic fault is dividing by
//! zero. Any handler or device failure stops the loop and is reported by
//! the caller alongside a [`traceback`](super::traceback) dump.

use crate::errors::VmError;
use crate::image::Image;
use crate::machine::channels::{CallStack, Channel, Console, DiskStream, WordStore};
use crate::machine::devices::{KeyboardDevice, ScreenDevice};
use crate::machine::isa::Instruction;
use crate::machine::registers::{Register, RegisterFile};
use crate::warn;

/// Outcome of one executed cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Step {
    /// The cycle completed; fetch the next instruction.
    Continue,
    /// A halt instruction was fetched; execution finished successfully.
    Halted,
}

/// The virtual machine: register file, memory channels, byte streams, and
/// the two peripheral devices.
///
/// The machine owns all mutable state; handlers receive it by exclusive
/// reference through `&mut self`, one instruction at a time.
#[derive(Debug)]
pub struct Machine<S: ScreenDevice, K: KeyboardDevice> {
    registers: RegisterFile,
    mem: WordStore,
    cst: CallStack,
    console: Console,
    disk: DiskStream,
    screen: S,
    keyboard: K,
}

impl<S: ScreenDevice, K: KeyboardDevice> Machine<S, K> {
    /// Boots a machine from a program image.
    ///
    /// The image becomes the initial contents of main memory; all
    /// registers start at zero, so execution begins at address zero. An
    /// empty image is refused before the loop ever runs.
    pub fn new(image: Image, disk: DiskStream, screen: S, keyboard: K) -> Result<Self, VmError> {
        if image.is_empty() {
            return Err(VmError::EmptyImage);
        }
        Ok(Self {
            registers: RegisterFile::new(),
            mem: WordStore::from_words(image.into_words(), "main memory"),
            cst: CallStack::new()?,
            console: Console::default(),
            disk,
            screen,
            keyboard,
        })
    }

    /// The register file.
    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    /// Main memory.
    pub fn memory(&self) -> &WordStore {
        &self.mem
    }

    /// The call-stack channel.
    pub fn call_stack(&self) -> &CallStack {
        &self.cst
    }

    /// The screen device.
    pub fn screen(&self) -> &S {
        &self.screen
    }

    /// The screen device, mutably (e.g. to request a close).
    pub fn screen_mut(&mut self) -> &mut S {
        &mut self.screen
    }

    /// The keyboard device, mutably (e.g. to enqueue events).
    pub fn keyboard_mut(&mut self) -> &mut K {
        &mut self.keyboard
    }

    /// Runs until halt or the first failure.
    pub fn run(&mut self) -> Result<(), VmError> {
        loop {
            if let Step::Halted = self.step()? {
                return Ok(());
            }
        }
    }

    /// Executes one cycle: fetch, decode, execute, poll devices, advance.
    pub fn step(&mut self) -> Result<Step, VmError> {
        let opcode = self.mem.read(self.registers.get(Register::Cea))?;
        let instruction = Instruction::try_from(opcode)?;
        if instruction == Instruction::Halt {
            return Ok(Step::Halted);
        }

        self.exec(instruction)?;
        self.screen.tick()?;
        self.keyboard.tick()?;

        self.advance(1);
        Ok(Step::Continue)
    }

    /// Dispatches one decoded instruction to its handler.
    fn exec(&mut self, instruction: Instruction) -> Result<(), VmError> {
        match instruction {
            Instruction::Place => self.op_place(),
            Instruction::Move => self.op_move(),
            Instruction::Store => self.op_store(),
            Instruction::Load => self.op_load(),
            Instruction::Jump => self.op_jump(),
            Instruction::JumpIfSet => self.op_jump_if_set(),
            Instruction::JumpIfClear => self.op_jump_if_clear(),
            Instruction::Add => self.op_add(),
            Instruction::Sub => self.op_sub(),
            Instruction::Not => self.op_not(),
            Instruction::Increment => self.op_increment(),
            Instruction::Decrement => self.op_decrement(),
            Instruction::Mul => self.op_mul(),
            Instruction::Div => self.op_div(),
            Instruction::And => self.op_and(),
            Instruction::Or => self.op_or(),
            Instruction::Xor => self.op_xor(),
            Instruction::ShiftLeft => self.op_shift_left(),
            Instruction::ShiftRight => self.op_shift_right(),
            Instruction::Greater => self.op_greater(),
            Instruction::Less => self.op_less(),
            Instruction::GreaterEqual => self.op_greater_equal(),
            Instruction::LessEqual => self.op_less_equal(),
            Instruction::Equal => self.op_equal(),
            Instruction::NotEqual => self.op_not_equal(),
            Instruction::Call => self.op_call(),
            Instruction::Return => self.op_return(),
            // The fetch loop stops on Halt before dispatching it.
            Instruction::Halt => Ok(()),
        }
    }

    /// Reads the operand word `offset` words past the current opcode.
    fn operand(&mut self, offset: u64) -> Result<u64, VmError> {
        let cea = self.registers.get(Register::Cea);
        self.mem.read(cea.wrapping_add(offset))
    }

    /// Moves CEA forward, e.g. past consumed operand words.
    fn advance(&mut self, words: u64) {
        let cea = self.registers.get(Register::Cea);
        self.registers.set(Register::Cea, cea.wrapping_add(words));
    }

    /// Points CEA one word short of `target`, so the loop's end-of-cycle
    /// increment lands exactly on it.
    fn transfer_to(&mut self, target: u64) {
        self.registers.set(Register::Cea, target.wrapping_sub(1));
    }

    // ==================== Data movement ====================

    /// pl value, register
    fn op_place(&mut self) -> Result<(), VmError> {
        let value = self.operand(1)?;
        let target = Register::try_from(self.operand(2)?)?;
        self.registers.set(target, value);
        self.advance(2);
        Ok(())
    }

    /// mv src, dst
    fn op_move(&mut self) -> Result<(), VmError> {
        let src = Register::try_from(self.operand(1)?)?;
        let dst = Register::try_from(self.operand(2)?)?;
        let value = self.registers.get(src);
        self.registers.set(dst, value);
        self.advance(2);
        Ok(())
    }

    /// st ; MDR -> channel MCH at address MAR
    fn op_store(&mut self) -> Result<(), VmError> {
        let channel = Channel::try_from(self.registers.get(Register::Mch))?;
        let mar = self.registers.get(Register::Mar);
        let mdr = self.registers.get(Register::Mdr);
        match channel {
            Channel::Mem => self.mem.write(mar, mdr),
            Channel::Cst => self.cst.write(mar, mdr),
            Channel::Inp => match mar {
                0 => Err(VmError::UnsupportedChannelOp {
                    what: "store to the console input stream",
                }),
                1 => self.disk.seek_to(mdr),
                2 => self.forward_screen_command(),
                _ => {
                    warn!("store to unimplemented peripheral slot '{}' on the input channel", mar);
                    Ok(())
                }
            },
            Channel::Out => match mar {
                0 => self.console.write_byte(mdr as u8),
                1 => self.disk.write_byte(mdr as u8),
                2 => self.forward_screen_command(),
                _ => {
                    warn!("store to unimplemented peripheral slot '{}' on the output channel", mar);
                    Ok(())
                }
            },
        }
    }

    /// ld ; channel MCH at address MAR -> MDR
    fn op_load(&mut self) -> Result<(), VmError> {
        let channel = Channel::try_from(self.registers.get(Register::Mch))?;
        let mar = self.registers.get(Register::Mar);
        match channel {
            Channel::Mem => {
                let value = self.mem.read(mar)?;
                self.registers.set(Register::Mdr, value);
                Ok(())
            }
            Channel::Cst => {
                let value = self.cst.read(mar)?;
                self.registers.set(Register::Mdr, value);
                Ok(())
            }
            Channel::Inp => match mar {
                0 => {
                    let byte = self.console.read_byte()?;
                    self.registers.set(Register::Mdr, byte);
                    Ok(())
                }
                1 => {
                    let position = self.disk.position()?;
                    self.registers.set(Register::Mdr, position);
                    Ok(())
                }
                2 => Err(VmError::UnsupportedChannelOp {
                    what: "load from the screen command slot on the input channel",
                }),
                _ => {
                    warn!("load from unimplemented peripheral slot '{}' on the input channel", mar);
                    Ok(())
                }
            },
            Channel::Out => match mar {
                0 => Err(VmError::UnsupportedChannelOp {
                    what: "load from the console output stream",
                }),
                1 => {
                    // End of disk leaves MDR untouched.
                    if let Some(byte) = self.disk.read_byte()? {
                        self.registers.set(Register::Mdr, byte as u64);
                    }
                    Ok(())
                }
                2 => Err(VmError::UnsupportedChannelOp {
                    what: "load from the screen command slot on the output channel",
                }),
                _ => {
                    warn!("load from unimplemented peripheral slot '{}' on the output channel", mar);
                    Ok(())
                }
            },
        }
    }

    /// Hands the screen the command buffer starting at MEM address MDR.
    /// Result values are written straight back into main memory.
    fn forward_screen_command(&mut self) -> Result<(), VmError> {
        let start = self.registers.get(Register::Mdr);
        let buffer = self.mem.slice_from_mut(start)?;
        self.screen.command(buffer)
    }

    // ==================== Control transfer ====================

    /// jm addr
    fn op_jump(&mut self) -> Result<(), VmError> {
        let target = self.operand(1)?;
        self.transfer_to(target);
        Ok(())
    }

    /// js addr ; taken when ACC is non-zero
    fn op_jump_if_set(&mut self) -> Result<(), VmError> {
        let target = self.operand(1)?;
        if self.registers.get(Register::Acc) != 0 {
            self.transfer_to(target);
        } else {
            self.advance(1);
        }
        Ok(())
    }

    /// jc addr ; taken when ACC is zero
    fn op_jump_if_clear(&mut self) -> Result<(), VmError> {
        let target = self.operand(1)?;
        if self.registers.get(Register::Acc) == 0 {
            self.transfer_to(target);
        } else {
            self.advance(1);
        }
        Ok(())
    }

    /// cl addr ; push CEA, jump
    fn op_call(&mut self) -> Result<(), VmError> {
        let target = self.operand(1)?;
        let cea = self.registers.get(Register::Cea);
        let top = self.cst.push(cea)?;
        self.registers.set(Register::Csp, top);
        self.transfer_to(target);
        Ok(())
    }

    /// rt ; pop, resume after the call's operand
    fn op_return(&mut self) -> Result<(), VmError> {
        let call_site = self.cst.pop()?;
        let new_top = (self.cst.depth() as u64).wrapping_sub(1);
        self.registers.set(Register::Csp, new_top);
        self.registers.set(Register::Cea, call_site.wrapping_add(1));
        Ok(())
    }

    // ==================== Accumulator arithmetic ====================

    /// a+
    fn op_add(&mut self) -> Result<(), VmError> {
        let acc = self.registers.get(Register::Acc);
        let dat = self.registers.get(Register::Dat);
        self.registers.set(Register::Acc, acc.wrapping_add(dat));
        Ok(())
    }

    /// a-
    fn op_sub(&mut self) -> Result<(), VmError> {
        let acc = self.registers.get(Register::Acc);
        let dat = self.registers.get(Register::Dat);
        self.registers.set(Register::Acc, acc.wrapping_sub(dat));
        Ok(())
    }

    /// a!
    fn op_not(&mut self) -> Result<(), VmError> {
        let acc = self.registers.get(Register::Acc);
        self.registers.set(Register::Acc, !acc);
        Ok(())
    }

    /// ai
    fn op_increment(&mut self) -> Result<(), VmError> {
        let acc = self.registers.get(Register::Acc);
        self.registers.set(Register::Acc, acc.wrapping_add(1));
        Ok(())
    }

    /// ad
    fn op_decrement(&mut self) -> Result<(), VmError> {
        let acc = self.registers.get(Register::Acc);
        self.registers.set(Register::Acc, acc.wrapping_sub(1));
        Ok(())
    }

    /// a*
    fn op_mul(&mut self) -> Result<(), VmError> {
        let acc = self.registers.get(Register::Acc);
        let dat = self.registers.get(Register::Dat);
        self.registers.set(Register::Acc, acc.wrapping_mul(dat));
        Ok(())
    }

    /// a/ ; DAT of zero is a defined fault
    fn op_div(&mut self) -> Result<(), VmError> {
        let acc = self.registers.get(Register::Acc);
        let dat = self.registers.get(Register::Dat);
        if dat == 0 {
            return Err(VmError::DivisionByZero);
        }
        self.registers.set(Register::Acc, acc / dat);
        Ok(())
    }

    // ==================== Accumulator bitwise ====================

    /// a&
    fn op_and(&mut self) -> Result<(), VmError> {
        let acc = self.registers.get(Register::Acc);
        let dat = self.registers.get(Register::Dat);
        self.registers.set(Register::Acc, acc & dat);
        Ok(())
    }

    /// a|
    fn op_or(&mut self) -> Result<(), VmError> {
        let acc = self.registers.get(Register::Acc);
        let dat = self.registers.get(Register::Dat);
        self.registers.set(Register::Acc, acc | dat);
        Ok(())
    }

    /// a^
    fn op_xor(&mut self) -> Result<(), VmError> {
        let acc = self.registers.get(Register::Acc);
        let dat = self.registers.get(Register::Dat);
        self.registers.set(Register::Acc, acc ^ dat);
        Ok(())
    }

    /// al ; shifts of 64 or more clear ACC
    fn op_shift_left(&mut self) -> Result<(), VmError> {
        let acc = self.registers.get(Register::Acc);
        let dat = self.registers.get(Register::Dat);
        let shifted = if dat >= 64 { 0 } else { acc << dat };
        self.registers.set(Register::Acc, shifted);
        Ok(())
    }

    /// ar ; shifts of 64 or more clear ACC
    fn op_shift_right(&mut self) -> Result<(), VmError> {
        let acc = self.registers.get(Register::Acc);
        let dat = self.registers.get(Register::Dat);
        let shifted = if dat >= 64 { 0 } else { acc >> dat };
        self.registers.set(Register::Acc, shifted);
        Ok(())
    }

    // ==================== Comparisons ====================

    /// gt
    fn op_greater(&mut self) -> Result<(), VmError> {
        let acc = self.registers.get(Register::Acc);
        let dat = self.registers.get(Register::Dat);
        self.registers.set(Register::Acc, (acc > dat) as u64);
        Ok(())
    }

    /// lt
    fn op_less(&mut self) -> Result<(), VmError> {
        let acc = self.registers.get(Register::Acc);
        let dat = self.registers.get(Register::Dat);
        self.registers.set(Register::Acc, (acc < dat) as u64);
        Ok(())
    }

    /// ge
    fn op_greater_equal(&mut self) -> Result<(), VmError> {
        let acc = self.registers.get(Register::Acc);
        let dat = self.registers.get(Register::Dat);
        self.registers.set(Register::Acc, (acc >= dat) as u64);
        Ok(())
    }

    /// le
    fn op_less_equal(&mut self) -> Result<(), VmError> {
        let acc = self.registers.get(Register::Acc);
        let dat = self.registers.get(Register::Dat);
        self.registers.set(Register::Acc, (acc <= dat) as u64);
        Ok(())
    }

    /// eq
    fn op_equal(&mut self) -> Result<(), VmError> {
        let acc = self.registers.get(Register::Acc);
        let dat = self.registers.get(Register::Dat);
        self.registers.set(Register::Acc, (acc == dat) as u64);
        Ok(())
    }

    /// ne
    fn op_not_equal(&mut self) -> Result<(), VmError> {
        let acc = self.registers.get(Register::Acc);
        let dat = self.registers.get(Register::Dat);
        self.registers.set(Register::Acc, (acc != dat) as u64);
        Ok(())
    }
}
