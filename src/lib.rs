//! A small stack-free, register-based word virtual machine and its
//! dedicated assembler.
//!
//! The [`assembler`] translates line-oriented source into a flat
//! [`image::Image`] of 64-bit words; the [`machine`] loads such an image
//! and executes it against fifteen registers and four addressable memory
//! channels (main memory, input, output, call stack).

pub mod assembler;
pub mod errors;
pub mod image;
pub mod machine;
pub mod utils;
