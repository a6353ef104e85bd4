//! ISP instruction types
//!
//! This module provides the 4-byte instruction frame used by the AVR
//! Serial Programming Instruction Set and the opcode constants it is built
//! from.

mod instruction;
pub mod opcodes;

pub use instruction::Instruction;
pub use opcodes::*;
