//! Protocol implementations
//!
//! This module contains the AVR serial programming instruction sequences
//! and the busy-poll policy they wait with.

mod isp;
mod poll;

pub use isp::*;
pub use poll::PollPolicy;
