//! Programmer traits and abstractions
//!
//! This module defines the traits a programmer backend implements to talk
//! to an AVR target: the 4-byte instruction transport and the reset /
//! enable / clock control lines.

pub mod bitbang;
mod traits;

pub use bitbang::BitbangIsp;
pub use traits::*;
