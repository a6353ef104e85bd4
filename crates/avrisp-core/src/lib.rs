//! avrisp-core - Core library for AVR in-system programming
//!
//! This crate drives the serial programming interface of AVR
//! microcontrollers: it encodes the 4-byte ISP instructions, polls the
//! target until it is ready, parses Intel HEX images line by line and
//! streams them into flash one page at a time. It is designed to be
//! `no_std` compatible so the same engine can run on a host or inside a
//! programmer firmware.
//!
//! # Features
//!
//! - `std` - Enable standard library support (fuse profiles from TOML files)
//! - `is_sync` - Compile the protocol as blocking code instead of `async`
//!
//! # Example
//!
//! ```ignore
//! use avrisp_core::hex::SliceSource;
//! use avrisp_core::session::{NoProgress, ProgrammingSession, SessionConfig, StepOutcome};
//!
//! fn flash<M: avrisp_core::programmer::IspProgrammer>(master: &mut M, image: &[u8]) {
//!     let mut session = ProgrammingSession::new(SessionConfig::default());
//!     session.begin(master, Some(SliceSource::new(image)), None, None)?;
//!     session.start_programming(master, &mut NoProgress)?;
//!     while session.step(master, &mut NoProgress)? == StepOutcome::DidWork {}
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
// Allow async fn in traits - we use maybe-async for dual sync/async support
#![allow(async_fn_in_trait)]

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod error;
pub mod fuse;
pub mod hex;
pub mod isp;
pub mod programmer;
pub mod protocol;
pub mod session;

pub use error::{Error, Result};
