//! Fuse and lock byte model
//!
//! Describes the three fuse bytes and the lock byte of an AVR target, the
//! values a programming session writes to them, and what a read-back
//! returns. Fuse profiles can be loaded from TOML files with the `std`
//! feature (see [`crate::session::SessionConfig`]).

mod types;

pub use types::*;
