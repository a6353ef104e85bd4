//! Error types for avrisp-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

use crate::fuse::FuseKind;

/// Details about a fuse byte that did not read back as written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuseMismatch {
    /// Which fuse byte was written
    pub fuse: FuseKind,
    /// The value that was written
    pub expected: u8,
    /// The value read back from the target
    pub found: u8,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Transport errors
    /// The 4-byte exchange with the target failed
    TransferFailed,
    /// The target kept reporting busy past the poll budget
    Timeout,
    /// A reset, enable or clock line could not be driven
    LineControlFailed,
    /// Instruction is not understood by the target
    InstructionNotSupported,
    /// Instruction addresses memory the target does not have
    AddressOutOfBounds,

    // Image source errors
    /// No readable firmware image was supplied
    SourceUnavailable,
    /// Reading the next line of the image failed
    ReadError,

    // Session errors
    /// A programming session is already running
    SessionActive,
    /// The target has not been put into programming mode
    NotInProgrammingMode,

    // Target errors
    /// A fuse byte read back differently from what was written
    FuseVerifyFailed(FuseMismatch),

    // Configuration errors
    /// A fuse profile could not be read or parsed
    ProfileError,
}

impl fmt::Display for FuseMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to write {} fuse byte: wrote 0x{:02X}, read back 0x{:02X}",
            self.fuse, self.expected, self.found
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransferFailed => write!(f, "ISP transfer failed"),
            Self::Timeout => write!(f, "target did not become ready"),
            Self::LineControlFailed => write!(f, "failed to drive control line"),
            Self::InstructionNotSupported => write!(f, "instruction not supported by target"),
            Self::AddressOutOfBounds => write!(f, "address out of bounds"),
            Self::SourceUnavailable => write!(f, "firmware image unavailable"),
            Self::ReadError => write!(f, "failed to read firmware image"),
            Self::SessionActive => write!(f, "programming session already active"),
            Self::NotInProgrammingMode => write!(f, "target is not in programming mode"),
            Self::FuseVerifyFailed(mismatch) => write!(f, "{}", mismatch),
            Self::ProfileError => write!(f, "invalid fuse profile"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
