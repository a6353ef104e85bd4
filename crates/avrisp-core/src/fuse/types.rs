//! Fuse and lock byte types

use bitflags::bitflags;
use core::fmt;

/// One of the three fuse bytes of an AVR target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FuseKind {
    /// Low fuse byte (clock source and startup)
    Low,
    /// High fuse byte (debug, SPI enable, boot section)
    High,
    /// Extended fuse byte (brown-out detection)
    Extended,
}

impl FuseKind {
    /// All fuse bytes in the order they are programmed
    pub const ALL: [FuseKind; 3] = [FuseKind::Low, FuseKind::High, FuseKind::Extended];

    /// Human-readable name
    pub const fn name(self) -> &'static str {
        match self {
            FuseKind::Low => "low",
            FuseKind::High => "high",
            FuseKind::Extended => "extended",
        }
    }
}

impl fmt::Display for FuseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Low fuse bits
    ///
    /// A programmed fuse bit reads as 0, so a bit set here means the
    /// function is *not* selected.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LowFuse: u8 {
        /// Divide clock by 8
        const CKDIV8 = 0x80;
        /// Clock output
        const CKOUT  = 0x40;
        /// Select start-up time
        const SUT1   = 0x20;
        /// Select start-up time
        const SUT0   = 0x10;
        /// Select clock source
        const CKSEL3 = 0x08;
        /// Select clock source
        const CKSEL2 = 0x04;
        /// Select clock source
        const CKSEL1 = 0x02;
        /// Select clock source
        const CKSEL0 = 0x01;
    }
}

bitflags! {
    /// High fuse bits
    ///
    /// A programmed fuse bit reads as 0.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HighFuse: u8 {
        /// Enable on-chip debug
        const OCDEN   = 0x80;
        /// Enable JTAG
        const JTAGEN  = 0x40;
        /// Enable serial programming (never unprogram over ISP)
        const SPIEN   = 0x20;
        /// Watchdog timer always on
        const WDTON   = 0x10;
        /// Preserve EEPROM through chip erase
        const EESAVE  = 0x08;
        /// Select boot size
        const BOOTSZ1 = 0x04;
        /// Select boot size
        const BOOTSZ0 = 0x02;
        /// Select reset vector
        const BOOTRST = 0x01;
    }
}

impl LowFuse {
    /// Bits that are programmed (read as 0) in `self`
    pub fn programmed(self) -> Self {
        self.complement()
    }
}

impl HighFuse {
    /// Bits that are programmed (read as 0) in `self`
    pub fn programmed(self) -> Self {
        self.complement()
    }
}

/// Lock bit modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LockMode {
    /// No memory lock features enabled
    NoLock = 0x03,
    /// Further programming of flash and EEPROM is disabled
    ProgrammingDisabled = 0x02,
    /// Further programming and verification are disabled
    ProgrammingAndVerificationDisabled = 0x00,
}

impl LockMode {
    /// Raw lock byte value
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Decode the two mode bits of a lock byte
    pub const fn from_bits(value: u8) -> Self {
        match value & 0x03 {
            0x03 => LockMode::NoLock,
            0x02 => LockMode::ProgrammingDisabled,
            _ => LockMode::ProgrammingAndVerificationDisabled,
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::NoLock => write!(f, "no restrictions"),
            LockMode::ProgrammingDisabled => write!(f, "programming disabled"),
            LockMode::ProgrammingAndVerificationDisabled => {
                write!(f, "programming and verification disabled")
            }
        }
    }
}

/// Fuse and lock values written during a programming session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuseConfiguration {
    /// Low fuse byte
    pub low: u8,
    /// High fuse byte
    pub high: u8,
    /// Extended fuse byte
    pub extended: u8,
    /// Lock byte written right after chip erase
    pub lock_during: u8,
    /// Lock byte written once the whole image is programmed
    pub lock_after: u8,
}

impl FuseConfiguration {
    /// Value to write for one fuse byte
    pub const fn fuse(&self, kind: FuseKind) -> u8 {
        match kind {
            FuseKind::Low => self.low,
            FuseKind::High => self.high,
            FuseKind::Extended => self.extended,
        }
    }
}

impl Default for FuseConfiguration {
    fn default() -> Self {
        Self {
            low: 0xF7,
            high: 0xD0,
            extended: 0xFD,
            lock_during: LockMode::NoLock.bits(),
            lock_after: 0x0F,
        }
    }
}

/// Fuse and lock bytes read back from a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuseReadout {
    /// Low fuse byte
    pub low: u8,
    /// High fuse byte
    pub high: u8,
    /// Extended fuse byte
    pub extended: u8,
    /// Lock byte
    pub lock: u8,
}

impl FuseReadout {
    /// Value of one fuse byte
    pub const fn fuse(&self, kind: FuseKind) -> u8 {
        match kind {
            FuseKind::Low => self.low,
            FuseKind::High => self.high,
            FuseKind::Extended => self.extended,
        }
    }

    /// Low fuse as named bits
    pub fn low_bits(&self) -> LowFuse {
        LowFuse::from_bits_retain(self.low)
    }

    /// High fuse as named bits
    pub fn high_bits(&self) -> HighFuse {
        HighFuse::from_bits_retain(self.high)
    }

    /// Lock mode encoded in the lock byte
    pub fn lock_mode(&self) -> LockMode {
        LockMode::from_bits(self.lock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile() {
        let cfg = FuseConfiguration::default();
        assert_eq!(cfg.fuse(FuseKind::Low), 0xF7);
        assert_eq!(cfg.fuse(FuseKind::High), 0xD0);
        assert_eq!(cfg.fuse(FuseKind::Extended), 0xFD);
        assert_eq!(cfg.lock_during, 0x03);
        assert_eq!(cfg.lock_after, 0x0F);
    }

    #[test]
    fn test_programmed_bits() {
        // 0xD0 = 1101_0000
        let high = HighFuse::from_bits_retain(0xD0);
        let programmed = high.programmed();
        assert!(programmed.contains(HighFuse::SPIEN));
        assert!(programmed.contains(HighFuse::EESAVE));
        assert!(!programmed.contains(HighFuse::OCDEN));
        assert!(!programmed.contains(HighFuse::WDTON));

        let low = LowFuse::from_bits_retain(0xF7);
        assert_eq!(low.programmed(), LowFuse::CKSEL3);
    }

    #[test]
    fn test_lock_mode() {
        assert_eq!(LockMode::from_bits(0xFF), LockMode::NoLock);
        assert_eq!(LockMode::from_bits(0x0F), LockMode::NoLock);
        assert_eq!(LockMode::from_bits(0xFE), LockMode::ProgrammingDisabled);
        assert_eq!(
            LockMode::from_bits(0xFC),
            LockMode::ProgrammingAndVerificationDisabled
        );
        assert_eq!(LockMode::NoLock.bits(), 0x03);
    }

    #[test]
    fn test_fuse_names() {
        assert_eq!(std::format!("{}", FuseKind::Extended), "extended");
        assert_eq!(FuseKind::ALL[0], FuseKind::Low);
    }
}
