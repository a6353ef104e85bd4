//! AVR serial programming protocol implementation
//!
//! This module implements the instruction sequences of the AVR Serial
//! Programming Instruction Set on top of an [`IspTransport`].
//!
//! Uses `maybe_async` to support both sync and async modes:
//! - With `is_sync` feature: blocking/synchronous
//! - Without `is_sync` feature: async (for Embassy, tokio)

use super::PollPolicy;
use crate::error::{Error, FuseMismatch, Result};
use crate::fuse::{FuseConfiguration, FuseKind, FuseReadout};
use crate::isp::{opcodes, Instruction};
use crate::programmer::{IspProgrammer, IspTransport, Level, Line};
use maybe_async::maybe_async;

/// Reset held low (target unpowered or held in reset) before the pulse
pub const RESET_SETTLE_MS: u32 = 50;
/// Width of the positive reset pulse
pub const RESET_PULSE_MS: u32 = 10;
/// Wait after reset goes low before the programming enable instruction
pub const RESET_ENTRY_MS: u32 = 20;
/// Width of the low pulse on the power-enable line during teardown
pub const ENABLE_PULSE_MS: u32 = 200;

/// Execute a single instruction and return the target's response byte
#[maybe_async]
pub async fn execute<M: IspTransport + ?Sized>(master: &mut M, insn: Instruction) -> Result<u8> {
    master.transfer(insn.to_bytes()).await
}

/// Poll the RDY/BSY flag once
///
/// Returns true while the target is still busy.
#[maybe_async]
pub async fn poll_busy<M: IspTransport + ?Sized>(master: &mut M) -> Result<bool> {
    let status = execute(master, Instruction::poll_busy()).await?;
    Ok(status & opcodes::STATUS_BUSY != 0)
}

/// Wait for the target to finish the running write or erase cycle
///
/// Issues the poll instruction until bit 0 of the response clears. With a
/// bounded policy, returns `Error::Timeout` once the poll budget is spent.
#[maybe_async]
pub async fn wait_ready<M: IspTransport + ?Sized>(master: &mut M, policy: &PollPolicy) -> Result<()> {
    let mut polls: u32 = 0;
    loop {
        if !poll_busy(master).await? {
            return Ok(());
        }
        polls = polls.saturating_add(1);
        if let Some(max) = policy.max_polls {
            if polls >= max {
                log::error!("Target still busy after {} polls", polls);
                return Err(Error::Timeout);
            }
        }
        if policy.poll_delay_us > 0 {
            master.delay_us(policy.poll_delay_us).await;
        }
    }
}

#[maybe_async]
async fn delay_ms<M: IspTransport + ?Sized>(master: &mut M, ms: u32) {
    master.delay_us(ms * 1000).await;
}

/// Send the Programming Enable instruction and wait for the target
#[maybe_async]
pub async fn programming_enable<M: IspTransport + ?Sized>(
    master: &mut M,
    policy: &PollPolicy,
) -> Result<()> {
    execute(master, Instruction::programming_enable()).await?;
    wait_ready(master, policy).await
}

/// Erase flash and EEPROM and clear the lock bits
#[maybe_async]
pub async fn chip_erase<M: IspTransport + ?Sized>(master: &mut M, policy: &PollPolicy) -> Result<()> {
    log::debug!("Chip erase");
    execute(master, Instruction::chip_erase()).await?;
    wait_ready(master, policy).await
}

/// Load the extended address byte used by subsequent page commits
#[maybe_async]
pub async fn load_extended_address<M: IspTransport + ?Sized>(
    master: &mut M,
    extended: u8,
    policy: &PollPolicy,
) -> Result<()> {
    log::debug!("Loading extended address byte 0x{:02X}", extended);
    execute(master, Instruction::load_extended_address(extended)).await?;
    wait_ready(master, policy).await
}

/// Load one word into the target's page buffer, low byte first
#[maybe_async]
pub async fn load_program_word<M: IspTransport + ?Sized>(
    master: &mut M,
    word_addr: u32,
    low: u8,
    high: u8,
) -> Result<()> {
    execute(master, Instruction::load_program_low(word_addr, low)).await?;
    execute(master, Instruction::load_program_high(word_addr, high)).await?;
    Ok(())
}

/// Commit the target's page buffer to the flash page at `page_addr`
///
/// Does not wait for the write cycle to finish.
#[maybe_async]
pub async fn write_program_page<M: IspTransport + ?Sized>(master: &mut M, page_addr: u32) -> Result<()> {
    log::trace!("Committing page at word 0x{:06X}", page_addr);
    execute(master, Instruction::write_program_page(page_addr)).await?;
    Ok(())
}

/// Read one fuse byte
#[maybe_async]
pub async fn read_fuse<M: IspTransport + ?Sized>(master: &mut M, fuse: FuseKind) -> Result<u8> {
    execute(master, Instruction::read_fuse(fuse)).await
}

/// Write one fuse byte and verify it by reading it back
///
/// Returns `Error::FuseVerifyFailed` naming the fuse if the read-back
/// differs from `value`.
#[maybe_async]
pub async fn write_fuse<M: IspTransport + ?Sized>(
    master: &mut M,
    fuse: FuseKind,
    value: u8,
    policy: &PollPolicy,
) -> Result<()> {
    log::debug!("Writing {} fuse byte 0x{:02X}", fuse, value);
    execute(master, Instruction::write_fuse(fuse, value)).await?;
    wait_ready(master, policy).await?;

    let found = read_fuse(master, fuse).await?;
    if found != value {
        return Err(Error::FuseVerifyFailed(FuseMismatch {
            fuse,
            expected: value,
            found,
        }));
    }
    Ok(())
}

/// Read the lock byte
#[maybe_async]
pub async fn read_lock_bits<M: IspTransport + ?Sized>(master: &mut M) -> Result<u8> {
    execute(master, Instruction::read_lock()).await
}

/// Write the lock byte and read it back
///
/// Returns whether the read-back matched. Unused lock bits may read back as
/// 1 on some parts, so a mismatch is reported rather than treated as fatal.
#[maybe_async]
pub async fn write_lock_bits<M: IspTransport + ?Sized>(
    master: &mut M,
    value: u8,
    policy: &PollPolicy,
) -> Result<bool> {
    log::debug!("Writing lock byte 0x{:02X}", value);
    execute(master, Instruction::write_lock(value)).await?;
    wait_ready(master, policy).await?;

    let found = read_lock_bits(master).await?;
    if found != value {
        log::warn!(
            "Lock byte read back as 0x{:02X} after writing 0x{:02X}",
            found,
            value
        );
        return Ok(false);
    }
    Ok(true)
}

/// Write all three fuse bytes in order: low, high, extended
///
/// Stops at the first fuse that fails verification.
#[maybe_async]
pub async fn write_fuses<M: IspTransport + ?Sized>(
    master: &mut M,
    config: &FuseConfiguration,
    policy: &PollPolicy,
) -> Result<()> {
    for fuse in FuseKind::ALL {
        write_fuse(master, fuse, config.fuse(fuse), policy).await?;
    }
    Ok(())
}

/// Read all fuse bytes and the lock byte
#[maybe_async]
pub async fn read_fuses<M: IspTransport + ?Sized>(master: &mut M) -> Result<FuseReadout> {
    Ok(FuseReadout {
        low: read_fuse(master, FuseKind::Low).await?,
        high: read_fuse(master, FuseKind::High).await?,
        extended: read_fuse(master, FuseKind::Extended).await?,
        lock: read_lock_bits(master).await?,
    })
}

/// Pulse reset and put the target into serial programming mode
///
/// Holds reset (and the power-enable line, if any) low, pulses reset high
/// with the clock held low, opens the bus session and sends Programming
/// Enable.
#[maybe_async]
pub async fn enter_programming_mode<M: IspProgrammer + ?Sized>(
    master: &mut M,
    reset: Line,
    enable: Option<Line>,
    policy: &PollPolicy,
) -> Result<()> {
    log::debug!("Entering programming mode (reset on {})", reset);
    master.drive(reset, Level::Low)?;
    if let Some(enable) = enable {
        master.drive(enable, Level::Low)?;
    }
    delay_ms(master, RESET_SETTLE_MS).await;

    master.set_clock(Level::Low)?;
    master.drive(reset, Level::High)?;
    delay_ms(master, RESET_PULSE_MS).await;
    master.drive(reset, Level::Low)?;
    delay_ms(master, RESET_ENTRY_MS).await;

    master.end_session().await?;
    master.begin_session().await?;
    programming_enable(master, policy).await
}

/// Leave programming mode and release every line
///
/// Releases reset, closes the bus session and, if a power-enable line is
/// configured, pulses it low to power-cycle the target. The bus and reset
/// lines are left undriven.
#[maybe_async]
pub async fn leave_programming_mode<M: IspProgrammer + ?Sized>(
    master: &mut M,
    reset: Line,
    enable: Option<Line>,
) -> Result<()> {
    log::debug!("Leaving programming mode");
    master.drive(reset, Level::High)?;
    master.end_session().await?;
    if let Some(enable) = enable {
        master.drive(enable, Level::Low)?;
        delay_ms(master, ENABLE_PULSE_MS).await;
        master.drive(enable, Level::High)?;
    }
    master.release_bus()?;
    master.release(reset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    /// Scripted transport: records frames, answers from a fixed rule
    struct Scripted {
        frames: Vec<[u8; 4]>,
        busy_polls: u32,
        fuse_reads: [u8; 3],
        lock_read: u8,
        delays: u64,
    }

    impl Scripted {
        fn new() -> Self {
            Self {
                frames: Vec::new(),
                busy_polls: 0,
                fuse_reads: [0xF7, 0xD0, 0xFD],
                lock_read: 0x03,
                delays: 0,
            }
        }
    }

    impl IspTransport for Scripted {
        fn begin_session(&mut self) -> Result<()> {
            Ok(())
        }

        fn end_session(&mut self) -> Result<()> {
            Ok(())
        }

        fn transfer(&mut self, frame: [u8; 4]) -> Result<u8> {
            self.frames.push(frame);
            let insn = Instruction::from_bytes(frame);
            Ok(if insn == Instruction::poll_busy() {
                if self.busy_polls > 0 {
                    self.busy_polls -= 1;
                    1
                } else {
                    0
                }
            } else if insn == Instruction::read_fuse(FuseKind::Low) {
                self.fuse_reads[0]
            } else if insn == Instruction::read_fuse(FuseKind::High) {
                self.fuse_reads[1]
            } else if insn == Instruction::read_fuse(FuseKind::Extended) {
                self.fuse_reads[2]
            } else if insn == Instruction::read_lock() {
                self.lock_read
            } else {
                0
            })
        }

        fn delay_us(&mut self, us: u32) {
            self.delays += us as u64;
        }
    }

    #[test]
    fn test_wait_ready_polls_until_clear() {
        let mut t = Scripted::new();
        t.busy_polls = 3;
        wait_ready(&mut t, &PollPolicy::bounded(10, 5)).unwrap();
        assert_eq!(t.frames.len(), 4);
        assert_eq!(t.delays, 15);
    }

    #[test]
    fn test_wait_ready_times_out() {
        let mut t = Scripted::new();
        t.busy_polls = 100;
        assert_eq!(
            wait_ready(&mut t, &PollPolicy::bounded(5, 0)),
            Err(Error::Timeout)
        );
        assert_eq!(t.frames.len(), 5);
    }

    #[test]
    fn test_wait_ready_unbounded() {
        let mut t = Scripted::new();
        t.busy_polls = 1000;
        wait_ready(&mut t, &PollPolicy::unbounded()).unwrap();
        assert_eq!(t.frames.len(), 1001);
        assert_eq!(t.delays, 0);
    }

    #[test]
    fn test_write_fuse_verifies() {
        let mut t = Scripted::new();
        write_fuse(&mut t, FuseKind::High, 0xD0, &PollPolicy::default()).unwrap();
        assert_eq!(
            t.frames,
            [[0xAC, 0xA8, 0x00, 0xD0], [0xF0, 0, 0, 0], [0x58, 0x08, 0, 0]]
        );

        t.fuse_reads[1] = 0xD9;
        let err = write_fuse(&mut t, FuseKind::High, 0xD0, &PollPolicy::default()).unwrap_err();
        assert_eq!(
            err,
            Error::FuseVerifyFailed(FuseMismatch {
                fuse: FuseKind::High,
                expected: 0xD0,
                found: 0xD9,
            })
        );
    }

    #[test]
    fn test_write_fuses_stops_at_first_mismatch() {
        let mut t = Scripted::new();
        t.fuse_reads[0] = 0x00;
        let cfg = FuseConfiguration::default();
        assert!(write_fuses(&mut t, &cfg, &PollPolicy::default()).is_err());
        assert!(!t.frames.iter().any(|f| f[1] == opcodes::WRITE_FUSE_HIGH));
    }

    #[test]
    fn test_lock_mismatch_is_not_fatal() {
        let mut t = Scripted::new();
        t.lock_read = 0xFF;
        assert_eq!(
            write_lock_bits(&mut t, 0x0F, &PollPolicy::default()),
            Ok(false)
        );
        t.lock_read = 0x0F;
        assert_eq!(
            write_lock_bits(&mut t, 0x0F, &PollPolicy::default()),
            Ok(true)
        );
    }

    #[test]
    fn test_read_fuses() {
        let mut t = Scripted::new();
        let readout = read_fuses(&mut t).unwrap();
        assert_eq!(
            readout,
            FuseReadout {
                low: 0xF7,
                high: 0xD0,
                extended: 0xFD,
                lock: 0x03
            }
        );
    }

    #[test]
    fn test_load_program_word_order() {
        let mut t = Scripted::new();
        load_program_word(&mut t, 0x0102, 0xAA, 0xBB).unwrap();
        assert_eq!(
            t.frames,
            [[0x40, 0x01, 0x02, 0xAA], [0x48, 0x01, 0x02, 0xBB]]
        );
    }
}
