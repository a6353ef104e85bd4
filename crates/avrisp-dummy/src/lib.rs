//! avrisp-dummy - In-memory AVR target emulator for testing
//!
//! This crate provides a dummy programmer wired to an emulated AVR target.
//! It decodes every ISP instruction, keeps flash, page buffer, fuse and
//! lock state in memory, and records what the host did so tests can check
//! the exact instruction stream. It's useful for testing and development
//! without real hardware.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use avrisp_core::error::{Error, Result};
use avrisp_core::fuse::{FuseKind, FuseReadout};
use avrisp_core::isp::{opcodes, Instruction, PAGE_MASK, PAGE_SIZE};
use avrisp_core::programmer::{ControlLines, IspTransport, Level, Line};

/// Line the emulated target's reset pin is wired to by default
pub const DEFAULT_RESET_LINE: Line = Line(10);

/// Configuration for the dummy target
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Flash size in bytes
    pub flash_size: usize,
    /// Line the target's reset pin is connected to
    pub reset_line: Line,
    /// Polls answered with "busy" after each write or erase cycle
    pub busy_polls: u32,
    /// Never finish a write cycle
    pub stuck_busy: bool,
    /// A fuse that ignores writes and always reads back this value
    pub stuck_fuse: Option<(FuseKind, u8)>,
    /// Fuse and lock values before the first write
    pub initial: FuseReadout,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            flash_size: 256 * 1024, // ATmega2560
            reset_line: DEFAULT_RESET_LINE,
            busy_polls: 0,
            stuck_busy: false,
            stuck_fuse: None,
            initial: FuseReadout {
                low: 0x62,
                high: 0x99,
                extended: 0xFF,
                lock: 0xFF,
            },
        }
    }
}

/// Host-side activity other than instruction frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinEvent {
    /// A control line was driven
    Drive(Line, Level),
    /// The bus clock was driven directly
    Clock(Level),
    /// A control line was released
    Release(Line),
    /// MOSI and SCK were released
    ReleaseBus,
    /// The bus session was opened
    BeginSession,
    /// The bus session was closed
    EndSession,
    /// The host waited
    Delay(u32),
}

/// Dummy ISP programmer with an emulated AVR target attached
#[cfg(feature = "alloc")]
pub struct DummyTarget {
    config: DummyConfig,
    flash: Vec<u8>,
    page_latch: [u8; PAGE_SIZE],
    extended: u8,
    fuses: FuseReadout,
    reset_low: bool,
    session_open: bool,
    programming: bool,
    busy: u32,
    instructions: Vec<Instruction>,
    pins: Vec<PinEvent>,
    elapsed_us: u64,
}

#[cfg(feature = "alloc")]
impl DummyTarget {
    /// Create a new dummy target with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let flash = vec![0xFF; config.flash_size];
        let fuses = config.initial;
        Self {
            config,
            flash,
            page_latch: [0xFF; PAGE_SIZE],
            extended: 0,
            fuses,
            reset_low: false,
            session_open: false,
            programming: false,
            busy: 0,
            instructions: Vec::new(),
            pins: Vec::new(),
            elapsed_us: 0,
        }
    }

    /// Create a new dummy target with default configuration (ATmega2560)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Get a reference to the flash contents
    pub fn flash(&self) -> &[u8] {
        &self.flash
    }

    /// Current fuse and lock bytes
    pub fn fuses(&self) -> FuseReadout {
        self.fuses
    }

    /// Whether the target accepted Programming Enable and is still in reset
    pub fn in_programming_mode(&self) -> bool {
        self.programming
    }

    /// Every instruction frame received so far
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of received instructions with the given first byte
    pub fn count(&self, opcode: u8) -> usize {
        self.instructions
            .iter()
            .filter(|insn| insn.opcode == opcode)
            .count()
    }

    /// Number of received instructions equal to `insn`
    pub fn count_exact(&self, insn: Instruction) -> usize {
        self.instructions.iter().filter(|i| **i == insn).count()
    }

    /// Control line activity so far
    pub fn pin_events(&self) -> &[PinEvent] {
        &self.pins
    }

    /// Total time the host spent waiting
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_us
    }

    /// Forget recorded instructions and pin events
    pub fn clear_log(&mut self) {
        self.instructions.clear();
        self.pins.clear();
    }

    fn start_write_cycle(&mut self) {
        self.busy = if self.config.stuck_busy {
            u32::MAX
        } else {
            self.config.busy_polls
        };
    }

    fn write_fuse(&mut self, fuse: FuseKind, value: u8) {
        let value = match self.config.stuck_fuse {
            Some((stuck, forced)) if stuck == fuse => forced,
            _ => value,
        };
        match fuse {
            FuseKind::Low => self.fuses.low = value,
            FuseKind::High => self.fuses.high = value,
            FuseKind::Extended => self.fuses.extended = value,
        }
    }

    fn load_latch(&mut self, insn: Instruction, high: bool) {
        let word = (insn.address() as u32 & !PAGE_MASK) as usize;
        self.page_latch[word * 2 + usize::from(high)] = insn.data();
    }

    fn write_page(&mut self, insn: Instruction) -> Result<()> {
        let word = ((self.extended as u32) << 16 | insn.address() as u32) & PAGE_MASK;
        let start = word as usize * 2;
        let end = start + PAGE_SIZE;
        if end > self.flash.len() {
            return Err(Error::AddressOutOfBounds);
        }
        // Programming can only clear bits
        for (cell, latched) in self.flash[start..end].iter_mut().zip(self.page_latch) {
            *cell &= latched;
        }
        self.page_latch = [0xFF; PAGE_SIZE];
        Ok(())
    }

    fn execute(&mut self, insn: Instruction) -> Result<u8> {
        if insn == Instruction::programming_enable() {
            // Only accepted while reset is held low
            self.programming = self.reset_low;
            return Ok(0);
        }
        if !self.programming {
            return Err(Error::NotInProgrammingMode);
        }

        let [b1, _, b3] = insn.operands;
        match insn.opcode {
            opcodes::POLL_BUSY => {
                if self.busy > 0 {
                    if self.busy != u32::MAX {
                        self.busy -= 1;
                    }
                    Ok(opcodes::STATUS_BUSY)
                } else {
                    Ok(0)
                }
            }
            opcodes::CONTROL => match b1 {
                opcodes::CHIP_ERASE => {
                    self.flash.fill(0xFF);
                    self.fuses.lock = 0xFF;
                    Ok(0)
                }
                opcodes::WRITE_LOCK => {
                    // Lock bits can only be programmed until the next erase
                    self.fuses.lock &= b3;
                    Ok(0)
                }
                opcodes::WRITE_FUSE_LOW => {
                    self.write_fuse(FuseKind::Low, b3);
                    Ok(0)
                }
                opcodes::WRITE_FUSE_HIGH => {
                    self.write_fuse(FuseKind::High, b3);
                    Ok(0)
                }
                opcodes::WRITE_FUSE_EXTENDED => {
                    self.write_fuse(FuseKind::Extended, b3);
                    Ok(0)
                }
                _ => Err(Error::InstructionNotSupported),
            },
            opcodes::READ_LOCK if b1 == 0x00 => Ok(self.fuses.lock),
            opcodes::READ_FUSE_HIGH if b1 == opcodes::FUSE_HIGH_SELECT => Ok(self.fuses.high),
            opcodes::READ_FUSE_LOW if b1 == 0x00 => Ok(self.fuses.low),
            opcodes::READ_FUSE_EXTENDED if b1 == opcodes::FUSE_HIGH_SELECT => {
                Ok(self.fuses.extended)
            }
            opcodes::LOAD_EXTENDED_ADDRESS => {
                self.extended = insn.operands[1];
                Ok(0)
            }
            opcodes::LOAD_PROGRAM_LOW => {
                self.load_latch(insn, false);
                Ok(0)
            }
            opcodes::LOAD_PROGRAM_HIGH => {
                self.load_latch(insn, true);
                Ok(0)
            }
            opcodes::WRITE_PROGRAM_PAGE => {
                self.write_page(insn)?;
                Ok(0)
            }
            _ => Err(Error::InstructionNotSupported),
        }
    }
}

#[cfg(feature = "alloc")]
impl IspTransport for DummyTarget {
    fn begin_session(&mut self) -> Result<()> {
        self.pins.push(PinEvent::BeginSession);
        self.session_open = true;
        Ok(())
    }

    fn end_session(&mut self) -> Result<()> {
        self.pins.push(PinEvent::EndSession);
        self.session_open = false;
        Ok(())
    }

    fn transfer(&mut self, frame: [u8; 4]) -> Result<u8> {
        if !self.session_open {
            return Err(Error::TransferFailed);
        }
        let insn = Instruction::from_bytes(frame);
        self.instructions.push(insn);
        let response = self.execute(insn)?;
        if insn.starts_write_cycle() {
            self.start_write_cycle();
        }
        Ok(response)
    }

    fn delay_us(&mut self, us: u32) {
        self.pins.push(PinEvent::Delay(us));
        self.elapsed_us += us as u64;
    }
}

#[cfg(feature = "alloc")]
impl ControlLines for DummyTarget {
    fn default_reset_line(&self) -> Line {
        DEFAULT_RESET_LINE
    }

    fn drive(&mut self, line: Line, level: Level) -> Result<()> {
        self.pins.push(PinEvent::Drive(line, level));
        if line == self.config.reset_line {
            self.reset_low = level == Level::Low;
            if !self.reset_low {
                self.programming = false;
            }
        }
        Ok(())
    }

    fn set_clock(&mut self, level: Level) -> Result<()> {
        self.pins.push(PinEvent::Clock(level));
        Ok(())
    }

    fn release(&mut self, line: Line) -> Result<()> {
        self.pins.push(PinEvent::Release(line));
        if line == self.config.reset_line {
            // Pulled up on the target board
            self.reset_low = false;
            self.programming = false;
        }
        Ok(())
    }

    fn release_bus(&mut self) -> Result<()> {
        self.pins.push(PinEvent::ReleaseBus);
        Ok(())
    }
}

/// Parse programmer options of the form `key=value`
///
/// Supported keys: `size` (flash bytes, `K` suffix allowed), `busy`
/// (polls per write cycle) and `reset` (reset line number).
#[cfg(feature = "std")]
pub fn parse_options(options: &[(&str, &str)]) -> core::result::Result<DummyConfig, std::string::String> {
    let mut config = DummyConfig::default();
    for &(key, value) in options {
        match key {
            "size" => {
                let (digits, scale) = match value.strip_suffix(['K', 'k']) {
                    Some(digits) => (digits, 1024),
                    None => (value, 1),
                };
                let size = digits
                    .parse::<usize>()
                    .ok()
                    .and_then(|size| size.checked_mul(scale))
                    .ok_or_else(|| std::format!("invalid size: {}", value))?;
                if size == 0 || size % PAGE_SIZE != 0 {
                    return Err(std::format!("size must be a multiple of {} bytes", PAGE_SIZE));
                }
                config.flash_size = size;
            }
            "busy" => {
                config.busy_polls = value
                    .parse()
                    .map_err(|_| std::format!("invalid busy poll count: {}", value))?;
            }
            "reset" => {
                let line = value
                    .parse()
                    .map_err(|_| std::format!("invalid reset line: {}", value))?;
                config.reset_line = Line(line);
            }
            _ => return Err(std::format!("unknown dummy option: {}", key)),
        }
    }
    Ok(config)
}
