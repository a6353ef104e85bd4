//! AVR Serial Programming Instruction Set opcodes
//!
//! Every instruction is a fixed 4-byte frame. The first byte selects the
//! instruction; for the `0xAC` family the second byte does. Only the fourth
//! byte clocked back from the target carries a response.

// ============================================================================
// Control instructions (first byte 0xAC)
// ============================================================================

/// Leading byte of the programming-enable, erase, lock and fuse writes
pub const CONTROL: u8 = 0xAC;
/// Programming Enable (second byte)
pub const PROGRAMMING_ENABLE: u8 = 0x53;
/// Chip Erase (second byte) - erases flash and EEPROM, clears lock bits
pub const CHIP_ERASE: u8 = 0x80;
/// Write Lock bits (second byte)
pub const WRITE_LOCK: u8 = 0xE0;
/// Write Fuse bits / low fuse (second byte)
pub const WRITE_FUSE_LOW: u8 = 0xA0;
/// Write Fuse High bits (second byte)
pub const WRITE_FUSE_HIGH: u8 = 0xA8;
/// Write Extended Fuse bits (second byte)
pub const WRITE_FUSE_EXTENDED: u8 = 0xA4;

// ============================================================================
// Read-back instructions
// ============================================================================

/// Read Lock bits
pub const READ_LOCK: u8 = 0x58;
/// Read Fuse bits / low fuse
pub const READ_FUSE_LOW: u8 = 0x50;
/// Read Fuse High bits (0x58 with the high selector)
pub const READ_FUSE_HIGH: u8 = 0x58;
/// Read Extended Fuse bits (0x50 with the high selector)
pub const READ_FUSE_EXTENDED: u8 = 0x50;
/// Second byte selecting the high / extended fuse in a read
pub const FUSE_HIGH_SELECT: u8 = 0x08;

// ============================================================================
// Program memory
// ============================================================================

/// Load Extended Address byte (address bits above the 16-bit word address)
pub const LOAD_EXTENDED_ADDRESS: u8 = 0x4D;
/// Load Program Memory Page, low byte of the word
pub const LOAD_PROGRAM_LOW: u8 = 0x40;
/// Load Program Memory Page, high byte of the word
pub const LOAD_PROGRAM_HIGH: u8 = 0x48;
/// Write Program Memory Page (commit the page buffer to flash)
pub const WRITE_PROGRAM_PAGE: u8 = 0x4C;

// ============================================================================
// Status
// ============================================================================

/// Poll RDY/BSY
pub const POLL_BUSY: u8 = 0xF0;
/// Poll response: a write or erase cycle is still running
pub const STATUS_BUSY: u8 = 0x01;

// ============================================================================
// Flash geometry
// ============================================================================

/// Flash page size in bytes
pub const PAGE_SIZE: usize = 256;
/// Flash page size in words
pub const PAGE_WORDS: u32 = (PAGE_SIZE / 2) as u32;
/// Mask selecting the page base of a word address
pub const PAGE_MASK: u32 = !(PAGE_WORDS - 1);
/// Words addressable without the extended address byte
pub const EXTENDED_SEGMENT_WORDS: u32 = 0x1_0000;
/// Value of an erased flash byte
pub const ERASED: u8 = 0xFF;
