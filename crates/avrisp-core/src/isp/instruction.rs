//! ISP instruction frame

use super::opcodes;
use crate::fuse::FuseKind;

/// A single 4-byte ISP instruction
///
/// Designed to be built by the named constructors below and handed to the
/// transport as raw bytes via [`Instruction::to_bytes`]. Emulated targets
/// decode frames back with [`Instruction::from_bytes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instruction {
    /// First byte of the frame
    pub opcode: u8,
    /// Second to fourth byte of the frame
    pub operands: [u8; 3],
}

impl Instruction {
    /// Create an instruction from its four bytes
    pub const fn new(opcode: u8, b1: u8, b2: u8, b3: u8) -> Self {
        Self {
            opcode,
            operands: [b1, b2, b3],
        }
    }

    /// Decode a frame as clocked out to the target
    pub const fn from_bytes(frame: [u8; 4]) -> Self {
        Self::new(frame[0], frame[1], frame[2], frame[3])
    }

    /// Encode the frame in transmission order
    pub const fn to_bytes(&self) -> [u8; 4] {
        [
            self.opcode,
            self.operands[0],
            self.operands[1],
            self.operands[2],
        ]
    }

    /// Programming Enable
    pub const fn programming_enable() -> Self {
        Self::new(opcodes::CONTROL, opcodes::PROGRAMMING_ENABLE, 0x00, 0x00)
    }

    /// Chip Erase
    pub const fn chip_erase() -> Self {
        Self::new(opcodes::CONTROL, opcodes::CHIP_ERASE, 0x00, 0x00)
    }

    /// Poll RDY/BSY
    pub const fn poll_busy() -> Self {
        Self::new(opcodes::POLL_BUSY, 0x00, 0x00, 0x00)
    }

    /// Load Extended Address byte
    pub const fn load_extended_address(extended: u8) -> Self {
        Self::new(opcodes::LOAD_EXTENDED_ADDRESS, 0x00, extended, 0x00)
    }

    /// Load the low byte of the word at `word_addr` into the page buffer
    pub const fn load_program_low(word_addr: u32, data: u8) -> Self {
        let [hi, lo] = split_address(word_addr);
        Self::new(opcodes::LOAD_PROGRAM_LOW, hi, lo, data)
    }

    /// Load the high byte of the word at `word_addr` into the page buffer
    pub const fn load_program_high(word_addr: u32, data: u8) -> Self {
        let [hi, lo] = split_address(word_addr);
        Self::new(opcodes::LOAD_PROGRAM_HIGH, hi, lo, data)
    }

    /// Commit the page buffer to the page containing `word_addr`
    pub const fn write_program_page(word_addr: u32) -> Self {
        let [hi, lo] = split_address(word_addr);
        Self::new(opcodes::WRITE_PROGRAM_PAGE, hi, lo, 0x00)
    }

    /// Write Lock bits
    pub const fn write_lock(value: u8) -> Self {
        Self::new(opcodes::CONTROL, opcodes::WRITE_LOCK, 0x00, value)
    }

    /// Read Lock bits
    pub const fn read_lock() -> Self {
        Self::new(opcodes::READ_LOCK, 0x00, 0x00, 0x00)
    }

    /// Write one of the fuse bytes
    pub const fn write_fuse(fuse: FuseKind, value: u8) -> Self {
        let select = match fuse {
            FuseKind::Low => opcodes::WRITE_FUSE_LOW,
            FuseKind::High => opcodes::WRITE_FUSE_HIGH,
            FuseKind::Extended => opcodes::WRITE_FUSE_EXTENDED,
        };
        Self::new(opcodes::CONTROL, select, 0x00, value)
    }

    /// Read one of the fuse bytes
    pub const fn read_fuse(fuse: FuseKind) -> Self {
        match fuse {
            FuseKind::Low => Self::new(opcodes::READ_FUSE_LOW, 0x00, 0x00, 0x00),
            FuseKind::High => Self::new(
                opcodes::READ_FUSE_HIGH,
                opcodes::FUSE_HIGH_SELECT,
                0x00,
                0x00,
            ),
            FuseKind::Extended => Self::new(
                opcodes::READ_FUSE_EXTENDED,
                opcodes::FUSE_HIGH_SELECT,
                0x00,
                0x00,
            ),
        }
    }

    /// The 16-bit word address carried in bytes 2 and 3
    pub const fn address(&self) -> u16 {
        ((self.operands[0] as u16) << 8) | self.operands[1] as u16
    }

    /// The data byte carried in byte 4
    pub const fn data(&self) -> u8 {
        self.operands[2]
    }

    /// Returns true if the target may stay busy after this instruction
    pub const fn starts_write_cycle(&self) -> bool {
        match self.opcode {
            opcodes::CONTROL => !matches!(self.operands[0], opcodes::PROGRAMMING_ENABLE),
            opcodes::WRITE_PROGRAM_PAGE => true,
            _ => false,
        }
    }
}

/// Split the low 16 bits of a word address into (high, low) bytes
const fn split_address(word_addr: u32) -> [u8; 2] {
    [(word_addr >> 8) as u8, word_addr as u8]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_frames() {
        assert_eq!(
            Instruction::programming_enable().to_bytes(),
            [0xAC, 0x53, 0x00, 0x00]
        );
        assert_eq!(Instruction::chip_erase().to_bytes(), [0xAC, 0x80, 0x00, 0x00]);
        assert_eq!(Instruction::poll_busy().to_bytes(), [0xF0, 0x00, 0x00, 0x00]);
        assert_eq!(Instruction::write_lock(0x0F).to_bytes(), [0xAC, 0xE0, 0x00, 0x0F]);
    }

    #[test]
    fn test_fuse_frames() {
        assert_eq!(
            Instruction::write_fuse(FuseKind::Low, 0xF7).to_bytes(),
            [0xAC, 0xA0, 0x00, 0xF7]
        );
        assert_eq!(
            Instruction::write_fuse(FuseKind::High, 0xD0).to_bytes(),
            [0xAC, 0xA8, 0x00, 0xD0]
        );
        assert_eq!(
            Instruction::write_fuse(FuseKind::Extended, 0xFD).to_bytes(),
            [0xAC, 0xA4, 0x00, 0xFD]
        );
        assert_eq!(Instruction::read_fuse(FuseKind::Low).to_bytes(), [0x50, 0, 0, 0]);
        assert_eq!(Instruction::read_fuse(FuseKind::High).to_bytes(), [0x58, 0x08, 0, 0]);
        assert_eq!(
            Instruction::read_fuse(FuseKind::Extended).to_bytes(),
            [0x50, 0x08, 0, 0]
        );
        assert_eq!(Instruction::read_lock().to_bytes(), [0x58, 0, 0, 0]);
    }

    #[test]
    fn test_memory_frames_use_low_16_bits() {
        assert_eq!(
            Instruction::load_program_low(0x1_2345, 0xAA).to_bytes(),
            [0x40, 0x23, 0x45, 0xAA]
        );
        assert_eq!(
            Instruction::load_program_high(0x0080, 0x55).to_bytes(),
            [0x48, 0x00, 0x80, 0x55]
        );
        assert_eq!(
            Instruction::write_program_page(0x1_0080).to_bytes(),
            [0x4C, 0x00, 0x80, 0x00]
        );
        assert_eq!(
            Instruction::load_extended_address(1).to_bytes(),
            [0x4D, 0x00, 0x01, 0x00]
        );
    }

    #[test]
    fn test_decode() {
        let insn = Instruction::from_bytes([0x40, 0x12, 0x34, 0x56]);
        assert_eq!(insn, Instruction::load_program_low(0x1234, 0x56));
        assert_eq!(insn.address(), 0x1234);
        assert_eq!(insn.data(), 0x56);
        assert!(!insn.starts_write_cycle());
        assert!(Instruction::chip_erase().starts_write_cycle());
        assert!(!Instruction::programming_enable().starts_write_cycle());
    }
}
