//! Page buffer and flush engine

use crate::error::Result;
use crate::isp::{ERASED, EXTENDED_SEGMENT_WORDS, PAGE_MASK, PAGE_SIZE};
use crate::programmer::IspTransport;
use crate::protocol::{self, PollPolicy};
use maybe_async::maybe_async;

/// Accumulates image bytes into flash pages and writes them to the target
///
/// Flash is addressed in 16-bit words. Bytes are buffered until a full
/// page is available, then loaded word by word into the target's page
/// buffer and committed. The write address only ever advances, so the
/// image is laid out in the order its data records arrive.
#[derive(Debug, Clone)]
pub struct PageWriter {
    page: [u8; PAGE_SIZE],
    index: usize,
    address: u32,
    extended: u8,
    pages_written: u32,
    commits: u32,
}

impl Default for PageWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PageWriter {
    /// Create an empty writer positioned at word 0
    pub const fn new() -> Self {
        Self {
            page: [ERASED; PAGE_SIZE],
            index: 0,
            address: 0,
            extended: 0,
            pages_written: 0,
            commits: 0,
        }
    }

    /// Forget all buffered data and rewind to word 0
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Word address the next flushed page will be written to
    pub fn address(&self) -> u32 {
        self.address
    }

    /// Extended address byte last loaded into the target
    pub fn extended(&self) -> u8 {
        self.extended
    }

    /// Number of bytes waiting in the page buffer
    pub fn buffered(&self) -> usize {
        self.index
    }

    /// Number of pages flushed so far
    pub fn pages_written(&self) -> u32 {
        self.pages_written
    }

    /// Number of page commit instructions issued so far
    pub fn commits(&self) -> u32 {
        self.commits
    }

    /// Load the extended address byte for the first segment
    #[maybe_async]
    pub async fn load_initial_segment<M: IspTransport + ?Sized>(
        &mut self,
        master: &mut M,
        policy: &PollPolicy,
    ) -> Result<()> {
        protocol::load_extended_address(master, self.extended, policy).await
    }

    /// Buffer one data byte, flushing the page once it is full
    #[maybe_async]
    pub async fn push<M: IspTransport + ?Sized>(
        &mut self,
        master: &mut M,
        byte: u8,
        policy: &PollPolicy,
    ) -> Result<()> {
        self.page[self.index] = byte;
        self.index += 1;
        if self.index == PAGE_SIZE {
            self.flush(master, policy).await?;
        }
        Ok(())
    }

    /// Buffer a run of data bytes
    #[maybe_async]
    pub async fn write_bytes<M: IspTransport + ?Sized>(
        &mut self,
        master: &mut M,
        bytes: &[u8],
        policy: &PollPolicy,
    ) -> Result<()> {
        for &byte in bytes {
            self.push(master, byte, policy).await?;
        }
        Ok(())
    }

    /// Pad a partially filled page with the erased value and flush it
    ///
    /// Does nothing if the buffer is empty.
    #[maybe_async]
    pub async fn finish<M: IspTransport + ?Sized>(
        &mut self,
        master: &mut M,
        policy: &PollPolicy,
    ) -> Result<()> {
        if self.index == 0 {
            return Ok(());
        }
        log::debug!("Padding final page with {} erased bytes", PAGE_SIZE - self.index);
        self.page[self.index..].fill(ERASED);
        self.flush(master, policy).await
    }

    /// Write the buffered page to the target
    ///
    /// Switches the target to the next extended segment first if the page
    /// starts on a 64 Ki-word boundary.
    #[maybe_async]
    async fn flush<M: IspTransport + ?Sized>(
        &mut self,
        master: &mut M,
        policy: &PollPolicy,
    ) -> Result<()> {
        let segment = (self.address / EXTENDED_SEGMENT_WORDS) as u8;
        if segment != self.extended {
            self.extended = segment;
            protocol::load_extended_address(master, segment, policy).await?;
        }

        log::debug!("Writing page at word 0x{:06X}", self.address);
        let mut page_base = self.address & PAGE_MASK;
        for word in self.page.chunks_exact(2) {
            let base = self.address & PAGE_MASK;
            if base != page_base {
                protocol::write_program_page(master, page_base).await?;
                self.commits += 1;
                page_base = base;
            }
            protocol::load_program_word(master, self.address, word[0], word[1]).await?;
            self.address += 1;
        }
        protocol::write_program_page(master, page_base).await?;
        self.commits += 1;
        protocol::wait_ready(master, policy).await?;

        self.page.fill(ERASED);
        self.index = 0;
        self.pages_written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isp::{opcodes, Instruction};
    use std::vec::Vec;

    #[derive(Default)]
    struct Recorder {
        frames: Vec<Instruction>,
    }

    impl Recorder {
        fn count(&self, opcode: u8) -> usize {
            self.frames.iter().filter(|i| i.opcode == opcode).count()
        }
    }

    impl IspTransport for Recorder {
        fn begin_session(&mut self) -> Result<()> {
            Ok(())
        }

        fn end_session(&mut self) -> Result<()> {
            Ok(())
        }

        fn transfer(&mut self, frame: [u8; 4]) -> Result<u8> {
            self.frames.push(Instruction::from_bytes(frame));
            Ok(0)
        }

        fn delay_us(&mut self, _us: u32) {}
    }

    #[test]
    fn test_full_page_flush() {
        let mut t = Recorder::default();
        let mut w = PageWriter::new();
        let data: Vec<u8> = (0..=255u8).collect();
        w.write_bytes(&mut t, &data, &PollPolicy::default()).unwrap();

        assert_eq!(w.pages_written(), 1);
        assert_eq!(w.buffered(), 0);
        assert_eq!(w.address(), 128);
        assert_eq!(t.count(opcodes::LOAD_PROGRAM_LOW), 128);
        assert_eq!(t.count(opcodes::LOAD_PROGRAM_HIGH), 128);
        assert_eq!(t.count(opcodes::WRITE_PROGRAM_PAGE), 1);
        assert_eq!(t.count(opcodes::LOAD_EXTENDED_ADDRESS), 0);

        assert_eq!(t.frames[0], Instruction::load_program_low(0, 0));
        assert_eq!(t.frames[1], Instruction::load_program_high(0, 1));
        assert_eq!(t.frames[255], Instruction::load_program_high(127, 255));
        assert_eq!(t.frames[256], Instruction::write_program_page(0));
        assert_eq!(t.frames[257], Instruction::poll_busy());
    }

    #[test]
    fn test_pages_advance_by_128_words() {
        let mut t = Recorder::default();
        let mut w = PageWriter::new();
        w.write_bytes(&mut t, &[0u8; PAGE_SIZE * 3], &PollPolicy::default())
            .unwrap();
        let commits: Vec<u16> = t
            .frames
            .iter()
            .filter(|i| i.opcode == opcodes::WRITE_PROGRAM_PAGE)
            .map(|i| i.address())
            .collect();
        assert_eq!(commits, [0x0000, 0x0080, 0x0100]);
        assert_eq!(w.commits(), 3);
    }

    #[test]
    fn test_partial_page_padding() {
        let mut t = Recorder::default();
        let mut w = PageWriter::new();
        w.write_bytes(&mut t, &[0x11; 10], &PollPolicy::default()).unwrap();
        assert!(t.frames.is_empty());

        w.finish(&mut t, &PollPolicy::default()).unwrap();
        assert_eq!(w.pages_written(), 1);
        let padded = t
            .frames
            .iter()
            .filter(|i| {
                (i.opcode == opcodes::LOAD_PROGRAM_LOW || i.opcode == opcodes::LOAD_PROGRAM_HIGH)
                    && i.data() == ERASED
            })
            .count();
        assert_eq!(padded, PAGE_SIZE - 10);

        // Nothing left to pad
        let before = t.frames.len();
        w.finish(&mut t, &PollPolicy::default()).unwrap();
        assert_eq!(t.frames.len(), before);
    }

    #[test]
    fn test_extended_segment_switch() {
        let mut t = Recorder::default();
        let mut w = PageWriter::new();
        // 512 pages fill the first 64 Ki-words
        w.write_bytes(&mut t, &[0u8; PAGE_SIZE * 512], &PollPolicy::default())
            .unwrap();
        assert_eq!(w.address(), 0x10000);
        assert_eq!(t.count(opcodes::LOAD_EXTENDED_ADDRESS), 0);
        t.frames.clear();

        w.write_bytes(&mut t, &[0u8; 4], &PollPolicy::default()).unwrap();
        w.finish(&mut t, &PollPolicy::default()).unwrap();
        assert_eq!(t.frames[0], Instruction::load_extended_address(1));
        assert_eq!(t.count(opcodes::LOAD_EXTENDED_ADDRESS), 1);
        assert_eq!(w.extended(), 1);
        // Instruction addresses wrap to the low 16 bits
        assert_eq!(t.frames[2], Instruction::load_program_low(0, 0));
    }
}
