//! Bitbang ISP helpers
//!
//! Programmers that drive the ISP bus via software-controlled GPIO lines
//! implement [`BitbangIsp`] and forward [`IspTransport::transfer`] to
//! [`transfer_frame`]. Hardware SPI bridges should implement the transport
//! directly instead.
//!
//! The AVR samples MOSI on the rising edge of SCK and shifts MISO out on
//! the falling edge (SPI mode 0), most significant bit first.
//!
//! [`IspTransport::transfer`]: super::IspTransport::transfer

use crate::error::{Error, Result};

/// Trait for low-level bitbang ISP operations
pub trait BitbangIsp {
    /// Set clock line value
    fn set_sck(&mut self, high: bool);

    /// Set MOSI line value
    fn set_mosi(&mut self, high: bool);

    /// Get MISO line value
    fn get_miso(&self) -> bool;

    /// Delay for half a clock period
    fn half_period_delay(&self);

    /// Report and clear a line access failure since the last call
    ///
    /// Line setters and `get_miso` cannot return errors, so backends whose
    /// GPIO access can fail latch the failure and report it here. The
    /// default never reports one.
    fn take_fault(&self) -> bool {
        false
    }

    /// Optional: Set SCK and MOSI atomically (optimization)
    ///
    /// Default implementation calls `set_sck` then `set_mosi`.
    fn set_sck_set_mosi(&mut self, sck: bool, mosi: bool) {
        self.set_sck(sck);
        self.set_mosi(mosi);
    }

    /// Optional: Set SCK and get MISO atomically (optimization)
    ///
    /// Default implementation calls `set_sck` then `get_miso`.
    fn set_sck_get_miso(&mut self, sck: bool) -> bool {
        self.set_sck(sck);
        self.get_miso()
    }
}

/// Exchange one byte, MSB first, leaving SCK low
pub fn exchange_byte<M: BitbangIsp + ?Sized>(master: &mut M, byte: u8) -> u8 {
    let mut read = 0u8;
    for i in (0..8).rev() {
        let bit = (byte >> i) & 1 != 0;
        master.set_sck_set_mosi(false, bit);
        master.half_period_delay();
        read <<= 1;
        if master.set_sck_get_miso(true) {
            read |= 1;
        }
        master.half_period_delay();
    }
    master.set_sck(false);
    read
}

/// Exchange a full 4-byte instruction frame
///
/// Returns the byte received while the fourth byte was shifted out.
pub fn exchange_frame<M: BitbangIsp + ?Sized>(master: &mut M, frame: [u8; 4]) -> u8 {
    let mut last = 0;
    for byte in frame {
        last = exchange_byte(master, byte);
    }
    last
}

/// Exchange a frame and fail if any line access failed on the way
///
/// A response sampled from a failed MISO read is meaningless (it would
/// read as "ready" to the busy poll), so it is never returned.
pub fn transfer_frame<M: BitbangIsp + ?Sized>(master: &mut M, frame: [u8; 4]) -> Result<u8> {
    master.take_fault();
    let response = exchange_frame(master, frame);
    if master.take_fault() {
        return Err(Error::TransferFailed);
    }
    Ok(response)
}
