//! avrisp-linux-gpio - Linux GPIO bitbang ISP support
//!
//! This crate programs AVR targets by bit-banging the serial programming
//! interface on GPIO pins, using the Linux character device GPIO interface
//! (gpiocdev).
//!
//! # Usage with avrisp CLI
//!
//! ```bash
//! # Raspberry Pi header, target reset on GPIO 25
//! avrisp program -p linux_gpio:gpiochip=0,sck=11,mosi=10,miso=9,reset=25 firmware.hex
//!
//! # Power-cycle the target through a load switch on GPIO 17 when done
//! avrisp program -p linux_gpio:dev=/dev/gpiochip0,sck=11,mosi=10,miso=9,reset=25,enable=17 firmware.hex
//! ```
//!
//! # GPIO Pin Wiring
//!
//! | ISP Header | GPIO Function  | Description |
//! |------------|----------------|-------------|
//! | SCK        | SCK (output)   | Serial Clock |
//! | MOSI       | MOSI (output)  | Host to target data |
//! | MISO       | MISO (input)   | Target to host data |
//! | RESET      | reset          | Held low while programming |
//! | GND        | GND            | Ground |
//!
//! The target must run at the same I/O voltage as the host's GPIO bank.
//!
//! # System Requirements
//!
//! - Linux kernel 4.8+ with GPIO character device support (kernel 5.5+ for v2 API)
//! - Access to `/dev/gpiochipN` devices (may require root or udev rules)

pub mod device;
pub mod error;

// Re-exports
pub use device::{parse_options, LinuxGpioIsp, LinuxGpioIspConfig};
pub use error::{LinuxGpioError, Result};

/// Open a Linux GPIO ISP programmer and return it boxed
///
/// This is a convenience function for use in the CLI programmer dispatch.
/// See [`parse_options`] for the accepted options.
pub fn open_linux_gpio(
    options: &[(&str, &str)],
) -> std::result::Result<Box<dyn avrisp_core::programmer::IspProgrammer>, Box<dyn std::error::Error>>
{
    let config = parse_options(options)?;
    let isp = LinuxGpioIsp::open(&config)?;
    Ok(Box::new(isp))
}
