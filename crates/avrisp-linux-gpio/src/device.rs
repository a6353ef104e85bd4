//! Linux GPIO ISP bitbanging device implementation
//!
//! This module provides the `LinuxGpioIsp` struct that implements the
//! `IspTransport` and `ControlLines` traits using Linux's GPIO character
//! device interface (gpiocdev).
//!
//! The ISP bus is bit-banged on three lines (SCK, MOSI, MISO). The target's
//! reset line and an optional power-enable line are requested as inputs and
//! only driven while a programming session needs them, so the target runs
//! normally whenever the programmer is idle.

use crate::error::{LinuxGpioError, Result};

use std::cell::Cell;

use gpiocdev::line::{Offset, Value};
use gpiocdev::request::{Config, Request};

use avrisp_core::error::{Error as CoreError, Result as CoreResult};
use avrisp_core::programmer::bitbang::{self, BitbangIsp};
use avrisp_core::programmer::{ControlLines, IspTransport, Level, Line};

/// Default half-period delay in nanoseconds (for ~100 kHz ISP clock)
///
/// Slow enough for a target running from its 1 MHz factory clock.
const DEFAULT_HALF_PERIOD_NS: u64 = 5000;

/// Configuration for opening a Linux GPIO ISP programmer
#[derive(Debug, Clone)]
pub struct LinuxGpioIspConfig {
    /// Device path (e.g., "/dev/gpiochip0")
    pub device: String,
    /// SCK (Clock) GPIO line offset
    pub sck: Offset,
    /// MOSI (Master Out Slave In) GPIO line offset
    pub mosi: Offset,
    /// MISO (Master In Slave Out) GPIO line offset
    pub miso: Offset,
    /// Target reset GPIO line offset
    pub reset: Offset,
    /// Target power-enable GPIO line offset (optional)
    pub enable: Option<Offset>,
    /// Half-period delay in nanoseconds
    pub half_period_ns: u64,
}

impl Default for LinuxGpioIspConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            sck: 0,
            mosi: 0,
            miso: 0,
            reset: 0,
            enable: None,
            half_period_ns: DEFAULT_HALF_PERIOD_NS,
        }
    }
}

impl LinuxGpioIspConfig {
    /// Create a new configuration with the given device path and required pins
    pub fn new(
        device: impl Into<String>,
        sck: Offset,
        mosi: Offset,
        miso: Offset,
        reset: Offset,
    ) -> Self {
        Self {
            device: device.into(),
            sck,
            mosi,
            miso,
            reset,
            ..Default::default()
        }
    }

    /// Set the power-enable line
    pub fn with_enable(mut self, enable: Offset) -> Self {
        self.enable = Some(enable);
        self
    }

    /// Set the half-period delay in nanoseconds
    pub fn with_half_period_ns(mut self, ns: u64) -> Self {
        self.half_period_ns = ns;
        self
    }

    /// Set ISP clock speed in Hz (approximate, via half-period calculation)
    pub fn with_speed_hz(mut self, hz: u32) -> Self {
        // half_period = 1_000_000_000 / (2 * frequency) in nanoseconds
        if hz > 0 {
            self.half_period_ns = 500_000_000 / hz as u64;
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if self.device.is_empty() {
            return Err(LinuxGpioError::NoDevice);
        }
        let mut named = vec![
            ("sck", self.sck),
            ("mosi", self.mosi),
            ("miso", self.miso),
            ("reset", self.reset),
        ];
        if let Some(enable) = self.enable {
            named.push(("enable", enable));
        }
        for (i, &(first, offset)) in named.iter().enumerate() {
            if let Some(&(second, _)) = named[i + 1..].iter().find(|(_, o)| *o == offset) {
                return Err(LinuxGpioError::DuplicateLine {
                    offset,
                    first,
                    second,
                });
            }
        }
        Ok(())
    }
}

/// Linux GPIO ISP programmer using bitbanging
///
/// Implements `BitbangIsp` for the bus and `ControlLines` for reset, power
/// enable and the clock line.
pub struct LinuxGpioIsp {
    /// GPIO line request handle
    request: Request,
    /// Current direction and level of every requested line
    lines: Config,
    sck: Offset,
    mosi: Offset,
    miso: Offset,
    reset: Offset,
    enable: Option<Offset>,
    /// Half-period delay in nanoseconds
    half_period_ns: u64,
    /// Whether SCK and MOSI are currently outputs
    bus_driven: bool,
    /// Set when a line access failed during a bit-banged exchange
    fault: Cell<bool>,
}

impl LinuxGpioIsp {
    /// Open a Linux GPIO ISP programmer with the given configuration
    pub fn open(config: &LinuxGpioIspConfig) -> Result<Self> {
        config.validate()?;

        log::debug!("linux_gpio: Opening device {}", config.device);

        // Bus and control lines start released so the target keeps running
        let mut lines = Config::default();
        lines.with_line(config.sck).as_input();
        lines.with_line(config.mosi).as_input();
        lines.with_line(config.miso).as_input();
        lines.with_line(config.reset).as_input();
        if let Some(enable) = config.enable {
            lines.with_line(enable).as_input();
        }

        let request = Request::from_config(lines.clone())
            .on_chip(&config.device)
            .with_consumer("avrisp")
            .request()
            .map_err(|source| LinuxGpioError::LineRequestFailed {
                path: config.device.clone(),
                source,
            })?;

        log::info!(
            "linux_gpio: Opened {} (sck={}, mosi={}, miso={}, reset={}{})",
            config.device,
            config.sck,
            config.mosi,
            config.miso,
            config.reset,
            match config.enable {
                Some(enable) => format!(", enable={}", enable),
                None => String::new(),
            }
        );

        Ok(Self {
            request,
            lines,
            sck: config.sck,
            mosi: config.mosi,
            miso: config.miso,
            reset: config.reset,
            enable: config.enable,
            half_period_ns: config.half_period_ns,
            bus_driven: false,
            fault: Cell::new(false),
        })
    }

    /// Apply the current line configuration to the request
    fn apply(&mut self) -> CoreResult<()> {
        self.request
            .reconfigure(&self.lines)
            .map(|_| ())
            .map_err(|e| {
                log::error!("linux_gpio: Failed to reconfigure lines: {}", e);
                CoreError::LineControlFailed
            })
    }

    /// Switch SCK and MOSI to outputs, both low
    fn drive_bus(&mut self) -> CoreResult<()> {
        if self.bus_driven {
            return Ok(());
        }
        self.lines.with_line(self.sck).as_output(Value::Inactive);
        self.lines.with_line(self.mosi).as_output(Value::Inactive);
        self.apply()?;
        self.bus_driven = true;
        Ok(())
    }

    fn control_offset(&self, line: Line) -> CoreResult<Offset> {
        if line.0 == self.reset || Some(line.0) == self.enable {
            Ok(line.0)
        } else {
            log::error!("linux_gpio: {} is not a requested control line", line);
            Err(CoreError::LineControlFailed)
        }
    }

    fn set_line(&mut self, offset: Offset, high: bool) {
        let value = if high { Value::Active } else { Value::Inactive };
        if let Err(e) = self.request.set_value(offset, value) {
            log::error!("linux_gpio: Failed to set line {}: {}", offset, e);
            self.fault.set(true);
        }
    }
}

impl BitbangIsp for LinuxGpioIsp {
    fn set_sck(&mut self, high: bool) {
        self.set_line(self.sck, high);
    }

    fn set_mosi(&mut self, high: bool) {
        self.set_line(self.mosi, high);
    }

    fn get_miso(&self) -> bool {
        match self.request.value(self.miso) {
            Ok(value) => value == Value::Active,
            Err(e) => {
                log::error!("linux_gpio: Failed to read MISO: {}", e);
                self.fault.set(true);
                false
            }
        }
    }

    fn half_period_delay(&self) {
        if self.half_period_ns > 0 {
            std::thread::sleep(std::time::Duration::from_nanos(self.half_period_ns));
        }
    }

    fn take_fault(&self) -> bool {
        self.fault.take()
    }
}

impl IspTransport for LinuxGpioIsp {
    fn begin_session(&mut self) -> CoreResult<()> {
        self.fault.set(false);
        self.drive_bus()
    }

    fn end_session(&mut self) -> CoreResult<()> {
        // The lines stay driven until release_bus
        if self.bus_driven {
            self.set_line(self.sck, false);
        }
        Ok(())
    }

    fn transfer(&mut self, frame: [u8; 4]) -> CoreResult<u8> {
        if !self.bus_driven {
            return Err(CoreError::TransferFailed);
        }
        bitbang::transfer_frame(self, frame)
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(std::time::Duration::from_micros(us as u64));
    }
}

impl ControlLines for LinuxGpioIsp {
    fn default_reset_line(&self) -> Line {
        Line(self.reset)
    }

    fn drive(&mut self, line: Line, level: Level) -> CoreResult<()> {
        let offset = self.control_offset(line)?;
        let value = match level {
            Level::Low => Value::Inactive,
            Level::High => Value::Active,
        };
        self.lines.with_line(offset).as_output(value);
        self.apply()
    }

    fn set_clock(&mut self, level: Level) -> CoreResult<()> {
        self.drive_bus()?;
        let value = match level {
            Level::Low => Value::Inactive,
            Level::High => Value::Active,
        };
        self.request
            .set_value(self.sck, value)
            .map(|_| ())
            .map_err(|e| {
                log::error!("linux_gpio: Failed to set SCK: {}", e);
                CoreError::LineControlFailed
            })
    }

    fn release(&mut self, line: Line) -> CoreResult<()> {
        let offset = self.control_offset(line)?;
        self.lines.with_line(offset).as_input();
        self.apply()
    }

    fn release_bus(&mut self) -> CoreResult<()> {
        self.lines.with_line(self.sck).as_input();
        self.lines.with_line(self.mosi).as_input();
        self.apply()?;
        self.bus_driven = false;
        Ok(())
    }
}

/// Parse programmer options from a list of key-value pairs
///
/// # Supported Options
///
/// - `dev=/dev/gpiochipN` - GPIO chip device path (required, or use gpiochip)
/// - `gpiochip=N` - GPIO chip number (alternative to dev)
/// - `sck=N` - SCK (clock) GPIO line offset (required)
/// - `mosi=N` - MOSI GPIO line offset (required)
/// - `miso=N` - MISO GPIO line offset (required)
/// - `reset=N` - target reset GPIO line offset (required)
/// - `enable=N` - target power-enable GPIO line offset (optional)
/// - `spispeed=N` - ISP clock in kHz (optional, default ~100 kHz)
pub fn parse_options(options: &[(&str, &str)]) -> std::result::Result<LinuxGpioIspConfig, String> {
    let mut config = LinuxGpioIspConfig::default();
    let mut have_sck = false;
    let mut have_mosi = false;
    let mut have_miso = false;
    let mut have_reset = false;
    let mut gpiochip: Option<u32> = None;

    let offset = |key: &str, value: &str| -> std::result::Result<Offset, String> {
        value
            .parse()
            .map_err(|_| format!("Invalid {} value: {}", key, value))
    };

    for &(key, value) in options {
        match key {
            "dev" => config.device = value.to_string(),
            "gpiochip" => gpiochip = Some(offset(key, value)?),
            "sck" => {
                config.sck = offset(key, value)?;
                have_sck = true;
            }
            "mosi" => {
                config.mosi = offset(key, value)?;
                have_mosi = true;
            }
            "miso" => {
                config.miso = offset(key, value)?;
                have_miso = true;
            }
            "reset" => {
                config.reset = offset(key, value)?;
                have_reset = true;
            }
            "enable" => config.enable = Some(offset(key, value)?),
            "spispeed" => {
                let speed_khz: u32 = value
                    .parse()
                    .map_err(|_| format!("Invalid spispeed value: {}", value))?;
                config = config.with_speed_hz(speed_khz.saturating_mul(1000));
            }
            _ => {
                log::warn!("linux_gpio: Unknown option: {}={}", key, value);
            }
        }
    }

    if config.device.is_empty() {
        if let Some(n) = gpiochip {
            if n > 9 {
                return Err("Maximum gpiochip number supported is 9".to_string());
            }
            config.device = format!("/dev/gpiochip{}", n);
        } else {
            return Err("Either 'dev' or 'gpiochip' must be specified.\n\
                 e.g. linux_gpio:dev=/dev/gpiochip0,sck=11,mosi=10,miso=9,reset=25"
                .to_string());
        }
    } else if gpiochip.is_some() {
        return Err("Only one of 'dev' or 'gpiochip' can be specified".to_string());
    }

    if !have_sck {
        return Err("Missing required parameter: sck".to_string());
    }
    if !have_mosi {
        return Err("Missing required parameter: mosi".to_string());
    }
    if !have_miso {
        return Err("Missing required parameter: miso".to_string());
    }
    if !have_reset {
        return Err("Missing required parameter: reset".to_string());
    }

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PINS: [(&str, &str); 4] = [("sck", "11"), ("mosi", "10"), ("miso", "9"), ("reset", "25")];

    fn with_pins<'a>(extra: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
        let mut options = PINS.to_vec();
        options.extend_from_slice(extra);
        options
    }

    #[test]
    fn test_parse_gpiochip() {
        let config = parse_options(&with_pins(&[("gpiochip", "0")])).unwrap();
        assert_eq!(config.device, "/dev/gpiochip0");
        assert_eq!(config.sck, 11);
        assert_eq!(config.mosi, 10);
        assert_eq!(config.miso, 9);
        assert_eq!(config.reset, 25);
        assert_eq!(config.enable, None);
        assert_eq!(config.half_period_ns, DEFAULT_HALF_PERIOD_NS);
    }

    #[test]
    fn test_parse_enable_and_speed() {
        let config = parse_options(&with_pins(&[
            ("dev", "/dev/gpiochip4"),
            ("enable", "17"),
            ("spispeed", "250"),
        ]))
        .unwrap();
        assert_eq!(config.device, "/dev/gpiochip4");
        assert_eq!(config.enable, Some(17));
        assert_eq!(config.half_period_ns, 2000);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_options(&PINS).is_err());
        assert!(parse_options(&with_pins(&[("dev", "/dev/gpiochip0"), ("gpiochip", "0")])).is_err());
        assert!(parse_options(&with_pins(&[("gpiochip", "12")])).is_err());
        assert!(parse_options(&[("gpiochip", "0"), ("sck", "11")]).is_err());
        assert!(parse_options(&with_pins(&[("gpiochip", "0"), ("enable", "x")])).is_err());
        // reset shares a line with sck
        assert!(parse_options(&with_pins(&[("gpiochip", "0"), ("reset", "11")])).is_err());
    }
}
