//! Programmer trait definitions
//!
//! These traits use `maybe_async` to support both sync and async modes.
//! - By default, the transport is async (suitable for Embassy or tokio)
//! - With the `is_sync` feature, the transport becomes synchronous
//!
//! Control lines are always driven synchronously: setting a GPIO level is
//! not something any supported backend needs to await.

use crate::error::Result;
use maybe_async::maybe_async;

/// Opaque identifier of a control line (GPIO offset, pin number, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Line(pub u32);

impl core::fmt::Display for Line {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "line {}", self.0)
    }
}

/// Logic level of a driven line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// Driven low
    Low,
    /// Driven high
    High,
}

/// ISP transport trait (sync or async depending on `is_sync` feature)
///
/// Represents the synchronous serial bus to the target: SPI mode 0, MSB
/// first, at a clock slow enough for the target's programming interface
/// (typically below a quarter of its system clock).
///
/// ## Example
///
/// ```ignore
/// #[maybe_async]
/// impl IspTransport for MyBridge {
///     async fn begin_session(&mut self) -> Result<()> {
///         self.spi.configure(Mode::Mode0, 100_000).await
///     }
///
///     async fn transfer(&mut self, frame: [u8; 4]) -> Result<u8> {
///         let mut rx = [0u8; 4];
///         self.spi.transfer(&frame, &mut rx).await?;
///         Ok(rx[3])
///     }
///     // ...
/// }
/// ```
#[maybe_async(AFIT)]
pub trait IspTransport {
    /// Acquire the bus for a programming session
    async fn begin_session(&mut self) -> Result<()>;

    /// Release the bus at the end of a programming session
    async fn end_session(&mut self) -> Result<()>;

    /// Exchange one 4-byte instruction frame with the target
    ///
    /// Returns the fourth byte clocked back from the target. The first three
    /// response bytes carry no information for any supported instruction.
    async fn transfer(&mut self, frame: [u8; 4]) -> Result<u8>;

    /// Delay for the specified number of microseconds
    async fn delay_us(&mut self, us: u32);
}

/// Reset, power-enable and clock line control
///
/// Entering programming mode requires pulsing reset while the bus clock is
/// held low, so the clock line is exposed here in addition to the bus.
pub trait ControlLines {
    /// Reset line used when the caller does not configure one
    fn default_reset_line(&self) -> Line;

    /// Drive a control line to `level`, configuring it as an output
    fn drive(&mut self, line: Line, level: Level) -> Result<()>;

    /// Drive the bus clock line directly
    fn set_clock(&mut self, level: Level) -> Result<()>;

    /// Stop driving a control line (switch it to an input)
    fn release(&mut self, line: Line) -> Result<()>;

    /// Stop driving the bus data-out and clock lines
    fn release_bus(&mut self) -> Result<()>;
}

/// A complete ISP programmer: a transport plus its control lines
///
/// Implemented automatically for every type implementing both halves. In
/// sync mode `Box<dyn IspProgrammer>` can be passed to every protocol and
/// session function.
pub trait IspProgrammer: IspTransport + ControlLines {}

impl<T: IspTransport + ControlLines + ?Sized> IspProgrammer for T {}
