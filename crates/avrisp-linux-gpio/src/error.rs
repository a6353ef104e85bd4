//! Error types for Linux GPIO ISP operations

use thiserror::Error;

/// Linux GPIO ISP specific errors
#[derive(Debug, Error)]
pub enum LinuxGpioError {
    /// Failed to request GPIO lines
    #[error("Failed to request GPIO lines on '{path}': {source}")]
    LineRequestFailed {
        path: String,
        #[source]
        source: gpiocdev::Error,
    },

    /// GPIO chip or device not specified
    #[error("No GPIO chip specified. Use dev=/dev/gpiochipN or gpiochip=N")]
    NoDevice,

    /// The same GPIO line was assigned to two signals
    #[error("GPIO line {offset} is assigned to both {first} and {second}")]
    DuplicateLine {
        offset: u32,
        first: &'static str,
        second: &'static str,
    },
}

/// Result type for Linux GPIO ISP operations
pub type Result<T> = std::result::Result<T, LinuxGpioError>;
