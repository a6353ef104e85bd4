//! Busy-poll policy

/// How long to keep polling a busy target
///
/// The AVR reports completion of erase and write cycles through the RDY/BSY
/// poll instruction. A target that never clears the busy bit is unhealthy;
/// a bounded policy turns that into [`Error::Timeout`](crate::Error::Timeout)
/// instead of hanging the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Maximum number of poll instructions, `None` polls forever
    pub max_polls: Option<u32>,
    /// Delay between two polls in microseconds
    pub poll_delay_us: u32,
}

impl PollPolicy {
    /// Default number of polls before giving up
    pub const DEFAULT_MAX_POLLS: u32 = 100_000;
    /// Default delay between polls
    pub const DEFAULT_POLL_DELAY_US: u32 = 10;

    /// Poll at most `max_polls` times, `poll_delay_us` apart
    pub const fn bounded(max_polls: u32, poll_delay_us: u32) -> Self {
        Self {
            max_polls: Some(max_polls),
            poll_delay_us,
        }
    }

    /// Poll back-to-back until the target reports ready
    pub const fn unbounded() -> Self {
        Self {
            max_polls: None,
            poll_delay_us: 0,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::bounded(Self::DEFAULT_MAX_POLLS, Self::DEFAULT_POLL_DELAY_US)
    }
}
