//! Erase command implementation

use avrisp_core::programmer::{IspProgrammer, Line};
use avrisp_core::protocol::{self, PollPolicy};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Run the erase command
///
/// Erases flash and lock bits. Fuses are not touched.
pub fn run_erase<M: IspProgrammer + ?Sized>(
    master: &mut M,
    poll: &PollPolicy,
    reset: Option<Line>,
    enable: Option<Line>,
) -> Result<(), Box<dyn std::error::Error>> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message("Erasing target...");
    pb.enable_steady_tick(Duration::from_millis(100));

    match erase_target(master, poll, reset, enable) {
        Ok(()) => {
            pb.finish_with_message("Chip erase complete");
            Ok(())
        }
        Err(e) => {
            pb.abandon_with_message("Chip erase failed");
            Err(e.into())
        }
    }
}

/// Enter programming mode, erase the chip and release the target
pub fn erase_target<M: IspProgrammer + ?Sized>(
    master: &mut M,
    poll: &PollPolicy,
    reset: Option<Line>,
    enable: Option<Line>,
) -> avrisp_core::Result<()> {
    let reset = reset.unwrap_or_else(|| master.default_reset_line());
    let erased = protocol::enter_programming_mode(master, reset, enable, poll)
        .and_then(|()| protocol::chip_erase(master, poll));
    let released = protocol::leave_programming_mode(master, reset, enable);
    erased.and(released)
}

#[cfg(test)]
mod tests {
    use super::*;
    use avrisp_core::isp::Instruction;
    use avrisp_dummy::{DummyConfig, DummyTarget};

    #[test]
    fn test_erase_target() {
        let mut target = DummyTarget::new_default();
        erase_target(&mut target, &PollPolicy::default(), None, None).unwrap();
        assert_eq!(target.count_exact(Instruction::chip_erase()), 1);
        assert!(!target.in_programming_mode());
    }

    #[test]
    fn test_erase_stuck_target_releases_lines() {
        let mut target = DummyTarget::new(DummyConfig {
            stuck_busy: true,
            ..Default::default()
        });
        let poll = PollPolicy::bounded(5, 0);
        assert_eq!(
            erase_target(&mut target, &poll, None, None),
            Err(avrisp_core::Error::Timeout)
        );
        assert!(!target.in_programming_mode());
    }
}
