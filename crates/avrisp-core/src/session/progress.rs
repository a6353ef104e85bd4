//! Progress reporting

use crate::hex::RecordError;

/// Receives progress notifications from a programming session
///
/// All methods have empty default implementations so callers only
/// implement what they display.
pub trait ProgrammingProgress {
    /// Programming started with an image of `total_lines` lines
    fn started(&mut self, _total_lines: u32) {}

    /// Completion reached a new whole percentage
    fn percent(&mut self, _percent: u8) {}

    /// Line `line_no` (1-based) was dropped as malformed
    fn record_rejected(&mut self, _line_no: u32, _error: RecordError) {}

    /// The image was fully written and the target released
    fn finished(&mut self) {}
}

/// Progress sink that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgrammingProgress for NoProgress {}

/// Turns processed line counts into percentage notifications
///
/// Each whole percentage is reported at most once and reports never go
/// backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressTracker {
    total: u32,
    processed: u32,
    last_percent: i16,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ProgressTracker {
    /// Track progress through `total` lines
    pub const fn new(total: u32) -> Self {
        Self {
            total,
            processed: 0,
            last_percent: -1,
        }
    }

    /// Expected number of lines
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Lines processed so far
    pub fn processed(&self) -> u32 {
        self.processed
    }

    /// Current percentage, clamped to 100
    ///
    /// An empty image counts as complete.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let percent = self.processed as u64 * 100 / self.total as u64;
        percent.min(100) as u8
    }

    /// Record one processed line
    ///
    /// Returns the new percentage if it has not been reported before.
    pub fn line_done(&mut self) -> Option<u8> {
        self.processed = self.processed.saturating_add(1);
        let percent = self.percent();
        if i16::from(percent) > self.last_percent {
            self.last_percent = i16::from(percent);
            Some(percent)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    #[test]
    fn test_each_percent_once() {
        let mut tracker = ProgressTracker::new(200);
        let reported: Vec<u8> = (0..200).filter_map(|_| tracker.line_done()).collect();
        // 1/200 rounds down to 0%
        assert_eq!(reported.len(), 101);
        assert_eq!(reported[0], 0);
        assert_eq!(*reported.last().unwrap(), 100);
        assert!(reported.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_underestimated_total_clamps() {
        let mut tracker = ProgressTracker::new(3);
        let reported: Vec<u8> = (0..10).filter_map(|_| tracker.line_done()).collect();
        assert_eq!(reported, [33, 66, 100]);
        assert_eq!(tracker.percent(), 100);
    }

    #[test]
    fn test_zero_total() {
        let mut tracker = ProgressTracker::new(0);
        assert_eq!(tracker.line_done(), Some(100));
        assert_eq!(tracker.line_done(), None);
    }
}
