//! Programming sessions
//!
//! A [`ProgrammingSession`] ties the pieces together: it enters programming
//! mode, erases the target, writes the fuse and lock bytes, then streams an
//! Intel HEX image into flash one line per step through a [`PageWriter`],
//! reporting progress as it goes.

mod config;
mod page;
mod progress;
mod state;

pub use config::SessionConfig;
pub use page::PageWriter;
pub use progress::{NoProgress, ProgrammingProgress, ProgressTracker};
pub use state::{ProgrammingSession, SessionState, StepOutcome};
