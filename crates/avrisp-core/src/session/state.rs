//! Programming session state machine

use super::{PageWriter, ProgrammingProgress, ProgressTracker, SessionConfig};
use crate::error::{Error, Result};
use crate::hex::{HexRecord, LineBuffer, LineSource, RecordType};
use crate::programmer::{IspProgrammer, Line};
use crate::protocol;
use maybe_async::maybe_async;

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No target attached
    Idle,
    /// Target is in programming mode, nothing written yet
    Ready,
    /// Target is erased and fused, image lines are being written
    Active,
}

/// Result of one [`ProgrammingSession::step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The session is not programming, nothing was done
    Idle,
    /// One image line was consumed
    DidWork,
    /// The image is complete, the target was locked and released
    Finished,
}

/// A single programming run against one target
///
/// The session owns every piece of mutable state (page buffer, address
/// counters, progress) so independent sessions never interfere. The image
/// is consumed one line per [`step`](Self::step), letting the caller
/// interleave other work between lines.
///
/// ```text
/// Idle --begin--> Ready --start_programming--> Active --step*--> Idle
/// ```
pub struct ProgrammingSession<S> {
    config: SessionConfig,
    state: SessionState,
    source: Option<S>,
    reset: Option<Line>,
    enable: Option<Line>,
    writer: PageWriter,
    tracker: ProgressTracker,
    line: LineBuffer,
}

impl<S: LineSource> ProgrammingSession<S> {
    /// Create an idle session that will program `config`
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            source: None,
            reset: None,
            enable: None,
            writer: PageWriter::new(),
            tracker: ProgressTracker::default(),
            line: LineBuffer::new(),
        }
    }

    /// Fuse, lock and poll settings of this session
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether image lines are being written
    pub fn is_programming(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Page writer statistics
    pub fn writer(&self) -> &PageWriter {
        &self.writer
    }

    /// Line progress
    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Attach an image and put the target into programming mode
    ///
    /// `reset` falls back to the programmer's default reset line. If an
    /// `enable` line is given it is held low while programming and pulsed
    /// by [`end`](Self::end) to power-cycle the target. When the target does
    /// not enter programming mode every line is released again.
    #[maybe_async]
    pub async fn begin<M: IspProgrammer + ?Sized>(
        &mut self,
        master: &mut M,
        source: Option<S>,
        reset: Option<Line>,
        enable: Option<Line>,
    ) -> Result<()> {
        if self.state == SessionState::Active {
            return Err(Error::SessionActive);
        }
        let source = source.ok_or(Error::SourceUnavailable)?;

        // Lines held by an earlier begin are released before new ones are taken
        self.abort(master).await;
        let reset = reset.unwrap_or_else(|| master.default_reset_line());
        self.reset = Some(reset);
        self.enable = enable;

        if let Err(e) =
            protocol::enter_programming_mode(master, reset, enable, &self.config.poll).await
        {
            log::error!("Failed to enter programming mode: {}", e);
            self.abort(master).await;
            return Err(e);
        }
        self.source = Some(source);
        self.state = SessionState::Ready;
        log::info!("Target in programming mode");
        Ok(())
    }

    /// Erase the target, write lock and fuse bytes, and start accepting lines
    ///
    /// A fuse that does not read back as written ends the session and the
    /// fuses after it are left untouched.
    #[maybe_async]
    pub async fn start_programming<M: IspProgrammer + ?Sized, P: ProgrammingProgress + ?Sized>(
        &mut self,
        master: &mut M,
        progress: &mut P,
    ) -> Result<()> {
        if self.state == SessionState::Active {
            return Err(Error::SessionActive);
        }
        let total_lines = match (&self.source, self.state) {
            (Some(source), SessionState::Ready) => source.total_lines(),
            _ => return Err(Error::SourceUnavailable),
        };

        if let Err(e) = self.prepare_target(master).await {
            log::error!("{}", e);
            self.abort(master).await;
            return Err(e);
        }

        self.tracker = ProgressTracker::new(total_lines);
        self.state = SessionState::Active;
        progress.started(total_lines);
        log::info!("Programming {} lines", total_lines);
        Ok(())
    }

    #[maybe_async]
    async fn prepare_target<M: IspProgrammer + ?Sized>(&mut self, master: &mut M) -> Result<()> {
        let poll = self.config.poll;
        let fuses = self.config.fuses;

        protocol::chip_erase(master, &poll).await?;
        protocol::write_lock_bits(master, fuses.lock_during, &poll).await?;
        protocol::write_fuses(master, &fuses, &poll).await?;
        self.writer.load_initial_segment(master, &poll).await
    }

    /// Consume one image line
    ///
    /// Returns [`StepOutcome::Idle`] unless the session is programming. A
    /// malformed line is reported to `progress` and skipped; it still
    /// counts as work. Once the image is exhausted the target is locked and
    /// released. A transport or timeout error aborts the session.
    #[maybe_async]
    pub async fn step<M: IspProgrammer + ?Sized, P: ProgrammingProgress + ?Sized>(
        &mut self,
        master: &mut M,
        progress: &mut P,
    ) -> Result<StepOutcome> {
        if self.state != SessionState::Active {
            return Ok(StepOutcome::Idle);
        }
        match self.advance(master, progress).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                log::error!("Programming aborted: {}", e);
                self.abort(master).await;
                Err(e)
            }
        }
    }

    #[maybe_async]
    async fn advance<M: IspProgrammer + ?Sized, P: ProgrammingProgress + ?Sized>(
        &mut self,
        master: &mut M,
        progress: &mut P,
    ) -> Result<StepOutcome> {
        let more = match self.source.as_mut() {
            Some(source) => source.next_line(&mut self.line)?,
            None => return Err(Error::SourceUnavailable),
        };
        if !more {
            return self.complete(master, progress).await;
        }

        let poll = self.config.poll;
        let line_no = self.tracker.processed() + 1;
        match HexRecord::parse(&self.line) {
            Ok(record) => match record.record_type {
                RecordType::Data => {
                    self.writer.write_bytes(master, record.data(), &poll).await?;
                }
                RecordType::EndOfFile => self.writer.finish(master, &poll).await?,
                RecordType::Other(kind) => {
                    log::debug!("Line {}: ignoring record type 0x{:02X}", line_no, kind);
                }
            },
            Err(e) => {
                log::warn!("Line {}: {}, skipping", line_no, e);
                progress.record_rejected(line_no, e);
            }
        }

        if let Some(percent) = self.tracker.line_done() {
            progress.percent(percent);
        }
        Ok(StepOutcome::DidWork)
    }

    #[maybe_async]
    async fn complete<M: IspProgrammer + ?Sized, P: ProgrammingProgress + ?Sized>(
        &mut self,
        master: &mut M,
        progress: &mut P,
    ) -> Result<StepOutcome> {
        let poll = self.config.poll;
        if self.writer.buffered() > 0 {
            log::warn!("Image ended without an end-of-file record, flushing last page");
            self.writer.finish(master, &poll).await?;
        }
        protocol::write_lock_bits(master, self.config.fuses.lock_after, &poll).await?;

        let pages = self.writer.pages_written();
        self.end(master).await?;
        progress.finished();
        log::info!("Programming complete, {} pages written", pages);
        Ok(StepOutcome::Finished)
    }

    /// Leave programming mode, release every line and reset all counters
    ///
    /// Safe to call in any state. The attached image is dropped.
    #[maybe_async]
    pub async fn end<M: IspProgrammer + ?Sized>(&mut self, master: &mut M) -> Result<()> {
        self.state = SessionState::Idle;
        self.source = None;
        self.writer.reset();
        self.tracker = ProgressTracker::default();
        match self.reset.take() {
            Some(reset) => {
                let enable = self.enable.take();
                protocol::leave_programming_mode(master, reset, enable).await
            }
            None => Ok(()),
        }
    }

    #[maybe_async]
    async fn abort<M: IspProgrammer + ?Sized>(&mut self, master: &mut M) {
        if let Err(e) = self.end(master).await {
            log::warn!("Failed to release target: {}", e);
        }
    }
}
