//! Program command implementation

use avrisp_core::hex::{RecordError, SliceSource};
use avrisp_core::programmer::{IspProgrammer, Line};
use avrisp_core::session::{ProgrammingProgress, ProgrammingSession, SessionConfig, StepOutcome};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Progress reporter using an indicatif progress bar
struct IndicatifProgress {
    bar: Option<ProgressBar>,
    rejected: u32,
}

impl IndicatifProgress {
    fn new() -> Self {
        Self {
            bar: None,
            rejected: 0,
        }
    }
}

impl ProgrammingProgress for IndicatifProgress {
    fn started(&mut self, total_lines: u32) {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message(format!("Programming {} lines", total_lines));
        pb.enable_steady_tick(Duration::from_millis(100));
        self.bar = Some(pb);
    }

    fn percent(&mut self, percent: u8) {
        if let Some(pb) = &self.bar {
            pb.set_position(percent as u64);
        }
    }

    fn record_rejected(&mut self, line_no: u32, error: RecordError) {
        self.rejected += 1;
        if let Some(pb) = &self.bar {
            pb.println(format!("Skipped line {}: {}", line_no, error));
        }
    }

    fn finished(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.finish_with_message("Programming complete");
        }
    }
}

impl Drop for IndicatifProgress {
    fn drop(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.abandon_with_message("Programming failed");
        }
    }
}

/// Reject anything that is not named like an Intel HEX image
pub fn check_hex_extension(input: &Path) -> Result<(), String> {
    match input.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("hex") => Ok(()),
        _ => Err(format!("{} is not an Intel HEX file (.hex)", input.display())),
    }
}

/// Run the program command
pub fn run_program<M: IspProgrammer + ?Sized>(
    master: &mut M,
    input: &Path,
    config: SessionConfig,
    total_lines: Option<u32>,
    reset: Option<Line>,
    enable: Option<Line>,
) -> Result<(), Box<dyn std::error::Error>> {
    check_hex_extension(input)?;
    let image = std::fs::read(input)
        .map_err(|e| format!("Failed to read {}: {}", input.display(), e))?;
    println!("Read {} bytes from {:?}", image.len(), input);

    let mut progress = IndicatifProgress::new();
    program_image(master, &image, config, total_lines, reset, enable, &mut progress)?;

    if progress.rejected > 0 {
        println!("Warning: {} malformed lines were skipped", progress.rejected);
    }
    println!("Program complete!");
    Ok(())
}

/// Run a full programming session over an in-memory image
pub fn program_image<M, P>(
    master: &mut M,
    image: &[u8],
    config: SessionConfig,
    total_lines: Option<u32>,
    reset: Option<Line>,
    enable: Option<Line>,
    progress: &mut P,
) -> avrisp_core::Result<()>
where
    M: IspProgrammer + ?Sized,
    P: ProgrammingProgress + ?Sized,
{
    let source = match total_lines {
        Some(total) => SliceSource::with_total_lines(image, total),
        None => SliceSource::new(image),
    };

    let mut session = ProgrammingSession::new(config);
    session.begin(master, Some(source), reset, enable)?;
    session.start_programming(master, progress)?;
    while session.step(master, progress)? == StepOutcome::DidWork {}
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use avrisp_core::session::NoProgress;
    use avrisp_dummy::DummyTarget;

    const BLINK: &str = ":100000000C945C000C946E000C946E000C946E00CA\r\n\
                         :0400100011223344EA\r\n\
                         :00000001FF\r\n";

    #[test]
    fn test_hex_extension() {
        assert!(check_hex_extension(Path::new("blink.hex")).is_ok());
        assert!(check_hex_extension(Path::new("BLINK.HEX")).is_ok());
        assert!(check_hex_extension(Path::new("blink.bin")).is_err());
        assert!(check_hex_extension(Path::new("hex")).is_err());
    }

    #[test]
    fn test_program_image() {
        let mut target = DummyTarget::new_default();
        program_image(
            &mut target,
            BLINK.as_bytes(),
            SessionConfig::default(),
            None,
            None,
            None,
            &mut NoProgress,
        )
        .unwrap();

        let flash = target.flash();
        assert_eq!(&flash[..4], &[0x0C, 0x94, 0x5C, 0x00]);
        assert_eq!(&flash[16..20], &[0x11, 0x22, 0x33, 0x44]);
        assert_eq!(flash[20], 0xFF);
        assert!(!target.in_programming_mode());
    }

    #[test]
    fn test_program_boxed_programmer() {
        let mut master: Box<dyn IspProgrammer> = Box::new(DummyTarget::new_default());
        let result = program_image(
            master.as_mut(),
            BLINK.as_bytes(),
            SessionConfig::default(),
            Some(3),
            None,
            None,
            &mut NoProgress,
        );
        assert!(result.is_ok());
    }
}
