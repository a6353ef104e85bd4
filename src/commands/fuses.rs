//! Fuse read-out command implementation

use avrisp_core::fuse::{FuseKind, FuseReadout};
use avrisp_core::programmer::{IspProgrammer, Line};
use avrisp_core::protocol::{self, PollPolicy};

/// Run the read-fuses command
pub fn run_read_fuses<M: IspProgrammer + ?Sized>(
    master: &mut M,
    reset: Option<Line>,
    enable: Option<Line>,
) -> Result<(), Box<dyn std::error::Error>> {
    let readout = read_target_fuses(master, reset, enable)?;
    print_fuses(&readout);
    Ok(())
}

/// Enter programming mode, read every fuse byte and release the target
pub fn read_target_fuses<M: IspProgrammer + ?Sized>(
    master: &mut M,
    reset: Option<Line>,
    enable: Option<Line>,
) -> avrisp_core::Result<FuseReadout> {
    let reset = reset.unwrap_or_else(|| master.default_reset_line());
    let readout = protocol::enter_programming_mode(master, reset, enable, &PollPolicy::default())
        .and_then(|()| protocol::read_fuses(master));
    let released = protocol::leave_programming_mode(master, reset, enable);
    let readout = readout?;
    released?;
    Ok(readout)
}

fn print_fuses(readout: &FuseReadout) {
    println!("Fuse and Lock Bytes");
    println!("===================");
    println!();
    for kind in FuseKind::ALL {
        println!("{:<9} 0x{:02X}", format!("{}:", kind), readout.fuse(kind));
    }
    println!("{:<9} 0x{:02X} ({})", "lock:", readout.lock, readout.lock_mode());
    println!();

    // Programmed bits read as 0
    let low: Vec<&str> = readout.low_bits().programmed().iter_names().map(|(n, _)| n).collect();
    let high: Vec<&str> = readout.high_bits().programmed().iter_names().map(|(n, _)| n).collect();
    println!("Programmed low fuse bits:  {}", names_or_none(&low));
    println!("Programmed high fuse bits: {}", names_or_none(&high));
}

fn names_or_none(names: &[&str]) -> String {
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avrisp_dummy::DummyTarget;

    #[test]
    fn test_read_target_fuses() {
        let mut target = DummyTarget::new_default();
        let readout = read_target_fuses(&mut target, None, None).unwrap();
        assert_eq!(readout, target.config().initial);
        assert!(!target.in_programming_mode());
    }

    #[test]
    fn test_names_or_none() {
        assert_eq!(names_or_none(&[]), "(none)");
        assert_eq!(names_or_none(&["SPIEN", "EESAVE"]), "SPIEN EESAVE");
    }
}
