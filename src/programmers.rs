//! Programmer registration and dispatch
//!
//! This module provides a centralized registry for all programmers, with support
//! for feature-gated inclusion.

use avrisp_core::programmer::IspProgrammer;

/// Information about a programmer
pub struct ProgrammerInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available programmers (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_programmers() -> Vec<ProgrammerInfo> {
    let mut programmers = Vec::new();

    #[cfg(feature = "dummy")]
    programmers.push(ProgrammerInfo {
        name: "dummy",
        aliases: &[],
        description: "Emulated AVR target for testing (size=<bytes>[K],busy=<polls>,reset=<line>)",
    });

    #[cfg(feature = "linux-gpio")]
    programmers.push(ProgrammerInfo {
        name: "linux_gpio",
        aliases: &["linux-gpio", "gpio"],
        description: "Linux GPIO bitbang (dev=/dev/gpiochipN,sck=,mosi=,miso=,reset=[,enable=,spispeed=<kHz>])",
    });

    programmers
}

/// Generate help text listing all available programmers
pub fn programmer_help() -> String {
    let programmers = available_programmers();

    if programmers.is_empty() {
        return "No programmers available (recompile with programmer features enabled)".to_string();
    }

    let mut help = String::from("Available programmers:\n");
    for p in &programmers {
        help.push_str(&format!("  {:12} - {}\n", p.name, p.description));
    }
    help
}

/// Resolve a programmer name or alias to its primary name
pub fn find_programmer(name: &str) -> Option<&'static str> {
    available_programmers()
        .into_iter()
        .find(|p| p.name == name || p.aliases.contains(&name))
        .map(|p| p.name)
}

/// Parse a programmer string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_programmer_string(s: &str) -> Result<(&str, Vec<(&str, &str)>), String> {
    let Some((name, opts)) = s.split_once(':') else {
        return Ok((s, Vec::new()));
    };
    let mut options = Vec::new();
    for opt in opts.split(',').filter(|opt| !opt.is_empty()) {
        match opt.split_once('=') {
            Some(pair) => options.push(pair),
            None => {
                return Err(format!(
                    "Invalid parameter format: '{}' (expected key=value)",
                    opt
                ))
            }
        }
    }
    Ok((name, options))
}

/// Open the programmer described by `programmer`
///
/// The programmer string can be just the name (e.g., "dummy") or include
/// parameters (e.g., "linux_gpio:gpiochip=0,sck=11,mosi=10,miso=9,reset=25").
#[allow(unused_variables)]
pub fn open_programmer(programmer: &str) -> Result<Box<dyn IspProgrammer>, Box<dyn std::error::Error>> {
    let (name, options) = parse_programmer_string(programmer)?;

    let canonical_name = match find_programmer(name) {
        Some(n) => n,
        None => return Err(unknown_programmer_error(name)),
    };

    match canonical_name {
        #[cfg(feature = "dummy")]
        "dummy" => {
            let config = avrisp_dummy::parse_options(&options)
                .map_err(|e| format!("Invalid dummy parameters: {}", e))?;
            log::info!("Using emulated target ({} bytes flash)", config.flash_size);
            Ok(Box::new(avrisp_dummy::DummyTarget::new(config)))
        }

        #[cfg(feature = "linux-gpio")]
        "linux_gpio" => {
            log::info!("Opening Linux GPIO programmer...");
            let master = avrisp_linux_gpio::open_linux_gpio(&options).map_err(|e| {
                format!(
                    "Failed to open Linux GPIO programmer: {}\n\
                     Make sure the GPIO chip exists and you have read/write permissions.",
                    e
                )
            })?;
            Ok(master)
        }

        _ => Err(unknown_programmer_error(name)),
    }
}

fn unknown_programmer_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown programmer: {}\n\n", name);
    msg.push_str(&programmer_help());
    msg.push_str("\nUse 'avrisp list-programmers' for more details");
    msg.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_programmer_string() {
        assert_eq!(parse_programmer_string("dummy").unwrap(), ("dummy", vec![]));
        assert_eq!(
            parse_programmer_string("linux_gpio:gpiochip=0,reset=25").unwrap(),
            ("linux_gpio", vec![("gpiochip", "0"), ("reset", "25")])
        );
        assert_eq!(parse_programmer_string("dummy:").unwrap(), ("dummy", vec![]));
        assert!(parse_programmer_string("dummy:size").is_err());
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_open_dummy() {
        let master = open_programmer("dummy:size=32K,busy=2").unwrap();
        assert_eq!(master.default_reset_line(), avrisp_dummy::DEFAULT_RESET_LINE);
        assert!(open_programmer("dummy:size=100").is_err());
        assert!(open_programmer("nonexistent").is_err());
    }

    #[cfg(feature = "linux-gpio")]
    #[test]
    fn test_open_linux_gpio_rejects_incomplete_wiring() {
        for spec in ["linux_gpio:gpiochip=0", "gpio:gpiochip=0,sck=11,mosi=10,miso=9"] {
            let err = match open_programmer(spec) {
                Ok(_) => panic!("{} opened without all required lines", spec),
                Err(e) => e.to_string(),
            };
            assert!(err.contains("Missing required parameter"), "{}", err);
        }
    }
}
