//! CLI command implementations
//!
//! Every command opens programming mode itself and releases the target
//! before returning, also on failure.

pub mod erase;
pub mod fuses;
pub mod program;

use crate::programmers;

/// List all supported programmers
pub fn list_programmers() {
    println!("Supported programmers:");
    println!();
    for p in programmers::available_programmers() {
        if p.aliases.is_empty() {
            println!("  {:12} - {}", p.name, p.description);
        } else {
            println!(
                "  {:12} - {} (aliases: {})",
                p.name,
                p.description,
                p.aliases.join(", ")
            );
        }
    }
}
