//! Output mode shared by all subcommands.

use serde::Serialize;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, Default)]
pub struct OutputMode {
    pub json: bool,
    pub quiet: bool,
}

static MODE: OnceLock<OutputMode> = OnceLock::new();

/// Set once at startup from the global flags.
pub fn init(mode: OutputMode) {
    let _ = MODE.set(mode);
}

fn mode() -> OutputMode {
    MODE.get().copied().unwrap_or_default()
}

pub fn is_json() -> bool {
    mode().json
}

pub fn is_quiet() -> bool {
    mode().quiet
}

/// Pretty-print a value as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("  Error: failed to serialize output: {e}"),
    }
}

/// Print a human-readable line unless quiet or JSON mode is on.
pub fn say(line: impl AsRef<str>) {
    let mode = mode();
    if !mode.quiet && !mode.json {
        println!("{}", line.as_ref());
    }
}
