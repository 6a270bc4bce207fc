//! Output helpers — global flags, JSON printing, and terminal styling.
//!
//! Global flags are carried in environment variables set once by `main`, so
//! every module can check them without threading state through calls.

use serde::Serialize;

/// Whether `--json` was passed.
pub fn is_json() -> bool {
    std::env::var("CHARTWATCH_JSON").is_ok()
}

/// Whether `--quiet` was passed.
pub fn is_quiet() -> bool {
    std::env::var("CHARTWATCH_QUIET").is_ok()
}

/// Whether `--verbose` was passed.
pub fn is_verbose() -> bool {
    std::env::var("CHARTWATCH_VERBOSE").is_ok()
}

/// Whether `--no-color` was passed.
pub fn no_color() -> bool {
    std::env::var("CHARTWATCH_NO_COLOR").is_ok() || std::env::var("NO_COLOR").is_ok()
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("  Error: failed to serialize output: {e}"),
    }
}

/// Minimal terminal styling, degraded to plain symbols without color.
pub struct Styled {
    color: bool,
}

impl Styled {
    pub fn new() -> Self {
        Self { color: !no_color() }
    }

    pub fn ok_sym(&self) -> &'static str {
        if self.color {
            "\x1b[32m✓\x1b[0m"
        } else {
            "✓"
        }
    }

    pub fn warn_sym(&self) -> &'static str {
        if self.color {
            "\x1b[33m!\x1b[0m"
        } else {
            "!"
        }
    }

    pub fn err_sym(&self) -> &'static str {
        if self.color {
            "\x1b[31m✗\x1b[0m"
        } else {
            "✗"
        }
    }

    pub fn dim(&self, text: &str) -> String {
        if self.color {
            format!("\x1b[2m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }
}
