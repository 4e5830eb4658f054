//! Logging utilities with colored output.
//!
//! This module provides:
//! - `log!` macro for formatted terminal output with colored prefixes
//! - `debug!` for output that only appears with `--verbose`
//! - `BuildStatus` for the pass-by-pass status line the CLI overwrites
//!   with the build result
//!
//! Everything is written to stderr so that serialized trees printed on
//! stdout stay machine-readable.
//!
//! # Example
//!
//! ```ignore
//! log!("build"; "converged after {} passes", passes);
//! debug!("style"; "rule {} fired at {}", index, key_path);
//! ```

use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use owo_colors::OwoColorize;
use std::{
    io::{Write, stderr},
    sync::atomic::{AtomicBool, Ordering},
};

/// Global verbose flag (set by --verbose or `[log] verbose = true`)
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set verbose mode globally
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Log a debug message (only shown when verbose mode is enabled)
///
/// # Usage
/// ```ignore
/// debug!("module"; "debug info: {}", value);
/// ```
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix
#[inline]
pub fn log(module: &str, message: &str) {
    let module_lower = module.to_ascii_lowercase();
    let prefix = colorize_prefix(module, &module_lower);

    let mut err = stderr().lock();
    writeln!(err, "{prefix} {message}").ok();
    err.flush().ok();
}

/// Apply color to a module prefix based on module type
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> String {
    let prefix = format!("[{module}]");
    match module_lower {
        "build" => prefix.bright_blue().bold().to_string(),
        "diff" => prefix.bright_green().bold().to_string(),
        "error" => prefix.bright_red().bold().to_string(),
        _ => prefix.bright_yellow().bold().to_string(),
    }
}

// ============================================================================
// Build Status (single-line result with overwrite)
// ============================================================================

/// Single-line status display for build results
///
/// Each message overwrites the previous one, so a build that takes many
/// passes leaves one status block on the terminal.
///
/// # Example
///
/// ```ignore
/// let mut status = BuildStatus::new();
/// status.progress("pass 1");
/// status.progress("pass 2");
/// status.clear();
/// status.success("built 12 nodes in 2 passes");
/// ```
pub struct BuildStatus {
    /// Lines of previous output to clear
    last_lines: usize,
}

impl BuildStatus {
    /// Create a new status display.
    pub const fn new() -> Self {
        Self { last_lines: 0 }
    }

    /// Display success message (✓ prefix, green).
    pub fn success(&mut self, message: &str) {
        self.display(format!("{}", "✓".green()), message);
    }

    /// Display error message (✗ prefix, red) with optional detail.
    pub fn error(&mut self, summary: &str, detail: &str) {
        let message = if detail.is_empty() {
            summary.to_string()
        } else {
            format!("{summary}\n{detail}")
        };
        self.display(format!("{}", "✗".red()), &message);
    }

    /// Display an in-progress message (dimmed, no prefix).
    ///
    /// Skipped in verbose mode, where debug lines would be overwritten.
    pub fn progress(&mut self, message: &str) {
        if is_verbose() {
            return;
        }
        self.display(format!("{}", "…".dimmed()), &format!("{}", message.dimmed()));
    }

    /// Remove the last status block, e.g. before logging other lines.
    pub fn clear(&mut self) {
        let mut err = stderr().lock();
        self.erase(&mut err);
        err.flush().ok();
    }

    fn display(&mut self, symbol: String, message: &str) {
        let mut err = stderr().lock();
        self.erase(&mut err);

        writeln!(err, "{symbol} {message}").ok();
        err.flush().ok();

        self.last_lines = line_count(message);
    }

    fn erase(&mut self, out: &mut impl Write) {
        if self.last_lines > 0 {
            #[allow(clippy::cast_possible_truncation)]
            let lines = self.last_lines as u16;
            execute!(out, cursor::MoveUp(lines)).ok();
            execute!(out, Clear(ClearType::FromCursorDown)).ok();
            self.last_lines = 0;
        }
    }
}

impl Default for BuildStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of terminal lines a status message occupies.
fn line_count(message: &str) -> usize {
    message.matches('\n').count() + 1
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_status_new() {
        let status = BuildStatus::new();
        assert_eq!(status.last_lines, 0);
    }

    #[test]
    fn test_clear_forgets_last_block() {
        let mut status = BuildStatus::new();
        status.error("build failed", "duplicate key `Web`");
        assert_eq!(status.last_lines, 2);
        status.clear();
        assert_eq!(status.last_lines, 0);
    }

    #[test]
    fn test_line_count() {
        assert_eq!(line_count("built 3 nodes"), 1);
        assert_eq!(line_count("build failed\nduplicate key `Web`"), 2);
    }

    #[test]
    fn test_verbose_toggle() {
        set_verbose(true);
        assert!(is_verbose());
        set_verbose(false);
        assert!(!is_verbose());
    }
}
