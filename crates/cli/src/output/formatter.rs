//! Output formatter for human-readable and JSON output
//!
//! In JSON mode every result is one JSON document on stdout and every error
//! one JSON document on stderr, with no colors or progress.

use serde::Serialize;
use stowage_core::Error;

use super::OutputConfig;
use crate::exit_code::ExitCode;

/// Formatter for CLI output
#[derive(Debug, Clone)]
pub struct Formatter {
    config: OutputConfig,
}

#[derive(Serialize)]
struct ErrorOutput<'a> {
    error: &'a str,
    exit_code: i32,
    retryable: bool,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    pub fn is_json(&self) -> bool {
        self.config.json
    }

    pub fn is_quiet(&self) -> bool {
        self.config.quiet
    }

    pub fn colors_enabled(&self) -> bool {
        !self.config.no_color && !self.config.json
    }

    /// Print a success message (human mode only)
    pub fn success(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }

        if self.colors_enabled() {
            println!("\x1b[32m✓\x1b[0m {message}");
        } else {
            println!("✓ {message}");
        }
    }

    /// Print an error message
    ///
    /// Errors are always printed, even in quiet mode.
    pub fn error(&self, message: &str) {
        if self.config.json {
            self.print_error_json(message, ExitCode::GeneralError, false);
        } else if self.colors_enabled() {
            eprintln!("\x1b[31m✗\x1b[0m {message}");
        } else {
            eprintln!("✗ {message}");
        }
    }

    /// Report a library error and return the exit code it maps to
    pub fn fail(&self, context: &str, err: &Error) -> ExitCode {
        let code = ExitCode::from(err);
        let message = format!("{context}: {err}");
        if self.config.json {
            self.print_error_json(&message, code, err.is_retryable());
        } else {
            self.error(&message);
        }
        code
    }

    fn print_error_json(&self, message: &str, code: ExitCode, retryable: bool) {
        let output = ErrorOutput {
            error: message,
            exit_code: code.as_i32(),
            retryable,
        };
        match serde_json::to_string_pretty(&output) {
            Ok(json) => eprintln!("{json}"),
            Err(_) => eprintln!("{message}"),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }

        if self.colors_enabled() {
            eprintln!("\x1b[33m⚠\x1b[0m {message}");
        } else {
            eprintln!("⚠ {message}");
        }
    }

    /// Print a pre-built JSON structure
    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing output: {e}"),
        }
    }

    /// Print a line of text (respects quiet mode)
    pub fn println(&self, message: &str) {
        if self.config.quiet {
            return;
        }
        println!("{message}");
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(OutputConfig::default())
    }
}
