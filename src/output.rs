// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (scripts), and JSON output modes.

use serde::Serialize;
use std::io::Write;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Results only
    Quiet,
    /// JSON lines for scripting
    Json,
}

impl OutputMode {
    pub fn from_flags(quiet: bool, json: bool) -> Self {
        match (quiet, json) {
            (_, true) => OutputMode::Json,
            (true, false) => OutputMode::Quiet,
            (false, false) => OutputMode::Normal,
        }
    }
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    started: Instant,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            started: Instant::now(),
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Print a progress message (normal mode only).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a result line, or one JSON record carrying `value`.
    pub fn record<T: Serialize>(&self, line: &str, value: &T) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => println!("{line}"),
            OutputMode::Json => print_json(value),
        }
    }

    /// Print the combined output of a remote command.
    pub fn command_output(&self, host: &str, exit_code: u32, output: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                print!("{output}");
                let _ = std::io::stdout().flush();
            }
            OutputMode::Json => print_json(&CommandEvent {
                event: "command",
                host,
                exit_code,
                output,
                duration_secs: self.elapsed_secs(),
            }),
        }
    }

    /// Print a success message with elapsed time.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => println!("{message} ({:.1}s)", self.elapsed_secs()),
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => print_json(&Event {
                event: "success",
                message,
                duration_secs: self.elapsed_secs(),
            }),
        }
    }

    /// Print an error message to stderr.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => {
                if let Ok(json) = serde_json::to_string(&Event {
                    event: "error",
                    message,
                    duration_secs: self.elapsed_secs(),
                }) {
                    eprintln!("{json}");
                }
            }
        }
    }

    fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        println!("{json}");
    }
}

#[derive(Serialize)]
struct Event<'a> {
    event: &'a str,
    message: &'a str,
    duration_secs: f64,
}

#[derive(Serialize)]
struct CommandEvent<'a> {
    event: &'a str,
    host: &'a str,
    exit_code: u32,
    output: &'a str,
    duration_secs: f64,
}
