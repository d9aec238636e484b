// ABOUTME: Pseudo-terminal request parameters.
// ABOUTME: Terminal kind, geometry, and the encoded terminal mode flags.

use russh::Pty;

pub const DEFAULT_TERM: &str = "xterm";
pub const DEFAULT_ROWS: u32 = 25;
pub const DEFAULT_COLS: u32 = 80;
pub const DEFAULT_SPEED: u32 = 14400;

/// Parameters of the pty allocated before the remote shell starts.
///
/// Remote echo is off by default: the browser terminal renders its own input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyRequest {
    pub term: String,
    pub rows: u32,
    pub cols: u32,
    pub echo: bool,
    /// Input baud rate (TTY_OP_ISPEED).
    pub input_speed: u32,
    /// Output baud rate (TTY_OP_OSPEED).
    pub output_speed: u32,
}

impl Default for PtyRequest {
    fn default() -> Self {
        Self {
            term: DEFAULT_TERM.to_string(),
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            echo: false,
            input_speed: DEFAULT_SPEED,
            output_speed: DEFAULT_SPEED,
        }
    }
}

impl PtyRequest {
    pub fn term(mut self, term: impl Into<String>) -> Self {
        self.term = term.into();
        self
    }

    pub fn size(mut self, rows: u32, cols: u32) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn speed(mut self, input: u32, output: u32) -> Self {
        self.input_speed = input;
        self.output_speed = output;
        self
    }

    /// Terminal modes as sent in the pty-req message.
    pub fn modes(&self) -> Vec<(Pty, u32)> {
        vec![
            (Pty::ECHO, u32::from(self.echo)),
            (Pty::TTY_OP_ISPEED, self.input_speed),
            (Pty::TTY_OP_OSPEED, self.output_speed),
        ]
    }
}
