use crate::print_to;
use std::io::{self, BufRead, Write};
use std::path::Path;

const GREEN: &str = "\x1b[32m";
const DEFAULT_COLOR: &str = "\x1b[39m";
const DELIMITER: &str = "$ ";

/// Source of input lines for the read loop.
pub trait LineReader {
    /// Shows `prompt` (if not empty) and returns the next line without its
    /// line ending, or `None` at end of input.
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

/// Reads lines from any buffered input and renders the prompt to `output`.
pub struct StreamReader<R, W> {
    input: R,
    output: W,
    buffer: String,
}

impl<R: BufRead, W: Write> StreamReader<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            buffer: String::new(),
        }
    }
}

impl StreamReader<io::StdinLock<'static>, io::Stdout> {
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> LineReader for StreamReader<R, W> {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        if !prompt.is_empty() {
            print_to!(self.output, "{prompt}");
            self.output.flush()?;
        }

        self.buffer.clear();
        if self.input.read_line(&mut self.buffer)? == 0 {
            return Ok(None);
        }

        let line = self.buffer.trim_end_matches(['\n', '\r']);
        Ok(Some(line.to_string()))
    }
}

/// The working directory in green followed by `$ `.
pub fn prompt(cwd: Option<&Path>) -> String {
    match cwd {
        Some(cwd) => format!("{GREEN}{}{DEFAULT_COLOR}{DELIMITER}", cwd.display()),
        None => DELIMITER.to_string(),
    }
}
