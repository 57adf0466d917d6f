use crate::lexer;
use std::path::PathBuf;

const BACKGROUND: &str = "&";
const REDIRECT_INPUT: &str = "<";
const REDIRECT_OUTPUT: &str = ">";

/// One pipeline stage: the program (or built-in) name followed by its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub args: Vec<String>,
}

impl Command {
    pub fn new(args: Vec<String>) -> Self {
        Self { args }
    }

    pub fn name(&self) -> &str {
        &self.args[0]
    }

    pub fn arguments(&self) -> &[String] {
        &self.args[1..]
    }
}

/// A parsed input line.
///
/// `input` belongs to the first stage only, `output` to the last stage only.
/// A single-stage expression may carry both.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Expression {
    pub commands: Vec<Command>,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub background: bool,
}

impl Expression {
    pub fn is_pipeline(&self) -> bool {
        self.commands.len() > 1
    }

    pub fn last_index(&self) -> usize {
        self.commands.len() - 1
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty input")]
    Empty,
    #[error("empty command in pipeline stage {0}")]
    EmptyCommand(usize),
}

pub struct Parser {
    stages: Vec<Vec<String>>,
    expression: Expression,
}

impl Parser {
    pub fn new(line: &str) -> Self {
        Self {
            stages: lexer::split_stages(line),
            expression: Expression::default(),
        }
    }

    /// Builds the expression.
    ///
    /// Markers are recognised only at the edges of the line: `&` and `> file`
    /// at the end of the last stage, `< file` at the end of the first stage.
    /// Anywhere else they are passed through as ordinary arguments.
    ///
    /// A line without any stage content and without `|` is [`ParseError::Empty`].
    /// Once a `|` splits the line, every empty group is an error.
    pub fn parse(mut self) -> Result<Expression, ParseError> {
        match self.stages.as_slice() {
            [] => return Err(ParseError::Empty),
            [only] if only.is_empty() => return Err(ParseError::Empty),
            _ => {}
        }

        let last = self.stages.len() - 1;
        let stages = std::mem::take(&mut self.stages);
        for (i, mut args) in stages.into_iter().enumerate() {
            if i == last {
                self.take_background(&mut args);
                self.expression.output = take_redirect(&mut args, REDIRECT_OUTPUT);
            }
            if i == 0 {
                self.expression.input = take_redirect(&mut args, REDIRECT_INPUT);
            }

            if args.is_empty() {
                return Err(ParseError::EmptyCommand(i));
            }
            self.expression.commands.push(Command::new(args));
        }

        Ok(self.expression)
    }

    fn take_background(&mut self, args: &mut Vec<String>) {
        if args.len() > 1 && args.last().is_some_and(|arg| arg == BACKGROUND) {
            self.expression.background = true;
            args.pop();
        }
    }
}

fn take_redirect(args: &mut Vec<String>, marker: &str) -> Option<PathBuf> {
    if args.len() <= 2 || args[args.len() - 2] != marker {
        return None;
    }

    let path = args.pop().map(PathBuf::from);
    args.pop();
    path
}
