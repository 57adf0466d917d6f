use crate::builtin::{Builtin, Control};
use crate::config::Config;
use crate::parser::{Expression, ParseError, Parser};
use crate::pipeline::{Job, JobMode, Pipeline};
use crate::print_to;
use crate::quotes;
use crate::reader::{self, LineReader};
use crate::session::Session;
use std::io::{self, Write};
use tracing::{debug, warn};

/// The read loop: parse a line, handle built-ins in process, run everything
/// else as a pipeline, report failures and carry on.
pub struct Shell<O, E> {
    config: Config,
    session: Session,
    background: Vec<Job>,
    out: O,
    err: E,
}

impl Shell<io::Stdout, io::Stderr> {
    pub fn new(config: Config, session: Session) -> Self {
        Self::with_output(config, session, io::stdout(), io::stderr())
    }
}

impl<O: Write, E: Write> Shell<O, E> {
    pub fn with_output(config: Config, session: Session, out: O, err: E) -> Self {
        Self {
            config,
            session,
            background: Vec::new(),
            out,
            err,
        }
    }

    #[cfg(test)]
    fn session(&self) -> &Session {
        &self.session
    }

    #[cfg(test)]
    fn output(&self) -> &O {
        &self.out
    }

    #[cfg(test)]
    fn errors(&self) -> &E {
        &self.err
    }

    /// Background jobs that have not been collected yet.
    #[cfg(test)]
    fn background(&self) -> &[Job] {
        &self.background
    }

    /// Reads and evaluates lines until end of input or `exit`.
    pub fn repl(&mut self, reader: &mut impl LineReader) -> io::Result<()> {
        loop {
            self.reap_background();

            let prompt = if self.config.prompt {
                let cwd = Some(self.session.cwd()).filter(|cwd| cwd.is_dir());
                reader::prompt(cwd)
            } else {
                String::new()
            };

            let Some(line) = reader.read_line(&prompt)? else {
                return Ok(());
            };

            if self.eval(&line)? == Control::Exit {
                return Ok(());
            }
        }
    }

    /// Evaluates one line. Only failures to write to the shell's own output
    /// are returned, everything else is reported on the error stream.
    pub fn eval(&mut self, line: &str) -> io::Result<Control> {
        let mut expression = match Parser::new(line).parse() {
            Ok(expression) => expression,
            Err(ParseError::Empty) => return Ok(Control::Continue),
            Err(err) => {
                print_to!(self.err, "{err}\n");
                return Ok(Control::Continue);
            }
        };
        quotes::strip_quotes(&mut expression, &self.config.quote_fix);
        debug!(?expression, "parsed");

        if !expression.is_pipeline() {
            let cmd = &expression.commands[0];
            if let Some(builtin) = Builtin::lookup(cmd.name()) {
                return match builtin.run(cmd, &mut self.session) {
                    Ok(control) => Ok(control),
                    Err(err) => {
                        print_to!(self.err, "{err}\n");
                        Ok(Control::Continue)
                    }
                };
            }
        }

        self.run_pipeline(&expression)?;
        Ok(Control::Continue)
    }

    fn run_pipeline(&mut self, expression: &Expression) -> io::Result<()> {
        let mut pipeline = Pipeline::new(expression, self.config.wait);
        let result = pipeline.run();

        for job in pipeline.into_jobs() {
            if job.mode() == JobMode::Background {
                print_to!(self.out, "Background process PID: {}\n", job.pid());
            }
            if job.status().is_none() {
                self.background.push(job);
            }
        }
        self.out.flush()?;

        if let Err(err) = result {
            debug!(%err, "pipeline aborted");
            print_to!(self.err, "{}\n", err.errno().desc());
        }

        Ok(())
    }

    /// Collects background stages that have exited since the last prompt.
    fn reap_background(&mut self) {
        self.background.retain_mut(|job| match job.try_reap() {
            Ok(Some(code)) => {
                debug!(pid = %job.pid(), code, "background stage finished");
                false
            }
            Ok(None) => true,
            Err(errno) => {
                warn!(pid = %job.pid(), %errno, "cannot collect background stage");
                false
            }
        });
    }
}
