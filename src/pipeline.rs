use crate::builtin::Builtin;
use crate::parser::{Command, Expression};
use crate::redirect::{Redirect, RedirectError, Stream};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::libc;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::wait::{self, WaitPidFlag, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};
use std::convert::Infallible;
use std::ffi::{CString, NulError};
use std::io::{self, Write};
use std::os::fd::OwnedFd;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;

/// When the interpreter waits on a foreground pipeline's stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitStrategy {
    /// Wait on each stage right after spawning it, before the next one
    /// exists. A stage that fills its pipe before exiting stalls the line.
    #[default]
    EachStage,
    /// Spawn every stage, then wait on them in order.
    AllStages,
}

impl FromStr for WaitStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "each-stage" => Ok(WaitStrategy::EachStage),
            "all-stages" => Ok(WaitStrategy::AllStages),
            _ => Err(format!(
                "unknown wait strategy {s:?}, expected each-stage or all-stages"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobMode {
    Foreground,
    Background,
}

/// A spawned stage process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pid: Pid,
    mode: JobMode,
    status: Option<i32>,
}

impl Job {
    fn new(pid: Pid, mode: JobMode) -> Self {
        Self {
            pid,
            mode,
            status: None,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn mode(&self) -> JobMode {
        self.mode
    }

    /// Exit status once the process has been waited on. Death by signal is
    /// reported as `128 + signal`.
    pub fn status(&self) -> Option<i32> {
        self.status
    }

    pub fn wait(&mut self) -> Result<i32, ExecError> {
        if let Some(status) = self.status {
            return Ok(status);
        }

        loop {
            match wait::waitpid(self.pid, None) {
                Ok(status) => {
                    if let Some(code) = exit_code(status) {
                        debug!(pid = %self.pid, code, "stage exited");
                        self.status = Some(code);
                        return Ok(code);
                    }
                }
                Err(Errno::EINTR) => continue,
                Err(source) => {
                    return Err(ExecError::Wait {
                        pid: self.pid,
                        source,
                    });
                }
            }
        }
    }

    /// Collects the process if it has exited, without blocking.
    pub fn try_reap(&mut self) -> Result<Option<i32>, Errno> {
        if self.status.is_some() {
            return Ok(self.status);
        }

        match wait::waitpid(self.pid, Some(WaitPidFlag::WNOHANG))? {
            WaitStatus::StillAlive => Ok(None),
            status => {
                self.status = exit_code(status);
                Ok(self.status)
            }
        }
    }
}

/// Both ends are close-on-exec so a pipe never leaks into an unrelated
/// program; the copies placed on stdin/stdout by `dup2` do not inherit the flag.
#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
fn cloexec_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    unistd::pipe2(OFlag::O_CLOEXEC)
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
fn cloexec_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    unistd::pipe()
}

fn exit_code(status: WaitStatus) -> Option<i32> {
    match status {
        WaitStatus::Exited(_, code) => Some(code),
        WaitStatus::Signaled(_, signal, _) => Some(128 + signal as i32),
        _ => None,
    }
}

/// Failures that abort a whole pipeline in the interpreter process.
#[derive(thiserror::Error, Debug)]
pub enum ExecError {
    #[error("Pipe command failed: {0}")]
    Pipe(#[source] Errno),
    #[error("Forking of the process failed: {0}")]
    Fork(#[source] Errno),
    #[error("Waiting for process {pid} failed: {source}")]
    Wait {
        pid: Pid,
        #[source]
        source: Errno,
    },
}

impl ExecError {
    pub fn errno(&self) -> Errno {
        match self {
            ExecError::Pipe(errno) | ExecError::Fork(errno) => *errno,
            ExecError::Wait { source, .. } => *source,
        }
    }
}

/// Failures inside a stage process, before its program starts.
#[derive(thiserror::Error, Debug)]
enum StageError {
    #[error(transparent)]
    Redirect(#[from] RedirectError),
    #[error("{0} cannot be used in a pipe")]
    Builtin(Builtin),
    #[error("{0}: argument contains a nul byte")]
    Nul(String, #[source] NulError),
    #[error("{0}: command not found")]
    NotFound(String),
    #[error("{name}: {source}")]
    Exec {
        name: String,
        #[source]
        source: Errno,
    },
}

impl StageError {
    fn exec(name: String, source: Errno) -> Self {
        match source {
            Errno::ENOENT => StageError::NotFound(name),
            source => StageError::Exec { name, source },
        }
    }

    fn exit_code(&self) -> i32 {
        match self {
            StageError::Redirect(err) => err.errno(),
            StageError::Builtin(_) => 1,
            StageError::Nul(..) => libc::EINVAL,
            StageError::NotFound(_) => libc::ENOENT,
            StageError::Exec { source, .. } => *source as i32,
        }
    }
}

/// Runs an expression as a chain of processes connected by pipes.
///
/// Stage `i` reads from the pipe created for stage `i - 1` and writes into
/// the pipe created just before it was spawned. Every pipe end is an
/// [`OwnedFd`] moved into exactly one [`Stage`], so whichever way a stage
/// is left, in the interpreter or in the child, the ends it does not keep
/// are closed.
pub struct Pipeline<'a> {
    expression: &'a Expression,
    wait: WaitStrategy,
    jobs: Vec<Job>,
}

impl<'a> Pipeline<'a> {
    pub fn new(expression: &'a Expression, wait: WaitStrategy) -> Self {
        Self {
            expression,
            wait,
            jobs: Vec::with_capacity(expression.commands.len()),
        }
    }

    fn mode(&self) -> JobMode {
        if self.expression.background {
            JobMode::Background
        } else {
            JobMode::Foreground
        }
    }

    /// Spawns every stage and, for a foreground expression, waits on them.
    ///
    /// Stages spawned before a failure are left in [`Pipeline::into_jobs`]
    /// so the caller can collect them later.
    pub fn run(&mut self) -> Result<(), ExecError> {
        let expression = self.expression;
        let last = expression.last_index();
        let mut previous: Option<OwnedFd> = None;

        for (i, command) in expression.commands.iter().enumerate() {
            let pipe = if i < last {
                Some(cloexec_pipe().map_err(ExecError::Pipe)?)
            } else {
                None
            };

            let stage = Stage::new(expression, i, command, previous.take(), pipe);
            previous = self.spawn(stage)?;
        }

        if self.mode() == JobMode::Foreground && self.wait == WaitStrategy::AllStages {
            for job in &mut self.jobs {
                job.wait()?;
            }
        }

        Ok(())
    }

    /// Forks `stage` and returns the read end it leaves for the next stage.
    fn spawn(&mut self, stage: Stage) -> Result<Option<OwnedFd>, ExecError> {
        // SAFETY: the child only rearranges descriptors, execs and exits
        match unsafe { unistd::fork() }.map_err(ExecError::Fork)? {
            ForkResult::Child => stage.exec(),
            ForkResult::Parent { child } => {
                debug!(pid = %child, stage = stage.index, program = %stage.program, "spawned stage");
                let next = stage.release();

                let mode = self.mode();
                self.jobs.push(Job::new(child, mode));
                if mode == JobMode::Foreground && self.wait == WaitStrategy::EachStage {
                    if let Some(job) = self.jobs.last_mut() {
                        job.wait()?;
                    }
                }

                Ok(next)
            }
        }
    }

    pub fn into_jobs(self) -> Vec<Job> {
        self.jobs
    }
}

/// Everything one stage needs, assembled before the fork.
struct Stage {
    index: usize,
    program: String,
    argv: Result<Vec<CString>, NulError>,
    builtin: Option<Builtin>,
    stdin: Option<OwnedFd>,
    pipe: Option<(OwnedFd, OwnedFd)>,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    detach_stdin: bool,
}

impl Stage {
    fn new(
        expression: &Expression,
        index: usize,
        command: &Command,
        stdin: Option<OwnedFd>,
        pipe: Option<(OwnedFd, OwnedFd)>,
    ) -> Self {
        let first = index == 0;
        let last = index == expression.last_index();

        Self {
            index,
            program: command.name().to_string(),
            argv: command.args.iter().map(|arg| CString::new(arg.as_bytes())).collect(),
            builtin: Builtin::lookup(command.name()),
            stdin,
            pipe,
            input: expression.input.clone().filter(|_| first),
            output: expression.output.clone().filter(|_| last),
            detach_stdin: first && expression.background,
        }
    }

    /// Interpreter side after the fork: drops this stage's copies of the
    /// previous read end and the new write end, keeping the new read end.
    fn release(self) -> Option<OwnedFd> {
        self.pipe.map(|(read, _write)| read)
    }

    /// Child side after the fork. Never returns.
    fn exec(self) -> ! {
        let code = match self.replace_image() {
            Ok(never) => match never {},
            Err(err) => {
                let _ = writeln!(io::stderr(), "{err}");
                err.exit_code()
            }
        };

        // SAFETY: skips atexit handlers and stdio buffers inherited from the
        // interpreter, which belong to the parent
        unsafe { libc::_exit(code) }
    }

    fn replace_image(mut self) -> Result<Infallible, StageError> {
        if let Some(read) = self.stdin.take() {
            Redirect::new(Stream::Stdin, read).apply()?;
        }
        if let Some((read, write)) = self.pipe.take() {
            drop(read);
            Redirect::new(Stream::Stdout, write).apply()?;
        }

        if let Some(path) = &self.input {
            Redirect::input(path)?.apply()?;
        } else if self.detach_stdin {
            Redirect::null_input()?.apply()?;
        }
        if let Some(path) = &self.output {
            Redirect::output(path)?.apply()?;
        }

        if let Some(builtin) = self.builtin {
            return Err(StageError::Builtin(builtin));
        }

        // an ignored SIGPIPE would survive exec
        // SAFETY: no handler is installed
        let _ = unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) };

        let argv = self
            .argv
            .map_err(|source| StageError::Nul(self.program.clone(), source))?;
        unistd::execvp(&argv[0], &argv).map_err(|source| StageError::exec(self.program, source))
    }
}
