use nix::errno::Errno;
use nix::fcntl::{self, FcntlArg, FdFlag};
use nix::libc;
use nix::unistd;
use std::fmt;
use std::fs;
use std::io;
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

const OUTPUT_MODE: u32 = 0o600;
const NULL_DEVICE: &str = "/dev/null";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdin,
    Stdout,
}

impl Stream {
    fn fd(self) -> RawFd {
        match self {
            Stream::Stdin => libc::STDIN_FILENO,
            Stream::Stdout => libc::STDOUT_FILENO,
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Stdin => f.write_str("Input"),
            Stream::Stdout => f.write_str("Output"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RedirectError {
    #[error("{stream} file did not open correctly: {}: {source}", .path.display())]
    Open {
        stream: Stream,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{stream} descriptor did not copy correctly: {source}")]
    Duplicate {
        stream: Stream,
        #[source]
        source: Errno,
    },
}

impl RedirectError {
    /// The OS error number behind the failure.
    pub fn errno(&self) -> i32 {
        match self {
            RedirectError::Open { source, .. } => source.raw_os_error().unwrap_or(libc::EIO),
            RedirectError::Duplicate { source, .. } => *source as i32,
        }
    }
}

/// An open descriptor waiting to replace one of the standard streams.
///
/// Applying it duplicates the descriptor onto the stream and closes the
/// original, so once every redirect of a stage is applied the stage holds
/// nothing but its three standard streams.
#[derive(Debug)]
pub struct Redirect {
    stream: Stream,
    source: OwnedFd,
}

impl Redirect {
    pub fn new(stream: Stream, source: OwnedFd) -> Self {
        Self { stream, source }
    }

    /// Opens `path` read-only for standard input.
    pub fn input(path: &Path) -> Result<Self, RedirectError> {
        let file = fs::File::open(path).map_err(|source| RedirectError::Open {
            stream: Stream::Stdin,
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self::new(Stream::Stdin, file.into()))
    }

    /// Opens `path` for standard output, creating it with owner read/write
    /// permission or truncating it if it exists.
    pub fn output(path: &Path) -> Result<Self, RedirectError> {
        let file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(OUTPUT_MODE)
            .open(path)
            .map_err(|source| RedirectError::Open {
                stream: Stream::Stdout,
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self::new(Stream::Stdout, file.into()))
    }

    pub fn null_input() -> Result<Self, RedirectError> {
        Self::input(Path::new(NULL_DEVICE))
    }

    #[cfg(test)]
    fn stream(&self) -> Stream {
        self.stream
    }

    pub fn apply(self) -> Result<(), RedirectError> {
        let target = self.stream.fd();
        if self.source.as_raw_fd() == target {
            // already in place: keep it open and let it survive exec
            let fd = self.source.into_raw_fd();
            fcntl::fcntl(fd, FcntlArg::F_SETFD(FdFlag::empty())).map_err(|source| {
                RedirectError::Duplicate {
                    stream: self.stream,
                    source,
                }
            })?;
            return Ok(());
        }

        unistd::dup2(self.source.as_raw_fd(), target).map_err(|source| {
            RedirectError::Duplicate {
                stream: self.stream,
                source,
            }
        })?;

        Ok(())
    }
}
