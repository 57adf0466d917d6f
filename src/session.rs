use std::env;
use std::io;
use std::path::{Path, PathBuf};

const HOME_VAR: &str = "HOME";

/// State the interpreter carries from one line to the next.
///
/// The working directory is mirrored into the process so spawned stages
/// inherit it, but relative paths are resolved against the session first.
#[derive(Debug, Clone)]
pub struct Session {
    cwd: PathBuf,
    home: Option<PathBuf>,
}

impl Session {
    pub fn new(cwd: PathBuf, home: Option<PathBuf>) -> Self {
        Self { cwd, home }
    }

    pub fn from_env() -> io::Result<Self> {
        Ok(Self::new(
            env::current_dir()?,
            env::var_os(HOME_VAR).map(PathBuf::from),
        ))
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn home(&self) -> Option<&Path> {
        self.home.as_deref()
    }

    pub fn change_dir(&mut self, path: &Path) -> io::Result<()> {
        let target = self.cwd.join(path);
        env::set_current_dir(&target)?;
        self.cwd = env::current_dir()?;

        Ok(())
    }
}
