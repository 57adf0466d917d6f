use crate::parser::Command;
use crate::session::Session;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

const HOME_SHORTHAND: &str = "~";

/// Commands that only make sense inside the interpreter's own process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Cd,
    Exit,
}

/// What the read loop should do after a line has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Exit,
}

#[derive(thiserror::Error, Debug)]
pub enum BuiltinError {
    #[error("cd: HOME not set")]
    HomeNotSet,
    #[error("cd: {}: {source}", .path.display())]
    ChangeDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Builtin {
    pub fn lookup(name: &str) -> Option<Self> {
        match name {
            "cd" => Some(Builtin::Cd),
            "exit" => Some(Builtin::Exit),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Cd => "cd",
            Builtin::Exit => "exit",
        }
    }

    pub fn run(self, cmd: &Command, session: &mut Session) -> Result<Control, BuiltinError> {
        debug!(builtin = self.name(), args = ?cmd.arguments(), "running builtin");

        match self {
            Builtin::Exit => Ok(Control::Exit),
            Builtin::Cd => {
                cd(cmd.arguments(), session)?;
                Ok(Control::Continue)
            }
        }
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn cd(args: &[String], session: &mut Session) -> Result<(), BuiltinError> {
    let path = match args.first() {
        Some(arg) if arg != HOME_SHORTHAND => PathBuf::from(arg),
        _ => session.home().map(Path::to_path_buf).ok_or(BuiltinError::HomeNotSet)?,
    };

    session
        .change_dir(&path)
        .map_err(|source| BuiltinError::ChangeDir { path, source })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::env;
    use std::sync::{Mutex, MutexGuard};
    use tempfile::TempDir;

    static CWD: Mutex<()> = Mutex::new(());

    /// Serializes tests that move the process working directory and puts it
    /// back afterwards.
    ///
    /// The scratch directory is a field, so it is removed only after `drop`
    /// has moved the process out of it.
    pub(crate) struct CwdGuard {
        original: PathBuf,
        scratch: TempDir,
        _lock: MutexGuard<'static, ()>,
    }

    impl CwdGuard {
        pub(crate) fn acquire() -> Self {
            let lock = CWD.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            Self {
                original: env::current_dir().unwrap(),
                scratch: tempfile::tempdir().unwrap(),
                _lock: lock,
            }
        }

        /// A directory that lives as long as the guard.
        pub(crate) fn scratch(&self) -> &Path {
            self.scratch.path()
        }
    }

    impl Drop for CwdGuard {
        fn drop(&mut self) {
            env::set_current_dir(&self.original).unwrap();
        }
    }

    fn command(line: &str) -> Command {
        Command::new(line.split(' ').map(String::from).collect())
    }

    fn canonical(path: &Path) -> PathBuf {
        path.canonicalize().unwrap()
    }

    #[rstest]
    #[case("cd", Some(Builtin::Cd))]
    #[case("exit", Some(Builtin::Exit))]
    #[case("ls", None)]
    #[case("CD", None)]
    fn lookup(#[case] name: &str, #[case] expected: Option<Builtin>) {
        assert_eq!(Builtin::lookup(name), expected);
    }

    #[test]
    fn exit_stops_the_loop() {
        let mut session = Session::new(PathBuf::from("/"), None);
        let control = Builtin::Exit.run(&command("exit"), &mut session).unwrap();
        assert_eq!(control, Control::Exit);
    }

    #[rstest]
    #[case("cd")]
    #[case("cd ~")]
    fn cd_goes_home(#[case] line: &str) {
        let guard = CwdGuard::acquire();
        let home = guard.scratch();
        let mut session = Session::new(env::current_dir().unwrap(), Some(home.to_path_buf()));

        let control = Builtin::Cd.run(&command(line), &mut session).unwrap();

        assert_eq!(control, Control::Continue);
        assert_eq!(canonical(session.cwd()), canonical(home));
        assert_eq!(canonical(&env::current_dir().unwrap()), canonical(home));
    }

    #[test]
    fn guard_leaves_scratch_before_removing_it() {
        let guard = CwdGuard::acquire();
        let start = env::current_dir().unwrap();
        let scratch = guard.scratch().to_path_buf();
        env::set_current_dir(&scratch).unwrap();

        drop(guard);

        assert_eq!(env::current_dir().unwrap(), start);
        assert!(!scratch.exists());
    }

    #[test]
    fn cd_without_home_keeps_directory() {
        let _guard = CwdGuard::acquire();
        let start = env::current_dir().unwrap();
        let mut session = Session::new(start.clone(), None);

        let err = Builtin::Cd.run(&command("cd"), &mut session).unwrap_err();

        assert!(matches!(err, BuiltinError::HomeNotSet));
        assert_eq!(err.to_string(), "cd: HOME not set");
        assert_eq!(session.cwd(), start);
        assert_eq!(env::current_dir().unwrap(), start);
    }

    #[test]
    fn cd_relative_to_session() {
        let guard = CwdGuard::acquire();
        let root = canonical(guard.scratch());
        std::fs::create_dir(root.join("inner")).unwrap();
        let mut session = Session::new(root.clone(), None);

        Builtin::Cd.run(&command("cd inner"), &mut session).unwrap();
        assert_eq!(session.cwd(), root.join("inner"));

        Builtin::Cd.run(&command("cd .."), &mut session).unwrap();
        assert_eq!(session.cwd(), root);
    }

    #[test]
    fn cd_to_missing_directory_reports() {
        let guard = CwdGuard::acquire();
        let start = canonical(guard.scratch());
        let mut session = Session::new(start.clone(), None);

        let err = Builtin::Cd
            .run(&command("cd does-not-exist"), &mut session)
            .unwrap_err();

        assert!(err.to_string().starts_with("cd: does-not-exist: "), "{err}");
        assert_eq!(session.cwd(), start);
    }
}
