use crate::command::{CommandFactory, ExecutableCommand, ExitCode, Streams};
use crate::env::Environment;
use crate::interpreter::Factory;
use anyhow::{Context, Result};
use std::ffi::{OsStr, OsString};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

/// Command that is not a builtin.
pub struct ExternalCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ExternalCommand {
    pub fn new(program: PathBuf, args: Vec<OsString>) -> Self {
        Self { program, args }
    }
}

impl CommandFactory for Factory<ExternalCommand> {
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        let search_paths = env.get_var("PATH").unwrap_or_default();
        let executable = find_command_path(
            OsStr::new(&search_paths),
            &env.current_dir,
            Path::new(name),
        )?;
        Some(Box::new(ExternalCommand::new(
            executable,
            args.iter().map(OsString::from).collect(),
        )))
    }
}

impl ExecutableCommand for ExternalCommand {
    /// Spawns the program with exactly the session variables.
    ///
    /// Streams that map onto process descriptors are handed over directly,
    /// anything else is piped and copied.
    fn execute(self: Box<Self>, mut streams: Streams, env: &mut Environment) -> Result<ExitCode> {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.args)
            .env_clear()
            .envs(env.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&env.current_dir);

        let feed = match streams.stdin.stdio() {
            Some(stdio) => {
                cmd.stdin(stdio);
                None
            }
            None => {
                let mut buf = Vec::new();
                streams.stdin.read_to_end(&mut buf)?;
                cmd.stdin(Stdio::piped());
                Some(buf)
            }
        };
        let capture_out = match streams.stdout.stdio() {
            Some(stdio) => {
                streams.stdout.flush()?;
                cmd.stdout(stdio);
                false
            }
            None => {
                cmd.stdout(Stdio::piped());
                true
            }
        };
        let capture_err = match streams.stderr.stdio() {
            Some(stdio) => {
                streams.stderr.flush()?;
                cmd.stderr(stdio);
                false
            }
            None => {
                cmd.stderr(Stdio::piped());
                true
            }
        };

        log::debug!("Spawning {}", self.program.display());
        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.program.display()))?;

        // Fed from a separate thread so a chatty child can't block on a full stdout pipe.
        let feeder = match (feed, child.stdin.take()) {
            (Some(buf), Some(mut sink)) => Some(std::thread::spawn(move || sink.write_all(&buf))),
            _ => None,
        };

        let output = child.wait_with_output()?;
        if let Some(feeder) = feeder {
            if let Ok(Err(e)) = feeder.join() {
                log::debug!("Child closed its stdin early: {}", e);
            }
        }
        if capture_out {
            streams.stdout.write_all(&output.stdout)?;
        }
        if capture_err {
            streams.stderr.write_all(&output.stderr)?;
        }

        match output.status.code() {
            Some(x) => Ok(x),
            None => Ok(terminated_by_signal(output.status)),
        }
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returns it if it exists.
/// - Relative with multiple components (e.g., `bin/sh`) or `./foo`: resolved
///   against `cwd`, returned if it exists.
/// - Single path component (no separators): search each directory in `search_paths` (PATH)
///   and return the first existing match.
/// - Empty path: returns `None`.
pub fn find_command_path(search_paths: &OsStr, cwd: &Path, path: &Path) -> Option<PathBuf> {
    if path.is_absolute() {
        return find_by_path(path.to_path_buf());
    }

    let mut components = path.components();
    match (components.next(), components.next()) {
        (None, _) => None,
        (Some(std::path::Component::Normal(name)), None) => find_in_path(search_paths, name),
        _ => find_by_path(cwd.join(path)),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .filter(|dir| !dir.as_os_str().is_empty())
        .find_map(|dir| find_by_path(dir.join(cmd)))
}

fn find_by_path(path: PathBuf) -> Option<PathBuf> {
    if path.is_file() { Some(path) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::fs::File;

    fn osstr(s: &str) -> &OsStr {
        OsStr::new(s)
    }

    #[test]
    #[cfg(unix)]
    fn absolute_existing_true() {
        let path = Path::new("/bin/sh");
        let found = find_command_path(osstr("/bin"), Path::new("/"), path);
        assert_eq!(found.as_deref(), Some(path));
    }

    #[test]
    #[cfg(unix)]
    fn absolute_nonexisting() {
        let res = find_command_path(osstr("/bin"), Path::new("/"), Path::new("/bin/nonexisting"));
        assert!(res.is_none());
    }

    #[test]
    #[cfg(unix)]
    fn single_component_found_in_path() {
        let found = find_command_path(osstr("/bin"), Path::new("/"), Path::new("sh"))
            .expect("Expected to find 'sh' in /bin via PATH search");
        assert_eq!(found, Path::new("/bin/sh"));
    }

    #[test]
    fn single_component_not_found_in_path() {
        let dir = tempfile::tempdir().unwrap();
        let search = dir.path().as_os_str().to_owned();
        let res = find_command_path(&search, dir.path(), Path::new("nonexisting"));
        assert!(res.is_none());
    }

    #[test]
    fn single_component_with_empty_path_is_none() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("tool")).unwrap();
        // An empty PATH must not fall back to the working directory.
        assert!(find_command_path(osstr(""), dir.path(), Path::new("tool")).is_none());
    }

    #[test]
    fn multiple_components_resolved_against_cwd() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("bin")).unwrap();
        File::create(dir.path().join("bin").join("sh")).unwrap();

        let found = find_command_path(osstr("/does/not/matter"), dir.path(), Path::new("bin/sh"))
            .expect("Expected to find relative 'bin/sh' in the session dir");
        assert_eq!(found, dir.path().join("bin/sh"));
    }

    #[test]
    fn current_dir_with_dot_prefix() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("foo")).unwrap();

        let found = find_command_path(osstr("/bin"), dir.path(), Path::new("./foo"))
            .expect("Expected to find './foo' in the session dir");
        assert_eq!(found, dir.path().join("./foo"));
    }

    #[test]
    fn directories_are_not_commands() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let search = dir.path().as_os_str().to_owned();
        assert!(find_command_path(&search, dir.path(), Path::new("sub")).is_none());
    }

    #[test]
    fn empty_path_is_none() {
        assert!(find_command_path(osstr("/bin"), Path::new("/"), Path::new("")).is_none());
    }
}
