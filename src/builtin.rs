use crate::command::{CommandFactory, ExecutableCommand, ExitCode, Streams};
use crate::env::Environment;
use crate::interpreter::Factory;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

/// A command that runs inside the session instead of in a child process.
///
/// Arguments are parsed with [`argh`]; a parse failure never reaches `execute`.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    fn name() -> &'static str;

    /// Errors are printed on the command's stderr and turn into status 1.
    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, mut streams: Streams, env: &mut Environment) -> Result<ExitCode> {
        match <T as BuiltinCommand>::execute(*self, &mut streams.stdin, &mut streams.stdout, env) {
            Ok(x) => Ok(x),
            Err(e) => {
                writeln!(streams.stderr, "{:#}", e)?;
                Ok(1)
            }
        }
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, mut streams: Streams, _env: &mut Environment) -> Result<ExitCode> {
        if self.is_error {
            streams.stderr.write_all(self.output.as_bytes())?;
            Ok(2)
        } else {
            streams.stdout.write_all(self.output.as_bytes())?;
            Ok(0)
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name != T::name() {
            return None;
        }
        Some(match T::from_args(&[name], args) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                output,
                is_error: status.is_err(),
            }),
        })
    }
}

#[derive(FromArgs)]
/// Print the session working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the session working directory, to $HOME without a target.
pub struct Cd {
    #[argh(positional)]
    /// target directory, relative to the session directory.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    /// Only the session directory moves; the process working directory is shared
    /// with the embedding program and stays put.
    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let target = match &self.target {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => match env.get_var("HOME") {
                Some(home) => PathBuf::from(home),
                None => return Err(anyhow::anyhow!("cd: no target and HOME not set")),
            },
        };

        let new_dir = env.current_dir.join(target);
        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("cd: can't canonicalize {}", new_dir.display()))?;
        if !canonical.is_dir() {
            return Err(anyhow::anyhow!("cd: {}: not a directory", canonical.display()));
        }

        env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Exit the session.
pub struct Exit {
    #[argh(positional)]
    /// exit status of the session, 0 when omitted.
    pub code: Option<u8>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        env.should_exit = true;
        Ok(self.code.map(ExitCode::from).unwrap_or(0))
    }
}

#[derive(FromArgs)]
/// Print the arguments separated by spaces, followed by a newline.
pub struct Echo {
    #[argh(switch, short = 'n')]
    /// do not output the trailing newline.
    pub no_newline: bool,

    #[argh(positional, greedy)]
    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        stdout.write_all(self.args.join(" ").as_bytes())?;
        if !self.no_newline {
            stdout.write_all(b"\n")?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Count lines, words and bytes.
pub struct Wc {
    #[argh(positional, greedy)]
    /// files to count; standard input when omitted.
    pub files: Vec<String>,
}

fn counts(s: &str) -> (usize, usize, usize) {
    (s.lines().count(), s.split_whitespace().count(), s.len())
}

impl BuiltinCommand for Wc {
    fn name() -> &'static str {
        "wc"
    }

    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if self.files.is_empty() {
            let mut buf = String::new();
            stdin.read_to_string(&mut buf)?;
            let (lines, words, bytes) = counts(&buf);
            writeln!(stdout, "{} {} {}", lines, words, bytes)?;
            return Ok(0);
        }
        for fname in self.files {
            let s = fs::read_to_string(env.current_dir.join(&fname))
                .with_context(|| format!("wc: {}", fname))?;
            let (lines, words, bytes) = counts(&s);
            writeln!(stdout, "{} {} {} {}", lines, words, bytes, fname)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Concatenate files, or standard input, to standard output.
pub struct Cat {
    #[argh(positional, greedy)]
    /// files to print; standard input when omitted.
    pub files: Vec<String>,
}

impl BuiltinCommand for Cat {
    fn name() -> &'static str {
        "cat"
    }

    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if self.files.is_empty() {
            std::io::copy(stdin, stdout)?;
            return Ok(0);
        }
        for fname in self.files {
            let mut f = fs::File::open(env.current_dir.join(&fname))
                .with_context(|| format!("cat: {}", fname))?;
            std::io::copy(&mut f, stdout)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print session variables, all of them as NAME=value when no names are given.
pub struct Printenv {
    #[argh(positional, greedy)]
    /// variables to print.
    pub names: Vec<String>,
}

impl BuiltinCommand for Printenv {
    fn name() -> &'static str {
        "printenv"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if self.names.is_empty() {
            for (k, v) in env.sorted_vars() {
                writeln!(stdout, "{}={}", k, v)?;
            }
            return Ok(0);
        }
        let mut code = 0;
        for name in &self.names {
            match env.get_var(name) {
                Some(value) => writeln!(stdout, "{}", value)?,
                None => code = 1,
            }
        }
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Cursor;

    fn empty_env() -> Environment {
        Environment::new(HashMap::new())
    }

    #[test]
    fn test_pwd_prints_session_dir() {
        let mut env = empty_env();
        env.current_dir = PathBuf::from("/some/where");

        let mut out = Vec::new();
        let res = Pwd {}.execute(&mut Cursor::new(Vec::new()), &mut out, &mut env);

        assert!(res.is_ok());
        assert_eq!(String::from_utf8(out).unwrap(), "/some/where\n");
    }

    #[test]
    fn test_echo_with_and_without_newline() {
        let mut env = empty_env();

        let mut out1 = Vec::new();
        let echo1 = Echo {
            no_newline: false,
            args: vec!["hello".to_string(), "world".to_string()],
        };
        echo1
            .execute(&mut Cursor::new(Vec::new()), &mut out1, &mut env)
            .unwrap();
        assert_eq!(String::from_utf8(out1).unwrap(), "hello world\n");

        let mut out2 = Vec::new();
        let echo2 = Echo {
            no_newline: true,
            args: vec!["foo".to_string(), "bar".to_string()],
        };
        echo2
            .execute(&mut Cursor::new(Vec::new()), &mut out2, &mut env)
            .unwrap();
        assert_eq!(String::from_utf8(out2).unwrap(), "foo bar");
    }

    #[test]
    fn test_cd_moves_session_dir_but_not_process_dir() {
        let temp = tempfile::tempdir().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();
        let process_dir = std::env::current_dir().unwrap();

        let mut env = empty_env();
        let cmd = Cd {
            target: Some(canonical_temp.to_string_lossy().to_string()),
        };
        let res = cmd.execute(&mut Cursor::new(Vec::new()), &mut Vec::new(), &mut env);

        assert!(res.is_ok());
        assert_eq!(env.current_dir, canonical_temp);
        assert_eq!(std::env::current_dir().unwrap(), process_dir);
    }

    #[test]
    fn test_cd_relative_and_home() {
        let temp = tempfile::tempdir().unwrap();
        let canonical_temp = fs::canonicalize(temp.path()).unwrap();
        fs::create_dir(canonical_temp.join("sub")).unwrap();

        let mut env = empty_env();
        env.current_dir = canonical_temp.clone();
        Cd {
            target: Some("sub".to_string()),
        }
        .execute(&mut Cursor::new(Vec::new()), &mut Vec::new(), &mut env)
        .unwrap();
        assert_eq!(env.current_dir, canonical_temp.join("sub"));

        env.set_var("HOME", canonical_temp.to_string_lossy().to_string());
        Cd { target: None }
            .execute(&mut Cursor::new(Vec::new()), &mut Vec::new(), &mut env)
            .unwrap();
        assert_eq!(env.current_dir, canonical_temp);
    }

    #[test]
    fn test_cd_without_home_errors() {
        let mut env = empty_env();
        let res = Cd { target: None }.execute(&mut Cursor::new(Vec::new()), &mut Vec::new(), &mut env);
        assert!(res.is_err());
    }

    #[test]
    fn test_cd_nonexistent_path_errors() {
        let mut env = empty_env();
        let orig = env.current_dir.clone();
        let cmd = Cd {
            target: Some(format!("nonexistent_dir_for_test_{}", std::process::id())),
        };
        let res = cmd.execute(&mut Cursor::new(Vec::new()), &mut Vec::new(), &mut env);

        assert!(res.is_err());
        assert_eq!(env.current_dir, orig);
    }

    #[test]
    fn test_exit_sets_flag_and_code() {
        let mut env = empty_env();
        let code = Exit { code: Some(3) }
            .execute(&mut Cursor::new(Vec::new()), &mut Vec::new(), &mut env)
            .unwrap();
        assert_eq!(code, 3);
        assert!(env.should_exit);
    }

    #[test]
    fn test_cat_reads_file_relative_to_session_dir() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("f.txt"), "hello\nworld\n").unwrap();

        let mut env = empty_env();
        env.current_dir = temp.path().to_path_buf();

        let cat = Cat {
            files: vec!["f.txt".to_string()],
        };
        let mut out = Vec::new();
        cat.execute(&mut Cursor::new(Vec::new()), &mut out, &mut env)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "hello\nworld\n");
    }

    #[test]
    fn test_cat_reads_stdin_when_no_args() {
        let mut env = empty_env();
        let cat = Cat { files: Vec::new() };
        let mut out = Vec::new();
        cat.execute(&mut Cursor::new(b"from stdin\nline2\n".to_vec()), &mut out, &mut env)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "from stdin\nline2\n");
    }

    #[test]
    fn test_cat_missing_file_errors() {
        let temp = tempfile::tempdir().unwrap();
        let mut env = empty_env();
        env.current_dir = temp.path().to_path_buf();
        let cat = Cat {
            files: vec!["missing".to_string()],
        };
        assert!(cat.execute(&mut Cursor::new(Vec::new()), &mut Vec::new(), &mut env).is_err());
    }

    #[test]
    fn test_wc_counts_file() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("w.txt"), "one two\nthree\n").unwrap();

        let mut env = empty_env();
        env.current_dir = temp.path().to_path_buf();

        let wc = Wc {
            files: vec!["w.txt".to_string()],
        };
        let mut out = Vec::new();
        wc.execute(&mut Cursor::new(Vec::new()), &mut out, &mut env)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "2 3 14 w.txt\n");
    }

    #[test]
    fn test_wc_counts_stdin_when_no_args() {
        let mut env = empty_env();
        let wc = Wc { files: Vec::new() };
        let mut out = Vec::new();
        wc.execute(&mut Cursor::new(b"a b c\n".to_vec()), &mut out, &mut env)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1 3 6\n");
    }

    #[test]
    fn test_printenv_help_describes_command() {
        let Err(EarlyExit { output, status }) = Printenv::from_args(&["printenv"], &["--help"]) else {
            panic!("--help must end parsing early");
        };
        assert!(status.is_ok());
        assert!(output.contains("Print session variables, all of them as NAME=value"));
    }

    #[test]
    fn test_printenv_all_and_named() {
        let mut env = empty_env();
        env.set_var("B", "2");
        env.set_var("A", "1");

        let mut out = Vec::new();
        Printenv { names: Vec::new() }
            .execute(&mut Cursor::new(Vec::new()), &mut out, &mut env)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "A=1\nB=2\n");

        let mut out = Vec::new();
        let code = Printenv {
            names: vec!["B".to_string(), "MISSING".to_string()],
        }
        .execute(&mut Cursor::new(Vec::new()), &mut out, &mut env)
        .unwrap();
        assert_eq!(code, 1);
        assert_eq!(String::from_utf8(out).unwrap(), "2\n");
    }
}
