use crate::env::Environment;
use anyhow::Result;
use std::io::{Read, Write};
use std::process::Stdio;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Readable input stream handed to a command.
///
/// Besides reading in-process, an input may know how to hand itself to a spawned
/// program. `None` means the program has to be fed through a pipe from this reader.
pub trait Stdin: Read {
    fn stdio(&self) -> Option<Stdio>;
}

/// Writable output stream handed to a command.
///
/// `None` from [`Stdout::stdio`] means the output of a spawned program has to be
/// captured and copied into this writer.
pub trait Stdout: Write {
    fn stdio(&self) -> Option<Stdio>;
}

/// The three standard streams of one command invocation.
pub struct Streams {
    pub stdin: Box<dyn Stdin>,
    pub stdout: Box<dyn Stdout>,
    pub stderr: Box<dyn Stdout>,
}

/// Object-safe trait for any command that can be executed by the shell.
///
/// This is implemented by built-ins via a blanket impl and by external commands.
pub trait ExecutableCommand {
    fn execute(self: Box<Self>, streams: Streams, env: &mut Environment) -> Result<ExitCode>;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`.
/// Implementations can use the environment to resolve executables (e.g., using PATH).
pub trait CommandFactory {
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>>;
}
