use crate::channel::{InputChannel, OutputChannel};
use crate::command::{CommandFactory, ExitCode, Stdin, Stdout, Streams};
use crate::env::Environment;
use crate::io_adapters::{MemReader, MemWriter};
use crate::lexer::WordPart;
use crate::parser::{Pipeline, SimpleCommand, Word};
use std::io::Write;

/// Status reported when no factory recognizes a command name.
pub const COMMAND_NOT_FOUND: ExitCode = 127;

/// Builds commands of type `T` from argv.
///
/// Used for the builtins and for ExternalCommand.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// Channels used by executed commands: user input, user output and user error.
#[derive(Debug, Clone)]
pub struct UserStreams {
    pub input: InputChannel,
    pub output: OutputChannel,
    pub error: OutputChannel,
}

/// Executes parsed pipelines of built-in and external commands.
///
/// The interpreter maintains an [`Environment`] and a list of [`CommandFactory`] objects
/// that are queried, in order, to create commands by name.
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
    last_status: ExitCode,
}

impl Interpreter {
    pub fn new(env: Environment, commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self {
            env,
            commands,
            last_status: 0,
        }
    }

    /// Interpreter with the builtins `pwd`, `cd`, `echo`, `exit`, `cat`, `wc`,
    /// `printenv`, followed by the external command launcher.
    pub fn with_default_commands(env: Environment) -> Self {
        use crate::builtin::*;
        use crate::external::ExternalCommand;
        Self::new(
            env,
            vec![
                Box::new(Factory::<Pwd>::default()),
                Box::new(Factory::<Cd>::default()),
                Box::new(Factory::<Echo>::default()),
                Box::new(Factory::<Exit>::default()),
                Box::new(Factory::<Cat>::default()),
                Box::new(Factory::<Wc>::default()),
                Box::new(Factory::<Printenv>::default()),
                Box::new(Factory::<ExternalCommand>::default()),
            ],
        )
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn last_status(&self) -> ExitCode {
        self.last_status
    }

    /// Run one pipeline and remember its status for `$?`.
    ///
    /// A single command runs directly in the session environment, so `cd`,
    /// `exit` and assignments stick. Each stage of a longer pipeline runs on a
    /// copy of the environment.
    pub fn execute(&mut self, pipeline: &Pipeline, io: &UserStreams) -> anyhow::Result<ExitCode> {
        let status = match pipeline.commands.as_slice() {
            [single] => self.execute_single(single, io)?,
            stages => self.execute_pipeline(stages, io)?,
        };
        self.last_status = status;
        Ok(status)
    }

    fn execute_single(&mut self, command: &SimpleCommand, io: &UserStreams) -> anyhow::Result<ExitCode> {
        for (name, value) in &command.assignments {
            let value = self.expand(value, &self.env);
            self.env.set_var(name.clone(), value);
        }
        let argv = self.expand_argv(command, &self.env);
        if argv.is_empty() {
            return Ok(0);
        }
        let streams = Streams {
            stdin: Box::new(io.input.clone()),
            stdout: Box::new(io.output.clone()),
            stderr: Box::new(io.error.clone()),
        };
        spawn(&self.commands, &argv, streams, &mut self.env)
    }

    fn execute_pipeline(&mut self, stages: &[SimpleCommand], io: &UserStreams) -> anyhow::Result<ExitCode> {
        let mut previous_output: Option<Vec<u8>> = None;
        let mut last_exit: ExitCode = 0;

        for (i, command) in stages.iter().enumerate() {
            let is_last = i + 1 == stages.len();

            let mut local_env = self.env.clone();
            for (name, value) in &command.assignments {
                let value = self.expand(value, &local_env);
                local_env.set_var(name.clone(), value);
            }
            let argv = self.expand_argv(command, &local_env);

            let stdin: Box<dyn Stdin> = match previous_output.take() {
                Some(buf) => Box::new(MemReader::new(buf)),
                None => Box::new(io.input.clone()),
            };
            let (stdout, captured) = if is_last {
                (Box::new(io.output.clone()) as Box<dyn Stdout>, None)
            } else {
                let (writer, handle) = MemWriter::with_handle();
                (Box::new(writer) as Box<dyn Stdout>, Some(handle))
            };
            let streams = Streams {
                stdin,
                stdout,
                stderr: Box::new(io.error.clone()),
            };

            last_exit = if argv.is_empty() {
                0
            } else {
                spawn(&self.commands, &argv, streams, &mut local_env)?
            };
            previous_output = captured.map(|handle| handle.take());
        }

        Ok(last_exit)
    }

    /// Expand every word. A word made only of substitutions that expands to
    /// nothing is dropped, so `$UNSET echo hi` runs `echo`.
    fn expand_argv(&self, command: &SimpleCommand, env: &Environment) -> Vec<String> {
        command
            .argv
            .iter()
            .filter_map(|word| {
                let value = self.expand(word, env);
                let only_substitutions = !word.is_empty()
                    && word.iter().all(|part| matches!(part, WordPart::ParamSubst(_)));
                (!(value.is_empty() && only_substitutions)).then_some(value)
            })
            .collect()
    }

    /// Concatenate word parts, substituting variables from `env`.
    ///
    /// Unknown variables expand to the empty string; `$?` is the last status.
    fn expand(&self, word: &Word, env: &Environment) -> String {
        let mut result = String::new();
        for part in word {
            match part {
                WordPart::Literal(text) => result.push_str(text),
                WordPart::ParamSubst(name) if name == "?" => {
                    result.push_str(&self.last_status.to_string())
                }
                WordPart::ParamSubst(name) => {
                    if let Some(value) = env.get_var(name) {
                        result.push_str(&value);
                    }
                }
            }
        }
        result
    }
}

/// Create the command through the first factory that knows `argv[0]` and run it.
fn spawn(
    commands: &[Box<dyn CommandFactory>],
    argv: &[String],
    mut streams: Streams,
    env: &mut Environment,
) -> anyhow::Result<ExitCode> {
    let name = argv[0].as_str();
    let args: Vec<&str> = argv[1..].iter().map(String::as_str).collect();
    for factory in commands {
        if let Some(cmd) = factory.try_create(env, name, &args) {
            return cmd.execute(streams, env);
        }
    }
    writeln!(streams.stderr, "{}: command not found", name)?;
    Ok(COMMAND_NOT_FOUND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::SharedBuffer;
    use crate::lexer::split_into_tokens;
    use crate::parser::construct_pipeline;
    use std::collections::HashMap;

    struct Harness {
        interp: Interpreter,
        io: UserStreams,
        out: SharedBuffer,
        err: SharedBuffer,
    }

    impl Harness {
        fn new(vars: &[(&str, &str)], input: &str) -> Self {
            let vars: HashMap<String, String> = vars
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            let (output, out) = OutputChannel::buffer();
            let (error, err) = OutputChannel::buffer();
            Self {
                interp: Interpreter::with_default_commands(Environment::new(vars)),
                io: UserStreams {
                    input: InputChannel::from_bytes(input),
                    output,
                    error,
                },
                out,
                err,
            }
        }

        fn run(&mut self, line: &str) -> ExitCode {
            let tokens = split_into_tokens(line).unwrap();
            let pipeline = construct_pipeline(tokens).unwrap().unwrap();
            self.interp.execute(&pipeline, &self.io).unwrap()
        }
    }

    #[test]
    fn test_echo_pipe_wc_output() {
        let mut h = Harness::new(&[], "");
        assert_eq!(h.run("echo \"22\" | wc"), 0);
        assert_eq!(h.out.to_string_lossy(), "1 1 3\n");
    }

    #[test]
    fn test_expansion_uses_session_vars_only() {
        let mut h = Harness::new(&[("GREETING", "hi")], "");
        h.run("echo $GREETING ${PATH}x");
        assert_eq!(h.out.to_string_lossy(), "hi x\n");
    }

    #[test]
    fn test_assignment_persists_for_single_command() {
        let mut h = Harness::new(&[], "");
        h.run("A=1");
        h.run("echo $A");
        assert_eq!(h.out.to_string_lossy(), "1\n");
        assert_eq!(h.interp.env().get_var("A"), Some("1".to_string()));
    }

    #[test]
    fn test_pipeline_stages_do_not_leak_env() {
        let mut h = Harness::new(&[], "");
        h.run("B=2 echo x | cat");
        assert_eq!(h.interp.env().get_var("B"), None);
        assert_eq!(h.out.to_string_lossy(), "x\n");
    }

    #[test]
    fn test_last_status_expansion() {
        let mut h = Harness::new(&[], "");
        assert_eq!(h.run("no-such-command-here"), COMMAND_NOT_FOUND);
        h.run("echo $?");
        assert_eq!(h.out.to_string_lossy(), "127\n");
        assert_eq!(h.err.to_string_lossy(), "no-such-command-here: command not found\n");
    }

    #[test]
    fn test_empty_expansions_are_dropped() {
        let mut h = Harness::new(&[("EMPTY", "")], "");
        assert_eq!(h.run("$UNSET echo a $EMPTY b \"\" c"), 0);
        assert_eq!(h.out.to_string_lossy(), "a b  c\n");
        assert_eq!(h.run("$UNSET ${EMPTY}"), 0);
        assert!(h.err.to_string_lossy().is_empty());
    }

    #[test]
    fn test_cat_reads_user_input() {
        let mut h = Harness::new(&[], "typed by the user\n");
        h.run("cat");
        assert_eq!(h.out.to_string_lossy(), "typed by the user\n");
    }

    #[test]
    fn test_builtin_errors_go_to_user_error() {
        let mut h = Harness::new(&[], "");
        assert_eq!(h.run("cd"), 1);
        assert!(h.err.to_string_lossy().contains("HOME not set"));
        assert!(h.out.to_string_lossy().is_empty());
    }

    #[test]
    fn test_exit_marks_environment() {
        let mut h = Harness::new(&[], "");
        assert_eq!(h.run("exit 4"), 4);
        assert!(h.interp.env().should_exit);
    }

    #[test]
    #[cfg(unix)]
    fn test_external_command_sees_exact_environment() {
        let mut h = Harness::new(&[("PATH", "/usr/bin:/bin"), ("ONLY_THIS", "yes")], "");
        assert_eq!(h.run("env"), 0);
        let out = h.out.to_string_lossy();
        let mut lines: Vec<&str> = out.lines().collect();
        lines.sort_unstable();
        assert_eq!(lines, vec!["ONLY_THIS=yes", "PATH=/usr/bin:/bin"]);
    }

    #[test]
    #[cfg(unix)]
    fn test_external_command_in_pipeline() {
        let mut h = Harness::new(&[("PATH", "/usr/bin:/bin")], "");
        assert_eq!(h.run("echo hello | tr a-z A-Z"), 0);
        assert_eq!(h.out.to_string_lossy(), "HELLO\n");
    }

    #[test]
    #[cfg(unix)]
    fn test_external_stderr_is_captured() {
        let mut h = Harness::new(&[("PATH", "/usr/bin:/bin")], "");
        assert_eq!(h.run("sh -c 'echo oops >&2; exit 3'"), 3);
        assert_eq!(h.err.to_string_lossy(), "oops\n");
    }
}
