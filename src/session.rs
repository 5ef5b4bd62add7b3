//! One interactive session: reading entries, tool commands, history and prompts.

use crate::channel::{InputChannel, OutputChannel};
use crate::command::ExitCode;
use crate::config::SessionConfig;
use crate::env::Environment;
use crate::error::LaunchError;
use crate::interpreter::{Interpreter, UserStreams};
use crate::lexer::{self, LexingError, Token, WordPart};
use crate::locale::Messages;
use crate::parser::{self, ParsingError};
use crate::persistence::{RetainedPrompt, SessionStore};
use argh::{EarlyExit, FromArgs};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, IsTerminal, Write};

/// Basic prompt in capture mode: ENQ.
pub const CAPTURE_PROMPT: &str = "\u{5}";
/// Continuation prompt in capture mode: ACK.
pub const CAPTURE_CONTINUATION_PROMPT: &str = "\u{6}";

const DEFAULT_PROMPT: &str = "$ ";
const DEFAULT_CONTINUATION_PROMPT: &str = "> ";

/// Where entries come from.
pub(crate) trait LineSource {
    /// Next line without its terminator, `None` at end of input.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>, LaunchError>;

    fn add_history(&mut self, _entry: &str) -> Result<(), LaunchError> {
        Ok(())
    }
}

/// Prompts on the console channel, lines from the command input channel.
pub(crate) struct StreamSource {
    input: InputChannel,
    console: OutputChannel,
}

impl LineSource for StreamSource {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>, LaunchError> {
        self.console.write_all(prompt.as_bytes())?;
        self.console.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }
}

/// Line editor on the controlling terminal.
pub(crate) struct EditorSource {
    editor: DefaultEditor,
}

impl LineSource for EditorSource {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>, LaunchError> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Some(line)),
            // Ctrl-C drops the line being typed, the session goes on.
            Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(ReadlineError::Eof) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn add_history(&mut self, entry: &str) -> Result<(), LaunchError> {
        self.editor.add_history_entry(entry)?;
        Ok(())
    }
}

/// Lines of a script or of a `-c` command; prompts are not shown.
pub(crate) struct ScriptSource {
    lines: std::vec::IntoIter<String>,
}

impl ScriptSource {
    pub(crate) fn new(text: &str) -> Self {
        let lines: Vec<String> = text.lines().map(String::from).collect();
        Self {
            lines: lines.into_iter(),
        }
    }
}

impl LineSource for ScriptSource {
    fn read_line(&mut self, _prompt: &str) -> Result<Option<String>, LaunchError> {
        Ok(self.lines.next())
    }
}

/// Pick the interactive source for a session.
///
/// The terminal editor is only used when the session talks to the real
/// terminal and prompts are meant for humans.
pub(crate) fn interactive_source(
    config: &SessionConfig,
    history: &[String],
) -> Result<Box<dyn LineSource>, LaunchError> {
    let on_terminal = config.command_input.is_process_stdin()
        && config.console_output.is_process_stdout()
        && !config.prompt_capture
        && io::stdin().is_terminal()
        && io::stdout().is_terminal();

    if on_terminal {
        let mut editor = DefaultEditor::new()?;
        for entry in history {
            editor.add_history_entry(entry.as_str())?;
        }
        log::debug!("Reading entries through the terminal editor");
        Ok(Box::new(EditorSource { editor }))
    } else {
        Ok(Box::new(StreamSource {
            input: config.command_input.clone(),
            console: config.console_output.clone(),
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Prompts {
    primary: String,
    continuation: String,
    capture: bool,
}

impl Prompts {
    fn primary(&self) -> &str {
        if self.capture { CAPTURE_PROMPT } else { &self.primary }
    }

    fn continuation(&self) -> &str {
        if self.capture {
            CAPTURE_CONTINUATION_PROMPT
        } else {
            &self.continuation
        }
    }
}

#[derive(FromArgs)]
/// Takes no arguments.
struct NoArgs {}

#[derive(FromArgs)]
/// Change session settings.
struct SetCommand {
    #[argh(subcommand)]
    target: SetTarget,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum SetTarget {
    Prompt(SetPrompt),
}

#[derive(FromArgs)]
#[argh(subcommand, name = "prompt")]
/// Set the prompt and the continuation prompt.
struct SetPrompt {
    #[argh(positional)]
    /// prompt shown before each entry.
    primary: String,

    #[argh(positional)]
    /// prompt shown for continuation lines; unchanged when omitted.
    continuation: Option<String>,

    #[argh(switch, short = 'r')]
    /// keep the prompts for later sessions.
    retain: bool,
}

#[derive(FromArgs)]
/// End the session.
struct ExitCommand {
    #[argh(positional)]
    /// exit status of the session, 0 when omitted.
    status: Option<u8>,
}

/// State of one running session.
pub(crate) struct Session<'a> {
    config: &'a SessionConfig,
    messages: &'static Messages,
    store: SessionStore,
    interpreter: Interpreter,
    io: UserStreams,
    history: Vec<String>,
    prompts: Prompts,
    feedback: bool,
    exit_status: Option<ExitCode>,
    status: ExitCode,
}

impl<'a> Session<'a> {
    /// Open the store and restore history and retained prompts.
    ///
    /// With `feedback` off, welcome and goodbye are not shown.
    pub(crate) fn open(config: &'a SessionConfig, feedback: bool) -> Result<Self, LaunchError> {
        let store = config.persistence.open(&config.env)?;
        let history = store.load_history()?;
        let retained = store.load_prompt()?;
        let prompts = Prompts {
            primary: retained
                .as_ref()
                .map_or(DEFAULT_PROMPT, |p| p.primary.as_str())
                .to_string(),
            continuation: retained
                .as_ref()
                .map_or(DEFAULT_CONTINUATION_PROMPT, |p| p.continuation.as_str())
                .to_string(),
            capture: config.prompt_capture,
        };
        log::debug!(
            "Session opened: {} history entries, locale {}, prompt capture {}",
            history.len(),
            config.locale,
            config.prompt_capture
        );

        Ok(Self {
            config,
            messages: config.locale.messages(),
            store,
            interpreter: Interpreter::with_default_commands(Environment::new(config.env.clone())),
            io: config.user_streams(),
            history,
            prompts,
            feedback,
            exit_status: None,
            status: 0,
        })
    }

    pub(crate) fn history(&self) -> &[String] {
        &self.history
    }

    pub(crate) fn finished(&self) -> bool {
        self.exit_status.is_some() || self.interpreter.env().should_exit
    }

    pub(crate) fn welcome(&self) -> Result<(), LaunchError> {
        if self.feedback {
            let text = Messages::format(self.messages.welcome, env!("CARGO_PKG_VERSION"));
            self.write_feedback(&text)?;
        }
        Ok(())
    }

    /// Report a problem on the command error channel.
    pub(crate) fn report_error(&mut self, text: &str, status: ExitCode) -> Result<(), LaunchError> {
        let mut err = self.config.command_error.clone();
        err.write_all(text.as_bytes())?;
        err.flush()?;
        self.status = status;
        Ok(())
    }

    /// Evaluate entries until the source is exhausted or the session is asked to exit.
    ///
    /// With `record` set, entries go to the history.
    pub(crate) fn run_source(&mut self, source: &mut dyn LineSource, record: bool) -> Result<(), LaunchError> {
        while !self.finished() {
            let Some(entry) = self.read_entry(source)? else {
                break;
            };
            log::trace!("Entry: {:?}", entry);
            if record {
                self.record(&entry, source)?;
            }
            self.eval(&entry)?;
            self.flush_outputs()?;
        }
        Ok(())
    }

    /// Save history, flush the store and every output channel.
    ///
    /// Returns the `/exit` status if there was one, else the status of the last entry.
    pub(crate) fn close(self) -> Result<ExitCode, LaunchError> {
        if self.feedback {
            self.write_feedback(self.messages.goodbye)?;
        }
        self.save()?;
        let status = self.exit_status.unwrap_or(self.status);
        log::debug!("Session closed with status {}", status);
        Ok(status)
    }

    /// End a session that failed: keep what can be kept, then hand back `error`.
    pub(crate) fn abort(self, error: LaunchError) -> LaunchError {
        log::debug!("Session aborted: {}", error);
        if let Err(e) = self.save() {
            log::warn!("Could not save session state after failure: {}", e);
        }
        error
    }

    fn save(&self) -> Result<(), LaunchError> {
        self.store.save_history(&self.history)?;
        self.store.flush()?;
        self.flush_outputs()?;
        self.config.command_error.clone().flush()?;
        Ok(())
    }

    /// Read one complete entry, asking for continuation lines while it is incomplete.
    fn read_entry(&mut self, source: &mut dyn LineSource) -> Result<Option<String>, LaunchError> {
        let Some(mut entry) = source.read_line(self.prompts.primary())? else {
            return Ok(None);
        };
        loop {
            let incomplete = match lexer::split_into_tokens(&entry) {
                Err(e) => e,
                Ok(_) => return Ok(Some(entry)),
            };
            let Some(more) = source.read_line(self.prompts.continuation())? else {
                // The evaluator reports what is missing.
                return Ok(Some(entry));
            };
            if incomplete == LexingError::TrailingEscape {
                entry.pop();
            } else {
                entry.push('\n');
            }
            entry.push_str(&more);
        }
    }

    fn record(&mut self, entry: &str, source: &mut dyn LineSource) -> Result<(), LaunchError> {
        if entry.trim().is_empty() || self.history.last().map(String::as_str) == Some(entry) {
            return Ok(());
        }
        self.history.push(entry.to_string());
        source.add_history(entry)
    }

    fn eval(&mut self, entry: &str) -> Result<(), LaunchError> {
        let tokens = match lexer::split_into_tokens(entry) {
            Ok(tokens) => tokens,
            Err(e) => {
                let what = match e {
                    LexingError::UnfinishedQuote => "missing closing quote",
                    LexingError::UnfinishedParamSubst => "missing '}'",
                    LexingError::TrailingEscape => "trailing '\\'",
                };
                self.write_feedback(&Messages::format(self.messages.incomplete_input, what))?;
                self.status = 2;
                return Ok(());
            }
        };

        if let Some(name) = tool_command_name(&tokens) {
            let args: Vec<String> = tokens[1..].iter().filter_map(token_text).collect();
            self.status = self.tool_command(&name, &args)?;
            return Ok(());
        }

        let pipeline = match parser::construct_pipeline(tokens) {
            Ok(Some(pipeline)) => pipeline,
            Ok(None) => return Ok(()),
            Err(ParsingError::EmptyPipelineStage) => {
                self.write_feedback(self.messages.empty_pipeline_stage)?;
                self.status = 2;
                return Ok(());
            }
        };

        self.status = match self.interpreter.execute(&pipeline, &self.io) {
            Ok(status) => status,
            Err(e) => {
                self.write_feedback(&Messages::format(self.messages.execution_failed, format!("{:#}", e)))?;
                1
            }
        };
        Ok(())
    }

    fn tool_command(&mut self, name: &str, args: &[String]) -> Result<ExitCode, LaunchError> {
        match name {
            "/help" => {
                if self.parse_args::<NoArgs>(name, args)?.is_none() {
                    return Ok(2);
                }
                self.write_feedback(self.messages.help)?;
            }
            "/history" => {
                if self.parse_args::<NoArgs>(name, args)?.is_none() {
                    return Ok(2);
                }
                if self.history.is_empty() {
                    self.write_feedback(self.messages.history_empty)?;
                }
                let listing: String = self
                    .history
                    .iter()
                    .enumerate()
                    .map(|(i, entry)| format!("{:5}  {}\n", i + 1, entry))
                    .collect();
                self.write_feedback(&listing)?;
            }
            "/env" => {
                if self.parse_args::<NoArgs>(name, args)?.is_none() {
                    return Ok(2);
                }
                let listing: String = self
                    .interpreter
                    .env()
                    .sorted_vars()
                    .into_iter()
                    .map(|(k, v)| format!("{}={}\n", k, v))
                    .collect();
                self.write_feedback(&listing)?;
            }
            "/locale" => {
                if self.parse_args::<NoArgs>(name, args)?.is_none() {
                    return Ok(2);
                }
                self.write_feedback(&format!("{}\n", self.config.locale))?;
            }
            "/set" => {
                let Some(SetCommand { target }) = self.parse_args::<SetCommand>(name, args)? else {
                    return Ok(2);
                };
                match target {
                    SetTarget::Prompt(set) => self.set_prompt(set)?,
                }
            }
            "/exit" => {
                let Some(exit) = self.parse_args::<ExitCommand>(name, args)? else {
                    return Ok(2);
                };
                let status = exit.status.map(ExitCode::from).unwrap_or(0);
                self.exit_status = Some(status);
                return Ok(status);
            }
            _ => {
                self.write_feedback(&Messages::format(self.messages.unknown_command, name))?;
                return Ok(1);
            }
        }
        Ok(0)
    }

    fn set_prompt(&mut self, set: SetPrompt) -> Result<(), LaunchError> {
        self.prompts.primary = set.primary;
        if let Some(continuation) = set.continuation {
            self.prompts.continuation = continuation;
        }
        if set.retain {
            self.store.save_prompt(&RetainedPrompt {
                primary: self.prompts.primary.clone(),
                continuation: self.prompts.continuation.clone(),
            })?;
            self.write_feedback(self.messages.prompt_retained)
        } else {
            self.write_feedback(self.messages.prompt_set)
        }
    }

    /// Parse tool command arguments; usage and errors are shown as feedback.
    fn parse_args<T: FromArgs>(&self, name: &str, args: &[String]) -> Result<Option<T>, LaunchError> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        match T::from_args(&[name], &args) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(EarlyExit { output, .. }) => {
                self.write_feedback(&output)?;
                if !output.ends_with('\n') {
                    self.write_feedback("\n")?;
                }
                Ok(None)
            }
        }
    }

    fn write_feedback(&self, text: &str) -> Result<(), LaunchError> {
        let mut out = self.config.command_output.clone();
        out.write_all(text.as_bytes())?;
        Ok(())
    }

    fn flush_outputs(&self) -> Result<(), LaunchError> {
        for channel in [
            &self.config.command_output,
            &self.config.console_output,
            &self.config.user_output,
            &self.config.user_error,
        ] {
            channel.clone().flush()?;
        }
        Ok(())
    }
}

/// Tool commands live in their own namespace: a first word of the form
/// `/name` with no further slash. Absolute program paths keep working.
fn tool_command_name(tokens: &[Token]) -> Option<String> {
    let Some(Token::Word(parts)) = tokens.first() else {
        return None;
    };
    match parts.as_slice() {
        [WordPart::Literal(text)] if text.starts_with('/') && !text[1..].contains('/') && text.len() > 1 => {
            Some(text.clone())
        }
        _ => None,
    }
}

/// Text of a word for tool command arguments. Parameters are not expanded.
fn token_text(token: &Token) -> Option<String> {
    match token {
        Token::Word(parts) => Some(
            parts
                .iter()
                .map(|part| match part {
                    WordPart::Literal(text) => text.clone(),
                    WordPart::ParamSubst(name) => format!("${}", name),
                })
                .collect(),
        ),
        Token::PipeOp => Some("|".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::split_into_tokens;

    #[test]
    fn test_tool_command_names() {
        let name = |line: &str| tool_command_name(&split_into_tokens(line).unwrap());
        assert_eq!(name("/help"), Some("/help".to_string()));
        assert_eq!(name("/set prompt x"), Some("/set".to_string()));
        assert_eq!(name("/bin/echo hi"), None);
        assert_eq!(name("echo /help"), None);
        assert_eq!(name("/"), None);
    }

    #[test]
    fn test_capture_overrides_prompts() {
        let mut prompts = Prompts {
            primary: "my> ".to_string(),
            continuation: "..".to_string(),
            capture: false,
        };
        assert_eq!(prompts.primary(), "my> ");
        assert_eq!(prompts.continuation(), "..");
        prompts.capture = true;
        assert_eq!(prompts.primary(), "\u{5}");
        assert_eq!(prompts.continuation(), "\u{6}");
    }

    #[test]
    fn test_stream_source_strips_terminators_and_prompts_on_console() {
        let (console, shown) = OutputChannel::buffer();
        let mut source = StreamSource {
            input: InputChannel::from_bytes("one\r\ntwo"),
            console,
        };
        assert_eq!(source.read_line("A").unwrap(), Some("one".to_string()));
        assert_eq!(source.read_line("B").unwrap(), Some("two".to_string()));
        assert_eq!(source.read_line("C").unwrap(), None);
        assert_eq!(shown.to_string_lossy(), "ABC");
    }

    #[test]
    fn test_script_source_ignores_prompt() {
        let mut source = ScriptSource::new("a\nb\n");
        assert_eq!(source.read_line("x").unwrap(), Some("a".to_string()));
        assert_eq!(source.read_line("x").unwrap(), Some("b".to_string()));
        assert_eq!(source.read_line("x").unwrap(), None);
    }
}
