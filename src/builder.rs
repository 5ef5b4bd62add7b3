//! The launcher's configuration builder.

use crate::channel::{InputChannel, OutputChannel};
use crate::command::ExitCode;
use crate::config::{ErrorChannels, OutputChannels, SessionConfig};
use crate::engine::{DefaultEngine, ShellEngine};
use crate::env;
use crate::error::LaunchError;
use crate::locale::Locale;
use crate::persistence::{Persistence, SharedMap, SharedStore};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Create an empty builder that runs the default engine.
pub fn builder() -> ShellToolBuilder {
    ShellToolBuilder::new()
}

/// Collects the launch configuration and starts sessions with it.
///
/// Every setter returns the builder for chaining and may be called any number of
/// times; the last call wins. Unset axes are filled in by [`ShellToolBuilder::resolve`]
/// on each `run`, so the builder itself never changes when a session starts.
#[derive(Clone)]
pub struct ShellToolBuilder {
    input: Option<(InputChannel, Option<InputChannel>)>,
    output: Option<OutputChannels>,
    error: Option<ErrorChannels>,
    persistence: Persistence,
    env: Option<HashMap<String, String>>,
    locale: Option<Locale>,
    prompt_capture: bool,
    engine: Arc<dyn ShellEngine>,
}

impl Default for ShellToolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellToolBuilder {
    pub fn new() -> Self {
        Self {
            input: None,
            output: None,
            error: None,
            persistence: Persistence::Standard,
            env: None,
            locale: None,
            prompt_capture: false,
            engine: Arc::new(DefaultEngine),
        }
    }

    /// Command input and, optionally, a separate input for the commands being run.
    ///
    /// Without `user_input` the commands read from `command_input`.
    pub fn input(&mut self, command_input: InputChannel, user_input: Option<InputChannel>) -> &mut Self {
        self.input = Some((command_input, user_input));
        self
    }

    /// Send command feedback, console interaction and user output to one sink.
    pub fn out(&mut self, output: OutputChannel) -> &mut Self {
        self.output = Some(OutputChannels::unified(output));
        self
    }

    pub fn out_split(
        &mut self,
        command_output: OutputChannel,
        console_output: OutputChannel,
        user_output: OutputChannel,
    ) -> &mut Self {
        self.output = Some(OutputChannels {
            command: command_output,
            console: console_output,
            user: user_output,
        });
        self
    }

    /// Send tool errors and user errors to one sink.
    pub fn err(&mut self, error: OutputChannel) -> &mut Self {
        self.error = Some(ErrorChannels::unified(error));
        self
    }

    pub fn err_split(&mut self, command_error: OutputChannel, user_error: OutputChannel) -> &mut Self {
        self.error = Some(ErrorChannels {
            command: command_error,
            user: user_error,
        });
        self
    }

    /// Keep history and retained prompts in `store` instead of the standard file.
    pub fn persistence(&mut self, store: SharedStore) -> &mut Self {
        self.persistence = Persistence::Store(store);
        self
    }

    /// Keep history and retained prompts in an in-memory map.
    pub fn persistence_map(&mut self, map: SharedMap) -> &mut Self {
        self.persistence = Persistence::Map(map);
        self
    }

    /// Replace the session environment wholesale.
    ///
    /// The variables are copied now; later changes to the caller's data are not seen.
    pub fn env<I, K, V>(&mut self, vars: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    pub fn locale(&mut self, locale: Locale) -> &mut Self {
        self.locale = Some(locale);
        self
    }

    /// Show fixed ENQ/ACK prompts meant for programs driving the session.
    pub fn prompt_capture(&mut self, capture: bool) -> &mut Self {
        self.prompt_capture = capture;
        self
    }

    pub fn engine(&mut self, engine: Arc<dyn ShellEngine>) -> &mut Self {
        self.engine = engine;
        self
    }

    /// Snapshot of the configuration with every unset axis defaulted.
    pub fn resolve(&self) -> SessionConfig {
        let (command_input, user_input) = match &self.input {
            Some((command, Some(user))) => (command.clone(), user.clone()),
            Some((command, None)) => (command.clone(), command.clone()),
            None => (InputChannel::stdin(), InputChannel::stdin()),
        };
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| OutputChannels::unified(OutputChannel::stdout()));
        let error = self
            .error
            .clone()
            .unwrap_or_else(|| ErrorChannels::unified(OutputChannel::stderr()));

        SessionConfig {
            command_input,
            user_input,
            command_output: output.command,
            console_output: output.console,
            user_output: output.user,
            command_error: error.command,
            user_error: error.user,
            persistence: self.persistence.clone(),
            env: self.env.clone().unwrap_or_else(env::process_vars),
            locale: self.locale.clone().unwrap_or_else(Locale::process_default),
            prompt_capture: self.prompt_capture,
        }
    }

    /// Start a session and block until it ends.
    ///
    /// `arguments` reach the engine untouched. Returns the session's exit status.
    pub fn run<I, S>(&self, arguments: I) -> Result<ExitCode, LaunchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let arguments: Vec<String> = arguments.into_iter().map(Into::into).collect();
        let config = self.resolve();
        log::debug!(
            "Launching session: args {:?}, persistence {:?}, locale {}, {} environment variables",
            arguments,
            config.persistence,
            config.locale,
            config.env.len()
        );
        self.engine.run(config, &arguments)
    }
}

impl fmt::Debug for ShellToolBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellToolBuilder")
            .field("input", &self.input)
            .field("output", &self.output)
            .field("error", &self.error)
            .field("persistence", &self.persistence)
            .field("env", &self.env)
            .field("locale", &self.locale)
            .field("prompt_capture", &self.prompt_capture)
            .finish_non_exhaustive()
    }
}
