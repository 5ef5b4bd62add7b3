use crate::channel::{InputChannel, OutputChannel};
use crate::interpreter::UserStreams;
use crate::locale::Locale;
use crate::persistence::Persistence;
use std::collections::HashMap;

/// Destinations for command feedback, console interaction and user output.
#[derive(Debug, Clone)]
pub struct OutputChannels {
    pub command: OutputChannel,
    pub console: OutputChannel,
    pub user: OutputChannel,
}

impl OutputChannels {
    /// One sink for everything.
    pub fn unified(output: OutputChannel) -> Self {
        Self {
            command: output.clone(),
            console: output.clone(),
            user: output,
        }
    }
}

/// Destinations for tool errors and user errors.
#[derive(Debug, Clone)]
pub struct ErrorChannels {
    pub command: OutputChannel,
    pub user: OutputChannel,
}

impl ErrorChannels {
    pub fn unified(error: OutputChannel) -> Self {
        Self {
            command: error.clone(),
            user: error,
        }
    }
}

/// Fully resolved configuration handed to a [`crate::ShellEngine`].
///
/// Every axis has a concrete value here; nothing is left to default.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub command_input: InputChannel,
    pub user_input: InputChannel,
    pub command_output: OutputChannel,
    pub console_output: OutputChannel,
    pub user_output: OutputChannel,
    pub command_error: OutputChannel,
    pub user_error: OutputChannel,
    pub persistence: Persistence,
    pub env: HashMap<String, String>,
    pub locale: Locale,
    pub prompt_capture: bool,
}

impl SessionConfig {
    pub fn user_streams(&self) -> UserStreams {
        UserStreams {
            input: self.user_input.clone(),
            output: self.user_output.clone(),
            error: self.user_error.clone(),
        }
    }
}
