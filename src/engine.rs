use crate::command::ExitCode;
use crate::config::SessionConfig;
use crate::error::LaunchError;
use crate::locale::Messages;
use crate::session::{self, ScriptSource, Session};
use argh::{EarlyExit, FromArgs};
use std::io::Write;

const PROGRAM_NAME: &str = "shell-launcher";

/// The collaborator that runs a session from a resolved configuration.
///
/// `run` blocks for the whole session and must leave the streams it was given open.
pub trait ShellEngine: Send + Sync {
    fn run(&self, config: SessionConfig, arguments: &[String]) -> Result<ExitCode, LaunchError>;
}

#[derive(FromArgs)]
/// Interactive command shell.
struct LaunchOptions {
    #[argh(switch, short = 'q')]
    /// do not show welcome and goodbye feedback.
    quiet: bool,

    #[argh(option, short = 'c')]
    /// run this entry and end the session.
    command: Option<String>,

    #[argh(positional, greedy)]
    /// scripts to run, in order, before the interactive session.
    scripts: Vec<String>,
}

/// The built-in shell engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultEngine;

impl ShellEngine for DefaultEngine {
    fn run(&self, config: SessionConfig, arguments: &[String]) -> Result<ExitCode, LaunchError> {
        let args: Vec<&str> = arguments.iter().map(String::as_str).collect();
        let options = match LaunchOptions::from_args(&[PROGRAM_NAME], &args) {
            Ok(options) => options,
            Err(EarlyExit { output, status }) => {
                let mut sink = match status {
                    Ok(()) => config.command_output.clone(),
                    Err(()) => config.command_error.clone(),
                };
                sink.write_all(output.as_bytes())?;
                if !output.ends_with('\n') {
                    sink.write_all(b"\n")?;
                }
                sink.flush()?;
                return Ok(if status.is_ok() { 0 } else { 1 });
            }
        };

        let mut session = Session::open(&config, !options.quiet && options.command.is_none())?;
        match drive(&mut session, &config, &options) {
            Ok(()) => session.close(),
            Err(e) => Err(session.abort(e)),
        }
    }
}

fn drive(session: &mut Session<'_>, config: &SessionConfig, options: &LaunchOptions) -> Result<(), LaunchError> {
    session.welcome()?;

    for script in &options.scripts {
        if session.finished() {
            return Ok(());
        }
        match std::fs::read_to_string(script) {
            Ok(text) => {
                log::debug!("Running script {}", script);
                session.run_source(&mut ScriptSource::new(&text), false)?;
            }
            Err(e) => {
                log::debug!("Script {} unreadable: {}", script, e);
                let text = Messages::format(config.locale.messages().script_not_found, script);
                return session.report_error(&text, 1);
            }
        }
    }

    if session.finished() {
        return Ok(());
    }
    match &options.command {
        Some(command) => session.run_source(&mut ScriptSource::new(command), false),
        None => {
            let mut source = session::interactive_source(config, session.history())?;
            session.run_source(source.as_mut(), true)
        }
    }
}
