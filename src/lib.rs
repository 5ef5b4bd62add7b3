//! An embeddable launcher for an interactive command shell.
//!
//! A [`ShellToolBuilder`] collects where a session reads its commands from, where
//! feedback, prompts and command output go, how history is persisted, and which
//! environment and locale the session sees. [`ShellToolBuilder::run`] fills in the
//! defaults for anything left unset and hands the result to a [`ShellEngine`].
//! The builder is left untouched, so it can launch any number of sessions.
//!
//! The bundled [`DefaultEngine`] runs a small shell: pipelines of builtins and
//! external programs, parameter expansion, tool commands such as `/history` and
//! `/set prompt`, and history kept through the configured [`Persistence`].
//!
//! ```no_run
//! use shell_launcher::{InputChannel, OutputChannel};
//!
//! let (out, captured) = OutputChannel::buffer();
//! let status = shell_launcher::builder()
//!     .input(InputChannel::from_bytes("echo hello\n"), None)
//!     .out(out)
//!     .env([("HOME", "/tmp")])
//!     .prompt_capture(true)
//!     .run(["-q"])
//!     .unwrap();
//! assert_eq!(status, 0);
//! assert!(captured.to_string_lossy().contains("hello"));
//! ```

mod builder;
mod builtin;
pub mod channel;
pub mod command;
pub mod config;
mod engine;
pub mod env;
mod error;
mod external;
mod interpreter;
mod io_adapters;
mod lexer;
pub mod locale;
mod parser;
pub mod persistence;
mod session;

pub use builder::{ShellToolBuilder, builder};
pub use channel::{InputChannel, OutputChannel, SharedBuffer};
pub use command::ExitCode;
pub use config::SessionConfig;
pub use engine::{DefaultEngine, ShellEngine};
pub use error::{LaunchError, PersistenceError};
pub use interpreter::{Interpreter, UserStreams};
pub use locale::Locale;
pub use persistence::{FileStore, Persistence, PreferenceStore, SharedMap, SharedStore};
