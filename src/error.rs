use thiserror::Error;

/// Failure of the persistence store backing a session.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Persistence I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed persistence file '{path}': {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Could not write persistence file: {0}")]
    Persist(#[from] tempfile::PersistError),
    #[error("Could not encode persisted value: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Could not find a configuration directory for the standard store.")]
    ConfigDirNotFound,
    #[error("Persistence store lock was poisoned.")]
    Poisoned,
}

/// Fatal error returned by [`crate::ShellToolBuilder::run`].
///
/// Any condition that prevents the session from starting, or that the session
/// cannot recover from, ends up here. The builder stays usable afterwards.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Session I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("Terminal editor failed: {0}")]
    Editor(#[from] rustyline::error::ReadlineError),
    #[error("Shell engine failed: {0}")]
    Engine(#[from] anyhow::Error),
}
