/// Shared error taxonomy and closed enums for warmfork
use thiserror::Error;

/// Custom error types for warmfork
///
/// Every variant is reported to the caller only on the parent's side of a
/// spawn. Inside a forked child the same errors are fatal to the child.
#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pre-fork preparation failed: {0}")]
    PreFork(String),

    #[error("Fork failed: {0}")]
    Fork(String),

    #[error("Privilege error: {0}")]
    Privilege(String),

    #[error("Resource limit error: {0}")]
    ResourceLimit(String),

    #[error("Capability error: {0}")]
    Capability(String),

    #[error("Mount error: {0}")]
    Mount(String),

    #[error("Security label error: {0}")]
    Label(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Signal error: {0}")]
    Signal(String),

    #[error("Shell error: {0}")]
    Shell(String),

    #[error("Singleton registry error: {0}")]
    Registry(String),
}

/// Result type alias for warmfork operations
pub type Result<T> = std::result::Result<T, SpawnError>;

/// Exit status of a child whose specialization failed before its entry point.
pub const SPECIALIZE_FAILURE_EXIT: i32 = 70;

/// Exit status when the shell cannot be executed.
pub const SHELL_EXEC_FAILURE_EXIT: i32 = 127;
