//! Process spawning
//!
//! Fork, child-side specialization, and shell exec.

pub mod preexec;
pub mod shell;
pub mod spawner;

pub use shell::{execute_shell_command, execute_shell_command_with};
pub use spawner::{confirm_singleton_alive, Spawner};
