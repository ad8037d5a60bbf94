//! Replacing the current process with a shell command or a program.

use crate::config::loader::DEFAULT_SHELL;
use crate::config::types::{SpawnError, SHELL_EXEC_FAILURE_EXIT};
use crate::exec::preexec::exit_child;
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Run `command` under `/bin/sh -c`.
///
/// Only returns, with [`SpawnError::Shell`], when the command cannot be
/// passed to exec at all. If exec itself fails the process exits with 127.
pub fn execute_shell_command(command: &str) -> SpawnError {
    execute_shell_command_with(Path::new(DEFAULT_SHELL), command)
}

/// As [`execute_shell_command`], with an explicit interpreter.
pub fn execute_shell_command_with(shell: &Path, command: &str) -> SpawnError {
    let shell_c = match CString::new(shell.as_os_str().as_bytes()) {
        Ok(s) => s,
        Err(_) => return SpawnError::Shell("shell path contains NUL byte".to_string()),
    };
    let command_c = match CString::new(command) {
        Ok(c) => c,
        Err(_) => return SpawnError::Shell("command contains NUL byte".to_string()),
    };
    let flag = match CString::new("-c") {
        Ok(f) => f,
        Err(_) => return SpawnError::Shell("invalid shell flag".to_string()),
    };

    let argv = [shell_c.as_c_str(), flag.as_c_str(), command_c.as_c_str()];
    let Err(e) = nix::unistd::execv(shell_c.as_c_str(), &argv);
    log::error!("execv({} -c '{}') failed: {}", shell.display(), command, e);
    exit_child(SHELL_EXEC_FAILURE_EXIT)
}

/// Entry point for CLI-spawned children: exec `argv` via PATH lookup.
///
/// Returns the exit status the child should use when exec fails.
pub fn exec_argv(argv: &[String]) -> i32 {
    let Some(program) = argv.first() else {
        log::error!("Refusing to exec an empty command");
        return SHELL_EXEC_FAILURE_EXIT;
    };

    let mut cargv = Vec::with_capacity(argv.len());
    for arg in argv {
        match CString::new(arg.as_str()) {
            Ok(c) => cargv.push(c),
            Err(_) => {
                log::error!("Argument contains NUL byte: {:?}", arg);
                return SHELL_EXEC_FAILURE_EXIT;
            }
        }
    }

    log::info!("Executing {:?}", argv);
    let Err(e) = nix::unistd::execvp(cargv[0].as_c_str(), &cargv);
    log::error!("execvp({}) failed: {}", program, e);
    SHELL_EXEC_FAILURE_EXIT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nul_in_command_is_refused_without_exec() {
        let err = execute_shell_command("echo a\0b");
        assert!(matches!(err, SpawnError::Shell(_)));
    }

    #[test]
    fn test_empty_argv_returns_failure_status() {
        assert_eq!(exec_argv(&[]), SHELL_EXEC_FAILURE_EXIT);
    }

    #[test]
    fn test_nul_in_argv_returns_failure_status() {
        assert_eq!(exec_argv(&["a\0b".to_string()]), SHELL_EXEC_FAILURE_EXIT);
    }

    #[test]
    fn test_missing_program_returns_failure_status() {
        let argv = ["/nonexistent/warmfork-missing".to_string()];
        assert_eq!(exec_argv(&argv), SHELL_EXEC_FAILURE_EXIT);
    }
}
