//! Real-fork spawn tests.
//!
//! Children are spawned with the test process's own identity, so every
//! specialization step succeeds without root. The reaper is a no-op and the
//! terminator only counts, so a dying child can never take the harness down.

use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, getgid, getuid, ForkResult, Pid};
use std::io::Read;
use std::os::fd::AsRawFd;
use std::path::Path;
use warmfork::core::state::ProcessState;
use warmfork::core::types::{ResourceKind, ResourceLimit, SecurityProfile};
use warmfork::exec::shell::execute_shell_command_with;
use warmfork::exec::Spawner;
use warmfork::kernel::capabilities::current_capabilities;
use warmfork::kernel::label::LabelPolicy;
use warmfork::testing::{
    Call, CountingTerminator, Journal, ManualReaper, ReaperCall, RecordingHooks,
};
use warmfork::{SHELL_EXEC_FAILURE_EXIT, SPECIALIZE_FAILURE_EXIT};

fn own_profile() -> SecurityProfile {
    SecurityProfile::new(getuid().as_raw(), getgid().as_raw())
}

fn test_spawner() -> Spawner {
    let journal = Journal::new();
    Spawner::new()
        .with_hooks(RecordingHooks::new(journal.clone()))
        .with_reaper(ManualReaper::new(journal))
        .with_terminator(CountingTerminator::new())
        .with_labels(LabelPolicy::disabled())
        .with_state(Box::leak(Box::new(ProcessState::new())))
}

fn exit_code(pid: Pid) -> i32 {
    match waitpid(pid, None).expect("waitpid failed") {
        WaitStatus::Exited(_, code) => code,
        other => panic!("unexpected wait status {:?}", other),
    }
}

#[test]
fn test_application_runs_entry_with_empty_capabilities() {
    let spawner = test_spawner();
    let pid = spawner
        .spawn_application(&own_profile(), || match current_capabilities() {
            Ok(caps) if caps.permitted.is_empty() && caps.effective.is_empty() => 0,
            Ok(_) => 3,
            Err(_) => 4,
        })
        .expect("spawn failed");

    assert_eq!(exit_code(pid), 0);
}

#[test]
fn test_entry_return_value_becomes_exit_status() {
    let spawner = test_spawner();
    let pid = spawner.spawn_application(&own_profile(), || 42).unwrap();
    assert_eq!(exit_code(pid), 42);
}

#[test]
fn test_failed_rlimit_exits_before_entry() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("entry-ran");
    let marker_in_child = marker.clone();

    // Far above fs.nr_open: refused for root and non-root alike.
    let profile = own_profile()
        .with_rlimit(ResourceLimit::new(ResourceKind::Nofile, 64, 64))
        .with_rlimit(ResourceLimit::new(ResourceKind::Nofile, 1 << 40, 1 << 40));

    let spawner = test_spawner();
    let pid = spawner
        .spawn_application(&profile, move || {
            let _ = std::fs::write(&marker_in_child, b"ran");
            0
        })
        .unwrap();

    assert_eq!(exit_code(pid), SPECIALIZE_FAILURE_EXIT);
    assert!(!marker.exists(), "entry point must not run after a failed step");
}

#[test]
fn test_singleton_is_registered_and_alive() {
    let spawner = test_spawner();
    let state = spawner.state();

    let pid = spawner
        .spawn_singleton(&own_profile(), || {
            std::thread::sleep(std::time::Duration::from_secs(30));
            0
        })
        .unwrap();

    assert_eq!(state.singleton_pid(), Some(pid.as_raw()));
    assert!(!state.is_terminating());

    let err = spawner.spawn_singleton(&own_profile(), || 0).unwrap_err();
    assert!(err.to_string().contains("already running"));

    kill(pid, Signal::SIGKILL).unwrap();
    assert!(matches!(
        waitpid(pid, None).unwrap(),
        WaitStatus::Signaled(_, Signal::SIGKILL, _)
    ));
}

#[test]
fn test_reaper_arm_failure_does_not_block_spawn() {
    let journal = Journal::new();
    let spawner = Spawner::new()
        .with_hooks(RecordingHooks::new(journal.clone()))
        .with_reaper(ManualReaper::new(journal.clone()).failing_arm())
        .with_terminator(CountingTerminator::new())
        .with_labels(LabelPolicy::disabled())
        .with_state(Box::leak(Box::new(ProcessState::new())));

    let pid = spawner.spawn_application(&own_profile(), || 7).unwrap();

    assert_eq!(exit_code(pid), 7);
    assert!(journal.calls().contains(&Call::Reaper(ReaperCall::Arm)));
}

fn run_shell(shell: &str, command: &str) -> (i32, String) {
    let (read_end, write_end) = nix::unistd::pipe().unwrap();

    // SAFETY: the child only redirects stdout and execs (or _exits).
    match unsafe { fork() }.unwrap() {
        ForkResult::Child => {
            // SAFETY: both descriptors are open in the child.
            unsafe { libc::dup2(write_end.as_raw_fd(), 1) };
            let _err = execute_shell_command_with(Path::new(shell), command);
            // SAFETY: exit without running the harness's destructors.
            unsafe { libc::_exit(99) }
        }
        ForkResult::Parent { child } => {
            drop(write_end);
            let mut output = String::new();
            std::fs::File::from(read_end)
                .read_to_string(&mut output)
                .unwrap();
            (exit_code(child), output)
        }
    }
}

#[test]
fn test_shell_command_runs() {
    let (code, output) = run_shell("/bin/sh", "echo 1");
    assert_eq!(code, 0);
    assert_eq!(output.trim(), "1");
}

#[test]
fn test_missing_shell_exits_127() {
    let (code, output) = run_shell("/nonexistent/warmfork-sh", "echo 1");
    assert_eq!(code, SHELL_EXEC_FAILURE_EXIT);
    assert!(output.is_empty());
}

#[test]
fn test_shell_exit_status_propagates() {
    let (code, _) = run_shell("/bin/sh", "exit 5");
    assert_eq!(code, 5);
}
