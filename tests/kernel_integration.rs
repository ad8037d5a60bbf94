//! Integration tests for kernel module
//!
//! These tests touch the real kernel but only in ways that leave the test
//! process unchanged, or do the risky part in a forked child.

use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, getgid, getuid, ForkResult};
use warmfork::core::types::{ResourceKind, ResourceLimit};
use warmfork::kernel::capabilities::{current_capabilities, set_capabilities};
use warmfork::kernel::credentials::{set_gid, set_uid, validate_ids, verify_identity};
use warmfork::kernel::debug::enable_debugger;
use warmfork::kernel::rlimit::{apply_rlimit, apply_rlimits, current_rlimit};
use warmfork::kernel::sched::{set_scheduler_class, SchedulerClass};

fn in_child(body: impl FnOnce() -> i32) -> i32 {
    // SAFETY: the child runs `body` and _exits without unwinding into the harness.
    match unsafe { fork() }.expect("fork failed") {
        ForkResult::Child => {
            let code = std::panic::catch_unwind(std::panic::AssertUnwindSafe(body)).unwrap_or(101);
            // SAFETY: see above.
            unsafe { libc::_exit(code) }
        }
        ForkResult::Parent { child } => match waitpid(child, None).expect("waitpid failed") {
            WaitStatus::Exited(_, code) => code,
            other => panic!("unexpected wait status {:?}", other),
        },
    }
}

#[test]
fn test_credential_validation_rejects_sentinel_ids() {
    assert!(validate_ids(u32::MAX, 1000).is_err());
    assert!(validate_ids(1000, u32::MAX).is_err());
}

#[test]
fn test_transition_to_own_identity_succeeds() {
    let code = in_child(|| {
        let (uid, gid) = (getuid().as_raw(), getgid().as_raw());
        // GID before UID
        match set_gid(gid).and_then(|_| set_uid(uid)).and_then(|_| verify_identity(uid, gid)) {
            Ok(()) => 0,
            Err(_) => 1,
        }
    });
    assert_eq!(code, 0);
}

#[test]
fn test_capability_query_operations_are_safe() {
    let caps = current_capabilities().expect("capability query failed");
    assert!(caps.effective.is_subset_of(caps.permitted));
}

#[test]
fn test_reinstalling_current_capabilities_is_idempotent() {
    let code = in_child(|| {
        let Ok(before) = current_capabilities() else {
            return 2;
        };
        if set_capabilities(before.permitted, before.effective).is_err() {
            return 1;
        }
        match current_capabilities() {
            Ok(after) if after.permitted == before.permitted && after.effective == before.effective => 0,
            _ => 3,
        }
    });
    assert_eq!(code, 0);
}

#[test]
fn test_rlimits_stop_at_first_failure() {
    let code = in_child(|| {
        let limits = [
            ResourceLimit::new(ResourceKind::Nofile, 32, 64),
            ResourceLimit::new(ResourceKind::Nofile, 1 << 40, 1 << 40),
            ResourceLimit::new(ResourceKind::Nofile, 16, 16),
        ];
        if apply_rlimits(&limits).is_ok() {
            return 1;
        }
        // The first limit stuck, the third was never attempted.
        match current_rlimit(ResourceKind::Nofile) {
            Ok((32, 64)) => 0,
            _ => 2,
        }
    });
    assert_eq!(code, 0);
}

#[test]
fn test_foreground_scheduler_class_without_privileges() {
    let code = in_child(|| match set_scheduler_class(SchedulerClass::Foreground) {
        Ok(()) => 0,
        Err(_) => 1,
    });
    assert_eq!(code, 0);
}

#[test]
fn test_debugger_caps_core_size_under_finite_hard_limit() {
    let code = in_child(|| {
        if apply_rlimit(&ResourceLimit::new(ResourceKind::Core, 4096, 8192)).is_err() {
            return 2;
        }
        // Without CAP_SYS_RESOURCE the hard limit cannot be raised back.
        if getuid().is_root() && (set_gid(65534).is_err() || set_uid(65534).is_err()) {
            return 3;
        }
        if enable_debugger().is_err() {
            return 1;
        }
        // SAFETY: PR_GET_DUMPABLE only reads the flag.
        let dumpable = unsafe { libc::prctl(libc::PR_GET_DUMPABLE, 0, 0, 0, 0) };
        match current_rlimit(ResourceKind::Core) {
            Ok((0, 8192)) if dumpable == 1 => 0,
            Ok(_) => 4,
            Err(_) => 5,
        }
    });
    assert_eq!(code, 0);
}
