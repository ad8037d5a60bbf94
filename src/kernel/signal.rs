/// Async-safe SIGCHLD reaping for the spawning service
///
/// The handler drains every terminated child in one invocation, classifies
/// each exit, and kills the whole service if the registered singleton is
/// among them. An external supervisor restarts the service and its singleton
/// together.
///
/// Everything reachable from `handle_sigchld` is async-signal-safe: waitpid,
/// getpid, kill, write(2) and atomics. No `log`, no allocation, no locks.
use crate::config::types::{Result, SpawnError};
use crate::core::state::ProcessState;
use crate::core::types::{ChildExit, ExitKind};
use nix::errno::Errno;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::fmt::Write as _;

/// Result of one non-blocking wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Reaped(ChildExit),
    /// Children exist but none has terminated.
    StillRunning,
    /// ECHILD: nothing left to wait for (or the pid was already reaped).
    NoChildren,
    Interrupted,
    Failed(i32),
}

/// Non-blocking wait primitive. Implementations used from the signal
/// handler must be async-signal-safe.
pub trait ChildWaiter {
    /// `None` waits for any child, `Some(pid)` for that child only.
    fn try_wait(&mut self, pid: Option<i32>) -> WaitOutcome;
}

/// Brings the whole service down. Must be async-signal-safe.
pub trait ServiceTerminator: Send + Sync {
    fn terminate(&self);
}

/// Receives reaper diagnostics. Implementations used from the signal
/// handler must not allocate or lock.
pub trait ReapDiagnostics {
    fn child_exited(&mut self, exit: &ChildExit);
    fn singleton_died(&mut self, pid: i32);
    fn wait_failed(&mut self, errno: i32);
}

/// Arms and disarms child reaping around spawns.
pub trait ReaperControl: Send + Sync {
    fn arm(&self) -> Result<()>;
    fn disarm(&self) -> Result<()>;
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub reaped: usize,
    pub singleton_died: bool,
}

/// Reap every terminated child currently available.
///
/// For each reaped pid equal to the registered singleton the service is
/// terminated through the state's latch, so termination happens at most once
/// per process no matter how many paths observe the death.
pub fn drain_terminated<W, D>(
    waiter: &mut W,
    state: &ProcessState,
    terminator: &dyn ServiceTerminator,
    diagnostics: &mut D,
) -> DrainReport
where
    W: ChildWaiter + ?Sized,
    D: ReapDiagnostics + ?Sized,
{
    let mut report = DrainReport::default();

    loop {
        match waiter.try_wait(None) {
            WaitOutcome::Reaped(exit) => {
                report.reaped += 1;
                if exit.is_noteworthy() {
                    diagnostics.child_exited(&exit);
                }
                if state.is_singleton(exit.pid) {
                    report.singleton_died = true;
                    diagnostics.singleton_died(exit.pid);
                    state.request_termination(|| terminator.terminate());
                }
            }
            WaitOutcome::Interrupted => continue,
            WaitOutcome::StillRunning | WaitOutcome::NoChildren => break,
            WaitOutcome::Failed(errno) => {
                diagnostics.wait_failed(errno);
                break;
            }
        }
    }

    report
}

/// waitpid(2) with WNOHANG.
#[derive(Debug, Default, Clone, Copy)]
pub struct KernelWaiter;

impl ChildWaiter for KernelWaiter {
    fn try_wait(&mut self, pid: Option<i32>) -> WaitOutcome {
        let target = Pid::from_raw(pid.unwrap_or(-1));
        match waitpid(target, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(pid, code)) => WaitOutcome::Reaped(ChildExit {
                pid: pid.as_raw(),
                kind: ExitKind::Exited(code),
            }),
            Ok(WaitStatus::Signaled(pid, sig, core_dumped)) => WaitOutcome::Reaped(ChildExit {
                pid: pid.as_raw(),
                kind: ExitKind::Signaled {
                    signal: sig as i32,
                    core_dumped,
                },
            }),
            Ok(WaitStatus::StillAlive) => WaitOutcome::StillRunning,
            // Stops and continues are not terminations; keep draining.
            Ok(_) => WaitOutcome::Interrupted,
            Err(Errno::ECHILD) => WaitOutcome::NoChildren,
            Err(Errno::EINTR) => WaitOutcome::Interrupted,
            Err(e) => WaitOutcome::Failed(e as i32),
        }
    }
}

/// SIGKILL to self: unblockable and immediate.
#[derive(Debug, Default, Clone, Copy)]
pub struct KillSelf;

impl ServiceTerminator for KillSelf {
    fn terminate(&self) {
        // SAFETY: getpid and kill are async-signal-safe.
        unsafe {
            libc::kill(libc::getpid(), libc::SIGKILL);
        }
    }
}

/// Fixed-size line buffer; formatting integers into it never allocates.
struct SignalSafeLine {
    buf: [u8; 160],
    len: usize,
}

impl SignalSafeLine {
    fn new() -> Self {
        Self { buf: [0; 160], len: 0 }
    }

    fn emit(&mut self) {
        if self.len < self.buf.len() {
            self.buf[self.len] = b'\n';
            self.len += 1;
        }
        // SAFETY: write(2) is async-signal-safe; buf[..len] is initialized.
        unsafe {
            libc::write(2, self.buf.as_ptr() as *const libc::c_void, self.len);
        }
    }
}

impl std::fmt::Write for SignalSafeLine {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        // Keep one byte for the trailing newline; truncate silently.
        let room = self.buf.len().saturating_sub(self.len + 1);
        let take = s.len().min(room);
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}

/// Diagnostics written straight to stderr with write(2).
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrDiagnostics;

impl ReapDiagnostics for StderrDiagnostics {
    fn child_exited(&mut self, exit: &ChildExit) {
        let mut line = SignalSafeLine::new();
        let _ = match exit.kind {
            ExitKind::Exited(code) => write!(
                line,
                "warmfork: process {} exited cleanly ({})",
                exit.pid, code
            ),
            ExitKind::Signaled { signal, core_dumped } => write!(
                line,
                "warmfork: process {} terminated by signal ({}){}",
                exit.pid,
                signal,
                if core_dumped { ", dumped core" } else { "" }
            ),
        };
        line.emit();
    }

    fn singleton_died(&mut self, pid: i32) {
        let mut line = SignalSafeLine::new();
        let _ = write!(
            line,
            "warmfork: exiting because singleton process {} has terminated",
            pid
        );
        line.emit();
    }

    fn wait_failed(&mut self, errno: i32) {
        let mut line = SignalSafeLine::new();
        let _ = write!(line, "warmfork: SIGCHLD waitpid failed (errno {})", errno);
        line.emit();
    }
}

/// Installed SIGCHLD handler body.
extern "C" fn handle_sigchld(_signal: libc::c_int) {
    // SAFETY: errno location is thread-local and valid for the handler's lifetime.
    let saved_errno = unsafe { *libc::__errno_location() };

    drain_terminated(
        &mut KernelWaiter,
        ProcessState::global(),
        &KillSelf,
        &mut StderrDiagnostics,
    );

    // SAFETY: see above.
    unsafe {
        *libc::__errno_location() = saved_errno;
    }
}

/// The service's SIGCHLD reaper.
#[derive(Debug, Default, Clone, Copy)]
pub struct SigchldReaper;

impl SigchldReaper {
    pub fn new() -> Self {
        Self
    }
}

impl ReaperControl for SigchldReaper {
    /// Install the handler. Safe to call before every spawn.
    fn arm(&self) -> Result<()> {
        let action = SigAction::new(
            SigHandler::Handler(handle_sigchld),
            SaFlags::SA_RESTART | SaFlags::SA_NOCLDSTOP,
            SigSet::empty(),
        );
        // SAFETY: handle_sigchld only performs async-signal-safe operations.
        unsafe { signal::sigaction(Signal::SIGCHLD, &action) }
            .map_err(|e| SpawnError::Signal(format!("Failed to install SIGCHLD handler: {}", e)))?;
        Ok(())
    }

    /// Restore default SIGCHLD disposition. Called in the child before its entry point.
    fn disarm(&self) -> Result<()> {
        let action = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
        // SAFETY: restoring SIG_DFL installs no Rust code.
        unsafe { signal::sigaction(Signal::SIGCHLD, &action) }
            .map_err(|e| SpawnError::Signal(format!("Failed to reset SIGCHLD handler: {}", e)))?;
        Ok(())
    }
}
