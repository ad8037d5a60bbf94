//! Recording runtime hooks, reaper, terminator and waiter.

use super::{Call, Journal};
use crate::config::types::{Result, SpawnError};
use crate::core::runtime::RuntimeHooks;
use crate::kernel::signal::{ChildWaiter, ReaperControl, ServiceTerminator, WaitOutcome};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookCall {
    PreFork,
    ReinitThreadState,
    CheckedNativeCalls,
    NativeCallLogging,
    DebuggerAllowed(bool),
    DidForkChild,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaperCall {
    Arm,
    Disarm,
}

#[derive(Debug, Default)]
pub struct RecordingHooks {
    journal: Journal,
    refuse_fork: bool,
}

impl RecordingHooks {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            refuse_fork: false,
        }
    }

    /// Make `pre_fork` fail.
    pub fn refusing_fork(mut self) -> Self {
        self.refuse_fork = true;
        self
    }
}

impl RuntimeHooks for RecordingHooks {
    fn pre_fork(&self) -> Result<()> {
        self.journal.record(Call::Hook(HookCall::PreFork));
        if self.refuse_fork {
            return Err(SpawnError::PreFork("runtime not quiescent".to_string()));
        }
        Ok(())
    }

    fn reinit_thread_state(&self) {
        self.journal.record(Call::Hook(HookCall::ReinitThreadState));
    }

    fn enable_checked_native_calls(&self) {
        self.journal.record(Call::Hook(HookCall::CheckedNativeCalls));
    }

    fn enable_native_call_logging(&self) {
        self.journal.record(Call::Hook(HookCall::NativeCallLogging));
    }

    fn set_debugger_allowed(&self, allowed: bool) {
        self.journal.record(Call::Hook(HookCall::DebuggerAllowed(allowed)));
    }

    fn did_fork_child(&self) {
        self.journal.record(Call::Hook(HookCall::DidForkChild));
    }
}

/// Reaper that never touches signal dispositions.
#[derive(Debug, Default)]
pub struct ManualReaper {
    journal: Journal,
    fail_arm: bool,
}

impl ManualReaper {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            fail_arm: false,
        }
    }

    pub fn failing_arm(mut self) -> Self {
        self.fail_arm = true;
        self
    }
}

impl ReaperControl for ManualReaper {
    fn arm(&self) -> Result<()> {
        self.journal.record(Call::Reaper(ReaperCall::Arm));
        if self.fail_arm {
            return Err(SpawnError::Signal("sigaction refused".to_string()));
        }
        Ok(())
    }

    fn disarm(&self) -> Result<()> {
        self.journal.record(Call::Reaper(ReaperCall::Disarm));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct CountingTerminator {
    count: AtomicUsize,
}

impl CountingTerminator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl ServiceTerminator for CountingTerminator {
    fn terminate(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Replays a fixed list of outcomes, then reports no children.
#[derive(Debug, Default)]
pub struct ScriptedWaiter {
    outcomes: VecDeque<WaitOutcome>,
    asked: Vec<Option<i32>>,
}

impl ScriptedWaiter {
    pub fn new(outcomes: impl IntoIterator<Item = WaitOutcome>) -> Self {
        Self {
            outcomes: outcomes.into_iter().collect(),
            asked: Vec::new(),
        }
    }

    /// The pid argument of every wait, in order.
    pub fn asked(&self) -> &[Option<i32>] {
        &self.asked
    }
}

impl ChildWaiter for ScriptedWaiter {
    fn try_wait(&mut self, pid: Option<i32>) -> WaitOutcome {
        self.asked.push(pid);
        self.outcomes.pop_front().unwrap_or(WaitOutcome::NoChildren)
    }
}
