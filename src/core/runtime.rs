//! Hooks into the runtime hosted by the spawning service.
//!
//! The warm parent's heap preparation, per-thread bindings and debug
//! facilities belong to that runtime; the spawner only calls these hooks at
//! fixed points of a spawn.

use crate::config::types::Result;

pub trait RuntimeHooks: Send + Sync {
    /// Quiesce the runtime before fork. An error refuses the spawn.
    fn pre_fork(&self) -> Result<()> {
        Ok(())
    }

    /// Rebind per-thread runtime state after fork. Child only.
    fn reinit_thread_state(&self) {}

    /// Turn on argument checking for native calls. Child only.
    fn enable_checked_native_calls(&self) {}

    /// Turn on verbose logging of native calls. Child only.
    fn enable_native_call_logging(&self) {}

    /// Allow or forbid a debugger transport in the child.
    fn set_debugger_allowed(&self, _allowed: bool) {}

    /// Last hook before the child's entry point runs.
    fn did_fork_child(&self) {}
}

/// Hooks for a host with no managed runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRuntime;

impl RuntimeHooks for NoRuntime {}
