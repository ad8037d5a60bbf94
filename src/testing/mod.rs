//! Testing infrastructure
//!
//! Recording stand-ins for the kernel, the hosted runtime and the reaper.
//! They share a [`Journal`] so a test can assert the exact interleaving of
//! kernel calls and hook invocations a spawn performed.

pub mod fake_kernel;
pub mod fake_runtime;

pub use fake_kernel::{FakeKernel, KernelCall};
pub use fake_runtime::{
    CountingTerminator, HookCall, ManualReaper, ReaperCall, RecordingHooks, ScriptedWaiter,
};

use std::sync::{Arc, Mutex};

/// One recorded interaction with a collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Kernel(KernelCall),
    Hook(HookCall),
    Reaper(ReaperCall),
}

/// Shared, append-only call log.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: Call) {
        let mut calls = match self.calls.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        calls.push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        match self.calls.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn kernel_calls(&self) -> Vec<KernelCall> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Kernel(k) => Some(k),
                _ => None,
            })
            .collect()
    }

    pub fn hook_calls(&self) -> Vec<HookCall> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Hook(h) => Some(h),
                _ => None,
            })
            .collect()
    }

    /// Position of the first call matching `pred`, if any.
    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls().iter().position(pred)
    }
}
