//! A [`KernelOps`] that records instead of touching the host.

use super::{Call, Journal};
use crate::config::types::{Result, SpawnError};
use crate::core::types::{CapabilityMask, MountExternal, ResourceLimit};
use crate::kernel::label::SecurityLabel;
use crate::kernel::mount::StorageLayout;
use crate::kernel::sched::SchedulerClass;
use crate::kernel::KernelOps;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelCall {
    KeepCapabilities,
    MountExternal { uid: u32, mode: MountExternal },
    SetGroups(Vec<u32>),
    SetRlimit(ResourceLimit),
    SetGid(u32),
    SetUid(u32),
    VerifyIdentity { uid: u32, gid: u32 },
    DisableAddressRandomization,
    SetCapabilities {
        permitted: CapabilityMask,
        effective: CapabilityMask,
    },
    SetScheduler(SchedulerClass),
    SetLabel(String),
    EnableDebugger,
}

/// Records every call in order; optionally fails one of them.
///
/// A failing call is still recorded, so tests can see exactly where the
/// sequence stopped.
pub struct FakeKernel {
    journal: Journal,
    seen: AtomicUsize,
    fail_at: Option<usize>,
    fail_on: Option<fn(&KernelCall) -> bool>,
    needs_workaround: bool,
    capabilities: Mutex<(CapabilityMask, CapabilityMask)>,
}

impl FakeKernel {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            seen: AtomicUsize::new(0),
            fail_at: None,
            fail_on: None,
            needs_workaround: false,
            capabilities: Mutex::new((CapabilityMask::EMPTY, CapabilityMask::EMPTY)),
        }
    }

    /// Fail the `index`-th kernel call (0-based).
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Fail every call matching `pred`.
    pub fn failing_on(mut self, pred: fn(&KernelCall) -> bool) -> Self {
        self.fail_on = Some(pred);
        self
    }

    /// Pretend to be an old 32-bit ARM kernel.
    pub fn with_layout_workaround(mut self) -> Self {
        self.needs_workaround = true;
        self
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// The (permitted, effective) pair last installed.
    pub fn capabilities(&self) -> (CapabilityMask, CapabilityMask) {
        match self.capabilities.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn call(&self, call: KernelCall) -> Result<()> {
        let index = self.seen.fetch_add(1, Ordering::SeqCst);
        let fail = self.fail_at == Some(index) || self.fail_on.is_some_and(|pred| pred(&call));
        let err = fail.then(|| injected_error(&call));
        self.journal.record(Call::Kernel(call));
        match err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn injected_error(call: &KernelCall) -> SpawnError {
    let msg = format!("injected failure at {:?}", call);
    match call {
        KernelCall::KeepCapabilities | KernelCall::SetCapabilities { .. } => {
            SpawnError::Capability(msg)
        }
        KernelCall::MountExternal { .. } => SpawnError::Mount(msg),
        KernelCall::SetRlimit(_) => SpawnError::ResourceLimit(msg),
        KernelCall::SetScheduler(_) => SpawnError::Scheduler(msg),
        KernelCall::SetLabel(_) => SpawnError::Label(msg),
        _ => SpawnError::Privilege(msg),
    }
}

impl KernelOps for FakeKernel {
    fn keep_capabilities(&self) -> Result<()> {
        self.call(KernelCall::KeepCapabilities)
    }

    fn mount_external_storage(
        &self,
        uid: u32,
        mode: MountExternal,
        _layout: &StorageLayout,
    ) -> Result<()> {
        self.call(KernelCall::MountExternal { uid, mode })
    }

    fn set_groups(&self, groups: &[u32]) -> Result<()> {
        self.call(KernelCall::SetGroups(groups.to_vec()))
    }

    fn set_rlimit(&self, limit: &ResourceLimit) -> Result<()> {
        self.call(KernelCall::SetRlimit(*limit))
    }

    fn set_gid(&self, gid: u32) -> Result<()> {
        self.call(KernelCall::SetGid(gid))
    }

    fn set_uid(&self, uid: u32) -> Result<()> {
        self.call(KernelCall::SetUid(uid))
    }

    fn verify_identity(&self, uid: u32, gid: u32) -> Result<()> {
        self.call(KernelCall::VerifyIdentity { uid, gid })
    }

    fn needs_no_randomize_workaround(&self) -> bool {
        self.needs_workaround
    }

    fn disable_address_randomization(&self) -> Result<()> {
        self.call(KernelCall::DisableAddressRandomization)
    }

    fn set_capabilities(&self, permitted: CapabilityMask, effective: CapabilityMask) -> Result<()> {
        self.call(KernelCall::SetCapabilities {
            permitted,
            effective,
        })?;
        let mut caps = match self.capabilities.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *caps = (permitted, effective);
        Ok(())
    }

    fn set_scheduler_class(&self, class: SchedulerClass) -> Result<()> {
        self.call(KernelCall::SetScheduler(class))
    }

    fn set_security_label(&self, label: &SecurityLabel) -> Result<()> {
        self.call(KernelCall::SetLabel(label.as_str().to_string()))
    }

    fn enable_debugger(&self) -> Result<()> {
        self.call(KernelCall::EnableDebugger)
    }
}
