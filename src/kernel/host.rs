//! [`KernelOps`] backed by the running Linux kernel.

use super::label::SecurityLabel;
use super::mount::StorageLayout;
use super::sched::SchedulerClass;
use super::{capabilities, credentials, debug, label, mount, personality, rlimit, sched, KernelOps};
use crate::config::types::Result;
use crate::core::types::{CapabilityMask, MountExternal, ResourceLimit};

#[derive(Debug, Default, Clone, Copy)]
pub struct HostKernel;

impl KernelOps for HostKernel {
    fn keep_capabilities(&self) -> Result<()> {
        capabilities::keep_capabilities()
    }

    fn mount_external_storage(
        &self,
        uid: u32,
        mode: MountExternal,
        layout: &StorageLayout,
    ) -> Result<()> {
        mount::mount_external_storage(uid, mode, layout)
    }

    fn set_groups(&self, groups: &[u32]) -> Result<()> {
        credentials::validate_groups(groups)?;
        credentials::set_supplementary_groups(groups)
    }

    fn set_rlimit(&self, limit: &ResourceLimit) -> Result<()> {
        rlimit::apply_rlimit(limit)
    }

    fn set_gid(&self, gid: u32) -> Result<()> {
        credentials::set_gid(gid)
    }

    fn set_uid(&self, uid: u32) -> Result<()> {
        credentials::set_uid(uid)
    }

    fn verify_identity(&self, uid: u32, gid: u32) -> Result<()> {
        credentials::verify_identity(uid, gid)
    }

    fn needs_no_randomize_workaround(&self) -> bool {
        personality::host_needs_no_randomize_workaround()
    }

    fn disable_address_randomization(&self) -> Result<()> {
        personality::disable_address_randomization()
    }

    fn set_capabilities(&self, permitted: CapabilityMask, effective: CapabilityMask) -> Result<()> {
        capabilities::set_capabilities(permitted, effective)
    }

    fn set_scheduler_class(&self, class: SchedulerClass) -> Result<()> {
        sched::set_scheduler_class(class)
    }

    fn set_security_label(&self, label: &SecurityLabel) -> Result<()> {
        label::apply_label(label)
    }

    fn enable_debugger(&self) -> Result<()> {
        debug::enable_debugger()
    }
}
