//! Thin wrappers around Linux privilege primitives.
//!
//! All `unsafe` code is concentrated here with explicit SAFETY comments.
//! The specialization sequence reaches the kernel only through [`KernelOps`],
//! so its ordering can be checked against a recording fake.

pub mod capabilities;
pub mod credentials;
pub mod debug;
pub mod host;
pub mod label;
pub mod mount;
pub mod personality;
pub mod rlimit;
pub mod sched;
pub mod signal;

use crate::config::types::Result;
use crate::core::types::{CapabilityMask, MountExternal, ResourceLimit};
use label::SecurityLabel;
use mount::StorageLayout;
use sched::SchedulerClass;

pub use host::HostKernel;

/// One fallible kernel operation per specialization step.
pub trait KernelOps: Send + Sync {
    fn keep_capabilities(&self) -> Result<()>;
    fn mount_external_storage(
        &self,
        uid: u32,
        mode: MountExternal,
        layout: &StorageLayout,
    ) -> Result<()>;
    fn set_groups(&self, groups: &[u32]) -> Result<()>;
    fn set_rlimit(&self, limit: &ResourceLimit) -> Result<()>;
    fn set_gid(&self, gid: u32) -> Result<()>;
    fn set_uid(&self, uid: u32) -> Result<()>;
    fn verify_identity(&self, uid: u32, gid: u32) -> Result<()>;
    fn needs_no_randomize_workaround(&self) -> bool;
    fn disable_address_randomization(&self) -> Result<()>;
    fn set_capabilities(&self, permitted: CapabilityMask, effective: CapabilityMask) -> Result<()>;
    fn set_scheduler_class(&self, class: SchedulerClass) -> Result<()>;
    fn set_security_label(&self, label: &SecurityLabel) -> Result<()>;
    fn enable_debugger(&self) -> Result<()>;
}
