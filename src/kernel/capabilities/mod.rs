//! Linux capability management for the specialized child.
//!
//! Capabilities are retained across the uid change (`PR_SET_KEEPCAPS`) and
//! then replaced wholesale with the profile's permitted/effective sets.

mod keep;
mod query;
mod set;

pub use keep::keep_capabilities;
pub use query::{current_capabilities, parse_status_capabilities, CapabilityState};
pub use set::set_capabilities;

/// Highest capability number the sets may name (CAP_CHECKPOINT_RESTORE).
pub const MAX_CAP: u32 = 40;

pub(crate) const PR_SET_KEEPCAPS: libc::c_int = 8;
pub(crate) const LINUX_CAPABILITY_VERSION_3: u32 = 0x20080522;

#[repr(C)]
pub(crate) struct CapUserHeader {
    pub(crate) version: u32,
    pub(crate) pid: i32,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
pub(crate) struct CapUserData {
    pub(crate) effective: u32,
    pub(crate) permitted: u32,
    pub(crate) inheritable: u32,
}
