//! setrlimit(2) wrapper for profile limits.

use crate::config::types::{Result, SpawnError};
use crate::core::types::{ResourceKind, ResourceLimit};

fn to_rlim(value: u64) -> libc::rlim_t {
    if value == ResourceLimit::INFINITY {
        libc::RLIM_INFINITY
    } else {
        value as libc::rlim_t
    }
}

pub fn apply_rlimit(limit: &ResourceLimit) -> Result<()> {
    let rlim = libc::rlimit {
        rlim_cur: to_rlim(limit.soft),
        rlim_max: to_rlim(limit.hard),
    };

    // SAFETY: setrlimit only reads the provided struct.
    let rc = unsafe { libc::setrlimit(limit.resource.as_raw(), &rlim) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        return Err(SpawnError::ResourceLimit(format!("setrlimit({}) failed: {}", limit, err)));
    }
    log::debug!("Applied {}", limit);
    Ok(())
}

/// Apply limits in order, stopping at the first failure.
pub fn apply_rlimits(limits: &[ResourceLimit]) -> Result<()> {
    for limit in limits {
        apply_rlimit(limit)?;
    }
    Ok(())
}

/// Current `(soft, hard)` for `resource`, with `RLIM_INFINITY` as `u64::MAX`.
pub fn current_rlimit(resource: ResourceKind) -> Result<(u64, u64)> {
    let mut rlim = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: getrlimit writes into the provided struct.
    let rc = unsafe { libc::getrlimit(resource.as_raw(), &mut rlim) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        return Err(SpawnError::ResourceLimit(format!(
            "getrlimit({}) failed: {}",
            resource.name(),
            err
        )));
    }
    let from_rlim = |v: libc::rlim_t| {
        if v == libc::RLIM_INFINITY {
            ResourceLimit::INFINITY
        } else {
            v as u64
        }
    };
    Ok((from_rlim(rlim.rlim_cur), from_rlim(rlim.rlim_max)))
}
