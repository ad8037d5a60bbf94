//! Debugger attachability for spawned children.

use crate::config::types::{Result, SpawnError};
use crate::core::types::{ResourceKind, ResourceLimit};
use crate::kernel::rlimit::{apply_rlimit, current_rlimit};

/// Let an unprivileged debugger attach, without ever writing a core file.
///
/// Core size is capped at 0 before the process becomes dumpable, so
/// privileged memory inherited from the parent is never dumped to disk. The
/// hard limit is raised to unlimited when permitted, otherwise it is kept.
/// If the cap cannot be applied the process is left non-dumpable.
pub fn enable_debugger() -> Result<()> {
    cap_core_size()?;

    // SAFETY: prctl(PR_SET_DUMPABLE, 1) only flips the dumpable flag.
    if unsafe { libc::prctl(libc::PR_SET_DUMPABLE, 1, 0, 0, 0) } != 0 {
        let err = std::io::Error::last_os_error();
        return Err(SpawnError::Privilege(format!(
            "prctl(PR_SET_DUMPABLE) failed for pid {}: {}",
            std::process::id(),
            err
        )));
    }
    Ok(())
}

fn cap_core_size() -> Result<()> {
    let unlimited = ResourceLimit::new(ResourceKind::Core, 0, ResourceLimit::INFINITY);
    match apply_rlimit(&unlimited) {
        Ok(()) => Ok(()),
        Err(e) => {
            // Raising the hard limit needs CAP_SYS_RESOURCE.
            log::debug!("{}; keeping current hard core limit", e);
            let (_, hard) = current_rlimit(ResourceKind::Core)?;
            apply_rlimit(&ResourceLimit::new(ResourceKind::Core, 0, hard))
        }
    }
}
