use super::PR_SET_KEEPCAPS;
use crate::config::types::{Result, SpawnError};

/// Keep the permitted set across a non-zero setuid.
///
/// Without this the uid change clears every capability before the profile's
/// sets can be installed.
pub fn keep_capabilities() -> Result<()> {
    // SAFETY: prctl(PR_SET_KEEPCAPS, 1) only flips a per-thread flag.
    let rc = unsafe { libc::prctl(PR_SET_KEEPCAPS, 1, 0, 0, 0) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        return Err(SpawnError::Capability(format!(
            "prctl(PR_SET_KEEPCAPS) failed: {}",
            err
        )));
    }
    log::debug!("Set PR_SET_KEEPCAPS");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_capabilities_is_unprivileged_and_idempotent() {
        assert!(keep_capabilities().is_ok());
        assert!(keep_capabilities().is_ok());
    }
}
