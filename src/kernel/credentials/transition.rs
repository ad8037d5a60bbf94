//! UID/GID transitions for a freshly forked child.
//!
//! CRITICAL: setresgid MUST be called BEFORE setresuid. Once the uid is
//! unprivileged the process can no longer change its gid.

use crate::config::types::{Result, SpawnError};
use nix::unistd::{getegid, geteuid, getgid, getuid, setgroups, Gid};

/// Replace the supplementary group list. Requires CAP_SETGID.
pub fn set_supplementary_groups(groups: &[u32]) -> Result<()> {
    let gids: Vec<Gid> = groups.iter().map(|&g| Gid::from_raw(g)).collect();
    setgroups(&gids)
        .map_err(|e| SpawnError::Privilege(format!("setgroups({:?}) failed: {}", groups, e)))?;
    log::debug!("Set {} supplementary groups", groups.len());
    Ok(())
}

/// MUST be called BEFORE set_uid.
pub fn set_gid(gid: u32) -> Result<()> {
    // SAFETY: setresgid atomically sets real, effective and saved GIDs.
    let result =
        unsafe { libc::setresgid(gid as libc::gid_t, gid as libc::gid_t, gid as libc::gid_t) };
    if result != 0 {
        let err = std::io::Error::last_os_error();
        return Err(SpawnError::Privilege(format!("setresgid({}) failed: {}", gid, err)));
    }
    Ok(())
}

/// MUST be called AFTER set_gid.
pub fn set_uid(uid: u32) -> Result<()> {
    // SAFETY: setresuid atomically sets real, effective and saved UIDs.
    let result =
        unsafe { libc::setresuid(uid as libc::uid_t, uid as libc::uid_t, uid as libc::uid_t) };
    if result != 0 {
        let err = std::io::Error::last_os_error();
        return Err(SpawnError::Privilege(format!("setresuid({}) failed: {}", uid, err)));
    }
    Ok(())
}

pub fn verify_identity(expected_uid: u32, expected_gid: u32) -> Result<()> {
    let real_uid = getuid().as_raw();
    let effective_uid = geteuid().as_raw();
    let real_gid = getgid().as_raw();
    let effective_gid = getegid().as_raw();

    if real_uid != expected_uid || effective_uid != expected_uid {
        return Err(SpawnError::Privilege(format!(
            "UID verification failed: expected {}, got real={}, effective={}",
            expected_uid, real_uid, effective_uid
        )));
    }

    if real_gid != expected_gid || effective_gid != expected_gid {
        return Err(SpawnError::Privilege(format!(
            "GID verification failed: expected {}, got real={}, effective={}",
            expected_gid, real_gid, effective_gid
        )));
    }

    Ok(())
}
