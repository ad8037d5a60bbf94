//! Address-space randomization workaround for old 32-bit ARM kernels.

use crate::config::types::{Result, SpawnError};

const ADDR_NO_RANDOMIZE: libc::c_ulong = 0x0040000;
const PERSONALITY_QUERY: libc::c_ulong = 0xffff_ffff;

/// Kernels before 3.4 on 32-bit ARM need randomization disabled.
pub fn needs_no_randomize_workaround(arch: &str, release: &str) -> bool {
    if arch != "arm" {
        return false;
    }
    let mut parts = release.split(|c: char| !c.is_ascii_digit());
    let major = parts.next().and_then(|p| p.parse::<u32>().ok());
    let minor = parts.next().and_then(|p| p.parse::<u32>().ok());
    match (major, minor) {
        (Some(major), Some(minor)) => major < 3 || (major == 3 && minor < 4),
        _ => false,
    }
}

/// Whether the running kernel needs the workaround.
pub fn host_needs_no_randomize_workaround() -> bool {
    let Ok(uts) = nix::sys::utsname::uname() else {
        return false;
    };
    let release = uts.release().to_string_lossy();
    needs_no_randomize_workaround(std::env::consts::ARCH, &release)
}

/// Add `ADDR_NO_RANDOMIZE` to the current personality.
pub fn disable_address_randomization() -> Result<()> {
    // SAFETY: personality(0xffffffff) only queries the current persona.
    let current = unsafe { libc::personality(PERSONALITY_QUERY) };
    if current == -1 {
        let err = std::io::Error::last_os_error();
        return Err(SpawnError::Privilege(format!("personality query failed: {}", err)));
    }
    let wanted = current as libc::c_ulong | ADDR_NO_RANDOMIZE;
    // SAFETY: sets a persona flag for this process.
    if unsafe { libc::personality(wanted) } == -1 {
        let err = std::io::Error::last_os_error();
        return Err(SpawnError::Privilege(format!(
            "personality({:#x}) failed: {}",
            wanted, err
        )));
    }
    log::info!("Disabled address space randomization ({:#x})", wanted);
    Ok(())
}
