use super::{CapUserData, CapUserHeader, LINUX_CAPABILITY_VERSION_3};
use crate::config::types::{Result, SpawnError};
use crate::core::types::CapabilityMask;

/// Install exactly `permitted` and `effective`; inheritable is cleared.
///
/// Reads the sets back and fails unless they match bit for bit.
pub fn set_capabilities(permitted: CapabilityMask, effective: CapabilityMask) -> Result<()> {
    let header = CapUserHeader {
        version: LINUX_CAPABILITY_VERSION_3,
        pid: 0,
    };

    // Version 3 requires two data entries: caps 0-31 and caps 32-63.
    let data = [
        CapUserData {
            effective: effective.low(),
            permitted: permitted.low(),
            inheritable: 0,
        },
        CapUserData {
            effective: effective.high(),
            permitted: permitted.high(),
            inheritable: 0,
        },
    ];

    // SAFETY: capset(2) with a version 3 header (pid 0 = calling thread) and
    // two initialized data entries.
    let rc = unsafe {
        libc::syscall(
            libc::SYS_capset,
            &header as *const CapUserHeader,
            data.as_ptr(),
        )
    };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        return Err(SpawnError::Capability(format!(
            "capset(permitted={}, effective={}) failed: {}",
            permitted, effective, err
        )));
    }

    let (actual_permitted, actual_effective) = read_capabilities()?;
    if actual_permitted != permitted || actual_effective != effective {
        return Err(SpawnError::Capability(format!(
            "capability verification failed: wanted permitted={} effective={}, got permitted={} effective={}",
            permitted, effective, actual_permitted, actual_effective
        )));
    }

    log::info!(
        "Installed capabilities permitted={} effective={}",
        permitted,
        effective
    );
    Ok(())
}

/// capget(2) for the calling thread: `(permitted, effective)`.
pub(crate) fn read_capabilities() -> Result<(CapabilityMask, CapabilityMask)> {
    let mut header = CapUserHeader {
        version: LINUX_CAPABILITY_VERSION_3,
        pid: 0,
    };
    let mut data = [CapUserData::default(); 2];

    // SAFETY: capget(2) writes at most two data entries for version 3.
    let rc = unsafe {
        libc::syscall(
            libc::SYS_capget,
            &mut header as *mut CapUserHeader,
            data.as_mut_ptr(),
        )
    };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        return Err(SpawnError::Capability(format!("capget failed: {}", err)));
    }

    Ok((
        CapabilityMask::from_halves(data[0].permitted, data[1].permitted),
        CapabilityMask::from_halves(data[0].effective, data[1].effective),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::capabilities::MAX_CAP;

    #[test]
    fn read_capabilities_reports_effective_within_permitted() {
        let (permitted, effective) = read_capabilities().unwrap();
        assert!(effective.is_subset_of(permitted));
    }

    #[test]
    fn raising_beyond_permitted_is_refused() {
        let (permitted, _) = read_capabilities().unwrap();
        // A bit outside the permitted set can never be granted by capset.
        let Some(missing) =
            (0..=MAX_CAP).find(|&cap| !permitted.contains(cap))
        else {
            return;
        };
        let wanted = CapabilityMask(permitted.bits() | (1u64 << missing));
        assert!(set_capabilities(wanted, CapabilityMask::EMPTY).is_err());
    }
}
