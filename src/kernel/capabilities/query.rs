//! Capability inspection via `/proc/self/status`.

use crate::config::types::{Result, SpawnError};
use crate::core::types::CapabilityMask;
use std::fs;

/// Capability sets as reported by the kernel for the calling process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilityState {
    pub inheritable: CapabilityMask,
    pub permitted: CapabilityMask,
    pub effective: CapabilityMask,
    pub bounding: CapabilityMask,
}

pub fn current_capabilities() -> Result<CapabilityState> {
    let status = fs::read_to_string("/proc/self/status")
        .map_err(|e| SpawnError::Capability(format!("Cannot read /proc/self/status: {}", e)))?;
    parse_status_capabilities(&status)
}

/// Parse the `Cap*:` lines of a `/proc/<pid>/status` document.
pub fn parse_status_capabilities(status: &str) -> Result<CapabilityState> {
    let mut state = CapabilityState::default();
    let mut seen = 0u8;

    for line in status.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let slot = match key {
            "CapInh" => &mut state.inheritable,
            "CapPrm" => &mut state.permitted,
            "CapEff" => &mut state.effective,
            "CapBnd" => &mut state.bounding,
            _ => continue,
        };
        let bits = u64::from_str_radix(value.trim(), 16).map_err(|e| {
            SpawnError::Capability(format!("Malformed {} value {:?}: {}", key, value.trim(), e))
        })?;
        *slot = CapabilityMask(bits);
        seen += 1;
    }

    if seen < 4 {
        return Err(SpawnError::Capability(
            "status is missing capability lines".to_string(),
        ));
    }
    Ok(state)
}
