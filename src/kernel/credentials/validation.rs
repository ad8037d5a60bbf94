//! Credential validation logic.

use crate::config::types::{Result, SpawnError};

/// `(uid_t)-1` / `(gid_t)-1` mean "leave unchanged" to setres[ug]id and
/// would silently skip the transition, so they are never valid targets.
pub fn validate_ids(uid: u32, gid: u32) -> Result<()> {
    if uid == u32::MAX || gid == u32::MAX {
        return Err(SpawnError::Privilege(format!(
            "Refusing sentinel identity (uid={}, gid={})",
            uid, gid
        )));
    }
    Ok(())
}

/// Reject sentinel values in a supplementary group list.
pub fn validate_groups(groups: &[u32]) -> Result<()> {
    if let Some(bad) = groups.iter().find(|&&g| g == u32::MAX) {
        return Err(SpawnError::Privilege(format!(
            "Refusing sentinel supplementary group {}",
            bad
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_ids_rejects_sentinel_uid() {
        assert!(validate_ids(u32::MAX, 1000).is_err());
    }

    #[test]
    fn validate_ids_rejects_sentinel_gid() {
        assert!(validate_ids(1000, u32::MAX).is_err());
    }

    #[test]
    fn validate_ids_accepts_root_and_app_ids() {
        assert!(validate_ids(0, 0).is_ok());
        assert!(validate_ids(10057, 10057).is_ok());
    }

    #[test]
    fn validate_groups_rejects_sentinel() {
        assert!(validate_groups(&[1015, u32::MAX]).is_err());
        assert!(validate_groups(&[1015, 3003]).is_ok());
    }
}
