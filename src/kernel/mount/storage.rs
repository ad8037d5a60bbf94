/// External storage mount for a specialized child
///
/// Every non-trivial mode gets a private mount namespace whose root follows
/// the parent as a slave, plus one bind mount chosen by the target identity.
use crate::config::types::{Result, SpawnError};
use crate::core::types::MountExternal;
use nix::mount::{mount, MsFlags};
use nix::sched::{unshare, CloneFlags};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where shared storage lives on the host and where children see it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLayout {
    /// Host-side storage root. Multi-user mode binds `<system_path>/<user_id>`.
    pub system_path: PathBuf,
    /// Mount point inside the child's namespace.
    pub app_path: PathBuf,
    /// Size of the uid range owned by one user; `user_id = uid / per_user_range`.
    pub per_user_range: u32,
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self {
            system_path: PathBuf::from("/storage/shared"),
            app_path: PathBuf::from("/storage/self"),
            per_user_range: 100_000,
        }
    }
}

impl StorageLayout {
    pub fn user_id(&self, uid: u32) -> u32 {
        if self.per_user_range == 0 {
            return 0;
        }
        uid / self.per_user_range
    }

    /// Bind source for `mode`, or `None` when nothing is mounted.
    pub fn bind_source(&self, uid: u32, mode: MountExternal) -> Option<PathBuf> {
        match mode {
            MountExternal::None => None,
            MountExternal::SingleUser => Some(self.system_path.clone()),
            MountExternal::MultiUser => {
                Some(self.system_path.join(self.user_id(uid).to_string()))
            }
        }
    }
}

/// Set up the child's storage view. A no-op for `MountExternal::None`.
pub fn mount_external_storage(uid: u32, mode: MountExternal, layout: &StorageLayout) -> Result<()> {
    let Some(source) = layout.bind_source(uid, mode) else {
        return Ok(());
    };

    unshare(CloneFlags::CLONE_NEWNS)
        .map_err(|e| SpawnError::Mount(format!("unshare(CLONE_NEWNS) failed: {}", e)))?;

    // Changes in the parent namespace keep flowing into the child, never back.
    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_SLAVE | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| SpawnError::Mount(format!("remount / as MS_SLAVE|MS_REC failed: {}", e)))?;

    bind(&source, &layout.app_path)?;

    log::info!(
        "Mounted external storage {} -> {} ({:?})",
        source.display(),
        layout.app_path.display(),
        mode
    );
    Ok(())
}

fn bind(source: &Path, target: &Path) -> Result<()> {
    mount(
        Some(source),
        target,
        None::<&str>,
        MsFlags::MS_BIND,
        None::<&str>,
    )
    .map_err(|e| {
        SpawnError::Mount(format!(
            "bind mount {} -> {} failed: {}",
            source.display(),
            target.display(),
            e
        ))
    })
}
