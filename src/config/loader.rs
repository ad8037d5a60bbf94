use crate::config::types::{Result, SpawnError};
use crate::core::types::{SecurityProfile, SpawnRequest};
use crate::kernel::label::LabelPolicy;
use crate::kernel::mount::StorageLayout;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Service-wide configuration, read once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Interpreter for `warmforkd exec-shell` unless `--shell` is given.
    pub shell: PathBuf,
    pub storage: StorageLayout,
    pub labels: LabelPolicy,
    /// Spawned once at startup; its death takes the service down.
    pub singleton: Option<SpawnRequest>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
            storage: StorageLayout::default(),
            labels: LabelPolicy::default(),
            singleton: None,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            SpawnError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        serde_json::from_str(&content)
            .map_err(|e| SpawnError::Config(format!("Failed to parse config JSON: {}", e)))
    }
}

/// Load a single profile document, as used by `warmforkd check`.
pub fn load_profile<P: AsRef<Path>>(path: P) -> Result<SecurityProfile> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        SpawnError::Config(format!(
            "Failed to read profile {}: {}",
            path.as_ref().display(),
            e
        ))
    })?;

    serde_json::from_str(&content)
        .map_err(|e| SpawnError::Config(format!("Failed to parse profile JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::MountExternal;
    use std::io::Write;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config: ServiceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "shell": "/system/bin/sh",
                "storage": {{ "system_path": "/mnt/shared", "app_path": "/mnt/self", "per_user_range": 100000 }},
                "singleton": {{
                    "profile": {{ "uid": 1000, "gid": 1000, "groups": [1001, 1002] }},
                    "command": ["/usr/bin/system-server"]
                }}
            }}"#
        )
        .unwrap();

        let config = ServiceConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.shell, PathBuf::from("/system/bin/sh"));
        assert_eq!(config.storage.system_path, PathBuf::from("/mnt/shared"));
        let singleton = config.singleton.unwrap();
        assert_eq!(singleton.profile.groups, Some(vec![1001, 1002]));
        assert_eq!(singleton.command, vec!["/usr/bin/system-server".to_string()]);
        assert!(config.labels.enabled);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = ServiceConfig::load_from_file("/nonexistent/warmfork.json").unwrap_err();
        assert!(matches!(err, SpawnError::Config(_)));
    }

    #[test]
    fn test_profile_with_unknown_mount_mode_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "uid": 1, "gid": 1, "mount_external": 7 }}"#).unwrap();
        let err = load_profile(file.path()).unwrap_err();
        assert!(err.to_string().contains("Mount mode unsupported"));
    }

    #[test]
    fn test_profile_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "uid": 10001, "gid": 10001, "mount_external": 2 }}"#).unwrap();
        let profile = load_profile(file.path()).unwrap();
        assert_eq!(profile.mount_external, MountExternal::MultiUser);
        assert!(profile.rlimits.is_empty());
    }
}
