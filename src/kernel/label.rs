//! Mandatory access control label derivation and application
//!
//! The label is derived from optional caller hints and the spawn role through
//! an ordered rule table, then written to the process's LSM attribute. This
//! must be the last security-relevant step of specialization.

use crate::config::types::{Result, SpawnError};
use crate::core::types::{LabelHints, SpawnRole};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

const SELINUX_MOUNT: &str = "/sys/fs/selinux";
const CURRENT_ATTR: &str = "/proc/thread-self/attr/current";

/// One selector -> domain mapping. Unset selectors match anything.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRule {
    #[serde(default)]
    pub seinfo: Option<String>,
    /// Matches process names starting with this prefix.
    #[serde(default)]
    pub name_prefix: Option<String>,
    pub domain: String,
}

impl LabelRule {
    fn matches(&self, hints: &LabelHints) -> bool {
        let seinfo_ok = match (&self.seinfo, &hints.seinfo) {
            (None, _) => true,
            (Some(want), Some(have)) => want == have,
            (Some(_), None) => false,
        };
        let name_ok = match (&self.name_prefix, &hints.name) {
            (None, _) => true,
            (Some(prefix), Some(name)) => name.starts_with(prefix.as_str()),
            (Some(_), None) => false,
        };
        seinfo_ok && name_ok
    }
}

/// How labels are derived for spawned children.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelPolicy {
    /// When false, labeling is skipped entirely.
    pub enabled: bool,
    pub user: String,
    pub role: String,
    pub level: String,
    pub singleton_domain: String,
    pub default_domain: String,
    #[serde(default)]
    pub rules: Vec<LabelRule>,
}

impl Default for LabelPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            user: "u".to_string(),
            role: "r".to_string(),
            level: "s0".to_string(),
            singleton_domain: "system_server".to_string(),
            default_domain: "untrusted_app".to_string(),
            rules: vec![
                LabelRule {
                    seinfo: Some("platform".to_string()),
                    name_prefix: None,
                    domain: "platform_app".to_string(),
                },
                LabelRule {
                    seinfo: Some("privileged".to_string()),
                    name_prefix: None,
                    domain: "priv_app".to_string(),
                },
            ],
        }
    }
}

impl LabelPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Derive the label for a child. Missing hints fall through to the default domain.
    pub fn derive(&self, role: SpawnRole, hints: &LabelHints) -> SecurityLabel {
        let domain = if role.is_singleton() {
            self.singleton_domain.as_str()
        } else {
            self.rules
                .iter()
                .find(|rule| rule.matches(hints))
                .map(|rule| rule.domain.as_str())
                .unwrap_or(self.default_domain.as_str())
        };
        SecurityLabel(format!("{}:{}:{}:{}", self.user, self.role, domain, self.level))
    }
}

/// A full security context string, e.g. `u:r:untrusted_app:s0`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecurityLabel(pub String);

impl SecurityLabel {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecurityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether an SELinux-style LSM is active on this host.
pub fn label_enforcement_available() -> bool {
    Path::new(SELINUX_MOUNT).join("enforce").exists()
}

/// Switch the calling thread to `label`. No-op without an active LSM.
pub fn apply_label(label: &SecurityLabel) -> Result<()> {
    if !label_enforcement_available() {
        log::debug!("No MAC enforcement on this host; not applying {}", label);
        return Ok(());
    }

    let mut attr = OpenOptions::new()
        .write(true)
        .open(CURRENT_ATTR)
        .map_err(|e| SpawnError::Label(format!("open {} failed: {}", CURRENT_ATTR, e)))?;
    attr.write_all(label.as_str().as_bytes())
        .map_err(|e| SpawnError::Label(format!("setcon({}) failed: {}", label, e)))?;

    log::info!("Security label set to {}", label);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hints(seinfo: Option<&str>, name: Option<&str>) -> LabelHints {
        LabelHints {
            seinfo: seinfo.map(str::to_string),
            name: name.map(str::to_string),
        }
    }

    #[test]
    fn singleton_gets_singleton_domain_regardless_of_hints() {
        let policy = LabelPolicy::default();
        let label = policy.derive(SpawnRole::Singleton, &hints(Some("platform"), None));
        assert_eq!(label.as_str(), "u:r:system_server:s0");
    }

    #[test]
    fn missing_hints_fall_back_to_default_domain() {
        let policy = LabelPolicy::default();
        let label = policy.derive(SpawnRole::Application, &LabelHints::default());
        assert_eq!(label.as_str(), "u:r:untrusted_app:s0");
    }

    #[test]
    fn seinfo_selects_rule() {
        let policy = LabelPolicy::default();
        let label = policy.derive(SpawnRole::Application, &hints(Some("platform"), Some("com.x")));
        assert_eq!(label.as_str(), "u:r:platform_app:s0");
    }

    #[test]
    fn first_matching_rule_wins() {
        let mut policy = LabelPolicy::default();
        policy.rules.insert(
            0,
            LabelRule {
                seinfo: None,
                name_prefix: Some("com.vendor.".to_string()),
                domain: "vendor_app".to_string(),
            },
        );
        let label =
            policy.derive(SpawnRole::Application, &hints(Some("platform"), Some("com.vendor.cam")));
        assert_eq!(label.as_str(), "u:r:vendor_app:s0");
        let label = policy.derive(SpawnRole::Application, &hints(Some("platform"), None));
        assert_eq!(label.as_str(), "u:r:platform_app:s0");
    }

    #[test]
    fn policy_round_trips_through_json() {
        let policy = LabelPolicy::default();
        let json = serde_json::to_string(&policy).unwrap();
        let back: LabelPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, policy);
    }
}
