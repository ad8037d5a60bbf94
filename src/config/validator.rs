// Profile and service config validation
// Runs in the parent before fork: anything rejected here is refused to the
// caller instead of killing a half-specialized child.

use crate::config::loader::ServiceConfig;
use crate::config::types::{Result, SpawnError};
use crate::core::types::{DebugFlags, MountExternal, SecurityProfile};
use crate::kernel::capabilities::MAX_CAP;
use crate::kernel::credentials::{validate_groups, validate_ids};

/// Kernel limit on supplementary groups (NGROUPS_MAX).
pub const MAX_SUPPLEMENTARY_GROUPS: usize = 65536;

/// Validation result with detailed errors
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Turn accumulated errors into a refusal.
    pub fn into_result(self) -> Result<ValidationResult> {
        if self.valid {
            return Ok(self);
        }
        Err(SpawnError::Config(format!(
            "Profile validation failed:\n{}",
            self.errors.join("\n")
        )))
    }
}

/// Check a profile before any fork happens.
pub fn validate_profile(profile: &SecurityProfile) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_identity(profile, &mut result);
    validate_limits(profile, &mut result);
    validate_capabilities(profile, &mut result);
    validate_debug_flags(profile, &mut result);

    result
}

fn validate_identity(profile: &SecurityProfile, result: &mut ValidationResult) {
    if let Err(e) = validate_ids(profile.uid, profile.gid) {
        result.add_error(e.to_string());
    }

    if let Some(groups) = &profile.groups {
        if groups.len() > MAX_SUPPLEMENTARY_GROUPS {
            result.add_error(format!(
                "{} supplementary groups exceed the kernel limit of {}",
                groups.len(),
                MAX_SUPPLEMENTARY_GROUPS
            ));
        }
        if let Err(e) = validate_groups(groups) {
            result.add_error(e.to_string());
        }
    }

    if profile.uid == 0 {
        result.add_warning("Child keeps uid 0".to_string());
    }
}

fn validate_limits(profile: &SecurityProfile, result: &mut ValidationResult) {
    for limit in &profile.rlimits {
        if limit.soft > limit.hard {
            result.add_error(format!(
                "{}: soft limit exceeds hard limit",
                limit
            ));
        }
    }
}

fn validate_capabilities(profile: &SecurityProfile, result: &mut ValidationResult) {
    let permitted = profile.permitted_capabilities;
    let effective = profile.effective_capabilities;

    if !effective.is_subset_of(permitted) {
        result.add_error(format!(
            "effective capabilities {} are not a subset of permitted {}",
            effective, permitted
        ));
    }

    let highest_known = MAX_CAP;
    for cap in (highest_known + 1)..64 {
        if permitted.contains(cap) {
            result.add_error(format!("unknown capability {} requested", cap));
        }
    }
}

fn validate_debug_flags(profile: &SecurityProfile, result: &mut ValidationResult) {
    let unknown = profile.debug_flags.unknown_bits();
    if unknown != 0 {
        result.add_warning(format!("unknown debug flags {:#x} will be ignored", unknown));
    }
    let legacy = profile.debug_flags.bits() & DebugFlags::LEGACY;
    if legacy != 0 {
        result.add_warning(format!("legacy debug flags {:#x} have no effect", legacy));
    }
}

/// Check a loaded service config.
pub fn validate_service_config(config: &ServiceConfig) -> ValidationResult {
    let mut result = ValidationResult::new();

    if !config.shell.is_absolute() {
        result.add_error(format!("shell {} must be an absolute path", config.shell.display()));
    }

    let storage = &config.storage;
    if storage.per_user_range == 0 {
        result.add_error("storage.per_user_range cannot be zero".to_string());
    }
    if !storage.app_path.is_absolute() || !storage.system_path.is_absolute() {
        result.add_error("storage paths must be absolute".to_string());
    }

    if config.labels.enabled && config.labels.default_domain.is_empty() {
        result.add_error("labels.default_domain cannot be empty".to_string());
    }

    if let Some(singleton) = &config.singleton {
        let profile_result = validate_profile(&singleton.profile);
        for error in profile_result.errors {
            result.add_error(format!("singleton: {}", error));
        }
        for warning in profile_result.warnings {
            result.add_warning(format!("singleton: {}", warning));
        }
        if singleton.command.is_empty() {
            result.add_error("singleton.command cannot be empty".to_string());
        }
        if singleton.profile.mount_external != MountExternal::None
            && !storage.system_path.exists()
        {
            result.add_warning(format!(
                "singleton mounts storage but {} does not exist",
                storage.system_path.display()
            ));
        }
    }

    result
}
