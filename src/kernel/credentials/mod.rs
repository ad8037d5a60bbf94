//! Supplementary groups and UID/GID transitions.
//!
//! CRITICAL: setresgid MUST be called BEFORE setresuid.

mod transition;
mod validation;

pub use transition::{set_gid, set_supplementary_groups, set_uid, verify_identity};
pub use validation::{validate_groups, validate_ids};
