/// Structured spawn audit events
///
/// Every spawn decision made in the parent is emitted as one JSON object on
/// the `warmfork::audit` log target, so operators can filter it separately
/// from diagnostics. Nothing here runs in the child or in signal context.
use crate::core::types::{SecurityProfile, SpawnRole};
use crate::kernel::label::SecurityLabel;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const AUDIT_TARGET: &str = "warmfork::audit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnEventType {
    /// Parent received a pid for a new child.
    Spawned,
    /// The request was refused before or at fork.
    Refused,
    /// The singleton died before its spawn completed.
    SingletonLost,
}

impl SpawnEventType {
    fn severity(self) -> log::Level {
        match self {
            SpawnEventType::Spawned => log::Level::Info,
            SpawnEventType::Refused => log::Level::Warn,
            SpawnEventType::SingletonLost => log::Level::Error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnEvent {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: SpawnEventType,
    pub role: SpawnRole,
    pub uid: u32,
    pub gid: u32,
    pub pid: Option<i32>,
    pub label: Option<String>,
    pub details: Option<String>,
    /// The spawning service's own pid.
    pub service_pid: u32,
}

impl SpawnEvent {
    pub fn new(event_type: SpawnEventType, role: SpawnRole, profile: &SecurityProfile) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            role,
            uid: profile.uid,
            gid: profile.gid,
            pid: None,
            label: None,
            details: None,
            service_pid: std::process::id(),
        }
    }

    pub fn with_pid(mut self, pid: i32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn with_label(mut self, label: &SecurityLabel) -> Self {
        self.label = Some(label.as_str().to_string());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({
                "event_type": self.event_type,
                "serialization_error": e.to_string(),
            })
            .to_string()
        })
    }

    pub fn emit(&self) {
        let line = self.to_json();
        match self.event_type.severity() {
            log::Level::Error => error!(target: AUDIT_TARGET, "{}", line),
            log::Level::Warn => warn!(target: AUDIT_TARGET, "{}", line),
            _ => info!(target: AUDIT_TARGET, "{}", line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_snake_case_type() {
        let profile = SecurityProfile::new(10_001, 10_001);
        let event = SpawnEvent::new(SpawnEventType::SingletonLost, SpawnRole::Singleton, &profile)
            .with_pid(4242)
            .with_details("exited before registration completed");

        let value: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(value["event_type"], "singleton_lost");
        assert_eq!(value["pid"], 4242);
        assert_eq!(value["uid"], 10_001);
        assert!(value["label"].is_null());
    }

    #[test]
    fn test_request_ids_are_unique() {
        let profile = SecurityProfile::new(1, 1);
        let a = SpawnEvent::new(SpawnEventType::Spawned, SpawnRole::Application, &profile);
        let b = SpawnEvent::new(SpawnEventType::Spawned, SpawnRole::Application, &profile);
        assert_ne!(a.request_id, b.request_id);
        assert!(Uuid::parse_str(&a.request_id).is_ok());
    }

    #[test]
    fn test_label_is_recorded() {
        let profile = SecurityProfile::new(1, 1);
        let label = SecurityLabel("u:r:untrusted_app:s0".to_string());
        let event =
            SpawnEvent::new(SpawnEventType::Spawned, SpawnRole::Application, &profile).with_label(&label);
        assert_eq!(event.label.as_deref(), Some("u:r:untrusted_app:s0"));
    }
}
