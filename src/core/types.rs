use crate::config::types::SpawnError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Security profile for one spawn, supplied by the caller and read-only afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SecurityProfile {
    pub uid: u32,
    pub gid: u32,
    /// Supplementary groups. `None` and an empty list both leave groups unchanged.
    #[serde(default)]
    pub groups: Option<Vec<u32>>,
    /// Applied in order; the first failure aborts the child.
    #[serde(default)]
    pub rlimits: Vec<ResourceLimit>,
    #[serde(default)]
    pub permitted_capabilities: CapabilityMask,
    #[serde(default)]
    pub effective_capabilities: CapabilityMask,
    #[serde(default)]
    pub label: LabelHints,
    #[serde(default)]
    pub mount_external: MountExternal,
    #[serde(default)]
    pub debug_flags: DebugFlags,
}

impl SecurityProfile {
    /// Minimal profile: identity only, no groups, limits, capabilities or hints.
    pub fn new(uid: u32, gid: u32) -> Self {
        Self {
            uid,
            gid,
            groups: None,
            rlimits: Vec::new(),
            permitted_capabilities: CapabilityMask::EMPTY,
            effective_capabilities: CapabilityMask::EMPTY,
            label: LabelHints::default(),
            mount_external: MountExternal::None,
            debug_flags: DebugFlags::NONE,
        }
    }

    pub fn with_groups(mut self, groups: Vec<u32>) -> Self {
        self.groups = Some(groups);
        self
    }

    pub fn with_rlimit(mut self, limit: ResourceLimit) -> Self {
        self.rlimits.push(limit);
        self
    }

    pub fn with_capabilities(mut self, permitted: CapabilityMask, effective: CapabilityMask) -> Self {
        self.permitted_capabilities = permitted;
        self.effective_capabilities = effective;
        self
    }

    pub fn with_label(mut self, seinfo: Option<&str>, name: Option<&str>) -> Self {
        self.label = LabelHints {
            seinfo: seinfo.map(str::to_string),
            name: name.map(str::to_string),
        };
        self
    }

    pub fn with_mount_external(mut self, mode: MountExternal) -> Self {
        self.mount_external = mode;
        self
    }

    pub fn with_debug_flags(mut self, flags: DebugFlags) -> Self {
        self.debug_flags = flags;
        self
    }

    /// Groups that must actually be applied, if any.
    pub fn effective_groups(&self) -> Option<&[u32]> {
        match self.groups.as_deref() {
            Some(groups) if !groups.is_empty() => Some(groups),
            _ => None,
        }
    }
}

/// Which spawn variant produced the child.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpawnRole {
    #[serde(rename = "application")]
    Application,
    #[serde(rename = "singleton")]
    Singleton,
}

impl SpawnRole {
    pub fn is_singleton(self) -> bool {
        matches!(self, SpawnRole::Singleton)
    }
}

impl fmt::Display for SpawnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnRole::Application => write!(f, "application"),
            SpawnRole::Singleton => write!(f, "singleton"),
        }
    }
}

/// Resource kinds accepted in a profile. Closed set mirroring setrlimit(2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Cpu,
    Fsize,
    Data,
    Stack,
    Core,
    Rss,
    Nproc,
    Nofile,
    Memlock,
    As,
    Locks,
    Sigpending,
    Msgqueue,
    Nice,
    Rtprio,
    Rttime,
}

impl ResourceKind {
    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Cpu => "RLIMIT_CPU",
            ResourceKind::Fsize => "RLIMIT_FSIZE",
            ResourceKind::Data => "RLIMIT_DATA",
            ResourceKind::Stack => "RLIMIT_STACK",
            ResourceKind::Core => "RLIMIT_CORE",
            ResourceKind::Rss => "RLIMIT_RSS",
            ResourceKind::Nproc => "RLIMIT_NPROC",
            ResourceKind::Nofile => "RLIMIT_NOFILE",
            ResourceKind::Memlock => "RLIMIT_MEMLOCK",
            ResourceKind::As => "RLIMIT_AS",
            ResourceKind::Locks => "RLIMIT_LOCKS",
            ResourceKind::Sigpending => "RLIMIT_SIGPENDING",
            ResourceKind::Msgqueue => "RLIMIT_MSGQUEUE",
            ResourceKind::Nice => "RLIMIT_NICE",
            ResourceKind::Rtprio => "RLIMIT_RTPRIO",
            ResourceKind::Rttime => "RLIMIT_RTTIME",
        }
    }

    pub fn as_raw(self) -> libc::__rlimit_resource_t {
        match self {
            ResourceKind::Cpu => libc::RLIMIT_CPU,
            ResourceKind::Fsize => libc::RLIMIT_FSIZE,
            ResourceKind::Data => libc::RLIMIT_DATA,
            ResourceKind::Stack => libc::RLIMIT_STACK,
            ResourceKind::Core => libc::RLIMIT_CORE,
            ResourceKind::Rss => libc::RLIMIT_RSS,
            ResourceKind::Nproc => libc::RLIMIT_NPROC,
            ResourceKind::Nofile => libc::RLIMIT_NOFILE,
            ResourceKind::Memlock => libc::RLIMIT_MEMLOCK,
            ResourceKind::As => libc::RLIMIT_AS,
            ResourceKind::Locks => libc::RLIMIT_LOCKS,
            ResourceKind::Sigpending => libc::RLIMIT_SIGPENDING,
            ResourceKind::Msgqueue => libc::RLIMIT_MSGQUEUE,
            ResourceKind::Nice => libc::RLIMIT_NICE,
            ResourceKind::Rtprio => libc::RLIMIT_RTPRIO,
            ResourceKind::Rttime => libc::RLIMIT_RTTIME,
        }
    }
}

/// One `(resource, soft, hard)` triple. `u64::MAX` means unlimited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimit {
    pub resource: ResourceKind,
    pub soft: u64,
    pub hard: u64,
}

impl ResourceLimit {
    pub const INFINITY: u64 = u64::MAX;

    pub fn new(resource: ResourceKind, soft: u64, hard: u64) -> Self {
        Self { resource, soft, hard }
    }
}

impl fmt::Display for ResourceLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={{{}, {}}}", self.resource.name(), self.soft, self.hard)
    }
}

/// 64-bit capability bitmask (bit N = capability number N).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityMask(pub u64);

impl CapabilityMask {
    pub const EMPTY: CapabilityMask = CapabilityMask(0);

    pub fn from_caps(caps: &[u32]) -> Self {
        Self(caps.iter().filter(|&&cap| cap < 64).fold(0u64, |acc, &cap| acc | (1u64 << cap)))
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn contains(self, cap: u32) -> bool {
        cap < 64 && self.0 & (1u64 << cap) != 0
    }

    pub fn is_subset_of(self, other: CapabilityMask) -> bool {
        self.0 & !other.0 == 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Lower 32 bits (capability data entry 0).
    pub fn low(self) -> u32 {
        self.0 as u32
    }

    /// Upper 32 bits (capability data entry 1).
    pub fn high(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub fn from_halves(low: u32, high: u32) -> Self {
        Self(((high as u64) << 32) | low as u64)
    }
}

impl fmt::Display for CapabilityMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Caller-supplied hints used to derive the MAC label. Both are optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelHints {
    #[serde(default)]
    pub seinfo: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// External storage mount mode. Serialized as its integer value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum MountExternal {
    #[default]
    None,
    SingleUser,
    MultiUser,
}

impl TryFrom<i32> for MountExternal {
    type Error = SpawnError;

    fn try_from(value: i32) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(MountExternal::None),
            1 => Ok(MountExternal::SingleUser),
            2 => Ok(MountExternal::MultiUser),
            other => Err(SpawnError::Mount(format!("Mount mode unsupported: {}", other))),
        }
    }
}

impl From<MountExternal> for i32 {
    fn from(mode: MountExternal) -> i32 {
        match mode {
            MountExternal::None => 0,
            MountExternal::SingleUser => 1,
            MountExternal::MultiUser => 2,
        }
    }
}

/// Debug toggles requested for the child.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DebugFlags(pub u32);

impl DebugFlags {
    pub const NONE: DebugFlags = DebugFlags(0);
    pub const ENABLE_DEBUGGER: u32 = 1;
    pub const ENABLE_CHECKED_NATIVE_CALLS: u32 = 1 << 1;
    /// Accepted for compatibility; has no effect.
    pub const ENABLE_ASSERT: u32 = 1 << 2;
    /// Accepted for compatibility; has no effect.
    pub const ENABLE_SAFEMODE: u32 = 1 << 3;
    pub const ENABLE_NATIVE_CALL_LOGGING: u32 = 1 << 4;

    pub const KNOWN: u32 = Self::ENABLE_DEBUGGER
        | Self::ENABLE_CHECKED_NATIVE_CALLS
        | Self::ENABLE_ASSERT
        | Self::ENABLE_SAFEMODE
        | Self::ENABLE_NATIVE_CALL_LOGGING;
    pub const LEGACY: u32 = Self::ENABLE_ASSERT | Self::ENABLE_SAFEMODE;

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn has(self, bit: u32) -> bool {
        self.0 & bit != 0
    }

    pub fn unknown_bits(self) -> u32 {
        self.0 & !Self::KNOWN
    }
}

/// How a reaped child terminated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitKind {
    Exited(i32),
    Signaled { signal: i32, core_dumped: bool },
}

/// A reaped child and its classified status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChildExit {
    pub pid: i32,
    pub kind: ExitKind,
}

impl ChildExit {
    /// Whether this termination deserves a diagnostic line.
    /// Clean zero exits and SIGKILL terminations are routine.
    pub fn is_noteworthy(&self) -> bool {
        match self.kind {
            ExitKind::Exited(code) => code != 0,
            ExitKind::Signaled { signal, core_dumped } => {
                signal != libc::SIGKILL || core_dumped
            }
        }
    }
}

/// A spawn request as read by the CLI front end.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub profile: SecurityProfile,
    /// Program the child execs once specialized.
    pub command: Vec<String>,
}
