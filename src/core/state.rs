//! Process-scoped spawn bookkeeping.
//!
//! Written by the spawner's parent path, read by the SIGCHLD handler.
//! Every field is a lock-free atomic so it can be read from signal context.

use crate::config::types::{Result, SpawnError};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

static PROCESS_STATE: ProcessState = ProcessState::new();

/// Slot value while a singleton spawn is between its checks and its fork.
const RESERVED: i32 = -1;

/// Singleton registry, termination latch and diagnostic markers.
pub struct ProcessState {
    /// 0 = no singleton, -1 = reserved by an in-flight spawn.
    singleton_pid: AtomicI32,
    terminating: AtomicBool,
    /// Set in a child right after fork; never set in the spawning service.
    /// A spawned child refuses to spawn further children.
    spawned_child: AtomicBool,
    /// Set in a child when its debug flags made it attachable.
    traceable: AtomicBool,
}

impl ProcessState {
    pub const fn new() -> Self {
        Self {
            singleton_pid: AtomicI32::new(0),
            terminating: AtomicBool::new(false),
            spawned_child: AtomicBool::new(false),
            traceable: AtomicBool::new(false),
        }
    }

    /// The state shared by the spawner and the installed reaper.
    pub fn global() -> &'static ProcessState {
        &PROCESS_STATE
    }

    /// Claim the singleton slot ahead of a fork. Fails if a singleton is
    /// registered or another singleton spawn holds the slot.
    pub fn reserve_singleton(&self) -> Result<()> {
        self.singleton_pid
            .compare_exchange(0, RESERVED, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|current| match current {
                RESERVED => SpawnError::Registry("singleton spawn already in progress".to_string()),
                pid => SpawnError::Registry(format!("singleton already running as pid {}", pid)),
            })
    }

    /// Fill a reserved slot with the forked pid.
    pub fn commit_singleton(&self, pid: i32) -> Result<()> {
        if pid <= 0 {
            return Err(SpawnError::Registry(format!("invalid singleton pid {}", pid)));
        }
        self.singleton_pid
            .compare_exchange(RESERVED, pid, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|current| {
                SpawnError::Registry(format!(
                    "singleton slot not reserved (holds {}, refusing {})",
                    current, pid
                ))
            })
    }

    /// Give back a reservation whose spawn never produced a child.
    pub fn release_singleton(&self) {
        let _ = self.singleton_pid.compare_exchange(
            RESERVED,
            0,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// The registered singleton; a reservation alone reports `None`.
    pub fn singleton_pid(&self) -> Option<i32> {
        match self.singleton_pid.load(Ordering::SeqCst) {
            pid if pid > 0 => Some(pid),
            _ => None,
        }
    }

    /// Async-signal-safe.
    pub fn is_singleton(&self, pid: i32) -> bool {
        pid > 0 && self.singleton_pid.load(Ordering::SeqCst) == pid
    }

    /// Run `kill` only for the first caller; later callers are no-ops.
    /// Returns whether this call triggered termination. Async-signal-safe.
    pub fn request_termination<F: FnOnce()>(&self, kill: F) -> bool {
        if self.terminating.swap(true, Ordering::SeqCst) {
            return false;
        }
        kill();
        true
    }

    pub fn is_terminating(&self) -> bool {
        self.terminating.load(Ordering::SeqCst)
    }

    pub fn mark_spawned_child(&self) {
        self.spawned_child.store(true, Ordering::SeqCst);
    }

    pub fn is_spawned_child(&self) -> bool {
        self.spawned_child.load(Ordering::SeqCst)
    }

    pub fn set_traceable(&self, traceable: bool) {
        self.traceable.store(traceable, Ordering::SeqCst);
    }

    pub fn is_traceable(&self) -> bool {
        self.traceable.load(Ordering::SeqCst)
    }
}

impl Default for ProcessState {
    fn default() -> Self {
        Self::new()
    }
}
