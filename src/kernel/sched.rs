//! Scheduler class for spawned children.

use crate::config::types::{Result, SpawnError};

/// Scheduling classes a child can be placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerClass {
    /// Default time-sharing policy for interactive application processes.
    Foreground,
}

impl SchedulerClass {
    fn policy(self) -> libc::c_int {
        match self {
            SchedulerClass::Foreground => libc::SCHED_OTHER,
        }
    }
}

/// Move the calling process into `class` with static priority 0.
///
/// Any real-time policy inherited from the warm parent is dropped.
pub fn set_scheduler_class(class: SchedulerClass) -> Result<()> {
    let param = libc::sched_param { sched_priority: 0 };
    // SAFETY: pid 0 targets the calling thread; param is initialized.
    let rc = unsafe { libc::sched_setscheduler(0, class.policy(), &param) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        return Err(SpawnError::Scheduler(format!(
            "sched_setscheduler({:?}) failed: {}",
            class, err
        )));
    }
    log::debug!("Scheduler class set to {:?}", class);
    Ok(())
}
