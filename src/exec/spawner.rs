/// One fork per spawn request
///
/// The parent validates, quiesces the runtime, arms the reaper and forks. The
/// child runs the specialization sequence and never returns here. For the
/// singleton the parent records the pid and then re-checks liveness, because
/// the child can die and be reaped before the pid was registered, in which
/// case the reaper could not have recognized it.
use crate::config::types::{Result, SpawnError};
use crate::config::validator::validate_profile;
use crate::core::runtime::{NoRuntime, RuntimeHooks};
use crate::core::state::ProcessState;
use crate::core::types::{ExitKind, SecurityProfile, SpawnRole};
use crate::exec::preexec::{run_child, SpecializeContext};
use crate::kernel::label::LabelPolicy;
use crate::kernel::mount::StorageLayout;
use crate::kernel::signal::{
    ChildWaiter, KernelWaiter, KillSelf, ReaperControl, ServiceTerminator, SigchldReaper,
    WaitOutcome,
};
use crate::kernel::{HostKernel, KernelOps};
use crate::observability::audit::{SpawnEvent, SpawnEventType};
use nix::sys::signal::{kill, Signal};
use nix::unistd::{fork, ForkResult, Pid};

pub struct Spawner {
    kernel: Box<dyn KernelOps>,
    hooks: Box<dyn RuntimeHooks>,
    reaper: Box<dyn ReaperControl>,
    terminator: Box<dyn ServiceTerminator>,
    labels: LabelPolicy,
    storage: StorageLayout,
    state: &'static ProcessState,
}

impl Default for Spawner {
    fn default() -> Self {
        Self::new()
    }
}

impl Spawner {
    /// Host kernel, SIGCHLD reaper and the process-wide state.
    pub fn new() -> Self {
        Self {
            kernel: Box::new(HostKernel),
            hooks: Box::new(NoRuntime),
            reaper: Box::new(SigchldReaper::new()),
            terminator: Box::new(KillSelf),
            labels: LabelPolicy::default(),
            storage: StorageLayout::default(),
            state: ProcessState::global(),
        }
    }

    pub fn with_kernel(mut self, kernel: impl KernelOps + 'static) -> Self {
        self.kernel = Box::new(kernel);
        self
    }

    pub fn with_hooks(mut self, hooks: impl RuntimeHooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    pub fn with_reaper(mut self, reaper: impl ReaperControl + 'static) -> Self {
        self.reaper = Box::new(reaper);
        self
    }

    pub fn with_terminator(mut self, terminator: impl ServiceTerminator + 'static) -> Self {
        self.terminator = Box::new(terminator);
        self
    }

    pub fn with_labels(mut self, labels: LabelPolicy) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_storage(mut self, storage: StorageLayout) -> Self {
        self.storage = storage;
        self
    }

    /// The installed SIGCHLD handler always consults [`ProcessState::global`];
    /// a private state only makes sense together with a non-signal reaper.
    pub fn with_state(mut self, state: &'static ProcessState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> &'static ProcessState {
        self.state
    }

    pub fn labels(&self) -> &LabelPolicy {
        &self.labels
    }

    /// Fork an ordinary application child.
    pub fn spawn_application<F>(&self, profile: &SecurityProfile, entry: F) -> Result<Pid>
    where
        F: FnOnce() -> i32,
    {
        self.spawn(SpawnRole::Application, profile, entry)
    }

    /// Fork the singleton. Its death, at any later point, terminates the service.
    ///
    /// A singleton found dead by the liveness re-check is reported as
    /// [`SpawnError::Registry`]; its pid is never returned.
    pub fn spawn_singleton<F>(&self, profile: &SecurityProfile, entry: F) -> Result<Pid>
    where
        F: FnOnce() -> i32,
    {
        let pid = self.spawn(SpawnRole::Singleton, profile, entry)?;
        self.settle_singleton(pid, profile, &mut KernelWaiter)
    }

    fn settle_singleton<W>(
        &self,
        pid: Pid,
        profile: &SecurityProfile,
        waiter: &mut W,
    ) -> Result<Pid>
    where
        W: ChildWaiter + ?Sized,
    {
        if confirm_singleton_alive(pid.as_raw(), self.state, waiter, self.terminator.as_ref()) {
            return Ok(pid);
        }
        SpawnEvent::new(SpawnEventType::SingletonLost, SpawnRole::Singleton, profile)
            .with_pid(pid.as_raw())
            .emit();
        Err(SpawnError::Registry(format!(
            "singleton {} died before its spawn completed",
            pid
        )))
    }

    fn spawn<F>(&self, role: SpawnRole, profile: &SecurityProfile, entry: F) -> Result<Pid>
    where
        F: FnOnce() -> i32,
    {
        if let Err(e) = self.precheck(role, profile) {
            SpawnEvent::new(SpawnEventType::Refused, role, profile)
                .with_details(e.to_string())
                .emit();
            return Err(e);
        }

        if let Err(e) = self.reaper.arm() {
            log::warn!("Failed to arm child reaper, continuing: {}", e);
        }

        // SAFETY: the child only runs the specialization sequence and then
        // either execs, runs `entry`, or calls _exit. It never returns here.
        let forked = unsafe { fork() };
        match forked {
            Err(e) => {
                if role.is_singleton() {
                    self.state.release_singleton();
                }
                let err = SpawnError::Fork(format!("fork failed: {}", e));
                SpawnEvent::new(SpawnEventType::Refused, role, profile)
                    .with_details(err.to_string())
                    .emit();
                Err(err)
            }
            Ok(ForkResult::Child) => {
                self.state.mark_spawned_child();
                let ctx = SpecializeContext {
                    kernel: self.kernel.as_ref(),
                    hooks: self.hooks.as_ref(),
                    labels: &self.labels,
                    storage: &self.storage,
                    state: self.state,
                };
                run_child(ctx, self.reaper.as_ref(), role, profile, entry)
            }
            Ok(ForkResult::Parent { child }) => {
                if role.is_singleton() {
                    if let Err(e) = self.state.commit_singleton(child.as_raw()) {
                        // An untracked singleton must not outlive this call.
                        let _ = kill(child, Signal::SIGKILL);
                        return Err(e);
                    }
                }
                let mut event = SpawnEvent::new(SpawnEventType::Spawned, role, profile)
                    .with_pid(child.as_raw());
                if self.labels.enabled {
                    event = event.with_label(&self.labels.derive(role, &profile.label));
                }
                event.emit();
                log::info!("Spawned {} pid {}", role, child);
                Ok(child)
            }
        }
    }

    /// Everything that may refuse a request without a child existing.
    ///
    /// A singleton request leaves the registry slot reserved on success.
    fn precheck(&self, role: SpawnRole, profile: &SecurityProfile) -> Result<()> {
        if self.state.is_spawned_child() {
            return Err(SpawnError::PreFork(
                "spawned children cannot spawn further children".to_string(),
            ));
        }

        let report = validate_profile(profile).into_result()?;
        for warning in &report.warnings {
            log::warn!("{}", warning);
        }

        if role.is_singleton() {
            self.state.reserve_singleton()?;
        }

        let prepared = self.hooks.pre_fork();
        if prepared.is_err() && role.is_singleton() {
            self.state.release_singleton();
        }
        prepared
    }
}

/// Close the race between the singleton dying and its pid being registered.
///
/// Returns whether the singleton is still alive. A child that has already
/// exited, was signalled, or is no longer waitable (the reaper got there
/// first) terminates the service through the state's latch.
pub fn confirm_singleton_alive<W>(
    pid: i32,
    state: &ProcessState,
    waiter: &mut W,
    terminator: &dyn ServiceTerminator,
) -> bool
where
    W: ChildWaiter + ?Sized,
{
    loop {
        match waiter.try_wait(Some(pid)) {
            WaitOutcome::StillRunning => return true,
            WaitOutcome::Interrupted => continue,
            WaitOutcome::Reaped(exit) => {
                match exit.kind {
                    ExitKind::Exited(code) => {
                        log::error!("Singleton {} exited ({}) during spawn", pid, code)
                    }
                    ExitKind::Signaled { signal, .. } => {
                        log::error!("Singleton {} killed by signal {} during spawn", pid, signal)
                    }
                }
                break;
            }
            WaitOutcome::NoChildren => {
                log::error!("Singleton {} was reaped before it was registered", pid);
                break;
            }
            WaitOutcome::Failed(errno) => {
                log::warn!("Liveness check of singleton {} failed (errno {})", pid, errno);
                return true;
            }
        }
    }

    state.request_termination(|| terminator.terminate());
    false
}
