/// Child-side specialization sequence
///
/// Runs in the freshly forked, single-threaded child and downgrades it from
/// the warm parent's context to the requested role. The order is FIXED:
/// 1. PR_SET_KEEPCAPS (unless staying root)
/// 2. external storage mount
/// 3. supplementary groups
/// 4. resource limits, in order
/// 5. setresgid, then setresuid, then verification
/// 6. ADDR_NO_RANDOMIZE workaround (best effort)
/// 7. capset + exact read-back
/// 8. scheduler class
/// 9. security label (last security-relevant step)
/// 10. runtime thread-state reinit
/// 11. debug toggles
/// 12. reaper disarm, post-fork hook, entry point
///
/// CRITICAL: setresgid MUST be called BEFORE setresuid. Once the uid is
/// dropped the process no longer has permission to change its gid.
use crate::config::types::{Result, SpawnError, SPECIALIZE_FAILURE_EXIT};
use crate::core::runtime::RuntimeHooks;
use crate::core::state::ProcessState;
use crate::core::types::{DebugFlags, MountExternal, SecurityProfile, SpawnRole};
use crate::kernel::label::LabelPolicy;
use crate::kernel::mount::StorageLayout;
use crate::kernel::sched::SchedulerClass;
use crate::kernel::signal::ReaperControl;
use crate::kernel::KernelOps;
use std::io::Write;
use std::marker::PhantomData;

// ============================================================================
// Type-State Specialization Chain
// ============================================================================
//
// Forked -> CapsRetained -> StorageMounted -> GroupsSet -> LimitsApplied ->
// IdentityChanged -> LayoutAdjusted -> CapsApplied -> SchedulerSet ->
// Labeled -> ThreadStateReady -> Specialized
//
// Each step consumes the prior state and returns exactly one next state on
// success. Only Specialization<Specialized> can hand off to the entry point.

/// Type-state marker: fresh child, nothing applied yet
pub struct Forked;

/// Type-state marker: capabilities will survive the uid change
pub struct CapsRetained;

/// Type-state marker: external storage is mounted
pub struct StorageMounted;

/// Type-state marker: supplementary groups are set
pub struct GroupsSet;

/// Type-state marker: every resource limit is applied
pub struct LimitsApplied;

/// Type-state marker: gid and uid are final
pub struct IdentityChanged;

/// Type-state marker: address-space layout workaround handled
pub struct LayoutAdjusted;

/// Type-state marker: capability sets are final
pub struct CapsApplied;

/// Type-state marker: scheduler class is set
pub struct SchedulerSet;

/// Type-state marker: security label is applied
pub struct Labeled;

/// Type-state marker: runtime per-thread state rebound
pub struct ThreadStateReady;

/// Type-state marker: fully specialized, ready to hand off
pub struct Specialized;

/// Collaborators the sequence runs against.
#[derive(Clone, Copy)]
pub struct SpecializeContext<'a> {
    pub kernel: &'a dyn KernelOps,
    pub hooks: &'a dyn RuntimeHooks,
    pub labels: &'a LabelPolicy,
    pub storage: &'a StorageLayout,
    pub state: &'a ProcessState,
}

/// A child under specialization. `S` is the last completed step.
pub struct Specialization<'a, S> {
    ctx: SpecializeContext<'a>,
    role: SpawnRole,
    profile: &'a SecurityProfile,
    _state: PhantomData<S>,
}

impl<'a, S> Specialization<'a, S> {
    pub fn role(&self) -> SpawnRole {
        self.role
    }

    pub fn profile(&self) -> &'a SecurityProfile {
        self.profile
    }

    fn advance<T>(self) -> Specialization<'a, T> {
        Specialization {
            ctx: self.ctx,
            role: self.role,
            profile: self.profile,
            _state: PhantomData,
        }
    }
}

impl<'a> Specialization<'a, Forked> {
    pub fn new(ctx: SpecializeContext<'a>, role: SpawnRole, profile: &'a SecurityProfile) -> Self {
        Self {
            ctx,
            role,
            profile,
            _state: PhantomData,
        }
    }

    /// Step 1: keep capabilities across the uid change. Root keeps them anyway.
    pub fn retain_capabilities(self) -> Result<Specialization<'a, CapsRetained>> {
        if self.profile.uid != 0 {
            self.ctx.kernel.keep_capabilities()?;
        }
        Ok(self.advance())
    }
}

impl<'a> Specialization<'a, CapsRetained> {
    /// Step 2: external storage, while still privileged enough to mount.
    pub fn mount_storage(self) -> Result<Specialization<'a, StorageMounted>> {
        let mode = self.profile.mount_external;
        if mode == MountExternal::None {
            log::debug!("No external storage requested");
        } else {
            self.ctx
                .kernel
                .mount_external_storage(self.profile.uid, mode, self.ctx.storage)?;
        }
        Ok(self.advance())
    }
}

impl<'a> Specialization<'a, StorageMounted> {
    /// Step 3: supplementary groups. Absent or empty leaves them unchanged.
    pub fn set_groups(self) -> Result<Specialization<'a, GroupsSet>> {
        if let Some(groups) = self.profile.effective_groups() {
            self.ctx.kernel.set_groups(groups)?;
        }
        Ok(self.advance())
    }
}

impl<'a> Specialization<'a, GroupsSet> {
    /// Step 4: resource limits in caller order. The first failure aborts.
    pub fn apply_limits(self) -> Result<Specialization<'a, LimitsApplied>> {
        for limit in &self.profile.rlimits {
            self.ctx.kernel.set_rlimit(limit)?;
        }
        Ok(self.advance())
    }
}

impl<'a> Specialization<'a, LimitsApplied> {
    /// Step 5: gid, then uid, then confirm both took effect.
    pub fn change_identity(self) -> Result<Specialization<'a, IdentityChanged>> {
        let (uid, gid) = (self.profile.uid, self.profile.gid);
        self.ctx.kernel.set_gid(gid)?;
        self.ctx.kernel.set_uid(uid)?;
        self.ctx.kernel.verify_identity(uid, gid)?;
        log::debug!("Identity changed to uid={} gid={}", uid, gid);
        Ok(self.advance())
    }
}

impl<'a> Specialization<'a, IdentityChanged> {
    /// Step 6: best effort; failure only warns.
    pub fn apply_layout_workaround(self) -> Specialization<'a, LayoutAdjusted> {
        if self.ctx.kernel.needs_no_randomize_workaround() {
            if let Err(e) = self.ctx.kernel.disable_address_randomization() {
                log::warn!("ADDR_NO_RANDOMIZE workaround failed: {}", e);
            }
        }
        self.advance()
    }
}

impl<'a> Specialization<'a, LayoutAdjusted> {
    /// Step 7: install the exact permitted/effective sets.
    pub fn apply_capabilities(self) -> Result<Specialization<'a, CapsApplied>> {
        self.ctx.kernel.set_capabilities(
            self.profile.permitted_capabilities,
            self.profile.effective_capabilities,
        )?;
        Ok(self.advance())
    }
}

impl<'a> Specialization<'a, CapsApplied> {
    /// Step 8: drop any real-time policy inherited from the parent.
    pub fn apply_scheduler(self) -> Result<Specialization<'a, SchedulerSet>> {
        self.ctx
            .kernel
            .set_scheduler_class(SchedulerClass::Foreground)?;
        Ok(self.advance())
    }
}

impl<'a> Specialization<'a, SchedulerSet> {
    /// Step 9: the security label. Nothing privileged may follow this.
    pub fn apply_label(self) -> Result<Specialization<'a, Labeled>> {
        if !self.ctx.labels.enabled {
            log::debug!("Label policy disabled; keeping inherited label");
            return Ok(self.advance());
        }
        let label = self.ctx.labels.derive(self.role, &self.profile.label);
        self.ctx.kernel.set_security_label(&label)?;
        Ok(self.advance())
    }
}

impl<'a> Specialization<'a, Labeled> {
    /// Step 10.
    pub fn reinit_thread_state(self) -> Specialization<'a, ThreadStateReady> {
        self.ctx.hooks.reinit_thread_state();
        self.advance()
    }
}

impl<'a> Specialization<'a, ThreadStateReady> {
    /// Step 11: debug toggles. Nothing here is fatal.
    pub fn apply_debug_flags(self) -> Specialization<'a, Specialized> {
        let flags = self.profile.debug_flags;
        let hooks = self.ctx.hooks;

        if flags.has(DebugFlags::ENABLE_CHECKED_NATIVE_CALLS) {
            hooks.enable_checked_native_calls();
        }

        if flags.has(DebugFlags::ENABLE_DEBUGGER) {
            hooks.set_debugger_allowed(true);
            self.ctx.state.set_traceable(true);
            if let Err(e) = self.ctx.kernel.enable_debugger() {
                log::error!("Could not make process debuggable: {}", e);
            }
        } else {
            hooks.set_debugger_allowed(false);
        }

        if flags.has(DebugFlags::ENABLE_NATIVE_CALL_LOGGING) {
            hooks.enable_native_call_logging();
        }

        let legacy = flags.bits() & DebugFlags::LEGACY;
        if legacy != 0 {
            log::debug!("Ignoring legacy debug flags {:#x}", legacy);
        }

        let unknown = flags.unknown_bits();
        if unknown != 0 {
            log::error!("Unknown debug flags {:#x}", unknown);
        }

        self.advance()
    }
}

impl<'a> Specialization<'a, Specialized> {
    /// Step 12 without the exit: disarm, notify the runtime, run `entry`.
    pub fn run_entry<F>(self, reaper: &dyn ReaperControl, entry: F) -> i32
    where
        F: FnOnce() -> i32,
    {
        if let Err(e) = reaper.disarm() {
            log::warn!("Error restoring default SIGCHLD disposition: {}", e);
        }
        self.ctx.hooks.did_fork_child();
        log::info!("Specialized {} child entering its entry point", self.role);
        entry()
    }

    /// Step 12: the child never returns to the caller.
    pub fn hand_off<F>(self, reaper: &dyn ReaperControl, entry: F) -> !
    where
        F: FnOnce() -> i32,
    {
        let code = self.run_entry(reaper, entry);
        exit_child(code)
    }
}

/// Run steps 1 through 11.
pub fn specialize<'a>(
    ctx: SpecializeContext<'a>,
    role: SpawnRole,
    profile: &'a SecurityProfile,
) -> Result<Specialization<'a, Specialized>> {
    let specialized = Specialization::new(ctx, role, profile)
        .retain_capabilities()?
        .mount_storage()?
        .set_groups()?
        .apply_limits()?
        .change_identity()?
        .apply_layout_workaround()
        .apply_capabilities()?
        .apply_scheduler()?
        .apply_label()?
        .reinit_thread_state()
        .apply_debug_flags();
    Ok(specialized)
}

/// Child-side driver: specialize and hand off, or die with
/// [`SPECIALIZE_FAILURE_EXIT`]. The entry point never runs after a failure.
pub fn run_child<F>(
    ctx: SpecializeContext<'_>,
    reaper: &dyn ReaperControl,
    role: SpawnRole,
    profile: &SecurityProfile,
    entry: F,
) -> !
where
    F: FnOnce() -> i32,
{
    match specialize(ctx, role, profile) {
        Ok(specialized) => specialized.hand_off(reaper, entry),
        Err(e) => abort_child(&e),
    }
}

/// Log the failure and end the child.
pub fn abort_child(err: &SpawnError) -> ! {
    log::error!(
        "Specialization of pid {} failed: {}",
        std::process::id(),
        err
    );
    exit_child(SPECIALIZE_FAILURE_EXIT)
}

/// `_exit` after flushing stdio; skips the parent's atexit handlers.
pub fn exit_child(code: i32) -> ! {
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();
    // SAFETY: _exit never returns and runs no destructors or atexit handlers,
    // which must not run in a forked copy of the parent.
    unsafe { libc::_exit(code) }
}
