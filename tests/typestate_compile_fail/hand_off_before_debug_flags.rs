/// This test should FAIL to compile
/// Debug toggles must be applied before the entry point runs
use warmfork::core::runtime::NoRuntime;
use warmfork::core::state::ProcessState;
use warmfork::core::types::{SecurityProfile, SpawnRole};
use warmfork::kernel::label::LabelPolicy;
use warmfork::kernel::mount::StorageLayout;
use warmfork::kernel::HostKernel;
use warmfork::preexec::{Specialization, SpecializeContext};

fn main() {
    let labels = LabelPolicy::disabled();
    let storage = StorageLayout::default();
    let state = ProcessState::new();
    let profile = SecurityProfile::new(1000, 1000);
    let ctx = SpecializeContext {
        kernel: &HostKernel,
        hooks: &NoRuntime,
        labels: &labels,
        storage: &storage,
        state: &state,
    };
    let child = Specialization::new(ctx, SpawnRole::Application, &profile);

    let child = child.retain_capabilities().unwrap();
    let child = child.mount_storage().unwrap();
    let child = child.set_groups().unwrap();
    let child = child.apply_limits().unwrap();
    let child = child.change_identity().unwrap();
    let child = child.apply_layout_workaround();
    let child = child.apply_capabilities().unwrap();
    let child = child.apply_scheduler().unwrap();
    let child = child.apply_label().unwrap();
    let child = child.reinit_thread_state();

    // ThreadStateReady has no hand_off
    child.hand_off(&warmfork::kernel::signal::SigchldReaper, || 0);
}
