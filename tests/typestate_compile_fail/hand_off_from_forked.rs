/// This test should FAIL to compile
/// A freshly forked child cannot jump to its entry point
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

    // Only Specialization<Specialized> exposes hand_off
    child.hand_off(&warmfork::kernel::signal::SigchldReaper, || 0);
}
