/// This test should FAIL to compile
/// Attempting to reuse a state after it has been consumed
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

    // First transition consumes the child
    let _next = child.retain_capabilities();

    // This should fail: child was moved
    child.retain_capabilities();
}
