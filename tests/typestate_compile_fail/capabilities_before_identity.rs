/// This test should FAIL to compile
/// Capabilities cannot be installed while the child still has its old uid
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

    // LimitsApplied has no apply_capabilities; change_identity comes first
    child.apply_capabilities();
}
