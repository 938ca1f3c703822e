//! Common test utilities

use std::sync::Arc;

use hwgw::formulas::{FixedRateFormulas, FormulaSource, ResourceModel};
use hwgw::models::{ActorAttributes, RamMb, TargetNode, WorkerHost};
use hwgw::sim::{SimulatedHost, WorldSnapshot};

#[allow(dead_code)]
/// Prepped target with 1,000,000 max value and minimum security 5
pub fn fixed_target() -> TargetNode {
    TargetNode::new("n00dles", 1_000_000.0, 5.0, 10.0, 1)
}

#[allow(dead_code)]
/// One `home` host of the given size
pub fn world_with_home(ram: RamMb) -> WorldSnapshot {
    WorldSnapshot {
        actor: ActorAttributes::new(10),
        targets: vec![fixed_target()],
        hosts: vec![WorkerHost::new("home", ram, 1)],
    }
}

/// Simulated runtime over [`world_with_home`] with constant-rate formulas
#[allow(dead_code)]
pub fn fixed_sim(ram: RamMb) -> Arc<SimulatedHost> {
    Arc::new(SimulatedHost::new(
        world_with_home(ram),
        Some(Arc::new(FixedRateFormulas::default())),
    ))
}

#[allow(dead_code)]
pub fn model(source: impl FormulaSource + 'static, skill: u32) -> ResourceModel {
    ResourceModel::new(Some(Arc::new(source)), ActorAttributes::new(skill)).unwrap()
}
