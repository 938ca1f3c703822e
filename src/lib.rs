//! hwgw - overlapping hack/weaken/grow/weaken batch scheduler
//!
//! Plans, times and places four-operation batches against a game target so
//! that completions land in a fixed order a small spacing apart, then runs a
//! prep/batch loop that keeps the target at maximum value and minimum
//! security between batches.
//!
//! # Architecture
//!
//! - [`models`] - Targets, hosts, operation specs, batch plans and schedules
//! - [`formulas`] - Formula sources and the pure [`formulas::ResourceModel`]
//! - [`planner`] - Thread counts for batches and prep rounds
//! - [`timing`] - Launch delays that order completions
//! - [`allocator`] - Placing threads onto hosts with limited RAM
//! - [`host`] - The runtime capabilities the core consumes
//! - [`manager`] - The prep/batch state machine
//! - [`sim`] - An in-memory runtime for dry runs and tests
//! - [`config`] - TOML and environment configuration
//! - [`metrics`] - Prometheus counters for the manager loop
//! - [`error`] - Error types and classification
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hwgw::config::Config;
//! use hwgw::formulas::GameFormulas;
//! use hwgw::sim::{SimulatedHost, WorldSnapshot};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let world = WorldSnapshot::from_file("demos/world.json".as_ref())?;
//!     let host = Arc::new(SimulatedHost::new(world, Some(Arc::new(GameFormulas))));
//!     let plan = hwgw::plan_once(&*host, "n00dles", "home", &Config::default()).await?;
//!     println!("{}% per batch", plan.extract_percent);
//!     Ok(())
//! }
//! ```

pub mod allocator;
pub mod config;
pub mod error;
pub mod formulas;
pub mod host;
pub mod manager;
pub mod metrics;
pub mod models;
pub mod planner;
pub mod sim;
pub mod timing;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::allocator::{Allocation, AllocationRequest, CapacityAllocator, KeepFreePolicy};
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, ErrorClass, Result};
    pub use crate::formulas::{FixedRateFormulas, FormulaSource, GameFormulas, ResourceModel};
    pub use crate::host::{DispatchHandle, DispatchRequest, HostApi};
    pub use crate::manager::{BatchManager, ManagerState, StepOutcome};
    pub use crate::models::{
        ActorAttributes, BatchPlan, BatchRole, LaunchSchedule, OperationKind, OperationSpec,
        RamMb, TargetNode, WorkerHost,
    };
    pub use crate::planner::{PlanError, ThreadPlanner};
    pub use crate::timing::TimingCoordinator;
}

// Direct re-exports for convenience
pub use manager::{plan_once, run_manager};
pub use models::{BatchPlan, LaunchSchedule, RamMb};
