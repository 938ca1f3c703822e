//! Batch manager loop
//!
//! [`BatchManager`] owns the per-target state machine:
//!
//! ```text
//! Unprepped ──► Prepping ──► PreppedIdle ──► Batching
//!                  ▲                            │
//!                  └──────── resync ────────────┘
//! ```
//!
//! While prepping it dispatches weaken (or grow plus weaken) rounds and waits
//! for them. While batching it plans, schedules, places and dispatches one
//! four-operation batch per step. Planning and placement failures are absorbed
//! with a backoff; enough of them in a row, or enough successful launches,
//! force a resynchronization back through prepping.
//!
//! Every step re-reads targets, hosts and actor attributes through
//! [`HostApi`], so nothing observed survives longer than one planning step.

mod state;

use std::cmp::Reverse;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::allocator::{AllocationRequest, CapacityAllocator, KeepFreePolicy};
use crate::config::Config;
use crate::error::{Error, ErrorClass, Result};
use crate::formulas::ResourceModel;
use crate::host::{wait_for_completion, DispatchHandle, DispatchRequest, HostApi};
use crate::metrics::BatchMetrics;
use crate::models::{BatchPlan, BatchRole, OperationKind, OperationSpec, RamMb, TargetNode, WorkerHost};
use crate::planner::{plan_single, ThreadPlanner};
use crate::timing::TimingCoordinator;

pub use state::{ManagerState, ResyncTrigger, StepOutcome};

/// Serializable summary of a running manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerStatus {
    pub target: String,
    pub host: String,
    pub state: ManagerState,
    pub launched_batches: u32,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    pub started_at: DateTime<Utc>,
    pub last_resync_at: Option<DateTime<Utc>>,
}

/// Per-target prep/batch state machine
pub struct BatchManager<H: HostApi> {
    host_api: Arc<H>,
    target_name: String,
    host_name: String,
    /// Acting host first, then the configured pool
    pool: Vec<String>,
    config: Config,
    model: ResourceModel,
    planner: ThreadPlanner,
    timing: TimingCoordinator,
    allocator: CapacityAllocator,
    keep_free: KeepFreePolicy,
    state: ManagerState,
    target: TargetNode,
    launched: u32,
    consecutive_failures: u32,
    failure_threshold: u32,
    /// Handles of the most recent batch; it lands after every earlier one
    last_batch: Vec<DispatchHandle>,
    metrics: BatchMetrics,
    started_at: DateTime<Utc>,
    last_resync_at: Option<DateTime<Utc>>,
}

impl<H: HostApi> BatchManager<H> {
    /// Resolve the formula source, target and hosts, then build the manager
    ///
    /// Errors here are fatal: nothing has been dispatched yet.
    pub async fn start(host_api: Arc<H>, target: &str, host: &str, config: Config) -> Result<Self> {
        let model = ResourceModel::new(host_api.formulas(), host_api.actor().await)?;

        let observed = host_api
            .target(target)
            .await
            .ok_or_else(|| Error::TargetUnknown(target.to_string()))?;

        let pool = pool_names(host, &config);
        for name in &pool {
            if host_api.host(name).await.is_none() {
                return Err(Error::HostUnknown(name.clone()));
            }
        }

        let metrics = BatchMetrics::new(target)?;
        metrics.set_state(ManagerState::Unprepped.code());

        info!(
            target_name = %target,
            host = %host,
            pool = pool.len(),
            money = observed.money(),
            security = observed.security(),
            "Batch manager started"
        );

        Ok(Self {
            target_name: target.to_string(),
            host_name: host.to_string(),
            pool,
            model,
            planner: ThreadPlanner::new(config.planner()),
            timing: TimingCoordinator::new(config.spacing()),
            allocator: CapacityAllocator::new(),
            keep_free: config.keep_free(),
            state: ManagerState::Unprepped,
            target: observed,
            launched: 0,
            consecutive_failures: 0,
            failure_threshold: config.batch.min_failure_threshold.max(1),
            last_batch: Vec::new(),
            metrics,
            started_at: Utc::now(),
            last_resync_at: None,
            host_api,
            config,
        })
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    pub fn launched_batches(&self) -> u32 {
        self.launched
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Last observed target state
    pub fn target(&self) -> &TargetNode {
        &self.target
    }

    pub fn metrics(&self) -> &BatchMetrics {
        &self.metrics
    }

    pub fn status(&self) -> ManagerStatus {
        ManagerStatus {
            target: self.target_name.clone(),
            host: self.host_name.clone(),
            state: self.state,
            launched_batches: self.launched,
            consecutive_failures: self.consecutive_failures,
            failure_threshold: self.failure_threshold,
            started_at: self.started_at,
            last_resync_at: self.last_resync_at,
        }
    }

    /// Run forever
    pub async fn run(&mut self) {
        info!(target_name = %self.target_name, "Manager loop running");
        loop {
            let outcome = self.step().await;
            debug!(?outcome, state = %self.state, "Manager step");
        }
    }

    /// Advance the state machine by one step
    pub async fn step(&mut self) -> StepOutcome {
        match self.state {
            ManagerState::Unprepped => self.observe().await,
            ManagerState::Prepping => self.prep_round().await,
            ManagerState::PreppedIdle => self.begin_batching(),
            ManagerState::Batching => self.launch_batch().await,
        }
    }

    fn enter(&mut self, state: ManagerState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "Manager state change");
        }
        self.state = state;
        self.metrics.set_state(state.code());
    }

    /// Re-read target and actor; a vanished target keeps its last state
    async fn refresh(&mut self) {
        match self.host_api.target(&self.target_name).await {
            Some(target) => self.target = target,
            None => warn!(target_name = %self.target_name, "Target not visible, using last known state"),
        }
        if let Err(err) = self.model.set_actor(self.host_api.actor().await) {
            warn!(target_name = %self.target_name, error = %err, "Actor attributes refused, keeping last known");
        }
    }

    async fn observe(&mut self) -> StepOutcome {
        self.refresh().await;
        let prepped = self.target.is_prepped();
        if prepped {
            self.enter(ManagerState::PreppedIdle);
        } else {
            info!(
                target_name = %self.target_name,
                money = self.target.money(),
                max_money = self.target.max_money(),
                security = self.target.security(),
                min_security = self.target.min_security(),
                "Target needs prepping"
            );
            self.enter(ManagerState::Prepping);
        }
        StepOutcome::Observed { prepped }
    }

    // ------------------------------------------------------------------------
    // Prepping
    // ------------------------------------------------------------------------

    async fn prep_round(&mut self) -> StepOutcome {
        if !self.last_batch.is_empty() {
            let handles = std::mem::take(&mut self.last_batch);
            let outcome = wait_for_completion(&*self.host_api, &handles, &self.config.prep_poll()).await;
            debug!(handles = handles.len(), ?outcome, "Drained in-flight batch operations");
            return StepOutcome::Drained { outcome };
        }

        self.refresh().await;
        if self.target.is_prepped() {
            info!(target_name = %self.target_name, "Target prepped");
            self.enter(ManagerState::PreppedIdle);
            return StepOutcome::PrepComplete;
        }

        let hosts = pool_snapshot(&*self.host_api, &self.pool, &self.keep_free).await;
        let cores = pool_cores(&hosts);
        let specs: Vec<OperationSpec> = if self.target.is_security_prepped() {
            let (grow, weaken) = self.planner.prep_grow(&self.model, &self.target, cores);
            vec![grow, weaken]
        } else {
            vec![self.planner.prep_weaken(&self.model, &self.target, cores)]
        };

        let requests: Vec<AllocationRequest> = specs
            .iter()
            .map(|spec| AllocationRequest::threads(spec.kind, spec.threads, spec.ram_per_thread))
            .collect();
        let allocation = self.allocator.allocate(&requests, &hosts);
        let durations: Vec<_> = specs.iter().map(|spec| spec.duration).collect();
        let delays = self.timing.sequence(&durations);

        let mut handles = Vec::new();
        let mut threads = 0u32;
        for (index, spec) in specs.iter().enumerate() {
            for placement in &allocation.placements[index] {
                let request = DispatchRequest {
                    kind: spec.kind,
                    threads: placement.threads,
                    target: self.target_name.clone(),
                    host: placement.host.clone(),
                    delay: delays[index],
                };
                match self.host_api.dispatch(&request).await {
                    Some(handle) => {
                        handles.push(handle);
                        threads += placement.threads;
                        self.metrics.record_threads(spec.kind, placement.threads);
                    }
                    None => warn!(
                        kind = %spec.kind,
                        threads = placement.threads,
                        host = %placement.host,
                        "Prep operation did not start"
                    ),
                }
            }
        }

        if handles.is_empty() {
            warn!(
                target_name = %self.target_name,
                backoff_ms = self.config.timing.backoff_ms,
                "No prep operation could be started"
            );
            tokio::time::sleep(self.config.backoff()).await;
            return StepOutcome::PrepStalled;
        }

        self.metrics.record_prep_round();
        info!(
            target_name = %self.target_name,
            threads,
            operations = handles.len(),
            kinds = ?specs.iter().map(|s| s.kind).collect::<Vec<_>>(),
            "Prep round dispatched"
        );

        let outcome = wait_for_completion(&*self.host_api, &handles, &self.config.prep_poll()).await;
        StepOutcome::PrepRound { threads, outcome }
    }

    // ------------------------------------------------------------------------
    // Batching
    // ------------------------------------------------------------------------

    fn begin_batching(&mut self) -> StepOutcome {
        let weaken_time = self
            .model
            .duration(OperationKind::Weaken, &self.target.prepped());
        self.failure_threshold = failure_threshold(
            weaken_time.as_millis(),
            self.config.timing.backoff_ms,
            self.config.batch.min_failure_threshold,
        );
        self.launched = 0;
        self.consecutive_failures = 0;
        self.enter(ManagerState::Batching);

        info!(
            target_name = %self.target_name,
            failure_threshold = self.failure_threshold,
            resync_after = self.config.batch.resync_after_batches,
            "Batching started"
        );
        StepOutcome::BatchingStarted {
            failure_threshold: self.failure_threshold,
        }
    }

    async fn launch_batch(&mut self) -> StepOutcome {
        self.refresh().await;
        let hosts = pool_snapshot(&*self.host_api, &self.pool, &self.keep_free).await;
        let ceiling = self
            .allocator
            .placeable(&hosts, self.config.capacity.script_costs.largest());
        let cores = pool_cores(&hosts);

        match self.try_launch(&hosts, ceiling, cores).await {
            Ok(plan) => {
                self.launched += 1;
                self.consecutive_failures = 0;
                self.metrics.record_batch(plan.extract_percent);
                info!(
                    target_name = %self.target_name,
                    batch = self.launched,
                    extract_percent = plan.extract_percent,
                    hack = plan.threads(BatchRole::Hack),
                    weaken_hack = plan.threads(BatchRole::WeakenHack),
                    grow = plan.threads(BatchRole::Grow),
                    weaken_grow = plan.threads(BatchRole::WeakenGrow),
                    ram = %plan.total_ram(),
                    "Batch launched"
                );

                let resync = if self.launched >= self.config.batch.resync_after_batches {
                    self.resync(ResyncTrigger::BatchLimit);
                    Some(ResyncTrigger::BatchLimit)
                } else {
                    tokio::time::sleep(self.config.launch_interval()).await;
                    None
                };
                StepOutcome::BatchLaunched {
                    launched: self.launched,
                    extract_percent: plan.extract_percent,
                    resync,
                }
            }
            Err(err) => {
                self.consecutive_failures += 1;
                let category = err.category();
                self.metrics.record_failure(category.as_str());
                warn!(
                    target_name = %self.target_name,
                    error = %err,
                    consecutive = self.consecutive_failures,
                    threshold = self.failure_threshold,
                    ceiling = %ceiling,
                    "Batch launch failed, backing off"
                );
                tokio::time::sleep(self.config.backoff()).await;

                let resync = if self.consecutive_failures >= self.failure_threshold {
                    self.resync(ResyncTrigger::ConsecutiveFailures);
                    Some(ResyncTrigger::ConsecutiveFailures)
                } else {
                    None
                };
                StepOutcome::BatchFailed {
                    consecutive: self.consecutive_failures,
                    category,
                    resync,
                }
            }
        }
    }

    /// Plan, schedule, place and dispatch one batch
    ///
    /// A plan the pool cannot place is replaced by the next smaller one in
    /// the same step. Nothing is dispatched unless every role is fully placed.
    async fn try_launch(&mut self, hosts: &[WorkerHost], ceiling: RamMb, cores: u32) -> Result<BatchPlan> {
        let mut ceiling = ceiling;
        let (plan, roles, allocation) = loop {
            let plan = self
                .planner
                .plan_batch(&self.model, &self.target, ceiling, cores)?;

            let mut roles = BatchRole::ALL;
            roles.sort_by_key(|role| Reverse(plan.operation(*role).ram()));
            let requests: Vec<AllocationRequest> = roles
                .iter()
                .map(|role| {
                    let op = plan.operation(*role);
                    AllocationRequest::threads(op.kind, op.threads, op.ram_per_thread)
                })
                .collect();
            let allocation = self.allocator.allocate(&requests, hosts);
            if allocation.all_placed() {
                break (plan, roles, allocation);
            }

            let short = (0..roles.len())
                .find(|index| !allocation.fully_placed(*index))
                .unwrap_or_default();
            debug!(
                target_name = %self.target_name,
                extract_percent = plan.extract_percent,
                role = roles[short].as_str(),
                placed = allocation.placed_threads(short),
                wanted = plan.threads(roles[short]),
                "Plan does not fit the pool, planning smaller"
            );
            if plan.total_ram() == RamMb::ZERO {
                return Err(Error::dispatch_rejected(
                    roles[short].as_str(),
                    "zero-cost plan cannot be placed",
                ));
            }
            ceiling = plan.total_ram().saturating_sub(RamMb(1));
        };
        let schedule = self.timing.schedule_plan(&plan);

        let mut handles = Vec::new();
        for (index, role) in roles.iter().enumerate() {
            for placement in &allocation.placements[index] {
                let request = DispatchRequest {
                    kind: role.kind(),
                    threads: placement.threads,
                    target: plan.target.clone(),
                    host: placement.host.clone(),
                    delay: schedule.delay(*role),
                };
                let Some(handle) = self.host_api.dispatch(&request).await else {
                    // started operations are absorbed by the next resync
                    self.last_batch = handles;
                    return Err(Error::dispatch_rejected(
                        role.as_str(),
                        format!("{} refused {} threads", placement.host, placement.threads),
                    ));
                };
                self.metrics.record_threads(role.kind(), placement.threads);
                handles.push(handle);
            }
        }

        self.last_batch = handles;
        Ok(plan)
    }

    fn resync(&mut self, trigger: ResyncTrigger) {
        info!(
            target_name = %self.target_name,
            %trigger,
            launched = self.launched,
            failures = self.consecutive_failures,
            "Resynchronizing target"
        );
        self.metrics.record_resync(trigger.as_str());
        self.last_resync_at = Some(Utc::now());
        self.enter(ManagerState::Prepping);
    }
}

/// Consecutive failures tolerated before a resync: enough backoffs to cover
/// one weaken duration, never fewer than `minimum`
pub fn failure_threshold(weaken_ms: u128, backoff_ms: u64, minimum: u32) -> u32 {
    let backoff = u128::from(backoff_ms.max(1));
    let covering = weaken_ms.div_ceil(backoff);
    let covering = u32::try_from(covering).unwrap_or(u32::MAX);
    covering.max(minimum).max(1)
}

/// Acting host first, then configured pool members without duplicates
fn pool_names(host: &str, config: &Config) -> Vec<String> {
    let mut pool = vec![host.to_string()];
    for name in &config.capacity.pool {
        if !pool.contains(name) {
            pool.push(name.clone());
        }
    }
    pool
}

/// Fresh snapshots of the pool hosts with keep-free margins applied
async fn pool_snapshot<H>(host_api: &H, pool: &[String], keep_free: &KeepFreePolicy) -> Vec<WorkerHost>
where
    H: HostApi + ?Sized,
{
    let mut hosts = Vec::with_capacity(pool.len());
    for name in pool {
        match host_api.host(name).await {
            Some(host) => hosts.push(keep_free.apply(host)),
            None => warn!(host = %name, "Pool host not visible, skipping"),
        }
    }
    hosts
}

/// Cores assumed for planning; the weakest host bounds the effect
fn pool_cores(hosts: &[WorkerHost]) -> u32 {
    hosts.iter().map(|h| h.cores.max(1)).min().unwrap_or(1)
}

/// Start a manager and run it forever
pub async fn run_manager<H: HostApi>(host_api: Arc<H>, target: &str, host: &str, config: Config) -> Result<()> {
    let mut manager = BatchManager::start(host_api, target, host, config).await?;
    manager.run().await;
    Ok(())
}

/// Plan a single batch against the current pool without dispatching
pub async fn plan_once<H>(host_api: &H, target: &str, host: &str, config: &Config) -> Result<BatchPlan>
where
    H: HostApi + ?Sized,
{
    let model = ResourceModel::new(host_api.formulas(), host_api.actor().await)?;
    let observed = host_api
        .target(target)
        .await
        .ok_or_else(|| Error::TargetUnknown(target.to_string()))?;

    let pool = pool_names(host, config);
    let hosts = pool_snapshot(host_api, &pool, &config.keep_free()).await;
    if !hosts.iter().any(|h| h.name == host) {
        return Err(Error::HostUnknown(host.to_string()));
    }

    let ceiling = CapacityAllocator::new().placeable(&hosts, config.capacity.script_costs.largest());
    let plan = plan_single(config.planner(), &model, &observed, ceiling, pool_cores(&hosts))?;
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::formulas::FixedRateFormulas;
    use crate::host::WaitOutcome;
    use crate::sim::{SimulatedHost, WorldSnapshot};
    use crate::models::ActorAttributes;

    fn world(ram: RamMb) -> WorldSnapshot {
        WorldSnapshot {
            actor: ActorAttributes::new(10),
            targets: vec![TargetNode::new("n00dles", 1_000_000.0, 5.0, 10.0, 1)],
            hosts: vec![WorkerHost::new("home", ram, 1)],
        }
    }

    fn sim(ram: RamMb) -> Arc<SimulatedHost> {
        Arc::new(SimulatedHost::new(
            world(ram),
            Some(Arc::new(FixedRateFormulas::default())),
        ))
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.batch.resync_after_batches = 3;
        config
    }

    #[test]
    fn test_failure_threshold() {
        assert_eq!(failure_threshold(40_000, 1000, 5), 40);
        assert_eq!(failure_threshold(40_001, 1000, 5), 41);
        assert_eq!(failure_threshold(2_000, 1000, 5), 5);
        assert_eq!(failure_threshold(0, 1000, 0), 1);
    }

    #[test]
    fn test_pool_cores_uses_weakest_host() {
        let hosts = vec![
            WorkerHost::new("home", RamMb(1000), 8),
            WorkerHost::new("pserv-0", RamMb(1000), 2),
        ];
        assert_eq!(pool_cores(&hosts), 2);
        assert_eq!(pool_cores(&[]), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_rejects_unknown_target_and_host() {
        let host = sim(RamMb(1_000_000));
        let err = BatchManager::start(host.clone(), "nowhere", "home", config())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::TargetUnknown(_)));

        let err = BatchManager::start(host, "n00dles", "garage", config())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::HostUnknown(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_without_formulas() {
        let host = Arc::new(SimulatedHost::new(world(RamMb(1_000_000)), None));
        let err = BatchManager::start(host, "n00dles", "home", config())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::AttributeSourceUnavailable { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_prepped_target_goes_straight_to_batching() {
        let host = sim(RamMb(100_000_000));
        let mut manager = BatchManager::start(host, "n00dles", "home", config()).await.unwrap();

        assert_eq!(manager.step().await, StepOutcome::Observed { prepped: true });
        assert_eq!(manager.state(), ManagerState::PreppedIdle);
        assert_eq!(
            manager.step().await,
            StepOutcome::BatchingStarted { failure_threshold: 40 }
        );
        match manager.step().await {
            StepOutcome::BatchLaunched { launched, extract_percent, resync } => {
                assert_eq!(launched, 1);
                assert_eq!(extract_percent, 50);
                assert_eq!(resync, None);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_resync_after_limit_then_drain() {
        let host = sim(RamMb(100_000_000));
        let mut manager = BatchManager::start(host.clone(), "n00dles", "home", config())
            .await
            .unwrap();
        manager.step().await;
        manager.step().await;

        let mut outcomes = Vec::new();
        for _ in 0..3 {
            outcomes.push(manager.step().await);
        }
        assert_eq!(outcomes[2].resync(), Some(ResyncTrigger::BatchLimit));
        assert!(outcomes[..2].iter().all(|o| o.resync().is_none()));
        assert_eq!(manager.state(), ManagerState::Prepping);
        assert_eq!(manager.metrics().resyncs("batch_limit"), 1);
        assert!(manager.status().last_resync_at.is_some());

        assert_eq!(
            manager.step().await,
            StepOutcome::Drained { outcome: WaitOutcome::Finished }
        );
        assert_eq!(host.running().await, 0);
        assert_eq!(manager.step().await, StepOutcome::PrepComplete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_starvation_backs_off_without_dispatching() {
        let host = sim(RamMb(1_000));
        let mut cfg = config();
        cfg.batch.min_failure_threshold = 2;
        cfg.timing.backoff_ms = 20_000;
        let mut manager = BatchManager::start(host.clone(), "n00dles", "home", cfg).await.unwrap();
        manager.step().await;
        assert_eq!(
            manager.step().await,
            StepOutcome::BatchingStarted { failure_threshold: 2 }
        );

        let first = manager.step().await;
        assert_eq!(
            first,
            StepOutcome::BatchFailed {
                consecutive: 1,
                category: ErrorCategory::Planning,
                resync: None
            }
        );
        let second = manager.step().await;
        assert_eq!(second.resync(), Some(ResyncTrigger::ConsecutiveFailures));
        assert_eq!(manager.state(), ManagerState::Prepping);
        assert_eq!(host.stats().await.dispatched, 0);
        assert_eq!(manager.metrics().failures("planning"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prep_converges() {
        let host = sim(RamMb(100_000_000));
        host.set_target_state("n00dles", 250_000.0, 9.0).await;
        let mut manager = BatchManager::start(host.clone(), "n00dles", "home", config())
            .await
            .unwrap();

        assert_eq!(manager.step().await, StepOutcome::Observed { prepped: false });
        let mut rounds = 0;
        while manager.state() == ManagerState::Prepping {
            if let StepOutcome::PrepRound { outcome, .. } = manager.step().await {
                assert_eq!(outcome, WaitOutcome::Finished);
                rounds += 1;
            }
            assert!(rounds <= 4, "prep did not converge");
        }
        assert_eq!(manager.state(), ManagerState::PreppedIdle);
        assert!(host.target("n00dles").await.unwrap().is_prepped());
        assert!(rounds >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_plan_once() {
        let host = sim(RamMb(100_000_000));
        let plan = plan_once(&*host, "n00dles", "home", &Config::default()).await.unwrap();
        assert_eq!(plan.extract_percent, 50);
        assert_eq!(plan.threads(BatchRole::Hack), 50);
        assert_eq!(host.stats().await.dispatched, 0);

        let err = plan_once(&*host, "n00dles", "garage", &Config::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HostUnknown(_)));
    }
}
