//! In-memory host runtime
//!
//! [`SimulatedHost`] implements [`HostApi`] over a [`WorldSnapshot`]. Started
//! operations occupy RAM until they finish; finished operations apply their
//! effect to the target the next time anyone reads state. Time is
//! `tokio::time`, so paused-clock tests step through hours of game time
//! instantly.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::formulas::FormulaSource;
use crate::host::{DispatchHandle, DispatchRequest, HostApi};
use crate::models::{ActorAttributes, OperationKind, RamMb, ScriptCosts, TargetNode, WorkerHost};

// ============================================================================
// World snapshot
// ============================================================================

/// Everything the simulated runtime knows about
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldSnapshot {
    #[serde(default)]
    pub actor: ActorAttributes,
    #[serde(default)]
    pub targets: Vec<TargetNode>,
    #[serde(default)]
    pub hosts: Vec<WorkerHost>,
}

impl WorldSnapshot {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("Failed to parse world snapshot")
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read world snapshot: {}", path.display()))?;
        Self::from_json(&content)
    }
}

// ============================================================================
// Simulated host
// ============================================================================

/// Counters describing what the simulated runtime has done
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimStats {
    pub dispatched: u64,
    pub rejected: u64,
    pub completed: u64,
    pub threads_started: BTreeMap<OperationKind, u64>,
}

#[derive(Debug, Clone)]
struct Job {
    request: DispatchRequest,
    finish_at: Instant,
    ram: RamMb,
    cores: u32,
}

struct SimState {
    targets: HashMap<String, TargetNode>,
    hosts: HashMap<String, WorkerHost>,
    actor: ActorAttributes,
    jobs: BTreeMap<DispatchHandle, Job>,
    next_pid: u64,
    rng: ChaCha8Rng,
    stats: SimStats,
}

/// Host runtime backed by an in-memory world
pub struct SimulatedHost {
    state: RwLock<SimState>,
    formulas: Option<Arc<dyn FormulaSource>>,
    costs: ScriptCosts,
    jitter: Duration,
}

impl SimulatedHost {
    pub fn new(world: WorldSnapshot, formulas: Option<Arc<dyn FormulaSource>>) -> Self {
        let state = SimState {
            targets: world
                .targets
                .into_iter()
                .map(|t| (t.name().to_string(), t))
                .collect(),
            hosts: world
                .hosts
                .into_iter()
                .map(|h| (h.name.clone(), h))
                .collect(),
            actor: world.actor,
            jobs: BTreeMap::new(),
            next_pid: 1,
            rng: ChaCha8Rng::seed_from_u64(0),
            stats: SimStats::default(),
        };
        Self {
            state: RwLock::new(state),
            formulas,
            costs: ScriptCosts::default(),
            jitter: Duration::ZERO,
        }
    }

    pub fn with_costs(mut self, costs: ScriptCosts) -> Self {
        self.costs = costs;
        self
    }

    /// Delay every dispatch by up to `max` extra, drawn from a seeded RNG
    pub fn with_jitter(mut self, max: Duration, seed: u64) -> Self {
        self.jitter = max;
        self.state.get_mut().rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    pub async fn stats(&self) -> SimStats {
        let mut state = self.state.write().await;
        self.settle(&mut state);
        state.stats.clone()
    }

    pub async fn running(&self) -> usize {
        let mut state = self.state.write().await;
        self.settle(&mut state);
        state.jobs.len()
    }

    /// Mark RAM on `host` as used by something outside the core
    pub async fn occupy(&self, host: &str, ram: RamMb) -> bool {
        let mut state = self.state.write().await;
        match state.hosts.get_mut(host) {
            Some(h) => {
                h.used_ram += ram;
                true
            }
            None => false,
        }
    }

    /// Overwrite a target's observed state
    pub async fn set_target_state(&self, name: &str, money: f64, security: f64) -> bool {
        let mut state = self.state.write().await;
        match state.targets.remove(name) {
            Some(target) => {
                state
                    .targets
                    .insert(name.to_string(), target.with_state(money, security));
                true
            }
            None => false,
        }
    }

    fn operation_time(&self, source: &dyn FormulaSource, kind: OperationKind, target: &TargetNode, actor: &ActorAttributes) -> Duration {
        match kind {
            OperationKind::Hack => source.hack_time(target, actor),
            OperationKind::Grow => source.grow_time(target, actor),
            OperationKind::Weaken => source.weaken_time(target, actor),
        }
    }

    /// Apply every job whose finish instant has passed, in finish order
    fn settle(&self, state: &mut SimState) {
        let now = Instant::now();
        let mut finished: Vec<(Instant, DispatchHandle)> = state
            .jobs
            .iter()
            .filter(|(_, job)| job.finish_at <= now)
            .map(|(handle, job)| (job.finish_at, *handle))
            .collect();
        finished.sort();

        for (_, handle) in finished {
            let Some(job) = state.jobs.remove(&handle) else {
                continue;
            };
            if let Some(host) = state.hosts.get_mut(&job.request.host) {
                host.used_ram = host.used_ram.saturating_sub(job.ram);
            }
            if let (Some(source), Some(target)) = (
                self.formulas.as_deref(),
                state.targets.get_mut(&job.request.target),
            ) {
                apply_effect(source, &state.actor, target, &job);
            }
            state.stats.completed += 1;
        }
    }
}

fn apply_effect(source: &dyn FormulaSource, actor: &ActorAttributes, target: &mut TargetNode, job: &Job) {
    let threads = f64::from(job.request.threads);
    match job.request.kind {
        OperationKind::Hack => {
            let fraction = (source.hack_fraction(target, actor) * threads).min(1.0);
            let money = target.money() * (1.0 - fraction);
            target.set_money(money);
            target.set_security(target.security() + source.hack_security() * threads);
        }
        OperationKind::Grow => {
            let log = source.grow_log(target, actor, job.cores) * threads;
            let money = (target.money() + threads) * log.exp();
            target.set_money(money);
            target.set_security(target.security() + source.grow_security() * threads);
        }
        OperationKind::Weaken => {
            let reduction = source.weaken_per_thread(job.cores) * threads;
            target.set_security(target.security() - reduction);
        }
    }
}

#[async_trait]
impl HostApi for SimulatedHost {
    async fn target(&self, name: &str) -> Option<TargetNode> {
        let mut state = self.state.write().await;
        self.settle(&mut state);
        state.targets.get(name).cloned()
    }

    async fn host(&self, name: &str) -> Option<WorkerHost> {
        let mut state = self.state.write().await;
        self.settle(&mut state);
        state.hosts.get(name).cloned()
    }

    async fn actor(&self) -> ActorAttributes {
        self.state.read().await.actor.clone()
    }

    fn formulas(&self) -> Option<Arc<dyn FormulaSource>> {
        self.formulas.clone()
    }

    async fn dispatch(&self, request: &DispatchRequest) -> Option<DispatchHandle> {
        let mut state = self.state.write().await;
        self.settle(&mut state);

        let source = self.formulas.as_deref();
        let ram = self.costs.cost(request.kind).times(request.threads);
        let accepted = match (
            source,
            state.targets.get(&request.target),
            state.hosts.get(&request.host),
        ) {
            (Some(source), Some(target), Some(host))
                if request.threads > 0 && host.max_ram.saturating_sub(host.used_ram) >= ram =>
            {
                let duration = self.operation_time(source, request.kind, target, &state.actor);
                Some((duration, host.cores))
            }
            _ => None,
        };

        let Some((duration, cores)) = accepted else {
            state.stats.rejected += 1;
            tracing::debug!(
                kind = %request.kind,
                threads = request.threads,
                host = %request.host,
                "Simulated dispatch rejected"
            );
            return None;
        };

        let jitter = if self.jitter.is_zero() {
            Duration::ZERO
        } else {
            let max = self.jitter.as_micros() as u64;
            Duration::from_micros(state.rng.gen_range(0..=max))
        };

        if let Some(host) = state.hosts.get_mut(&request.host) {
            host.used_ram += ram;
        }
        let handle = DispatchHandle(state.next_pid);
        state.next_pid += 1;
        state.jobs.insert(
            handle,
            Job {
                request: request.clone(),
                finish_at: Instant::now() + request.delay + jitter + duration,
                ram,
                cores,
            },
        );
        state.stats.dispatched += 1;
        *state.stats.threads_started.entry(request.kind).or_default() += u64::from(request.threads);
        Some(handle)
    }

    async fn is_running(&self, handle: DispatchHandle) -> bool {
        let mut state = self.state.write().await;
        self.settle(&mut state);
        state.jobs.contains_key(&handle)
    }
}
