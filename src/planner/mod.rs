//! Thread planning for batches and prep rounds
//!
//! [`ThreadPlanner::plan_batch`] searches extraction percentages from the
//! configured maximum down to 1% and returns the first plan whose RAM
//! footprint fits the ceiling. Every thread count it returns is the minimum
//! that meets its requirement; weaken counts add a fixed safety margin on top
//! of the rounded-up raw requirement.
//!
//! Per-percentage candidates depend only on the prepped target, the actor and
//! the core count, never on the ceiling, so the planner memoizes them and
//! only re-checks the footprint on later calls.

use std::collections::HashMap;

use thiserror::Error;

use crate::error::{ErrorCategory, ErrorClass};
use crate::formulas::ResourceModel;
use crate::models::{
    ActorAttributes, BatchPlan, BatchRole, OperationKind, OperationSpec, RamMb, ScriptCosts,
    TargetNode,
};

/// Slack subtracted before rounding thread requirements up
const ROUNDING_SLACK: f64 = 1e-9;

/// Errors produced by the planner
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    /// No percentage in range fits the memory ceiling
    #[error("no batch against {target} fits {ceiling} (smallest valid plan needs {})", .smallest.map(|r| r.to_string()).unwrap_or_else(|| "n/a".into()))]
    InsufficientMemory {
        target: String,
        ceiling: RamMb,
        smallest: Option<RamMb>,
    },

    /// The actor cannot extract anything from this target
    #[error("target {target} cannot be planned: {reason}")]
    Degenerate { target: String, reason: String },
}

impl ErrorClass for PlanError {
    fn is_recoverable(&self) -> bool {
        true
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Planning
    }
}

/// Planner tuning
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    /// Highest extraction percentage tried
    pub max_extract_percent: u32,
    /// Extra weaken threads added after rounding up
    pub weaken_margin_threads: u32,
    pub costs: ScriptCosts,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_extract_percent: 50,
            weaken_margin_threads: 1,
            costs: ScriptCosts::default(),
        }
    }
}

/// Smallest `n` with `n * per_unit >= goal`, never zero for positive goals
fn min_units(goal: f64, per_unit: f64) -> u32 {
    if goal <= 0.0 {
        return 0;
    }
    let raw = (goal / per_unit - ROUNDING_SLACK).ceil();
    if raw >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        (raw as u32).max(1)
    }
}

/// Identity of the inputs a memoized candidate was computed from
#[derive(Debug, Clone, PartialEq)]
struct PlanKey {
    target: TargetNode,
    actor: ActorAttributes,
    cores: u32,
}

/// Batch and prep thread planner
#[derive(Debug, Clone, Default)]
pub struct ThreadPlanner {
    config: PlannerConfig,
    memo_key: Option<PlanKey>,
    /// percent -> candidate, `None` when the candidate was rejected
    memo: HashMap<u32, Option<BatchPlan>>,
}

impl ThreadPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            config,
            memo_key: None,
            memo: HashMap::new(),
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Weaken threads cancelling `security_increase`, including the margin
    pub fn weaken_threads(&self, model: &ResourceModel, security_increase: f64, cores: u32) -> u32 {
        min_units(security_increase, model.weaken_per_thread(cores))
            .saturating_add(self.config.weaken_margin_threads)
    }

    /// Plan one batch against the prepped version of `target`
    pub fn plan_batch(
        &mut self,
        model: &ResourceModel,
        target: &TargetNode,
        ceiling: RamMb,
        cores: u32,
    ) -> Result<BatchPlan, PlanError> {
        let prepped = target.prepped();
        if model.extract_fraction(1, &prepped) <= 0.0 {
            return Err(PlanError::Degenerate {
                target: prepped.name().to_string(),
                reason: "hack removes nothing at minimum security".into(),
            });
        }
        if prepped.max_money() <= 0.0 {
            return Err(PlanError::Degenerate {
                target: prepped.name().to_string(),
                reason: "target holds no value".into(),
            });
        }

        let key = PlanKey {
            target: prepped.clone(),
            actor: model.actor().clone(),
            cores,
        };
        if self.memo_key.as_ref() != Some(&key) {
            self.memo.clear();
            self.memo_key = Some(key);
        }

        let mut smallest: Option<RamMb> = None;
        for percent in (1..=self.config.max_extract_percent).rev() {
            let candidate = match self.memo.get(&percent) {
                Some(cached) => cached.clone(),
                None => {
                    let built = self.build_candidate(model, &prepped, percent, cores);
                    self.memo.insert(percent, built.clone());
                    built
                }
            };
            let Some(plan) = candidate else {
                continue;
            };
            let footprint = plan.total_ram();
            if footprint <= ceiling {
                tracing::trace!(
                    target_name = %prepped.name(),
                    percent,
                    footprint = %footprint,
                    ceiling = %ceiling,
                    "Accepted batch candidate"
                );
                return Ok(plan);
            }
            smallest = Some(smallest.map_or(footprint, |s| s.min(footprint)));
        }

        Err(PlanError::InsufficientMemory {
            target: prepped.name().to_string(),
            ceiling,
            smallest,
        })
    }

    /// Build the plan for one whole-percent candidate, or `None` if any
    /// operation would need fewer than one thread
    fn build_candidate(
        &self,
        model: &ResourceModel,
        prepped: &TargetNode,
        percent: u32,
        cores: u32,
    ) -> Option<BatchPlan> {
        let goal = f64::from(percent) / 100.0;
        let per_thread = model.extract_fraction(1, prepped);
        let hack_threads = min_units(goal, per_thread);

        let extracted = model.extract_fraction(hack_threads, prepped).min(1.0);
        let remaining = prepped.max_money() * (1.0 - extracted);
        let grow_threads = model.grow_threads(prepped, remaining, cores);

        let hack_security = model.security_delta(OperationKind::Hack, hack_threads, prepped);
        let grow_security = model.security_delta(OperationKind::Grow, grow_threads, prepped);
        let weaken_hack = self.weaken_threads(model, hack_security, cores);
        let weaken_grow = self.weaken_threads(model, grow_security, cores);

        let threads = [hack_threads, weaken_hack, grow_threads, weaken_grow];
        if threads.iter().any(|&t| t < 1) {
            return None;
        }

        let weaken_per_thread = model.weaken_per_thread(cores);
        let operations = BatchRole::ALL.map(|role| {
            let kind = role.kind();
            let count = threads[role.index()];
            let security_delta = match kind {
                OperationKind::Weaken => -(weaken_per_thread * f64::from(count)),
                _ => model.security_delta(kind, count, prepped),
            };
            OperationSpec {
                kind,
                threads: count,
                ram_per_thread: self.config.costs.cost(kind),
                duration: model.duration(kind, prepped),
                security_delta,
            }
        });

        Some(BatchPlan::new(
            prepped.name(),
            percent,
            extracted,
            operations,
        ))
    }

    /// Weaken threads taking `target` back to minimum security
    pub fn prep_weaken(&self, model: &ResourceModel, target: &TargetNode, cores: u32) -> OperationSpec {
        let threads = min_units(target.security_excess(), model.weaken_per_thread(cores));
        OperationSpec {
            kind: OperationKind::Weaken,
            threads,
            ram_per_thread: self.config.costs.weaken,
            duration: model.duration(OperationKind::Weaken, target),
            security_delta: -(model.weaken_per_thread(cores) * f64::from(threads)),
        }
    }

    /// Grow threads restoring max value plus the weaken threads cancelling
    /// their security increase
    pub fn prep_grow(
        &self,
        model: &ResourceModel,
        target: &TargetNode,
        cores: u32,
    ) -> (OperationSpec, OperationSpec) {
        let grow_threads = model.grow_threads(target, target.money(), cores);
        let grow_security = model.security_delta(OperationKind::Grow, grow_threads, target);
        let weaken_threads = if grow_threads == 0 {
            0
        } else {
            self.weaken_threads(model, grow_security, cores)
        };

        let grow = OperationSpec {
            kind: OperationKind::Grow,
            threads: grow_threads,
            ram_per_thread: self.config.costs.grow,
            duration: model.duration(OperationKind::Grow, target),
            security_delta: grow_security,
        };
        let weaken = OperationSpec {
            kind: OperationKind::Weaken,
            threads: weaken_threads,
            ram_per_thread: self.config.costs.weaken,
            duration: model.duration(OperationKind::Weaken, target),
            security_delta: -(model.weaken_per_thread(cores) * f64::from(weaken_threads)),
        };
        (grow, weaken)
    }
}

/// Plan one batch without any memo state
pub fn plan_single(
    config: PlannerConfig,
    model: &ResourceModel,
    target: &TargetNode,
    ceiling: RamMb,
    cores: u32,
) -> Result<BatchPlan, PlanError> {
    ThreadPlanner::new(config).plan_batch(model, target, ceiling, cores)
}
