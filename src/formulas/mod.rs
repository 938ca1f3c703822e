//! Operation cost model
//!
//! [`ResourceModel`] turns a target's economic/security state plus the actor's
//! attributes into operation durations, security deltas, extraction fractions
//! and growth thread counts. It is pure: the same target and actor always
//! produce the same numbers, which the planner and the timing coordinator
//! rely on when they call it repeatedly during one planning step.
//!
//! The raw formulas come from a [`FormulaSource`]. [`GameFormulas`] carries
//! the game's own math; [`FixedRateFormulas`] uses constant rates and exists
//! for dry runs and scenario tests.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::{ActorAttributes, OperationKind, TargetNode};

/// Largest thread count the growth search will consider
const MAX_GROW_THREADS: u32 = 1 << 30;

// ============================================================================
// Formula source
// ============================================================================

/// Per-thread formulas exposed by the host runtime
///
/// Implementations must be deterministic in their inputs.
pub trait FormulaSource: Send + Sync {
    /// Time for one hack against `target` at its current security
    fn hack_time(&self, target: &TargetNode, actor: &ActorAttributes) -> Duration;

    fn grow_time(&self, target: &TargetNode, actor: &ActorAttributes) -> Duration;

    fn weaken_time(&self, target: &TargetNode, actor: &ActorAttributes) -> Duration;

    /// Fraction of current value a single hack thread removes
    fn hack_fraction(&self, target: &TargetNode, actor: &ActorAttributes) -> f64;

    /// Natural log of the growth multiplier contributed by one grow thread
    fn grow_log(&self, target: &TargetNode, actor: &ActorAttributes, cores: u32) -> f64;

    /// Security added by one hack thread
    fn hack_security(&self) -> f64 {
        0.002
    }

    /// Security added by one grow thread
    fn grow_security(&self) -> f64 {
        0.004
    }

    /// Security removed by one weaken thread
    fn weaken_per_thread(&self, cores: u32) -> f64;
}

fn core_bonus(cores: u32) -> f64 {
    1.0 + (f64::from(cores.max(1)) - 1.0) / 16.0
}

/// The game's published formulas
#[derive(Debug, Clone, Copy, Default)]
pub struct GameFormulas;

impl GameFormulas {
    const BALANCE_FACTOR: f64 = 240.0;
    const BASE_GROWTH_RATE: f64 = 1.03;
    const MAX_GROWTH_RATE: f64 = 1.0035;
    const WEAKEN_PER_THREAD: f64 = 0.05;

    fn hack_seconds(target: &TargetNode, actor: &ActorAttributes) -> f64 {
        let difficulty = f64::from(target.required_skill()) * target.security();
        let skill = f64::from(actor.hacking_skill);
        let skill_factor = (2.5 * difficulty + 500.0) / (skill + 50.0);
        5.0 * skill_factor / actor.hack_speed_mult.max(f64::MIN_POSITIVE)
    }
}

impl FormulaSource for GameFormulas {
    fn hack_time(&self, target: &TargetNode, actor: &ActorAttributes) -> Duration {
        Duration::from_secs_f64(Self::hack_seconds(target, actor))
    }

    fn grow_time(&self, target: &TargetNode, actor: &ActorAttributes) -> Duration {
        Duration::from_secs_f64(Self::hack_seconds(target, actor) * 3.2)
    }

    fn weaken_time(&self, target: &TargetNode, actor: &ActorAttributes) -> Duration {
        Duration::from_secs_f64(Self::hack_seconds(target, actor) * 4.0)
    }

    fn hack_fraction(&self, target: &TargetNode, actor: &ActorAttributes) -> f64 {
        let skill = f64::from(actor.hacking_skill.max(1));
        let difficulty_mult = (100.0 - target.security()) / 100.0;
        let skill_mult = (skill - (f64::from(target.required_skill()) - 1.0)) / skill;
        let fraction =
            difficulty_mult * skill_mult * actor.hack_money_mult / Self::BALANCE_FACTOR;
        fraction.clamp(0.0, 1.0)
    }

    fn grow_log(&self, target: &TargetNode, actor: &ActorAttributes, cores: u32) -> f64 {
        let rate = (1.0 + (Self::BASE_GROWTH_RATE - 1.0) / target.security().max(1e-3))
            .min(Self::MAX_GROWTH_RATE);
        let thread_mult = target.growth() / 100.0 * actor.grow_mult * core_bonus(cores);
        rate.ln() * thread_mult
    }

    fn weaken_per_thread(&self, cores: u32) -> f64 {
        Self::WEAKEN_PER_THREAD * core_bonus(cores)
    }
}

/// Constant-rate formulas, independent of security and skill
#[derive(Debug, Clone, PartialEq)]
pub struct FixedRateFormulas {
    pub hack_fraction: f64,
    pub grow_log: f64,
    pub weaken_per_thread: f64,
    pub hack_time: Duration,
    pub grow_time: Duration,
    pub weaken_time: Duration,
}

impl Default for FixedRateFormulas {
    fn default() -> Self {
        Self {
            hack_fraction: 0.01,
            grow_log: 0.01,
            weaken_per_thread: 0.05,
            hack_time: Duration::from_secs(10),
            grow_time: Duration::from_secs(32),
            weaken_time: Duration::from_secs(40),
        }
    }
}

impl FormulaSource for FixedRateFormulas {
    fn hack_time(&self, _target: &TargetNode, _actor: &ActorAttributes) -> Duration {
        self.hack_time
    }

    fn grow_time(&self, _target: &TargetNode, _actor: &ActorAttributes) -> Duration {
        self.grow_time
    }

    fn weaken_time(&self, _target: &TargetNode, _actor: &ActorAttributes) -> Duration {
        self.weaken_time
    }

    fn hack_fraction(&self, _target: &TargetNode, _actor: &ActorAttributes) -> f64 {
        self.hack_fraction
    }

    fn grow_log(&self, _target: &TargetNode, _actor: &ActorAttributes, cores: u32) -> f64 {
        self.grow_log * core_bonus(cores)
    }

    fn weaken_per_thread(&self, cores: u32) -> f64 {
        self.weaken_per_thread * core_bonus(cores)
    }
}

// ============================================================================
// Resource model
// ============================================================================

/// Side-effect-free operation cost calculator bound to one actor
#[derive(Clone)]
pub struct ResourceModel {
    source: Arc<dyn FormulaSource>,
    actor: ActorAttributes,
}

impl std::fmt::Debug for ResourceModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceModel")
            .field("actor", &self.actor)
            .finish_non_exhaustive()
    }
}

/// Operation times divide by the speed multiplier
fn check_actor(actor: &ActorAttributes) -> Result<()> {
    let speed = actor.hack_speed_mult;
    if !speed.is_finite() || speed <= 0.0 {
        return Err(Error::attribute_source(format!(
            "hack speed multiplier must be positive and finite, got {speed}"
        )));
    }
    Ok(())
}

impl ResourceModel {
    /// Bind a formula source to an actor
    ///
    /// Fails when the host exposes no formula source; zero durations would
    /// poison every plan downstream, so there is no fallback.
    pub fn new(source: Option<Arc<dyn FormulaSource>>, actor: ActorAttributes) -> Result<Self> {
        let source = source.ok_or_else(|| Error::attribute_source("formulas"))?;
        if source.weaken_per_thread(1) <= 0.0 {
            return Err(Error::attribute_source(
                "weaken effectiveness must be positive",
            ));
        }
        check_actor(&actor)?;
        Ok(Self { source, actor })
    }

    pub fn actor(&self) -> &ActorAttributes {
        &self.actor
    }

    /// Same formulas, refreshed actor attributes; unusable attributes are
    /// refused and the previous ones kept
    pub fn set_actor(&mut self, actor: ActorAttributes) -> Result<()> {
        check_actor(&actor)?;
        self.actor = actor;
        Ok(())
    }

    pub fn source(&self) -> &Arc<dyn FormulaSource> {
        &self.source
    }

    /// Time for `kind` to complete against `target` as it is now
    pub fn duration(&self, kind: OperationKind, target: &TargetNode) -> Duration {
        match kind {
            OperationKind::Hack => self.source.hack_time(target, &self.actor),
            OperationKind::Grow => self.source.grow_time(target, &self.actor),
            OperationKind::Weaken => self.source.weaken_time(target, &self.actor),
        }
    }

    /// Security increase from `threads` threads of `kind`; weaken reports the
    /// magnitude of its reduction on a single core
    pub fn security_delta(&self, kind: OperationKind, threads: u32, _target: &TargetNode) -> f64 {
        let per_thread = match kind {
            OperationKind::Hack => self.source.hack_security(),
            OperationKind::Grow => self.source.grow_security(),
            OperationKind::Weaken => self.source.weaken_per_thread(1),
        };
        per_thread * f64::from(threads)
    }

    /// Security removed by one weaken thread on a host with `cores` cores
    pub fn weaken_per_thread(&self, cores: u32) -> f64 {
        self.source.weaken_per_thread(cores)
    }

    /// Fraction of value `threads` hack threads remove; not capped at 1
    pub fn extract_fraction(&self, threads: u32, target: &TargetNode) -> f64 {
        self.source.hack_fraction(target, &self.actor) * f64::from(threads)
    }

    /// Value after `threads` grow threads starting from `start_value`
    pub fn value_after_grow(
        &self,
        target: &TargetNode,
        start_value: f64,
        threads: u32,
        cores: u32,
    ) -> f64 {
        let log = self.source.grow_log(target, &self.actor, cores) * f64::from(threads);
        let grown = (start_value.max(0.0) + f64::from(threads)) * log.exp();
        grown.min(target.max_money())
    }

    /// Minimum grow threads taking `start_value` back to max value
    pub fn grow_threads(&self, target: &TargetNode, start_value: f64, cores: u32) -> u32 {
        let goal = target.max_money();
        if start_value >= goal {
            return 0;
        }
        let reaches = |threads: u32| {
            let log = self.source.grow_log(target, &self.actor, cores) * f64::from(threads);
            (start_value.max(0.0) + f64::from(threads)) * log.exp() >= goal
        };

        let mut high = 1u32;
        while !reaches(high) {
            if high >= MAX_GROW_THREADS {
                return MAX_GROW_THREADS;
            }
            high = high.saturating_mul(2);
        }
        let mut low = high / 2;
        // invariant: reaches(high) && (low == 0 || !reaches(low))
        while high - low > 1 {
            let mid = low + (high - low) / 2;
            if reaches(mid) {
                high = mid;
            } else {
                low = mid;
            }
        }
        high
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joesguns() -> TargetNode {
        TargetNode::new("joesguns", 2_500_000.0, 5.0, 20.0, 10)
    }

    fn model(source: impl FormulaSource + 'static, skill: u32) -> ResourceModel {
        ResourceModel::new(Some(Arc::new(source)), ActorAttributes::new(skill)).unwrap()
    }

    #[test]
    fn test_missing_source_fails_fast() {
        let err = ResourceModel::new(None, ActorAttributes::new(10)).unwrap_err();
        assert!(matches!(err, Error::AttributeSourceUnavailable { .. }));
    }

    #[test]
    fn test_zero_weaken_source_rejected() {
        let source = FixedRateFormulas {
            weaken_per_thread: 0.0,
            ..Default::default()
        };
        let err = ResourceModel::new(Some(Arc::new(source)), ActorAttributes::new(1)).unwrap_err();
        assert!(matches!(err, Error::AttributeSourceUnavailable { .. }));
    }

    #[test]
    fn test_unusable_speed_multiplier_rejected() {
        for speed in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let actor = ActorAttributes {
                hack_speed_mult: speed,
                ..ActorAttributes::new(10)
            };
            let err = ResourceModel::new(Some(Arc::new(GameFormulas)), actor.clone()).unwrap_err();
            assert!(err.is_fatal(), "{speed} accepted");

            let mut model = model(GameFormulas, 10);
            assert!(model.set_actor(actor).is_err());
            assert_eq!(model.actor().hack_speed_mult, 1.0);
            assert!(model.duration(OperationKind::Hack, &joesguns()) > Duration::ZERO);
        }
    }

    #[test]
    fn test_game_time_ratios() {
        let model = model(GameFormulas, 100);
        let target = joesguns();
        let hack = model.duration(OperationKind::Hack, &target).as_secs_f64();
        let grow = model.duration(OperationKind::Grow, &target).as_secs_f64();
        let weaken = model.duration(OperationKind::Weaken, &target).as_secs_f64();
        assert!((grow / hack - 3.2).abs() < 1e-9);
        assert!((weaken / hack - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_duration_falls_with_skill_and_rises_with_security() {
        let target = joesguns();
        let slow = model(GameFormulas, 50).duration(OperationKind::Weaken, &target);
        let fast = model(GameFormulas, 500).duration(OperationKind::Weaken, &target);
        assert!(fast < slow);

        let insecure = target.clone().with_state(target.max_money(), 40.0);
        let m = model(GameFormulas, 100);
        assert!(m.duration(OperationKind::Hack, &insecure) > m.duration(OperationKind::Hack, &target));
    }

    #[test]
    fn test_duration_is_deterministic() {
        let m = model(GameFormulas, 123);
        let target = joesguns();
        assert_eq!(
            m.duration(OperationKind::Grow, &target),
            m.duration(OperationKind::Grow, &target)
        );
    }

    #[test]
    fn test_security_delta_scales_with_threads() {
        let m = model(GameFormulas, 100);
        let target = joesguns();
        assert_eq!(m.security_delta(OperationKind::Hack, 0, &target), 0.0);
        assert!((m.security_delta(OperationKind::Hack, 10, &target) - 0.02).abs() < 1e-12);
        assert!((m.security_delta(OperationKind::Grow, 10, &target) - 0.04).abs() < 1e-12);
        assert!((m.weaken_per_thread(1) - 0.05).abs() < 1e-12);
        assert!(m.weaken_per_thread(8) > m.weaken_per_thread(1));
    }

    #[test]
    fn test_extract_fraction_linear() {
        let m = model(FixedRateFormulas::default(), 1);
        let target = joesguns();
        assert!((m.extract_fraction(50, &target) - 0.5).abs() < 1e-12);
        assert!(m.extract_fraction(150, &target) > 1.0);
    }

    #[test]
    fn test_grow_threads_minimal() {
        let m = model(GameFormulas, 100);
        let target = joesguns();
        let start = target.max_money() * 0.5;
        let threads = m.grow_threads(&target, start, 1);
        assert!(threads > 0);
        assert!(m.value_after_grow(&target, start, threads, 1) >= target.max_money());
        assert!(m.value_after_grow(&target, start, threads - 1, 1) < target.max_money());
    }

    #[test]
    fn test_grow_threads_from_zero_and_full() {
        let m = model(GameFormulas, 100);
        let target = joesguns();
        assert_eq!(m.grow_threads(&target, target.max_money(), 1), 0);
        let from_zero = m.grow_threads(&target, 0.0, 1);
        assert!(from_zero > m.grow_threads(&target, target.max_money() * 0.5, 1));
    }

    #[test]
    fn test_cores_reduce_grow_threads() {
        let m = model(GameFormulas, 100);
        let target = joesguns();
        let start = target.max_money() * 0.25;
        assert!(m.grow_threads(&target, start, 8) < m.grow_threads(&target, start, 1));
    }
}
